//! The `wasmkern` interpreter.

mod config;
pub(crate) mod executor;
mod utils;

#[cfg(test)]
mod tests;

pub use self::config::{BoundsCheck, Config, DispatchStrategy};
use self::executor::ExecState;
use crate::{
    codegen::CodegenBackend,
    trap_guard::{self, GuardOutcome},
    Error,
    FuncBody,
    LinearMemory,
    Store,
};
use core::ptr;
use std::path::Path;
use wasmkern_core::{TrapCode, UntypedVal};

/// The `wasmkern` interpreter.
///
/// An [`Engine`] is cheap to clone and may be shared between threads.
/// Function bodies, stores and memories are independent of each other so that
/// different threads can execute at the same time.
#[derive(Debug, Default, Clone)]
pub struct Engine {
    /// The configuration of the [`Engine`].
    config: Config,
}

impl Engine {
    /// Creates a new [`Engine`] with the given [`Config`].
    pub fn new(config: &Config) -> Self {
        Self { config: *config }
    }

    /// Returns a shared reference to the [`Config`] of the [`Engine`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Executes `func` on `registers` with the linear memory and random source of `store`.
    ///
    /// On success `registers` holds the final register values of the
    /// execution. Registers not written by `func` keep their values, so
    /// callers pass parameters by initializing them.
    ///
    /// # Errors
    ///
    /// - If `registers` holds fewer than [`FuncBody::len_registers`] values.
    /// - If the execution traps, for example on an out-of-bounds memory access.
    pub fn execute(
        &self,
        store: &mut Store,
        func: &FuncBody,
        registers: &mut [UntypedVal],
    ) -> Result<(), Error> {
        if registers.len() < func.len_registers() {
            return Err(Error::from(TrapCode::BadRegisterFile));
        }
        let strategy = self.config.get_dispatch();
        let (rng, mut memory) = store.exec_parts();
        let guarded = self.config.get_bounds_checks() == BoundsCheck::Guard
            && memory.as_deref().is_some_and(LinearMemory::is_reserved);
        let (md, ms, reservation) = match memory.as_deref_mut() {
            Some(memory) => (
                memory.base_ptr(),
                memory.byte_len(),
                memory.reservation_size(),
            ),
            None => (ptr::null_mut(), 0, 0),
        };
        let mut state = ExecState::new(rng, memory, guarded);
        if !guarded {
            // Safety: the register file is large enough and every memory
            //         access of an unguarded execution is checked.
            let result =
                unsafe { executor::execute(strategy, func, registers, md, ms, &mut state) };
            return result.map_err(Error::from);
        }
        let mut result = Ok(());
        let outcome = trap_guard::run_guarded(|| {
            trap_guard::set_current_memory(md, reservation);
            // Safety: the register file is large enough and out-of-bounds
            //         accesses fault inside the reservation registered above.
            result = unsafe { executor::execute(strategy, func, registers, md, ms, &mut state) };
        });
        match outcome {
            GuardOutcome::Completed => result.map_err(Error::from),
            GuardOutcome::Trapped => Err(Error::from(TrapCode::MemoryOutOfBounds)),
        }
    }

    /// Lowers `funcs` with a code generation `backend` into an object file at `path`.
    ///
    /// Every function is verified by the backend before anything is emitted.
    ///
    /// # Errors
    ///
    /// - If the backend reports a diagnostic for one of `funcs`.
    /// - If the backend fails to emit the object file.
    pub fn lower(
        &self,
        backend: &mut dyn CodegenBackend,
        funcs: &[FuncBody],
        path: &Path,
    ) -> Result<(), Error> {
        for (index, func) in funcs.iter().enumerate() {
            if let Some(diagnostic) = backend.verify(func) {
                log::debug!(
                    "backend rejected function {index}:\n{}",
                    backend.print_function(func)
                );
                return Err(Error::codegen(format!("function {index}: {diagnostic}")));
            }
        }
        backend
            .emit_object_file(path)
            .map_err(|diagnostic| Error::codegen(diagnostic.to_string()))?;
        log::debug!(
            "emitted {} functions to {}:\n{}",
            funcs.len(),
            path.display(),
            backend.print_module()
        );
        Ok(())
    }
}
