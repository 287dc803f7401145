//! The executors of the three dispatch strategies.
//!
//! Every strategy threads the same execution context through the instructions
//! of a function body:
//!
//! - [`Sp`]: the register file of the executed function.
//! - [`Pc`]: the currently executed instruction.
//! - [`Md`]: the base address of the linear memory.
//! - [`Ms`]: the accessible size of the linear memory in bytes.
//! - [`ExecState`]: everything that is rarely accessed.
//!
//! The first four are kept in locals (and thus machine registers) for the
//! whole execution and only written back when they change.

pub use self::direct::{resolve_handlers, Handler, HandlerTable, LinkedCode, LinkedInstr, Next};
use super::DispatchStrategy;
use crate::{FuncBody, LinearMemory};
use core::marker::PhantomData;
use rand::RngCore;
use wasmkern_core::{TrapCode, UntypedVal};
use wasmkern_ir::{BranchOffset, Reg};

mod direct;
mod instrs;
mod memory;
mod switch;
mod token;

/// The base address of the linear memory.
///
/// Null if there is no linear memory.
pub type Md = *mut u8;

/// The accessible size of the linear memory in bytes.
pub type Ms = usize;

/// The register file of the executed function.
pub type Sp = FrameRegisters;

/// The currently executed linked instruction.
pub type Pc = InstructionPtr<LinkedInstr>;

/// Executes `func` with the given `strategy`.
///
/// # Safety
///
/// - `registers` must hold at least `func.len_registers()` values.
/// - `md` and `ms` must describe the accessible bytes of `state`'s memory.
/// - If `state` is guarded the executing thread must run inside of
///   [`run_guarded`](crate::trap_guard::run_guarded) with `md` registered
///   as current memory.
pub unsafe fn execute(
    strategy: DispatchStrategy,
    func: &FuncBody,
    registers: &mut [UntypedVal],
    md: Md,
    ms: Ms,
    state: &mut ExecState,
) -> Result<(), TrapCode> {
    debug_assert!(registers.len() >= func.len_registers());
    match strategy {
        DispatchStrategy::Switch => switch::execute(func.instrs(), registers, md, ms, state),
        DispatchStrategy::Token => token::execute(func.instrs(), registers, md, ms, state),
        DispatchStrategy::Direct => direct::execute(func.linked(), registers, md, ms, state),
    }
}

/// The rarely accessed parts of an execution.
pub struct ExecState<'a> {
    /// The random source of `random.get`.
    rng: &'a mut dyn RngCore,
    /// The linear memory, if any.
    memory: Option<&'a mut LinearMemory>,
    /// Whether memory accesses rely on the trap guard instead of explicit checks.
    guarded: bool,
    /// The trap that halted a direct threaded execution.
    trap: Option<TrapCode>,
}

impl<'a> ExecState<'a> {
    /// Creates a new [`ExecState`].
    pub fn new(
        rng: &'a mut dyn RngCore,
        memory: Option<&'a mut LinearMemory>,
        guarded: bool,
    ) -> Self {
        Self {
            rng,
            memory,
            guarded,
            trap: None,
        }
    }

    /// Returns the trap that halted the execution, if any.
    pub fn trap(&self) -> Option<TrapCode> {
        self.trap
    }

    /// Returns `true` if memory accesses need explicit bounds checks.
    #[inline(always)]
    fn explicit_checks(&self) -> bool {
        !self.guarded
    }

    /// Returns the next value of the random source.
    #[inline]
    fn next_random(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

/// The register file of a function activation.
///
/// This is a thin pointer so that it fits into a single machine register.
#[derive(Debug, Copy, Clone)]
pub struct FrameRegisters {
    ptr: *mut UntypedVal,
}

impl FrameRegisters {
    /// Creates a new [`FrameRegisters`] for `registers`.
    pub fn new(registers: &mut [UntypedVal]) -> Self {
        Self {
            ptr: registers.as_mut_ptr(),
        }
    }

    /// Returns the [`UntypedVal`] at the given [`Reg`].
    ///
    /// # Safety
    ///
    /// It is the callers responsibility to provide a [`Reg`]
    /// that does not access the underlying register file out of bounds.
    #[inline(always)]
    pub unsafe fn get(self, register: Reg) -> UntypedVal {
        *self.ptr.add(register.index())
    }

    /// Sets the value of the `register` to `value`.
    ///
    /// # Safety
    ///
    /// It is the callers responsibility to provide a [`Reg`]
    /// that does not access the underlying register file out of bounds.
    #[inline(always)]
    pub unsafe fn set(self, register: Reg, value: UntypedVal) {
        *self.ptr.add(register.index()) = value;
    }
}

/// A pointer to the currently executed instruction of a sequence.
pub struct InstructionPtr<T> {
    ptr: *const T,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for InstructionPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InstructionPtr<T> {}

impl<T> core::fmt::Debug for InstructionPtr<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_tuple("InstructionPtr").field(&self.ptr).finish()
    }
}

impl<T> InstructionPtr<T> {
    /// Creates a new [`InstructionPtr`] pointing at the first of `instrs`.
    #[inline]
    pub fn new(instrs: &[T]) -> Self {
        Self {
            ptr: instrs.as_ptr(),
            marker: PhantomData,
        }
    }

    /// Returns a shared reference to the currently pointed at instruction.
    ///
    /// # Safety
    ///
    /// The pointer must point into the sequence it was created from and that
    /// sequence must still be alive.
    #[inline(always)]
    pub unsafe fn get(&self) -> &T {
        &*self.ptr
    }

    /// Moves the pointer by `delta` instructions.
    ///
    /// # Safety
    ///
    /// The caller must not move the pointer past the end of its sequence.
    #[inline(always)]
    pub unsafe fn add(&mut self, delta: usize) {
        self.ptr = self.ptr.add(delta);
    }

    /// Moves the pointer to the target of a taken branch by `offset`.
    ///
    /// # Safety
    ///
    /// The branch target must lie within the sequence, as guaranteed for
    /// validated instruction sequences.
    #[inline(always)]
    pub unsafe fn branch(&mut self, offset: BranchOffset) {
        self.ptr = self.ptr.offset(1 + offset.to_i32() as isize);
    }
}
