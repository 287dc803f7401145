//! Turns faulting linear memory accesses into traps.
//!
//! Memories bounds checked by [`BoundsCheck::Guard`] skip explicit checks and
//! instead sit in front of a large inaccessible reservation. An out-of-bounds
//! access raises `SIGSEGV` or `SIGBUS`. The process wide signal handlers
//! installed by this module recognize faults inside the reservation of the
//! memory registered by the faulting thread and jump back to the checkpoint
//! established by [`run_guarded`]. All other faults are forwarded to the
//! previously installed handlers.
//!
//! On platforms without signal support [`run_guarded`] simply runs its body
//! and engines fall back to explicit bounds checks.
//!
//! # Note
//!
//! Jumping out of the faulting code skips the destructors of everything that
//! was live inside of the guarded body. Guarded bodies must therefore not own
//! resources that need to be dropped.
//!
//! [`BoundsCheck::Guard`]: crate::BoundsCheck::Guard

use core::{
    cell::Cell,
    ptr,
    sync::atomic::{compiler_fence, Ordering},
};

#[cfg(unix)]
mod unix;
#[cfg(unix)]
use self::unix as sys;

#[cfg(not(unix))]
mod fallback;
#[cfg(not(unix))]
use self::fallback as sys;

#[cfg(test)]
mod tests;

/// How a [`run_guarded`] body ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GuardOutcome {
    /// The body returned normally.
    Completed,
    /// A fault inside the registered memory reservation interrupted the body.
    Trapped,
}

impl GuardOutcome {
    /// Returns `0` for [`GuardOutcome::Completed`] and `1` for [`GuardOutcome::Trapped`].
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::Trapped => 1,
        }
    }

    /// Returns `true` if the body was interrupted by a trap.
    pub fn is_trapped(self) -> bool {
        matches!(self, Self::Trapped)
    }
}

/// The per activation state of a [`run_guarded`] call.
///
/// Lives on the stack of [`run_guarded`] and is reachable by the signal
/// handler through [`CURRENT`] while the body runs.
#[derive(Debug)]
struct GuardRecord {
    /// The checkpoint to jump back to, or null if none is established yet.
    jmp_buf: Cell<*const u8>,
    /// The start of the registered memory reservation.
    base: Cell<usize>,
    /// The size of the registered memory reservation in bytes.
    size: Cell<usize>,
}

impl GuardRecord {
    fn new() -> Self {
        Self {
            jmp_buf: Cell::new(ptr::null()),
            base: Cell::new(0),
            size: Cell::new(0),
        }
    }

    /// Returns `true` if `address` lies within the registered reservation.
    fn contains(&self, address: usize) -> bool {
        let base = self.base.get();
        let size = self.size.get();
        base != 0 && size != 0 && address >= base && address - base < size
    }
}

std::thread_local! {
    /// The innermost active [`GuardRecord`] of the thread.
    static CURRENT: Cell<*const GuardRecord> = const { Cell::new(ptr::null()) };
}

/// Returns the innermost active [`GuardRecord`] of the calling thread, or null.
fn current_record() -> *const GuardRecord {
    CURRENT.try_with(Cell::get).unwrap_or(ptr::null())
}

/// Makes a [`GuardRecord`] the current record while alive.
struct GuardScope {
    previous: *const GuardRecord,
}

impl GuardScope {
    fn enter(record: &GuardRecord) -> Self {
        let previous = CURRENT.with(|current| current.replace(record));
        compiler_fence(Ordering::SeqCst);
        Self { previous }
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        compiler_fence(Ordering::SeqCst);
        CURRENT.with(|current| current.set(self.previous));
    }
}

/// Installs the process wide fault handlers if not installed already.
///
/// Safe to call from any number of threads concurrently. The first caller
/// installs the handlers and stores the previously installed ones, every
/// other caller has no effect. [`run_guarded`] calls this implicitly.
pub fn install_handlers() {
    sys::install_handlers();
}

/// Runs `body` with a checkpoint that faults in the registered memory return to.
///
/// Returns [`GuardOutcome::Trapped`] if a fault inside the region registered
/// by [`set_current_memory`] interrupted `body` and [`GuardOutcome::Completed`]
/// otherwise. Faults outside the registered region are not intercepted.
///
/// Calls may be nested on the same thread; the innermost call intercepts.
/// Panics of `body` are propagated to the caller.
pub fn run_guarded<F>(body: F) -> GuardOutcome
where
    F: FnOnce(),
{
    sys::install_handlers();
    let record = GuardRecord::new();
    let _scope = GuardScope::enter(&record);
    let outcome = sys::call_with_checkpoint(&record, body);
    if outcome.is_trapped() {
        log::debug!("intercepted out-of-bounds linear memory access");
    }
    outcome
}

/// Registers `size` bytes starting at `base` as the memory reservation of the
/// innermost active [`run_guarded`] call of the calling thread.
///
/// Must be called again whenever the memory moves or its reservation changes.
/// Has no effect outside of [`run_guarded`].
pub fn set_current_memory(base: *const u8, size: usize) {
    // Safety: a non-null record is kept alive by its `GuardScope`, which
    //         unregisters it before `run_guarded` returns.
    if let Some(record) = unsafe { current_record().as_ref() } {
        record.base.set(base as usize);
        record.size.set(size);
        compiler_fence(Ordering::SeqCst);
    }
}

/// Returns the memory region registered with the innermost active
/// [`run_guarded`] call of the calling thread, if any.
pub fn current_memory() -> Option<(*const u8, usize)> {
    // Safety: see `set_current_memory`.
    let record = unsafe { current_record().as_ref() }?;
    match record.size.get() {
        0 => None,
        size => Some((record.base.get() as *const u8, size)),
    }
}
