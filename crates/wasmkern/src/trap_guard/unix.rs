use super::{current_record, GuardOutcome, GuardRecord};
use core::{mem, ptr};
use libc::{c_int, c_void, siginfo_t};
use std::{
    any::Any,
    boxed::Box,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicUsize, Ordering},
};

extern "C" {
    fn wasmkern_setjmp(
        buf_storage: *mut *const u8,
        body: extern "C" fn(*mut u8),
        payload: *mut u8,
    ) -> c_int;
    fn wasmkern_longjmp(jmp_buf: *const u8) -> !;
}

/// The signals raised by accesses to inaccessible pages.
const SIGNALS: [c_int; 2] = [libc::SIGSEGV, libc::SIGBUS];

/// The dispositions our handlers replaced, in the order of [`SIGNALS`].
///
/// `None` if installing the handler of a signal failed.
struct PreviousHandlers([Option<libc::sigaction>; 2]);

// Safety: `sigaction` is plain old data that is only read after installation.
unsafe impl Send for PreviousHandlers {}
unsafe impl Sync for PreviousHandlers {}

impl PreviousHandlers {
    fn get(&self, signum: c_int) -> Option<&libc::sigaction> {
        let index = SIGNALS.iter().position(|&signal| signal == signum)?;
        self.0[index].as_ref()
    }
}

static PREVIOUS: spin::Once<PreviousHandlers> = spin::Once::new();

/// The number of times the handlers were actually installed.
pub(super) static INSTALLATIONS: AtomicUsize = AtomicUsize::new(0);

pub(super) fn install_handlers() {
    PREVIOUS.call_once(|| {
        // Safety: installing signal handlers is process global but our
        //         handler forwards everything it does not own.
        let previous = SIGNALS.map(|signum| unsafe { install(signum) });
        INSTALLATIONS.fetch_add(1, Ordering::SeqCst);
        log::debug!("installed linear memory fault handlers");
        PreviousHandlers(previous)
    });
}

/// Returns `true` if a replaced disposition is our own handler.
#[cfg(test)]
pub(super) fn replaced_own_handler() -> bool {
    PREVIOUS.get().map_or(false, |previous| {
        previous
            .0
            .iter()
            .flatten()
            .any(|action| action.sa_sigaction == trap_handler as usize)
    })
}

/// Installs [`trap_handler`] for `signum` and returns the replaced disposition.
unsafe fn install(signum: c_int) -> Option<libc::sigaction> {
    let mut action: libc::sigaction = mem::zeroed();
    action.sa_sigaction = trap_handler as usize;
    // Stack overflows are reported through the thread's alternate signal
    // stack, so the handlers we forward to must be able to run on it.
    action.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER | libc::SA_ONSTACK;
    libc::sigemptyset(&mut action.sa_mask);
    let mut previous: libc::sigaction = mem::zeroed();
    if libc::sigaction(signum, &action, &mut previous) != 0 {
        log::warn!(
            "failed to install fault handler for signal {signum}: {}",
            std::io::Error::last_os_error()
        );
        return None;
    }
    Some(previous)
}

/// Returns the address whose access raised the signal.
#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_address(info: &siginfo_t) -> usize {
    info.si_addr() as usize
}

/// Returns the address whose access raised the signal.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_address(info: &siginfo_t) -> usize {
    info.si_addr as usize
}

/// Handles `SIGSEGV` and `SIGBUS`.
///
/// Must stay async-signal-safe: no allocation, no locks, no logging.
unsafe extern "C" fn trap_handler(signum: c_int, info: *mut siginfo_t, context: *mut c_void) {
    if let (Some(record), Some(info)) = (current_record().as_ref(), info.as_ref()) {
        let jmp_buf = record.jmp_buf.get();
        if !jmp_buf.is_null() && record.contains(fault_address(info)) {
            wasmkern_longjmp(jmp_buf);
        }
    }
    forward(signum, info, context);
}

/// Forwards a signal we do not own to the disposition we replaced.
///
/// A replaced default disposition is restored and the signal raised again,
/// so that both faults and signals sent by other processes terminate the
/// process as if no handler had been installed.
unsafe fn forward(signum: c_int, info: *mut siginfo_t, context: *mut c_void) {
    let Some(previous) = PREVIOUS.get().and_then(|previous| previous.get(signum)) else {
        let mut default: libc::sigaction = mem::zeroed();
        default.sa_sigaction = libc::SIG_DFL;
        restore_and_raise(signum, &default);
        return;
    };
    let handler = previous.sa_sigaction;
    if handler == libc::SIG_IGN {
        // Ignoring the fault would re-execute the faulting access forever.
        libc::_exit(128 + signum);
    }
    if handler == libc::SIG_DFL {
        restore_and_raise(signum, previous);
        return;
    }
    if previous.sa_flags & libc::SA_SIGINFO != 0 {
        let handler: extern "C" fn(c_int, *mut siginfo_t, *mut c_void) = mem::transmute(handler);
        handler(signum, info, context);
    } else {
        let handler: extern "C" fn(c_int) = mem::transmute(handler);
        handler(signum);
    }
}

/// Reinstalls `action` for `signum` and raises `signum` again.
///
/// Our handler runs with `SA_NODEFER`, so the signal is delivered right away.
unsafe fn restore_and_raise(signum: c_int, action: &libc::sigaction) {
    libc::sigaction(signum, action, ptr::null_mut());
    libc::raise(signum);
}

/// The closure and its panic handed through the checkpoint helper.
struct Payload<F> {
    body: Option<F>,
    panic: Option<Box<dyn Any + Send>>,
}

extern "C" fn call_body<F>(payload: *mut u8)
where
    F: FnOnce(),
{
    // Safety: `payload` is the `Payload<F>` passed to `wasmkern_setjmp` by
    //         `call_with_checkpoint` and outlives this call.
    let payload = unsafe { &mut *payload.cast::<Payload<F>>() };
    let Some(body) = payload.body.take() else {
        return;
    };
    // Unwinding through the C checkpoint is not allowed.
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(body)) {
        payload.panic = Some(panic);
    }
}

/// Runs `body` behind a checkpoint stored in `record`.
pub(super) fn call_with_checkpoint<F>(record: &GuardRecord, body: F) -> GuardOutcome
where
    F: FnOnce(),
{
    let mut payload = Payload {
        body: Some(body),
        panic: None,
    };
    // Safety: `call_body::<F>` matches the payload type and the checkpoint
    //         is unregistered again right after `wasmkern_setjmp` returned.
    let completed = unsafe {
        wasmkern_setjmp(
            record.jmp_buf.as_ptr(),
            call_body::<F>,
            ptr::addr_of_mut!(payload).cast(),
        )
    };
    record.jmp_buf.set(ptr::null());
    if let Some(panic) = payload.panic.take() {
        panic::resume_unwind(panic);
    }
    match completed {
        0 => GuardOutcome::Trapped,
        _ => GuardOutcome::Completed,
    }
}
