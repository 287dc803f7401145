//! Faults the trap guard does not own must still terminate the process.
//!
//! Every test re-executes this test binary with [`CHILD_ENV`] set so that
//! only the child process crashes.
#![cfg(unix)]

use std::{
    env,
    hint::black_box,
    os::unix::process::ExitStatusExt,
    process::{Command, Output},
    ptr,
    thread,
};
use wasmkern::{
    trap_guard::{self, GuardOutcome},
    BoundsCheck,
    Config,
    Engine,
    LinearMemory,
};

const CHILD_ENV: &str = "WASMKERN_TRAP_GUARD_CHILD";

/// An inaccessible anonymous mapping.
fn inaccessible(len: usize) -> *mut u8 {
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            len,
            libc::PROT_NONE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            -1,
            0,
        )
    };
    assert_ne!(ptr, libc::MAP_FAILED);
    ptr.cast()
}

/// Runs the test named `name` in a child process.
fn spawn_child(name: &str) -> Output {
    Command::new(env::current_exe().unwrap())
        .args(["--exact", name, "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, name)
        .output()
        .unwrap()
}

/// Runs the test named `name` in a child process and returns its terminating signal.
fn run_child(name: &str) -> Option<i32> {
    spawn_child(name).status.signal()
}

/// Returns `true` if the current process is the child for `name`.
fn is_child(name: &str) -> bool {
    env::var(CHILD_ENV).is_ok_and(|child| child == name)
}

fn assert_killed_by_fault(signal: Option<i32>) {
    assert!(
        matches!(signal, Some(libc::SIGSEGV) | Some(libc::SIGBUS)),
        "expected the child to be killed by a fault, got {signal:?}"
    );
}

#[test]
fn fault_outside_guard_crashes() {
    const NAME: &str = "fault_outside_guard_crashes";
    if !is_child(NAME) {
        return assert_killed_by_fault(run_child(NAME));
    }
    trap_guard::install_handlers();
    let region = inaccessible(1 << 16);
    unsafe { region.read_volatile() };
    unreachable!("read from an inaccessible page");
}

#[test]
fn fault_outside_registered_memory_crashes() {
    const NAME: &str = "fault_outside_registered_memory_crashes";
    if !is_child(NAME) {
        return assert_killed_by_fault(run_child(NAME));
    }
    let registered = inaccessible(1 << 16);
    let other = inaccessible(1 << 16);
    let outcome = trap_guard::run_guarded(|| {
        trap_guard::set_current_memory(registered, 1 << 16);
        unsafe { other.write_volatile(1) };
    });
    unreachable!("fault outside of the registered memory ended with {outcome:?}");
}

#[test]
fn fault_with_disabled_guard_crashes() {
    const NAME: &str = "fault_with_disabled_guard_crashes";
    if !is_child(NAME) {
        return assert_killed_by_fault(run_child(NAME));
    }
    let region = inaccessible(1 << 16);
    let outcome = trap_guard::run_guarded(|| {
        trap_guard::set_current_memory(region, 1 << 16);
        trap_guard::set_current_memory(region, 0);
        unsafe { region.read_volatile() };
    });
    unreachable!("fault with a disabled guard ended with {outcome:?}");
}

fn reserved_memory() -> LinearMemory {
    let mut config = Config::default();
    config.bounds_checks(BoundsCheck::Guard);
    let memory = LinearMemory::new(&Engine::new(&config), 1, None).unwrap();
    assert!(memory.is_reserved());
    memory
}

#[test]
fn guard_pass_through_completes() {
    let mut memory = reserved_memory();
    let base = memory.base_ptr();
    let size = memory.reservation_size();
    let mut registered = None;
    let outcome = trap_guard::run_guarded(|| {
        trap_guard::set_current_memory(base, size);
        unsafe { base.add(memory.byte_len() - 1).write_volatile(7) };
        registered = trap_guard::current_memory();
    });
    assert_eq!(outcome, GuardOutcome::Completed);
    assert_eq!(outcome.as_raw(), 0);
    assert_eq!(registered, Some((base as *const u8, size)));
    assert_eq!(memory.data()[memory.byte_len() - 1], 7);
}

#[test]
fn guard_trips_right_past_committed_bytes() {
    let mut memory = reserved_memory();
    let base = memory.base_ptr();
    let size = memory.reservation_size();
    let committed = memory.byte_len();
    let outcome = trap_guard::run_guarded(|| {
        trap_guard::set_current_memory(base, size);
        unsafe { base.add(committed).read_volatile() };
    });
    assert_eq!(outcome, GuardOutcome::Trapped);
    assert_eq!(outcome.as_raw(), 1);
    // The process survives and the memory is untouched.
    assert_eq!(memory.byte_len(), committed);
    assert!(memory.data().iter().all(|&byte| byte == 0));
}

#[test]
fn fault_inside_registered_memory_is_intercepted() {
    let registered = inaccessible(1 << 16);
    let outcome = trap_guard::run_guarded(|| {
        trap_guard::set_current_memory(registered, 1 << 16);
        unsafe { registered.add(4096).read_volatile() };
    });
    assert_eq!(outcome, GuardOutcome::Trapped);
}

#[allow(unconditional_recursion)]
fn recurse(depth: u64) -> u64 {
    let frame = black_box([depth; 512]);
    recurse(frame[0] + 1) + frame[511]
}

#[test]
fn stack_overflow_is_still_reported() {
    const NAME: &str = "stack_overflow_is_still_reported";
    if !is_child(NAME) {
        let output = spawn_child(NAME);
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert_eq!(output.status.signal(), Some(libc::SIGABRT), "{stderr}");
        assert!(stderr.contains("has overflowed its stack"), "{stderr}");
        return;
    }
    trap_guard::install_handlers();
    let overflow = thread::Builder::new()
        .stack_size(1 << 20)
        .spawn(|| recurse(0))
        .unwrap();
    let depth = overflow.join();
    unreachable!("recursion ended with {depth:?}");
}

#[test]
fn raised_signal_with_default_disposition_terminates() {
    const NAME: &str = "raised_signal_with_default_disposition_terminates";
    if !is_child(NAME) {
        assert_eq!(run_child(NAME), Some(libc::SIGSEGV));
        return;
    }
    unsafe { libc::signal(libc::SIGSEGV, libc::SIG_DFL) };
    trap_guard::install_handlers();
    unsafe { libc::raise(libc::SIGSEGV) };
    unreachable!("survived a raised SIGSEGV");
}
