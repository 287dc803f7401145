use super::*;
use std::{panic, thread, vec::Vec};

#[test]
fn outcome_raw_values() {
    assert_eq!(GuardOutcome::Completed.as_raw(), 0);
    assert_eq!(GuardOutcome::Trapped.as_raw(), 1);
    assert!(GuardOutcome::Trapped.is_trapped());
    assert!(!GuardOutcome::Completed.is_trapped());
}

#[test]
fn body_without_fault_completes() {
    let mut value = 0;
    let outcome = run_guarded(|| value = 42);
    assert_eq!(outcome, GuardOutcome::Completed);
    assert_eq!(value, 42);
}

#[test]
fn memory_registration_is_scoped() {
    let bytes = [0_u8; 16];
    assert_eq!(current_memory(), None);
    set_current_memory(bytes.as_ptr(), bytes.len());
    assert_eq!(current_memory(), None);
    run_guarded(|| {
        assert_eq!(current_memory(), None);
        set_current_memory(bytes.as_ptr(), bytes.len());
        assert_eq!(current_memory(), Some((bytes.as_ptr(), bytes.len())));
        run_guarded(|| assert_eq!(current_memory(), None));
        assert_eq!(current_memory(), Some((bytes.as_ptr(), bytes.len())));
    });
    assert_eq!(current_memory(), None);
}

#[test]
fn panics_propagate() {
    let result = panic::catch_unwind(|| {
        run_guarded(|| panic!("guarded body panicked"));
    });
    assert!(result.is_err());
    assert_eq!(current_memory(), None);
    assert_eq!(run_guarded(|| ()), GuardOutcome::Completed);
}

#[cfg(unix)]
mod unix {
    use super::*;
    use crate::trap_guard::sys;
    use core::sync::atomic::Ordering;

    /// An inaccessible anonymous mapping.
    struct Inaccessible {
        ptr: *mut u8,
        len: usize,
    }

    impl Inaccessible {
        fn new(len: usize) -> Self {
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
            Self {
                ptr: ptr.cast(),
                len,
            }
        }
    }

    impl Drop for Inaccessible {
        fn drop(&mut self) {
            unsafe { libc::munmap(self.ptr.cast(), self.len) };
        }
    }

    #[test]
    fn concurrent_installation_happens_once() {
        let threads: Vec<_> = (0..8).map(|_| thread::spawn(install_handlers)).collect();
        for thread in threads {
            thread.join().unwrap();
        }
        install_handlers();
        assert_eq!(sys::INSTALLATIONS.load(Ordering::SeqCst), 1);
        assert!(!sys::replaced_own_handler());
    }

    #[test]
    fn fault_in_registered_memory_traps() {
        let region = Inaccessible::new(1 << 16);
        let outcome = run_guarded(|| {
            set_current_memory(region.ptr, region.len);
            let value = unsafe { region.ptr.add(100).read_volatile() };
            panic!("read {value} from an inaccessible page");
        });
        assert_eq!(outcome, GuardOutcome::Trapped);
        assert_eq!(current_memory(), None);
        // Handlers and checkpoints stay usable after a trap.
        assert_eq!(run_guarded(|| ()), GuardOutcome::Completed);
        let outcome = run_guarded(|| {
            set_current_memory(region.ptr, region.len);
            unsafe { region.ptr.write_volatile(1) };
        });
        assert_eq!(outcome, GuardOutcome::Trapped);
    }

    #[test]
    fn inner_guard_intercepts_nested_fault() {
        let region = Inaccessible::new(1 << 16);
        let mut inner = None;
        let outer = run_guarded(|| {
            inner = Some(run_guarded(|| {
                set_current_memory(region.ptr, region.len);
                unsafe { region.ptr.read_volatile() };
            }));
        });
        assert_eq!(inner, Some(GuardOutcome::Trapped));
        assert_eq!(outer, GuardOutcome::Completed);
    }

    #[test]
    fn guards_of_other_threads_are_independent() {
        let threads: Vec<_> = (0..4)
            .map(|_| {
                thread::spawn(|| {
                    let region = Inaccessible::new(1 << 16);
                    run_guarded(|| {
                        set_current_memory(region.ptr, region.len);
                        unsafe { region.ptr.add(8).read_volatile() };
                    })
                })
            })
            .collect();
        for thread in threads {
            assert_eq!(thread.join().unwrap(), GuardOutcome::Trapped);
        }
    }
}
