use super::MemoryError;
use core::{ptr::NonNull, slice};
use std::io;

#[cfg(any(target_os = "linux", target_os = "android"))]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON | libc::MAP_NORESERVE;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const MAP_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

/// A fixed address space reservation of which a prefix is accessible.
///
/// The reservation is created inaccessible and its prefix is made readable
/// and writable on demand. The base address never changes.
#[derive(Debug)]
pub struct ReservedMemory {
    /// The start of the reservation.
    base: NonNull<u8>,
    /// The size of the whole reservation in bytes.
    reservation: usize,
    /// The size of the accessible prefix in bytes.
    committed: usize,
}

// Safety: `ReservedMemory` owns its mapping exclusively and only hands out
//         access to it through `&self` and `&mut self` methods.
unsafe impl Send for ReservedMemory {}
unsafe impl Sync for ReservedMemory {}

impl ReservedMemory {
    /// Reserves `reservation` bytes of inaccessible address space.
    ///
    /// # Errors
    ///
    /// If the operating system refuses the reservation.
    pub fn new(reservation: usize) -> Result<Self, MemoryError> {
        // Safety: an anonymous mapping at an address chosen by the kernel
        //         does not alias any existing Rust allocation.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                reservation,
                libc::PROT_NONE,
                MAP_FLAGS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            log::debug!(
                "failed to reserve {reservation} bytes: {}",
                io::Error::last_os_error()
            );
            return Err(MemoryError::ReservationFailed);
        }
        let base = NonNull::new(ptr.cast::<u8>()).ok_or(MemoryError::ReservationFailed)?;
        Ok(Self {
            base,
            reservation,
            committed: 0,
        })
    }

    /// Makes the first `len` bytes of the reservation accessible.
    ///
    /// Does nothing if at least `len` bytes are already accessible.
    ///
    /// # Errors
    ///
    /// - If `len` exceeds the reservation.
    /// - If the operating system refuses to change the page protection.
    pub fn commit(&mut self, len: usize) -> Result<(), MemoryError> {
        if len <= self.committed {
            return Ok(());
        }
        if len > self.reservation {
            return Err(MemoryError::OutOfBoundsGrowth);
        }
        // Safety: `self.committed < len <= self.reservation`, so the range
        //         lies entirely within our own mapping.
        let result = unsafe {
            let start = self.base.as_ptr().add(self.committed);
            libc::mprotect(
                start.cast(),
                len - self.committed,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if result != 0 {
            log::debug!(
                "failed to commit {len} bytes: {}",
                io::Error::last_os_error()
            );
            return Err(MemoryError::CommitFailed);
        }
        self.committed = len;
        Ok(())
    }

    /// Returns the start of the reservation.
    pub fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Returns the size of the whole reservation in bytes.
    pub fn reservation_size(&self) -> usize {
        self.reservation
    }

    /// Returns the accessible prefix of the reservation.
    pub fn data(&self) -> &[u8] {
        // Safety: the first `committed` bytes are readable and writable and
        //         owned by `self`.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.committed) }
    }

    /// Returns the accessible prefix of the reservation.
    pub fn data_mut(&mut self) -> &mut [u8] {
        // Safety: the first `committed` bytes are readable and writable and
        //         exclusively owned by `self`.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.committed) }
    }
}

impl Drop for ReservedMemory {
    fn drop(&mut self) {
        // Safety: the mapping was created by `ReservedMemory::new` with exactly
        //         this base and size and nothing refers to it anymore.
        let result = unsafe { libc::munmap(self.base.as_ptr().cast(), self.reservation) };
        if result != 0 {
            log::warn!(
                "failed to release linear memory reservation: {}",
                io::Error::last_os_error()
            );
        }
    }
}
