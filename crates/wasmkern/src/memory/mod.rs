mod error;
#[cfg(unix)]
mod reserved;

#[cfg(test)]
mod tests;

pub use self::error::MemoryError;
#[cfg(unix)]
use self::reserved::ReservedMemory;
use crate::{BoundsCheck, Engine};
use std::vec::Vec;
use wasmkern_core::{WASM32_MAX_PAGES, WASM_PAGE_SIZE};

/// The size of the inaccessible region behind the largest possible wasm32 memory.
///
/// Covers the largest static offset plus the widest access of any load or store.
const GUARD_SIZE: u64 = 2 * WASM_PAGE_SIZE as u64;

/// Returns the number of bytes reserved for a linear memory that is bounds
/// checked by guard pages.
///
/// This covers the full 32-bit address space plus a trailing guard region so
/// that any effective address a wasm32 load or store can compute lies inside
/// the reservation.
pub fn wasm32_reservation_size() -> u64 {
    (1_u64 << 32) + GUARD_SIZE
}

/// Returns the number of bytes of `pages` linear memory pages.
fn pages_to_bytes(pages: u32) -> Option<usize> {
    usize::try_from(u64::from(pages) * WASM_PAGE_SIZE as u64).ok()
}

/// The storage of a [`LinearMemory`].
#[derive(Debug)]
enum MemoryBacking {
    /// Heap storage that may move whenever the memory grows.
    Heap(Vec<u8>),
    /// A fixed reservation with guard pages behind the accessible bytes.
    #[cfg(unix)]
    Reserved(ReservedMemory),
}

/// A byte-addressable linear memory sized in pages of [`WASM_PAGE_SIZE`] bytes.
///
/// Depending on the [`BoundsCheck`] mode of the [`Engine`] it was created for
/// a [`LinearMemory`] is either heap allocated or placed at the start of a
/// reservation of [`wasm32_reservation_size`] bytes.
#[derive(Debug)]
pub struct LinearMemory {
    /// The underlying bytes.
    backing: MemoryBacking,
    /// The current size in pages.
    size_pages: u32,
    /// The maximum size in pages.
    maximum_pages: u32,
}

impl LinearMemory {
    /// Creates a new [`LinearMemory`] suitable for `engine`.
    ///
    /// If `maximum_pages` is `None` the memory may grow up to [`WASM32_MAX_PAGES`].
    ///
    /// # Errors
    ///
    /// - If `initial_pages` exceeds the maximum.
    /// - If the address space reservation or its initial commit fails.
    pub fn new(
        engine: &Engine,
        initial_pages: u32,
        maximum_pages: Option<u32>,
    ) -> Result<Self, MemoryError> {
        let maximum_pages = maximum_pages.unwrap_or(WASM32_MAX_PAGES);
        if initial_pages > maximum_pages || maximum_pages > WASM32_MAX_PAGES {
            return Err(MemoryError::InvalidMemoryType {
                initial_pages,
                maximum_pages,
            });
        }
        let initial_len = pages_to_bytes(initial_pages).ok_or(MemoryError::OutOfBoundsGrowth)?;
        let backing = match engine.config().get_bounds_checks() {
            #[cfg(unix)]
            BoundsCheck::Guard => {
                let reservation = usize::try_from(wasm32_reservation_size())
                    .map_err(|_| MemoryError::ReservationFailed)?;
                let mut reserved = ReservedMemory::new(reservation)?;
                reserved.commit(initial_len)?;
                MemoryBacking::Reserved(reserved)
            }
            _ => MemoryBacking::Heap(vec![0x00_u8; initial_len]),
        };
        Ok(Self {
            backing,
            size_pages: initial_pages,
            maximum_pages,
        })
    }

    /// Returns `true` if the memory is placed in front of guard pages.
    pub fn is_reserved(&self) -> bool {
        match &self.backing {
            MemoryBacking::Heap(_) => false,
            #[cfg(unix)]
            MemoryBacking::Reserved(_) => true,
        }
    }

    /// Returns the current size of the memory in pages.
    pub fn size_pages(&self) -> u32 {
        self.size_pages
    }

    /// Returns the maximum size of the memory in pages.
    pub fn maximum_pages(&self) -> u32 {
        self.maximum_pages
    }

    /// Returns the number of accessible bytes.
    pub fn byte_len(&self) -> usize {
        self.data().len()
    }

    /// Returns the number of bytes in which faults are attributed to this memory.
    ///
    /// This is `0` for memories that are not reserved.
    pub fn reservation_size(&self) -> usize {
        match &self.backing {
            MemoryBacking::Heap(_) => 0,
            #[cfg(unix)]
            MemoryBacking::Reserved(reserved) => reserved.reservation_size(),
        }
    }

    /// Returns a pointer to the first byte of the memory.
    ///
    /// The pointer stays valid until the memory is grown or dropped.
    /// Reserved memories never move when grown.
    pub fn base_ptr(&mut self) -> *mut u8 {
        match &mut self.backing {
            MemoryBacking::Heap(bytes) => bytes.as_mut_ptr(),
            #[cfg(unix)]
            MemoryBacking::Reserved(reserved) => reserved.base_ptr(),
        }
    }

    /// Returns a shared slice to the accessible bytes of the memory.
    pub fn data(&self) -> &[u8] {
        match &self.backing {
            MemoryBacking::Heap(bytes) => bytes,
            #[cfg(unix)]
            MemoryBacking::Reserved(reserved) => reserved.data(),
        }
    }

    /// Returns an exclusive slice to the accessible bytes of the memory.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.backing {
            MemoryBacking::Heap(bytes) => bytes,
            #[cfg(unix)]
            MemoryBacking::Reserved(reserved) => reserved.data_mut(),
        }
    }

    /// Grows the memory by `delta` pages.
    ///
    /// Returns the size in pages before the growth. New bytes are zeroed.
    ///
    /// # Errors
    ///
    /// - If the memory would exceed its maximum size.
    /// - If the operating system refuses to commit the new pages.
    pub fn grow(&mut self, delta: u32) -> Result<u32, MemoryError> {
        let old_pages = self.size_pages;
        let new_pages = old_pages
            .checked_add(delta)
            .filter(|&new_pages| new_pages <= self.maximum_pages)
            .ok_or(MemoryError::OutOfBoundsGrowth)?;
        if delta == 0 {
            return Ok(old_pages);
        }
        let new_len = pages_to_bytes(new_pages).ok_or(MemoryError::OutOfBoundsGrowth)?;
        match &mut self.backing {
            MemoryBacking::Heap(bytes) => bytes.resize(new_len, 0x00_u8),
            #[cfg(unix)]
            MemoryBacking::Reserved(reserved) => reserved.commit(new_len)?,
        }
        self.size_pages = new_pages;
        log::trace!("grew linear memory from {old_pages} to {new_pages} pages");
        Ok(old_pages)
    }
}
