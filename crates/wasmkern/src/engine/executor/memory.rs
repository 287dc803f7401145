use super::{ExecState, Md, Ms};
use crate::trap_guard;
use wasmkern_core::{hint, TrapCode, UntypedVal};

/// Returns the effective address of an access at `ptr + offset`.
///
/// Computed in `u64` since the sum exceeds `usize` on 32-bit targets.
#[inline(always)]
fn effective_address(ptr: UntypedVal, offset: u16) -> u64 {
    u64::from(u32::from(ptr)) + u64::from(offset)
}

/// Returns `true` if `N` bytes at `address` are not within the `ms` accessible bytes.
#[inline(always)]
fn is_out_of_bounds<const N: usize>(address: u64, ms: Ms) -> bool {
    address + N as u64 > ms as u64
}

/// Loads `N` bytes from `ptr + offset`.
///
/// # Errors
///
/// If `explicit_checks` is set and the access is out of bounds.
///
/// # Safety
///
/// Without explicit checks the caller must guarantee that an out-of-bounds
/// access faults inside a guarded reservation starting at `md`.
#[inline(always)]
pub unsafe fn load<const N: usize>(
    md: Md,
    ms: Ms,
    explicit_checks: bool,
    ptr: UntypedVal,
    offset: u16,
) -> Result<[u8; N], TrapCode> {
    let address = effective_address(ptr, offset);
    if explicit_checks && hint::unlikely(is_out_of_bounds::<N>(address, ms)) {
        return Err(TrapCode::MemoryOutOfBounds);
    }
    // Without explicit checks `md` leads a reservation of more than 4 GiB,
    // which only exists where `usize` is 64 bits wide.
    Ok(md.add(address as usize).cast::<[u8; N]>().read_unaligned())
}

/// Stores `bytes` to `ptr + offset`.
///
/// # Errors
///
/// If `explicit_checks` is set and the access is out of bounds.
///
/// # Safety
///
/// Without explicit checks the caller must guarantee that an out-of-bounds
/// access faults inside a guarded reservation starting at `md`.
#[inline(always)]
pub unsafe fn store<const N: usize>(
    md: Md,
    ms: Ms,
    explicit_checks: bool,
    ptr: UntypedVal,
    offset: u16,
    bytes: [u8; N],
) -> Result<(), TrapCode> {
    let address = effective_address(ptr, offset);
    if explicit_checks && hint::unlikely(is_out_of_bounds::<N>(address, ms)) {
        return Err(TrapCode::MemoryOutOfBounds);
    }
    md.add(address as usize).cast::<[u8; N]>().write_unaligned(bytes);
    Ok(())
}

/// Grows the linear memory of `state` by `delta` pages.
///
/// Returns the previous size in pages, or `u32::MAX` on failure, together
/// with the new memory base and size.
///
/// Keeps the region registered with the trap guard in sync with the memory.
#[cold]
pub fn grow(state: &mut ExecState, delta: u32, md: Md, ms: Ms) -> (u32, Md, Ms) {
    let Some(memory) = state.memory.as_deref_mut() else {
        return (u32::MAX, md, ms);
    };
    let old_pages = memory.grow(delta).unwrap_or(u32::MAX);
    let md = memory.base_ptr();
    let ms = memory.byte_len();
    if state.guarded {
        trap_guard::set_current_memory(md, memory.reservation_size());
    }
    (old_pages, md, ms)
}

/// Returns the size of the linear memory in pages.
#[inline]
pub fn size(ms: Ms) -> u32 {
    (ms / wasmkern_core::WASM_PAGE_SIZE) as u32
}
