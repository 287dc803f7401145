//! Stable replacements for the branch prediction hints of `core::intrinsics`.

/// Indicates that the calling code path is unlikely to be taken.
#[cold]
#[inline]
pub fn cold() {}

/// Returns `condition` and tells the optimizer that it is likely `true`.
#[inline]
pub fn likely(condition: bool) -> bool {
    if !condition {
        cold()
    }
    condition
}

/// Returns `condition` and tells the optimizer that it is likely `false`.
#[inline]
pub fn unlikely(condition: bool) -> bool {
    if condition {
        cold()
    }
    condition
}
