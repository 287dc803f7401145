/// Panics with the given message in debug builds and is undefined behavior otherwise.
///
/// # Safety
///
/// The caller must guarantee that the macro invocation is never reached.
macro_rules! unreachable_unchecked {
    ($($arg:tt)*) => {{
        if ::core::cfg!(debug_assertions) {
            ::core::unreachable!($($arg)*)
        } else {
            ::core::hint::unreachable_unchecked()
        }
    }};
}
pub(crate) use unreachable_unchecked;
