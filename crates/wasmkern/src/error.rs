use crate::{errors::EncodingError, MemoryError, TrapCode};
use std::{boxed::Box, fmt, string::String};

/// The generic `wasmkern` root error type.
#[derive(Debug)]
pub struct Error {
    /// The underlying kind of the error and its specific information.
    kind: Box<ErrorKind>,
}

#[test]
fn error_size() {
    use core::mem;
    assert_eq!(mem::size_of::<Error>(), 8);
}

impl Error {
    /// Creates a new [`Error`] from the [`ErrorKind`].
    fn from_kind(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Creates a new [`Error`] reported by a code generation backend.
    pub fn codegen(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Codegen(message.into()))
    }

    /// Returns a shared reference to the [`ErrorKind`] of the [`Error`].
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Returns the [`TrapCode`] if the [`Error`] is a trap.
    pub fn as_trap_code(&self) -> Option<TrapCode> {
        self.kind().as_trap_code()
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

/// An error that may occur upon operating on `wasmkern` function bodies and memories.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A trap as defined by the WebAssembly specification.
    Trap(TrapCode),
    /// A linear memory error.
    Memory(MemoryError),
    /// An instruction sequence error.
    Encoding(EncodingError),
    /// A code generation backend rejected or failed to emit its input.
    Codegen(String),
}

impl ErrorKind {
    /// Returns a reference to [`TrapCode`] if [`ErrorKind`] is a [`TrapCode`].
    pub fn as_trap_code(&self) -> Option<TrapCode> {
        match self {
            Self::Trap(trap_code) => Some(*trap_code),
            _ => None,
        }
    }
}

impl std::error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Trap(error) => fmt::Display::fmt(error, f),
            Self::Memory(error) => fmt::Display::fmt(error, f),
            Self::Encoding(error) => fmt::Display::fmt(error, f),
            Self::Codegen(message) => write!(f, "code generation failed: {message}"),
        }
    }
}

macro_rules! impl_from {
    ( $( impl From<$from:ident> for Error::$name:ident );* $(;)? ) => {
        $(
            impl From<$from> for Error {
                #[inline]
                #[cold]
                fn from(error: $from) -> Self {
                    Self::from_kind(ErrorKind::$name(error))
                }
            }
        )*
    }
}
impl_from! {
    impl From<TrapCode> for Error::Trap;
    impl From<MemoryError> for Error::Memory;
    impl From<EncodingError> for Error::Encoding;
}
