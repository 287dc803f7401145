use core::fmt::{self, Display};

/// Error codes describing why an execution trapped.
///
/// A trap ends the current execution. The register file contents after a trap
/// are unspecified.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TrapCode {
    /// A trap instruction was executed, as emitted for Wasm `unreachable`.
    UnreachableCodeReached = 0,
    /// A linear memory access went past the accessible size of the memory.
    ///
    /// With guard based bounds checking this is reported by the trap guard
    /// after it intercepted the resulting memory protection fault.
    MemoryOutOfBounds = 1,
    /// The register file handed to an execution is smaller than the
    /// number of registers the executed function uses.
    BadRegisterFile = 2,
}

impl TrapCode {
    /// Returns the trap message as specified by the WebAssembly specification
    /// where one exists.
    pub fn trap_message(&self) -> &'static str {
        match self {
            Self::UnreachableCodeReached => "wasm `unreachable` instruction executed",
            Self::MemoryOutOfBounds => "out of bounds memory access",
            Self::BadRegisterFile => "register file too small for function",
        }
    }
}

impl Display for TrapCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.trap_message())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TrapCode {}
