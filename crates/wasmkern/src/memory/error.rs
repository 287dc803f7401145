use core::fmt::{self, Display};

/// An error that may occur upon operating with [`LinearMemory`] instances.
///
/// [`LinearMemory`]: super::LinearMemory
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MemoryError {
    /// Tried to create a memory whose initial size exceeds its maximum size.
    InvalidMemoryType {
        /// The requested initial size in pages.
        initial_pages: u32,
        /// The requested maximum size in pages.
        maximum_pages: u32,
    },
    /// Tried to grow a memory beyond its maximum size.
    OutOfBoundsGrowth,
    /// The operating system refused to reserve the address space of a memory.
    ReservationFailed,
    /// The operating system refused to make reserved pages accessible.
    CommitFailed,
}

impl std::error::Error for MemoryError {}

impl Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidMemoryType {
                initial_pages,
                maximum_pages,
            } => write!(
                f,
                "tried to create memory with {initial_pages} initial pages but at most {maximum_pages} pages"
            ),
            Self::OutOfBoundsGrowth => {
                write!(f, "out of bounds memory growth")
            }
            Self::ReservationFailed => {
                write!(f, "failed to reserve address space for linear memory")
            }
            Self::CommitFailed => {
                write!(f, "failed to make reserved linear memory accessible")
            }
        }
    }
}
