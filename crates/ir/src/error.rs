use crate::BranchOffset;
use core::fmt::{self, Display};

/// Errors found while checking the shape of an instruction sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The instruction sequence has no instructions.
    Empty,
    /// The last instruction is neither `return` nor `trap`.
    MissingTerminator,
    /// A branch at `index` targets an instruction outside the sequence.
    BranchOutOfBounds {
        /// The index of the offending branch.
        index: usize,
        /// The branch offset of the offending branch.
        offset: BranchOffset,
    },
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("instruction sequence is empty"),
            Self::MissingTerminator => {
                f.write_str("instruction sequence does not end with a terminal instruction")
            }
            Self::BranchOutOfBounds { index, offset } => {
                write!(f, "branch at {index} with offset {offset} leaves the instruction sequence")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodingError {}
