use core::fmt::{self, Display};

/// A register index of a register file.
///
/// Registers are addressed with 16 bits which is plenty for the number of
/// simultaneously live values of a single function activation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Reg(u16);

impl From<u16> for Reg {
    fn from(index: u16) -> Self {
        Self(index)
    }
}

impl From<Reg> for u16 {
    fn from(reg: Reg) -> Self {
        reg.0
    }
}

impl Reg {
    /// Returns the index of the register as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A signed branch offset counted in instructions.
///
/// A taken branch at index `i` continues at `i + 1 + offset`, so an offset
/// of `0` behaves exactly like falling through.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BranchOffset(i32);

impl From<i32> for BranchOffset {
    fn from(offset: i32) -> Self {
        Self(offset)
    }
}

impl BranchOffset {
    /// Returns the offset as `i32`.
    #[inline]
    pub fn to_i32(self) -> i32 {
        self.0
    }

    /// Returns the index of the instruction a taken branch at `index` continues at.
    ///
    /// Returns `None` if the target cannot be represented.
    pub fn target(self, index: usize) -> Option<usize> {
        let next = index.checked_add(1)?;
        let offset = isize::try_from(self.0).ok()?;
        next.checked_add_signed(offset)
    }
}

impl Display for BranchOffset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}
