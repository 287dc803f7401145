use crate::{core::TrapCode, BranchOffset, Reg};
use core::fmt::{self, Display};

/// A single `wasmkern` instruction.
///
/// Each variant carries exactly the operands of its operation, so an operand
/// can never be read with the shape of another opcode.
///
/// # Encoding
///
/// - Register operands are [`Reg`] indices into the register file.
/// - Immediates are embedded directly into the instruction.
/// - Branch offsets are relative to the instruction following the branch.
///
/// The whole enum occupies at most two machine words.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Writes the next value of the store's random source into `result`.
    RandomGet {
        result: Reg,
    },
    /// `result = value`
    Const32 {
        result: Reg,
        value: u32,
    },
    /// `result = value`
    Copy {
        result: Reg,
        value: Reg,
    },
    /// `result = lhs + rhs` with wrapping 32-bit semantics.
    I32Add {
        result: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `result = lhs - rhs` with wrapping 32-bit semantics.
    I32Sub {
        result: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `result = lhs * rhs` with wrapping 32-bit semantics.
    I32Mul {
        result: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `result = rhs + lhs` with wrapping 32-bit semantics and an immediate `rhs`.
    I32AddImm {
        result: Reg,
        lhs: Reg,
        rhs: u32,
    },
    /// `result = lhs == rhs`
    I32Eq {
        result: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `result = lhs <u rhs`
    I32LtU {
        result: Reg,
        lhs: Reg,
        rhs: Reg,
    },
    /// `result = lhs <u rhs` with an immediate `rhs`.
    I32LtUImm {
        result: Reg,
        lhs: Reg,
        rhs: u32,
    },
    /// Unconditionally branches by `offset`.
    Branch {
        offset: BranchOffset,
    },
    /// Branches by `offset` if `condition` is not zero.
    BranchNez {
        condition: Reg,
        offset: BranchOffset,
    },
    /// Branches by `offset` if `condition` is zero.
    BranchEqz {
        condition: Reg,
        offset: BranchOffset,
    },
    /// Loads a little-endian `i32` from linear memory at `ptr + offset`.
    I32Load {
        result: Reg,
        ptr: Reg,
        offset: u16,
    },
    /// Loads a byte from linear memory at `ptr + offset` and zero-extends it.
    I32Load8U {
        result: Reg,
        ptr: Reg,
        offset: u16,
    },
    /// Stores `value` as little-endian `i32` to linear memory at `ptr + offset`.
    I32Store {
        ptr: Reg,
        offset: u16,
        value: Reg,
    },
    /// Stores the low byte of `value` to linear memory at `ptr + offset`.
    I32Store8 {
        ptr: Reg,
        offset: u16,
        value: Reg,
    },
    /// Writes the size of the linear memory in pages to `result`.
    MemorySize {
        result: Reg,
    },
    /// Grows the linear memory by `delta` pages.
    ///
    /// Writes the previous size in pages to `result`, or `u32::MAX` if the
    /// memory could not be grown.
    MemoryGrow {
        result: Reg,
        delta: Reg,
    },
    /// Traps with `trap_code`.
    Trap {
        trap_code: TrapCode,
    },
    /// Ends the execution of the function.
    Return,
}

/// The discriminant of an [`Instruction`].
///
/// Dispatch tables are indexed by [`Opcode`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Opcode {
    RandomGet,
    Const32,
    Copy,
    I32Add,
    I32Sub,
    I32Mul,
    I32AddImm,
    I32Eq,
    I32LtU,
    I32LtUImm,
    Branch,
    BranchNez,
    BranchEqz,
    I32Load,
    I32Load8U,
    I32Store,
    I32Store8,
    MemorySize,
    MemoryGrow,
    Trap,
    Return,
}

impl Opcode {
    /// The number of distinct [`Opcode`]s.
    pub const COUNT: usize = Self::Return as usize + 1;

    /// All [`Opcode`]s in discriminant order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::RandomGet,
        Self::Const32,
        Self::Copy,
        Self::I32Add,
        Self::I32Sub,
        Self::I32Mul,
        Self::I32AddImm,
        Self::I32Eq,
        Self::I32LtU,
        Self::I32LtUImm,
        Self::Branch,
        Self::BranchNez,
        Self::BranchEqz,
        Self::I32Load,
        Self::I32Load8U,
        Self::I32Store,
        Self::I32Store8,
        Self::MemorySize,
        Self::MemoryGrow,
        Self::Trap,
        Self::Return,
    ];

    /// Returns the mnemonic of the [`Opcode`].
    pub fn name(self) -> &'static str {
        match self {
            Self::RandomGet => "random.get",
            Self::Const32 => "const32",
            Self::Copy => "copy",
            Self::I32Add => "i32.add",
            Self::I32Sub => "i32.sub",
            Self::I32Mul => "i32.mul",
            Self::I32AddImm => "i32.add_imm",
            Self::I32Eq => "i32.eq",
            Self::I32LtU => "i32.lt_u",
            Self::I32LtUImm => "i32.lt_u_imm",
            Self::Branch => "br",
            Self::BranchNez => "br_nez",
            Self::BranchEqz => "br_eqz",
            Self::I32Load => "i32.load",
            Self::I32Load8U => "i32.load8_u",
            Self::I32Store => "i32.store",
            Self::I32Store8 => "i32.store8",
            Self::MemorySize => "memory.size",
            Self::MemoryGrow => "memory.grow",
            Self::Trap => "trap",
            Self::Return => "return",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Instruction {
    /// Returns the [`Opcode`] of the [`Instruction`].
    #[inline]
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::RandomGet { .. } => Opcode::RandomGet,
            Self::Const32 { .. } => Opcode::Const32,
            Self::Copy { .. } => Opcode::Copy,
            Self::I32Add { .. } => Opcode::I32Add,
            Self::I32Sub { .. } => Opcode::I32Sub,
            Self::I32Mul { .. } => Opcode::I32Mul,
            Self::I32AddImm { .. } => Opcode::I32AddImm,
            Self::I32Eq { .. } => Opcode::I32Eq,
            Self::I32LtU { .. } => Opcode::I32LtU,
            Self::I32LtUImm { .. } => Opcode::I32LtUImm,
            Self::Branch { .. } => Opcode::Branch,
            Self::BranchNez { .. } => Opcode::BranchNez,
            Self::BranchEqz { .. } => Opcode::BranchEqz,
            Self::I32Load { .. } => Opcode::I32Load,
            Self::I32Load8U { .. } => Opcode::I32Load8U,
            Self::I32Store { .. } => Opcode::I32Store,
            Self::I32Store8 { .. } => Opcode::I32Store8,
            Self::MemorySize { .. } => Opcode::MemorySize,
            Self::MemoryGrow { .. } => Opcode::MemoryGrow,
            Self::Trap { .. } => Opcode::Trap,
            Self::Return => Opcode::Return,
        }
    }

    /// Returns `true` if control never continues after the [`Instruction`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Return | Self::Trap { .. })
    }

    /// Returns the [`BranchOffset`] if the [`Instruction`] is a branch.
    pub fn branch_offset(&self) -> Option<BranchOffset> {
        match self {
            Self::Branch { offset }
            | Self::BranchNez { offset, .. }
            | Self::BranchEqz { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Calls `f` for every register the [`Instruction`] reads or writes.
    pub fn visit_regs(&self, mut f: impl FnMut(Reg)) {
        match *self {
            Self::RandomGet { result } | Self::Const32 { result, .. } | Self::MemorySize { result } => {
                f(result)
            }
            Self::Copy { result, value } => {
                f(result);
                f(value);
            }
            Self::I32Add { result, lhs, rhs }
            | Self::I32Sub { result, lhs, rhs }
            | Self::I32Mul { result, lhs, rhs }
            | Self::I32Eq { result, lhs, rhs }
            | Self::I32LtU { result, lhs, rhs } => {
                f(result);
                f(lhs);
                f(rhs);
            }
            Self::I32AddImm { result, lhs, .. } | Self::I32LtUImm { result, lhs, .. } => {
                f(result);
                f(lhs);
            }
            Self::BranchNez { condition, .. } | Self::BranchEqz { condition, .. } => f(condition),
            Self::I32Load { result, ptr, .. } | Self::I32Load8U { result, ptr, .. } => {
                f(result);
                f(ptr);
            }
            Self::I32Store { ptr, value, .. } | Self::I32Store8 { ptr, value, .. } => {
                f(ptr);
                f(value);
            }
            Self::MemoryGrow { result, delta } => {
                f(result);
                f(delta);
            }
            Self::Branch { .. } | Self::Trap { .. } | Self::Return => {}
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = self.opcode().name();
        match *self {
            Self::RandomGet { result } | Self::MemorySize { result } => write!(f, "{result} = {name}"),
            Self::Const32 { result, value } => write!(f, "{result} = {name} {value}"),
            Self::Copy { result, value } => write!(f, "{result} = {name} {value}"),
            Self::I32Add { result, lhs, rhs }
            | Self::I32Sub { result, lhs, rhs }
            | Self::I32Mul { result, lhs, rhs }
            | Self::I32Eq { result, lhs, rhs }
            | Self::I32LtU { result, lhs, rhs } => write!(f, "{result} = {name} {lhs} {rhs}"),
            Self::I32AddImm { result, lhs, rhs } | Self::I32LtUImm { result, lhs, rhs } => {
                write!(f, "{result} = {name} {lhs} {rhs}")
            }
            Self::Branch { offset } => write!(f, "{name} {offset}"),
            Self::BranchNez { condition, offset } | Self::BranchEqz { condition, offset } => {
                write!(f, "{name} {condition} {offset}")
            }
            Self::I32Load { result, ptr, offset } | Self::I32Load8U { result, ptr, offset } => {
                write!(f, "{result} = {name} {ptr} offset={offset}")
            }
            Self::I32Store { ptr, offset, value } | Self::I32Store8 { ptr, offset, value } => {
                write!(f, "{name} {ptr} offset={offset} {value}")
            }
            Self::MemoryGrow { result, delta } => write!(f, "{result} = {name} {delta}"),
            Self::Trap { trap_code } => write!(f, "{name} ({trap_code})"),
            Self::Return => f.write_str(name),
        }
    }
}
