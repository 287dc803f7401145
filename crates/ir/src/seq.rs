use crate::{EncodingError, Instruction};
use alloc::{boxed::Box, vec::Vec};
use core::{
    fmt::{self, Display},
    ops::Deref,
};

/// An immutable sequence of [`Instruction`]s forming one function body.
///
/// # Invariants
///
/// - The sequence is not empty and ends with a terminal instruction.
/// - Every branch target lies within the sequence.
///
/// Both are established by [`InstrSeq::new`] once, so executors never have
/// to check them again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrSeq {
    instrs: Box<[Instruction]>,
    len_registers: usize,
}

impl InstrSeq {
    /// Creates a new [`InstrSeq`] from `instrs`.
    ///
    /// # Errors
    ///
    /// - If `instrs` is empty.
    /// - If the last instruction of `instrs` is not terminal.
    /// - If a branch of `instrs` targets an instruction outside of `instrs`.
    pub fn new(instrs: Vec<Instruction>) -> Result<Self, EncodingError> {
        let Some(last) = instrs.last() else {
            return Err(EncodingError::Empty);
        };
        if !last.is_terminal() {
            return Err(EncodingError::MissingTerminator);
        }
        let len = instrs.len();
        for (index, instr) in instrs.iter().enumerate() {
            let Some(offset) = instr.branch_offset() else {
                continue;
            };
            match offset.target(index) {
                Some(target) if target < len => {}
                _ => return Err(EncodingError::BranchOutOfBounds { index, offset }),
            }
        }
        // Safety: we just checked all invariants above.
        Ok(unsafe { Self::new_unchecked(instrs) })
    }

    /// Creates a new [`InstrSeq`] from `instrs` without checking it.
    ///
    /// # Safety
    ///
    /// The caller must guarantee the invariants documented on [`InstrSeq`].
    /// Executing a sequence that violates them is undefined behavior.
    pub unsafe fn new_unchecked(instrs: Vec<Instruction>) -> Self {
        let mut len_registers = 0;
        for instr in &instrs {
            instr.visit_regs(|reg| len_registers = len_registers.max(reg.index() + 1));
        }
        Self {
            instrs: instrs.into_boxed_slice(),
            len_registers,
        }
    }

    /// Returns the number of registers a register file needs to execute `self`.
    pub fn len_registers(&self) -> usize {
        self.len_registers
    }

    /// Returns the [`Instruction`]s of `self`.
    pub fn as_slice(&self) -> &[Instruction] {
        &self.instrs
    }
}

impl Deref for InstrSeq {
    type Target = [Instruction];

    fn deref(&self) -> &Self::Target {
        &self.instrs
    }
}

impl Display for InstrSeq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (index, instr) in self.instrs.iter().enumerate() {
            writeln!(f, "{index:>6}: {instr}")?;
        }
        Ok(())
    }
}
