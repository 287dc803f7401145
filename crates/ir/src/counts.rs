use crate::{Instruction, Opcode};
use alloc::vec::Vec;
use core::fmt::{self, Debug, Display};

/// Per-[`Opcode`] instruction statistics.
#[derive(Clone, PartialEq, Eq)]
pub struct InstructionCounts {
    counts: [usize; Opcode::COUNT],
}

impl Default for InstructionCounts {
    fn default() -> Self {
        Self {
            counts: [0; Opcode::COUNT],
        }
    }
}

impl InstructionCounts {
    /// Counts `instr`.
    pub fn bump(&mut self, instr: &Instruction) {
        self.counts[instr.opcode() as usize] += 1;
    }

    /// Returns how often `opcode` was counted.
    pub fn get(&self, opcode: Opcode) -> usize {
        self.counts[opcode as usize]
    }

    /// Returns the number of all counted instructions.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Returns the non-zero counts ordered from most to least frequent.
    fn sorted(&self) -> Vec<(Opcode, usize)> {
        let mut buffer: Vec<_> = Opcode::ALL
            .into_iter()
            .map(|opcode| (opcode, self.get(opcode)))
            .filter(|(_, count)| *count > 0)
            .collect();
        buffer.sort_by(|(_opcode_a, count_a), (_opcode_b, count_b)| count_b.cmp(count_a));
        buffer
    }
}

impl<'a> FromIterator<&'a Instruction> for InstructionCounts {
    fn from_iter<T: IntoIterator<Item = &'a Instruction>>(iter: T) -> Self {
        let mut counts = Self::default();
        for instr in iter {
            counts.bump(instr);
        }
        counts
    }
}

impl Debug for InstructionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.sorted().into_iter().map(|(opcode, count)| (opcode.name(), count)))
            .finish()
    }
}

impl Display for InstructionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (opcode, count) in self.sorted() {
            writeln!(f, "{:<14} {count:>8}", opcode.name())?;
        }
        write!(f, "{:<14} {:>8}", "total", self.total())
    }
}
