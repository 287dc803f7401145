use arbitrary::{Arbitrary, Unstructured};
use wasmkern::{
    ir::{BranchOffset, Reg},
    InstrSeq,
    Instruction,
    Opcode,
    TrapCode,
    WASM_PAGE_SIZE,
};

/// The maximum number of instructions of a generated body, excluding its final `return`.
pub const MAX_INSTRS: usize = 64;

/// The maximum number of registers used by a generated body.
pub const MAX_REGISTERS: u16 = 8;

/// The maximum number of linear memory pages of a generated program.
pub const MAX_PAGES: u32 = 2;

const TRAP_CODES: [TrapCode; 2] = [TrapCode::UnreachableCodeReached, TrapCode::MemoryOutOfBounds];

/// A fuzzer generated program together with the seed of its random source.
#[derive(Debug, Arbitrary)]
pub struct FuzzInput {
    pub seed: u64,
    pub program: FuzzProgram,
}

/// A valid function body with its initial registers and linear memory limits.
///
/// Branch offsets are never negative so every execution terminates.
#[derive(Debug, Clone)]
pub struct FuzzProgram {
    instrs: InstrSeq,
    params: Vec<u32>,
    initial_pages: u32,
    maximum_pages: u32,
}

impl FuzzProgram {
    /// Returns the function body of the program.
    pub fn instrs(&self) -> &InstrSeq {
        &self.instrs
    }

    /// Returns the initial values of the leading registers.
    pub fn params(&self) -> &[u32] {
        &self.params
    }

    /// Returns the initial size of the linear memory in pages.
    pub fn initial_pages(&self) -> u32 {
        self.initial_pages
    }

    /// Returns the maximum size of the linear memory in pages.
    pub fn maximum_pages(&self) -> u32 {
        self.maximum_pages
    }
}

impl<'a> Arbitrary<'a> for FuzzProgram {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let len_registers = u.int_in_range(1..=MAX_REGISTERS)?;
        let initial_pages = u.int_in_range(0..=MAX_PAGES)?;
        let maximum_pages = u.int_in_range(initial_pages..=MAX_PAGES)?;
        let params = (0..len_registers)
            .map(|_| arbitrary_value(u))
            .collect::<arbitrary::Result<Vec<_>>>()?;
        let len = u.int_in_range(0..=MAX_INSTRS)?;
        let mut instrs = Vec::with_capacity(len + 1);
        for index in 0..len {
            let mut gen = Generator {
                u,
                len_registers,
                remaining: len - index,
            };
            instrs.push(gen.instr()?);
        }
        instrs.push(Instruction::Return);
        let instrs = InstrSeq::new(instrs).map_err(|_| arbitrary::Error::IncorrectFormat)?;
        Ok(Self {
            instrs,
            params,
            initial_pages,
            maximum_pages,
        })
    }
}

/// Returns an address near the generated memory in most cases and any `u32` otherwise.
fn arbitrary_value(u: &mut Unstructured) -> arbitrary::Result<u32> {
    if u.ratio(3, 4)? {
        let max_address = MAX_PAGES as usize * WASM_PAGE_SIZE + 8;
        return u.int_in_range(0..=max_address as u32);
    }
    u.arbitrary()
}

struct Generator<'u, 'a> {
    u: &'u mut Unstructured<'a>,
    len_registers: u16,
    /// The number of instructions between the generated one and the final `return`.
    remaining: usize,
}

impl Generator<'_, '_> {
    fn reg(&mut self) -> arbitrary::Result<Reg> {
        self.u.int_in_range(0..=self.len_registers - 1).map(Reg::from)
    }

    /// Returns a forward offset that stays within the body.
    fn offset(&mut self) -> arbitrary::Result<BranchOffset> {
        let offset = self.u.int_in_range(0..=self.remaining - 1)?;
        Ok(BranchOffset::from(offset as i32))
    }

    fn instr(&mut self) -> arbitrary::Result<Instruction> {
        let instr = match *self.u.choose(&Opcode::ALL)? {
            Opcode::RandomGet => Instruction::RandomGet { result: self.reg()? },
            Opcode::Const32 => Instruction::Const32 {
                result: self.reg()?,
                value: arbitrary_value(self.u)?,
            },
            Opcode::Copy => Instruction::Copy {
                result: self.reg()?,
                value: self.reg()?,
            },
            Opcode::I32Add => Instruction::I32Add {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            },
            Opcode::I32Sub => Instruction::I32Sub {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            },
            Opcode::I32Mul => Instruction::I32Mul {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            },
            Opcode::I32AddImm => Instruction::I32AddImm {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.u.arbitrary()?,
            },
            Opcode::I32Eq => Instruction::I32Eq {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            },
            Opcode::I32LtU => Instruction::I32LtU {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: self.reg()?,
            },
            Opcode::I32LtUImm => Instruction::I32LtUImm {
                result: self.reg()?,
                lhs: self.reg()?,
                rhs: arbitrary_value(self.u)?,
            },
            Opcode::Branch => Instruction::Branch {
                offset: self.offset()?,
            },
            Opcode::BranchNez => Instruction::BranchNez {
                condition: self.reg()?,
                offset: self.offset()?,
            },
            Opcode::BranchEqz => Instruction::BranchEqz {
                condition: self.reg()?,
                offset: self.offset()?,
            },
            Opcode::I32Load => Instruction::I32Load {
                result: self.reg()?,
                ptr: self.reg()?,
                offset: self.u.arbitrary()?,
            },
            Opcode::I32Load8U => Instruction::I32Load8U {
                result: self.reg()?,
                ptr: self.reg()?,
                offset: self.u.arbitrary()?,
            },
            Opcode::I32Store => Instruction::I32Store {
                ptr: self.reg()?,
                offset: self.u.arbitrary()?,
                value: self.reg()?,
            },
            Opcode::I32Store8 => Instruction::I32Store8 {
                ptr: self.reg()?,
                offset: self.u.arbitrary()?,
                value: self.reg()?,
            },
            Opcode::MemorySize => Instruction::MemorySize { result: self.reg()? },
            Opcode::MemoryGrow => Instruction::MemoryGrow {
                result: self.reg()?,
                delta: self.reg()?,
            },
            Opcode::Trap => Instruction::Trap {
                trap_code: *self.u.choose(&TRAP_CODES)?,
            },
            Opcode::Return => Instruction::Return,
        };
        Ok(instr)
    }
}
