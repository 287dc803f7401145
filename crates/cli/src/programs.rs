use wasmkern::{
    errors::EncodingError,
    ir::{BranchOffset, Reg},
    InstrSeq,
    Instruction,
};

/// `x = random(); do { i += 1; x += 1 } while i < iterations`
///
/// Uses `x` in `r0`, `i` in `r1` and the loop condition in `r2`.
pub fn count_loop(iterations: u32) -> Result<InstrSeq, EncodingError> {
    let (x, i, cond) = (Reg::from(0), Reg::from(1), Reg::from(2));
    InstrSeq::new(vec![
        Instruction::RandomGet { result: x },
        Instruction::I32AddImm { result: i, lhs: i, rhs: 1 },
        Instruction::I32AddImm { result: x, lhs: x, rhs: 1 },
        Instruction::I32LtUImm { result: cond, lhs: i, rhs: iterations },
        Instruction::BranchNez { condition: cond, offset: BranchOffset::from(-4) },
        Instruction::Return,
    ])
}

/// Loads an `i32` from the address in `r0` into `r1`.
pub fn load(offset: u16) -> Result<InstrSeq, EncodingError> {
    InstrSeq::new(vec![
        Instruction::I32Load { result: Reg::from(1), ptr: Reg::from(0), offset },
        Instruction::Return,
    ])
}
