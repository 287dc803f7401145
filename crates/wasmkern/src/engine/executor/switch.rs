use super::{
    instrs::{decode_i32, decode_u8, encode_i32, encode_u8, Executor},
    ExecState,
    Md,
    Ms,
};
use wasmkern_core::{TrapCode, UntypedVal};
use wasmkern_ir::{InstrSeq, Instruction};

/// Executes `instrs` by matching on every instruction in a loop.
///
/// # Safety
///
/// See [`execute`](super::execute).
#[inline(never)]
pub unsafe fn execute(
    instrs: &InstrSeq,
    registers: &mut [UntypedVal],
    md: Md,
    ms: Ms,
    state: &mut ExecState,
) -> Result<(), TrapCode> {
    use Instruction as Instr;
    let mut exec = Executor::new(instrs, registers, md, ms, state);
    loop {
        match exec.instr() {
            Instr::RandomGet { result } => exec.execute_random_get(result),
            Instr::Const32 { result, value } => exec.execute_const32(result, value),
            Instr::Copy { result, value } => exec.execute_copy(result, value),
            Instr::I32Add { result, lhs, rhs } => {
                exec.execute_binary(result, lhs, rhs, UntypedVal::i32_add)
            }
            Instr::I32Sub { result, lhs, rhs } => {
                exec.execute_binary(result, lhs, rhs, UntypedVal::i32_sub)
            }
            Instr::I32Mul { result, lhs, rhs } => {
                exec.execute_binary(result, lhs, rhs, UntypedVal::i32_mul)
            }
            Instr::I32AddImm { result, lhs, rhs } => {
                exec.execute_binary_imm(result, lhs, rhs, UntypedVal::i32_add_imm)
            }
            Instr::I32Eq { result, lhs, rhs } => {
                exec.execute_binary(result, lhs, rhs, UntypedVal::i32_eq)
            }
            Instr::I32LtU { result, lhs, rhs } => {
                exec.execute_binary(result, lhs, rhs, UntypedVal::i32_lt_u)
            }
            Instr::I32LtUImm { result, lhs, rhs } => {
                exec.execute_binary_imm(result, lhs, rhs, UntypedVal::i32_lt_u_imm)
            }
            Instr::Branch { offset } => exec.execute_branch(offset),
            Instr::BranchNez { condition, offset } => exec.execute_branch_nez(condition, offset),
            Instr::BranchEqz { condition, offset } => exec.execute_branch_eqz(condition, offset),
            Instr::I32Load { result, ptr, offset } => {
                exec.execute_load(result, ptr, offset, decode_i32)?
            }
            Instr::I32Load8U { result, ptr, offset } => {
                exec.execute_load(result, ptr, offset, decode_u8)?
            }
            Instr::I32Store { ptr, offset, value } => {
                exec.execute_store(ptr, offset, value, encode_i32)?
            }
            Instr::I32Store8 { ptr, offset, value } => {
                exec.execute_store(ptr, offset, value, encode_u8)?
            }
            Instr::MemorySize { result } => exec.execute_memory_size(result),
            Instr::MemoryGrow { result, delta } => exec.execute_memory_grow(result, delta),
            Instr::Trap { trap_code } => exec.execute_trap(trap_code)?,
            Instr::Return => return Ok(()),
        }
    }
}
