use super::{
    instrs::{decode_i32, decode_u8, encode_i32, encode_u8, Executor},
    ExecState,
    Md,
    Ms,
};
use crate::engine::utils::unreachable_unchecked;
use core::ops::ControlFlow;
use wasmkern_core::{TrapCode, UntypedVal};
use wasmkern_ir::{InstrSeq, Instruction, Opcode};

/// The outcome of a single token handler.
type Flow = Result<ControlFlow<()>, TrapCode>;

/// Continues with the instruction the handler moved to.
const CONTINUE: Flow = Ok(ControlFlow::Continue(()));

/// A handler for all instructions of one [`Opcode`].
type TokenHandler = fn(&mut Executor<'_, '_>) -> Flow;

/// Executes `instrs` by looking up the handler of every instruction in a table.
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
    let table: [TokenHandler; Opcode::COUNT] = Opcode::ALL.map(token_handler);
    let mut exec = Executor::new(instrs, registers, md, ms, state);
    loop {
        let token = exec.instr().opcode() as usize;
        if table[token](&mut exec)?.is_break() {
            return Ok(());
        }
    }
}

/// Returns the [`TokenHandler`] for `opcode`.
fn token_handler(opcode: Opcode) -> TokenHandler {
    match opcode {
        Opcode::RandomGet => random_get,
        Opcode::Const32 => const32,
        Opcode::Copy => copy,
        Opcode::I32Add => i32_add,
        Opcode::I32Sub => i32_sub,
        Opcode::I32Mul => i32_mul,
        Opcode::I32AddImm => i32_add_imm,
        Opcode::I32Eq => i32_eq,
        Opcode::I32LtU => i32_lt_u,
        Opcode::I32LtUImm => i32_lt_u_imm,
        Opcode::Branch => branch,
        Opcode::BranchNez => branch_nez,
        Opcode::BranchEqz => branch_eqz,
        Opcode::I32Load => i32_load,
        Opcode::I32Load8U => i32_load8_u,
        Opcode::I32Store => i32_store,
        Opcode::I32Store8 => i32_store8,
        Opcode::MemorySize => memory_size,
        Opcode::MemoryGrow => memory_grow,
        Opcode::Trap => trap,
        Opcode::Return => return_,
    }
}

macro_rules! token_handlers {
    ( $( fn $name:ident($exec:ident, $variant:ident $( { $($field:ident),* } )? ) $body:block )* ) => {
        $(
            fn $name($exec: &mut Executor<'_, '_>) -> Flow {
                let Instruction::$variant $( { $($field),* } )? = $exec.instr() else {
                    // Safety: the token of an instruction is its own opcode.
                    unsafe {
                        unreachable_unchecked!(
                            "`{}` token dispatched to {:?}",
                            stringify!($name),
                            $exec.instr(),
                        )
                    }
                };
                $body
            }
        )*
    };
}

token_handlers! {
    fn random_get(exec, RandomGet { result }) {
        exec.execute_random_get(result);
        CONTINUE
    }
    fn const32(exec, Const32 { result, value }) {
        exec.execute_const32(result, value);
        CONTINUE
    }
    fn copy(exec, Copy { result, value }) {
        exec.execute_copy(result, value);
        CONTINUE
    }
    fn i32_add(exec, I32Add { result, lhs, rhs }) {
        exec.execute_binary(result, lhs, rhs, UntypedVal::i32_add);
        CONTINUE
    }
    fn i32_sub(exec, I32Sub { result, lhs, rhs }) {
        exec.execute_binary(result, lhs, rhs, UntypedVal::i32_sub);
        CONTINUE
    }
    fn i32_mul(exec, I32Mul { result, lhs, rhs }) {
        exec.execute_binary(result, lhs, rhs, UntypedVal::i32_mul);
        CONTINUE
    }
    fn i32_add_imm(exec, I32AddImm { result, lhs, rhs }) {
        exec.execute_binary_imm(result, lhs, rhs, UntypedVal::i32_add_imm);
        CONTINUE
    }
    fn i32_eq(exec, I32Eq { result, lhs, rhs }) {
        exec.execute_binary(result, lhs, rhs, UntypedVal::i32_eq);
        CONTINUE
    }
    fn i32_lt_u(exec, I32LtU { result, lhs, rhs }) {
        exec.execute_binary(result, lhs, rhs, UntypedVal::i32_lt_u);
        CONTINUE
    }
    fn i32_lt_u_imm(exec, I32LtUImm { result, lhs, rhs }) {
        exec.execute_binary_imm(result, lhs, rhs, UntypedVal::i32_lt_u_imm);
        CONTINUE
    }
    fn branch(exec, Branch { offset }) {
        exec.execute_branch(offset);
        CONTINUE
    }
    fn branch_nez(exec, BranchNez { condition, offset }) {
        exec.execute_branch_nez(condition, offset);
        CONTINUE
    }
    fn branch_eqz(exec, BranchEqz { condition, offset }) {
        exec.execute_branch_eqz(condition, offset);
        CONTINUE
    }
    fn i32_load(exec, I32Load { result, ptr, offset }) {
        exec.execute_load(result, ptr, offset, decode_i32)?;
        CONTINUE
    }
    fn i32_load8_u(exec, I32Load8U { result, ptr, offset }) {
        exec.execute_load(result, ptr, offset, decode_u8)?;
        CONTINUE
    }
    fn i32_store(exec, I32Store { ptr, offset, value }) {
        exec.execute_store(ptr, offset, value, encode_i32)?;
        CONTINUE
    }
    fn i32_store8(exec, I32Store8 { ptr, offset, value }) {
        exec.execute_store(ptr, offset, value, encode_u8)?;
        CONTINUE
    }
    fn memory_size(exec, MemorySize { result }) {
        exec.execute_memory_size(result);
        CONTINUE
    }
    fn memory_grow(exec, MemoryGrow { result, delta }) {
        exec.execute_memory_grow(result, delta);
        CONTINUE
    }
    fn trap(exec, Trap { trap_code }) {
        exec.execute_trap(trap_code)?;
        CONTINUE
    }
    fn return_(exec, Return) {
        Ok(ControlFlow::Break(()))
    }
}
