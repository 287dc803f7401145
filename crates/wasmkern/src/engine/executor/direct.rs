//! Direct threaded dispatch.
//!
//! Before its first execution a function body is linked: every [`Instruction`]
//! is paired with the address of the handler implementing its opcode. A
//! handler executes its instruction and hands the updated execution context
//! to the handler of the next instruction by returning [`Next::Continue`].
//!
//! # Note
//!
//! Ideally every handler would tail call its successor so that the machine
//! stack never grows. Rust does not guarantee tail calls on stable, so a
//! small trampoline in [`execute`] performs the indirect call on behalf of
//! the handlers instead. The context still travels in registers from handler
//! to handler and no central `match` is involved.

use super::{
    instrs::{decode_i32, decode_u8, encode_i32, encode_u8},
    memory,
    ExecState,
    FrameRegisters,
    InstructionPtr,
    Md,
    Ms,
    Pc,
    Sp,
};
use crate::engine::utils::unreachable_unchecked;
use core::fmt;
use std::boxed::Box;
use wasmkern_core::{hint, TrapCode, UntypedVal};
use wasmkern_ir::{BranchOffset, InstrSeq, Instruction, Opcode};

/// What to do after a handler has executed its instruction.
pub enum Next {
    /// Continue with the handler of the instruction at the returned [`Pc`].
    Continue(Sp, Pc, Md, Ms),
    /// The execution returned or trapped.
    ///
    /// A trap is recorded in the [`ExecState`].
    Halt,
}

/// A handler executing all instructions of one [`Opcode`].
///
/// # Safety
///
/// Handlers must only be called with the [`Pc`] of a linked instruction of
/// their own [`Opcode`] within a validated and linked sequence.
pub type Handler = unsafe fn(Sp, Pc, Md, Ms, &mut ExecState<'_>) -> Next;

/// The handlers of all [`Opcode`]s indexed by opcode.
pub type HandlerTable = [Handler; Opcode::COUNT];

/// Populated by the first call to [`resolve_handlers`].
static HANDLERS: spin::Once<HandlerTable> = spin::Once::new();

/// Returns the handler addresses used to link function bodies.
///
/// The table is populated exactly once per process, no matter how many
/// threads race for it.
pub fn resolve_handlers() -> &'static HandlerTable {
    HANDLERS.call_once(|| {
        log::debug!("resolving {} direct threaded handlers", Opcode::COUNT);
        Opcode::ALL.map(handler)
    })
}

/// An [`Instruction`] paired with the [`Handler`] of its [`Opcode`].
#[derive(Copy, Clone)]
pub struct LinkedInstr {
    /// The handler executing `instr`.
    handler: Handler,
    /// The linked instruction.
    instr: Instruction,
}

impl fmt::Debug for LinkedInstr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LinkedInstr")
            .field("handler", &(self.handler as usize as *const ()))
            .field("instr", &self.instr)
            .finish()
    }
}

impl LinkedInstr {
    /// Returns the address of the handler of the [`LinkedInstr`].
    pub fn handler_addr(&self) -> usize {
        self.handler as usize
    }

    /// Returns the [`Handler`] executing the linked instruction.
    pub fn handler(&self) -> Handler {
        self.handler
    }

    /// Returns the linked [`Instruction`].
    pub fn instr(&self) -> &Instruction {
        &self.instr
    }
}

/// A function body linked for direct threaded dispatch.
#[derive(Debug)]
pub struct LinkedCode {
    instrs: Box<[LinkedInstr]>,
}

impl LinkedCode {
    /// Links `instrs` against the handlers of [`resolve_handlers`].
    pub fn link(instrs: &InstrSeq) -> Self {
        let handlers = resolve_handlers();
        let instrs: Box<[LinkedInstr]> = instrs
            .iter()
            .map(|instr| LinkedInstr {
                handler: handlers[instr.opcode() as usize],
                instr: *instr,
            })
            .collect();
        log::trace!("linked {} instructions", instrs.len());
        Self { instrs }
    }

    /// Returns the [`LinkedInstr`]s of the [`LinkedCode`].
    pub fn as_slice(&self) -> &[LinkedInstr] {
        &self.instrs
    }
}

/// Executes the linked `code`.
///
/// # Safety
///
/// See [`execute`](super::execute). `code` must be linked from a validated sequence.
#[inline(never)]
pub unsafe fn execute(
    code: &LinkedCode,
    registers: &mut [UntypedVal],
    md: Md,
    ms: Ms,
    state: &mut ExecState,
) -> Result<(), TrapCode> {
    let mut sp = FrameRegisters::new(registers);
    let mut pc = InstructionPtr::new(code.as_slice());
    let mut md = md;
    let mut ms = ms;
    loop {
        let handler = pc.get().handler;
        match handler(sp, pc, md, ms, state) {
            Next::Continue(next_sp, next_pc, next_md, next_ms) => {
                sp = next_sp;
                pc = next_pc;
                md = next_md;
                ms = next_ms;
            }
            Next::Halt => break,
        }
    }
    match state.trap.take() {
        Some(trap_code) => Err(trap_code),
        None => Ok(()),
    }
}

/// Returns the [`Handler`] for `opcode`.
fn handler(opcode: Opcode) -> Handler {
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

/// Continues with the next instruction.
#[inline(always)]
unsafe fn next(sp: Sp, mut pc: Pc, md: Md, ms: Ms) -> Next {
    pc.add(1);
    Next::Continue(sp, pc, md, ms)
}

/// Continues with the target of a taken branch by `offset`.
#[inline(always)]
unsafe fn branch_to(sp: Sp, mut pc: Pc, md: Md, ms: Ms, offset: BranchOffset) -> Next {
    pc.branch(offset);
    Next::Continue(sp, pc, md, ms)
}

/// Records `trap_code` and halts the execution.
#[cold]
fn halt_with(state: &mut ExecState, trap_code: TrapCode) -> Next {
    state.trap = Some(trap_code);
    Next::Halt
}

macro_rules! handlers {
    ( $(
        fn $name:ident(
            $sp:ident, $pc:ident, $md:ident, $ms:ident, $state:ident,
            $variant:ident $( { $($field:ident),* } )?
        ) $body:block
    )* ) => {
        $(
            #[allow(unused_variables)]
            unsafe fn $name($sp: Sp, $pc: Pc, $md: Md, $ms: Ms, $state: &mut ExecState<'_>) -> Next {
                let Instruction::$variant $( { $($field),* } )? = $pc.get().instr else {
                    unreachable_unchecked!(
                        "`{}` handler linked to {:?}",
                        stringify!($name),
                        $pc.get().instr,
                    )
                };
                $body
            }
        )*
    };
}

handlers! {
    fn random_get(sp, pc, md, ms, state, RandomGet { result }) {
        sp.set(result, state.next_random().into());
        next(sp, pc, md, ms)
    }
    fn const32(sp, pc, md, ms, state, Const32 { result, value }) {
        sp.set(result, value.into());
        next(sp, pc, md, ms)
    }
    fn copy(sp, pc, md, ms, state, Copy { result, value }) {
        sp.set(result, sp.get(value));
        next(sp, pc, md, ms)
    }
    fn i32_add(sp, pc, md, ms, state, I32Add { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_add(sp.get(lhs), sp.get(rhs)));
        next(sp, pc, md, ms)
    }
    fn i32_sub(sp, pc, md, ms, state, I32Sub { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_sub(sp.get(lhs), sp.get(rhs)));
        next(sp, pc, md, ms)
    }
    fn i32_mul(sp, pc, md, ms, state, I32Mul { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_mul(sp.get(lhs), sp.get(rhs)));
        next(sp, pc, md, ms)
    }
    fn i32_add_imm(sp, pc, md, ms, state, I32AddImm { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_add_imm(sp.get(lhs), rhs));
        next(sp, pc, md, ms)
    }
    fn i32_eq(sp, pc, md, ms, state, I32Eq { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_eq(sp.get(lhs), sp.get(rhs)));
        next(sp, pc, md, ms)
    }
    fn i32_lt_u(sp, pc, md, ms, state, I32LtU { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_lt_u(sp.get(lhs), sp.get(rhs)));
        next(sp, pc, md, ms)
    }
    fn i32_lt_u_imm(sp, pc, md, ms, state, I32LtUImm { result, lhs, rhs }) {
        sp.set(result, UntypedVal::i32_lt_u_imm(sp.get(lhs), rhs));
        next(sp, pc, md, ms)
    }
    fn branch(sp, pc, md, ms, state, Branch { offset }) {
        branch_to(sp, pc, md, ms, offset)
    }
    fn branch_nez(sp, pc, md, ms, state, BranchNez { condition, offset }) {
        if sp.get(condition).is_nez32() {
            return branch_to(sp, pc, md, ms, offset);
        }
        next(sp, pc, md, ms)
    }
    fn branch_eqz(sp, pc, md, ms, state, BranchEqz { condition, offset }) {
        if !sp.get(condition).is_nez32() {
            return branch_to(sp, pc, md, ms, offset);
        }
        next(sp, pc, md, ms)
    }
    fn i32_load(sp, pc, md, ms, state, I32Load { result, ptr, offset }) {
        match memory::load::<4>(md, ms, state.explicit_checks(), sp.get(ptr), offset) {
            Ok(bytes) => {
                sp.set(result, decode_i32(bytes));
                next(sp, pc, md, ms)
            }
            Err(trap_code) => halt_with(state, trap_code),
        }
    }
    fn i32_load8_u(sp, pc, md, ms, state, I32Load8U { result, ptr, offset }) {
        match memory::load::<1>(md, ms, state.explicit_checks(), sp.get(ptr), offset) {
            Ok(bytes) => {
                sp.set(result, decode_u8(bytes));
                next(sp, pc, md, ms)
            }
            Err(trap_code) => halt_with(state, trap_code),
        }
    }
    fn i32_store(sp, pc, md, ms, state, I32Store { ptr, offset, value }) {
        let bytes = encode_i32(sp.get(value));
        match memory::store::<4>(md, ms, state.explicit_checks(), sp.get(ptr), offset, bytes) {
            Ok(()) => next(sp, pc, md, ms),
            Err(trap_code) => halt_with(state, trap_code),
        }
    }
    fn i32_store8(sp, pc, md, ms, state, I32Store8 { ptr, offset, value }) {
        let bytes = encode_u8(sp.get(value));
        match memory::store::<1>(md, ms, state.explicit_checks(), sp.get(ptr), offset, bytes) {
            Ok(()) => next(sp, pc, md, ms),
            Err(trap_code) => halt_with(state, trap_code),
        }
    }
    fn memory_size(sp, pc, md, ms, state, MemorySize { result }) {
        sp.set(result, memory::size(ms).into());
        next(sp, pc, md, ms)
    }
    fn memory_grow(sp, pc, md, ms, state, MemoryGrow { result, delta }) {
        let (old_pages, md, ms) = memory::grow(state, u32::from(sp.get(delta)), md, ms);
        sp.set(result, old_pages.into());
        next(sp, pc, md, ms)
    }
    fn trap(sp, pc, md, ms, state, Trap { trap_code }) {
        hint::cold();
        halt_with(state, trap_code)
    }
    fn return_(sp, pc, md, ms, state, Return) {
        Next::Halt
    }
}
