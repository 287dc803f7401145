use super::{memory, ExecState, FrameRegisters, InstructionPtr, Md, Ms};
use wasmkern_core::{TrapCode, UntypedVal};
use wasmkern_ir::{BranchOffset, Instruction, Reg};

/// An execution context for the switch and token threaded strategies.
///
/// Both strategies decode instructions from the same [`Instruction`] sequence
/// and share the instruction implementations of this type.
pub struct Executor<'state, 'a> {
    /// The register file of the executed function.
    sp: FrameRegisters,
    /// The pointer to the currently executed instruction.
    ip: InstructionPtr<Instruction>,
    /// The base address of the linear memory.
    md: Md,
    /// The accessible size of the linear memory in bytes.
    ms: Ms,
    /// The rarely accessed parts of the execution.
    state: &'state mut ExecState<'a>,
}

impl<'state, 'a> Executor<'state, 'a> {
    /// Creates a new [`Executor`] starting at the first of `instrs`.
    ///
    /// # Safety
    ///
    /// - `instrs` must be a validated instruction sequence.
    /// - `registers` must be large enough for every [`Reg`] used by `instrs`.
    #[inline(always)]
    pub unsafe fn new(
        instrs: &[Instruction],
        registers: &mut [UntypedVal],
        md: Md,
        ms: Ms,
        state: &'state mut ExecState<'a>,
    ) -> Self {
        Self {
            sp: FrameRegisters::new(registers),
            ip: InstructionPtr::new(instrs),
            md,
            ms,
            state,
        }
    }

    /// Returns the currently executed [`Instruction`].
    #[inline(always)]
    pub fn instr(&self) -> Instruction {
        // Safety: `ip` only ever moves to validated branch targets or to
        //         the next instruction of a non-terminal instruction.
        unsafe { *self.ip.get() }
    }

    /// Returns the [`Reg`] value.
    #[inline(always)]
    fn get_register(&self, register: Reg) -> UntypedVal {
        // Safety: `Executor::new` requires the register file to be large
        //         enough for every register of the executed sequence.
        unsafe { self.sp.get(register) }
    }

    /// Sets the [`Reg`] value to `value`.
    #[inline(always)]
    fn set_register(&mut self, register: Reg, value: impl Into<UntypedVal>) {
        // Safety: `Executor::new` requires the register file to be large
        //         enough for every register of the executed sequence.
        unsafe { self.sp.set(register, value.into()) };
    }

    /// Shifts the instruction pointer to the next instruction.
    #[inline(always)]
    fn next_instr(&mut self) {
        // Safety: only terminal instructions end a validated sequence and
        //         those never call this method.
        unsafe { self.ip.add(1) }
    }

    /// Shifts the instruction pointer to the next instruction and returns `Ok(())`.
    ///
    /// # Note
    ///
    /// This is a convenience function for fallible instructions.
    #[inline(always)]
    fn try_next_instr(&mut self) -> Result<(), TrapCode> {
        self.next_instr();
        Ok(())
    }

    /// Takes the branch by `offset`.
    #[inline(always)]
    fn branch_to(&mut self, offset: BranchOffset) {
        // Safety: validated sequences only contain in-bounds branch targets.
        unsafe { self.ip.branch(offset) }
    }

    /// Executes an [`Instruction::RandomGet`].
    #[inline(always)]
    pub fn execute_random_get(&mut self, result: Reg) {
        let value = self.state.next_random();
        self.set_register(result, value);
        self.next_instr();
    }

    /// Executes an [`Instruction::Const32`].
    #[inline(always)]
    pub fn execute_const32(&mut self, result: Reg, value: u32) {
        self.set_register(result, value);
        self.next_instr();
    }

    /// Executes an [`Instruction::Copy`].
    #[inline(always)]
    pub fn execute_copy(&mut self, result: Reg, value: Reg) {
        let value = self.get_register(value);
        self.set_register(result, value);
        self.next_instr();
    }

    /// Executes a generic binary [`Instruction`].
    #[inline(always)]
    pub fn execute_binary(
        &mut self,
        result: Reg,
        lhs: Reg,
        rhs: Reg,
        op: fn(UntypedVal, UntypedVal) -> UntypedVal,
    ) {
        let lhs = self.get_register(lhs);
        let rhs = self.get_register(rhs);
        self.set_register(result, op(lhs, rhs));
        self.next_instr();
    }

    /// Executes a generic binary [`Instruction`] with an immediate `rhs`.
    #[inline(always)]
    pub fn execute_binary_imm(
        &mut self,
        result: Reg,
        lhs: Reg,
        rhs: u32,
        op: fn(UntypedVal, u32) -> UntypedVal,
    ) {
        let lhs = self.get_register(lhs);
        self.set_register(result, op(lhs, rhs));
        self.next_instr();
    }

    /// Executes an [`Instruction::Branch`].
    #[inline(always)]
    pub fn execute_branch(&mut self, offset: BranchOffset) {
        self.branch_to(offset)
    }

    /// Executes an [`Instruction::BranchNez`].
    #[inline(always)]
    pub fn execute_branch_nez(&mut self, condition: Reg, offset: BranchOffset) {
        if self.get_register(condition).is_nez32() {
            return self.branch_to(offset);
        }
        self.next_instr()
    }

    /// Executes an [`Instruction::BranchEqz`].
    #[inline(always)]
    pub fn execute_branch_eqz(&mut self, condition: Reg, offset: BranchOffset) {
        if !self.get_register(condition).is_nez32() {
            return self.branch_to(offset);
        }
        self.next_instr()
    }

    /// Executes a generic load [`Instruction`] of `N` bytes.
    #[inline(always)]
    pub fn execute_load<const N: usize>(
        &mut self,
        result: Reg,
        ptr: Reg,
        offset: u16,
        decode: fn([u8; N]) -> UntypedVal,
    ) -> Result<(), TrapCode> {
        let ptr = self.get_register(ptr);
        // Safety: the engine only disables explicit checks for executions
        //         running under the trap guard with `md` registered.
        let bytes = unsafe {
            memory::load::<N>(self.md, self.ms, self.state.explicit_checks(), ptr, offset)?
        };
        self.set_register(result, decode(bytes));
        self.try_next_instr()
    }

    /// Executes a generic store [`Instruction`] of `N` bytes.
    #[inline(always)]
    pub fn execute_store<const N: usize>(
        &mut self,
        ptr: Reg,
        offset: u16,
        value: Reg,
        encode: fn(UntypedVal) -> [u8; N],
    ) -> Result<(), TrapCode> {
        let ptr = self.get_register(ptr);
        let bytes = encode(self.get_register(value));
        // Safety: the engine only disables explicit checks for executions
        //         running under the trap guard with `md` registered.
        unsafe {
            memory::store::<N>(self.md, self.ms, self.state.explicit_checks(), ptr, offset, bytes)?
        };
        self.try_next_instr()
    }

    /// Executes an [`Instruction::MemorySize`].
    #[inline(always)]
    pub fn execute_memory_size(&mut self, result: Reg) {
        self.set_register(result, memory::size(self.ms));
        self.next_instr();
    }

    /// Executes an [`Instruction::MemoryGrow`].
    #[inline(always)]
    pub fn execute_memory_grow(&mut self, result: Reg, delta: Reg) {
        let delta = u32::from(self.get_register(delta));
        let (old_pages, md, ms) = memory::grow(self.state, delta, self.md, self.ms);
        self.md = md;
        self.ms = ms;
        self.set_register(result, old_pages);
        self.next_instr();
    }

    /// Executes an [`Instruction::Trap`].
    #[inline(always)]
    pub fn execute_trap(&mut self, trap_code: TrapCode) -> Result<(), TrapCode> {
        Err(trap_code)
    }
}

/// Decodes the bytes of an `i32.load`.
pub fn decode_i32(bytes: [u8; 4]) -> UntypedVal {
    u32::from_le_bytes(bytes).into()
}

/// Decodes the bytes of an `i32.load8_u`.
pub fn decode_u8(bytes: [u8; 1]) -> UntypedVal {
    u32::from(bytes[0]).into()
}

/// Encodes the bytes of an `i32.store`.
pub fn encode_i32(value: UntypedVal) -> [u8; 4] {
    u32::from(value).to_le_bytes()
}

/// Encodes the bytes of an `i32.store8`.
pub fn encode_u8(value: UntypedVal) -> [u8; 1] {
    [u32::from(value) as u8]
}
