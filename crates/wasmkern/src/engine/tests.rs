use super::*;
use crate::{resolve_handlers, Diagnostic, ErrorKind};
use assert_matches::assert_matches;
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use std::{
    format,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use wasmkern_ir::{BranchOffset, InstrSeq, Instruction, Reg};

const STRATEGIES: [DispatchStrategy; 3] = [
    DispatchStrategy::Switch,
    DispatchStrategy::Token,
    DispatchStrategy::Direct,
];

fn bounds_modes() -> Vec<BoundsCheck> {
    if cfg!(unix) {
        vec![BoundsCheck::Explicit, BoundsCheck::Guard]
    } else {
        vec![BoundsCheck::Explicit]
    }
}

fn engine(dispatch: DispatchStrategy, bounds_checks: BoundsCheck) -> Engine {
    let mut config = Config::default();
    config.dispatch(dispatch).bounds_checks(bounds_checks);
    Engine::new(&config)
}

/// Calls `f` with an engine for every combination of strategy and bounds check mode.
fn for_each_engine(mut f: impl FnMut(&Engine)) {
    for strategy in STRATEGIES {
        for bounds_checks in bounds_modes() {
            f(&engine(strategy, bounds_checks))
        }
    }
}

fn body(instrs: Vec<Instruction>) -> FuncBody {
    FuncBody::new(InstrSeq::new(instrs).unwrap())
}

fn store_with_memory(engine: &Engine, initial_pages: u32, maximum_pages: Option<u32>) -> Store {
    let mut store = Store::new(engine);
    let memory = LinearMemory::new(engine, initial_pages, maximum_pages).unwrap();
    store.set_memory(memory);
    store
}

fn reg(index: u16) -> Reg {
    Reg::from(index)
}

fn regs<const N: usize>() -> [UntypedVal; N] {
    [UntypedVal::default(); N]
}

#[test]
fn count_loop_is_identical_across_strategies() {
    let (x, i, cond) = (reg(0), reg(1), reg(2));
    let func = body(vec![
        Instruction::RandomGet { result: x },
        Instruction::I32AddImm { result: i, lhs: i, rhs: 1 },
        Instruction::I32AddImm { result: x, lhs: x, rhs: 1 },
        Instruction::I32LtUImm { result: cond, lhs: i, rhs: 1_000 },
        Instruction::BranchNez { condition: cond, offset: BranchOffset::from(-4) },
        Instruction::Return,
    ]);
    let random = SmallRng::seed_from_u64(0).next_u32();
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<3>();
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[0]), random.wrapping_add(1_000));
        assert_eq!(u32::from(registers[1]), 1_000);
        assert_eq!(u32::from(registers[2]), 0);
    });
}

#[test]
fn random_seed_is_configurable() {
    let func = body(vec![Instruction::RandomGet { result: reg(0) }, Instruction::Return]);
    let mut config = Config::default();
    config.random_seed(7);
    let engine = Engine::new(&config);
    let mut store = Store::new(&engine);
    let mut registers = regs::<1>();
    engine.execute(&mut store, &func, &mut registers).unwrap();
    assert_eq!(
        u32::from(registers[0]),
        SmallRng::seed_from_u64(7).next_u32()
    );
    store.set_random_source(rand::rngs::mock::StepRng::new(5, 0));
    engine.execute(&mut store, &func, &mut registers).unwrap();
    assert_eq!(u32::from(registers[0]), 5);
}

#[test]
fn branch_offset_zero_falls_through() {
    let func = body(vec![
        Instruction::Const32 { result: reg(0), value: 1 },
        Instruction::BranchNez { condition: reg(0), offset: BranchOffset::from(0) },
        Instruction::BranchEqz { condition: reg(1), offset: BranchOffset::from(0) },
        Instruction::Branch { offset: BranchOffset::from(0) },
        Instruction::I32AddImm { result: reg(0), lhs: reg(0), rhs: 1 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<2>();
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[0]), 2);
    });
}

#[test]
fn untaken_branch_offset_zero_falls_through() {
    let with_branches = body(vec![
        Instruction::Const32 { result: reg(1), value: 7 },
        Instruction::BranchNez { condition: reg(0), offset: BranchOffset::from(0) },
        Instruction::I32AddImm { result: reg(2), lhs: reg(2), rhs: 1 },
        Instruction::BranchEqz { condition: reg(1), offset: BranchOffset::from(0) },
        Instruction::I32AddImm { result: reg(2), lhs: reg(2), rhs: 1 },
        Instruction::Return,
    ]);
    let without_branches = body(vec![
        Instruction::Const32 { result: reg(1), value: 7 },
        Instruction::I32AddImm { result: reg(2), lhs: reg(2), rhs: 1 },
        Instruction::I32AddImm { result: reg(2), lhs: reg(2), rhs: 1 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut branched = regs::<3>();
        engine.execute(&mut store, &with_branches, &mut branched).unwrap();
        let mut straight = regs::<3>();
        engine.execute(&mut store, &without_branches, &mut straight).unwrap();
        assert_eq!(branched, straight);
        assert_eq!(u32::from(branched[0]), 0);
        assert_eq!(u32::from(branched[2]), 2);
    });
}

#[test]
fn forward_branches_skip_instructions() {
    let func = body(vec![
        Instruction::BranchEqz { condition: reg(0), offset: BranchOffset::from(1) },
        Instruction::Const32 { result: reg(1), value: 10 },
        Instruction::Const32 { result: reg(2), value: 20 },
        Instruction::Branch { offset: BranchOffset::from(1) },
        Instruction::Trap { trap_code: TrapCode::UnreachableCodeReached },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<3>();
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[1]), 0);
        assert_eq!(u32::from(registers[2]), 20);
    });
}

#[test]
fn arithmetic_wraps() {
    let func = body(vec![
        Instruction::I32Add { result: reg(2), lhs: reg(0), rhs: reg(1) },
        Instruction::I32Sub { result: reg(3), lhs: reg(1), rhs: reg(0) },
        Instruction::I32Mul { result: reg(4), lhs: reg(0), rhs: reg(0) },
        Instruction::I32Eq { result: reg(5), lhs: reg(0), rhs: reg(0) },
        Instruction::I32LtU { result: reg(6), lhs: reg(1), rhs: reg(0) },
        Instruction::Copy { result: reg(7), value: reg(0) },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<8>();
        registers[0] = UntypedVal::from(u32::MAX);
        registers[1] = UntypedVal::from(2_u32);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[2]), 1);
        assert_eq!(u32::from(registers[3]), 3);
        assert_eq!(u32::from(registers[4]), 1);
        assert_eq!(u32::from(registers[5]), 1);
        assert_eq!(u32::from(registers[6]), 1);
        assert_eq!(u32::from(registers[7]), u32::MAX);
    });
}

#[test]
fn small_register_file_is_rejected() {
    let func = body(vec![
        Instruction::Const32 { result: reg(4), value: 1 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<4>();
        let error = engine.execute(&mut store, &func, &mut registers).unwrap_err();
        assert_eq!(error.as_trap_code(), Some(TrapCode::BadRegisterFile));
    });
}

#[test]
fn trap_instruction_traps() {
    let func = body(vec![
        Instruction::Const32 { result: reg(0), value: 1 },
        Instruction::Trap { trap_code: TrapCode::UnreachableCodeReached },
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<1>();
        let error = engine.execute(&mut store, &func, &mut registers).unwrap_err();
        assert_matches!(error.kind(), ErrorKind::Trap(TrapCode::UnreachableCodeReached));
        assert_eq!(u32::from(registers[0]), 1);
    });
}

#[test]
fn loads_and_stores_roundtrip() {
    let (ptr, value, loaded, byte) = (reg(0), reg(1), reg(2), reg(3));
    let func = body(vec![
        Instruction::I32Store { ptr, offset: 4, value },
        Instruction::I32Load { result: loaded, ptr, offset: 4 },
        Instruction::I32Store8 { ptr, offset: 0, value },
        Instruction::I32Load8U { result: byte, ptr, offset: 0 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = store_with_memory(engine, 1, None);
        let mut registers = regs::<4>();
        registers[0] = UntypedVal::from(100_u32);
        registers[1] = UntypedVal::from(0xDEAD_BEEF_u32);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[2]), 0xDEAD_BEEF);
        assert_eq!(u32::from(registers[3]), 0xEF);
        let data = store.memory().unwrap().data();
        assert_eq!(&data[104..108], &0xDEAD_BEEF_u32.to_le_bytes());
        assert_eq!(data[100], 0xEF);
    });
}

#[test]
fn last_bytes_are_accessible() {
    let func = body(vec![
        Instruction::I32Load { result: reg(1), ptr: reg(0), offset: 0 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = store_with_memory(engine, 1, None);
        store.memory_mut().unwrap().data_mut()[65_532..].copy_from_slice(&[1, 2, 3, 4]);
        let mut registers = regs::<2>();
        registers[0] = UntypedVal::from(65_532_u32);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[1]), 0x0403_0201);
    });
}

#[test]
fn out_of_bounds_accesses_trap() {
    let cases: [(u32, Instruction); 5] = [
        (65_536, Instruction::I32Load8U { result: reg(1), ptr: reg(0), offset: 0 }),
        (65_533, Instruction::I32Load { result: reg(1), ptr: reg(0), offset: 0 }),
        (65_530, Instruction::I32Store { ptr: reg(0), offset: 10, value: reg(1) }),
        (u32::MAX, Instruction::I32Store8 { ptr: reg(0), offset: u16::MAX, value: reg(1) }),
        (u32::MAX, Instruction::I32Load { result: reg(1), ptr: reg(0), offset: u16::MAX }),
    ];
    for (address, instr) in cases {
        let func = body(vec![instr, Instruction::Return]);
        for_each_engine(|engine| {
            let mut store = store_with_memory(engine, 1, None);
            let mut registers = regs::<2>();
            registers[0] = UntypedVal::from(address);
            let error = engine.execute(&mut store, &func, &mut registers).unwrap_err();
            assert_eq!(error.as_trap_code(), Some(TrapCode::MemoryOutOfBounds), "{instr}");
        });
    }
}

#[test]
fn accesses_without_memory_trap() {
    let func = body(vec![
        Instruction::I32Load { result: reg(1), ptr: reg(0), offset: 0 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = Store::new(engine);
        let mut registers = regs::<2>();
        let error = engine.execute(&mut store, &func, &mut registers).unwrap_err();
        assert_eq!(error.as_trap_code(), Some(TrapCode::MemoryOutOfBounds));
    });
}

#[test]
fn memory_grow_and_size() {
    let (delta, old, size, ptr, value) = (reg(0), reg(1), reg(2), reg(3), reg(4));
    let func = body(vec![
        Instruction::MemoryGrow { result: old, delta },
        Instruction::MemorySize { result: size },
        // The new page is immediately accessible.
        Instruction::Const32 { result: ptr, value: 65_536 + 8 },
        Instruction::Const32 { result: value, value: 77 },
        Instruction::I32Store { ptr, offset: 0, value },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = store_with_memory(engine, 1, Some(3));
        let mut registers = regs::<5>();
        registers[0] = UntypedVal::from(1_u32);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[1]), 1);
        assert_eq!(u32::from(registers[2]), 2);
        let memory = store.memory().unwrap();
        assert_eq!(memory.size_pages(), 2);
        assert_eq!(memory.data()[65_544], 77);
    });
}

#[test]
fn failed_memory_grow_returns_max() {
    let func = body(vec![
        Instruction::MemoryGrow { result: reg(1), delta: reg(0) },
        Instruction::MemorySize { result: reg(2) },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = store_with_memory(engine, 1, Some(2));
        let mut registers = regs::<3>();
        registers[0] = UntypedVal::from(2_u32);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[1]), u32::MAX);
        assert_eq!(u32::from(registers[2]), 1);

        let mut store = Store::new(engine);
        engine.execute(&mut store, &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[1]), u32::MAX);
        assert_eq!(u32::from(registers[2]), 0);
    });
}

#[test]
fn grown_memory_keeps_trapping_past_its_end() {
    let func = body(vec![
        Instruction::MemoryGrow { result: reg(1), delta: reg(0) },
        Instruction::Const32 { result: reg(2), value: 2 * 65_536 },
        Instruction::I32Load { result: reg(3), ptr: reg(2), offset: 0 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut store = store_with_memory(engine, 1, None);
        let mut registers = regs::<4>();
        registers[0] = UntypedVal::from(1_u32);
        let error = engine.execute(&mut store, &func, &mut registers).unwrap_err();
        assert_eq!(error.as_trap_code(), Some(TrapCode::MemoryOutOfBounds));
        assert_eq!(store.memory().unwrap().size_pages(), 2);
    });
}

#[test]
fn bodies_are_linked_once_on_demand() {
    let func = body(vec![
        Instruction::Const32 { result: reg(0), value: 1 },
        Instruction::Return,
    ]);
    let mut registers = regs::<1>();
    for strategy in [DispatchStrategy::Switch, DispatchStrategy::Token] {
        let engine = engine(strategy, BoundsCheck::Explicit);
        engine.execute(&mut Store::new(&engine), &func, &mut registers).unwrap();
    }
    assert!(!func.is_linked());
    let engine = engine(DispatchStrategy::Direct, BoundsCheck::Explicit);
    engine.execute(&mut Store::new(&engine), &func, &mut registers).unwrap();
    assert!(func.is_linked());
    assert!(core::ptr::eq(func.linked(), func.linked()));
}

#[test]
fn linked_instructions_carry_their_handlers() {
    let func = body(vec![
        Instruction::RandomGet { result: reg(0) },
        Instruction::I32AddImm { result: reg(0), lhs: reg(0), rhs: 1 },
        Instruction::BranchEqz { condition: reg(0), offset: BranchOffset::from(0) },
        Instruction::Return,
    ]);
    let handlers = resolve_handlers();
    assert!(core::ptr::eq(handlers, resolve_handlers()));
    let linked = func.linked().as_slice();
    assert_eq!(linked.len(), func.instrs().len());
    for (linked, instr) in linked.iter().zip(func.instrs().iter()) {
        assert_eq!(linked.instr(), instr);
        assert_eq!(linked.handler_addr(), handlers[instr.opcode() as usize] as usize);
    }
}

#[test]
fn unwritten_registers_keep_their_values() {
    let func = body(vec![
        Instruction::Const32 { result: reg(0), value: 1 },
        Instruction::Return,
    ]);
    for_each_engine(|engine| {
        let mut registers = [UntypedVal::from(9_u32); 4];
        engine.execute(&mut Store::new(engine), &func, &mut registers).unwrap();
        assert_eq!(u32::from(registers[0]), 1);
        assert!(registers[1..].iter().all(|&value| u32::from(value) == 9));
    });
}

/// A backend that rejects bodies containing `trap` and records what it emitted.
#[derive(Default)]
struct RecordingBackend {
    emitted: Vec<String>,
    fail_emit: bool,
}

impl CodegenBackend for RecordingBackend {
    fn verify(&self, func: &FuncBody) -> Option<Diagnostic> {
        func.instrs()
            .iter()
            .any(|instr| matches!(instr, Instruction::Trap { .. }))
            .then(|| Diagnostic::new("trap instructions are not supported"))
    }

    fn print_function(&self, func: &FuncBody) -> String {
        func.instrs().to_string()
    }

    fn print_module(&self) -> String {
        format!("{} object files", self.emitted.len())
    }

    fn emit_object_file(&mut self, path: &Path) -> Result<(), Diagnostic> {
        if self.fail_emit {
            return Err(Diagnostic::new("disk full"));
        }
        self.emitted.push(path.display().to_string());
        Ok(())
    }
}

#[test]
fn lower_emits_verified_functions() {
    let funcs = [
        body(vec![Instruction::Return]),
        body(vec![
            Instruction::Const32 { result: reg(0), value: 1 },
            Instruction::Return,
        ]),
    ];
    let mut backend = RecordingBackend::default();
    Engine::default()
        .lower(&mut backend, &funcs, Path::new("out.o"))
        .unwrap();
    assert_eq!(backend.emitted, ["out.o"]);
}

#[test]
fn lower_reports_diagnostics_without_emitting() {
    let funcs = [
        body(vec![Instruction::Return]),
        body(vec![Instruction::Trap {
            trap_code: TrapCode::UnreachableCodeReached,
        }]),
    ];
    let mut backend = RecordingBackend::default();
    let error = Engine::default()
        .lower(&mut backend, &funcs, Path::new("out.o"))
        .unwrap_err();
    assert_matches!(
        error.kind(),
        ErrorKind::Codegen(message) if message == "function 1: trap instructions are not supported"
    );
    assert!(backend.emitted.is_empty());
}

#[test]
fn lower_reports_emit_failures() {
    let mut backend = RecordingBackend {
        fail_emit: true,
        ..RecordingBackend::default()
    };
    let error = Engine::default()
        .lower(&mut backend, &[body(vec![Instruction::Return])], Path::new("out.o"))
        .unwrap_err();
    assert_eq!(error.to_string(), "code generation failed: disk full");
}
