//! Fuzzing infrastructure for the `wasmkern` execution core.
//!
//! [`FuzzProgram`] generates valid function bodies from unstructured fuzzer
//! input. All branches of a generated body point forward so every execution
//! terminates after at most one pass over the body. [`execute`] runs a
//! program with one engine configuration so that fuzz targets can compare
//! the dispatch strategies and bounds checking modes against each other.

mod program;


pub use self::program::{FuzzInput, FuzzProgram, MAX_INSTRS, MAX_PAGES, MAX_REGISTERS};
use wasmkern::{
    BoundsCheck,
    Config,
    DispatchStrategy,
    Engine,
    FuncBody,
    LinearMemory,
    Store,
    TrapCode,
    UntypedVal,
};

/// Every dispatch strategy of the engine.
pub const STRATEGIES: [DispatchStrategy; 3] = [
    DispatchStrategy::Switch,
    DispatchStrategy::Token,
    DispatchStrategy::Direct,
];

/// Every bounds checking mode of the engine.
pub const BOUNDS_CHECKS: [BoundsCheck; 2] = [BoundsCheck::Explicit, BoundsCheck::Guard];

/// The observable result of executing a [`FuzzProgram`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// The final values of all registers.
    ///
    /// Empty if the execution trapped.
    pub registers: Vec<u64>,
    /// The trap of the execution, if any.
    pub trap: Option<TrapCode>,
    /// The final size of the linear memory in pages.
    pub memory_pages: u32,
    /// The final contents of the linear memory.
    ///
    /// Empty if the execution trapped since a faulting store may have
    /// partially written memory when bounds are guarded.
    pub memory: Vec<u8>,
}

/// Executes `input` with `strategy` and `bounds_checks`.
///
/// # Panics
///
/// If the linear memory of `input` cannot be created or if the execution
/// fails with something other than a trap.
pub fn execute(
    input: &FuzzInput,
    strategy: DispatchStrategy,
    bounds_checks: BoundsCheck,
) -> ExecutionResult {
    let mut config = Config::default();
    config
        .dispatch(strategy)
        .bounds_checks(bounds_checks)
        .random_seed(input.seed);
    let engine = Engine::new(&config);
    let program = &input.program;
    let func = FuncBody::new(program.instrs().clone());
    let mut store = Store::new(&engine);
    let memory = LinearMemory::new(&engine, program.initial_pages(), Some(program.maximum_pages()))
        .unwrap_or_else(|error| panic!("failed to create linear memory: {error}"));
    store.set_memory(memory);
    let mut registers = program
        .params()
        .iter()
        .copied()
        .map(UntypedVal::from)
        .collect::<Vec<_>>();
    registers.resize(func.len_registers(), UntypedVal::default());
    let trap = match engine.execute(&mut store, &func, &mut registers) {
        Ok(()) => None,
        Err(error) => match error.as_trap_code() {
            Some(trap_code) => Some(trap_code),
            None => panic!("execution failed without trapping: {error}"),
        },
    };
    let memory = store.memory().expect("the store owns the memory created above");
    match trap {
        Some(_) => ExecutionResult {
            registers: Vec::new(),
            trap,
            memory_pages: memory.size_pages(),
            memory: Vec::new(),
        },
        None => ExecutionResult {
            registers: registers.into_iter().map(u64::from).collect(),
            trap,
            memory_pages: memory.size_pages(),
            memory: memory.data().to_vec(),
        },
    }
}

/// Executes `input` with every engine configuration and asserts that all agree.
///
/// # Panics
///
/// If two engine configurations disagree on the result of `input`.
pub fn assert_consistent(input: &FuzzInput) -> ExecutionResult {
    let expected = execute(input, DispatchStrategy::Switch, BoundsCheck::Explicit);
    for strategy in STRATEGIES {
        for bounds_checks in BOUNDS_CHECKS {
            let result = execute(input, strategy, bounds_checks);
            assert_eq!(
                result, expected,
                "{strategy:?} with {bounds_checks:?} bounds checks diverged on:\n{}",
                input.program.instrs(),
            );
        }
    }
    expected
}
