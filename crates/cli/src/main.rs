use crate::args::{Args, Command};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Instant;
use wasmkern::{
    ir::InstructionCounts,
    Config,
    Engine,
    FuncBody,
    LinearMemory,
    Store,
    TrapCode,
    UntypedVal,
    WASM_PAGE_SIZE,
};

mod args;
mod programs;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    match args.command {
        Command::CountLoop {
            strategy,
            iterations,
            seed,
            stats,
        } => {
            let mut config = Config::default();
            config.dispatch(strategy.into()).random_seed(seed);
            count_loop(&Engine::new(&config), iterations, stats)
        }
        Command::Oob {
            strategy,
            bounds_checks,
        } => {
            let mut config = Config::default();
            config
                .dispatch(strategy.into())
                .bounds_checks(bounds_checks.into());
            oob(&Engine::new(&config))
        }
    }
}

/// Executes the count loop and prints its final registers.
fn count_loop(engine: &Engine, iterations: u32, stats: bool) -> Result<()> {
    let instrs = programs::count_loop(iterations).context("failed to encode the count loop")?;
    if stats {
        println!("{instrs}");
        println!("{}", instrs.iter().collect::<InstructionCounts>());
    }
    let func = FuncBody::new(instrs);
    let mut store = Store::new(engine);
    let mut registers = vec![UntypedVal::default(); func.len_registers()];
    log::debug!("executing count loop with {:?}", engine.config());
    let started = Instant::now();
    engine
        .execute(&mut store, &func, &mut registers)
        .context("failed to execute the count loop")?;
    let elapsed = started.elapsed();
    println!("x = {}", u32::from(registers[0]));
    println!("i = {}", u32::from(registers[1]));
    println!("elapsed = {elapsed:?}");
    Ok(())
}

/// Loads from right past the end of a one page memory and prints the trap.
fn oob(engine: &Engine) -> Result<()> {
    let func = FuncBody::new(programs::load(0).context("failed to encode the load")?);
    let mut store = Store::new(engine);
    let memory = LinearMemory::new(engine, 1, Some(1)).context("failed to create linear memory")?;
    let reserved = memory.is_reserved();
    store.set_memory(memory);
    let mut registers = vec![UntypedVal::default(); func.len_registers()];
    registers[0] = UntypedVal::from(WASM_PAGE_SIZE as u32);
    let error = match engine.execute(&mut store, &func, &mut registers) {
        Ok(()) => bail!("out of bounds load at {WASM_PAGE_SIZE} did not trap"),
        Err(error) => error,
    };
    if error.as_trap_code() != Some(TrapCode::MemoryOutOfBounds) {
        return Err(error).context("out of bounds load failed unexpectedly");
    }
    let checked_by = if reserved { "guard pages" } else { "explicit checks" };
    println!("trapped: {error} (detected by {checked_by})");
    Ok(())
}
