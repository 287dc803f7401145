use clap::{Parser, Subcommand, ValueEnum};
use wasmkern::{BoundsCheck, DispatchStrategy};

/// Runs the demo programs of the wasmkern execution core.
#[derive(Parser, Debug)]
#[command(name = "wasmkern", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Counts a register up to `--iterations` starting from a random value.
    CountLoop {
        /// The dispatch strategy executing the loop.
        #[arg(long, value_enum, default_value_t = Strategy::Direct)]
        strategy: Strategy,

        /// The number of loop iterations.
        #[arg(long, default_value_t = 10_000_000)]
        iterations: u32,

        /// The seed of the random start value.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Prints the disassembly and instruction statistics of the loop.
        #[arg(long)]
        stats: bool,
    },
    /// Loads from right past the end of a one page linear memory and reports the trap.
    Oob {
        /// The dispatch strategy executing the load.
        #[arg(long, value_enum, default_value_t = Strategy::Direct)]
        strategy: Strategy,

        /// How the load is bounds checked.
        #[arg(long, value_enum, default_value_t = Bounds::Guard)]
        bounds_checks: Bounds,
    },
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Strategy {
    Switch,
    Token,
    Direct,
}

impl From<Strategy> for DispatchStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Switch => Self::Switch,
            Strategy::Token => Self::Token,
            Strategy::Direct => Self::Direct,
        }
    }
}

#[derive(ValueEnum, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Bounds {
    Explicit,
    Guard,
}

impl From<Bounds> for BoundsCheck {
    fn from(bounds: Bounds) -> Self {
        match bounds {
            Bounds::Explicit => Self::Explicit,
            Bounds::Guard => Self::Guard,
        }
    }
}
