/// How the [`Engine`] dispatches from one instruction to the next.
///
/// All strategies produce bit-identical register results for the same input.
///
/// [`Engine`]: crate::Engine
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// A `match` over the current instruction inside a loop.
    Switch,
    /// A handler table indexed by the opcode of the current instruction.
    ///
    /// The table is built anew for every execution.
    Token,
    /// Instructions are linked to their handlers once and handlers chain
    /// into each other without going through a central `match`.
    #[default]
    Direct,
}

/// How linear memory accesses are bounds checked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BoundsCheck {
    /// Every access compares its effective address against the memory size.
    Explicit,
    /// Accesses are unchecked and rely on the inaccessible reservation behind
    /// the memory plus the [`trap_guard`] to trap.
    ///
    /// Only memories created as reserved support this mode. Executions with
    /// other memories silently use [`BoundsCheck::Explicit`].
    ///
    /// [`trap_guard`]: crate::trap_guard
    Guard,
}

impl Default for BoundsCheck {
    fn default() -> Self {
        if cfg!(unix) {
            Self::Guard
        } else {
            Self::Explicit
        }
    }
}

/// Configuration for an [`Engine`].
///
/// [`Engine`]: crate::Engine
#[derive(Debug, Default, Copy, Clone)]
pub struct Config {
    /// The dispatch strategy used to execute function bodies.
    dispatch: DispatchStrategy,
    /// How linear memory accesses are bounds checked.
    bounds_checks: BoundsCheck,
    /// The seed of the random source of new stores.
    random_seed: u64,
}

impl Config {
    /// Sets the [`DispatchStrategy`] of the [`Config`].
    ///
    /// Defaults to [`DispatchStrategy::Direct`].
    pub fn dispatch(&mut self, strategy: DispatchStrategy) -> &mut Self {
        self.dispatch = strategy;
        self
    }

    /// Sets the [`BoundsCheck`] mode of the [`Config`].
    ///
    /// Defaults to [`BoundsCheck::Guard`] on Unix platforms and to
    /// [`BoundsCheck::Explicit`] everywhere else.
    pub fn bounds_checks(&mut self, mode: BoundsCheck) -> &mut Self {
        self.bounds_checks = mode;
        self
    }

    /// Sets the seed of the random source of stores created for the [`Engine`].
    ///
    /// Defaults to `0`.
    ///
    /// [`Engine`]: crate::Engine
    pub fn random_seed(&mut self, seed: u64) -> &mut Self {
        self.random_seed = seed;
        self
    }

    /// Returns the [`DispatchStrategy`] of the [`Config`].
    pub fn get_dispatch(&self) -> DispatchStrategy {
        self.dispatch
    }

    /// Returns the [`BoundsCheck`] mode of the [`Config`].
    pub fn get_bounds_checks(&self) -> BoundsCheck {
        self.bounds_checks
    }

    /// Returns the random seed of the [`Config`].
    pub fn get_random_seed(&self) -> u64 {
        self.random_seed
    }
}
