use crate::{Engine, LinearMemory};
use core::fmt;
use rand::{rngs::SmallRng, RngCore, SeedableRng};
use std::boxed::Box;

/// The state an [`Engine`] executes function bodies against.
///
/// Owns the linear memory and the random source of `random.get`.
pub struct Store {
    /// The [`Engine`] the [`Store`] was created for.
    engine: Engine,
    /// The linear memory, if any.
    memory: Option<LinearMemory>,
    /// The random source of `random.get`.
    rng: Box<dyn RngCore + Send>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Store")
            .field("engine", &self.engine)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Creates a new [`Store`] for `engine` without linear memory.
    ///
    /// The random source is seeded with the seed configured for `engine`.
    pub fn new(engine: &Engine) -> Self {
        let seed = engine.config().get_random_seed();
        Self {
            engine: engine.clone(),
            memory: None,
            rng: Box::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// Returns the [`Engine`] the [`Store`] was created for.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Sets the linear memory of the [`Store`] and returns the previous one.
    pub fn set_memory(&mut self, memory: LinearMemory) -> Option<LinearMemory> {
        self.memory.replace(memory)
    }

    /// Returns a shared reference to the linear memory, if any.
    pub fn memory(&self) -> Option<&LinearMemory> {
        self.memory.as_ref()
    }

    /// Returns an exclusive reference to the linear memory, if any.
    pub fn memory_mut(&mut self) -> Option<&mut LinearMemory> {
        self.memory.as_mut()
    }

    /// Replaces the random source of `random.get`.
    pub fn set_random_source(&mut self, rng: impl RngCore + Send + 'static) {
        self.rng = Box::new(rng);
    }

    /// Returns the parts of the [`Store`] an execution works on.
    pub(crate) fn exec_parts(&mut self) -> (&mut dyn RngCore, Option<&mut LinearMemory>) {
        (&mut *self.rng, self.memory.as_mut())
    }
}
