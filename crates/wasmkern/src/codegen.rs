//! The interface to ahead-of-time code generation backends.
//!
//! `wasmkern` does not generate machine code itself. Backends implement
//! [`CodegenBackend`] and are driven by [`Engine::lower`].
//!
//! [`Engine::lower`]: crate::Engine::lower

use crate::FuncBody;
use core::fmt::{self, Display};
use std::{path::Path, string::String};

/// A problem reported by a [`CodegenBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    message: String,
}

impl Diagnostic {
    /// Creates a new [`Diagnostic`] with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message of the [`Diagnostic`].
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A code generation backend lowering function bodies to native code.
pub trait CodegenBackend {
    /// Verifies `func` and returns a [`Diagnostic`] if the backend cannot lower it.
    fn verify(&self, func: &FuncBody) -> Option<Diagnostic>;

    /// Returns the backend's textual representation of `func`.
    fn print_function(&self, func: &FuncBody) -> String;

    /// Returns the backend's textual representation of everything lowered so far.
    fn print_module(&self) -> String;

    /// Writes everything lowered so far as an object file to `path`.
    ///
    /// # Errors
    ///
    /// If the backend fails to produce or write the object file.
    fn emit_object_file(&mut self, path: &Path) -> Result<(), Diagnostic>;
}
