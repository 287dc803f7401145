//! Core primitives shared by the `wasmkern` crates.
//!
//! This crate has no dependency on the instruction encoding or the engine.

#![no_std]
#![warn(
    clippy::cast_lossless,
    clippy::missing_errors_doc,
    clippy::used_underscore_binding,
    clippy::redundant_closure_for_method_calls,
    clippy::type_repetition_in_bounds,
    clippy::inconsistent_struct_constructor,
    clippy::default_trait_access,
    clippy::items_after_statements
)]

#[cfg(feature = "std")]
extern crate std;

pub mod hint;
mod trap;
mod untyped;

pub use self::{
    trap::TrapCode,
    untyped::UntypedVal,
};

/// The size of a single linear memory page in bytes.
pub const WASM_PAGE_SIZE: usize = 65_536;

/// The maximum number of linear memory pages addressable with 32-bit pointers.
pub const WASM32_MAX_PAGES: u32 = 65_536;
