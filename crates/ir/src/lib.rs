//! The internal instruction encoding executed by the `wasmkern` engine.
//!
//! Instructions are produced once by a translation step and are immutable
//! afterwards. Every [`Instruction`] has a fixed size so that sequences are
//! directly indexable and branch offsets can be counted in instructions.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod counts;
mod error;
mod instr;
mod primitives;
mod seq;


pub use self::{
    counts::InstructionCounts,
    error::EncodingError,
    instr::{Instruction, Opcode},
    primitives::{BranchOffset, Reg},
    seq::InstrSeq,
};
pub use wasmkern_core as core;
