//! The `wasmkern` execution core.
//!
//! `wasmkern` executes pre-translated function bodies made of [`Instruction`]s
//! on a register file of [`UntypedVal`]s. It offers three interchangeable
//! dispatch strategies and two ways to bounds check linear memory accesses:
//!
//! - [`DispatchStrategy::Switch`]: a plain `match` loop over the instructions.
//! - [`DispatchStrategy::Token`]: a per-execution table of handlers indexed by [`Opcode`].
//! - [`DispatchStrategy::Direct`]: a pre-linked sequence where every instruction
//!   carries the address of its own handler and handlers chain into each other.
//!
//! With [`BoundsCheck::Guard`] linear memory is placed in front of a large
//! inaccessible reservation so that out-of-bounds accesses fault instead of
//! being checked. The [`trap_guard`] turns such faults into
//! [`TrapCode::MemoryOutOfBounds`] traps.
//!
//! # Example
//!
//! ```
//! use wasmkern::{
//!     ir::{BranchOffset, Instruction, InstrSeq, Reg},
//!     Engine,
//!     FuncBody,
//!     Store,
//!     UntypedVal,
//! };
//!
//! let (x, i, cond) = (Reg::from(0), Reg::from(1), Reg::from(2));
//! let body = FuncBody::new(InstrSeq::new(vec![
//!     Instruction::I32AddImm { result: i, lhs: i, rhs: 1 },
//!     Instruction::I32AddImm { result: x, lhs: x, rhs: 2 },
//!     Instruction::I32LtUImm { result: cond, lhs: i, rhs: 10 },
//!     Instruction::BranchNez { condition: cond, offset: BranchOffset::from(-4) },
//!     Instruction::Return,
//! ])?);
//! let engine = Engine::default();
//! let mut store = Store::new(&engine);
//! let mut registers = [UntypedVal::default(); 3];
//! engine.execute(&mut store, &body, &mut registers)?;
//! assert_eq!(u32::from(registers[0]), 20);
//! # Ok::<(), wasmkern::Error>(())
//! ```

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

pub mod codegen;
mod engine;
mod error;
mod func;
mod memory;
mod store;
pub mod trap_guard;

pub use self::{
    codegen::{CodegenBackend, Diagnostic},
    engine::{
        executor::{resolve_handlers, HandlerTable, LinkedCode, LinkedInstr},
        BoundsCheck,
        Config,
        DispatchStrategy,
        Engine,
    },
    error::{Error, ErrorKind},
    func::FuncBody,
    memory::{wasm32_reservation_size, LinearMemory, MemoryError},
    store::Store,
};
pub use wasmkern_core::{TrapCode, UntypedVal, WASM32_MAX_PAGES, WASM_PAGE_SIZE};
pub use wasmkern_ir::{self as ir, Instruction, InstrSeq, Opcode};

/// Defines some errors that may occur upon translation or execution.
pub mod errors {
    pub use super::memory::MemoryError;
    pub use wasmkern_ir::EncodingError;
}

/// The calling convention of direct threaded handlers.
///
/// Every [`Handler`](abi::Handler) receives the register file, the current
/// linked instruction, the base address and the accessible size of the linear
/// memory, and the rarely accessed [`ExecState`](abi::ExecState). Embedders
/// can drive a [`LinkedCode`] with these types without going through
/// [`Engine::execute`].
pub mod abi {
    pub use super::engine::executor::{
        ExecState,
        FrameRegisters,
        Handler,
        HandlerTable,
        InstructionPtr,
        LinkedInstr,
        Md,
        Ms,
        Next,
        Pc,
        Sp,
    };
}
