//! Interpreter for the p-code stack machine.
//!
//! The machine is 16-bit and word addressed: one flat byte buffer holds the
//! string stack, the read-only data, the Pascal stack and the heap, and a
//! separate read-only byte array holds the instructions. Execution is a
//! plain synchronous loop; hosts that need to interleave work can drive the
//! machine one instruction at a time with [`Executor::step`].

#![warn(missing_docs)]

pub mod consts;
pub mod error;
pub mod executor;
pub mod state;

pub use error::{ExecutorError, RuntimeError};
pub use executor::{Executor, MemoryLayout, Registers};
pub use state::ExecuteState;

/// Convenience re-exports for hosts of the machine.
pub mod prelude {
    pub use pcode_asm::{Fault, FloatOp, LibCall, Opcode, SetOp, SysIo};

    pub use crate::consts::*;
    pub use crate::error::{ExecutorError, RuntimeError};
    pub use crate::executor::{Executor, MemoryLayout, Registers};
    pub use crate::state::ExecuteState;
}
