//! Instruction set of the p-code stack machine.
//!
//! The compiler back end lowers Pascal to this bytecode and the
//! [`pcode-vm`](https://crates.io/crates/pcode-vm) interpreter executes it.
//! This crate owns the opcode space, the sub-operation codes carried by the
//! `FLOAT`/`SETOP`/`SYSIO`/`LIB` instructions, and the runtime fault codes
//! shared between the toolchain stages.

#![warn(missing_docs)]

mod fault;
pub mod float;
mod libcall;
mod opcode;
mod setop;
mod sysio;

pub use fault::Fault;
pub use float::FloatOp;
pub use libcall::LibCall;
pub use opcode::{consts, DecodeError, Opcode};
pub use setop::SetOp;
pub use sysio::SysIo;

/// A 16-bit inline instruction argument.
pub type Immediate16 = u16;

/// A static nesting level carried by stack-reference instructions.
pub type StaticLevel = u8;

/// Number of 16-bit words a real value occupies on the stack.
pub const REAL_WORDS: usize = 4;

/// Number of 16-bit words a set value occupies on the stack.
pub const SET_WORDS: usize = 4;

/// Number of 16-bit words a string variable occupies on the stack.
pub const STRING_WORDS: usize = 3;
