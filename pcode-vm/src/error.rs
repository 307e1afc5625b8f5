//! Runtime interpreter error implementation.

use pcode_asm::Fault;

use std::error::Error as StdError;
use std::{fmt, io};
use thiserror::Error;

/// Executor error variants.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Execution raised a machine fault at the recorded program counter.
    #[error("execution fault {fault} at pc {pc:#06x}")]
    Fault {
        /// The fault code.
        fault: Fault,
        /// Program counter of the faulting instruction.
        pc: u16,
    },
    /// The program and memory layout cannot describe a machine.
    #[error("invalid machine layout: {0}")]
    Layout(&'static str),
    /// I/O and OS related errors.
    #[error("unrecoverable error: {0}")]
    Io(#[from] io::Error),
}

impl ExecutorError {
    /// Describe a runtime error as a fault at `pc` or a halt.
    pub fn from_runtime(error: RuntimeError, pc: u16) -> Self {
        match error {
            RuntimeError::Recoverable(fault) => Self::Fault { fault, pc },
            RuntimeError::Halt(e) => Self::Io(e),
        }
    }

    /// Return the fault that caused this error, if applicable.
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault { fault, .. } => Some(*fault),
            _ => None,
        }
    }
}

/// Runtime error description that should either carry a machine fault code
/// or halt the execution.
#[derive(Debug)]
pub enum RuntimeError {
    /// Specified fault with a well-formed code.
    Recoverable(Fault),
    /// Unspecified error that should halt the execution.
    Halt(io::Error),
}

impl RuntimeError {
    /// Flag whether the error carries a machine fault code.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }

    /// Flag whether the error must halt the execution.
    pub const fn must_halt(&self) -> bool {
        matches!(self, Self::Halt(_))
    }

    /// Produces a `halt` error from `io`.
    pub fn from_io<E>(e: E) -> Self
    where
        E: Into<io::Error>,
    {
        Self::Halt(e.into())
    }
}

impl From<Fault> for RuntimeError {
    fn from(fault: Fault) -> Self {
        RuntimeError::Recoverable(fault)
    }
}

impl From<io::Error> for RuntimeError {
    fn from(e: io::Error) -> Self {
        RuntimeError::Halt(e)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recoverable(e) => e.fmt(f),
            Self::Halt(e) => e.fmt(f),
        }
    }
}

impl StdError for RuntimeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Recoverable(e) => Some(e),
            Self::Halt(e) => Some(e),
        }
    }
}
