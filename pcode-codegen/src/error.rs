//! Diagnostics of the expression parser.
//!
//! The parser never unwinds: every non-fatal error is filed here and
//! parsing continues with a conservative recovery, so one pass surfaces a
//! cascade of diagnostics rather than a single abort.

use thiserror::Error;

/// Parse and type error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Operand types do not agree with the term operator.
    #[error("operand type is not valid for the term operator")]
    TermType,
    /// The token cannot start a factor.
    #[error("invalid factor")]
    InvalidFactor,
    /// The factor's type is not valid here.
    #[error("factor type mismatch")]
    FactorType,
    /// Operand types do not agree with the expression operator.
    #[error("operand type is not valid for the expression operator")]
    ExprType,
    /// A scalar does not belong to the expression's abstract type.
    #[error("scalar type mismatch")]
    ScalarType,
    /// A subrange value does not belong to the expression's abstract type.
    #[error("subrange type mismatch")]
    SubrangeType,
    /// A set element does not belong to the set's base type.
    #[error("set element type mismatch")]
    SetElementType,
    /// The context requires a pointer type.
    #[error("pointer type expected")]
    PointerType,
    /// Indexing applied to something that is not an array.
    #[error("array type expected")]
    ArrayType,
    /// A field reference outside a matching WITH statement.
    #[error("field is not addressable here")]
    RecordObject,
    /// A record name used as a value outside its abstract-type context.
    #[error("record type mismatch")]
    RecordType,
    /// `.` was not followed by a field of the record.
    #[error("field name expected")]
    FieldExpected,
    /// The type cast cannot be performed.
    #[error("invalid type cast")]
    InvalidType,
    /// A VAR parameter's type must match the formal parameter exactly.
    #[error("VAR parameter type mismatch")]
    VarParmType,
    /// The expression cannot be passed as a VAR parameter.
    #[error("invalid VAR parameter")]
    InvalidVarParm,
    /// More indices supplied than the array has dimensions.
    #[error("too many array indices")]
    TooManyIndices,
    /// A constant does not fit the 16-bit machine word.
    #[error("constant overflows the machine word")]
    Overflow,
    /// `(` expected.
    #[error("'(' expected")]
    LParenExpected,
    /// `)` expected.
    #[error("')' expected")]
    RParenExpected,
    /// `]` expected.
    #[error("']' expected")]
    RBracketExpected,
}

/// One filed diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    /// What went wrong.
    pub code: ErrorCode,
    /// Index of the offending token in the stream.
    pub token_index: usize,
}

/// Accumulates diagnostics across a parsing pass.
#[derive(Debug, Default)]
pub struct ErrorLog {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorLog {
    /// Files a diagnostic; parsing continues.
    pub fn report(&mut self, code: ErrorCode, token_index: usize) {
        tracing::debug!(?code, token_index, "diagnostic");
        self.diagnostics.push(Diagnostic { code, token_index });
    }

    /// True when the pass produced no diagnostics.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The filed diagnostics, in parse order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// The filed error codes, in parse order.
    pub fn codes(&self) -> impl Iterator<Item = ErrorCode> + '_ {
        self.diagnostics.iter().map(|d| d.code)
    }
}
