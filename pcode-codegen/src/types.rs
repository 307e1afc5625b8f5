//! Abstract expression type taxonomy.
//!
//! Every expression resolves to one of these types. A pointer type is the
//! ordinal value of its base type with a pointer bit set; the encoding is
//! private to this module; callers go through the constructors and
//! predicates.

use thiserror::Error;

/// Failure to form or strip a pointer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Pointers to pointers are not representable in the machine word
    /// shape of a cast and are rejected.
    #[error("pointer-to-pointer types are not supported")]
    PointerDepth,
    /// Dereferencing a non-pointer type.
    #[error("the type is not a pointer")]
    NotAPointer,
}

/// Resolved type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprType(u16);

impl ExprType {
    /// Not yet known; also the conservative recovery type.
    pub const UNKNOWN: Self = Self(0x00);
    /// 16-bit signed integer.
    pub const INTEGER: Self = Self(0x01);
    /// 16-bit unsigned integer.
    pub const WORD: Self = Self(0x02);
    /// 8-bit signed integer.
    pub const SHORT_INTEGER: Self = Self(0x03);
    /// 8-bit unsigned integer.
    pub const SHORT_WORD: Self = Self(0x04);
    /// Character.
    pub const CHAR: Self = Self(0x05);
    /// Boolean.
    pub const BOOLEAN: Self = Self(0x06);
    /// Enumeration value; carries an abstract type.
    pub const SCALAR: Self = Self(0x07);
    /// IEEE-754 double.
    pub const REAL: Self = Self(0x08);
    /// 64-element bitset; carries an abstract type.
    pub const SET: Self = Self(0x09);
    /// `[]`; adopts a set type on demand.
    pub const EMPTY_SET: Self = Self(0x0a);
    /// String variable value.
    pub const STRING: Self = Self(0x0b);
    /// Short-string variable value.
    pub const SHORT_STRING: Self = Self(0x0c);
    /// Read-only string literal value.
    pub const CSTRING: Self = Self(0x0d);
    /// Whole-record value; carries an abstract type.
    pub const RECORD: Self = Self(0x0e);
    /// File variable.
    pub const FILE: Self = Self(0x0f);
    /// Any ordinal type is acceptable.
    pub const ANY_ORDINAL: Self = Self(0x10);
    /// Any string type is acceptable.
    pub const ANY_STRING: Self = Self(0x11);
    /// `nil`; adopts the counterpart pointer type.
    pub const ANY_POINTER: Self = Self(0x12);

    const POINTER: u16 = 0x8000;

    /// The pointer type of `self`.
    pub fn pointer_to(self) -> Result<Self, TypeError> {
        if self.is_pointer() || self == Self::ANY_POINTER {
            return Err(TypeError::PointerDepth);
        }
        Ok(Self(self.0 | Self::POINTER))
    }

    /// The type `self` points to.
    pub fn deref(self) -> Result<Self, TypeError> {
        if !self.is_pointer() {
            return Err(TypeError::NotAPointer);
        }
        Ok(Self(self.0 & !Self::POINTER))
    }

    /// True for pointer types.
    pub const fn is_pointer(self) -> bool {
        self.0 & Self::POINTER != 0
    }

    /// `self` with any pointer bit stripped.
    pub const fn base(self) -> Self {
        Self(self.0 & !Self::POINTER)
    }

    /// Integers of any width and signedness, plus char, boolean and
    /// scalar values.
    pub fn is_ordinal(self) -> bool {
        matches!(
            self,
            Self::INTEGER
                | Self::WORD
                | Self::SHORT_INTEGER
                | Self::SHORT_WORD
                | Self::CHAR
                | Self::BOOLEAN
                | Self::SCALAR
        )
    }

    /// Integers of any width and signedness.
    pub fn is_integer_family(self) -> bool {
        matches!(self, Self::INTEGER | Self::WORD | Self::SHORT_INTEGER | Self::SHORT_WORD)
    }

    /// Unsigned members of the integer family.
    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::WORD | Self::SHORT_WORD)
    }

    /// String values of any representation.
    pub fn is_any_string(self) -> bool {
        matches!(self, Self::STRING | Self::SHORT_STRING | Self::CSTRING)
    }

    /// Set values, including the empty constructor.
    pub fn is_set(self) -> bool {
        matches!(self, Self::SET | Self::EMPTY_SET)
    }
}
