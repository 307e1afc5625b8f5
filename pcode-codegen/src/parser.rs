//! Recursive-descent expression parser and code generator.
//!
//! The grammar has three precedence levels (expression, simple
//! expression, term) over the factor productions, with a parallel
//! address-producing path for `@` and VAR parameters. Parsing emits code
//! as it goes: every production leaves its value (or address) on the
//! emitted stack.
//!
//! Everything the original kept in process-wide state lives on
//! [`ExprContext`]: the expression's abstract type, the innermost WITH
//! record, and the diagnostic log. Errors never unwind: productions file
//! a diagnostic and continue with a conservative recovery.

use crate::emitter::Emitter;
use crate::error::{ErrorCode, ErrorLog};
use crate::symtab::{SymbolId, SymbolTable, TypeCode};
use crate::token::{TokenKind, TokenStream};
use crate::types::ExprType;

use bitflags::bitflags;
use pcode_asm::float::{ARG1, ARG2};
use pcode_asm::{FloatOp, LibCall, Opcode, SetOp};

mod factor;
mod index;
mod pointer;


use crate::emitter::ObjectSink;

bitflags! {
    /// Access-path state of an l-value under reduction.
    pub(crate) struct VarFlags: u8 {
        /// The value's address is on the emitted stack.
        const DEREFERENCE = 0x01;
        /// The access goes through a loaded address, not a frame slot.
        const LOAD_ADDRESS = 0x02;
        /// The l-value came through a VAR parameter.
        const VAR_PARM = 0x04;
        /// A scaled byte index is on the emitted stack.
        const INDEXED = 0x08;
        /// `field_offset` must be added to the loaded address.
        const FIELD_OFFSET = 0x10;
    }
}

/// Writable copy of a symbol-table entry driving one factor reduction.
///
/// Only the owning factor function mutates it; its lifetime is one
/// top-level factor call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VarInfo {
    pub kind: TypeCode,
    pub type_sym: Option<SymbolId>,
    pub level: u8,
    pub offset: u16,
    pub size: u16,
    pub field_offset: u16,
    pub flags: VarFlags,
}

/// The record context established by a `WITH` statement.
#[derive(Debug, Clone, Copy)]
pub struct WithContext {
    /// The record type whose fields resolve without qualification.
    pub record_type: SymbolId,
    /// Frame level of the record (or of the pointer/VAR parameter).
    pub level: u8,
    /// Frame offset of the record (or of the pointer/VAR parameter).
    pub offset: u16,
    /// The `WITH` target is a pointer or VAR parameter; field access
    /// loads it and goes indirect.
    pub indirect: bool,
}

/// Parser context for one expression pass.
///
/// Owns the pass state the original kept in globals: the abstract type of
/// the expression, the innermost `WITH` record, and the error log.
pub struct ExprContext<'a, S> {
    pub(crate) tokens: &'a mut TokenStream,
    pub(crate) table: &'a SymbolTable,
    pub(crate) emit: &'a mut Emitter<S>,
    pub(crate) abstract_type: Option<SymbolId>,
    pub(crate) with_record: Option<WithContext>,
    pub(crate) errors: ErrorLog,
}

impl<'a, S: ObjectSink> ExprContext<'a, S> {
    /// Builds a context over the collaborating stages.
    pub fn new(tokens: &'a mut TokenStream, table: &'a SymbolTable, emit: &'a mut Emitter<S>) -> Self {
        Self {
            tokens,
            table,
            emit,
            abstract_type: None,
            with_record: None,
            errors: ErrorLog::default(),
        }
    }

    /// Establishes the innermost `WITH` record for this pass.
    pub fn set_with(&mut self, with: WithContext) {
        self.with_record = Some(with);
    }

    /// Diagnostics filed so far.
    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Consumes the context, returning the diagnostics.
    pub fn into_errors(self) -> ErrorLog {
        self.errors
    }

    pub(crate) fn error(&mut self, code: ErrorCode) {
        self.errors.report(code, self.tokens.index());
    }

    /// Consumes an expected closing token or files `code`.
    pub(crate) fn expect(&mut self, kind: TokenKind, code: ErrorCode) {
        if self.tokens.kind() == kind {
            self.tokens.advance();
        } else {
            self.error(code);
        }
    }

    /// Maps a type symbol onto the expression type taxonomy.
    pub fn expression_type(&self, id: SymbolId) -> ExprType {
        self.table.expression_type(id)
    }

    /// Parses one expression and emits the code that leaves its value on
    /// the stack; returns the resolved type.
    ///
    /// `find` is the type the surrounding context wants; `type_sym` names
    /// it when the context carries an abstract type (a set, record or
    /// enumeration).
    pub fn expression(&mut self, find: ExprType, type_sym: Option<SymbolId>) -> ExprType {
        if let Some(id) = type_sym {
            self.install_abstract(id);
        }

        let mut ty1 = self.simple_expression(find);

        let op = self.tokens.kind();
        if !is_relational(op) {
            return ty1;
        }
        self.tokens.advance();

        if op == TokenKind::In {
            return self.membership(ty1);
        }

        // A literal first operand of a string comparison must become a
        // string value before the second operand lands above it.
        if ty1 == ExprType::CSTRING {
            self.emit.lib(LibCall::CStr2Str);
            ty1 = ExprType::STRING;
        }

        let ty2 = self.simple_expression(ty1);
        self.relational(op, ty1, ty2)
    }

    /// `IN`: the first operand is on the stack; parses the set operand,
    /// pushes the base type's minimum and tests membership.
    fn membership(&mut self, ty1: ExprType) -> ExprType {
        if !ty1.is_ordinal() {
            self.error(ErrorCode::ExprType);
        }

        let ty2 = self.simple_expression(ExprType::SET);
        if !ty2.is_set() {
            self.error(ErrorCode::ExprType);
        }

        let min = self.abstract_min();
        self.emit.op(Opcode::PUSH(min));
        self.emit.set_op(SetOp::Member);
        ExprType::BOOLEAN
    }

    /// Emits the comparison joining two parsed operands.
    fn relational(&mut self, op: TokenKind, ty1: ExprType, mut ty2: ExprType) -> ExprType {
        use TokenKind::*;

        if ty1.is_any_string() && ty2.is_any_string() {
            if ty2 == ExprType::CSTRING {
                self.emit.lib(LibCall::CStr2Str);
            }
            self.emit.lib(LibCall::StrCmp);
            self.emit.op(Opcode::PUSH(0));
            self.emit.op(match op {
                Eq => Opcode::EQU,
                Ne => Opcode::NEQ,
                Lt => Opcode::LT,
                Le => Opcode::LTE,
                Gt => Opcode::GT,
                _ => Opcode::GTE,
            });
            return ExprType::BOOLEAN;
        }

        if ty1.is_set() && ty2.is_set() {
            match op {
                Eq => self.emit.set_op(SetOp::Equality),
                Ne => self.emit.set_op(SetOp::NonEquality),
                Ge => self.emit.set_op(SetOp::Contains),
                Le => {
                    // a <= b holds exactly when a - b is empty.
                    self.emit.set_op(SetOp::Difference);
                    self.emit.set_op(SetOp::Empty);
                    self.emit.set_op(SetOp::Equality);
                }
                _ => self.error(ErrorCode::ExprType),
            }
            return ExprType::BOOLEAN;
        }

        if ty1 == ExprType::REAL || ty2 == ExprType::REAL {
            let float_op = match op {
                Eq => FloatOp::Equ,
                Ne => FloatOp::Neq,
                Lt => FloatOp::Lt,
                Le => FloatOp::Lte,
                Gt => FloatOp::Gt,
                _ => FloatOp::Gte,
            };
            self.emit.float(float_op, self.conversion_flags(ty1, ty2));
            return ExprType::BOOLEAN;
        }

        if ty1.is_pointer() || ty1 == ExprType::ANY_POINTER {
            // `nil` adopts the counterpart operand's pointer type.
            if ty2 == ExprType::ANY_POINTER {
                ty2 = ty1;
            }
            if ty2 != ty1 && ty1 != ExprType::ANY_POINTER {
                self.error(ErrorCode::ExprType);
            }
            match op {
                Eq => self.emit.op(Opcode::EQU),
                Ne => self.emit.op(Opcode::NEQ),
                _ => self.error(ErrorCode::ExprType),
            }
            return ExprType::BOOLEAN;
        }

        if !types_comparable(ty1, ty2) {
            self.error(ErrorCode::ExprType);
        }

        let unsigned = ty1.is_unsigned() || ty2.is_unsigned();
        self.emit.op(match op {
            Eq => Opcode::EQU,
            Ne => Opcode::NEQ,
            Lt if unsigned => Opcode::ULT,
            Lt => Opcode::LT,
            Le if unsigned => Opcode::ULTE,
            Le => Opcode::LTE,
            Gt if unsigned => Opcode::UGT,
            Gt => Opcode::GT,
            _ if unsigned => Opcode::UGTE,
            _ => Opcode::GTE,
        });
        ExprType::BOOLEAN
    }

    /// `SimpleExpr = ['+' | '-'] Term { AddOp Term }`
    pub(crate) fn simple_expression(&mut self, find: ExprType) -> ExprType {
        let negate = match self.tokens.kind() {
            TokenKind::Plus => {
                self.tokens.advance();
                false
            }
            TokenKind::Minus => {
                self.tokens.advance();
                true
            }
            _ => false,
        };

        let mut ty1 = self.term(find);

        if negate {
            if ty1 == ExprType::REAL {
                self.emit.float(FloatOp::Neg, 0);
            } else if ty1.is_integer_family() {
                self.emit.op(Opcode::NEG);
            } else {
                self.error(ErrorCode::TermType);
            }
        }

        loop {
            let op = self.tokens.kind();
            match op {
                TokenKind::Plus => {
                    if ty1.is_any_string() || ty1 == ExprType::CHAR {
                        ty1 = self.concatenation(ty1);
                        continue;
                    }
                    self.tokens.advance();
                    let ty2 = self.term(find);
                    ty1 = self.additive(Opcode::ADD, FloatOp::Add, Some(SetOp::Union), ty1, ty2);
                }
                TokenKind::Minus => {
                    self.tokens.advance();
                    let ty2 = self.term(find);
                    ty1 = self.additive(Opcode::SUB, FloatOp::Sub, Some(SetOp::Difference), ty1, ty2);
                }
                TokenKind::Or => {
                    self.tokens.advance();
                    let ty2 = self.term(find);
                    ty1 = self.logical(Opcode::OR, ty1, ty2);
                }
                TokenKind::Xor => {
                    self.tokens.advance();
                    let ty2 = self.term(find);
                    ty1 = self.logical(Opcode::XOR, ty1, ty2);
                }
                TokenKind::SymDiff => {
                    self.tokens.advance();
                    let ty2 = self.term(find);
                    if ty1.is_set() && ty2.is_set() {
                        self.emit.set_op(SetOp::SymmetricDiff);
                        ty1 = ExprType::SET;
                    } else {
                        self.error(ErrorCode::ExprType);
                    }
                }
                _ => break,
            }
        }
        ty1
    }

    /// `+` over strings: duplicates the first operand onto the string
    /// stack so concatenation is non-destructive, promoting a char or
    /// literal first; dispatches on the second operand's string-ness.
    fn concatenation(&mut self, ty1: ExprType) -> ExprType {
        match ty1 {
            ExprType::STRING | ExprType::SHORT_STRING => self.emit.lib(LibCall::StrDup),
            ExprType::CSTRING => self.emit.lib(LibCall::CStr2Str),
            _ => self.emit.lib(LibCall::Char2Str),
        }

        self.tokens.advance();
        let ty2 = self.term(ExprType::ANY_STRING);

        match ty2 {
            ExprType::CHAR => self.emit.lib(LibCall::StrCatChar),
            ExprType::CSTRING => {
                self.emit.lib(LibCall::CStr2Str);
                self.emit.lib(LibCall::StrCat);
            }
            ExprType::STRING | ExprType::SHORT_STRING => self.emit.lib(LibCall::StrCat),
            _ => self.error(ErrorCode::TermType),
        }
        ExprType::STRING
    }

    /// `+`/`-` over numbers and sets.
    fn additive(&mut self, int_op: Opcode, float_op: FloatOp, set_op: Option<SetOp>, ty1: ExprType, ty2: ExprType) -> ExprType {
        if ty1.is_set() && ty2.is_set() {
            match set_op {
                Some(op) => self.emit.set_op(op),
                None => self.error(ErrorCode::ExprType),
            }
            return ExprType::SET;
        }

        if ty1 == ExprType::REAL || ty2 == ExprType::REAL {
            self.emit.float(float_op, self.conversion_flags(ty1, ty2));
            return ExprType::REAL;
        }

        if ty1.is_integer_family() && ty2.is_integer_family() {
            self.emit.op(int_op);
            return merge_integers(ty1, ty2);
        }

        self.error(ErrorCode::ExprType);
        self.emit.op(int_op);
        ExprType::INTEGER
    }

    /// `or`/`xor`/`and` over booleans and integers.
    fn logical(&mut self, op: Opcode, ty1: ExprType, ty2: ExprType) -> ExprType {
        let booleans = ty1 == ExprType::BOOLEAN && ty2 == ExprType::BOOLEAN;
        let integers = ty1.is_integer_family() && ty2.is_integer_family();

        if !booleans && !integers {
            self.error(ErrorCode::ExprType);
        }
        self.emit.op(op);
        if booleans {
            ExprType::BOOLEAN
        } else {
            merge_integers(ty1, ty2)
        }
    }

    /// `Term = Factor { MulOp Factor }`
    pub(crate) fn term(&mut self, find: ExprType) -> ExprType {
        let mut ty1 = self.factor(find);

        loop {
            let op = self.tokens.kind();
            match op {
                TokenKind::Star => {
                    self.tokens.advance();
                    let ty2 = self.factor(find);
                    ty1 = self.multiplicative(find, ty1, ty2);
                }
                TokenKind::Slash => {
                    self.tokens.advance();
                    let ty2 = self.factor(find);
                    ty1 = self.real_division(find, ty1, ty2);
                }
                TokenKind::Div => {
                    self.tokens.advance();
                    let ty2 = self.factor(find);
                    ty1 = self.integer_division(Opcode::DIV, Opcode::UDIV, ty1, ty2);
                }
                TokenKind::Mod => {
                    self.tokens.advance();
                    let ty2 = self.factor(find);
                    ty1 = self.integer_division(Opcode::MOD, Opcode::UMOD, ty1, ty2);
                }
                TokenKind::And => {
                    self.tokens.advance();
                    let ty2 = self.factor(find);
                    ty1 = self.logical(Opcode::AND, ty1, ty2);
                }
                TokenKind::Shl => {
                    self.tokens.advance();
                    let ty2 = self.factor(ExprType::INTEGER);
                    ty1 = self.shift(Opcode::SLL, ty1, ty2);
                }
                TokenKind::Shr => {
                    self.tokens.advance();
                    let ty2 = self.factor(ExprType::INTEGER);
                    ty1 = self.shift(Opcode::SRL, ty1, ty2);
                }
                _ => break,
            }
        }
        ty1
    }

    /// `*` over numbers and sets.
    fn multiplicative(&mut self, _find: ExprType, ty1: ExprType, ty2: ExprType) -> ExprType {
        if ty1.is_set() && ty2.is_set() {
            self.emit.set_op(SetOp::Intersection);
            return ExprType::SET;
        }

        if ty1 == ExprType::REAL || ty2 == ExprType::REAL {
            self.emit.float(FloatOp::Mul, self.conversion_flags(ty1, ty2));
            return ExprType::REAL;
        }

        if ty1.is_integer_family() && ty2.is_integer_family() {
            self.emit.op(Opcode::MUL);
            return merge_integers(ty1, ty2);
        }

        self.error(ErrorCode::TermType);
        self.emit.op(Opcode::MUL);
        ExprType::INTEGER
    }

    /// `/`: floating division. Two integer operands are both lifted when
    /// the surrounding context wants a real result.
    fn real_division(&mut self, find: ExprType, ty1: ExprType, ty2: ExprType) -> ExprType {
        if ty1 == ExprType::REAL || ty2 == ExprType::REAL {
            self.emit.float(FloatOp::Div, self.conversion_flags(ty1, ty2));
            return ExprType::REAL;
        }

        if ty1.is_integer_family() && ty2.is_integer_family() && find == ExprType::REAL {
            self.emit.float(FloatOp::Div, ARG1 | ARG2);
            return ExprType::REAL;
        }

        // An integer context gets integer division, under protest.
        self.error(ErrorCode::TermType);
        self.emit.op(Opcode::DIV);
        ExprType::INTEGER
    }

    /// `div`/`mod`: signed or unsigned by operand kind.
    fn integer_division(&mut self, signed: Opcode, unsigned: Opcode, ty1: ExprType, ty2: ExprType) -> ExprType {
        if !ty1.is_integer_family() || !ty2.is_integer_family() {
            self.error(ErrorCode::TermType);
        }

        if ty1.is_unsigned() || ty2.is_unsigned() {
            self.emit.op(unsigned);
        } else {
            self.emit.op(signed);
        }
        merge_integers(ty1, ty2)
    }

    fn shift(&mut self, op: Opcode, ty1: ExprType, ty2: ExprType) -> ExprType {
        if !ty1.is_integer_family() || !ty2.is_integer_family() {
            self.error(ErrorCode::TermType);
        }
        self.emit.op(op);
        ty1
    }

    /// Conversion flags lifting the integer side of a mixed real
    /// operation.
    fn conversion_flags(&self, ty1: ExprType, ty2: ExprType) -> u16 {
        let mut flags = 0;
        if ty1 != ExprType::REAL {
            flags |= ARG1;
        }
        if ty2 != ExprType::REAL {
            flags |= ARG2;
        }
        flags
    }

    /* abstract-type state machine */

    /// Installs the abstract type when the expression has none yet;
    /// otherwise requires a match.
    pub(crate) fn check_abstract(&mut self, id: SymbolId, code: ErrorCode) {
        match self.abstract_type {
            None => self.abstract_type = Some(id),
            Some(current) if current == id => (),
            Some(_) => self.error(code),
        }
    }

    fn install_abstract(&mut self, id: SymbolId) {
        if let Some(payload) = self.table.type_of(id) {
            match payload.code {
                // A set's identity is its base ordinal type.
                TypeCode::Set => self.abstract_type = payload.parent.or(Some(id)),
                TypeCode::Scalar | TypeCode::Record | TypeCode::Subrange => {
                    self.abstract_type = Some(id);
                }
                _ => (),
            }
        }
    }

    /// Minimum ordinal value of the expression's abstract type.
    pub(crate) fn abstract_min(&self) -> u16 {
        self.abstract_type
            .and_then(|id| self.table.type_of(id))
            .map(|payload| payload.min_value as i16 as u16)
            .unwrap_or(0)
    }
}

fn is_relational(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq | TokenKind::Ne | TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge | TokenKind::In
    )
}

/// Ordinals compare when their base kinds agree; the integer family
/// intermixes freely.
fn types_comparable(ty1: ExprType, ty2: ExprType) -> bool {
    if ty1 == ty2 {
        return true;
    }
    ty1.is_integer_family() && ty2.is_integer_family()
}

/// The joined type of an integer operation keeps the wider signedness.
fn merge_integers(ty1: ExprType, ty2: ExprType) -> ExprType {
    if ty1 == ty2 {
        ty1
    } else if ty1.is_unsigned() || ty2.is_unsigned() {
        ExprType::WORD
    } else {
        ExprType::INTEGER
    }
}
