//! Array index lists.

use super::ExprContext;
use crate::emitter::ObjectSink;
use crate::error::ErrorCode;
use crate::symtab::SymbolId;
use crate::token::TokenKind;

use pcode_asm::Opcode;

impl<S: ObjectSink> ExprContext<'_, S> {
    /// Parses one bracketed index list of `array_type` and emits the code
    /// that leaves the scaled byte offset on the stack.
    ///
    /// Each index expression is parsed as its dimension's ordinal type,
    /// shifted to zero base when the dimension's minimum is not zero, and
    /// multiplied by the dimension's stride, the `alloc_size` the symbol
    /// table precomputed on the index entry. Indices after the first fold
    /// into the running offset.
    pub fn array_index(&mut self, array_type: SymbolId) {
        debug_assert_eq!(self.tokens.kind(), TokenKind::LBracket);
        self.tokens.advance();

        let entries = self
            .table
            .type_of(array_type)
            .map(|payload| payload.index_types.clone())
            .unwrap_or_default();

        // Index expressions are their own typing contexts.
        let saved = self.abstract_type;
        let mut dimension = 0usize;

        loop {
            let entry = entries.get(dimension).copied();
            if entry.is_none() {
                self.error(ErrorCode::TooManyIndices);
            }

            let (find, min, stride) = entry
                .and_then(|e| {
                    let payload = self.table.type_of(e)?;
                    let find = payload
                        .parent
                        .map(|p| self.table.expression_type(p))
                        .unwrap_or(crate::types::ExprType::INTEGER);
                    Some((find, payload.min_value as i16, payload.alloc_size))
                })
                .unwrap_or((crate::types::ExprType::INTEGER, 0, 1));

            self.abstract_type = None;
            let ordinal = entry.and_then(|e| self.table.type_of(e)).and_then(|p| p.parent);
            let ty = self.expression(find, ordinal);
            if !ty.is_ordinal() {
                self.error(ErrorCode::SubrangeType);
            }

            if min != 0 {
                self.emit.op(Opcode::PUSH(min as u16));
                self.emit.op(Opcode::SUB);
            }
            if stride != 1 {
                self.emit.op(Opcode::PUSH(stride));
                self.emit.op(Opcode::MUL);
            }
            if dimension > 0 {
                self.emit.op(Opcode::ADD);
            }
            dimension += 1;

            match self.tokens.kind() {
                TokenKind::Comma => self.tokens.advance(),
                _ => break,
            }
        }

        self.abstract_type = saved;
        self.expect(TokenKind::RBracket, ErrorCode::RBracketExpected);
    }
}
