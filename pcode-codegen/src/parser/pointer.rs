//! The address-producing factor path.
//!
//! Mirrors the value path but emits address loads: `@` expressions and
//! VAR-parameter actuals come through here. A `^` met on this path pushes
//! the pointer's value, which is the target's address, rather than the
//! target itself.

use super::{ExprContext, VarFlags, VarInfo};
use crate::emitter::ObjectSink;
use crate::error::ErrorCode;
use crate::symtab::{SymbolId, SymbolKind, TypeCode};
use crate::token::TokenKind;
use crate::types::ExprType;

use pcode_asm::Opcode;

impl<S: ObjectSink> ExprContext<'_, S> {
    /// Parses an l-value and emits code leaving its address on the
    /// stack; returns the pointer type of the designated object.
    pub(crate) fn pointer_factor(&mut self) -> ExprType {
        if self.tokens.kind() != TokenKind::Identifier {
            self.error(ErrorCode::InvalidVarParm);
            self.tokens.advance();
            self.emit.op(Opcode::PUSH(0));
            return ExprType::UNKNOWN;
        }

        let Some(id) = self.tokens.current().symbol else {
            self.error(ErrorCode::InvalidVarParm);
            self.tokens.advance();
            self.emit.op(Opcode::PUSH(0));
            return ExprType::UNKNOWN;
        };
        let symbol = self.table.get(id);

        match &symbol.kind {
            SymbolKind::Variable(payload) => {
                let payload = *payload;
                let level = symbol.level;
                self.tokens.advance();

                let mut info = VarInfo {
                    kind: self.pointer_type_code(payload.parent),
                    type_sym: Some(payload.parent),
                    level,
                    offset: payload.offset,
                    size: payload.size,
                    field_offset: 0,
                    flags: VarFlags::empty(),
                };
                self.simple_pointer_factor(&mut info)
            }

            SymbolKind::VarParameter(payload) => {
                let payload = *payload;
                let level = symbol.level;
                self.tokens.advance();

                // The stored word already is the actual's address.
                self.emit.frame(Opcode::LDS, level, payload.offset);

                let mut info = VarInfo {
                    kind: self.pointer_type_code(payload.parent),
                    type_sym: Some(payload.parent),
                    level,
                    offset: payload.offset,
                    size: payload.size,
                    field_offset: 0,
                    flags: VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS | VarFlags::VAR_PARM,
                };
                self.simple_pointer_factor(&mut info)
            }

            SymbolKind::Field(payload) => {
                let payload = *payload;
                self.tokens.advance();
                self.with_field_pointer(payload)
            }

            _ => {
                self.error(ErrorCode::InvalidVarParm);
                self.tokens.advance();
                self.emit.op(Opcode::PUSH(0));
                ExprType::UNKNOWN
            }
        }
    }

    /// Parses an actual VAR parameter: an addressable l-value whose type
    /// must match the formal exactly.
    pub fn var_parameter(&mut self, find: ExprType, type_sym: Option<SymbolId>) -> ExprType {
        if let Some(id) = type_sym {
            self.install_abstract(id);
        }

        let ty = self.pointer_factor();
        let designated = ty.deref().unwrap_or(ty);

        if find != ExprType::UNKNOWN && designated != find {
            self.error(ErrorCode::VarParmType);
        }
        ty
    }

    /// Address-mode mirror of the simple-factor reduction.
    fn simple_pointer_factor(&mut self, info: &mut VarInfo) -> ExprType {
        match info.kind {
            TypeCode::Int
            | TypeCode::Word
            | TypeCode::ShortInt
            | TypeCode::ShortWord
            | TypeCode::Boolean
            | TypeCode::Char
            | TypeCode::Real
            | TypeCode::Scalar
            | TypeCode::ScalarObject
            | TypeCode::Set
            | TypeCode::String
            | TypeCode::ShortString
            | TypeCode::File
            | TypeCode::TextFile => {
                self.load_address(info);
                self.designated_pointer(info)
            }

            TypeCode::Subrange => {
                let Some(payload) = info.type_sym.and_then(|id| self.table.type_of(id)) else {
                    self.error(ErrorCode::SubrangeType);
                    return ExprType::UNKNOWN;
                };
                let (subtype, parent) = (payload.subtype, payload.parent);
                match subtype {
                    Some(code) => {
                        info.kind = code;
                        info.type_sym = parent.or(info.type_sym);
                        self.simple_pointer_factor(info)
                    }
                    None => {
                        self.error(ErrorCode::SubrangeType);
                        ExprType::UNKNOWN
                    }
                }
            }

            TypeCode::Record => self.record_pointer_factor(info),

            TypeCode::Array => {
                if self.tokens.kind() == TokenKind::LBracket {
                    let Some(array_type) = info.type_sym else {
                        self.error(ErrorCode::ArrayType);
                        return ExprType::UNKNOWN;
                    };
                    self.array_index(array_type);

                    if info.flags.contains(VarFlags::DEREFERENCE) {
                        self.emit.op(Opcode::ADD);
                    } else {
                        info.flags |= VarFlags::INDEXED;
                    }

                    let element = self.table.type_of(array_type).and_then(|t| t.parent);
                    let Some(element) = element else {
                        self.error(ErrorCode::ArrayType);
                        return ExprType::UNKNOWN;
                    };
                    info.kind = self.pointer_type_code(element);
                    info.type_sym = Some(element);
                    info.size = self.table.type_of(element).map(|t| t.alloc_size).unwrap_or(2);
                    self.simple_pointer_factor(info)
                } else {
                    self.load_address(info);
                    self.error(ErrorCode::PointerType);
                    ExprType::UNKNOWN
                }
            }

            TypeCode::Pointer => {
                if self.tokens.kind() == TokenKind::Caret {
                    self.tokens.advance();

                    // The pointer's value is the target's address.
                    self.load_word(info);

                    let target = info.type_sym.and_then(|id| self.table.type_of(id)).and_then(|t| t.parent);
                    let Some(target) = target else {
                        self.error(ErrorCode::PointerType);
                        return ExprType::UNKNOWN;
                    };

                    if self.tokens.kind() == TokenKind::Dot || self.tokens.kind() == TokenKind::LBracket {
                        info.flags = VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS;
                        info.field_offset = 0;
                        info.kind = self.pointer_type_code(target);
                        info.type_sym = Some(target);
                        return self.simple_pointer_factor(info);
                    }

                    match self.table.expression_type(target).pointer_to() {
                        Ok(p) => p,
                        Err(_) => {
                            self.error(ErrorCode::PointerType);
                            ExprType::UNKNOWN
                        }
                    }
                } else {
                    // The address of a pointer is a pointer to a pointer.
                    self.load_address(info);
                    self.error(ErrorCode::PointerType);
                    ExprType::UNKNOWN
                }
            }

            _ => {
                self.error(ErrorCode::InvalidVarParm);
                ExprType::UNKNOWN
            }
        }
    }

    /// `record.field` chains in address mode.
    fn record_pointer_factor(&mut self, info: &mut VarInfo) -> ExprType {
        let record_type = info.type_sym;

        if self.tokens.kind() != TokenKind::Dot {
            self.load_address(info);
            return self.designated_pointer(info);
        }
        self.tokens.advance();

        let field = match self.tokens.current().symbol {
            Some(id) if self.tokens.kind() == TokenKind::Identifier => match &self.table.get(id).kind {
                SymbolKind::Field(payload) if Some(payload.record) == record_type => *payload,
                _ => {
                    self.error(ErrorCode::FieldExpected);
                    self.tokens.advance();
                    return ExprType::UNKNOWN;
                }
            },
            _ => {
                self.error(ErrorCode::FieldExpected);
                return ExprType::UNKNOWN;
            }
        };
        self.tokens.advance();

        if info.flags.contains(VarFlags::DEREFERENCE) {
            info.flags |= VarFlags::FIELD_OFFSET;
            info.field_offset += field.offset;
        } else {
            info.offset += field.offset;
        }
        info.size = field.size;
        info.kind = self.pointer_type_code(field.parent);
        info.type_sym = Some(field.parent);
        self.simple_pointer_factor(info)
    }

    /// A bare WITH field in address mode.
    fn with_field_pointer(&mut self, field: crate::symtab::FieldPayload) -> ExprType {
        let Some(with) = self.with_record else {
            self.error(ErrorCode::RecordObject);
            return ExprType::UNKNOWN;
        };
        if field.record != with.record_type {
            self.error(ErrorCode::RecordObject);
            return ExprType::UNKNOWN;
        }

        let mut info = VarInfo {
            kind: self.pointer_type_code(field.parent),
            type_sym: Some(field.parent),
            level: with.level,
            offset: with.offset,
            size: field.size,
            field_offset: 0,
            flags: VarFlags::empty(),
        };

        if with.indirect {
            self.emit.frame(Opcode::LDS, with.level, with.offset);
            info.flags |= VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS | VarFlags::FIELD_OFFSET;
            info.field_offset = field.offset;
        } else {
            info.offset += field.offset;
        }

        self.simple_pointer_factor(&mut info)
    }

    /// The pointer type of the object `info` designates.
    fn designated_pointer(&mut self, info: &VarInfo) -> ExprType {
        let ty = info
            .type_sym
            .map(|id| self.table.expression_type(id))
            .unwrap_or(ExprType::UNKNOWN);

        match ty.pointer_to() {
            Ok(p) => p,
            Err(_) => {
                self.error(ErrorCode::PointerType);
                ExprType::UNKNOWN
            }
        }
    }

    fn pointer_type_code(&self, type_sym: SymbolId) -> TypeCode {
        self.table.type_of(type_sym).map(|t| t.code).unwrap_or(TypeCode::Int)
    }
}
