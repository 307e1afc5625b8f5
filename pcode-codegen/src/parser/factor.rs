//! Factor productions and the simple-factor reduction.

use super::{ExprContext, VarFlags, VarInfo};
use crate::emitter::ObjectSink;
use crate::error::ErrorCode;
use crate::symtab::{ConstValue, SymbolId, SymbolKind, TypeCode};
use crate::token::{StdFunc, TokenKind};
use crate::types::ExprType;

use pcode_asm::{FloatOp, LibCall, Opcode, SetOp};

impl<S: ObjectSink> ExprContext<'_, S> {
    /// `Factor`: literals, variables, parenthesized expressions, `not`,
    /// `@`, set constructors, casts, calls.
    pub(crate) fn factor(&mut self, find: ExprType) -> ExprType {
        match self.tokens.kind() {
            TokenKind::IntConst => {
                let value = self.tokens.current().int_value;
                self.tokens.advance();
                self.integer_constant(find, value)
            }

            TokenKind::CharConst => {
                let value = self.tokens.current().int_value as u16;
                self.tokens.advance();
                self.emit.op(Opcode::PUSH(value));
                ExprType::CHAR
            }

            TokenKind::RealConst => {
                let value = self.tokens.current().real_value;
                self.tokens.advance();
                self.real_constant(value);
                ExprType::REAL
            }

            TokenKind::StringConst => {
                let text = self.tokens.current().text.clone();
                self.tokens.advance();

                let offset = self.emit.ro_string(&text);
                self.emit.op(Opcode::PUSH(text.len() as u16));
                self.emit.op(Opcode::LAC(offset as u16));
                ExprType::CSTRING
            }

            TokenKind::Nil => {
                self.tokens.advance();
                self.emit.op(Opcode::PUSH(0));
                ExprType::ANY_POINTER
            }

            TokenKind::LParen => {
                self.tokens.advance();
                let ty = self.expression(find, None);
                self.expect(TokenKind::RParen, ErrorCode::RParenExpected);
                ty
            }

            TokenKind::Not => {
                self.tokens.advance();
                let ty = self.factor(find);

                if ty == ExprType::BOOLEAN {
                    // Boolean words are 0 or 1; complementing would break
                    // the zero tests behind the jumps.
                    self.emit.op(Opcode::PUSH(0));
                    self.emit.op(Opcode::EQU);
                } else if ty.is_integer_family() {
                    self.emit.op(Opcode::NOT);
                } else {
                    self.error(ErrorCode::FactorType);
                }
                ty
            }

            TokenKind::At => {
                self.tokens.advance();
                if !find.is_pointer() && find != ExprType::ANY_POINTER && find != ExprType::UNKNOWN {
                    self.error(ErrorCode::PointerType);
                }
                self.pointer_factor()
            }

            TokenKind::LBracket => {
                self.tokens.advance();
                self.set_constructor()
            }

            TokenKind::StdFunc => match self.tokens.current().builtin {
                Some(func) => {
                    self.tokens.advance();
                    self.standard_function(find, func)
                }
                None => self.invalid_factor(),
            },

            TokenKind::Identifier => match self.tokens.current().symbol {
                Some(id) => self.identifier_factor(find, id),
                None => self.invalid_factor(),
            },

            _ => self.invalid_factor(),
        }
    }

    /// Consumes the offender and assumes an integer so the pass keeps
    /// producing diagnostics.
    fn invalid_factor(&mut self) -> ExprType {
        self.error(ErrorCode::InvalidFactor);
        self.tokens.advance();
        self.emit.op(Opcode::PUSH(0));
        ExprType::INTEGER
    }

    /// An integer literal, auto-cast to an unsigned type on request.
    fn integer_constant(&mut self, find: ExprType, value: i32) -> ExprType {
        let unsigned_wanted = find.is_unsigned() && value >= 0;

        if unsigned_wanted && value <= u16::MAX as i32 {
            self.emit.op(Opcode::PUSH(value as u16));
            return find;
        }

        if value < i16::MIN as i32 || value > i16::MAX as i32 {
            self.error(ErrorCode::Overflow);
        }
        self.emit.op(Opcode::PUSH(value as i16 as u16));
        ExprType::INTEGER
    }

    /// A real literal: four pushes, little-endian halves.
    fn real_constant(&mut self, value: f64) {
        let bytes = value.to_le_bytes();
        for pair in bytes.chunks_exact(2) {
            self.emit.op(Opcode::PUSH(u16::from_le_bytes([pair[0], pair[1]])));
        }
    }

    /// Dispatch over what an identifier is bound to.
    fn identifier_factor(&mut self, find: ExprType, id: SymbolId) -> ExprType {
        let symbol = self.table.get(id);

        match &symbol.kind {
            SymbolKind::Constant(payload) => {
                let payload = *payload;
                self.tokens.advance();
                self.constant_factor(find, payload.parent, payload.value)
            }

            SymbolKind::Variable(payload) => {
                let payload = *payload;
                let level = symbol.level;
                self.tokens.advance();

                let mut info = VarInfo {
                    kind: self.type_code(payload.parent),
                    type_sym: Some(payload.parent),
                    level,
                    offset: payload.offset,
                    size: payload.size,
                    field_offset: 0,
                    flags: VarFlags::empty(),
                };
                self.simple_factor(find, &mut info)
            }

            SymbolKind::VarParameter(payload) => {
                let payload = *payload;
                let level = symbol.level;
                self.tokens.advance();

                let mut info = VarInfo {
                    kind: TypeCode::VarParm,
                    type_sym: Some(payload.parent),
                    level,
                    offset: payload.offset,
                    size: payload.size,
                    field_offset: 0,
                    flags: VarFlags::empty(),
                };
                self.simple_factor(find, &mut info)
            }

            SymbolKind::Type(_) => {
                self.tokens.advance();
                self.type_cast(id)
            }

            SymbolKind::Field(payload) => {
                let payload = *payload;
                self.tokens.advance();
                self.with_field_factor(find, payload)
            }

            SymbolKind::Function(_) => {
                self.tokens.advance();
                self.function_call(id)
            }
        }
    }

    /// A named constant; scalar constants install or match the
    /// expression's abstract type.
    fn constant_factor(&mut self, find: ExprType, parent: Option<SymbolId>, value: ConstValue) -> ExprType {
        match value {
            ConstValue::Real(v) => {
                self.real_constant(v);
                ExprType::REAL
            }
            ConstValue::Char(v) => {
                self.emit.op(Opcode::PUSH(v as u16));
                ExprType::CHAR
            }
            ConstValue::Int(v) => match parent {
                Some(type_sym) if self.table.expression_type(type_sym) == ExprType::SCALAR => {
                    self.check_abstract(self.scalar_identity(type_sym), ErrorCode::ScalarType);
                    self.emit.op(Opcode::PUSH(v as i16 as u16));
                    ExprType::SCALAR
                }
                _ => self.integer_constant(find, v),
            },
        }
    }

    /// The type symbol a scalar value identifies with: the declaring
    /// scalar type, reduced out of subranges.
    fn scalar_identity(&self, type_sym: SymbolId) -> SymbolId {
        match self.table.type_of(type_sym) {
            Some(payload) if payload.code == TypeCode::Subrange => payload.parent.unwrap_or(type_sym),
            _ => type_sym,
        }
    }

    fn type_code(&self, type_sym: SymbolId) -> TypeCode {
        self.table.type_of(type_sym).map(|t| t.code).unwrap_or(TypeCode::Int)
    }

    /// Recursive reduction of a variable reference down to a base kind,
    /// emitting the loads its access path needs.
    pub(crate) fn simple_factor(&mut self, find: ExprType, info: &mut VarInfo) -> ExprType {
        match info.kind {
            TypeCode::Int => {
                self.load_word(info);
                ExprType::INTEGER
            }
            TypeCode::Word => {
                self.load_word(info);
                ExprType::WORD
            }
            TypeCode::ShortInt => {
                self.load_word(info);
                ExprType::SHORT_INTEGER
            }
            TypeCode::ShortWord => {
                self.load_word(info);
                ExprType::SHORT_WORD
            }
            TypeCode::Boolean => {
                self.load_word(info);
                ExprType::BOOLEAN
            }
            TypeCode::Char => {
                self.load_byte(info);
                ExprType::CHAR
            }
            TypeCode::Real => {
                self.load_multi(info, 4);
                ExprType::REAL
            }
            TypeCode::Scalar | TypeCode::ScalarObject => {
                if let Some(id) = info.type_sym {
                    self.check_abstract(id, ErrorCode::ScalarType);
                }
                self.load_word(info);
                ExprType::SCALAR
            }
            TypeCode::Set => {
                if let Some(id) = info.type_sym {
                    let base = self.table.type_of(id).and_then(|t| t.parent).unwrap_or(id);
                    self.check_abstract(base, ErrorCode::SetElementType);
                }
                self.load_multi(info, 4);
                ExprType::SET
            }
            TypeCode::String => {
                self.load_multi(info, 3);
                ExprType::STRING
            }
            TypeCode::ShortString => {
                self.load_multi(info, 3);
                ExprType::SHORT_STRING
            }
            TypeCode::File | TypeCode::TextFile => {
                self.load_word(info);
                ExprType::FILE
            }

            TypeCode::Subrange => {
                let Some((subtype, parent)) = self.type_sym_payload(info) else {
                    self.error(ErrorCode::SubrangeType);
                    return ExprType::UNKNOWN;
                };
                info.kind = subtype;
                info.type_sym = parent.or(info.type_sym);
                self.simple_factor(find, info)
            }

            TypeCode::Record => self.record_factor(find, info),

            TypeCode::RecordObject => {
                self.error(ErrorCode::RecordObject);
                ExprType::UNKNOWN
            }

            TypeCode::Pointer => self.pointer_variable_factor(find, info),

            TypeCode::VarParm => {
                // Load the stored address; the rest of the path goes
                // through it.
                info.flags |= VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS | VarFlags::VAR_PARM;
                self.emit.frame(Opcode::LDS, info.level, info.offset);

                let Some(target) = info.type_sym else {
                    self.error(ErrorCode::InvalidType);
                    return ExprType::UNKNOWN;
                };
                info.kind = self.type_code(target);
                self.simple_factor(find, info)
            }

            TypeCode::Array => self.array_factor(find, info),

            TypeCode::Func => {
                self.error(ErrorCode::InvalidFactor);
                ExprType::UNKNOWN
            }
        }
    }

    /// Subtype code and base symbol of the current reduction type.
    fn type_sym_payload(&self, info: &VarInfo) -> Option<(TypeCode, Option<SymbolId>)> {
        let payload = self.table.type_of(info.type_sym?)?;
        Some((payload.subtype?, payload.parent))
    }

    /// `record.field` chains, and whole-record values inside a matching
    /// abstract-type context.
    fn record_factor(&mut self, find: ExprType, info: &mut VarInfo) -> ExprType {
        let record_type = info.type_sym;

        if self.tokens.kind() != TokenKind::Dot {
            // A bare record name is a value only where the context's
            // abstract type already names this record.
            match (self.abstract_type, record_type) {
                (Some(a), Some(r)) if a == r => {
                    self.load_multi(info, info.size / 2);
                    return ExprType::RECORD;
                }
                _ => {
                    self.error(ErrorCode::RecordType);
                    return ExprType::UNKNOWN;
                }
            }
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
        info.kind = self.type_code(field.parent);
        info.type_sym = Some(field.parent);
        self.simple_factor(find, info)
    }

    /// A bare field name resolved through the innermost `WITH`.
    fn with_field_factor(&mut self, find: ExprType, field: crate::symtab::FieldPayload) -> ExprType {
        let Some(with) = self.with_record else {
            self.error(ErrorCode::RecordObject);
            return ExprType::UNKNOWN;
        };
        if field.record != with.record_type {
            self.error(ErrorCode::RecordObject);
            return ExprType::UNKNOWN;
        }

        let mut info = VarInfo {
            kind: self.type_code(field.parent),
            type_sym: Some(field.parent),
            level: with.level,
            offset: with.offset,
            size: field.size,
            field_offset: 0,
            flags: VarFlags::empty(),
        };

        if with.indirect {
            // The WITH target is a pointer or VAR parameter: load it and
            // apply the field offset to the loaded address.
            self.emit.frame(Opcode::LDS, with.level, with.offset);
            info.flags |= VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS | VarFlags::FIELD_OFFSET;
            info.field_offset = field.offset;
        } else {
            info.offset += field.offset;
        }

        self.simple_factor(find, &mut info)
    }

    /// A pointer-typed variable: `p` yields the pointer value, `p^` the
    /// target, and deeper chains reduce through the target type.
    fn pointer_variable_factor(&mut self, find: ExprType, info: &mut VarInfo) -> ExprType {
        let mut derefs = 0;
        while self.tokens.kind() == TokenKind::Caret {
            self.tokens.advance();
            derefs += 1;
        }

        let Some(pointer_type) = info.type_sym else {
            self.error(ErrorCode::PointerType);
            return ExprType::UNKNOWN;
        };
        let target = self.table.type_of(pointer_type).and_then(|t| t.parent);

        if derefs == 0 {
            self.load_word(info);
            let ty = target.map(|t| self.table.expression_type(t)).unwrap_or(ExprType::UNKNOWN);
            return match ty.pointer_to() {
                Ok(p) => p,
                Err(_) => {
                    self.error(ErrorCode::PointerType);
                    ExprType::UNKNOWN
                }
            };
        }

        if derefs > 1 {
            // Pointers to pointers are rejected; reduce as one level.
            self.error(ErrorCode::PointerType);
        }

        // Load the pointer, then reduce the target through it.
        self.load_word(info);
        let Some(target) = target else {
            self.error(ErrorCode::PointerType);
            return ExprType::UNKNOWN;
        };

        info.flags = VarFlags::DEREFERENCE | VarFlags::LOAD_ADDRESS;
        info.field_offset = 0;
        info.kind = self.type_code(target);
        info.type_sym = Some(target);
        info.size = self.table.type_of(target).map(|t| t.alloc_size).unwrap_or(2);
        self.simple_factor(find, info)
    }

    /// Array reference: an index list reduces to the element; a packed
    /// array of char without one coerces to a string rvalue.
    fn array_factor(&mut self, find: ExprType, info: &mut VarInfo) -> ExprType {
        let Some(array_type) = info.type_sym else {
            self.error(ErrorCode::ArrayType);
            return ExprType::UNKNOWN;
        };

        if self.tokens.kind() == TokenKind::LBracket {
            self.array_index(array_type);

            if info.flags.contains(VarFlags::DEREFERENCE) {
                // Fold the scaled index into the loaded address.
                self.emit.op(Opcode::ADD);
            } else {
                info.flags |= VarFlags::INDEXED;
            }

            let element = self.table.type_of(array_type).and_then(|t| t.parent);
            let Some(element) = element else {
                self.error(ErrorCode::ArrayType);
                return ExprType::UNKNOWN;
            };
            info.kind = self.type_code(element);
            info.type_sym = Some(element);
            info.size = self.table.type_of(element).map(|t| t.alloc_size).unwrap_or(2);
            return self.simple_factor(find, info);
        }

        let element_is_char = self
            .table
            .type_of(array_type)
            .and_then(|t| t.parent)
            .map(|e| self.type_code(e) == TypeCode::Char)
            .unwrap_or(false);

        if element_is_char && (find.is_any_string() || find == ExprType::ANY_STRING) {
            let size = self.table.type_of(array_type).map(|t| t.alloc_size).unwrap_or(0);
            self.load_address(info);
            self.emit.op(Opcode::PUSH(size));
            self.emit.lib(LibCall::BStr2Str);
            return ExprType::STRING;
        }

        self.error(ErrorCode::ArrayType);
        ExprType::UNKNOWN
    }

    /* loads */

    /// Emits the word load selected by the access-path flags.
    pub(crate) fn load_word(&mut self, info: &VarInfo) {
        if info.flags.contains(VarFlags::DEREFERENCE) {
            self.apply_field_offset(info);
            self.emit.op(Opcode::LDI);
        } else if info.flags.contains(VarFlags::INDEXED) {
            self.emit.frame(Opcode::LDSX, info.level, info.offset);
        } else {
            self.emit.frame(Opcode::LDS, info.level, info.offset);
        }
    }

    pub(crate) fn load_byte(&mut self, info: &VarInfo) {
        if info.flags.contains(VarFlags::DEREFERENCE) {
            self.apply_field_offset(info);
            self.emit.op(Opcode::LDIB);
        } else if info.flags.contains(VarFlags::INDEXED) {
            self.emit.frame(Opcode::LDSXB, info.level, info.offset);
        } else {
            self.emit.frame(Opcode::LDSB, info.level, info.offset);
        }
    }

    pub(crate) fn load_multi(&mut self, info: &VarInfo, words: u16) {
        self.emit.data_size(words);
        if info.flags.contains(VarFlags::DEREFERENCE) {
            self.apply_field_offset(info);
            self.emit.op(Opcode::LDIM);
        } else if info.flags.contains(VarFlags::INDEXED) {
            self.emit.frame(Opcode::LDSXM, info.level, info.offset);
        } else {
            self.emit.frame(Opcode::LDSM, info.level, info.offset);
        }
    }

    /// Emits the address of the l-value described by `info`.
    pub(crate) fn load_address(&mut self, info: &VarInfo) {
        if info.flags.contains(VarFlags::DEREFERENCE) {
            // The address is already on the stack.
            self.apply_field_offset(info);
        } else if info.flags.contains(VarFlags::INDEXED) {
            self.emit.frame(Opcode::LASX, info.level, info.offset);
        } else {
            self.emit.frame(Opcode::LAS, info.level, info.offset);
        }
    }

    fn apply_field_offset(&mut self, info: &VarInfo) {
        if info.flags.contains(VarFlags::FIELD_OFFSET) && info.field_offset != 0 {
            self.emit.op(Opcode::PUSH(info.field_offset));
            self.emit.op(Opcode::ADD);
        }
    }

    /* set constructors */

    /// `SetConstructor = '[' [ SetElem { ',' SetElem } ] ']'` with
    /// `SetElem = Expression [ '..' Expression ]`.
    ///
    /// The abstract type is saved across the constructor so a nested
    /// constructor cannot clobber the enclosing expression's.
    pub(crate) fn set_constructor(&mut self) -> ExprType {
        let saved = self.abstract_type;

        if self.tokens.kind() == TokenKind::RBracket {
            self.tokens.advance();
            self.emit.set_op(SetOp::Empty);
            self.abstract_type = saved;
            return ExprType::EMPTY_SET;
        }

        let mut first = true;
        loop {
            let ty = self.expression(ExprType::ANY_ORDINAL, None);
            if !ty.is_ordinal() {
                self.error(ErrorCode::SetElementType);
            }

            if self.tokens.kind() == TokenKind::DotDot {
                self.tokens.advance();
                let hi = self.expression(ty, None);
                if !hi.is_ordinal() {
                    self.error(ErrorCode::SetElementType);
                }
                self.emit.op(Opcode::PUSH(self.abstract_min()));
                self.emit.set_op(SetOp::Subrange);
            } else {
                self.emit.op(Opcode::PUSH(self.abstract_min()));
                self.emit.set_op(SetOp::Singleton);
            }

            if !first {
                self.emit.set_op(SetOp::Union);
            }
            first = false;

            match self.tokens.kind() {
                TokenKind::Comma => self.tokens.advance(),
                TokenKind::RBracket => {
                    self.tokens.advance();
                    break;
                }
                _ => {
                    self.error(ErrorCode::RBracketExpected);
                    break;
                }
            }
        }

        self.abstract_type = saved;
        ExprType::SET
    }

    /* casts and calls */

    /// `TypeName '(' Expression ')'`.
    ///
    /// Ordinals recast freely among themselves, lift to real, and round
    /// back from real; pointers recast to pointers of a different target.
    fn type_cast(&mut self, type_sym: SymbolId) -> ExprType {
        if self.tokens.kind() != TokenKind::LParen {
            self.error(ErrorCode::LParenExpected);
            return self.table.expression_type(type_sym);
        }
        self.tokens.advance();

        let target = self.table.expression_type(type_sym);
        let inner = self.expression(ExprType::UNKNOWN, None);
        self.expect(TokenKind::RParen, ErrorCode::RParenExpected);

        if inner == target {
            return target;
        }

        if inner.is_ordinal() && target.base().is_ordinal() && !target.is_pointer() {
            return target;
        }

        if inner.is_ordinal() && target == ExprType::REAL {
            self.emit.float(FloatOp::Float, 0);
            return ExprType::REAL;
        }

        if inner == ExprType::REAL && target.is_ordinal() {
            self.emit.float(FloatOp::Round, 0);
            return target;
        }

        if (inner.is_pointer() || inner == ExprType::ANY_POINTER) && target.is_pointer() {
            return target;
        }

        self.error(ErrorCode::InvalidType);
        target
    }

    /// A function designator: reserves the result slot and calls.
    fn function_call(&mut self, id: SymbolId) -> ExprType {
        let symbol = self.table.get(id);
        let SymbolKind::Function(payload) = &symbol.kind else {
            self.error(ErrorCode::InvalidFactor);
            return ExprType::UNKNOWN;
        };
        let payload = *payload;

        let Some(return_type) = payload.return_type else {
            self.error(ErrorCode::InvalidFactor);
            return ExprType::UNKNOWN;
        };

        let result_size = self.table.type_of(return_type).map(|t| t.alloc_size).unwrap_or(2);
        self.emit.op(Opcode::INDS((result_size + 1) & !1));

        if self.tokens.kind() == TokenKind::LParen {
            self.tokens.advance();
            self.expect(TokenKind::RParen, ErrorCode::RParenExpected);
        }

        self.emit.procedure_call(self.table, id);
        self.table.expression_type(return_type)
    }

    /// Standard functions lower to inline p-codes.
    fn standard_function(&mut self, find: ExprType, func: StdFunc) -> ExprType {
        if func == StdFunc::SizeOf {
            return self.size_of();
        }

        self.expect(TokenKind::LParen, ErrorCode::LParenExpected);

        let ty = match func {
            StdFunc::Abs => {
                let ty = self.expression(find, None);
                if ty == ExprType::REAL {
                    self.emit.float(FloatOp::Abs, 0);
                } else if ty.is_integer_family() {
                    self.emit.op(Opcode::ABS);
                } else {
                    self.error(ErrorCode::FactorType);
                }
                ty
            }
            StdFunc::Sqr => {
                let ty = self.expression(find, None);
                if ty.is_integer_family() {
                    self.emit.op(Opcode::DUP);
                    self.emit.op(Opcode::MUL);
                } else {
                    self.error(ErrorCode::FactorType);
                }
                ty
            }
            StdFunc::Ord => {
                let ty = self.expression(ExprType::UNKNOWN, None);
                if !ty.is_ordinal() {
                    self.error(ErrorCode::FactorType);
                }
                ExprType::INTEGER
            }
            StdFunc::Chr => {
                let ty = self.expression(ExprType::INTEGER, None);
                if !ty.is_integer_family() {
                    self.error(ErrorCode::FactorType);
                }
                ExprType::CHAR
            }
            StdFunc::Pred => {
                let ty = self.expression(find, None);
                if !ty.is_ordinal() {
                    self.error(ErrorCode::FactorType);
                }
                self.emit.op(Opcode::DEC);
                ty
            }
            StdFunc::Succ => {
                let ty = self.expression(find, None);
                if !ty.is_ordinal() {
                    self.error(ErrorCode::FactorType);
                }
                self.emit.op(Opcode::INC);
                ty
            }
            StdFunc::Length => {
                let ty = self.expression(ExprType::ANY_STRING, None);
                match ty {
                    // Drop everything above the size word.
                    ExprType::STRING | ExprType::SHORT_STRING => self.emit.op(Opcode::INDS(-4i16 as u16)),
                    ExprType::CSTRING => self.emit.op(Opcode::INDS(-2i16 as u16)),
                    _ => self.error(ErrorCode::FactorType),
                }
                ExprType::INTEGER
            }
            StdFunc::SizeOf => unreachable!("handled above"),
        };

        self.expect(TokenKind::RParen, ErrorCode::RParenExpected);
        ty
    }

    /// `sizeof` folds to a constant; no code for the argument.
    fn size_of(&mut self) -> ExprType {
        self.expect(TokenKind::LParen, ErrorCode::LParenExpected);

        let size = match self.tokens.current().symbol {
            Some(id) if self.tokens.kind() == TokenKind::Identifier => match &self.table.get(id).kind {
                SymbolKind::Type(payload) => payload.alloc_size,
                SymbolKind::Variable(payload) | SymbolKind::VarParameter(payload) => payload.size,
                _ => {
                    self.error(ErrorCode::InvalidFactor);
                    0
                }
            },
            _ => {
                self.error(ErrorCode::InvalidFactor);
                0
            }
        };
        self.tokens.advance();
        self.expect(TokenKind::RParen, ErrorCode::RParenExpected);

        self.emit.op(Opcode::PUSH(size));
        ExprType::INTEGER
    }
}
