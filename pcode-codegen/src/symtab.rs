//! Symbol table interface.
//!
//! Declaration analysis happens upstream; this module defines the records
//! it produces and an arena the parser resolves against. Symbols are
//! addressed by plain [`SymbolId`] handles; the parser holds no
//! references into the arena.

use crate::types::ExprType;

/// Handle of a symbol in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

/// Kind discriminator of type symbols and type-shaped payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TypeCode {
    /// 16-bit signed integer.
    Int,
    /// 16-bit unsigned integer.
    Word,
    /// 8-bit signed integer.
    ShortInt,
    /// 8-bit unsigned integer.
    ShortWord,
    /// Boolean.
    Boolean,
    /// Character; allocated one byte.
    Char,
    /// IEEE-754 double; allocated four words.
    Real,
    /// Enumeration type.
    Scalar,
    /// Enumeration value.
    ScalarObject,
    /// Subrange of an ordinal type.
    Subrange,
    /// Set over an ordinal base type; allocated four words.
    Set,
    /// String variable; allocated three words.
    String,
    /// Short-string variable.
    ShortString,
    /// Binary file.
    File,
    /// Text file.
    TextFile,
    /// Record type.
    Record,
    /// Record field resolved through a WITH statement.
    RecordObject,
    /// Array type.
    Array,
    /// Typed pointer.
    Pointer,
    /// VAR parameter; holds the address of its actual.
    VarParm,
    /// Procedure or function.
    Func,
}

/// Payload of a type symbol.
///
/// For an array type, `index_types` lists one entry symbol per dimension,
/// outermost first. The `alloc_size` of an index entry is the *stride* of
/// its dimension in bytes: the allocated size of everything one step of
/// that index spans. The innermost stride equals the element size; the
/// symbol table precomputes the rest at declaration time, and the index
/// code generator multiplies each index by its entry's `alloc_size`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypePayload {
    /// Kind of the type.
    pub code: TypeCode,
    /// Kind of the base type, for subranges.
    pub subtype: Option<TypeCode>,
    /// The related type: subrange base, pointer target, set base, array
    /// element, index-entry ordinal.
    pub parent: Option<SymbolId>,
    /// Allocated size in bytes; the stride for array index entries.
    pub alloc_size: u16,
    /// Smallest ordinal value.
    pub min_value: i32,
    /// Largest ordinal value.
    pub max_value: i32,
    /// Index entries of an array type, outermost dimension first.
    pub index_types: Vec<SymbolId>,
}

/// Payload of variables and VAR parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarPayload {
    /// The variable's type.
    pub parent: SymbolId,
    /// Allocated size in bytes.
    pub size: u16,
    /// Frame offset in bytes.
    pub offset: u16,
}

/// A constant's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// Ordinal constant, including enumeration values.
    Int(i32),
    /// Real constant.
    Real(f64),
    /// Character constant.
    Char(u8),
}

/// Payload of constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstPayload {
    /// The constant's type, when it has a named one.
    pub parent: Option<SymbolId>,
    /// The value.
    pub value: ConstValue,
}

/// Payload of record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPayload {
    /// The record type owning the field.
    pub record: SymbolId,
    /// The field's type.
    pub parent: SymbolId,
    /// Byte offset inside the record.
    pub offset: u16,
    /// Allocated size in bytes.
    pub size: u16,
}

/// Payload of procedures and functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncPayload {
    /// Return type; `None` for procedures.
    pub return_type: Option<SymbolId>,
    /// Entry offset in the program section.
    pub label: u16,
}

/// Kind-discriminated symbol payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    /// A type.
    Type(TypePayload),
    /// A variable.
    Variable(VarPayload),
    /// A VAR parameter.
    VarParameter(VarPayload),
    /// A constant.
    Constant(ConstPayload),
    /// A record field.
    Field(FieldPayload),
    /// A procedure or function.
    Function(FuncPayload),
}

/// One symbol record.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Declared name.
    pub name: String,
    /// Static nesting level of the declaration.
    pub level: u8,
    /// Kind-discriminated payload.
    pub kind: SymbolKind,
}

/// Arena of symbol records.
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a symbol and returns its handle.
    pub fn add(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    /// The symbol behind a handle.
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    /// Type payload of a type symbol.
    pub fn type_of(&self, id: SymbolId) -> Option<&TypePayload> {
        match &self.get(id).kind {
            SymbolKind::Type(payload) => Some(payload),
            _ => None,
        }
    }

    /// Maps a type symbol onto the expression type taxonomy.
    pub fn expression_type(&self, id: SymbolId) -> ExprType {
        let Some(payload) = self.type_of(id) else {
            return ExprType::UNKNOWN;
        };

        match payload.code {
            TypeCode::Int => ExprType::INTEGER,
            TypeCode::Word => ExprType::WORD,
            TypeCode::ShortInt => ExprType::SHORT_INTEGER,
            TypeCode::ShortWord => ExprType::SHORT_WORD,
            TypeCode::Boolean => ExprType::BOOLEAN,
            TypeCode::Char => ExprType::CHAR,
            TypeCode::Real => ExprType::REAL,
            TypeCode::Scalar | TypeCode::ScalarObject => ExprType::SCALAR,
            TypeCode::Set => ExprType::SET,
            TypeCode::String => ExprType::STRING,
            TypeCode::ShortString => ExprType::SHORT_STRING,
            TypeCode::File | TypeCode::TextFile => ExprType::FILE,
            TypeCode::Record | TypeCode::RecordObject => ExprType::RECORD,
            TypeCode::Subrange | TypeCode::VarParm | TypeCode::Func => {
                payload.parent.map(|p| self.expression_type(p)).unwrap_or(ExprType::UNKNOWN)
            }
            TypeCode::Pointer => payload
                .parent
                .map(|p| self.expression_type(p).pointer_to().unwrap_or(ExprType::UNKNOWN))
                .unwrap_or(ExprType::ANY_POINTER),
            TypeCode::Array => ExprType::UNKNOWN,
        }
    }

    /* declaration helpers; the front half builds types through these */

    /// Declares a basic type.
    pub fn basic_type(&mut self, name: &str, code: TypeCode, alloc_size: u16, min: i32, max: i32) -> SymbolId {
        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code,
                subtype: None,
                parent: None,
                alloc_size,
                min_value: min,
                max_value: max,
                index_types: Vec::new(),
            }),
        })
    }

    /// Declares a subrange of an ordinal base type.
    pub fn subrange_type(&mut self, name: &str, base: SymbolId, min: i32, max: i32) -> SymbolId {
        let payload = self.type_of(base).expect("subrange base must be a type");
        let (code, alloc) = (payload.code, payload.alloc_size);

        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code: TypeCode::Subrange,
                subtype: Some(code),
                parent: Some(base),
                alloc_size: alloc,
                min_value: min,
                max_value: max,
                index_types: Vec::new(),
            }),
        })
    }

    /// Declares a set over an ordinal base type.
    pub fn set_type(&mut self, name: &str, base: SymbolId) -> SymbolId {
        let payload = self.type_of(base).expect("set base must be a type");
        let (min, max) = (payload.min_value, payload.max_value);

        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code: TypeCode::Set,
                subtype: None,
                parent: Some(base),
                alloc_size: 8,
                min_value: min,
                max_value: max,
                index_types: Vec::new(),
            }),
        })
    }

    /// Declares a typed pointer.
    pub fn pointer_type(&mut self, name: &str, target: SymbolId) -> SymbolId {
        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code: TypeCode::Pointer,
                subtype: None,
                parent: Some(target),
                alloc_size: 2,
                min_value: 0,
                max_value: 0,
                index_types: Vec::new(),
            }),
        })
    }

    /// Declares a record type; fields are added with [`Self::field`].
    pub fn record_type(&mut self, name: &str, size: u16) -> SymbolId {
        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code: TypeCode::Record,
                subtype: None,
                parent: None,
                alloc_size: size,
                min_value: 0,
                max_value: 0,
                index_types: Vec::new(),
            }),
        })
    }

    /// Declares a field of `record`.
    pub fn field(&mut self, record: SymbolId, name: &str, parent: SymbolId, offset: u16) -> SymbolId {
        let size = self.type_of(parent).map(|t| t.alloc_size).unwrap_or(2);
        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Field(FieldPayload {
                record,
                parent,
                offset,
                size,
            }),
        })
    }

    /// Declares an array type over ordinal index types, outermost first.
    ///
    /// Builds one index entry per dimension and precomputes its stride:
    /// the innermost entry strides by the element size, each outer entry
    /// by the span of the dimension inside it.
    pub fn array_type(&mut self, name: &str, element: SymbolId, dims: &[SymbolId]) -> SymbolId {
        let elem_size = self.type_of(element).map(|t| t.alloc_size).unwrap_or(2);

        let counts: Vec<u32> = dims
            .iter()
            .map(|d| {
                let t = self.type_of(*d).expect("array index must be an ordinal type");
                (t.max_value - t.min_value + 1) as u32
            })
            .collect();

        let mut strides = vec![0u16; dims.len()];
        let mut stride = elem_size as u32;
        for i in (0..dims.len()).rev() {
            strides[i] = stride as u16;
            stride *= counts[i];
        }

        let index_types = dims
            .iter()
            .zip(&strides)
            .map(|(dim, stride)| {
                let t = self.type_of(*dim).expect("array index must be an ordinal type").clone();
                self.add(Symbol {
                    name: format!("{name}$index"),
                    level: 0,
                    kind: SymbolKind::Type(TypePayload {
                        code: t.code,
                        subtype: t.subtype,
                        parent: Some(*dim),
                        alloc_size: *stride,
                        min_value: t.min_value,
                        max_value: t.max_value,
                        index_types: Vec::new(),
                    }),
                })
            })
            .collect();

        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Type(TypePayload {
                code: TypeCode::Array,
                subtype: None,
                parent: Some(element),
                alloc_size: stride as u16,
                min_value: 0,
                max_value: 0,
                index_types,
            }),
        })
    }

    /// Declares a variable.
    pub fn variable(&mut self, name: &str, level: u8, parent: SymbolId, offset: u16) -> SymbolId {
        let size = self.type_of(parent).map(|t| t.alloc_size).unwrap_or(2);
        self.add(Symbol {
            name: name.into(),
            level,
            kind: SymbolKind::Variable(VarPayload { parent, size, offset }),
        })
    }

    /// Declares a VAR parameter.
    pub fn var_parameter(&mut self, name: &str, level: u8, parent: SymbolId, offset: u16) -> SymbolId {
        let size = self.type_of(parent).map(|t| t.alloc_size).unwrap_or(2);
        self.add(Symbol {
            name: name.into(),
            level,
            kind: SymbolKind::VarParameter(VarPayload { parent, size, offset }),
        })
    }

    /// Declares an ordinal constant, optionally of a named type.
    pub fn constant(&mut self, name: &str, parent: Option<SymbolId>, value: i32) -> SymbolId {
        self.add(Symbol {
            name: name.into(),
            level: 0,
            kind: SymbolKind::Constant(ConstPayload {
                parent,
                value: ConstValue::Int(value),
            }),
        })
    }

    /// Declares a function returning `return_type` at program offset
    /// `label`, or a procedure when `return_type` is `None`.
    pub fn function(&mut self, name: &str, level: u8, return_type: Option<SymbolId>, label: u16) -> SymbolId {
        self.add(Symbol {
            name: name.into(),
            level,
            kind: SymbolKind::Function(FuncPayload { return_type, label }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_strides_follow_the_preceding_dimension() {
        let mut table = SymbolTable::new();
        let int = table.basic_type("integer", TypeCode::Int, 2, i16::MIN as i32, i16::MAX as i32);
        let rows = table.subrange_type("rows", int, 1, 3);
        let cols = table.subrange_type("cols", int, 0, 4);

        let matrix = table.array_type("matrix", int, &[rows, cols]);
        let payload = table.type_of(matrix).unwrap();

        assert_eq!(payload.alloc_size, 3 * 5 * 2);
        let strides: Vec<u16> = payload
            .index_types
            .iter()
            .map(|e| table.type_of(*e).unwrap().alloc_size)
            .collect();
        assert_eq!(strides, [10, 2], "outer stride spans a whole row");
    }

    #[test]
    fn expression_type_reduces_subranges_and_pointers() {
        let mut table = SymbolTable::new();
        let int = table.basic_type("integer", TypeCode::Int, 2, i16::MIN as i32, i16::MAX as i32);
        let digit = table.subrange_type("digit", int, 0, 9);
        let p = table.pointer_type("pint", int);

        assert_eq!(table.expression_type(digit), ExprType::INTEGER);
        assert_eq!(table.expression_type(p), ExprType::INTEGER.pointer_to().unwrap());
    }
}
