//! Code emitter.
//!
//! A thin façade between the parser and the object file: logical p-codes
//! go in, encoded bytes come out through an [`ObjectSink`]. The sink is
//! the only POFF surface the code generator needs: appending program
//! bytes, interning read-only strings, and recording line numbers and
//! relocations.

use crate::symtab::{SymbolId, SymbolKind, SymbolTable};

use pcode_asm::{FloatOp, LibCall, Opcode, SetOp, StaticLevel, SysIo};
use tracing::trace;

/// Relocation categories the emitter records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocKind {
    /// A `PCAL` whose target offset the linker may rewrite.
    ProcedureCall,
}

/// One relocation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Category.
    pub kind: RelocKind,
    /// Target label.
    pub symbol: u32,
    /// Program-section offset of the instruction argument.
    pub offset: u32,
}

/// The object-file surface the emitter writes through.
pub trait ObjectSink {
    /// Appends one byte to the program section.
    fn emit_byte(&mut self, byte: u8);

    /// Interns a read-only string; returns its offset in the read-only
    /// data section.
    fn add_ro_string(&mut self, data: &[u8]) -> u32;

    /// Records a source line at a program offset.
    fn add_line_number(&mut self, line: u16, file: u16, offset: u32);

    /// Records a relocation.
    fn add_relocation(&mut self, relocation: Relocation);

    /// Current size of the program section.
    fn program_offset(&self) -> u32;
}

/// In-memory object sections; the test and single-pass sink.
#[derive(Debug, Default)]
pub struct ProgramSection {
    /// Encoded program bytes.
    pub program: Vec<u8>,
    /// Read-only data bytes.
    pub rodata: Vec<u8>,
    /// `(line, file, offset)` records.
    pub lines: Vec<(u16, u16, u32)>,
    /// Recorded relocations.
    pub relocations: Vec<Relocation>,
}

impl ObjectSink for ProgramSection {
    fn emit_byte(&mut self, byte: u8) {
        self.program.push(byte);
    }

    fn add_ro_string(&mut self, data: &[u8]) -> u32 {
        let offset = self.rodata.len() as u32;
        self.rodata.extend_from_slice(data);
        if self.rodata.len() % 2 != 0 {
            self.rodata.push(0);
        }
        offset
    }

    fn add_line_number(&mut self, line: u16, file: u16, offset: u32) {
        self.lines.push((line, file, offset));
    }

    fn add_relocation(&mut self, relocation: Relocation) {
        self.relocations.push(relocation);
    }

    fn program_offset(&self) -> u32 {
        self.program.len() as u32
    }
}

/// Translates logical p-codes into encoded bytes on an [`ObjectSink`].
#[derive(Debug)]
pub struct Emitter<S> {
    sink: S,
    current_file: Option<u16>,
}

impl<S: ObjectSink> Emitter<S> {
    /// Wraps an object sink.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            current_file: None,
        }
    }

    /// The sink, for inspection.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Unwraps the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Emits one instruction.
    pub fn op(&mut self, op: Opcode) {
        trace!(?op, offset = self.sink.program_offset(), "emit");

        let mut buf = Vec::with_capacity(op.len());
        op.encode(&mut buf);
        for byte in buf {
            self.sink.emit_byte(byte);
        }
    }

    /// Emits the data count for a following multi-word operation.
    pub fn data_size(&mut self, words: u16) {
        self.op(Opcode::SDC(words));
    }

    /// Emits a floating-point sub-operation with conversion flags.
    pub fn float(&mut self, float_op: FloatOp, flags: u16) {
        self.op(Opcode::FLOAT(float_op.pack(flags)));
    }

    /// Emits a set sub-operation.
    pub fn set_op(&mut self, set_op: SetOp) {
        self.op(Opcode::SETOP(set_op as u16));
    }

    /// Emits a system I/O sub-function.
    pub fn io(&mut self, func: SysIo) {
        self.op(Opcode::SYSIO(func as u16));
    }

    /// Emits a runtime library call.
    pub fn lib(&mut self, call: LibCall) {
        self.op(Opcode::LIB(call as u16));
    }

    /// Emits a stack-reference instruction built from a level and offset.
    pub fn frame(&mut self, op: fn(StaticLevel, u16) -> Opcode, level: StaticLevel, offset: u16) {
        self.op(op(level, offset));
    }

    /// Emits a call to a declared procedure or function, with a
    /// relocation for the linker.
    pub fn procedure_call(&mut self, table: &SymbolTable, id: SymbolId) {
        let symbol = table.get(id);
        let SymbolKind::Function(payload) = &symbol.kind else {
            return;
        };

        self.sink.add_relocation(Relocation {
            kind: RelocKind::ProcedureCall,
            symbol: payload.label as u32,
            offset: self.sink.program_offset(),
        });
        self.op(Opcode::PCAL(symbol.level, payload.label));
    }

    /// Emits the static-nesting-level instruction.
    pub fn set_static_nesting(&mut self, level: StaticLevel) {
        self.op(Opcode::SLSP(level as u16));
    }

    /// Records a source position: a file marker on change of file, then a
    /// line marker.
    pub fn line_number(&mut self, file: u16, line: u16) {
        if self.current_file != Some(file) {
            self.current_file = Some(file);
            self.op(Opcode::INCLUDE(file));
        }

        self.sink.add_line_number(line, file, self.sink.program_offset());
        self.op(Opcode::LINE(line));
    }

    /// Interns read-only data and returns its offset.
    pub fn ro_string(&mut self, data: &[u8]) -> u32 {
        self.sink.add_ro_string(data)
    }

    /// Current program offset.
    pub fn offset(&self) -> u32 {
        self.sink.program_offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcode_asm::consts::*;

    #[test]
    fn instructions_append_their_wire_bytes() {
        let mut emit = Emitter::new(ProgramSection::default());
        emit.op(Opcode::PUSH(0x1234));
        emit.op(Opcode::ADD);
        emit.frame(Opcode::LDS, 1, 0x0006);

        assert_eq!(
            emit.sink().program,
            [OP_PUSH, 0x34, 0x12, OP_ADD, OP_LDS, 0x01, 0x06, 0x00]
        );
    }

    #[test]
    fn ro_strings_are_word_aligned() {
        let mut emit = Emitter::new(ProgramSection::default());
        assert_eq!(emit.ro_string(b"abc"), 0);
        assert_eq!(emit.ro_string(b"de"), 4);
    }

    #[test]
    fn file_markers_come_only_on_change() {
        let mut emit = Emitter::new(ProgramSection::default());
        emit.line_number(1, 10);
        emit.line_number(1, 11);
        emit.line_number(2, 3);

        let program = &emit.sink().program;
        let includes = program.iter().filter(|b| **b == OP_INCLUDE).count();
        assert_eq!(includes, 2);
        assert_eq!(emit.sink().lines, [(10, 1, 3), (11, 1, 6), (3, 2, 12)]);
    }

    #[test]
    fn procedure_calls_record_a_relocation() {
        let mut table = SymbolTable::new();
        let f = table.function("f", 1, None, 0x40);

        let mut emit = Emitter::new(ProgramSection::default());
        emit.procedure_call(&table, f);

        assert_eq!(emit.sink().program, [OP_PCAL, 0x01, 0x40, 0x00]);
        assert_eq!(
            emit.sink().relocations,
            [Relocation {
                kind: RelocKind::ProcedureCall,
                symbol: 0x40,
                offset: 0,
            }]
        );
    }
}
