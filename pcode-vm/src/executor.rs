//! [`Executor`] implementation.

use crate::consts::*;
use crate::error::ExecutorError;

use heap::Heap;
use sysio::{DirTable, FileTable, Stream};

mod float;
mod heap;
mod instruction;
mod memory;
mod setops;
mod strings;
mod sysio;

/// Byte sizes of the four memory regions.
///
/// The machine is 16-bit addressed; the regions must fit in 64 KiB
/// together. The read-only region is sized by the data handed to
/// [`Executor::new`], rounded up to a word boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    /// String stack region size.
    pub string_stack: usize,
    /// Pascal stack region size.
    pub stack: usize,
    /// Heap region size; must be a multiple of the allocation granule.
    pub heap: usize,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        Self {
            string_stack: DEFAULT_STRING_STACK,
            stack: DEFAULT_STACK,
            heap: DEFAULT_HEAP,
        }
    }
}

/// Machine registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    /// Pascal stack pointer; grows upward by words.
    pub sp: u16,
    /// Pascal stack base.
    pub spb: u16,
    /// String stack top.
    pub csp: u16,
    /// Heap base.
    pub hpb: u16,
    /// Heap top.
    pub hsp: u16,
    /// Current frame base.
    pub fp: u16,
    /// Read-only data base.
    pub rop: u16,
    /// Program counter.
    pub pc: u16,
    /// Current static nesting level.
    pub lsp: u8,
    /// Data count for the multi-word load/store instructions.
    pub dc: u16,
}

/// The p-code machine.
///
/// One flat byte buffer holds `[string stack | read-only data | Pascal
/// stack | heap]`; instructions live in a separate read-only array. The
/// machine owns a file table whose numbers `0` and `1` are permanently
/// bound to standard input and output.
#[derive(Debug)]
pub struct Executor {
    memory: Vec<u8>,
    program: Vec<u8>,
    regs: Registers,
    heap: Heap,
    files: FileTable,
    dirs: DirTable,
}

impl Executor {
    /// Builds a machine over `program`, with `rodata` copied into the
    /// read-only region.
    pub fn new(program: Vec<u8>, rodata: &[u8], layout: MemoryLayout) -> Result<Self, ExecutorError> {
        let rosize = (rodata.len() + 1) & !1;
        let total = layout.string_stack + rosize + layout.stack + layout.heap;

        if total > MAX_MEMORY - 2 {
            return Err(ExecutorError::Layout("memory regions exceed the 16-bit address space"));
        }
        if layout.string_stack % 2 != 0 || layout.stack % 2 != 0 {
            return Err(ExecutorError::Layout("regions must be word aligned"));
        }
        if layout.heap % HEAP_ALLOC_UNIT as usize != 0 || layout.heap < 3 * HEAP_MIN_CHUNK as usize {
            return Err(ExecutorError::Layout("heap size must be a positive multiple of the granule"));
        }
        if program.len() > MAX_MEMORY {
            return Err(ExecutorError::Layout("program exceeds the 16-bit address space"));
        }

        let mut memory = vec![0u8; total];
        let rop = layout.string_stack as u16;
        memory[rop as usize..rop as usize + rodata.len()].copy_from_slice(rodata);

        let spb = rop + rosize as u16;
        let hpb = spb + layout.stack as u16;

        let regs = Registers {
            sp: spb,
            spb,
            csp: 0,
            hpb,
            hsp: hpb + layout.heap as u16,
            fp: spb,
            rop,
            pc: 0,
            lsp: 0,
            dc: 1,
        };

        let heap = Heap::new(hpb, layout.heap as u16);

        let mut vm = Self {
            memory,
            program,
            regs,
            heap,
            files: FileTable::new(),
            dirs: DirTable::default(),
        };
        vm.heap_init()
            .map_err(|_| ExecutorError::Layout("heap region is not addressable"))?;

        Ok(vm)
    }

    /// Builds a machine with the default memory layout.
    pub fn in_memory(program: Vec<u8>, rodata: &[u8]) -> Result<Self, ExecutorError> {
        Self::new(program, rodata, MemoryLayout::default())
    }

    /// Returns the current state of the machine memory.
    pub fn memory(&self) -> &[u8] {
        self.memory.as_slice()
    }

    /// Returns the current state of the registers.
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Instruction memory bound.
    pub fn max_pc(&self) -> usize {
        self.program.len()
    }

    /// Redirects standard output into an in-memory buffer readable with
    /// [`Executor::captured_output`].
    pub fn capture_output(&mut self) {
        self.files.set_stream(OUTPUT_FILE, Stream::Capture(Vec::new()));
    }

    /// The bytes written to a captured standard output.
    pub fn captured_output(&self) -> &[u8] {
        self.files.captured_output()
    }

    /// Feeds standard input from an in-memory buffer.
    pub fn set_input(&mut self, bytes: Vec<u8>) {
        self.files.set_stream(INPUT_FILE, Stream::Bytes(std::io::Cursor::new(bytes)));
    }
}
