//! Machine parameters.

/* MEMORY GEOMETRY */

/// Default size of the string stack region, in bytes.
pub const DEFAULT_STRING_STACK: usize = 4096;

/// Default size of the Pascal stack region, in bytes.
pub const DEFAULT_STACK: usize = 8192;

/// Default size of the heap region, in bytes.
pub const DEFAULT_HEAP: usize = 16384;

/// The machine is 16-bit addressed; the four regions must fit below this.
pub const MAX_MEMORY: usize = 65536;

/// Default capacity carved for a string buffer, in bytes.
pub const STRING_DEFAULT_ALLOC: u16 = 80;

/// Capacity-word flag marking a heap-allocated string buffer.
pub const HEAP_STRING: u16 = 0x8000;

/* STRING VARIABLE LAYOUT (byte offsets within the variable) */

/// Current length in bytes.
pub const STRING_SIZE_OFFSET: u16 = 0;

/// Address of the backing buffer.
pub const STRING_DATA_OFFSET: u16 = 2;

/// Buffer capacity, with [`HEAP_STRING`] in the high bit.
pub const STRING_ALLOC_OFFSET: u16 = 4;

/* HEAP */

/// Chunk payload/alignment granule, in bytes.
pub const HEAP_ALLOC_UNIT: u16 = 16;

/// Chunk header size, in bytes.
pub const HEAP_HEADER: u16 = 8;

/// Minimum chunk size; also the size of the free-chunk bookkeeping.
pub const HEAP_MIN_CHUNK: u16 = 16;

/* CALL FRAMES (byte offsets below the frame pointer) */

/// Saved static link.
pub const FRAME_STATIC_LINK: u16 = 8;

/// Saved caller frame pointer.
pub const FRAME_DYNAMIC_LINK: u16 = 6;

/// Saved caller static nesting level.
pub const FRAME_LEVEL: u16 = 4;

/// Return address.
pub const FRAME_RETURN: u16 = 2;

/// Total frame header size, in bytes.
pub const FRAME_BYTES: u16 = 8;

/* FILES */

/// Capacity of the file table.
pub const MAX_OPEN_FILES: usize = 8;

/// File number permanently bound to standard input.
pub const INPUT_FILE: u16 = 0;

/// File number permanently bound to standard output.
pub const OUTPUT_FILE: u16 = 1;

/* DIRECTORY SEARCH RECORDS (byte offsets) */

/// Name string variable inside a `TSearchRec`.
pub const SEARCHREC_NAME_OFFSET: u16 = 0;

/// Attribute word inside a `TSearchRec`.
pub const SEARCHREC_ATTR_OFFSET: u16 = 6;

/// Attribute bit: entry is a directory.
pub const ATTR_DIRECTORY: u16 = 0x10;

/// Attribute bit: entry is hidden by host convention.
pub const ATTR_HIDDEN: u16 = 0x02;

/// Attribute bit: entry is neither a regular file nor a directory.
pub const ATTR_SYSTEM: u16 = 0x04;
