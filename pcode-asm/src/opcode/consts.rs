//! ISA byte assignments.
//!
//! The two high bits of the opcode byte describe the inline argument shape;
//! the remaining six bits select the operation within the group. Bytes in
//! `0x40..=0x7f` are reserved and decode as illegal.

/// Set when a 16-bit inline argument follows the opcode byte.
pub const ARG16_FLAG: u8 = 0x80;

/// Both high bits: a static-level byte and a 16-bit offset follow.
pub const FRAME_FLAG: u8 = 0xc0;

/* no-argument group */

/// No operation.
pub const OP_NOP: u8 = 0x00;
/// Signed/unsigned-neutral addition.
pub const OP_ADD: u8 = 0x01;
/// Subtraction.
pub const OP_SUB: u8 = 0x02;
/// Multiplication.
pub const OP_MUL: u8 = 0x03;
/// Signed division.
pub const OP_DIV: u8 = 0x04;
/// Unsigned division.
pub const OP_UDIV: u8 = 0x05;
/// Signed remainder.
pub const OP_MOD: u8 = 0x06;
/// Unsigned remainder.
pub const OP_UMOD: u8 = 0x07;
/// Arithmetic negation.
pub const OP_NEG: u8 = 0x08;
/// Absolute value.
pub const OP_ABS: u8 = 0x09;
/// Increment.
pub const OP_INC: u8 = 0x0a;
/// Decrement.
pub const OP_DEC: u8 = 0x0b;
/// Bitwise complement.
pub const OP_NOT: u8 = 0x0c;
/// Bitwise or.
pub const OP_OR: u8 = 0x0d;
/// Bitwise and.
pub const OP_AND: u8 = 0x0e;
/// Bitwise exclusive or.
pub const OP_XOR: u8 = 0x0f;
/// Shift left logical.
pub const OP_SLL: u8 = 0x10;
/// Shift right logical.
pub const OP_SRL: u8 = 0x11;
/// Shift right arithmetic.
pub const OP_SRA: u8 = 0x12;
/// Duplicate top of stack.
pub const OP_DUP: u8 = 0x13;
/// Exchange the top two words.
pub const OP_XCHG: u8 = 0x14;
/// Equality comparison.
pub const OP_EQU: u8 = 0x15;
/// Inequality comparison.
pub const OP_NEQ: u8 = 0x16;
/// Signed less-than.
pub const OP_LT: u8 = 0x17;
/// Signed greater-than.
pub const OP_GT: u8 = 0x18;
/// Signed less-or-equal.
pub const OP_LTE: u8 = 0x19;
/// Signed greater-or-equal.
pub const OP_GTE: u8 = 0x1a;
/// Unsigned less-than.
pub const OP_ULT: u8 = 0x1b;
/// Unsigned greater-than.
pub const OP_UGT: u8 = 0x1c;
/// Unsigned less-or-equal.
pub const OP_ULTE: u8 = 0x1d;
/// Unsigned greater-or-equal.
pub const OP_UGTE: u8 = 0x1e;
/// Load word indirect.
pub const OP_LDI: u8 = 0x20;
/// Load byte indirect.
pub const OP_LDIB: u8 = 0x21;
/// Load multiple words indirect.
pub const OP_LDIM: u8 = 0x22;
/// Store word indirect.
pub const OP_STI: u8 = 0x23;
/// Store byte indirect.
pub const OP_STIB: u8 = 0x24;
/// Store multiple words indirect.
pub const OP_STIM: u8 = 0x25;
/// Return from procedure.
pub const OP_RET: u8 = 0x2e;
/// Terminate the program.
pub const OP_END: u8 = 0x2f;

/* 16-bit-argument group */

/// Push immediate.
pub const OP_PUSH: u8 = 0x80;
/// Adjust the stack pointer.
pub const OP_INDS: u8 = 0x81;
/// Push a read-only data address.
pub const OP_LAC: u8 = 0x82;
/// Set the multi-word data count.
pub const OP_SDC: u8 = 0x83;
/// Unconditional jump.
pub const OP_JMP: u8 = 0x84;
/// Jump when the popped word is zero.
pub const OP_JEQUZ: u8 = 0x85;
/// Jump when the popped word is non-zero.
pub const OP_JNEQZ: u8 = 0x86;
/// Set the static nesting level.
pub const OP_SLSP: u8 = 0x87;
/// Source line marker.
pub const OP_LINE: u8 = 0x88;
/// Source file marker.
pub const OP_INCLUDE: u8 = 0x89;
/// Floating-point sub-operation.
pub const OP_FLOAT: u8 = 0x8a;
/// Set sub-operation.
pub const OP_SETOP: u8 = 0x8b;
/// System I/O sub-function.
pub const OP_SYSIO: u8 = 0x8c;
/// Runtime library call.
pub const OP_LIB: u8 = 0x8d;

/* level + offset group */

/// Load word from stack frame.
pub const OP_LDS: u8 = 0xc0;
/// Load byte from stack frame.
pub const OP_LDSB: u8 = 0xc1;
/// Load multiple words from stack frame.
pub const OP_LDSM: u8 = 0xc2;
/// Store word to stack frame.
pub const OP_STS: u8 = 0xc3;
/// Store byte to stack frame.
pub const OP_STSB: u8 = 0xc4;
/// Store multiple words to stack frame.
pub const OP_STSM: u8 = 0xc5;
/// Load word, indexed.
pub const OP_LDSX: u8 = 0xc6;
/// Load byte, indexed.
pub const OP_LDSXB: u8 = 0xc7;
/// Load multiple words, indexed.
pub const OP_LDSXM: u8 = 0xc8;
/// Store word, indexed.
pub const OP_STSX: u8 = 0xc9;
/// Store byte, indexed.
pub const OP_STSXB: u8 = 0xca;
/// Store multiple words, indexed.
pub const OP_STSXM: u8 = 0xcb;
/// Load frame address.
pub const OP_LAS: u8 = 0xcc;
/// Load frame address, indexed.
pub const OP_LASX: u8 = 0xcd;
/// Procedure call.
pub const OP_PCAL: u8 = 0xce;
