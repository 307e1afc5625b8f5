use crate::{Immediate16, StaticLevel};

use consts::*;

use thiserror::Error;

pub mod consts;

/// Failure to decode an instruction from a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The opcode byte is not assigned in the instruction set.
    #[error("illegal opcode byte 0x{0:02x}")]
    Illegal(u8),
    /// The byte stream ends inside the instruction's inline argument.
    #[error("truncated instruction")]
    Truncated,
}

/// Instruction representation for the p-code machine.
///
/// The wire format is little-endian. The two high bits of the opcode byte
/// describe the inline argument shape:
///
/// * `0b00…`: no inline argument; the instruction is one byte.
/// * `0b10…`: a 16-bit argument follows (`ARG16`).
/// * `0b11…`: a static-level byte followed by a 16-bit offset
///   (`ARG16 | FRAME`); used by stack-reference and call instructions.
///
/// Values on the operand stack are 16-bit words. Reals occupy four words
/// (an IEEE-754 double, little-endian halves), sets occupy four words, and
/// string variables occupy three words `(size, address, capacity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation.
    NOP,
    /// Pops `b`, `a`; pushes `a + b`.
    ADD,
    /// Pops `b`, `a`; pushes `a - b`.
    SUB,
    /// Pops `b`, `a`; pushes `a * b`.
    MUL,
    /// Pops `b`, `a`; pushes `a div b`, signed. Faults on division by zero.
    DIV,
    /// Pops `b`, `a`; pushes `a div b`, unsigned. Faults on division by zero.
    UDIV,
    /// Pops `b`, `a`; pushes `a mod b`, signed. Faults on division by zero.
    MOD,
    /// Pops `b`, `a`; pushes `a mod b`, unsigned. Faults on division by zero.
    UMOD,
    /// Pops `a`; pushes `-a`.
    NEG,
    /// Pops `a`; pushes `|a|` (signed).
    ABS,
    /// Pops `a`; pushes `a + 1`.
    INC,
    /// Pops `a`; pushes `a - 1`.
    DEC,
    /// Pops `a`; pushes the bitwise complement of `a`.
    NOT,
    /// Pops `b`, `a`; pushes `a | b`.
    OR,
    /// Pops `b`, `a`; pushes `a & b`.
    AND,
    /// Pops `b`, `a`; pushes `a ^ b`.
    XOR,
    /// Pops `b`, `a`; pushes `a << b`.
    SLL,
    /// Pops `b`, `a`; pushes `a >> b`, zero filled.
    SRL,
    /// Pops `b`, `a`; pushes `a >> b`, sign extended.
    SRA,
    /// Duplicates the word on top of the stack.
    DUP,
    /// Exchanges the two words on top of the stack.
    XCHG,
    /// Pops `b`, `a`; pushes `a == b`.
    EQU,
    /// Pops `b`, `a`; pushes `a != b`.
    NEQ,
    /// Pops `b`, `a`; pushes `a < b`, signed.
    LT,
    /// Pops `b`, `a`; pushes `a > b`, signed.
    GT,
    /// Pops `b`, `a`; pushes `a <= b`, signed.
    LTE,
    /// Pops `b`, `a`; pushes `a >= b`, signed.
    GTE,
    /// Pops `b`, `a`; pushes `a < b`, unsigned.
    ULT,
    /// Pops `b`, `a`; pushes `a > b`, unsigned.
    UGT,
    /// Pops `b`, `a`; pushes `a <= b`, unsigned.
    ULTE,
    /// Pops `b`, `a`; pushes `a >= b`, unsigned.
    UGTE,
    /// Pops an address; pushes the word at that address.
    LDI,
    /// Pops an address; pushes the byte at that address, zero extended.
    LDIB,
    /// Pops an address; pushes the data-count words starting there.
    LDIM,
    /// Pops a value, then an address; stores the word.
    STI,
    /// Pops a value, then an address; stores the low byte.
    STIB,
    /// Pops data-count words, then an address; stores the words.
    STIM,
    /// Returns from a `PCAL` frame.
    RET,
    /// Terminates the program.
    END,

    /// Pushes the immediate value.
    PUSH(Immediate16),
    /// Adds the sign-extended immediate to the stack pointer.
    INDS(Immediate16),
    /// Pushes the address of a read-only data offset.
    LAC(Immediate16),
    /// Sets the data count used by the multi-word load/store instructions.
    SDC(Immediate16),
    /// Unconditional jump to the instruction offset.
    JMP(Immediate16),
    /// Pops a word; jumps when it is zero.
    JEQUZ(Immediate16),
    /// Pops a word; jumps when it is non-zero.
    JNEQZ(Immediate16),
    /// Sets the static nesting level.
    SLSP(Immediate16),
    /// Debug marker: source line number. Not executed.
    LINE(Immediate16),
    /// Debug marker: source file number. Not executed.
    INCLUDE(Immediate16),
    /// Floating-point sub-operation; see [`crate::FloatOp`].
    FLOAT(Immediate16),
    /// Set sub-operation; see [`crate::SetOp`].
    SETOP(Immediate16),
    /// System I/O sub-function; see [`crate::SysIo`].
    SYSIO(Immediate16),
    /// Runtime library call; see [`crate::LibCall`].
    LIB(Immediate16),

    /// Pushes the word at `(level, offset)`.
    LDS(StaticLevel, Immediate16),
    /// Pushes the byte at `(level, offset)`, zero extended.
    LDSB(StaticLevel, Immediate16),
    /// Pushes data-count words starting at `(level, offset)`.
    LDSM(StaticLevel, Immediate16),
    /// Pops a word; stores it at `(level, offset)`.
    STS(StaticLevel, Immediate16),
    /// Pops a word; stores its low byte at `(level, offset)`.
    STSB(StaticLevel, Immediate16),
    /// Pops data-count words; stores them at `(level, offset)`.
    STSM(StaticLevel, Immediate16),
    /// Pops a byte index; pushes the word at `(level, offset + index)`.
    LDSX(StaticLevel, Immediate16),
    /// Pops a byte index; pushes the byte at `(level, offset + index)`.
    LDSXB(StaticLevel, Immediate16),
    /// Pops a byte index; pushes data-count words at `(level, offset + index)`.
    LDSXM(StaticLevel, Immediate16),
    /// Pops a word, then a byte index; stores at `(level, offset + index)`.
    STSX(StaticLevel, Immediate16),
    /// Pops a word, then a byte index; stores the low byte.
    STSXB(StaticLevel, Immediate16),
    /// Pops data-count words, then a byte index; stores the words.
    STSXM(StaticLevel, Immediate16),
    /// Pushes the address of `(level, offset)`.
    LAS(StaticLevel, Immediate16),
    /// Pops a byte index; pushes the address of `(level, offset + index)`.
    LASX(StaticLevel, Immediate16),
    /// Calls the procedure at the instruction offset, entering the level.
    PCAL(StaticLevel, Immediate16),
}

impl Opcode {
    /// The ISA byte of this instruction.
    pub const fn opcode(&self) -> u8 {
        use Opcode::*;

        match self {
            NOP => OP_NOP,
            ADD => OP_ADD,
            SUB => OP_SUB,
            MUL => OP_MUL,
            DIV => OP_DIV,
            UDIV => OP_UDIV,
            MOD => OP_MOD,
            UMOD => OP_UMOD,
            NEG => OP_NEG,
            ABS => OP_ABS,
            INC => OP_INC,
            DEC => OP_DEC,
            NOT => OP_NOT,
            OR => OP_OR,
            AND => OP_AND,
            XOR => OP_XOR,
            SLL => OP_SLL,
            SRL => OP_SRL,
            SRA => OP_SRA,
            DUP => OP_DUP,
            XCHG => OP_XCHG,
            EQU => OP_EQU,
            NEQ => OP_NEQ,
            LT => OP_LT,
            GT => OP_GT,
            LTE => OP_LTE,
            GTE => OP_GTE,
            ULT => OP_ULT,
            UGT => OP_UGT,
            ULTE => OP_ULTE,
            UGTE => OP_UGTE,
            LDI => OP_LDI,
            LDIB => OP_LDIB,
            LDIM => OP_LDIM,
            STI => OP_STI,
            STIB => OP_STIB,
            STIM => OP_STIM,
            RET => OP_RET,
            END => OP_END,

            PUSH(_) => OP_PUSH,
            INDS(_) => OP_INDS,
            LAC(_) => OP_LAC,
            SDC(_) => OP_SDC,
            JMP(_) => OP_JMP,
            JEQUZ(_) => OP_JEQUZ,
            JNEQZ(_) => OP_JNEQZ,
            SLSP(_) => OP_SLSP,
            LINE(_) => OP_LINE,
            INCLUDE(_) => OP_INCLUDE,
            FLOAT(_) => OP_FLOAT,
            SETOP(_) => OP_SETOP,
            SYSIO(_) => OP_SYSIO,
            LIB(_) => OP_LIB,

            LDS(_, _) => OP_LDS,
            LDSB(_, _) => OP_LDSB,
            LDSM(_, _) => OP_LDSM,
            STS(_, _) => OP_STS,
            STSB(_, _) => OP_STSB,
            STSM(_, _) => OP_STSM,
            LDSX(_, _) => OP_LDSX,
            LDSXB(_, _) => OP_LDSXB,
            LDSXM(_, _) => OP_LDSXM,
            STSX(_, _) => OP_STSX,
            STSXB(_, _) => OP_STSXB,
            STSXM(_, _) => OP_STSXM,
            LAS(_, _) => OP_LAS,
            LASX(_, _) => OP_LASX,
            PCAL(_, _) => OP_PCAL,
        }
    }

    /// Encoded length of this instruction in bytes.
    pub const fn len(&self) -> usize {
        let op = self.opcode();

        if op & FRAME_FLAG == FRAME_FLAG {
            4
        } else if op & ARG16_FLAG != 0 {
            3
        } else {
            1
        }
    }

    /// `len` is never zero; present for clippy symmetry.
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Appends the wire representation of this instruction to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        use Opcode::*;

        buf.push(self.opcode());

        match *self {
            PUSH(x) | INDS(x) | LAC(x) | SDC(x) | JMP(x) | JEQUZ(x) | JNEQZ(x) | SLSP(x) | LINE(x)
            | INCLUDE(x) | FLOAT(x) | SETOP(x) | SYSIO(x) | LIB(x) => {
                buf.extend_from_slice(&x.to_le_bytes());
            }

            LDS(l, x) | LDSB(l, x) | LDSM(l, x) | STS(l, x) | STSB(l, x) | STSM(l, x) | LDSX(l, x)
            | LDSXB(l, x) | LDSXM(l, x) | STSX(l, x) | STSXB(l, x) | STSXM(l, x) | LAS(l, x) | LASX(l, x)
            | PCAL(l, x) => {
                buf.push(l);
                buf.extend_from_slice(&x.to_le_bytes());
            }

            _ => (),
        }
    }

    /// Decodes one instruction from the head of `bytes`.
    ///
    /// Returns the instruction and its encoded length.
    pub fn decode(bytes: &[u8]) -> Result<(Opcode, usize), DecodeError> {
        use Opcode::*;

        let op = *bytes.first().ok_or(DecodeError::Truncated)?;

        if op & FRAME_FLAG == FRAME_FLAG {
            if bytes.len() < 4 {
                return Err(DecodeError::Truncated);
            }

            let level = bytes[1];
            let imm = u16::from_le_bytes([bytes[2], bytes[3]]);

            let decoded = match op {
                OP_LDS => LDS(level, imm),
                OP_LDSB => LDSB(level, imm),
                OP_LDSM => LDSM(level, imm),
                OP_STS => STS(level, imm),
                OP_STSB => STSB(level, imm),
                OP_STSM => STSM(level, imm),
                OP_LDSX => LDSX(level, imm),
                OP_LDSXB => LDSXB(level, imm),
                OP_LDSXM => LDSXM(level, imm),
                OP_STSX => STSX(level, imm),
                OP_STSXB => STSXB(level, imm),
                OP_STSXM => STSXM(level, imm),
                OP_LAS => LAS(level, imm),
                OP_LASX => LASX(level, imm),
                OP_PCAL => PCAL(level, imm),
                _ => return Err(DecodeError::Illegal(op)),
            };

            Ok((decoded, 4))
        } else if op & ARG16_FLAG != 0 {
            if bytes.len() < 3 {
                return Err(DecodeError::Truncated);
            }

            let imm = u16::from_le_bytes([bytes[1], bytes[2]]);

            let decoded = match op {
                OP_PUSH => PUSH(imm),
                OP_INDS => INDS(imm),
                OP_LAC => LAC(imm),
                OP_SDC => SDC(imm),
                OP_JMP => JMP(imm),
                OP_JEQUZ => JEQUZ(imm),
                OP_JNEQZ => JNEQZ(imm),
                OP_SLSP => SLSP(imm),
                OP_LINE => LINE(imm),
                OP_INCLUDE => INCLUDE(imm),
                OP_FLOAT => FLOAT(imm),
                OP_SETOP => SETOP(imm),
                OP_SYSIO => SYSIO(imm),
                OP_LIB => LIB(imm),
                _ => return Err(DecodeError::Illegal(op)),
            };

            Ok((decoded, 3))
        } else {
            let decoded = match op {
                OP_NOP => NOP,
                OP_ADD => ADD,
                OP_SUB => SUB,
                OP_MUL => MUL,
                OP_DIV => DIV,
                OP_UDIV => UDIV,
                OP_MOD => MOD,
                OP_UMOD => UMOD,
                OP_NEG => NEG,
                OP_ABS => ABS,
                OP_INC => INC,
                OP_DEC => DEC,
                OP_NOT => NOT,
                OP_OR => OR,
                OP_AND => AND,
                OP_XOR => XOR,
                OP_SLL => SLL,
                OP_SRL => SRL,
                OP_SRA => SRA,
                OP_DUP => DUP,
                OP_XCHG => XCHG,
                OP_EQU => EQU,
                OP_NEQ => NEQ,
                OP_LT => LT,
                OP_GT => GT,
                OP_LTE => LTE,
                OP_GTE => GTE,
                OP_ULT => ULT,
                OP_UGT => UGT,
                OP_ULTE => ULTE,
                OP_UGTE => UGTE,
                OP_LDI => LDI,
                OP_LDIB => LDIB,
                OP_LDIM => LDIM,
                OP_STI => STI,
                OP_STIB => STIB,
                OP_STIM => STIM,
                OP_RET => RET,
                OP_END => END,
                _ => return Err(DecodeError::Illegal(op)),
            };

            Ok((decoded, 1))
        }
    }
}

impl IntoIterator for Opcode {
    type Item = u8;
    type IntoIter = std::vec::IntoIter<u8>;

    fn into_iter(self) -> Self::IntoIter {
        let mut buf = Vec::with_capacity(self.len());
        self.encode(&mut buf);
        buf.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[Opcode] = &[
        Opcode::NOP,
        Opcode::ADD,
        Opcode::UGTE,
        Opcode::STIM,
        Opcode::END,
        Opcode::PUSH(0xbeef),
        Opcode::INDS(0xfffc),
        Opcode::SDC(4),
        Opcode::LIB(7),
        Opcode::LDS(0, 2),
        Opcode::STSXM(3, 0x0102),
        Opcode::PCAL(1, 0x0040),
    ];

    #[test]
    fn encode_decode_round_trip() {
        for op in SAMPLE {
            let mut buf = Vec::new();
            op.encode(&mut buf);
            assert_eq!(buf.len(), op.len());

            let (decoded, len) = Opcode::decode(&buf).expect("decodes");
            assert_eq!(decoded, *op);
            assert_eq!(len, op.len());
        }
    }

    #[test]
    fn decode_rejects_reserved_bytes() {
        assert_eq!(Opcode::decode(&[0x3f]), Err(DecodeError::Illegal(0x3f)));
        assert_eq!(Opcode::decode(&[0x40, 0, 0]), Err(DecodeError::Illegal(0x40)));
    }

    #[test]
    fn decode_rejects_truncated_arguments() {
        assert_eq!(Opcode::decode(&[]), Err(DecodeError::Truncated));
        assert_eq!(Opcode::decode(&[consts::OP_PUSH, 0x01]), Err(DecodeError::Truncated));
        assert_eq!(
            Opcode::decode(&[consts::OP_LDS, 0x00, 0x01]),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn argument_flags_partition_the_opcode_space() {
        for op in SAMPLE {
            let byte = op.opcode();
            match op.len() {
                1 => assert_eq!(byte & consts::ARG16_FLAG, 0),
                3 => {
                    assert_ne!(byte & consts::ARG16_FLAG, 0);
                    assert_ne!(byte & consts::FRAME_FLAG, consts::FRAME_FLAG);
                }
                4 => assert_eq!(byte & consts::FRAME_FLAG, consts::FRAME_FLAG),
                _ => unreachable!(),
            }
        }
    }
}
