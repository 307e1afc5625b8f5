/// Floating-point sub-operations carried by the `FLOAT` instruction.
///
/// The low byte of the 16-bit argument selects the operation; the
/// [`ARG1`]/[`ARG2`] bits request an integer-to-real conversion of the
/// corresponding operand before the operation runs. Reals live on the
/// stack as four 16-bit words, the little-endian halves of an IEEE-754
/// double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum FloatOp {
    /// Pops an integer word; pushes it as a real.
    Float = 0x00,
    /// Pops a real; pushes the nearest integer word.
    Round = 0x01,
    /// Pops a real; pushes its integer part.
    Trunc = 0x02,
    /// Real addition.
    Add = 0x03,
    /// Real subtraction.
    Sub = 0x04,
    /// Real multiplication.
    Mul = 0x05,
    /// Real division.
    Div = 0x06,
    /// Real remainder.
    Mod = 0x07,
    /// Real negation.
    Neg = 0x08,
    /// Real absolute value.
    Abs = 0x09,
    /// Real equality; pushes a boolean word.
    Equ = 0x0a,
    /// Real inequality; pushes a boolean word.
    Neq = 0x0b,
    /// Real less-than; pushes a boolean word.
    Lt = 0x0c,
    /// Real greater-than; pushes a boolean word.
    Gt = 0x0d,
    /// Real less-or-equal; pushes a boolean word.
    Lte = 0x0e,
    /// Real greater-or-equal; pushes a boolean word.
    Gte = 0x0f,
}

/// Convert the first (deeper) operand from integer to real.
pub const ARG1: u16 = 0x0100;

/// Convert the second (top) operand from integer to real.
pub const ARG2: u16 = 0x0200;

impl FloatOp {
    /// Packs the operation and conversion flags into a `FLOAT` argument.
    pub const fn pack(self, flags: u16) -> u16 {
        self as u16 | (flags & (ARG1 | ARG2))
    }

    /// Splits a `FLOAT` argument into operation and conversion flags.
    ///
    /// Returns `None` when the operation byte is unassigned.
    pub fn unpack(word: u16) -> Option<(FloatOp, bool, bool)> {
        use FloatOp::*;

        let op = match (word & 0x00ff) as u8 {
            0x00 => Float,
            0x01 => Round,
            0x02 => Trunc,
            0x03 => Add,
            0x04 => Sub,
            0x05 => Mul,
            0x06 => Div,
            0x07 => Mod,
            0x08 => Neg,
            0x09 => Abs,
            0x0a => Equ,
            0x0b => Neq,
            0x0c => Lt,
            0x0d => Gt,
            0x0e => Lte,
            0x0f => Gte,
            _ => return None,
        };

        Some((op, word & ARG1 != 0, word & ARG2 != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn pack_unpack_round_trip() {
        for op in FloatOp::iter() {
            for flags in [0, ARG1, ARG2, ARG1 | ARG2] {
                let word = op.pack(flags);
                let (op2, a1, a2) = FloatOp::unpack(word).unwrap();
                assert_eq!(op, op2);
                assert_eq!(a1, flags & ARG1 != 0);
                assert_eq!(a2, flags & ARG2 != 0);
            }
        }
    }

    #[test]
    fn unassigned_operation_is_rejected() {
        assert_eq!(FloatOp::unpack(0x0010), None);
    }
}
