/// Runtime string-library entry points carried by the `LIB` instruction.
///
/// String variables are three words `(size, address, capacity)`; the
/// capacity word's high bit flags a heap-allocated buffer. String values
/// travel on the stack in the same three-word shape; read-only literals
/// travel as two words `(size, address)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum LibCall {
    /// Pops a string-variable address; attaches a fresh string-stack
    /// buffer to it.
    StrInit = 0x00,
    /// Pops a destination string-variable address, then a string value;
    /// copies with clipping. A copy onto the same buffer is a no-op.
    StrCpy = 0x01,
    /// Pops a string value; pushes an independent temporary copy.
    StrDup = 0x02,
    /// Pops a string value, then a destination string value; appends and
    /// pushes the destination.
    StrCat = 0x03,
    /// Pops a character, then a destination string value; appends and
    /// pushes the destination.
    StrCatChar = 0x04,
    /// Pops two string values; pushes their signed comparison.
    StrCmp = 0x05,
    /// Pops a length, a 1-based position and a string value; pushes the
    /// clipped substring as a temporary.
    SubStr = 0x06,
    /// Pops a 1-based start position, a haystack string, then a needle
    /// string; pushes the 1-based position of the first match at or after
    /// the start, or zero. An empty needle matches at the start position.
    FindStr = 0x07,
    /// Pops a 1-based position, a destination string-variable address and
    /// a source string value; inserts within capacity.
    InsertStr = 0x08,
    /// Pops a length, a 1-based position and a string-variable address;
    /// deletes the range.
    DeleteStr = 0x09,
    /// Pops a fill character, a count and a string-variable address; pads
    /// from the current length up to the count, bound by capacity.
    FillChr = 0x0a,
    /// Pops a 1-based index and a string value; pushes the character, or
    /// zero when the index is out of range.
    CharAt = 0x0b,
    /// Pops a string-variable address, a field width and an integer;
    /// formats the integer into the variable.
    IntStr = 0x0c,
    /// Pops a string-variable address, a field width and an unsigned
    /// word; formats it into the variable.
    UIntStr = 0x0d,
    /// Pops a string-variable address, a field width and a 32-bit value
    /// (two words); formats it into the variable.
    LongStr = 0x0e,
    /// Pops a string-variable address, a precision, a field width and a
    /// real; formats it into the variable.
    RealStr = 0x0f,
    /// Pops an error-index variable address, a value variable address and
    /// a string value; parses an integer. The error variable receives the
    /// 1-based index of the first offending character, or zero.
    StrVal = 0x10,
    /// Pops a size and an array address; pushes the packed
    /// array-of-char as a temporary string.
    BStr2Str = 0x11,
    /// Pops a size, an array address and a string value; stores the
    /// string into the packed array, clipped and space padded.
    Str2BStr = 0x12,
    /// Pops a read-only string value `(size, address)`; pushes it as a
    /// temporary string variable value.
    CStr2Str = 0x13,
    /// Pops a character; pushes it as a temporary one-character string.
    Char2Str = 0x14,
    /// Pops a byte size; allocates a heap chunk and pushes its address.
    New = 0x15,
    /// Pops a heap address; returns its chunk to the allocator.
    Dispose = 0x16,
}

impl LibCall {
    /// Maps a `LIB` argument back to the entry point.
    pub fn from_word(word: u16) -> Option<LibCall> {
        use strum::IntoEnumIterator;

        LibCall::iter().find(|f| *f as u16 == word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn word_round_trip() {
        for f in LibCall::iter() {
            assert_eq!(LibCall::from_word(f as u16), Some(f));
        }
        assert_eq!(LibCall::from_word(0x17), None);
    }
}
