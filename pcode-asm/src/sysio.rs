/// System I/O sub-functions carried by the `SYSIO` instruction.
///
/// Operands travel on the operand stack; the conventions are documented
/// per function on the interpreter side. File numbers `0` and `1` are
/// permanently bound to standard input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum SysIo {
    /// Pushes a freshly allocated file number.
    Allocate = 0x00,
    /// Pops a file number; releases its table entry.
    Free = 0x01,
    /// Pops an open-mode word, a record-size word (zero for text), a
    /// file-name string and a file number; opens the host file.
    Open = 0x02,
    /// Pops a file number; closes the host stream.
    Close = 0x03,
    /// Pops a file number; pushes the end-of-file condition.
    Eof = 0x04,
    /// Pops a file number; pushes the end-of-line condition.
    Eoln = 0x05,
    /// Pops a file number; parses an integer from text and pushes it.
    ReadInt = 0x06,
    /// Pops a file number; pushes the next character.
    ReadChar = 0x07,
    /// Pops a string-variable address, then a file number; reads the rest
    /// of the line into the variable.
    ReadString = 0x08,
    /// Pops a file number; parses a real from text and pushes it.
    ReadReal = 0x09,
    /// Pops a file number; consumes input through the next end of line.
    ReadLine = 0x0a,
    /// Pops a field width, a value and a file number; writes the value as
    /// signed decimal text.
    WriteInt = 0x0b,
    /// Pops a field width, a value and a file number; writes the value as
    /// unsigned decimal text.
    WriteWord = 0x0c,
    /// Pops a field width, a 32-bit value (two words) and a file number;
    /// writes it as signed decimal text.
    WriteLongInt = 0x0d,
    /// Pops a field width, a character and a file number; writes it.
    WriteChar = 0x0e,
    /// Pops a field width, a string value and a file number; writes it.
    WriteString = 0x0f,
    /// Pops a precision, a field width, a real and a file number; writes
    /// it as fixed-point or scientific text.
    WriteReal = 0x10,
    /// Pops a file number; writes an end of line.
    WriteLine = 0x11,
    /// Pops a file number; flushes buffered output.
    Flush = 0x12,
    /// Pops a 32-bit position (two words) and a file number; seeks.
    Seek = 0x13,
    /// Pops a file number; pushes the 32-bit position (two words).
    FilePos = 0x14,
    /// Pops a file number; pushes the 32-bit size (two words).
    FileSize = 0x15,
    /// Pops a path string and a directory-record address; opens a host
    /// directory iterator and pushes a success word.
    OpenDir = 0x16,
    /// Pops a search-record address, then a directory-record address;
    /// advances the iterator and pushes a success word.
    ReadDir = 0x17,
    /// Pops a directory-record address; restarts the iterator.
    RewindDir = 0x18,
    /// Pops a directory-record address; closes the iterator and pushes a
    /// success word.
    CloseDir = 0x19,
    /// Pops a string-variable address; stores the working directory.
    GetCwd = 0x1a,
    /// Pops a path string; changes the working directory and pushes a
    /// success word.
    ChDir = 0x1b,
}

impl SysIo {
    /// Maps a `SYSIO` argument back to the sub-function.
    pub fn from_word(word: u16) -> Option<SysIo> {
        use strum::IntoEnumIterator;

        SysIo::iter().find(|f| *f as u16 == word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn word_round_trip() {
        for f in SysIo::iter() {
            assert_eq!(SysIo::from_word(f as u16), Some(f));
        }
        assert_eq!(SysIo::from_word(0x1c), None);
    }
}
