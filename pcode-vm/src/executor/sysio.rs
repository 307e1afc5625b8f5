//! File table and system I/O sub-functions.
//!
//! The file table maps Pascal file numbers onto host streams. Numbers `0`
//! and `1` are permanently bound to standard input and output in text
//! mode; user files live in `2..MAX_OPEN_FILES`. Text parsing goes
//! through a per-file line buffer; `eoln` reflects the position inside
//! that buffer after the last read.

use super::Executor;
use crate::consts::*;
use crate::error::RuntimeError;

use pcode_asm::{Fault, SysIo};

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::debug;

/// How a file table entry was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    Read,
    Write,
    Append,
}

impl OpenMode {
    fn from_word(word: u16) -> Result<Self, Fault> {
        match word {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            3 => Ok(Self::Append),
            _ => Err(Fault::BadOpenMode),
        }
    }
}

/// Host side of a file table entry.
#[derive(Debug)]
pub(crate) enum Stream {
    Stdin,
    Stdout,
    File(File),
    /// Scripted standard input for tests and embedders.
    Bytes(io::Cursor<Vec<u8>>),
    /// Captured standard output for tests and embedders.
    Capture(Vec<u8>),
}

impl Stream {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let stream: &mut dyn Read = match self {
            Self::Stdin => return read_stdin_byte(),
            Self::File(f) => f,
            Self::Bytes(b) => b,
            Self::Stdout | Self::Capture(_) => {
                return Err(io::Error::new(io::ErrorKind::Unsupported, "stream is write only"))
            }
        };

        match stream.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().write_all(bytes),
            Self::Capture(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Self::File(f) => f.write_all(bytes),
            Self::Stdin | Self::Bytes(_) => Err(io::Error::new(io::ErrorKind::Unsupported, "stream is read only")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout => io::stdout().flush(),
            Self::File(f) => f.flush(),
            _ => Ok(()),
        }
    }
}

fn read_stdin_byte() -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match io::stdin().read(&mut byte)? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

/// One slot of the file table.
#[derive(Debug, Default)]
pub(crate) struct FileEntry {
    path: String,
    text: bool,
    record_size: u16,
    stream: Option<Stream>,
    mode: Option<OpenMode>,
    in_use: bool,
    eoln: bool,
    /// Line buffer for text parsing; never contains the newline.
    line: Vec<u8>,
    line_pos: usize,
    hit_eof: bool,
    line_valid: bool,
}

impl FileEntry {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Fixed-size table of open files.
#[derive(Debug)]
pub(crate) struct FileTable {
    entries: Vec<FileEntry>,
}

impl FileTable {
    pub(crate) fn new() -> Self {
        let mut entries: Vec<FileEntry> = (0..MAX_OPEN_FILES).map(|_| FileEntry::default()).collect();

        entries[INPUT_FILE as usize] = FileEntry {
            path: "INPUT".into(),
            text: true,
            record_size: 0,
            stream: Some(Stream::Stdin),
            mode: Some(OpenMode::Read),
            in_use: true,
            ..Default::default()
        };
        entries[OUTPUT_FILE as usize] = FileEntry {
            path: "OUTPUT".into(),
            text: true,
            record_size: 0,
            stream: Some(Stream::Stdout),
            mode: Some(OpenMode::Write),
            in_use: true,
            ..Default::default()
        };

        Self { entries }
    }

    pub(crate) fn set_stream(&mut self, fileno: u16, stream: Stream) {
        self.entries[fileno as usize].stream = Some(stream);
    }

    pub(crate) fn captured_output(&self) -> &[u8] {
        match &self.entries[OUTPUT_FILE as usize].stream {
            Some(Stream::Capture(buf)) => buf,
            _ => &[],
        }
    }

    fn entry(&mut self, fileno: u16) -> Result<&mut FileEntry, Fault> {
        self.entries.get_mut(fileno as usize).filter(|e| e.in_use).ok_or(Fault::BadFile)
    }
}

/// Host directory iterator marshalled through a Pascal `TDir` record.
#[derive(Debug)]
struct DirHandle {
    iter: std::fs::ReadDir,
    path: PathBuf,
}

/// Open directory iterators; a `TDir` record stores `slot + 1`.
#[derive(Debug, Default)]
pub(crate) struct DirTable {
    handles: Vec<Option<DirHandle>>,
}

impl DirTable {
    fn insert(&mut self, handle: DirHandle) -> u16 {
        for (i, slot) in self.handles.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(handle);
                return i as u16 + 1;
            }
        }
        self.handles.push(Some(handle));
        self.handles.len() as u16
    }

    fn get(&mut self, word: u16) -> Option<&mut DirHandle> {
        word.checked_sub(1)
            .and_then(|i| self.handles.get_mut(i as usize))
            .and_then(|slot| slot.as_mut())
    }

    fn remove(&mut self, word: u16) -> Option<DirHandle> {
        word.checked_sub(1)
            .and_then(|i| self.handles.get_mut(i as usize))
            .and_then(|slot| slot.take())
    }
}

impl Executor {
    pub(crate) fn sysio(&mut self, word: u16) -> Result<(), RuntimeError> {
        let func = SysIo::from_word(word).ok_or(Fault::BadSysIoFunction)?;

        match func {
            SysIo::Allocate => {
                let fileno = self
                    .files
                    .entries
                    .iter()
                    .position(|e| !e.in_use)
                    .ok_or(Fault::TooManyFiles)?;
                self.files.entries[fileno].in_use = true;
                self.push(fileno as u16)?;
            }

            SysIo::Free => {
                let fileno = self.pop()?;
                if fileno < 2 {
                    return Err(Fault::BadFile.into());
                }
                self.files.entry(fileno)?.reset();
            }

            SysIo::Open => {
                let mode = OpenMode::from_word(self.pop()?)?;
                let record_size = self.pop()?;
                let name = self.pop_string()?;
                let fileno = self.pop()?;

                let path = String::from_utf8_lossy(self.bytes_at(name.addr, name.size)?).into_owned();
                if path.is_empty() {
                    return Err(Fault::BadFileName.into());
                }

                let entry = self.files.entry(fileno)?;
                if entry.stream.is_some() {
                    return Err(Fault::FileAlreadyOpen.into());
                }

                let file = match mode {
                    OpenMode::Read => File::open(&path),
                    OpenMode::Write => File::create(&path),
                    OpenMode::Append => OpenOptions::new().append(true).create(true).open(&path),
                }
                .map_err(|e| {
                    debug!(%path, ?e, "open failed");
                    Fault::OpenFailed
                })?;

                entry.path = path;
                entry.text = record_size == 0;
                entry.record_size = record_size;
                entry.mode = Some(mode);
                entry.stream = Some(Stream::File(file));
            }

            SysIo::Close => {
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;
                if entry.stream.take().is_none() {
                    return Err(Fault::FileNotOpen.into());
                }
                entry.mode = None;
                entry.line.clear();
                entry.line_pos = 0;
                entry.line_valid = false;
            }

            SysIo::Eof => {
                let fileno = self.pop()?;
                let eof = self.file_eof(fileno)?;
                self.push(eof as u16)?;
            }

            SysIo::Eoln => {
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;
                let eoln = entry.eoln;
                self.push(eoln as u16)?;
            }

            SysIo::ReadInt => {
                let fileno = self.pop()?;
                let text = self.read_token(fileno)?;
                let value: i32 = text.parse().map_err(|_| Fault::ValueRange)?;
                if value < i16::MIN as i32 || value > i16::MAX as i32 {
                    return Err(Fault::ValueRange.into());
                }
                self.push(value as i16 as u16)?;
            }

            SysIo::ReadChar => {
                let fileno = self.pop()?;
                let ch = self.read_char(fileno)?;
                self.push(ch as u16)?;
            }

            SysIo::ReadString => {
                let var = self.pop()?;
                let fileno = self.pop()?;
                let rest = self.read_rest_of_line(fileno)?;
                self.store_text(var, &rest)?;
            }

            SysIo::ReadReal => {
                let fileno = self.pop()?;
                let text = self.read_token(fileno)?;
                let value: f64 = text.parse().map_err(|_| Fault::ValueRange)?;
                self.push_real(value)?;
            }

            SysIo::ReadLine => {
                let fileno = self.pop()?;
                self.fill_line(fileno)?;
            }

            SysIo::WriteInt => {
                let width = self.pop()?;
                let value = self.pop()? as i16;
                let fileno = self.pop()?;
                self.write_text(fileno, super::strings::format_int(value as i64, width).as_bytes())?;
            }

            SysIo::WriteWord => {
                let width = self.pop()?;
                let value = self.pop()?;
                let fileno = self.pop()?;
                self.write_text(fileno, super::strings::format_int(value as i64, width).as_bytes())?;
            }

            SysIo::WriteLongInt => {
                let width = self.pop()?;
                let value = self.pop_u32()? as i32;
                let fileno = self.pop()?;
                self.write_text(fileno, super::strings::format_int(value as i64, width).as_bytes())?;
            }

            SysIo::WriteChar => {
                let width = self.pop()?;
                let ch = self.pop()? as u8;
                let fileno = self.pop()?;

                let mut out = vec![b' '; (width as usize).saturating_sub(1)];
                out.push(ch);
                self.write_text(fileno, &out)?;
            }

            SysIo::WriteString => {
                let width = self.pop()?;
                let s = self.pop_string()?;
                let fileno = self.pop()?;

                let mut out = vec![b' '; (width as usize).saturating_sub(s.size as usize)];
                out.extend_from_slice(self.bytes_at(s.addr, s.size)?);
                self.write_text(fileno, &out)?;
            }

            SysIo::WriteReal => {
                let precision = self.pop()?;
                let width = self.pop()?;
                let value = self.pop_real()?;
                let fileno = self.pop()?;
                self.write_text(fileno, super::strings::format_real(value, width, precision).as_bytes())?;
            }

            SysIo::WriteLine => {
                let fileno = self.pop()?;
                self.write_text(fileno, b"\n")?;
            }

            SysIo::Flush => {
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;
                let stream = entry.stream.as_mut().ok_or(Fault::FileNotOpen)?;
                stream.flush().map_err(|_| Fault::WriteFailed)?;
            }

            SysIo::Seek => {
                let pos = self.pop_u32()?;
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;

                match entry.stream.as_mut() {
                    Some(Stream::File(f)) => {
                        f.seek(SeekFrom::Start(pos as u64)).map_err(|_| Fault::SeekFailed)?;
                        entry.line.clear();
                        entry.line_pos = 0;
                        entry.line_valid = false;
                        entry.hit_eof = false;
                    }
                    Some(_) => return Err(Fault::SeekFailed.into()),
                    None => return Err(Fault::FileNotOpen.into()),
                }
            }

            SysIo::FilePos => {
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;

                let pos = match entry.stream.as_mut() {
                    Some(Stream::File(f)) => f.stream_position().map_err(|_| Fault::TellFailed)?,
                    Some(_) => return Err(Fault::TellFailed.into()),
                    None => return Err(Fault::FileNotOpen.into()),
                };
                self.push_u32(pos as u32)?;
            }

            SysIo::FileSize => {
                let fileno = self.pop()?;
                let entry = self.files.entry(fileno)?;

                let len = match entry.stream.as_ref() {
                    Some(Stream::File(f)) => f.metadata().map_err(|_| Fault::TellFailed)?.len(),
                    Some(_) => return Err(Fault::TellFailed.into()),
                    None => return Err(Fault::FileNotOpen.into()),
                };
                self.push_u32(len as u32)?;
            }

            SysIo::OpenDir => {
                let path = self.pop_string()?;
                let dir_var = self.pop()?;

                let path = String::from_utf8_lossy(self.bytes_at(path.addr, path.size)?).into_owned();
                match std::fs::read_dir(&path) {
                    Ok(iter) => {
                        let word = self.dirs.insert(DirHandle { iter, path: path.into() });
                        self.set_word(dir_var, word)?;
                        self.push(1)?;
                    }
                    Err(e) => {
                        debug!(%path, ?e, "opendir failed");
                        self.set_word(dir_var, 0)?;
                        self.push(0)?;
                    }
                }
            }

            SysIo::ReadDir => {
                let search_var = self.pop()?;
                let dir_var = self.pop()?;
                let word = self.word_at(dir_var)?;
                let found = self.dir_next(word, search_var)?;
                self.push(found as u16)?;
            }

            SysIo::RewindDir => {
                let dir_var = self.pop()?;
                let word = self.word_at(dir_var)?;

                if let Some(handle) = self.dirs.get(word) {
                    if let Ok(iter) = std::fs::read_dir(&handle.path) {
                        handle.iter = iter;
                    }
                }
            }

            SysIo::CloseDir => {
                let dir_var = self.pop()?;
                let word = self.word_at(dir_var)?;
                let closed = self.dirs.remove(word).is_some();
                self.set_word(dir_var, 0)?;
                self.push(closed as u16)?;
            }

            SysIo::GetCwd => {
                let var = self.pop()?;
                let cwd = std::env::current_dir().map_err(|_| Fault::GetCwdFailed)?;
                let text = cwd.to_string_lossy().into_owned();
                self.store_text(var, text.as_bytes())?;
            }

            SysIo::ChDir => {
                let path = self.pop_string()?;
                let path = String::from_utf8_lossy(self.bytes_at(path.addr, path.size)?).into_owned();
                let ok = std::env::set_current_dir(&path).is_ok();
                self.push(ok as u16)?;
            }
        }

        Ok(())
    }

    /* text reading through the line buffer */

    /// Reads the next host line into the entry's buffer. The buffer never
    /// holds the newline; `eoln` becomes true when the position reaches
    /// its end.
    fn fill_line(&mut self, fileno: u16) -> Result<(), Fault> {
        let entry = self.files.entry(fileno)?;
        if entry.mode != Some(OpenMode::Read) {
            return Err(Fault::NotOpenForRead);
        }
        let stream = entry.stream.as_mut().ok_or(Fault::FileNotOpen)?;

        entry.line.clear();
        entry.line_pos = 0;
        entry.line_valid = true;

        loop {
            match stream.read_byte().map_err(|_| Fault::ReadFailed)? {
                None => {
                    entry.hit_eof = true;
                    break;
                }
                Some(b'\n') => break,
                Some(b) => entry.line.push(b),
            }
        }

        entry.eoln = entry.line.is_empty();
        Ok(())
    }

    fn ensure_line(&mut self, fileno: u16) -> Result<(), Fault> {
        if !self.files.entry(fileno)?.line_valid {
            self.fill_line(fileno)?;
        }
        Ok(())
    }

    /// Next character of a text file; an exhausted line yields a space
    /// and advances to the next line.
    fn read_char(&mut self, fileno: u16) -> Result<u8, Fault> {
        self.ensure_line(fileno)?;
        let entry = self.files.entry(fileno)?;

        if entry.line_pos < entry.line.len() {
            let ch = entry.line[entry.line_pos];
            entry.line_pos += 1;
            entry.eoln = entry.line_pos == entry.line.len();
            Ok(ch)
        } else {
            entry.eoln = false;
            self.fill_line(fileno)?;
            Ok(b' ')
        }
    }

    /// Collects a whitespace-delimited token, crossing line boundaries.
    fn read_token(&mut self, fileno: u16) -> Result<String, Fault> {
        self.ensure_line(fileno)?;

        loop {
            let entry = self.files.entry(fileno)?;
            while entry.line_pos < entry.line.len() && entry.line[entry.line_pos] == b' ' {
                entry.line_pos += 1;
            }
            if entry.line_pos < entry.line.len() {
                break;
            }
            if entry.hit_eof {
                return Err(Fault::ReadFailed);
            }
            self.fill_line(fileno)?;
        }

        let entry = self.files.entry(fileno)?;
        let start = entry.line_pos;
        while entry.line_pos < entry.line.len() && entry.line[entry.line_pos] != b' ' {
            entry.line_pos += 1;
        }
        entry.eoln = entry.line_pos == entry.line.len();

        Ok(String::from_utf8_lossy(&entry.line[start..entry.line_pos]).into_owned())
    }

    fn read_rest_of_line(&mut self, fileno: u16) -> Result<Vec<u8>, Fault> {
        self.ensure_line(fileno)?;
        let entry = self.files.entry(fileno)?;

        let rest = entry.line[entry.line_pos..].to_vec();
        entry.line_pos = entry.line.len();
        entry.eoln = true;
        Ok(rest)
    }

    /// End of file: the host stream is exhausted, or a seekable stream's
    /// position reached its size, with no buffered text pending.
    fn file_eof(&mut self, fileno: u16) -> Result<bool, Fault> {
        let entry = self.files.entry(fileno)?;

        if entry.line_valid && entry.line_pos < entry.line.len() {
            return Ok(false);
        }
        if entry.hit_eof {
            return Ok(true);
        }

        match entry.stream.as_mut() {
            Some(Stream::File(f)) => {
                let pos = f.stream_position().map_err(|_| Fault::TellFailed)?;
                let len = f.metadata().map_err(|_| Fault::TellFailed)?.len();
                Ok(pos >= len)
            }
            Some(Stream::Bytes(b)) => Ok(b.position() >= b.get_ref().len() as u64),
            Some(_) => Ok(false),
            None => Err(Fault::FileNotOpen),
        }
    }

    fn write_text(&mut self, fileno: u16, bytes: &[u8]) -> Result<(), Fault> {
        let entry = self.files.entry(fileno)?;
        if !matches!(entry.mode, Some(OpenMode::Write) | Some(OpenMode::Append)) {
            return Err(Fault::NotOpenForWrite);
        }

        let stream = entry.stream.as_mut().ok_or(Fault::FileNotOpen)?;
        stream.write_all(bytes).map_err(|_| Fault::WriteFailed)
    }

    /// Advances a directory iterator and fills the Pascal search record:
    /// the name goes through the record's string variable, the attribute
    /// bits into the following word.
    fn dir_next(&mut self, word: u16, search_var: u16) -> Result<bool, Fault> {
        let entry = loop {
            let handle = match self.dirs.get(word) {
                Some(handle) => handle,
                None => return Ok(false),
            };
            match handle.iter.next() {
                None => return Ok(false),
                Some(Err(_)) => continue,
                Some(Ok(entry)) => break entry,
            }
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().map_err(|_| Fault::ReadFailed)?;

        let mut attrs = 0u16;
        if file_type.is_dir() {
            attrs |= ATTR_DIRECTORY;
        }
        if !file_type.is_dir() && !file_type.is_file() {
            attrs |= ATTR_SYSTEM;
        }
        if name.starts_with('.') {
            attrs |= ATTR_HIDDEN;
        }

        self.store_text(search_var + SEARCHREC_NAME_OFFSET, name.as_bytes())?;
        self.set_word(search_var + SEARCHREC_ATTR_OFFSET, attrs)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn machine() -> Executor {
        let mut vm = Executor::in_memory(vec![Opcode::END.opcode()], &[]).unwrap();
        vm.capture_output();
        vm
    }

    #[test]
    fn write_int_honors_field_width() {
        let mut vm = machine();

        vm.push(OUTPUT_FILE).unwrap();
        vm.push(42).unwrap();
        vm.push(5).unwrap();
        vm.sysio(SysIo::WriteInt as u16).unwrap();
        assert_eq!(vm.captured_output(), b"   42");
    }

    #[test]
    fn write_read_round_trips_integers() {
        for value in [i16::MIN, -1, 0, 1, 12345, i16::MAX] {
            let mut vm = machine();
            vm.set_input(format!("{value}\n").into_bytes());

            vm.push(INPUT_FILE).unwrap();
            vm.sysio(SysIo::ReadInt as u16).unwrap();
            assert_eq!(vm.pop().unwrap() as i16, value);
        }
    }

    #[test]
    fn read_int_skips_whitespace_and_lines() {
        let mut vm = machine();
        vm.set_input(b"   \n  7 8\n".to_vec());

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadInt as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 7);

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadInt as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 8);
    }

    #[test]
    fn eoln_follows_the_line_buffer() {
        let mut vm = machine();
        vm.set_input(b"ab\ncd\n".to_vec());

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadChar as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), b'a' as u16);

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::Eoln as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 0);

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadChar as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), b'b' as u16);

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::Eoln as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 1);
    }

    #[test]
    fn allocate_exhaustion_reports_too_many_files() {
        let mut vm = machine();

        for expected in 2..MAX_OPEN_FILES as u16 {
            vm.sysio(SysIo::Allocate as u16).unwrap();
            assert_eq!(vm.pop().unwrap(), expected);
        }

        let err = vm.sysio(SysIo::Allocate as u16).unwrap_err();
        assert!(matches!(err, RuntimeError::Recoverable(Fault::TooManyFiles)));
    }

    #[test]
    fn standard_files_cannot_be_freed() {
        let mut vm = machine();
        vm.push(OUTPUT_FILE).unwrap();
        let err = vm.sysio(SysIo::Free as u16).unwrap_err();
        assert!(matches!(err, RuntimeError::Recoverable(Fault::BadFile)));
    }

    #[test]
    fn writing_the_input_file_is_rejected() {
        let mut vm = machine();

        vm.push(INPUT_FILE).unwrap();
        vm.push(1).unwrap();
        vm.push(0).unwrap();
        let err = vm.sysio(SysIo::WriteInt as u16).unwrap_err();
        assert!(matches!(err, RuntimeError::Recoverable(Fault::NotOpenForWrite)));
    }

    #[test]
    fn eof_consults_the_scripted_input() {
        let mut vm = machine();
        vm.set_input(b"x\n".to_vec());

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::Eof as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 0);

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadChar as u16).unwrap();
        vm.pop().unwrap();

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::ReadLine as u16).unwrap();

        vm.push(INPUT_FILE).unwrap();
        vm.sysio(SysIo::Eof as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 1);
    }
}
