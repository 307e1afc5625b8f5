//! Runtime string library.
//!
//! A string variable is three words in memory: current size, buffer
//! address, capacity. The capacity word's high bit marks a heap-backed
//! buffer. String values travel on the operand stack in the same
//! three-word shape; read-only literals travel as `(size, address)`.
//! Temporaries are carved from the string stack and fall back to the
//! heap when that region is exhausted.

use super::Executor;
use crate::consts::*;
use crate::error::RuntimeError;

use pcode_asm::{Fault, LibCall};

/// A string value popped from or pushed to the operand stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StrValue {
    pub size: u16,
    pub addr: u16,
    pub alloc: u16,
}

impl StrValue {
    pub(crate) const fn capacity(&self) -> u16 {
        self.alloc & !HEAP_STRING
    }
}

impl Executor {
    pub(crate) fn lib_call(&mut self, word: u16) -> Result<(), RuntimeError> {
        let call = LibCall::from_word(word).ok_or(Fault::BadLibraryCall)?;

        match call {
            LibCall::StrInit => {
                let var = self.pop()?;
                let (buf, alloc) = self.str_stack_alloc(STRING_DEFAULT_ALLOC)?;
                self.set_string_header(var, StrValue { size: 0, addr: buf, alloc })?;
            }

            LibCall::StrCpy => {
                let var = self.pop()?;
                let src = self.pop_string()?;
                self.store_string(var, src)?;
            }

            LibCall::StrDup => {
                let src = self.pop_string()?;
                let dup = self.temp_string(src.addr, src.size)?;
                self.push_string(dup)?;
            }

            LibCall::StrCat => {
                let src = self.pop_string()?;
                let dest = self.pop_string()?;

                if dest.size + src.size > dest.capacity() {
                    return Err(Fault::StringStackOverflow.into());
                }
                self.copy_bytes(src.addr, dest.addr + dest.size, src.size)?;
                self.push_string(StrValue { size: dest.size + src.size, ..dest })?;
            }

            LibCall::StrCatChar => {
                let ch = self.pop()?;
                let dest = self.pop_string()?;

                if dest.size + 1 > dest.capacity() {
                    return Err(Fault::StringStackOverflow.into());
                }
                self.set_byte(dest.addr + dest.size, ch as u8)?;
                self.push_string(StrValue { size: dest.size + 1, ..dest })?;
            }

            LibCall::StrCmp => {
                let s2 = self.pop_string()?;
                let s1 = self.pop_string()?;
                let ordering = self.compare_strings(s1, s2)?;
                self.push(ordering as u16)?;
            }

            LibCall::SubStr => {
                let len = self.pop()?;
                let pos = self.pop()?.max(1);
                let src = self.pop_string()?;

                let start = pos - 1;
                let count = if start >= src.size { 0 } else { len.min(src.size - start) };
                let sub = self.temp_string(src.addr + start, count)?;
                self.push_string(sub)?;
            }

            LibCall::FindStr => {
                let pos = self.pop()?.max(1);
                let hay = self.pop_string()?;
                let needle = self.pop_string()?;
                let found = self.find_substring(hay, needle, pos)?;
                self.push(found)?;
            }

            LibCall::InsertStr => {
                let pos = self.pop()?;
                let var = self.pop()?;
                let src = self.pop_string()?;
                self.insert_string(var, src, pos)?;
            }

            LibCall::DeleteStr => {
                let len = self.pop()?;
                let pos = self.pop()?;
                let var = self.pop()?;
                self.delete_string(var, pos, len)?;
            }

            LibCall::FillChr => {
                let ch = self.pop()?;
                let count = self.pop()?;
                let var = self.pop()?;

                let header = self.string_header(var)?;
                let bound = count.min(header.capacity());
                for addr in header.addr + header.size..header.addr + bound {
                    self.set_byte(addr, ch as u8)?;
                }
                if bound > header.size {
                    self.set_word(var + STRING_SIZE_OFFSET, bound)?;
                }
            }

            LibCall::CharAt => {
                let index = self.pop()?;
                let s = self.pop_string()?;

                let ch = if index >= 1 && index <= s.size {
                    self.byte_at(s.addr + index - 1)? as u16
                } else {
                    0
                };
                self.push(ch)?;
            }

            LibCall::IntStr => {
                let var = self.pop()?;
                let width = self.pop()?;
                let value = self.pop()? as i16;
                let text = format_int(value as i64, width);
                self.store_text(var, text.as_bytes())?;
            }

            LibCall::UIntStr => {
                let var = self.pop()?;
                let width = self.pop()?;
                let value = self.pop()?;
                let text = format_int(value as i64, width);
                self.store_text(var, text.as_bytes())?;
            }

            LibCall::LongStr => {
                let var = self.pop()?;
                let width = self.pop()?;
                let value = self.pop_u32()? as i32;
                let text = format_int(value as i64, width);
                self.store_text(var, text.as_bytes())?;
            }

            LibCall::RealStr => {
                let var = self.pop()?;
                let precision = self.pop()?;
                let width = self.pop()?;
                let value = self.pop_real()?;
                let text = format_real(value, width, precision);
                self.store_text(var, text.as_bytes())?;
            }

            LibCall::StrVal => {
                let err_var = self.pop()?;
                let value_var = self.pop()?;
                let s = self.pop_string()?;
                self.string_value(s, value_var, err_var)?;
            }

            LibCall::BStr2Str => {
                let size = self.pop()?;
                let addr = self.pop()?;
                let clipped = size.min(STRING_DEFAULT_ALLOC);
                let tmp = self.temp_string(addr, clipped)?;
                self.push_string(tmp)?;
            }

            LibCall::Str2BStr => {
                let size = self.pop()?;
                let addr = self.pop()?;
                let s = self.pop_string()?;

                // The copy is clipped to the array as well, not only the
                // computed length.
                let count = s.size.min(size);
                self.copy_bytes(s.addr, addr, count)?;
                for pad in addr + count..addr + size {
                    self.set_byte(pad, b' ')?;
                }
            }

            LibCall::CStr2Str => {
                let addr = self.pop()?;
                let size = self.pop()?;
                let clipped = size.min(STRING_DEFAULT_ALLOC);
                let tmp = self.temp_string(addr, clipped)?;
                self.push_string(tmp)?;
            }

            LibCall::Char2Str => {
                let ch = self.pop()?;
                let (buf, alloc) = self.str_stack_alloc(STRING_DEFAULT_ALLOC)?;
                self.set_byte(buf, ch as u8)?;
                self.push_string(StrValue { size: 1, addr: buf, alloc })?;
            }

            LibCall::New => {
                let size = self.pop()?;
                let addr = self.heap_alloc(size)?;
                if addr == 0 {
                    return Err(Fault::OutOfMemory.into());
                }
                self.push(addr)?;
            }

            LibCall::Dispose => {
                let addr = self.pop()?;
                self.heap_free(addr)?;
            }
        }

        Ok(())
    }

    /* stack shapes */

    pub(crate) fn pop_string(&mut self) -> Result<StrValue, Fault> {
        let alloc = self.pop()?;
        let addr = self.pop()?;
        let size = self.pop()?;
        Ok(StrValue { size, addr, alloc })
    }

    pub(crate) fn push_string(&mut self, s: StrValue) -> Result<(), Fault> {
        self.push(s.size)?;
        self.push(s.addr)?;
        self.push(s.alloc)
    }

    /* headers in memory */

    pub(crate) fn string_header(&self, var: u16) -> Result<StrValue, Fault> {
        Ok(StrValue {
            size: self.word_at(var + STRING_SIZE_OFFSET)?,
            addr: self.word_at(var + STRING_DATA_OFFSET)?,
            alloc: self.word_at(var + STRING_ALLOC_OFFSET)?,
        })
    }

    pub(crate) fn set_string_header(&mut self, var: u16, s: StrValue) -> Result<(), Fault> {
        self.set_word(var + STRING_SIZE_OFFSET, s.size)?;
        self.set_word(var + STRING_DATA_OFFSET, s.addr)?;
        self.set_word(var + STRING_ALLOC_OFFSET, s.alloc)
    }

    /// Copies a string value into a string variable, clipping to the
    /// destination capacity. A copy onto the same buffer is a no-op.
    pub(crate) fn store_string(&mut self, var: u16, src: StrValue) -> Result<(), Fault> {
        let dest = self.string_header(var)?;
        if dest.addr == src.addr {
            return Ok(());
        }

        let count = src.size.min(dest.capacity());
        self.copy_bytes(src.addr, dest.addr, count)?;
        self.set_word(var + STRING_SIZE_OFFSET, count)
    }

    /// Writes host-produced text into a string variable, clipped.
    pub(crate) fn store_text(&mut self, var: u16, text: &[u8]) -> Result<(), Fault> {
        let dest = self.string_header(var)?;
        let count = (text.len() as u16).min(dest.capacity());

        for (i, b) in text.iter().take(count as usize).enumerate() {
            self.set_byte(dest.addr + i as u16, *b)?;
        }
        self.set_word(var + STRING_SIZE_OFFSET, count)
    }

    /* temporaries */

    /// Carves a buffer from the string stack, falling back to the heap.
    pub(crate) fn str_stack_alloc(&mut self, size: u16) -> Result<(u16, u16), Fault> {
        let aligned = size + (size & 1);

        if self.regs.csp + aligned <= self.regs.rop {
            let addr = self.regs.csp;
            self.regs.csp += aligned;
            Ok((addr, size))
        } else {
            self.heap_alloc_string(size).map_err(|_| Fault::StringStackOverflow)
        }
    }

    /// Copies `size` bytes at `addr` into a fresh temporary string.
    pub(crate) fn temp_string(&mut self, addr: u16, size: u16) -> Result<StrValue, Fault> {
        let (buf, alloc) = self.str_stack_alloc(STRING_DEFAULT_ALLOC)?;
        let count = size.min(STRING_DEFAULT_ALLOC);

        self.copy_bytes(addr, buf, count)?;
        Ok(StrValue { size: count, addr: buf, alloc })
    }

    /* comparisons and searches */

    /// `strcmp` with a length-aware tie-break: a strict prefix is less
    /// than the longer string.
    pub(crate) fn compare_strings(&self, s1: StrValue, s2: StrValue) -> Result<i16, Fault> {
        let a = self.bytes_at(s1.addr, s1.size)?;
        let b = self.bytes_at(s2.addr, s2.size)?;

        let common = a.len().min(b.len());
        for i in 0..common {
            if a[i] != b[i] {
                return Ok(if a[i] < b[i] { -1 } else { 1 });
            }
        }
        Ok(match a.len().cmp(&b.len()) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        })
    }

    fn find_substring(&self, hay: StrValue, needle: StrValue, pos: u16) -> Result<u16, Fault> {
        if pos > hay.size && needle.size > 0 {
            return Ok(0);
        }
        if needle.size == 0 {
            return Ok(pos.min(hay.size + 1));
        }

        let hay_bytes = self.bytes_at(hay.addr, hay.size)?;
        let needle_bytes = self.bytes_at(needle.addr, needle.size)?;

        let start = (pos - 1) as usize;
        let found = hay_bytes[start..]
            .windows(needle_bytes.len())
            .position(|w| w == needle_bytes);

        Ok(found.map(|i| (start + i + 1) as u16).unwrap_or(0))
    }

    /* editing */

    /// Shifts the tail right within capacity, then writes the source into
    /// the gap.
    fn insert_string(&mut self, var: u16, src: StrValue, pos: u16) -> Result<(), Fault> {
        let dest = self.string_header(var)?;
        let cap = dest.capacity();
        let at = pos.clamp(1, dest.size + 1) - 1;

        let insert_n = src.size.min(cap - at.min(cap));
        if insert_n == 0 {
            return Ok(());
        }

        let tail_dst = at + insert_n;
        let tail_n = (dest.size - at).min(cap.saturating_sub(tail_dst));
        if tail_n > 0 {
            self.copy_bytes(dest.addr + at, dest.addr + tail_dst, tail_n)?;
        }
        self.copy_bytes(src.addr, dest.addr + at, insert_n)?;

        let size = (dest.size + insert_n).min(cap);
        self.set_word(var + STRING_SIZE_OFFSET, size)
    }

    /// Shifts the tail left over the removed range.
    fn delete_string(&mut self, var: u16, pos: u16, len: u16) -> Result<(), Fault> {
        let dest = self.string_header(var)?;
        if pos < 1 || pos > dest.size || len == 0 {
            return Ok(());
        }

        let at = pos - 1;
        let count = len.min(dest.size - at);
        let tail = dest.size - at - count;

        if tail > 0 {
            self.copy_bytes(dest.addr + at + count, dest.addr + at, tail)?;
        }
        self.set_word(var + STRING_SIZE_OFFSET, dest.size - count)
    }

    /* numeric conversions */

    /// Pascal `Val`: parses a signed integer, reporting the 1-based index
    /// of the first offending character through `err_var`. The value
    /// variable is untouched on failure.
    fn string_value(&mut self, s: StrValue, value_var: u16, err_var: u16) -> Result<(), Fault> {
        let bytes = self.bytes_at(s.addr, s.size)?.to_vec();

        let mut index = 0usize;
        while index < bytes.len() && bytes[index] == b' ' {
            index += 1;
        }

        let negative = match bytes.get(index) {
            Some(b'-') => {
                index += 1;
                true
            }
            Some(b'+') => {
                index += 1;
                false
            }
            _ => false,
        };

        let digits_start = index;
        let mut value: i32 = 0;
        while let Some(d) = bytes.get(index).filter(|b| b.is_ascii_digit()) {
            value = value * 10 + (d - b'0') as i32;
            if value > i16::MAX as i32 + 1 {
                self.set_word(err_var, index as u16 + 1)?;
                return Ok(());
            }
            index += 1;
        }

        let signed = if negative { -value } else { value };
        let bad = index < bytes.len() || index == digits_start;
        if bad || signed < i16::MIN as i32 || signed > i16::MAX as i32 {
            self.set_word(err_var, index as u16 + 1)?;
            return Ok(());
        }

        self.set_word(value_var, signed as i16 as u16)?;
        self.set_word(err_var, 0)
    }
}

/// Right-justifies a decimal in a field; a zero width prints bare.
pub(crate) fn format_int(value: i64, width: u16) -> String {
    if width == 0 {
        format!("{value}")
    } else {
        format!("{value:>width$}", width = width as usize)
    }
}

/// Fixed-point when a precision is given, scientific otherwise.
pub(crate) fn format_real(value: f64, width: u16, precision: u16) -> String {
    let text = if precision > 0 {
        format!("{value:.precision$}", precision = precision as usize)
    } else {
        format!("{value:E}")
    };

    if width as usize > text.len() {
        format!("{text:>width$}", width = width as usize)
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MemoryLayout;
    use crate::prelude::*;

    fn machine() -> Executor {
        Executor::new(vec![Opcode::END.opcode()], &[], MemoryLayout::default()).unwrap()
    }

    /// Builds a string variable `offset` bytes above the stack base and
    /// returns its address.
    fn string_var(vm: &mut Executor, offset: u16, text: &[u8]) -> u16 {
        let var = vm.registers().spb + offset;
        vm.regs.sp = var + 6;

        vm.push(var).unwrap();
        vm.lib_call(LibCall::StrInit as u16).unwrap();

        let header = vm.string_header(var).unwrap();
        for (i, b) in text.iter().enumerate() {
            vm.set_byte(header.addr + i as u16, *b).unwrap();
        }
        vm.set_word(var, text.len() as u16).unwrap();
        var
    }

    fn read_string(vm: &Executor, var: u16) -> Vec<u8> {
        let h = vm.string_header(var).unwrap();
        vm.bytes_at(h.addr, h.size).unwrap().to_vec()
    }

    #[test]
    fn init_attaches_a_string_stack_buffer() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"");
        let h = vm.string_header(var).unwrap();

        assert_eq!(h.size, 0);
        assert_eq!(h.alloc, STRING_DEFAULT_ALLOC);
        assert!(h.addr < vm.registers().rop);
    }

    #[test]
    fn dup_is_equal_but_independent() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"hello");
        let original = vm.string_header(var).unwrap();

        vm.push_string(original).unwrap();
        vm.lib_call(LibCall::StrDup as u16).unwrap();
        let dup = vm.pop_string().unwrap();

        assert_ne!(dup.addr, original.addr);
        assert_eq!(vm.compare_strings(original, dup).unwrap(), 0);
    }

    #[test]
    fn concat_appends_within_capacity() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"abc");
        let s = vm.string_header(var).unwrap();

        vm.push_string(s).unwrap();
        vm.push_string(s).unwrap();
        vm.lib_call(LibCall::StrCat as u16).unwrap();

        let out = vm.pop_string().unwrap();
        assert_eq!(out.size, 6);
        assert_eq!(vm.bytes_at(out.addr, 6).unwrap(), b"abcabc");
    }

    #[test]
    fn concat_overflow_faults_and_leaves_operands() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, &[b'x'; 60]);
        let s = vm.string_header(var).unwrap();

        vm.push_string(s).unwrap();
        vm.push_string(s).unwrap();
        let err = vm.lib_call(LibCall::StrCat as u16).unwrap_err();

        assert!(matches!(err, RuntimeError::Recoverable(Fault::StringStackOverflow)));
        assert_eq!(read_string(&vm, var), vec![b'x'; 60]);
    }

    #[test]
    fn compare_breaks_ties_by_length() {
        let mut vm = machine();
        let a_var = string_var(&mut vm, 0, b"abc");
        let a = vm.string_header(a_var).unwrap();
        let b = vm.temp_string(a.addr, 2).unwrap();

        assert_eq!(vm.compare_strings(a, a).unwrap(), 0);
        assert_eq!(vm.compare_strings(b, a).unwrap(), -1);
        assert_eq!(vm.compare_strings(a, b).unwrap(), 1);
    }

    #[test]
    fn char_at_is_one_based_and_zero_out_of_range() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"abc");
        let s = vm.string_header(var).unwrap();

        for (index, expected) in [(0u16, 0u16), (1, b'a' as u16), (3, b'c' as u16), (4, 0)] {
            vm.push_string(s).unwrap();
            vm.push(index).unwrap();
            vm.lib_call(LibCall::CharAt as u16).unwrap();
            assert_eq!(vm.pop().unwrap(), expected);
        }
    }

    #[test]
    fn find_empty_needle_matches_at_start() {
        let mut vm = machine();
        let hay_var = string_var(&mut vm, 0, b"abcabc");
        let hay = vm.string_header(hay_var).unwrap();
        let empty = vm.temp_string(hay.addr, 0).unwrap();

        vm.push_string(empty).unwrap();
        vm.push_string(hay).unwrap();
        vm.push(3).unwrap();
        vm.lib_call(LibCall::FindStr as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 3);
    }

    #[test]
    fn find_locates_later_matches() {
        let mut vm = machine();
        let hay_var = string_var(&mut vm, 0, b"abcabc");
        let hay = vm.string_header(hay_var).unwrap();
        let needle = vm.temp_string(hay.addr, 2).unwrap();

        vm.push_string(needle).unwrap();
        vm.push_string(hay).unwrap();
        vm.push(2).unwrap();
        vm.lib_call(LibCall::FindStr as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 4);
    }

    #[test]
    fn delete_undoes_insert() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"hello world");
        let ins_var = string_var(&mut vm, 8, b"XY");
        let ins = vm.string_header(ins_var).unwrap();

        vm.push_string(ins).unwrap();
        vm.push(var).unwrap();
        vm.push(4).unwrap();
        vm.lib_call(LibCall::InsertStr as u16).unwrap();
        assert_eq!(read_string(&vm, var), b"helXYlo world");

        vm.push(var).unwrap();
        vm.push(4).unwrap();
        vm.push(2).unwrap();
        vm.lib_call(LibCall::DeleteStr as u16).unwrap();
        assert_eq!(read_string(&vm, var), b"hello world");
    }

    #[test]
    fn val_round_trips_and_reports_bad_input() {
        let mut vm = machine();
        let s_var = string_var(&mut vm, 0, b"  -123");
        let s = vm.string_header(s_var).unwrap();
        let value_var = vm.registers().spb + 40;
        let err_var = value_var + 2;
        vm.regs.sp = err_var + 2;

        vm.push_string(s).unwrap();
        vm.push(value_var).unwrap();
        vm.push(err_var).unwrap();
        vm.lib_call(LibCall::StrVal as u16).unwrap();
        assert_eq!(vm.word_at(value_var).unwrap() as i16, -123);
        assert_eq!(vm.word_at(err_var).unwrap(), 0);

        let bad_var = string_var(&mut vm, 8, b"12x4");
        let bad = vm.string_header(bad_var).unwrap();
        vm.set_word(value_var, 7).unwrap();

        vm.push_string(bad).unwrap();
        vm.push(value_var).unwrap();
        vm.push(err_var).unwrap();
        vm.lib_call(LibCall::StrVal as u16).unwrap();
        assert_eq!(vm.word_at(err_var).unwrap(), 3);
        assert_eq!(vm.word_at(value_var).unwrap(), 7, "value untouched on failure");
    }

    #[test]
    fn int_str_honors_field_width() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"");

        vm.push(42).unwrap();
        vm.push(5).unwrap();
        vm.push(var).unwrap();
        vm.lib_call(LibCall::IntStr as u16).unwrap();
        assert_eq!(read_string(&vm, var), b"   42");
    }

    #[test]
    fn str2bstr_clips_and_pads() {
        let mut vm = machine();
        let var = string_var(&mut vm, 0, b"hello");
        let s = vm.string_header(var).unwrap();
        let arr = vm.registers().spb + 100;
        vm.regs.sp = arr + 8;

        vm.push_string(s).unwrap();
        vm.push(arr).unwrap();
        vm.push(8).unwrap();
        vm.lib_call(LibCall::Str2BStr as u16).unwrap();
        assert_eq!(vm.bytes_at(arr, 8).unwrap(), b"hello   ");

        vm.push_string(s).unwrap();
        vm.push(arr).unwrap();
        vm.push(3).unwrap();
        vm.lib_call(LibCall::Str2BStr as u16).unwrap();
        assert_eq!(vm.bytes_at(arr, 3).unwrap(), b"hel");
    }
}
