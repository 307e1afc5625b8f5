//! Set sub-operations.
//!
//! A set is a 64-element bitset carried as four 16-bit words, pushed low
//! word first. Elements are bit positions relative to the minimum value
//! of the set's base type; the code generator pushes that minimum on top
//! of the constructing or testing operands.

use super::Executor;
use crate::error::RuntimeError;

use pcode_asm::{Fault, SetOp};

impl Executor {
    pub(crate) fn set_op(&mut self, word: u16) -> Result<(), RuntimeError> {
        let op = SetOp::from_word(word).ok_or(Fault::BadSetOperation)?;

        match op {
            SetOp::Empty => self.push_set(0)?,

            SetOp::Singleton => {
                let min = self.pop()? as i16;
                let value = self.pop()? as i16;
                self.push_set(1u64 << set_bit(value, min)?)?;
            }

            SetOp::Subrange => {
                let min = self.pop()? as i16;
                let hi = self.pop()? as i16;
                let lo = self.pop()? as i16;

                if lo > hi {
                    self.push_set(0)?;
                } else {
                    let lo = set_bit(lo, min)?;
                    let hi = set_bit(hi, min)?;
                    let bits = (u64::MAX >> (63 - (hi - lo))) << lo;
                    self.push_set(bits)?;
                }
            }

            SetOp::Union => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push_set(a | b)?;
            }

            SetOp::Intersection => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push_set(a & b)?;
            }

            SetOp::Difference => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push_set(a & !b)?;
            }

            SetOp::SymmetricDiff => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push_set(a ^ b)?;
            }

            SetOp::Equality => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push((a == b) as u16)?;
            }

            SetOp::NonEquality => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push((a != b) as u16)?;
            }

            SetOp::Contains => {
                let b = self.pop_set()?;
                let a = self.pop_set()?;
                self.push((a & b == b) as u16)?;
            }

            SetOp::Member => {
                let min = self.pop()? as i16;
                let set = self.pop_set()?;
                let value = self.pop()? as i16;

                // Out-of-universe values are simply not members.
                let member = match value.checked_sub(min) {
                    Some(delta @ 0..=63) => set & 1u64 << delta != 0,
                    _ => false,
                };
                self.push(member as u16)?;
            }

            SetOp::Card => {
                let set = self.pop_set()?;
                self.push(set.count_ones() as u16)?;
            }
        }

        Ok(())
    }

    pub(crate) fn push_set(&mut self, set: u64) -> Result<(), Fault> {
        for i in 0..4 {
            self.push((set >> (16 * i)) as u16)?;
        }
        Ok(())
    }

    pub(crate) fn pop_set(&mut self) -> Result<u64, Fault> {
        let mut set = 0u64;
        for i in (0..4).rev() {
            set |= (self.pop()? as u64) << (16 * i);
        }
        Ok(set)
    }
}

/// Bit position of `value` in a set with minimum `min`.
fn set_bit(value: i16, min: i16) -> Result<u32, Fault> {
    match value.checked_sub(min) {
        Some(delta @ 0..=63) => Ok(delta as u32),
        _ => Err(Fault::SetElement),
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn machine() -> Executor {
        Executor::in_memory(vec![Opcode::END.opcode()], &[]).unwrap()
    }

    #[test]
    fn singleton_normalizes_against_the_minimum() {
        let mut vm = machine();
        vm.push(7).unwrap();
        vm.push(5).unwrap();
        vm.set_op(SetOp::Singleton as u16).unwrap();
        assert_eq!(vm.pop_set().unwrap(), 0b100);
    }

    #[test]
    fn subrange_covers_the_inclusive_range() {
        let mut vm = machine();
        vm.push(2).unwrap();
        vm.push(4).unwrap();
        vm.push(0).unwrap();
        vm.set_op(SetOp::Subrange as u16).unwrap();
        assert_eq!(vm.pop_set().unwrap(), 0b11100);
    }

    #[test]
    fn inverted_subrange_is_empty() {
        let mut vm = machine();
        vm.push(4).unwrap();
        vm.push(2).unwrap();
        vm.push(0).unwrap();
        vm.set_op(SetOp::Subrange as u16).unwrap();
        assert_eq!(vm.pop_set().unwrap(), 0);
    }

    #[test]
    fn out_of_universe_construction_faults() {
        let mut vm = machine();
        vm.push(100).unwrap();
        vm.push(0).unwrap();
        let err = vm.set_op(SetOp::Singleton as u16).unwrap_err();
        assert!(matches!(err, RuntimeError::Recoverable(Fault::SetElement)));
    }

    #[test]
    fn membership_in_the_empty_set_is_false() {
        let mut vm = machine();
        vm.push(3).unwrap();
        vm.set_op(SetOp::Empty as u16).unwrap();
        vm.push(0).unwrap();
        vm.set_op(SetOp::Member as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 0);
    }

    #[test]
    fn out_of_universe_membership_is_false() {
        let mut vm = machine();
        vm.push(200).unwrap();
        vm.push_set(u64::MAX).unwrap();
        vm.push(0).unwrap();
        vm.set_op(SetOp::Member as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 0);
    }

    #[test]
    fn algebra_over_words() {
        let mut vm = machine();

        vm.push_set(0b1100).unwrap();
        vm.push_set(0b1010).unwrap();
        vm.set_op(SetOp::Intersection as u16).unwrap();
        assert_eq!(vm.pop_set().unwrap(), 0b1000);

        vm.push_set(0b1100).unwrap();
        vm.push_set(0b1010).unwrap();
        vm.set_op(SetOp::SymmetricDiff as u16).unwrap();
        assert_eq!(vm.pop_set().unwrap(), 0b0110);

        vm.push_set(0b1111).unwrap();
        vm.push_set(0b0101).unwrap();
        vm.set_op(SetOp::Contains as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 1);
    }

    #[test]
    fn cardinality_counts_bits() {
        let mut vm = machine();
        vm.push_set(0b1011).unwrap();
        vm.set_op(SetOp::Card as u16).unwrap();
        assert_eq!(vm.pop().unwrap(), 3);
    }
}
