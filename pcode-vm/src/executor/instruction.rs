//! Fetch, decode, dispatch.

use super::Executor;
use crate::consts::*;
use crate::error::{ExecutorError, RuntimeError};
use crate::state::ExecuteState;

use pcode_asm::{DecodeError, Fault, Opcode};
use tracing::{debug, trace};

impl Executor {
    /// Runs the program to completion.
    ///
    /// Returns when the program executes `END`; any fault terminates the
    /// run with the faulting program counter attached.
    pub fn run(&mut self) -> Result<(), ExecutorError> {
        loop {
            let pc = self.regs.pc;

            match self.step() {
                Ok(state) if state.should_continue() => continue,
                Ok(_) => return Ok(()),
                Err(e) => {
                    debug!(pc, %e, "execution halted");
                    return Err(ExecutorError::from_runtime(e, pc));
                }
            }
        }
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> Result<ExecuteState, RuntimeError> {
        let pc = self.regs.pc as usize;
        if pc >= self.program.len() {
            return Err(Fault::PcOutOfRange.into());
        }

        let (op, len) = Opcode::decode(&self.program[pc..]).map_err(|e| match e {
            DecodeError::Illegal(_) => Fault::IllegalOpcode,
            DecodeError::Truncated => Fault::PcOutOfRange,
        })?;

        self.regs.pc = (pc + len) as u16;
        trace!(pc, ?op, "dispatch");

        self.instruction(op)
    }

    fn instruction(&mut self, op: Opcode) -> Result<ExecuteState, RuntimeError> {
        use Opcode::*;

        match op {
            NOP => (),

            ADD => self.binary(|a, b| Ok(a.wrapping_add(b)))?,
            SUB => self.binary(|a, b| Ok(a.wrapping_sub(b)))?,
            MUL => self.binary(|a, b| Ok(a.wrapping_mul(b)))?,
            DIV => self.binary(|a, b| signed_div(a, b, |x, y| x / y))?,
            MOD => self.binary(|a, b| signed_div(a, b, |x, y| x % y))?,
            UDIV => self.binary(|a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a / b),
            })?,
            UMOD => self.binary(|a, b| match b {
                0 => Err(Fault::DivideByZero),
                _ => Ok(a % b),
            })?,
            NEG => self.unary(|a| (a as i16).wrapping_neg() as u16)?,
            ABS => self.unary(|a| (a as i16).wrapping_abs() as u16)?,
            INC => self.unary(|a| a.wrapping_add(1))?,
            DEC => self.unary(|a| a.wrapping_sub(1))?,
            NOT => self.unary(|a| !a)?,
            OR => self.binary(|a, b| Ok(a | b))?,
            AND => self.binary(|a, b| Ok(a & b))?,
            XOR => self.binary(|a, b| Ok(a ^ b))?,
            SLL => self.binary(|a, b| Ok(if b < 16 { a << b } else { 0 }))?,
            SRL => self.binary(|a, b| Ok(if b < 16 { a >> b } else { 0 }))?,
            SRA => self.binary(|a, b| Ok(((a as i16) >> b.min(15)) as u16))?,

            DUP => {
                let a = self.tos(0)?;
                self.push(a)?;
            }
            XCHG => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(b)?;
                self.push(a)?;
            }

            EQU => self.binary(|a, b| Ok((a == b) as u16))?,
            NEQ => self.binary(|a, b| Ok((a != b) as u16))?,
            LT => self.binary(|a, b| Ok(((a as i16) < b as i16) as u16))?,
            GT => self.binary(|a, b| Ok((a as i16 > b as i16) as u16))?,
            LTE => self.binary(|a, b| Ok((a as i16 <= b as i16) as u16))?,
            GTE => self.binary(|a, b| Ok((a as i16 >= b as i16) as u16))?,
            ULT => self.binary(|a, b| Ok((a < b) as u16))?,
            UGT => self.binary(|a, b| Ok((a > b) as u16))?,
            ULTE => self.binary(|a, b| Ok((a <= b) as u16))?,
            UGTE => self.binary(|a, b| Ok((a >= b) as u16))?,

            LDI => {
                let addr = self.pop()?;
                let v = self.word_at(addr)?;
                self.push(v)?;
            }
            LDIB => {
                let addr = self.pop()?;
                let v = self.byte_at(addr)?;
                self.push(v as u16)?;
            }
            LDIM => {
                let addr = self.pop()?;
                self.load_multi(addr)?;
            }
            STI => {
                let v = self.pop()?;
                let addr = self.pop()?;
                self.set_word(addr, v)?;
            }
            STIB => {
                let v = self.pop()?;
                let addr = self.pop()?;
                self.set_byte(addr, v as u8)?;
            }
            STIM => {
                self.store_multi_indirect()?;
            }

            RET => self.do_return()?,
            END => return Ok(ExecuteState::Stopped),

            PUSH(imm) => self.push(imm)?,
            INDS(imm) => {
                let sp = (self.regs.sp as i32 + imm as i16 as i32) as u16;
                if sp < self.regs.spb || sp > self.regs.hpb {
                    return Err(Fault::StackOverflow.into());
                }
                self.regs.sp = sp;
            }
            LAC(imm) => {
                let addr = self.regs.rop.checked_add(imm).ok_or(Fault::BadAddress)?;
                self.push(addr)?;
            }
            SDC(imm) => self.regs.dc = imm,
            JMP(imm) => self.regs.pc = imm,
            JEQUZ(imm) => {
                if self.pop()? == 0 {
                    self.regs.pc = imm;
                }
            }
            JNEQZ(imm) => {
                if self.pop()? != 0 {
                    self.regs.pc = imm;
                }
            }
            SLSP(imm) => self.regs.lsp = imm as u8,
            LINE(_) | INCLUDE(_) => (),

            FLOAT(imm) => self.float_op(imm)?,
            SETOP(imm) => self.set_op(imm)?,
            SYSIO(imm) => self.sysio(imm)?,
            LIB(imm) => self.lib_call(imm)?,

            LDS(level, off) => {
                let addr = self.stack_address(level, off)?;
                let v = self.word_at(addr)?;
                self.push(v)?;
            }
            LDSB(level, off) => {
                let addr = self.stack_address(level, off)?;
                let v = self.byte_at(addr)?;
                self.push(v as u16)?;
            }
            LDSM(level, off) => {
                let addr = self.stack_address(level, off)?;
                self.load_multi(addr)?;
            }
            STS(level, off) => {
                let v = self.pop()?;
                let addr = self.stack_address(level, off)?;
                self.set_word(addr, v)?;
            }
            STSB(level, off) => {
                let v = self.pop()?;
                let addr = self.stack_address(level, off)?;
                self.set_byte(addr, v as u8)?;
            }
            STSM(level, off) => {
                let addr = self.stack_address(level, off)?;
                self.store_multi(addr)?;
            }
            LDSX(level, off) => {
                let addr = self.indexed_address(level, off)?;
                let v = self.word_at(addr)?;
                self.push(v)?;
            }
            LDSXB(level, off) => {
                let addr = self.indexed_address(level, off)?;
                let v = self.byte_at(addr)?;
                self.push(v as u16)?;
            }
            LDSXM(level, off) => {
                let addr = self.indexed_address(level, off)?;
                self.load_multi(addr)?;
            }
            STSX(level, off) => {
                let v = self.pop()?;
                let addr = self.indexed_address(level, off)?;
                self.set_word(addr, v)?;
            }
            STSXB(level, off) => {
                let v = self.pop()?;
                let addr = self.indexed_address(level, off)?;
                self.set_byte(addr, v as u8)?;
            }
            STSXM(level, off) => {
                // The index is beneath the data words.
                let count = self.regs.dc;
                let index = self.tos(count)?;
                let base = self.stack_address(level, off)?;
                let addr = base.checked_add(index).ok_or(Fault::BadAddress)?;
                self.store_multi(addr)?;
                let dropped = self.pop()?;
                debug_assert_eq!(dropped, index);
            }
            LAS(level, off) => {
                let addr = self.stack_address(level, off)?;
                self.push(addr)?;
            }
            LASX(level, off) => {
                let addr = self.indexed_address(level, off)?;
                self.push(addr)?;
            }
            PCAL(level, target) => self.call(level, target)?,
        }

        Ok(ExecuteState::Proceed)
    }

    fn unary(&mut self, f: impl FnOnce(u16) -> u16) -> Result<(), Fault> {
        let a = self.pop()?;
        self.push(f(a))
    }

    fn binary(&mut self, f: impl FnOnce(u16, u16) -> Result<u16, Fault>) -> Result<(), Fault> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b)?)
    }

    /// Pops the byte index for an indexed stack reference.
    fn indexed_address(&mut self, level: u8, offset: u16) -> Result<u16, Fault> {
        let index = self.pop()?;
        let base = self.stack_address(level, offset)?;
        base.checked_add(index).ok_or(Fault::BadAddress)
    }

    /// Pushes `dc` words starting at `addr`.
    fn load_multi(&mut self, addr: u16) -> Result<(), Fault> {
        for i in 0..self.regs.dc {
            let at = addr.checked_add(2 * i).ok_or(Fault::BadAddress)?;
            let v = self.word_at(at)?;
            self.push(v)?;
        }
        Ok(())
    }

    /// Pops `dc` words into memory at `addr`; the top of the stack is the
    /// last word of the block.
    fn store_multi(&mut self, addr: u16) -> Result<(), Fault> {
        for i in (0..self.regs.dc).rev() {
            let v = self.pop()?;
            let at = addr.checked_add(2 * i).ok_or(Fault::BadAddress)?;
            self.set_word(at, v)?;
        }
        Ok(())
    }

    /// `STIM`: the destination address is beneath the data words.
    fn store_multi_indirect(&mut self) -> Result<(), Fault> {
        let count = self.regs.dc;
        let addr = self.tos(count)?;
        self.store_multi(addr)?;
        let dropped = self.pop()?;
        debug_assert_eq!(dropped, addr);
        Ok(())
    }

    /// `PCAL`: pushes the frame header, enters the callee's static level.
    fn call(&mut self, level: u8, target: u16) -> Result<(), Fault> {
        let link = match level {
            0 => self.regs.spb,
            _ => self.frame_base(level - 1)?,
        };

        self.push(link)?;
        self.push(self.regs.fp)?;
        self.push(self.regs.lsp as u16)?;
        self.push(self.regs.pc)?;

        self.regs.fp = self.regs.sp;
        self.regs.lsp = level;
        self.regs.pc = target;
        Ok(())
    }

    /// `RET`: unwinds the frame header pushed by [`Self::call`].
    fn do_return(&mut self) -> Result<(), Fault> {
        let fp = self.regs.fp;
        if fp < self.regs.spb + FRAME_BYTES {
            return Err(Fault::StackUnderflow);
        }

        self.regs.pc = self.word_at(fp - FRAME_RETURN)?;
        self.regs.lsp = self.word_at(fp - FRAME_LEVEL)? as u8;
        self.regs.fp = self.word_at(fp - FRAME_DYNAMIC_LINK)?;
        self.regs.sp = fp - FRAME_BYTES;
        Ok(())
    }
}

fn signed_div(a: u16, b: u16, f: impl FnOnce(i16, i16) -> i16) -> Result<u16, Fault> {
    let (a, b) = (a as i16, b as i16);

    if b == 0 {
        return Err(Fault::DivideByZero);
    }
    if a == i16::MIN && b == -1 {
        return Err(Fault::IntegerOverflow);
    }
    Ok(f(a, b) as u16)
}
