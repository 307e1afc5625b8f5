//! Floating-point sub-operations.
//!
//! Reals are IEEE-754 doubles carried as four 16-bit words. The `ARG1`
//! and `ARG2` bits of the sub-operation word convert the corresponding
//! operand from a single integer word before the operation runs; the
//! code generator sets them to lift a mixed integer/real expression.

use super::Executor;
use crate::error::RuntimeError;

use pcode_asm::{Fault, FloatOp};

impl Executor {
    pub(crate) fn float_op(&mut self, word: u16) -> Result<(), RuntimeError> {
        let (op, arg1, arg2) = FloatOp::unpack(word).ok_or(Fault::BadFloatOperation)?;

        match op {
            FloatOp::Float => {
                let v = self.pop()? as i16;
                self.push_real(v as f64)?;
            }

            FloatOp::Round => {
                let v = self.pop_real()?.round();
                self.push(real_to_int(v)?)?;
            }

            FloatOp::Trunc => {
                let v = self.pop_real()?.trunc();
                self.push(real_to_int(v)?)?;
            }

            FloatOp::Neg => {
                let v = self.pop_operand(arg1)?;
                self.push_real(-v)?;
            }

            FloatOp::Abs => {
                let v = self.pop_operand(arg1)?;
                self.push_real(v.abs())?;
            }

            FloatOp::Add | FloatOp::Sub | FloatOp::Mul | FloatOp::Div | FloatOp::Mod => {
                let b = self.pop_operand(arg2)?;
                let a = self.pop_operand(arg1)?;

                let v = match op {
                    FloatOp::Add => a + b,
                    FloatOp::Sub => a - b,
                    FloatOp::Mul => a * b,
                    FloatOp::Div if b == 0.0 => return Err(Fault::DivideByZero.into()),
                    FloatOp::Div => a / b,
                    FloatOp::Mod if b == 0.0 => return Err(Fault::DivideByZero.into()),
                    _ => a % b,
                };
                self.push_real(v)?;
            }

            FloatOp::Equ | FloatOp::Neq | FloatOp::Lt | FloatOp::Gt | FloatOp::Lte | FloatOp::Gte => {
                let b = self.pop_operand(arg2)?;
                let a = self.pop_operand(arg1)?;

                let v = match op {
                    FloatOp::Equ => a == b,
                    FloatOp::Neq => a != b,
                    FloatOp::Lt => a < b,
                    FloatOp::Gt => a > b,
                    FloatOp::Lte => a <= b,
                    _ => a >= b,
                };
                self.push(v as u16)?;
            }
        }

        Ok(())
    }

    /// Pops a real, or a single integer word when the conversion flag is
    /// set for this operand position.
    fn pop_operand(&mut self, convert: bool) -> Result<f64, Fault> {
        if convert {
            Ok(self.pop()? as i16 as f64)
        } else {
            self.pop_real()
        }
    }
}

fn real_to_int(v: f64) -> Result<u16, Fault> {
    if v < i16::MIN as f64 || v > i16::MAX as f64 {
        return Err(Fault::ValueRange);
    }
    Ok(v as i16 as u16)
}
