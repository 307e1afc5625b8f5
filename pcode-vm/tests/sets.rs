//! Set semantics driven through the bytecode interface.

use pcode_vm::prelude::*;

mod common;
use common::{assert_machine_invariants, byte_offsets, run_with_rodata};

/// Enumeration membership, end to end:
///
/// ```pascal
/// TYPE Day = (Mon, Tue, Wed, Thu, Fri, Sat, Sun);
/// VAR weekend: SET OF Day; d: Day;
/// BEGIN
///   weekend := [Sat, Sun]; d := Sun; WRITELN(d IN weekend)
/// END
/// ```
#[test]
fn weekend_membership_prints_true() {
    let rodata = b"TRUE\0\0FALSE\0";

    let build = |false_at: u16, end_at: u16| {
        vec![
            // weekend at (0, 0), d at (0, 8)
            Opcode::INDS(10),
            // weekend := [Sat, Sun]
            Opcode::PUSH(5),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Singleton as u16),
            Opcode::PUSH(6),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Singleton as u16),
            Opcode::SETOP(SetOp::Union as u16),
            Opcode::SDC(4),
            Opcode::STSM(0, 0),
            // d := Sun
            Opcode::PUSH(6),
            Opcode::STS(0, 8),
            // d IN weekend
            Opcode::LDS(0, 8),
            Opcode::SDC(4),
            Opcode::LDSM(0, 0),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Member as u16),
            Opcode::JEQUZ(false_at),
            Opcode::PUSH(1),
            Opcode::PUSH(4),
            Opcode::LAC(0),
            Opcode::LIB(LibCall::CStr2Str as u16),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteString as u16),
            Opcode::JMP(end_at),
            Opcode::PUSH(1), // index 25: FALSE branch
            Opcode::PUSH(5),
            Opcode::LAC(6),
            Opcode::LIB(LibCall::CStr2Str as u16),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteString as u16),
            Opcode::PUSH(1), // index 31: end
            Opcode::SYSIO(SysIo::WriteLine as u16),
            Opcode::END,
        ]
    };

    let offsets = byte_offsets(&build(0, 0));
    let vm = run_with_rodata(&build(offsets[25], offsets[31]), rodata);

    assert_eq!(vm.captured_output(), b"TRUE\n");
    assert_machine_invariants(&vm);
}

/// A subrange constructor covers its whole range, and difference removes
/// it again.
#[test]
fn subrange_and_difference() {
    let vm = run_with_rodata(
        &[
            // [Tue..Fri] as bits, minus [Wed]
            Opcode::PUSH(1),
            Opcode::PUSH(4),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Subrange as u16),
            Opcode::PUSH(2),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Singleton as u16),
            Opcode::SETOP(SetOp::Difference as u16),
            Opcode::SETOP(SetOp::Card as u16),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteInt as u16),
            Opcode::END,
        ],
        &[],
    );

    assert_eq!(vm.captured_output(), b"3");
}

/// Membership against an out-of-universe ordinal is false, not a fault.
#[test]
fn out_of_universe_membership_is_false() {
    let vm = run_with_rodata(
        &[
            Opcode::PUSH(1),
            Opcode::PUSH(100),
            Opcode::PUSH(0xffff),
            Opcode::PUSH(0xffff),
            Opcode::PUSH(0xffff),
            Opcode::PUSH(0xffff),
            Opcode::PUSH(0),
            Opcode::SETOP(SetOp::Member as u16),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteInt as u16),
            Opcode::END,
        ],
        &[],
    );

    assert_eq!(vm.captured_output(), b"0");
}
