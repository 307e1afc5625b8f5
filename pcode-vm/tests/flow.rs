//! Control flow: pointer chasing, procedure calls, numeric contexts.

use pcode_asm::float::{ARG1, ARG2};
use pcode_vm::prelude::*;

mod common;
use common::{assemble, assert_machine_invariants, byte_offsets, run_captured, run_with_rodata};

/// Walks a three-node linked list built in the stack frame, printing one
/// line per node.
///
/// ```pascal
/// TYPE node = RECORD flink: ^node; payload: integer END;
/// ```
///
/// Frame layout: `ptr` at offset 0, the three nodes at 2, 6 and 10, each
/// `[flink, payload]`.
#[test]
fn linked_list_walk() {
    let visit = b"Visit node = ";

    let build = |loop_at: u16, end_at: u16| {
        vec![
            Opcode::INDS(14),
            // nodes[0] = { @nodes[1], 1 }
            Opcode::LAS(0, 2),
            Opcode::LAS(0, 6),
            Opcode::STI,
            Opcode::PUSH(1),
            Opcode::STS(0, 4),
            // nodes[1] = { @nodes[2], 2 }
            Opcode::LAS(0, 10),
            Opcode::STS(0, 6),
            Opcode::PUSH(2),
            Opcode::STS(0, 8),
            // nodes[2] = { nil, 3 }
            Opcode::PUSH(0),
            Opcode::STS(0, 10),
            Opcode::PUSH(3),
            Opcode::STS(0, 12),
            // ptr := @nodes[0]
            Opcode::LAS(0, 2),
            Opcode::STS(0, 0),
            // WHILE ptr <> nil DO
            Opcode::LDS(0, 0), // index 16: loop head
            Opcode::JEQUZ(end_at),
            // write 'Visit node = ', ptr^.payload, newline
            Opcode::PUSH(1),
            Opcode::PUSH(visit.len() as u16),
            Opcode::LAC(0),
            Opcode::LIB(LibCall::CStr2Str as u16),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteString as u16),
            Opcode::PUSH(1),
            Opcode::LDS(0, 0),
            Opcode::PUSH(2),
            Opcode::ADD,
            Opcode::LDI,
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteInt as u16),
            Opcode::PUSH(1),
            Opcode::SYSIO(SysIo::WriteLine as u16),
            // ptr := ptr^.flink
            Opcode::LDS(0, 0),
            Opcode::LDI,
            Opcode::STS(0, 0),
            Opcode::JMP(loop_at),
            Opcode::END, // index 37
        ]
    };

    let offsets = byte_offsets(&build(0, 0));
    let ops = build(offsets[16], offsets[37]);

    let vm = run_with_rodata(&ops, visit);
    assert_eq!(
        vm.captured_output(),
        b"Visit node = 1\nVisit node = 2\nVisit node = 3\n"
    );
    assert_machine_invariants(&vm);
}

/// `procedure inc(VAR x: integer)` writes back through its argument.
#[test]
fn var_parameter_write_back() {
    let build = |callee_at: u16| {
        vec![
            // a := 5
            Opcode::INDS(2),
            Opcode::PUSH(5),
            Opcode::STS(0, 0),
            // inc(a)
            Opcode::LAS(0, 0),
            Opcode::PCAL(1, callee_at),
            Opcode::INDS(-2i16 as u16),
            // writeln(a)
            Opcode::PUSH(1),
            Opcode::LDS(0, 0),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteInt as u16),
            Opcode::PUSH(1),
            Opcode::SYSIO(SysIo::WriteLine as u16),
            Opcode::END,
            // inc: x := x + 1 through the VAR address at fp-10
            Opcode::LDS(1, -10i16 as u16), // index 13
            Opcode::LDS(1, -10i16 as u16),
            Opcode::LDI,
            Opcode::INC,
            Opcode::STI,
            Opcode::RET,
        ]
    };

    let offsets = byte_offsets(&build(0));
    let vm = run_captured(&build(offsets[13]));

    assert_eq!(vm.captured_output(), b"6\n");
    assert_eq!(vm.registers().fp, vm.registers().spb);
    assert_eq!(vm.registers().lsp, 0);
    assert_machine_invariants(&vm);
}

/// `3 / 2` in a real context floats both operands; `3 div 2` stays
/// integral.
#[test]
fn division_precision_follows_the_context() {
    let vm = run_captured(&[
        Opcode::PUSH(1),
        Opcode::PUSH(3),
        Opcode::PUSH(2),
        Opcode::FLOAT(FloatOp::Div.pack(ARG1 | ARG2)),
        Opcode::PUSH(0),
        Opcode::PUSH(1),
        Opcode::SYSIO(SysIo::WriteReal as u16),
        Opcode::PUSH(1),
        Opcode::SYSIO(SysIo::WriteLine as u16),
        Opcode::PUSH(1),
        Opcode::PUSH(3),
        Opcode::PUSH(2),
        Opcode::DIV,
        Opcode::PUSH(0),
        Opcode::SYSIO(SysIo::WriteInt as u16),
        Opcode::PUSH(1),
        Opcode::SYSIO(SysIo::WriteLine as u16),
        Opcode::END,
    ]);

    assert_eq!(vm.captured_output(), b"1.5\n1\n");
    assert_machine_invariants(&vm);
}

/// Nested static levels: a level-2 routine reaches a level-1 local
/// through the static chain.
#[test]
fn static_chain_reaches_enclosing_frames() {
    let build = |outer_at: u16, inner_at: u16| {
        vec![
            Opcode::INDS(2),
            Opcode::PCAL(1, outer_at),
            Opcode::PUSH(1),
            Opcode::LDS(0, 0),
            Opcode::PUSH(0),
            Opcode::SYSIO(SysIo::WriteInt as u16),
            Opcode::END,
            // outer: local := 40 at (1, 0); calls inner; copies local
            // into the caller's slot
            Opcode::INDS(2), // index 7
            Opcode::PUSH(40),
            Opcode::STS(1, 0),
            Opcode::PCAL(2, inner_at),
            Opcode::LDS(1, 0),
            Opcode::STS(0, 0),
            Opcode::RET,
            // inner: adds 2 to outer's local through the static chain
            Opcode::LDS(1, 0), // index 14
            Opcode::INC,
            Opcode::INC,
            Opcode::STS(1, 0),
            Opcode::RET,
        ]
    };

    let offsets = byte_offsets(&build(0, 0));
    let vm = run_captured(&build(offsets[7], offsets[14]));

    assert_eq!(vm.captured_output(), b"42");
    assert_machine_invariants(&vm);
}

#[test]
fn frame_teardown_restores_the_stack_exactly() {
    let build = |callee_at: u16| {
        vec![
            Opcode::PCAL(1, callee_at),
            Opcode::END,
            Opcode::NOP, // index 2
            Opcode::RET,
        ]
    };

    let offsets = byte_offsets(&build(0));
    let ops = build(offsets[2]);

    let mut vm = Executor::in_memory(assemble(&ops), &[]).unwrap();
    let sp0 = vm.registers().sp;
    vm.run().unwrap();

    assert_eq!(vm.registers().sp, sp0);
    assert_eq!(vm.registers().fp, vm.registers().spb);
}
