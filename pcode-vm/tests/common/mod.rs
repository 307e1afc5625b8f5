// Each integration binary pulls in the subset of helpers it needs.
#![allow(dead_code)]

use pcode_vm::prelude::*;

/// Encodes an instruction list into a program image.
pub fn assemble(ops: &[Opcode]) -> Vec<u8> {
    let mut program = Vec::new();
    for op in ops {
        op.encode(&mut program);
    }
    program
}

/// Byte offset of every instruction, by index; used to patch jump and
/// call targets after a first layout pass.
pub fn byte_offsets(ops: &[Opcode]) -> Vec<u16> {
    ops.iter()
        .scan(0u16, |at, op| {
            let here = *at;
            *at += op.len() as u16;
            Some(here)
        })
        .collect()
}

/// Runs a program to completion with captured output.
pub fn run_captured(ops: &[Opcode]) -> Executor {
    let mut vm = Executor::in_memory(assemble(ops), &[]).expect("failed to build the machine");
    vm.capture_output();
    vm.run().expect("program faulted");
    vm
}

/// Runs a program with read-only data and captured output.
pub fn run_with_rodata(ops: &[Opcode], rodata: &[u8]) -> Executor {
    let mut vm = Executor::in_memory(assemble(ops), rodata).expect("failed to build the machine");
    vm.capture_output();
    vm.run().expect("program faulted");
    vm
}

/// Register invariants every run must leave in place.
pub fn assert_machine_invariants(vm: &Executor) {
    let regs = vm.registers();
    assert!(regs.spb <= regs.sp, "stack pointer below its base");
    assert!(regs.sp <= regs.hpb, "stack pointer ran into the heap");
    assert!(regs.hpb <= regs.hsp, "heap top below the heap base");
}
