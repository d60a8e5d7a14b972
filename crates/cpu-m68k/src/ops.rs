//! System-control instructions.
//!
//! The handful of opcodes that interact with the engine itself rather than
//! with data: stopping the CPU, entering and leaving exception handlers,
//! subroutine linkage and loading SR. Enough to boot a vector table and
//! drive every engine path; a full instruction set layers its own handlers
//! on the same builder.

use std::sync::Arc;

use crate::bus::M68kBus;
use crate::cpu::Cpu68k;
use crate::dispatch::{self, OpcodeTable, OpcodeTableBuilder};
use crate::flags::SpecialFlags;
use crate::hooks::StackChange;
use crate::vectors;

/// Register every system-control handler in `builder`.
pub fn install_control_ops<B: M68kBus>(builder: &mut OpcodeTableBuilder<B>) {
    builder
        .set(0x4E71, nop)
        .set(0x4E72, stop)
        .set(0x4E73, rte)
        .set(0x4E75, rts)
        .set_matching(0xFFF0, 0x4E40, trap)
        .set(0x4AFC, dispatch::illegal_opcode)
        .set(0x4EB9, jsr_absolute)
        .set_matching(0xFFF8, 0x4E90, jsr_indirect)
        .set_matching(0xFFF8, 0x4E50, link)
        .set(0x46FC, move_to_sr);
}

/// A table holding only the system-control set.
#[must_use]
pub fn control_table<B: M68kBus>() -> Arc<OpcodeTable<B>> {
    let mut builder = OpcodeTable::builder();
    install_control_ops(&mut builder);
    builder.build()
}

/// Rewind to the opcode and take the privilege violation vector.
fn privilege_violation<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B) -> u32 {
    cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    cpu.process_exception(bus, vectors::PRIVILEGE_VIOLATION);
    34
}

fn nop<B: M68kBus>(_cpu: &mut Cpu68k<B>, _bus: &mut B, _opcode: u16) -> u32 {
    4
}

// STOP #imm
fn stop<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, _opcode: u16) -> u32 {
    if !cpu.regs.is_supervisor() {
        return privilege_violation(cpu, bus);
    }
    cpu.regs.sr = cpu.fetch_word(bus);
    cpu.regs.update_fields_from_sr();
    cpu.regs.stopped = true;
    cpu.regs.spcflags.insert(SpecialFlags::STOP);
    4
}

fn rte<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, _opcode: u16) -> u32 {
    if !cpu.regs.is_supervisor() {
        return privilege_violation(cpu, bus);
    }
    let sr = cpu.pop_word(bus);
    let dest = cpu.pop_long(bus);
    cpu.regs.sr = sr;
    cpu.regs.update_fields_from_sr();
    cpu.check_new_sp(StackChange::Incremented);
    cpu.process_rte(dest);
    cpu.check_new_pc(bus, dest);
    cpu.regs.pc = dest;
    20
}

fn rts<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, _opcode: u16) -> u32 {
    let dest = cpu.pop_long(bus);
    cpu.check_new_sp(StackChange::Incremented);
    cpu.process_rts(dest);
    cpu.check_new_pc(bus, dest);
    cpu.regs.pc = dest;
    16
}

// TRAP #n
fn trap<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, opcode: u16) -> u32 {
    cpu.process_exception(bus, vectors::TRAP_BASE + (opcode & 0xF) as u8);
    34
}

// JSR abs.L
fn jsr_absolute<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, _opcode: u16) -> u32 {
    let dest = cpu.fetch_long(bus);
    let ret = cpu.regs.pc;
    cpu.process_jsr(ret, dest);
    call(cpu, bus, ret, dest);
    20
}

// JSR (An)
fn jsr_indirect<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, opcode: u16) -> u32 {
    let dest = cpu.regs.a[usize::from(opcode & 7)];
    let ret = cpu.regs.pc;
    cpu.process_jsr_indirect(ret, dest);
    call(cpu, bus, ret, dest);
    16
}

fn call<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, ret: u32, dest: u32) {
    cpu.push_long(bus, ret);
    cpu.check_new_sp(StackChange::Decremented);
    cpu.check_new_pc(bus, dest);
    cpu.regs.pc = dest;
}

// LINK An,#d16
fn link<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, opcode: u16) -> u32 {
    let reg = usize::from(opcode & 7);
    let displacement = i32::from(cpu.fetch_word(bus) as i16);

    let frame = cpu.regs.reserve_stack(4);
    // LINK A7 saves the already-decremented stack pointer.
    let saved = cpu.regs.a[reg];
    bus.write_long(frame, saved);
    cpu.regs.a[reg] = frame;
    cpu.regs.a[7] = cpu.regs.a[7].wrapping_add_signed(displacement);

    cpu.process_link(displacement);
    cpu.check_new_sp(StackChange::Decremented);
    16
}

// MOVE #imm,SR
fn move_to_sr<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, _opcode: u16) -> u32 {
    if !cpu.regs.is_supervisor() {
        return privilege_violation(cpu, bus);
    }
    cpu.regs.sr = cpu.fetch_word(bus);
    cpu.regs.update_fields_from_sr();
    12
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::RamBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn setup(program: &[u16]) -> (Cpu68k<RamBus>, RamBus) {
        let mut bus = RamBus::new(0x1_0000);
        for v in 0..=255u32 {
            bus.poke_long(v * 4, 0x6000 + v * 0x10);
        }
        bus.load_words(0x1000, program);
        let mut cpu = Cpu68k::new(control_table());
        cpu.regs.a[7] = 0x4000;
        cpu.regs.pc = 0x1000;
        (cpu, bus)
    }

    fn step(cpu: &mut Cpu68k<RamBus>, bus: &mut RamBus) -> u32 {
        let opcode = cpu.fetch_word(bus);
        let handler = cpu.table.handler(opcode);
        handler(cpu, bus, opcode)
    }

    #[test]
    fn jsr_then_rts_round_trips() {
        let (mut cpu, mut bus) = setup(&[0x4EB9, 0x0000, 0x2000]);
        bus.load_words(0x2000, &[0x4E75]);
        let calls = Rc::new(RefCell::new(Vec::new()));
        {
            let calls = Rc::clone(&calls);
            cpu.install_jsr_hook(move |ret, dest| {
                calls.borrow_mut().push((ret, dest));
                false
            });
        }

        assert_eq!(step(&mut cpu, &mut bus), 20);
        assert_eq!(cpu.regs.pc, 0x2000);
        assert_eq!(cpu.regs.a[7], 0x3FFC);
        assert_eq!(bus.peek_long(0x3FFC), 0x1006);

        step(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x1006);
        assert_eq!(cpu.regs.a[7], 0x4000);
        assert_eq!(*calls.borrow(), vec![(0x1006, 0x2000)]);
    }

    #[test]
    fn jsr_indirect_uses_the_address_register() {
        let (mut cpu, mut bus) = setup(&[0x4E92]);
        cpu.regs.a[2] = 0x2400;
        let seen = Rc::new(RefCell::new(None));
        {
            let seen = Rc::clone(&seen);
            cpu.install_jsr_indirect_hook(move |ret, dest| {
                *seen.borrow_mut() = Some((ret, dest));
                true
            });
        }
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x2400);
        assert_eq!(*seen.borrow(), Some((0x1002, 0x2400)));
    }

    #[test]
    fn link_builds_a_frame_and_reports_displacement() {
        let (mut cpu, mut bus) = setup(&[0x4E56, 0xFFF0]);
        cpu.regs.a[6] = 0xAAAA;
        let disp = Rc::new(RefCell::new(0));
        {
            let disp = Rc::clone(&disp);
            cpu.install_link_hook(move |d| *disp.borrow_mut() = d);
        }
        step(&mut cpu, &mut bus);

        assert_eq!(bus.peek_long(0x3FFC), 0xAAAA);
        assert_eq!(cpu.regs.a[6], 0x3FFC);
        assert_eq!(cpu.regs.a[7], 0x3FFC - 16);
        assert_eq!(*disp.borrow(), -16);
    }

    #[test]
    fn trap_vectors_by_low_nibble() {
        let (mut cpu, mut bus) = setup(&[0x4E4F]);
        step(&mut cpu, &mut bus);
        assert_eq!(cpu.regs.pc, 0x6000 + 47 * 0x10);
        assert_eq!(bus.peek_long(0x3FFC), 0x1002);
    }

    #[test]
    fn rte_restores_sr_and_pc() {
        let (mut cpu, mut bus) = setup(&[0x4E73]);
        cpu.regs.usp = 0x8000;
        cpu.regs.a[7] = 0x3FFA;
        bus.load_words(0x3FFA, &[0x0004, 0x0000, 0x1234]);
        step(&mut cpu, &mut bus);

        assert_eq!(cpu.regs.pc, 0x1234);
        assert!(!cpu.regs.is_supervisor());
        assert!(cpu.regs.status.z);
        assert_eq!(cpu.regs.a[7], 0x8000);
        assert_eq!(cpu.regs.isp, 0x4000);
    }

    #[test]
    fn privileged_ops_trap_in_user_mode() {
        let (mut cpu, mut bus) = setup(&[0x4E72, 0x2000]);
        cpu.regs.sr = 0x0000;
        cpu.regs.update_fields_from_sr();
        cpu.regs.isp = 0x4000;

        assert_eq!(step(&mut cpu, &mut bus), 34);
        assert!(!cpu.stopped());
        assert_eq!(cpu.regs.pc, 0x6000 + 8 * 0x10);
        assert_eq!(bus.peek_long(0x3FFC), 0x1000);
    }

    #[test]
    fn stop_loads_sr_and_arms_stop() {
        let (mut cpu, mut bus) = setup(&[0x4E72, 0x2300]);
        step(&mut cpu, &mut bus);
        assert!(cpu.stopped());
        assert_eq!(cpu.regs.interrupt_mask(), 3);
        assert!(cpu.regs.spcflags.contains(SpecialFlags::STOP | SpecialFlags::INT));
        assert_eq!(cpu.regs.pc, 0x1004);
    }
}
