//! Exception and interrupt processing.
//!
//! Builds the hardware stack frame, enters supervisor mode and vectors
//! through the table at VBR. Bus and address errors push the 14-byte
//! group-0 frame; everything else pushes the 6-byte SR + PC frame.

use tracing::{error, trace, warn};

use crate::bus::{BusFault, FaultKind, M68kBus};
use crate::cpu::Cpu68k;
use crate::flags::SpecialFlags;
use crate::history::ExceptionRecord;
use crate::vectors::{self, LONG_FRAME_SIZE, SHORT_FRAME_SIZE};

impl<B: M68kBus> Cpu68k<B> {
    /// Take exception `vector`.
    ///
    /// Exception hooks for the vector run first, all of them; if any reports
    /// the exception handled, nothing else happens. Otherwise the frame is
    /// pushed on the supervisor stack, PC loaded from the vector table and
    /// tracing switched off.
    pub fn process_exception(&mut self, bus: &mut B, vector: u8) {
        self.regs.update_sr_from_fields();

        let name = vectors::vector_name(vector);
        self.exception_history.push(ExceptionRecord {
            vector,
            name,
            pc: self.regs.pc,
            sp: self.regs.sp(),
        });

        if self.hooks.call_exception(&mut self.regs, bus, vector) {
            trace!(vector, name, "exception handled by hook");
            return;
        }

        let sr = self.regs.sr;
        let pc = self.regs.pc;
        trace!(vector, name, pc = format_args!("{pc:#010x}"), "exception");

        self.regs.enter_supervisor();

        if vectors::uses_long_frame(vector) {
            // Function code, access address and IR are not tracked.
            let sp = self.regs.reserve_stack(LONG_FRAME_SIZE);
            bus.write_word(sp, 0);
            bus.write_long(sp.wrapping_add(2), 0);
            bus.write_word(sp.wrapping_add(6), 0);
            bus.write_word(sp.wrapping_add(8), sr);
            bus.write_long(sp.wrapping_add(10), pc);
        } else {
            let sp = self.regs.reserve_stack(SHORT_FRAME_SIZE);
            bus.write_word(sp, sr);
            bus.write_long(sp.wrapping_add(2), pc);
        }
        self.check_stack_guard();

        let handler = bus.read_long_full_access(vectors::entry_address(self.regs.vbr, vector));
        self.check_new_pc(bus, handler);
        self.regs.pc = handler;

        self.regs.status.t1 = false;
        self.regs.status.t0 = false;
        self.regs.status.m = false;
        self.regs
            .spcflags
            .remove(SpecialFlags::TRACE | SpecialFlags::DOTRACE);
    }

    /// Take the interrupt at `level` through vector `base + level` and
    /// raise the mask to that level.
    ///
    /// Levels outside 1-7 are not interrupts and are ignored.
    pub fn process_interrupt(&mut self, bus: &mut B, base: u8, level: u8) {
        if !(1..=7).contains(&level) {
            warn!(level, "interrupt level out of range, ignored");
            return;
        }
        trace!(level, "interrupt");
        self.process_exception(bus, base.wrapping_add(level));
        self.regs.set_interrupt_mask(level);
        self.regs.spcflags.insert(SpecialFlags::INT);
    }

    /// Take the exception for an opcode that decodes to nothing.
    ///
    /// `$Axxx` opcodes go to line A and `$Fxxx` to line F; anything else is
    /// an illegal instruction. PC must point at the opcode.
    pub fn process_illegal_instruction(&mut self, bus: &mut B, opcode: u16) {
        let vector = match opcode & 0xF000 {
            0xA000 => vectors::LINE_A,
            0xF000 => vectors::LINE_F,
            _ => vectors::ILLEGAL_INSTRUCTION,
        };
        self.process_exception(bus, vector);
    }

    /// No device answered an access.
    pub fn bus_error(&mut self, bus: &mut B, address: u32, size: u8, for_read: bool) {
        self.raise_fault(
            bus,
            BusFault {
                kind: FaultKind::Bus,
                address,
                size,
                for_read,
            },
        );
    }

    /// Misaligned word or long access.
    pub fn address_error(&mut self, bus: &mut B, address: u32, size: u8, for_read: bool) {
        self.raise_fault(
            bus,
            BusFault {
                kind: FaultKind::Address,
                address,
                size,
                for_read,
            },
        );
    }

    /// Take the group-0 exception for `fault`.
    ///
    /// A second fault while stacking the group-0 frame or fetching its
    /// vector is a double fault: the CPU would halt, so the engine logs it
    /// and requests a break instead of vectoring again.
    pub(crate) fn raise_fault(&mut self, bus: &mut B, fault: BusFault) {
        // Anything still latched belongs to the access being reported.
        let _ = bus.take_fault();

        self.last_fault = Some(fault);
        let vector = match fault.kind {
            FaultKind::Bus => vectors::BUS_ERROR,
            FaultKind::Address => vectors::ADDRESS_ERROR,
        };
        self.process_exception(bus, vector);

        if let Some(second) = bus.take_fault() {
            error!(
                vector,
                address = format_args!("{:#010x}", second.address),
                sp = format_args!("{:#010x}", self.regs.sp()),
                "double fault while taking a group-0 exception, halting"
            );
            self.regs.spcflags.insert(SpecialFlags::BRK);
        }
    }

    /// Route a fault latched by the bus, if any. Returns true if one was
    /// taken.
    pub(crate) fn deliver_fault(&mut self, bus: &mut B) -> bool {
        match bus.take_fault() {
            Some(fault) => {
                self.raise_fault(bus, fault);
                true
            }
            None => false,
        }
    }
}
