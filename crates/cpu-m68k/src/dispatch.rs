//! Opcode dispatch table.
//!
//! One handler per 16-bit opcode word. Handlers receive the opcode with PC
//! already advanced past it and return the cycle cost of the instruction.
//! The table is built once and shared between engine instances through an
//! [`Arc`].

use std::fmt;
use std::sync::Arc;

use crate::bus::M68kBus;
use crate::cpu::Cpu68k;

/// Executes one instruction and returns its cycle cost.
pub type OpcodeFn<B> = fn(&mut Cpu68k<B>, &mut B, u16) -> u32;

/// Number of entries in a table: every 16-bit opcode word.
pub const TABLE_SIZE: usize = 0x1_0000;

/// Cycles charged for an opcode that decodes to nothing.
pub const ILLEGAL_CYCLES: u32 = 34;

/// Immutable 65 536-entry opcode table.
pub struct OpcodeTable<B: M68kBus> {
    handlers: Box<[OpcodeFn<B>]>,
    assigned: usize,
}

impl<B: M68kBus> OpcodeTable<B> {
    /// Start a table in which every opcode is illegal.
    #[must_use]
    pub fn builder() -> OpcodeTableBuilder<B> {
        OpcodeTableBuilder::new()
    }

    /// The handler for `opcode`.
    #[inline]
    #[must_use]
    pub fn handler(&self, opcode: u16) -> OpcodeFn<B> {
        self.handlers[usize::from(opcode)]
    }

    /// Run the handler for `opcode` and return its cycle cost.
    #[inline]
    pub fn dispatch(&self, cpu: &mut Cpu68k<B>, bus: &mut B, opcode: u16) -> u32 {
        (self.handler(opcode))(cpu, bus, opcode)
    }
}

impl<B: M68kBus> fmt::Debug for OpcodeTable<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcodeTable")
            .field("assigned", &self.assigned)
            .finish()
    }
}

/// Mutable table under construction.
pub struct OpcodeTableBuilder<B: M68kBus> {
    handlers: Vec<OpcodeFn<B>>,
    assigned: Vec<bool>,
}

impl<B: M68kBus> Default for OpcodeTableBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: M68kBus> OpcodeTableBuilder<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: vec![illegal_opcode::<B> as OpcodeFn<B>; TABLE_SIZE],
            assigned: vec![false; TABLE_SIZE],
        }
    }

    /// Assign a handler to one opcode.
    pub fn set(&mut self, opcode: u16, handler: OpcodeFn<B>) -> &mut Self {
        self.handlers[usize::from(opcode)] = handler;
        self.assigned[usize::from(opcode)] = true;
        self
    }

    /// Assign a handler to every opcode with `opcode & mask == pattern`.
    pub fn set_matching(&mut self, mask: u16, pattern: u16, handler: OpcodeFn<B>) -> &mut Self {
        let slots = self.handlers.iter_mut().zip(self.assigned.iter_mut());
        for (opcode, (slot, assigned)) in slots.enumerate() {
            if opcode as u16 & mask == pattern {
                *slot = handler;
                *assigned = true;
            }
        }
        self
    }

    /// Freeze the table.
    #[must_use]
    pub fn build(self) -> Arc<OpcodeTable<B>> {
        Arc::new(OpcodeTable {
            handlers: self.handlers.into_boxed_slice(),
            assigned: self.assigned.iter().filter(|&&a| a).count(),
        })
    }
}

/// Fallback for unassigned opcodes.
///
/// Rewinds PC to the opcode word so the exception frame points at it, then
/// raises illegal instruction, line A or line F as the top nibble dictates.
pub fn illegal_opcode<B: M68kBus>(cpu: &mut Cpu68k<B>, bus: &mut B, opcode: u16) -> u32 {
    cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
    cpu.process_illegal_instruction(bus, opcode);
    ILLEGAL_CYCLES
}
