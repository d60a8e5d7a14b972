//! The engine: register file, dispatch table, hooks and bookkeeping for one
//! emulated 68000.
//!
//! Instruction sequencing lives in `execute.rs`, exception processing in
//! `exceptions.rs` and session persistence in `persist.rs`; this file holds
//! the state they share and the register access the rest of the emulator
//! uses.

use std::sync::Arc;

use emu_core::Cycles;
use tracing::{debug, warn};

use crate::bus::{BusFault, M68kBus};
use crate::config::EngineConfig;
use crate::dispatch::OpcodeTable;
use crate::error::ConfigError;
use crate::flags::SpecialFlags;
use crate::history::{ExceptionRecord, History};
use crate::hooks::{
    ExceptionHook, HookHandle, HookRegistry, JsrHook, LinkHook, NewPcHook, NewSpHook, ReturnHook,
    StackChange,
};
use crate::registers::Registers;

/// Register selector for [`Cpu68k::get_register`] / [`Cpu68k::set_register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegId {
    /// Data register D0-D7.
    D(u8),
    /// Address register A0-A7. A7 is the active stack pointer.
    A(u8),
    /// User stack pointer, wherever it currently lives.
    Usp,
    /// Supervisor stack pointer, wherever it currently lives.
    Ssp,
    /// Active stack pointer (A7).
    Sp,
    Pc,
    Sr,
}

/// Kernel stack bounds configured by the session.
///
/// A zero bound is unset. An exception frame pushed below `low` latches the
/// overflow flag, which holds off interrupt delivery until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackGuard {
    pub low_warn: u32,
    pub low: u32,
    overflowed: bool,
    warned: bool,
}

impl StackGuard {
    #[must_use]
    pub const fn new(low_warn: u32, low: u32) -> Self {
        Self {
            low_warn,
            low,
            overflowed: false,
            warned: false,
        }
    }

    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.overflowed
    }

    fn check(&mut self, sp: u32) {
        if self.low_warn != 0 && sp < self.low_warn && !self.warned {
            self.warned = true;
            debug!(sp = format_args!("{sp:#010x}"), low_warn = self.low_warn, "kernel stack running low");
        }
        if self.low != 0 && sp < self.low && !self.overflowed {
            self.overflowed = true;
            warn!(
                sp = format_args!("{sp:#010x}"),
                low = format_args!("{:#010x}", self.low),
                "kernel stack overflowed, interrupts held off"
            );
        }
    }
}

/// One emulated 68000 and everything the interpreter keeps about it.
pub struct Cpu68k<B: M68kBus> {
    // === Registers ===
    pub regs: Registers,

    // === Dispatch ===
    pub(crate) table: Arc<OpcodeTable<B>>,
    pub(crate) hooks: HookRegistry<B>,
    pub(crate) config: EngineConfig,

    // === Pacing ===
    pub(crate) cycles: Cycles,
    /// Instructions since the last slow housekeeping pass.
    pub(crate) slow_counter: u32,

    // === Diagnostics ===
    pub(crate) last_trace_address: u32,
    pub(crate) last_fault: Option<BusFault>,
    pub(crate) stack_guard: StackGuard,
    pub(crate) register_history: History<Registers>,
    pub(crate) exception_history: History<ExceptionRecord>,
}

impl<B: M68kBus> std::fmt::Debug for Cpu68k<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu68k")
            .field("regs", &self.regs)
            .field("hooks", &self.hooks)
            .field("config", &self.config)
            .field("cycles", &self.cycles)
            .field("last_trace_address", &self.last_trace_address)
            .field("last_fault", &self.last_fault)
            .field("stack_guard", &self.stack_guard)
            .finish_non_exhaustive()
    }
}

impl<B: M68kBus> Cpu68k<B> {
    /// Create an engine with the default configuration.
    #[must_use]
    pub fn new(table: Arc<OpcodeTable<B>>) -> Self {
        Self::build(table, EngineConfig::default())
    }

    /// Create an engine with `config`, rejecting unusable settings.
    pub fn with_config(
        table: Arc<OpcodeTable<B>>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(table, config))
    }

    fn build(table: Arc<OpcodeTable<B>>, config: EngineConfig) -> Self {
        Self {
            regs: Registers::new(),
            table,
            hooks: HookRegistry::new(),
            config,
            cycles: Cycles::ZERO,
            slow_counter: 0,
            last_trace_address: 0,
            last_fault: None,
            stack_guard: StackGuard::default(),
            register_history: History::new(config.register_history),
            exception_history: History::new(config.exception_history),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reset the engine.
    ///
    /// A hardware reset also reloads the register file: SSP and PC come
    /// from the first two longs at the ROM base, and the CPU starts in
    /// supervisor mode with every interrupt masked. Either way the PC is
    /// then revalidated with the memory bank, and a fault it latches is
    /// taken straight away.
    pub fn reset(&mut self, bus: &mut B, hardware_reset: bool) {
        self.last_trace_address = 0;
        self.cycles = Cycles::ZERO;
        self.slow_counter = 0;
        self.last_fault = None;
        self.stack_guard = StackGuard::default();
        self.register_history.clear();
        self.exception_history.clear();

        if hardware_reset {
            let rom = self.config.rom_base;
            let mut regs = Registers::new();
            regs.a[7] = bus.read_long(rom);
            regs.pc = bus.read_long(rom.wrapping_add(4));
            regs.update_sr_from_fields();
            self.regs = regs;
            debug!(
                ssp = format_args!("{:#010x}", self.regs.a[7]),
                pc = format_args!("{:#010x}", self.regs.pc),
                "hardware reset"
            );
        }

        bus.check_new_pc(self.regs.pc);
        self.deliver_fault(bus);
    }

    // === Register access ===

    /// Read one register. Reading SR repacks it first.
    pub fn get_register(&mut self, id: RegId) -> u32 {
        match id {
            RegId::D(n) => self.regs.d[usize::from(n & 7)],
            RegId::A(n) => self.regs.a[usize::from(n & 7)],
            RegId::Usp => self.regs.user_sp(),
            RegId::Ssp => self.regs.supervisor_sp(),
            RegId::Sp => self.regs.sp(),
            RegId::Pc => self.regs.pc,
            RegId::Sr => {
                self.regs.update_sr_from_fields();
                u32::from(self.regs.sr)
            }
        }
    }

    /// Write one register. Writing SR unpacks it, which may swap stacks and
    /// raise INT or TRACE.
    pub fn set_register(&mut self, id: RegId, value: u32) {
        match id {
            RegId::D(n) => self.regs.d[usize::from(n & 7)] = value,
            RegId::A(n) => self.regs.a[usize::from(n & 7)] = value,
            RegId::Usp => self.regs.set_user_sp(value),
            RegId::Ssp => self.regs.set_supervisor_sp(value),
            RegId::Sp => self.regs.set_sp(value),
            RegId::Pc => self.regs.pc = value,
            RegId::Sr => {
                self.regs.sr = value as u16;
                self.regs.update_fields_from_sr();
            }
        }
    }

    /// A copy of the register file with SR packed.
    pub fn get_registers(&mut self) -> Registers {
        self.regs.update_sr_from_fields();
        self.regs
    }

    /// Replace the register file wholesale.
    ///
    /// SR is unpacked against the incoming fields, the PC revalidated and
    /// the new-SP hooks told the stack changed.
    pub fn set_registers(&mut self, bus: &mut B, registers: &Registers) {
        self.regs = *registers;
        self.regs.update_fields_from_sr();
        let pc = self.regs.pc;
        self.check_new_pc(bus, pc);
        self.check_new_sp(StackChange::Changed);
        self.deliver_fault(bus);
    }

    // === Status ===

    /// Abstract cycles executed since the last reset.
    #[must_use]
    pub const fn cycle_count(&self) -> u32 {
        self.cycles.get()
    }

    /// Whether the CPU is stopped waiting for an interrupt.
    #[must_use]
    pub const fn stopped(&self) -> bool {
        self.regs.stopped
    }

    /// PC of the instruction that most recently armed a trace exception.
    #[must_use]
    pub const fn last_trace_address(&self) -> u32 {
        self.last_trace_address
    }

    /// The most recent bus or address fault routed through the vectors.
    #[must_use]
    pub const fn last_fault(&self) -> Option<BusFault> {
        self.last_fault
    }

    /// Ask `execute` to return once the current instruction finishes.
    pub fn request_break(&mut self) {
        self.regs.spcflags.insert(SpecialFlags::BRK);
    }

    /// Have the pending interrupt level re-read on the next pass.
    pub fn interrupts_changed(&mut self) {
        self.regs.spcflags.insert(SpecialFlags::INT);
    }

    /// Ask for an end-of-cycle callback once the current instruction
    /// finishes.
    pub fn check_after_cycle(&mut self) {
        self.regs.spcflags.insert(SpecialFlags::END_OF_CYCLE);
    }

    // === Stack guard ===

    pub fn set_stack_bounds(&mut self, low_warn: u32, low: u32) {
        self.stack_guard = StackGuard::new(low_warn, low);
    }

    #[must_use]
    pub const fn stack_guard(&self) -> &StackGuard {
        &self.stack_guard
    }

    #[must_use]
    pub const fn kernel_stack_overflowed(&self) -> bool {
        self.stack_guard.overflowed
    }

    /// Let interrupts through again after a kernel stack overflow.
    pub fn clear_kernel_stack_overflow(&mut self) {
        self.stack_guard.overflowed = false;
        self.stack_guard.warned = false;
    }

    pub(crate) fn check_stack_guard(&mut self) {
        let sp = self.regs.sp();
        self.stack_guard.check(sp);
    }

    // === History ===

    /// Register snapshots taken before each instruction, newest first.
    pub fn register_history(&self) -> impl Iterator<Item = &Registers> {
        self.register_history.iter()
    }

    /// Exceptions processed, newest first.
    pub fn exception_history(&self) -> impl Iterator<Item = &ExceptionRecord> {
        self.exception_history.iter()
    }

    // === Hooks ===

    /// Intercept exceptions through `vector`.
    pub fn install_exception_hook(
        &mut self,
        vector: u8,
        hook: impl FnMut(&mut Registers, &mut B, u8) -> bool + 'static,
    ) -> HookHandle {
        let hook: ExceptionHook<B> = Box::new(hook);
        self.hooks.install_exception(vector, hook)
    }

    pub fn install_jsr_hook(&mut self, hook: impl FnMut(u32, u32) -> bool + 'static) -> HookHandle {
        let hook: JsrHook = Box::new(hook);
        self.hooks.install_jsr(hook)
    }

    pub fn install_jsr_indirect_hook(
        &mut self,
        hook: impl FnMut(u32, u32) -> bool + 'static,
    ) -> HookHandle {
        let hook: JsrHook = Box::new(hook);
        self.hooks.install_jsr_indirect(hook)
    }

    pub fn install_link_hook(&mut self, hook: impl FnMut(i32) + 'static) -> HookHandle {
        let hook: LinkHook = Box::new(hook);
        self.hooks.install_link(hook)
    }

    pub fn install_rte_hook(&mut self, hook: impl FnMut(u32) -> bool + 'static) -> HookHandle {
        let hook: ReturnHook = Box::new(hook);
        self.hooks.install_rte(hook)
    }

    pub fn install_rts_hook(&mut self, hook: impl FnMut(u32) -> bool + 'static) -> HookHandle {
        let hook: ReturnHook = Box::new(hook);
        self.hooks.install_rts(hook)
    }

    pub fn install_new_pc_hook(&mut self, hook: impl FnMut(u32) + 'static) -> HookHandle {
        let hook: NewPcHook = Box::new(hook);
        self.hooks.install_new_pc(hook)
    }

    pub fn install_new_sp_hook(&mut self, hook: impl FnMut(StackChange) + 'static) -> HookHandle {
        let hook: NewSpHook = Box::new(hook);
        self.hooks.install_new_sp(hook)
    }

    /// Remove one registration. Returns false if it was already gone.
    pub fn remove_hook(&mut self, handle: HookHandle) -> bool {
        self.hooks.remove(handle)
    }

    #[must_use]
    pub const fn hooks(&self) -> &HookRegistry<B> {
        &self.hooks
    }

    // === Control-flow notifications (called by opcode handlers) ===

    /// A JSR to `dest` is about to run; `return_address` is what it pushes.
    pub fn process_jsr(&mut self, return_address: u32, dest: u32) -> bool {
        self.hooks.call_jsr(return_address, dest)
    }

    /// A JSR through a register or memory operand is about to run.
    pub fn process_jsr_indirect(&mut self, return_address: u32, dest: u32) -> bool {
        self.hooks.call_jsr_indirect(return_address, dest)
    }

    /// A LINK with displacement `size` just built its frame.
    pub fn process_link(&mut self, size: i32) {
        self.hooks.call_link(size);
    }

    /// An RTE is returning to `dest`.
    pub fn process_rte(&mut self, dest: u32) -> bool {
        self.hooks.call_rte(dest)
    }

    /// An RTS is returning to `dest`.
    pub fn process_rts(&mut self, dest: u32) -> bool {
        self.hooks.call_rts(dest)
    }

    /// Announce a new PC to the hooks, then to the memory bank.
    pub fn check_new_pc(&mut self, bus: &mut B, pc: u32) {
        self.hooks.call_new_pc(pc);
        bus.check_new_pc(pc);
    }

    /// Announce a stack pointer change to the hooks.
    pub fn check_new_sp(&mut self, change: StackChange) {
        self.hooks.call_new_sp(change);
    }

    // === Stack access ===

    pub fn push_word(&mut self, bus: &mut B, value: u16) {
        let sp = self.regs.reserve_stack(2);
        bus.write_word(sp, value);
    }

    pub fn push_long(&mut self, bus: &mut B, value: u32) {
        let sp = self.regs.reserve_stack(4);
        bus.write_long(sp, value);
    }

    pub fn pop_word(&mut self, bus: &mut B) -> u16 {
        let sp = self.regs.release_stack(2);
        bus.read_word(sp)
    }

    pub fn pop_long(&mut self, bus: &mut B) -> u32 {
        let sp = self.regs.release_stack(4);
        bus.read_long(sp)
    }

    /// Fetch the next instruction-stream word and advance PC.
    pub fn fetch_word(&mut self, bus: &mut B) -> u16 {
        let word = bus.read_word(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        word
    }

    /// Fetch the next instruction-stream long and advance PC.
    pub fn fetch_long(&mut self, bus: &mut B) -> u32 {
        let long = bus.read_long(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(4);
        long
    }
}
