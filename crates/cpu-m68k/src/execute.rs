//! The interpreter loop and special-condition engine.
//!
//! `execute` runs opcodes until something asks it to stop. Between opcodes
//! the only thing it looks at is whether the special flags word is non-zero;
//! everything else (tracing, interrupts, STOP, breaks, end-of-cycle work) is
//! sequenced by `execute_special` in a fixed order.

use tracing::{debug, error, warn};

use crate::bus::M68kBus;
use crate::cpu::Cpu68k;
use crate::flags::SpecialFlags;
use crate::host::{Button, ButtonEvent, EventSourceKind, Host};
use crate::vectors;

/// Warns when a single `execute` call has run for too long.
struct DeadManSwitch {
    timeout_ms: Option<u64>,
    start: u64,
}

impl DeadManSwitch {
    fn arm<H: Host + ?Sized>(timeout_ms: Option<u64>, host: &H) -> Self {
        let start = if timeout_ms.is_some() {
            host.now_millis()
        } else {
            0
        };
        Self { timeout_ms, start }
    }

    fn check<H: Host + ?Sized>(&mut self, host: &H, pc: u32) {
        let Some(timeout) = self.timeout_ms else {
            return;
        };
        let now = host.now_millis();
        let elapsed = now.saturating_sub(self.start);
        if elapsed > timeout {
            warn!(
                elapsed_ms = elapsed,
                pc = format_args!("{pc:#010x}"),
                "CPU loop has not returned to the session"
            );
            self.start = now;
        }
    }
}

impl<B: M68kBus> Cpu68k<B> {
    /// Run instructions until a break condition.
    ///
    /// If the CPU was left stopped by a previous call, execution resumes in
    /// the STOP idle loop without fetching anything.
    pub fn execute<H: Host + ?Sized>(&mut self, bus: &mut B, host: &mut H) {
        let mut dead_man = DeadManSwitch::arm(self.config.dead_man_timeout_ms, host);
        let mut resume_stopped = self.regs.spcflags.contains(SpecialFlags::STOP);

        loop {
            if !resume_stopped {
                if !host.is_nested() && host.is_break_location(self.regs.pc) {
                    host.handle_instruction_break();
                }

                if self.register_history.is_enabled() {
                    self.regs.update_sr_from_fields();
                    self.register_history.push(self.regs);
                }

                dead_man.check(host, self.regs.pc);

                let opcode = self.fetch_word(bus);
                if let Some(fault) = bus.take_fault() {
                    // The fetch itself faulted; the frame records the
                    // opcode's address and nothing is dispatched.
                    self.regs.pc = self.regs.pc.wrapping_sub(2);
                    self.raise_fault(bus, fault);
                } else {
                    let handler = self.table.handler(opcode);
                    let cost = handler(self, bus, opcode);
                    self.cycles += cost;
                    self.deliver_fault(bus);
                }

                self.cycle(host, false);
            }
            resume_stopped = false;

            if !self.regs.spcflags.is_empty() && self.execute_special(bus, host) {
                return;
            }
        }
    }

    /// Handle every pending special condition. Returns true when `execute`
    /// should return.
    pub(crate) fn execute_special<H: Host + ?Sized>(&mut self, bus: &mut B, host: &mut H) -> bool {
        // Nested ROM calls only honour break requests.
        if host.is_nested() {
            return self.check_for_break(host);
        }

        if self.regs.spcflags.contains(SpecialFlags::END_OF_CYCLE) && host.end_of_cycle(true) {
            return true;
        }

        if self.regs.spcflags.contains(SpecialFlags::DOTRACE)
            && !self.regs.spcflags.contains(SpecialFlags::STOP)
        {
            self.process_exception(bus, vectors::TRACE);
            self.deliver_fault(bus);
        }

        if self.regs.spcflags.contains(SpecialFlags::STOP) && self.execute_stopped_loop(bus, host) {
            self.regs.spcflags.remove(SpecialFlags::BRK);
            return true;
        }

        if self.regs.spcflags.contains(SpecialFlags::TRACE) && self.regs.status.t1 {
            self.last_trace_address = self.regs.pc;
            self.regs.spcflags.remove(SpecialFlags::TRACE);
            self.regs.spcflags.insert(SpecialFlags::DOTRACE);
        }

        if self.regs.spcflags.contains(SpecialFlags::DOINT) && !self.stack_guard.overflowed() {
            let level = pending_level(host);
            self.regs.spcflags.remove(SpecialFlags::DOINT);
            if let Some(level) = level
                && level > self.regs.interrupt_mask()
            {
                self.process_interrupt(bus, host.interrupt_base(), level);
                self.regs.stopped = false;
                self.deliver_fault(bus);
            }
        }

        if self.regs.spcflags.contains(SpecialFlags::INT) {
            self.regs.spcflags.remove(SpecialFlags::INT);
            self.regs.spcflags.insert(SpecialFlags::DOINT);
        }

        if self.regs.spcflags.contains(SpecialFlags::END_OF_CYCLE) {
            self.regs.spcflags.remove(SpecialFlags::END_OF_CYCLE);
            if host.end_of_cycle(false) {
                return true;
            }
        }

        self.check_for_break(host)
    }

    /// Idle while STOP is set, ticking the hardware until an interrupt
    /// above the mask arrives. Returns true if a break was requested first.
    pub(crate) fn execute_stopped_loop<H: Host + ?Sized>(
        &mut self,
        bus: &mut B,
        host: &mut H,
    ) -> bool {
        debug_assert!(!host.is_nested(), "STOP idle loop entered while nested");
        debug_assert!(
            self.regs.interrupt_mask() < 7,
            "STOP idle loop entered with every interrupt masked"
        );
        if self.regs.interrupt_mask() >= 7 {
            error!(
                pc = format_args!("{:#010x}", self.regs.pc),
                "STOP with interrupt mask 7, only a break can resume"
            );
        }

        if host.is_asleep() && !host.has_button_event() {
            press_power_for_event_sources(host);
        }

        let mut dead_man = DeadManSwitch::arm(self.config.dead_man_timeout_ms, host);

        loop {
            dead_man.check(host, self.regs.pc);

            host.delay();
            self.cycles += self.config.idle_tick_cycles;
            self.cycle(host, true);

            if self.regs.spcflags.intersects(SpecialFlags::INT | SpecialFlags::DOINT) {
                let level = pending_level(host);
                self.regs
                    .spcflags
                    .remove(SpecialFlags::INT | SpecialFlags::DOINT);
                if let Some(level) = level
                    && level > self.regs.interrupt_mask()
                {
                    self.process_interrupt(bus, host.interrupt_base(), level);
                    self.regs.stopped = false;
                    self.regs.spcflags.remove(SpecialFlags::STOP);
                    self.deliver_fault(bus);
                }
            }

            if self.check_for_break(host) {
                return true;
            }

            if !self.regs.spcflags.contains(SpecialFlags::STOP) {
                return false;
            }
        }
    }

    /// Per-instruction housekeeping. Skipped entirely while nested.
    pub(crate) fn cycle<H: Host + ?Sized>(&mut self, host: &mut H, sleeping: bool) {
        if host.is_nested() {
            return;
        }

        host.cycle(sleeping);
        if host.take_interrupt_change() {
            self.regs.spcflags.insert(SpecialFlags::INT);
        }

        self.slow_counter = self.slow_counter.wrapping_add(1);
        if sleeping || self.slow_counter & self.config.slow_cycle_mask == 0 {
            self.cycle_slowly(host, sleeping);
        }
    }

    /// Throttled housekeeping; also where a pending suspend request turns
    /// into an end-of-cycle callback.
    pub(crate) fn cycle_slowly<H: Host + ?Sized>(&mut self, host: &mut H, sleeping: bool) {
        host.cycle_slowly(sleeping);
        if host.suspend_requested() {
            self.check_after_cycle();
        }
    }

    pub(crate) fn check_for_break<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        if self.regs.spcflags.contains(SpecialFlags::BRK) {
            self.regs.spcflags.remove(SpecialFlags::BRK);
            return true;
        }
        host.check_for_break()
    }
}

/// The host's pending interrupt level, if it is a real one (1-7).
fn pending_level<H: Host + ?Sized>(host: &mut H) -> Option<u8> {
    host.interrupt_level().filter(|level| (1..=7).contains(level))
}

/// The device went to sleep while something was feeding it events. Pause
/// the sources, press and release Power so it wakes up, then resume them.
/// The press is posted immediately; the release is queued.
fn press_power_for_event_sources<H: Host + ?Sized>(host: &mut H) {
    let mut suspended = Vec::with_capacity(EventSourceKind::ALL.len());
    for kind in EventSourceKind::ALL {
        if let Some(source) = host.event_source(kind)
            && source.is_on()
        {
            source.set_on(false);
            suspended.push(kind);
        }
    }

    if suspended.is_empty() {
        return;
    }

    debug!(?suspended, "device asleep under synthetic input, pressing Power");
    host.post_button_event(ButtonEvent::new(Button::Power, true), true);
    host.post_button_event(ButtonEvent::new(Button::Power, false), false);

    for kind in suspended {
        if let Some(source) = host.event_source(kind) {
            source.set_on(true);
        }
    }
}
