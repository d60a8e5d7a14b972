//! What the engine needs from the emulation session and the rest of the
//! emulated hardware.
//!
//! Every method except the clock has a default that models a quiet machine:
//! no breakpoints, no interrupts, no event sources, nothing asleep.

use emu_core::HostClock;

/// Hardware buttons the engine can press on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Power,
}

/// A press or release of a hardware button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub pressed: bool,
}

impl ButtonEvent {
    #[must_use]
    pub const fn new(button: Button, pressed: bool) -> Self {
        Self { button, pressed }
    }
}

/// Producers of synthetic input that must keep running while the emulated
/// device sleeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSourceKind {
    /// Random UI fuzzer.
    Gremlins,
    /// Recorded event replay.
    Playback,
    /// Event log minimizer.
    Minimizer,
}

impl EventSourceKind {
    pub const ALL: [Self; 3] = [Self::Gremlins, Self::Playback, Self::Minimizer];
}

/// An event source that can be paused around power-button synthesis.
pub trait EventSource {
    fn is_on(&self) -> bool;
    fn set_on(&mut self, on: bool);
}

/// Session and hardware services the interpreter calls out to.
pub trait Host: HostClock {
    /// True while the session is running a nested ROM call on behalf of
    /// the host. Nested execution skips breakpoints, housekeeping and the
    /// STOP idle loop.
    fn is_nested(&self) -> bool {
        false
    }

    /// True if a debugger breakpoint is set at `pc`.
    fn is_break_location(&self, _pc: u32) -> bool {
        false
    }

    /// Handle a breakpoint hit. May block.
    fn handle_instruction_break(&mut self) {}

    /// End-of-cycle callback. `is_reset` is true for the early probe that
    /// runs before any other special condition. Return true to leave the
    /// execute loop.
    fn end_of_cycle(&mut self, _is_reset: bool) -> bool {
        false
    }

    /// Whether the session wants the execute loop to return now.
    fn check_for_break(&mut self) -> bool {
        false
    }

    /// Whether the session has a suspend request pending. Polled during
    /// slow housekeeping.
    fn suspend_requested(&self) -> bool {
        false
    }

    /// Highest pending interrupt level (1-7), if any.
    fn interrupt_level(&mut self) -> Option<u8> {
        None
    }

    /// True once each time the pending interrupt state has changed since
    /// the last call. Polled after every housekeeping tick; a true result
    /// makes the engine re-read [`Host::interrupt_level`] on its next pass.
    fn take_interrupt_change(&mut self) -> bool {
        false
    }

    /// Vector number of the level-0 autovector; level `n` uses `base + n`.
    fn interrupt_base(&self) -> u8 {
        crate::vectors::AUTOVECTOR_BASE
    }

    /// Whether the emulated device is asleep.
    fn is_asleep(&self) -> bool {
        false
    }

    /// Whether a button event is already queued.
    fn has_button_event(&self) -> bool {
        false
    }

    /// Queue a button event. `post_now` skips the usual input debounce.
    fn post_button_event(&mut self, _event: ButtonEvent, _post_now: bool) {}

    /// The event source of `kind`, if the session has one.
    fn event_source(&mut self, _kind: EventSourceKind) -> Option<&mut dyn EventSource> {
        None
    }

    /// Per-instruction hardware housekeeping (timers, UART).
    fn cycle(&mut self, _sleeping: bool) {}

    /// Throttled hardware housekeeping (LCD, pen, sound).
    fn cycle_slowly(&mut self, _sleeping: bool) {}
}
