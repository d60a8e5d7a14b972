//! Motorola 68000 interpretation and exception engine.
//!
//! The engine runs opcodes from a shared 65 536-entry dispatch table against
//! a register file, and sequences everything that happens between opcodes:
//! trace exceptions, interrupt delivery, the STOP idle state, breakpoints and
//! host end-of-cycle work. Exceptions are taken with the exact 68000 stack
//! frames through a vector table in emulated memory.
//!
//! The engine knows nothing about debuggers, API patchers or profilers.
//! They attach through the hook registry and are called on exceptions,
//! subroutine calls and returns, frame links and PC/SP changes.
//!
//! Memory goes through [`M68kBus`]; the rest of the emulated device and the
//! emulation session are reached through [`Host`].

pub mod bus;
pub mod config;
pub mod cpu;
pub mod dispatch;
mod error;
mod exceptions;
mod execute;
pub mod flags;
pub mod history;
pub mod hooks;
pub mod host;
pub mod ops;
pub mod persist;
pub mod registers;
pub mod vectors;

pub use bus::{BusFault, FaultKind, M68kBus, RamBus};
pub use config::EngineConfig;
pub use cpu::{Cpu68k, RegId, StackGuard};
pub use dispatch::{OpcodeFn, OpcodeTable, OpcodeTableBuilder};
pub use error::{ConfigError, PersistError, Result};
pub use flags::SpecialFlags;
pub use history::ExceptionRecord;
pub use hooks::{HookHandle, HookKind, HookRegistry, StackChange};
pub use host::{Button, ButtonEvent, EventSource, EventSourceKind, Host};
pub use persist::{MemorySessionFile, SessionFile};
pub use registers::{Registers, StatusFields};
