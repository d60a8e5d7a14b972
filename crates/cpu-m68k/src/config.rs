//! Engine configuration.

use crate::error::ConfigError;

/// Largest history ring the engine will allocate.
pub const MAX_HISTORY: usize = 1 << 16;

/// Tunables for one [`Cpu68k`](crate::Cpu68k).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Where the reset SSP and PC are read from on a hardware reset.
    pub rom_base: u32,
    /// Slow housekeeping runs every `slow_cycle_mask + 1` instructions.
    pub slow_cycle_mask: u32,
    /// Cycles charged per STOP idle tick.
    pub idle_tick_cycles: u32,
    /// Register snapshots kept, newest first. Zero disables.
    pub register_history: usize,
    /// Exception records kept, newest first. Zero disables.
    pub exception_history: usize,
    /// Warn when one `execute` call runs longer than this.
    pub dead_man_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rom_base: 0x10C0_0000,
            slow_cycle_mask: 0x7FFF,
            idle_tick_cycles: 0,
            register_history: 0,
            exception_history: 0,
            dead_man_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slow_cycle_mask.checked_add(1).is_some_and(|n| !n.is_power_of_two()) {
            return Err(ConfigError::SlowCycleMask(self.slow_cycle_mask));
        }
        for capacity in [self.register_history, self.exception_history] {
            if capacity > MAX_HISTORY {
                return Err(ConfigError::HistoryCapacity(capacity));
            }
        }
        Ok(())
    }
}
