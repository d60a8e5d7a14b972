//! Status register bits and the interpreter's special-condition flags.
//!
//! The status register is 16 bits:
//! - Bits 0-4: Condition code register (CCR)
//!   - C (bit 0): Carry
//!   - V (bit 1): Overflow
//!   - Z (bit 2): Zero
//!   - N (bit 3): Negative
//!   - X (bit 4): Extend
//! - Bits 8-10: Interrupt mask (I0, I1, I2)
//! - Bit 12: Master/interrupt state (M)
//! - Bit 13: Supervisor mode (S)
//! - Bit 14: Trace on change of flow (T0)
//! - Bit 15: Trace on every instruction (T1)
//!
//! Bits 5-7 and 11 are not modeled and always read back as zero.

use bitflags::bitflags;

/// Carry flag.
pub const C: u16 = 0x0001;
/// Overflow flag.
pub const V: u16 = 0x0002;
/// Zero flag.
pub const Z: u16 = 0x0004;
/// Negative flag.
pub const N: u16 = 0x0008;
/// Extend flag.
pub const X: u16 = 0x0010;

/// Interrupt mask field (bits 8-10).
pub const INT_MASK: u16 = 0x0700;
/// Shift of the interrupt mask field.
pub const INT_MASK_SHIFT: u16 = 8;

/// Master/interrupt state flag.
pub const M: u16 = 0x1000;
/// Supervisor mode flag.
pub const S: u16 = 0x2000;
/// Trace on change of flow.
pub const T0: u16 = 0x4000;
/// Trace on every instruction.
pub const T1: u16 = 0x8000;

/// Mask for condition codes only (bits 0-4).
pub const CCR_MASK: u16 = 0x001F;
/// Every bit the register file models.
pub const SR_MASK: u16 = T1 | T0 | S | M | INT_MASK | CCR_MASK;

bitflags! {
    /// Out-of-band conditions that pull the interpreter off its fast path.
    ///
    /// The loop only looks at individual bits once the whole word is
    /// non-zero, so setting any flag guarantees a special-condition pass
    /// before the next fetch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpecialFlags: u32 {
        /// A STOP instruction executed; idle until an interrupt.
        const STOP = 0x0000_0002;
        /// The interrupt level may have changed; check on the next pass.
        const INT = 0x0000_0008;
        /// Leave the execute loop as soon as the current opcode finishes.
        const BRK = 0x0000_0010;
        /// Trace mode is armed.
        const TRACE = 0x0000_0040;
        /// Take the trace exception now.
        const DOTRACE = 0x0000_0080;
        /// Service a pending interrupt now.
        const DOINT = 0x0000_0100;
        /// The host asked for an end-of-cycle callback.
        const END_OF_CYCLE = 0x4000_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sr_mask_covers_exactly_the_modeled_bits() {
        assert_eq!(SR_MASK, 0xF71F);
        assert_eq!(SR_MASK & 0x00E0, 0);
        assert_eq!(SR_MASK & 0x0800, 0);
    }

    #[test]
    fn special_flags_match_hardware_word_layout() {
        assert_eq!(SpecialFlags::STOP.bits(), 2);
        assert_eq!(SpecialFlags::DOINT.bits(), 0x100);
        assert!(SpecialFlags::default().is_empty());
        let pending = SpecialFlags::INT | SpecialFlags::DOINT;
        assert!(pending.intersects(SpecialFlags::INT));
        assert!(!pending.contains(SpecialFlags::STOP));
    }
}
