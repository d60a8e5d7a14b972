//! The 68000 register file.
//!
//! - D0-D7: 8 data registers (32-bit)
//! - A0-A7: 8 address registers (32-bit, A7 is the active stack pointer)
//! - USP / ISP: the parked user and interrupt (supervisor) stack pointers
//! - PC: Program counter
//! - SR: Status register, kept both packed and broken out
//!
//! The broken-out [`StatusFields`] are authoritative while instructions run.
//! The packed `sr` word is only brought up to date on demand, via
//! [`Registers::update_sr_from_fields`], whenever something needs all
//! sixteen bits at once (exception frames, register snapshots, MOVE from SR).

use crate::flags::{self, SpecialFlags};

/// The status register with every modeled field broken out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFields {
    /// Trace on every instruction.
    pub t1: bool,
    /// Trace on change of flow.
    pub t0: bool,
    /// Supervisor state.
    pub s: bool,
    /// Master/interrupt state.
    pub m: bool,
    /// Interrupt mask level (0-7).
    pub intmask: u8,
    pub x: bool,
    pub n: bool,
    pub z: bool,
    pub v: bool,
    pub c: bool,
}

impl StatusFields {
    /// Break a packed status word into fields. Unmodeled bits are dropped.
    #[must_use]
    pub const fn from_sr(sr: u16) -> Self {
        Self {
            t1: sr & flags::T1 != 0,
            t0: sr & flags::T0 != 0,
            s: sr & flags::S != 0,
            m: sr & flags::M != 0,
            intmask: ((sr & flags::INT_MASK) >> flags::INT_MASK_SHIFT) as u8,
            x: sr & flags::X != 0,
            n: sr & flags::N != 0,
            z: sr & flags::Z != 0,
            v: sr & flags::V != 0,
            c: sr & flags::C != 0,
        }
    }

    /// Pack the fields into a status word.
    #[must_use]
    pub const fn to_sr(self) -> u16 {
        let mut sr = ((self.intmask & 0x07) as u16) << flags::INT_MASK_SHIFT;
        if self.t1 {
            sr |= flags::T1;
        }
        if self.t0 {
            sr |= flags::T0;
        }
        if self.s {
            sr |= flags::S;
        }
        if self.m {
            sr |= flags::M;
        }
        if self.x {
            sr |= flags::X;
        }
        if self.n {
            sr |= flags::N;
        }
        if self.z {
            sr |= flags::Z;
        }
        if self.v {
            sr |= flags::V;
        }
        if self.c {
            sr |= flags::C;
        }
        sr
    }

    /// The condition code register (low byte of SR).
    #[must_use]
    pub const fn ccr(self) -> u8 {
        (self.to_sr() & flags::CCR_MASK) as u8
    }
}

/// 68000 register file plus the interpreter's special-condition word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Data registers D0-D7.
    pub d: [u32; 8],
    /// Address registers A0-A7. A7 is whichever stack is active.
    pub a: [u32; 8],
    /// User stack pointer, valid while in supervisor mode.
    pub usp: u32,
    /// Interrupt (supervisor) stack pointer, valid while in user mode.
    pub isp: u32,
    /// Program counter.
    pub pc: u32,
    /// Packed status register. May lag behind `status`.
    pub sr: u16,
    /// Broken-out status register.
    pub status: StatusFields,
    /// The CPU executed STOP and has not been woken yet.
    pub stopped: bool,
    /// Vector base register.
    pub vbr: u32,
    /// Source function code register.
    pub sfc: u32,
    /// Destination function code register.
    pub dfc: u32,
    /// FPU control register placeholder.
    pub fpcr: u32,
    /// FPU status register placeholder.
    pub fpsr: u32,
    /// FPU instruction address register placeholder.
    pub fpiar: u32,
    /// Pending special conditions.
    pub spcflags: SpecialFlags,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Registers in the post-reset state: supervisor mode, mask level 7.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            d: [0; 8],
            a: [0; 8],
            usp: 0,
            isp: 0,
            pc: 0,
            sr: 0x2700,
            status: StatusFields::from_sr(0x2700),
            stopped: false,
            vbr: 0,
            sfc: 0,
            dfc: 0,
            fpcr: 0,
            fpsr: 0,
            fpiar: 0,
            spcflags: SpecialFlags::empty(),
        }
    }

    /// The active stack pointer (A7).
    #[must_use]
    pub const fn sp(&self) -> u32 {
        self.a[7]
    }

    pub fn set_sp(&mut self, value: u32) {
        self.a[7] = value;
    }

    #[must_use]
    pub const fn is_supervisor(&self) -> bool {
        self.status.s
    }

    #[must_use]
    pub const fn interrupt_mask(&self) -> u8 {
        self.status.intmask
    }

    pub fn set_interrupt_mask(&mut self, level: u8) {
        self.status.intmask = level & 0x07;
    }

    /// The user stack pointer, wherever it currently lives.
    #[must_use]
    pub const fn user_sp(&self) -> u32 {
        if self.status.s { self.usp } else { self.a[7] }
    }

    /// The supervisor stack pointer, wherever it currently lives.
    #[must_use]
    pub const fn supervisor_sp(&self) -> u32 {
        if self.status.s { self.a[7] } else { self.isp }
    }

    pub fn set_user_sp(&mut self, value: u32) {
        if self.status.s {
            self.usp = value;
        } else {
            self.a[7] = value;
        }
    }

    pub fn set_supervisor_sp(&mut self, value: u32) {
        if self.status.s {
            self.a[7] = value;
        } else {
            self.isp = value;
        }
    }

    /// Switch to supervisor mode, parking the user stack pointer.
    ///
    /// Does nothing if already in supervisor mode.
    pub fn enter_supervisor(&mut self) {
        if !self.status.s {
            self.usp = self.a[7];
            self.a[7] = self.isp;
            self.status.s = true;
        }
    }

    /// Repack `sr` from the broken-out fields.
    pub fn update_sr_from_fields(&mut self) {
        self.sr = self.status.to_sr();
    }

    /// Re-expand `sr` into the broken-out fields.
    ///
    /// A change of S swaps A7 with the parked stack pointer. The interrupt
    /// mask may have dropped, so INT is always raised. TRACE follows T1/T0.
    pub fn update_fields_from_sr(&mut self) {
        let was_supervisor = self.status.s;
        self.status = StatusFields::from_sr(self.sr);

        if was_supervisor != self.status.s {
            if was_supervisor {
                self.isp = self.a[7];
                self.a[7] = self.usp;
            } else {
                self.usp = self.a[7];
                self.a[7] = self.isp;
            }
        }

        self.spcflags.insert(SpecialFlags::INT);

        if self.status.t1 || self.status.t0 {
            self.spcflags.insert(SpecialFlags::TRACE);
        } else {
            self.spcflags
                .remove(SpecialFlags::TRACE | SpecialFlags::DOTRACE);
        }
    }

    /// Reserve `bytes` on the active stack, returning the new A7.
    pub fn reserve_stack(&mut self, bytes: u32) -> u32 {
        let sp = self.a[7].wrapping_sub(bytes);
        self.a[7] = sp;
        sp
    }

    /// Release `bytes` from the active stack, returning the old A7.
    pub fn release_stack(&mut self, bytes: u32) -> u32 {
        let sp = self.a[7];
        self.a[7] = sp.wrapping_add(bytes);
        sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fields() -> impl Strategy<Value = StatusFields> {
        (
            any::<[bool; 9]>(),
            0u8..8,
        )
            .prop_map(|(b, intmask)| StatusFields {
                t1: b[0],
                t0: b[1],
                s: b[2],
                m: b[3],
                intmask,
                x: b[4],
                n: b[5],
                z: b[6],
                v: b[7],
                c: b[8],
            })
    }

    proptest! {
        #[test]
        fn pack_of_unpack_keeps_modeled_bits(sr in any::<u16>()) {
            prop_assert_eq!(StatusFields::from_sr(sr).to_sr(), sr & flags::SR_MASK);
        }

        #[test]
        fn unpack_of_pack_is_identity(f in fields()) {
            prop_assert_eq!(StatusFields::from_sr(f.to_sr()), f);
        }
    }

    #[test]
    fn reset_state_is_supervisor_with_all_interrupts_masked() {
        let regs = Registers::new();
        assert!(regs.is_supervisor());
        assert_eq!(regs.interrupt_mask(), 7);
        assert_eq!(regs.status.to_sr(), regs.sr);
    }

    #[test]
    fn leaving_supervisor_swaps_stacks() {
        let mut regs = Registers::new();
        regs.a[7] = 0x1000;
        regs.usp = 0x8000;
        regs.sr = 0x0000;
        regs.update_fields_from_sr();

        assert_eq!(regs.a[7], 0x8000);
        assert_eq!(regs.isp, 0x1000);
        assert_eq!(regs.user_sp(), 0x8000);
        assert_eq!(regs.supervisor_sp(), 0x1000);

        regs.enter_supervisor();
        assert_eq!(regs.a[7], 0x1000);
        assert_eq!(regs.usp, 0x8000);
    }

    #[test]
    fn unpacking_raises_int_and_follows_trace_bits() {
        let mut regs = Registers::new();
        regs.sr = 0xA700;
        regs.update_fields_from_sr();
        assert!(regs.spcflags.contains(SpecialFlags::INT | SpecialFlags::TRACE));

        regs.spcflags.insert(SpecialFlags::DOTRACE);
        regs.sr = 0x2700;
        regs.update_fields_from_sr();
        assert!(!regs.spcflags.intersects(SpecialFlags::TRACE | SpecialFlags::DOTRACE));
    }

    #[test]
    fn ccr_is_the_low_five_bits() {
        let f = StatusFields::from_sr(0x271F);
        assert_eq!(f.ccr(), 0x1F);
    }
}
