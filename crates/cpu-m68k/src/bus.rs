//! Memory-bank interface seen by the interpreter.
//!
//! The 68000 is big-endian. Implementors only have to provide byte access;
//! word and long accesses default to big-endian compositions of bytes and
//! can be overridden for speed.
//!
//! A memory bank reports faults (unmapped addresses, odd word accesses) by
//! latching a [`BusFault`] and handing it back from [`M68kBus::take_fault`].
//! The interpreter polls for it after each opcode fetch, each opcode and
//! each exception it takes, and routes it through the bus error or address
//! error vector before anything else runs.

/// Which group-0 exception a fault raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// No device answered the access (vector 2).
    Bus,
    /// Word or long access at an odd address (vector 3).
    Address,
}

/// A fault latched by the memory bank during an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault {
    pub kind: FaultKind,
    /// Address of the faulting access.
    pub address: u32,
    /// Access size in bytes (1, 2 or 4).
    pub size: u8,
    /// True for reads, false for writes.
    pub for_read: bool,
}

/// Bus trait for the interpreter.
pub trait M68kBus {
    /// Read a byte.
    fn read_byte(&mut self, addr: u32) -> u8;

    /// Write a byte.
    fn write_byte(&mut self, addr: u32, value: u8);

    /// Read a big-endian word.
    fn read_word(&mut self, addr: u32) -> u16 {
        let hi = self.read_byte(addr);
        let lo = self.read_byte(addr.wrapping_add(1));
        u16::from(hi) << 8 | u16::from(lo)
    }

    /// Read a big-endian long.
    fn read_long(&mut self, addr: u32) -> u32 {
        let hi = self.read_word(addr);
        let lo = self.read_word(addr.wrapping_add(2));
        u32::from(hi) << 16 | u32::from(lo)
    }

    /// Write a big-endian word.
    fn write_word(&mut self, addr: u32, value: u16) {
        self.write_byte(addr, (value >> 8) as u8);
        self.write_byte(addr.wrapping_add(1), value as u8);
    }

    /// Write a big-endian long.
    fn write_long(&mut self, addr: u32, value: u32) {
        self.write_word(addr, (value >> 16) as u16);
        self.write_word(addr.wrapping_add(2), value as u16);
    }

    /// Read a long with access checks and instrumentation disabled.
    ///
    /// Used for vector table fetches, which are not program-visible memory
    /// traffic and must not trip access-protection bookkeeping.
    fn read_long_full_access(&mut self, addr: u32) -> u32 {
        self.read_long(addr)
    }

    /// Validate a new program counter before it is installed.
    ///
    /// Called on reset, on exception dispatch and whenever the register file
    /// is replaced wholesale. The interpreter installs the address whatever
    /// this does; a bank that considers it invalid should latch a fault.
    fn check_new_pc(&mut self, _pc: u32) {}

    /// Take the fault latched since the last call, if any.
    fn take_fault(&mut self) -> Option<BusFault> {
        None
    }
}

/// Flat RAM starting at address zero, mirrored on its power-of-two size.
///
/// Accesses at or above `fault_above` (when set) latch a bus fault and read
/// back as zero, which is enough to model an unmapped region.
#[derive(Debug, Clone)]
pub struct RamBus {
    data: Vec<u8>,
    mask: u32,
    fault_above: Option<u32>,
    fault: Option<BusFault>,
}

impl RamBus {
    /// RAM of `size` bytes, rounded up to a power of two.
    #[must_use]
    pub fn new(size: usize) -> Self {
        let size = size.max(2).next_power_of_two();
        Self {
            data: vec![0; size],
            mask: (size - 1) as u32,
            fault_above: None,
            fault: None,
        }
    }

    /// Treat every address at or above `limit` as unmapped.
    #[must_use]
    pub fn with_unmapped_above(mut self, limit: u32) -> Self {
        self.fault_above = Some(limit);
        self
    }

    /// Copy `bytes` into RAM starting at `addr`.
    pub fn load(&mut self, addr: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let a = (addr.wrapping_add(i as u32) & self.mask) as usize;
            self.data[a] = b;
        }
    }

    /// Store big-endian words starting at `addr`.
    pub fn load_words(&mut self, addr: u32, words: &[u16]) {
        for (i, w) in words.iter().enumerate() {
            self.load(addr.wrapping_add(2 * i as u32), &w.to_be_bytes());
        }
    }

    /// Store a big-endian long at `addr`.
    pub fn poke_long(&mut self, addr: u32, value: u32) {
        self.load(addr, &value.to_be_bytes());
    }

    /// Read a big-endian long without side effects.
    #[must_use]
    pub fn peek_long(&self, addr: u32) -> u32 {
        u32::from_be_bytes([
            self.peek(addr),
            self.peek(addr.wrapping_add(1)),
            self.peek(addr.wrapping_add(2)),
            self.peek(addr.wrapping_add(3)),
        ])
    }

    /// Read a big-endian word without side effects.
    #[must_use]
    pub fn peek_word(&self, addr: u32) -> u16 {
        u16::from_be_bytes([self.peek(addr), self.peek(addr.wrapping_add(1))])
    }

    /// Read a byte without side effects.
    #[must_use]
    pub fn peek(&self, addr: u32) -> u8 {
        self.data[(addr & self.mask) as usize]
    }

    fn unmapped(&mut self, addr: u32, for_read: bool) -> bool {
        match self.fault_above {
            Some(limit) if addr >= limit => {
                // The first fault of an instruction wins.
                if self.fault.is_none() {
                    self.fault = Some(BusFault {
                        kind: FaultKind::Bus,
                        address: addr,
                        size: 1,
                        for_read,
                    });
                }
                true
            }
            _ => false,
        }
    }
}

impl M68kBus for RamBus {
    fn read_byte(&mut self, addr: u32) -> u8 {
        if self.unmapped(addr, true) {
            return 0;
        }
        self.data[(addr & self.mask) as usize]
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        if self.unmapped(addr, false) {
            return;
        }
        self.data[(addr & self.mask) as usize] = value;
    }

    fn take_fault(&mut self) -> Option<BusFault> {
        self.fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_and_long_access_is_big_endian() {
        let mut bus = RamBus::new(0x100);
        bus.write_long(0x10, 0x1234_5678);
        assert_eq!(bus.peek(0x10), 0x12);
        assert_eq!(bus.peek(0x13), 0x78);
        assert_eq!(bus.read_word(0x12), 0x5678);
        assert_eq!(bus.read_long_full_access(0x10), 0x1234_5678);
    }

    #[test]
    fn unmapped_access_latches_one_fault() {
        let mut bus = RamBus::new(0x1000).with_unmapped_above(0x800);
        assert_eq!(bus.read_word(0x900), 0);
        bus.write_byte(0xA00, 1);

        let fault = bus.take_fault().expect("fault latched");
        assert_eq!(fault.kind, FaultKind::Bus);
        assert_eq!(fault.address, 0x900);
        assert!(fault.for_read);
        assert_eq!(bus.take_fault(), None);
    }

    #[test]
    fn size_rounds_up_and_mirrors() {
        let mut bus = RamBus::new(3000);
        bus.write_byte(0x1000 + 5, 0xAA);
        assert_eq!(bus.peek(5), 0xAA);
    }
}
