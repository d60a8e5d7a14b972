//! Abstract CPU cycle counts.

/// A count of abstract CPU cycles.
///
/// Cycles are a pacing unit for the outer scheduler, not a bus-accurate
/// timing model. The counter is 32 bits wide and wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cycles(pub u32);

impl Cycles {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn new(count: u32) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Cycles elapsed since `earlier`, accounting for one wrap.
    #[must_use]
    pub const fn since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl core::ops::Add<u32> for Cycles {
    type Output = Self;

    fn add(self, rhs: u32) -> Self {
        Self(self.0.wrapping_add(rhs))
    }
}

impl core::ops::AddAssign<u32> for Cycles {
    fn add_assign(&mut self, rhs: u32) {
        self.0 = self.0.wrapping_add(rhs);
    }
}

impl From<Cycles> for u32 {
    fn from(c: Cycles) -> Self {
        c.0
    }
}

#[cfg(test)]
mod tests {
    use super::Cycles;

    #[test]
    fn add_wraps_at_32_bits() {
        let mut c = Cycles::new(u32::MAX - 1);
        c += 3;
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn since_spans_a_wrap() {
        let earlier = Cycles::new(u32::MAX - 9);
        let later = earlier + 20;
        assert_eq!(later.since(earlier), 20);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_as_plain_number() {
        let json = serde_json::to_string(&Cycles::new(1234)).unwrap();
        assert_eq!(json, "1234");
    }
}
