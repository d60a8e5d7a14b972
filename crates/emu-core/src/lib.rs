//! Host-side primitives shared by emulated devices.
//!
//! The emulated machine runs on a host that owns wall-clock time. Devices
//! never read the host clock directly; they go through [`HostClock`] so a
//! test harness can drive time by hand.

mod clock;
mod cycles;

pub use clock::{HostClock, SystemClock};
pub use cycles::Cycles;
