//! UMC UM8881 ("HB4") host bridge model.
//!
//! The device model lives in [`hb4_devices`]; the platform collaborators it drives (memory
//! routing, SMRAM, CPU cache control, port I/O and reset plumbing) live in [`hb4_platform`].

pub use hb4_devices as devices;
pub use hb4_platform as platform;

pub use hb4_devices::{Hb4Config, Hb4Runtime, UmcHb4};
