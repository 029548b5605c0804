#![forbid(unsafe_code)]

pub mod a20_gate;
pub mod chipset;
pub mod pci;

pub use chipset::umc_hb4::{Hb4Config, Hb4Runtime, UmcHb4};
