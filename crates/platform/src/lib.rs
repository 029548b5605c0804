#![forbid(unsafe_code)]

//! Platform-side collaborators used by the HB4 chipset model.
//!
//! Device models talk to the rest of the machine through the traits in this crate
//! ([`memory::MemoryRouting`], [`smram::SmramController`], [`cpu::CpuCacheControl`]). Each trait
//! ships with a small cloneable in-tree implementation so machines and tests can observe the
//! routing decisions a device made.

pub mod chipset;
pub mod cpu;
pub mod io;
pub mod memory;
pub mod reset;
pub mod smram;

pub use memory::MemoryRange;
