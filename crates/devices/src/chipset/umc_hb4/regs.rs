//! UM8881 configuration registers.
//!
//! There is no public datasheet for this part. Bit meanings come from reverse engineering of
//! BIOSes that program it and may be inaccurate; the model keeps them as found.

use bitflags::bitflags;

/// Implemented bytes of configuration space.
pub const CONFIG_SPACE_LEN: usize = 0x80;

pub const VENDOR_ID: u16 = 0x1060; // UMC
pub const DEVICE_ID: u16 = 0x8881;
pub const REVISION_ID: u8 = 0x04;
/// Base class 06h (bridge), subclass 00h (host), prog-if 00h.
pub const CLASS_CODE: [u8; 3] = [0x00, 0x00, 0x06];

pub const COMMAND: u8 = 0x04;
pub const STATUS_HI: u8 = 0x07;
pub const REVISION: u8 = 0x08;
pub const LATENCY_TIMER: u8 = 0x0D;
pub const CACHE_CONTROL: u8 = 0x50;
pub const DRAM_TIMING: u8 = 0x51;
pub const HOST_PCI_POSTING: u8 = 0x52;
pub const SHADOW_LOWER: u8 = 0x54;
pub const SHADOW_UPPER: u8 = 0x55;
pub const SMRAM_CONTROL: u8 = 0x60;
pub const SCRATCH_61: u8 = 0x61;

/// Status bits software may clear by writing ones. Bits 1 and 2 (DEVSEL timing) are fixed.
pub const STATUS_HI_CLEARABLE: u8 = 0xF9;
/// DEVSEL# timing: medium.
pub const STATUS_HI_RESET: u8 = 0x02;

/// Cache size field value the model always reports (512KiB).
pub const CACHE_SIZE_FORCED: u8 = 0x04;
const CACHE_SIZE_MASK: u8 = 0x07;

/// SMRAM control value written during reset.
pub const SMRAM_CONTROL_RESET: u8 = 0x20;

/// Power-on values re-asserted by every reset, as `(offset, value)`.
///
/// Identity bytes first, then the DRAM and scratch registers BIOSes expect.
pub const RESET_DEFAULTS: &[(u8, u8)] = &[
    (0x00, VENDOR_ID as u8),
    (0x01, (VENDOR_ID >> 8) as u8),
    (0x02, DEVICE_ID as u8),
    (0x03, (DEVICE_ID >> 8) as u8),
    (STATUS_HI, STATUS_HI_RESET),
    (REVISION, REVISION_ID),
    (0x09, CLASS_CODE[0]),
    (0x0A, CLASS_CODE[1]),
    (0x0B, CLASS_CODE[2]),
    (DRAM_TIMING, 0x01),
    (HOST_PCI_POSTING, 0x01),
    (0x5A, 0x04),
    (0x5C, 0xC0),
    (0x5D, 0x20),
    (0x5F, 0xFF),
];

/// How a config write to an offset is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WritePolicy {
    /// Stored as written.
    Plain,
    /// Write-one-to-clear against [`STATUS_HI_CLEARABLE`].
    StatusClear,
    /// Cache size forced, L2 enable forwarded to the CPU.
    CacheControl,
    /// Stored, then shadow routing recomputed.
    Shadow,
    /// Stored, then the SMRAM window recomputed.
    Smram,
    /// Dropped.
    ReadOnly,
}

pub fn write_policy(offset: u8) -> WritePolicy {
    match offset {
        0x00..=0x05 => WritePolicy::Plain,
        STATUS_HI => WritePolicy::StatusClear,
        0x08..=LATENCY_TIMER => WritePolicy::Plain,
        CACHE_CONTROL => WritePolicy::CacheControl,
        0x51..=0x53 => WritePolicy::Plain,
        SHADOW_LOWER | SHADOW_UPPER => WritePolicy::Shadow,
        0x56..=0x5F => WritePolicy::Plain,
        SMRAM_CONTROL => WritePolicy::Smram,
        SCRATCH_61 => WritePolicy::Plain,
        _ => WritePolicy::ReadOnly,
    }
}

/// Status byte after software writes `value`.
pub const fn status_after_write(current: u8, value: u8) -> u8 {
    current & !(value & STATUS_HI_CLEARABLE)
}

/// Cache control byte stored for a written `value`.
pub const fn cache_control_after_write(value: u8) -> u8 {
    (value & !CACHE_SIZE_MASK) | CACHE_SIZE_FORCED
}

bitflags! {
    /// Register 54h: C0000-DFFFF shadow read enables.
    ///
    /// Bit 7 is documented by BIOS writers as a DC000-DFFFF enable, but DC000 follows D8000 in
    /// practice and the bit is not decoded.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ShadowLower: u8 {
        /// Master enable; the other bits are ignored while clear.
        const ENABLE = 1 << 0;
        const C0000 = 1 << 1;
        const C8000 = 1 << 2;
        const CC000 = 1 << 3;
        const D0000 = 1 << 4;
        const D4000 = 1 << 5;
        const D8000 = 1 << 6;
    }
}

bitflags! {
    /// Register 55h: E0000-FFFFF shadow and global write protect.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ShadowUpper: u8 {
        const WRITE_PROTECT = 1 << 6;
        const E0000 = 1 << 7;
    }
}

bitflags! {
    /// Register 60h.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SmramControl: u8 {
        /// SMRAM also reachable outside SMM.
        const LOCAL_ACCESS = 1 << 0;
        /// Data cycles go to PCI, code cycles to DRAM.
        const SPLIT_CODE_DATA = 1 << 5;
    }
}

/// L2 write policy (register 50h bit 6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CachePolicy {
    WriteThrough,
    WriteBack,
}

/// L2 burst timing (register 50h bits 5:4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheTiming {
    /// Read 3-2-2-2, write 3T.
    R3222W3,
    /// Read 3-1-1-1, write 3T.
    R3111W3,
    /// Read 2-2-2-2, write 2T.
    R2222W2,
    /// Read 2-1-1-1, write 2T.
    R2111W2,
}

/// Decoded register 50h.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheControl {
    pub enabled: bool,
    pub policy: CachePolicy,
    pub timing: CacheTiming,
    pub banks: u8,
    /// L2 size in KiB; zero means no cache fitted.
    pub size_kib: u32,
}

impl CacheControl {
    pub const fn from_register(reg: u8) -> Self {
        let size_sel = reg & CACHE_SIZE_MASK;
        let size_kib = if size_sel == 0 {
            0
        } else {
            let kib = 64u32 << (size_sel - 1);
            if kib > 2048 {
                2048
            } else {
                kib
            }
        };
        Self {
            enabled: reg & 0x80 != 0,
            policy: if reg & 0x40 != 0 {
                CachePolicy::WriteBack
            } else {
                CachePolicy::WriteThrough
            },
            timing: match (reg >> 4) & 0x3 {
                0 => CacheTiming::R3222W3,
                1 => CacheTiming::R3111W3,
                2 => CacheTiming::R2222W2,
                _ => CacheTiming::R2111W2,
            },
            banks: if reg & 0x08 != 0 { 2 } else { 1 },
            size_kib,
        }
    }
}
