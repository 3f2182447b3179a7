//! PROM profile records and the static model table
//!
//! One record per supported chip model, keyed by the lowercase model name
//! the user passes on the command line. Several models ship under two
//! names (e.g. XC1765X aka XC1765EL); those get one table entry per alias
//! pointing at identical parameters.

use bitflags::bitflags;

/// JEDEC-style manufacturer code read back from the identity shift register
/// (after per-byte bit reversal).
pub const XILINX_MANUFACTURER_ID: u8 = 0xC9;

bitflags! {
    /// Electrical-mode flags of a PROM model.
    ///
    /// The bit values are the wire encoding: they land verbatim in the low
    /// three bits of the first ConfigProm argument byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PromFlags: u8 {
        /// Device runs from a 5V supply (VCC).
        const VCC_5V = 0x01;
        /// Device programs with a 5V programming voltage (VPP).
        const VPP_5V = 0x02;
        /// Device shifts 64-bit words instead of 32-bit words.
        const WORD_64BIT = 0x04;
    }
}

/// Immutable electrical/timing profile of one PROM model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromProfile {
    /// Display name (datasheet designation).
    pub name: &'static str,
    /// 8-bit device identity code.
    pub code: u8,
    /// Electrical-mode flags.
    pub flags: PromFlags,
    /// Total programmable bits.
    pub density_bits: u32,
    /// Clock pulses from reset to the identity word.
    pub clock_to_id: u32,
    /// Clock pulses from reset to the reset-polarity word.
    pub clock_to_reset: u32,
    /// Programming pulse duration in microseconds.
    pub prog_pulse_us: u32,
    /// Retry programming pulse duration in microseconds (0 = no retry).
    pub prog_retry_pulse_us: u32,
    /// Post-program reset pulse duration in microseconds.
    pub prog_reset_pulse_us: u32,
}

impl PromProfile {
    #[allow(clippy::too_many_arguments)]
    const fn new(
        name: &'static str,
        code: u8,
        vcc_5v: bool,
        vpp_5v: bool,
        word_64bit: bool,
        density_bits: u32,
        clock_to_id: u32,
        clock_to_reset: u32,
        prog_pulse_us: u32,
        prog_retry_pulse_us: u32,
        prog_reset_pulse_us: u32,
    ) -> Self {
        let mut bits = 0;
        if vcc_5v {
            bits |= PromFlags::VCC_5V.bits();
        }
        if vpp_5v {
            bits |= PromFlags::VPP_5V.bits();
        }
        if word_64bit {
            bits |= PromFlags::WORD_64BIT.bits();
        }
        Self {
            name,
            code,
            flags: PromFlags::from_bits_retain(bits),
            density_bits,
            clock_to_id,
            clock_to_reset,
            prog_pulse_us,
            prog_retry_pulse_us,
            prog_reset_pulse_us,
        }
    }

    /// Image length in bytes: `ceil(density_bits / 8)`.
    pub const fn byte_len(&self) -> usize {
        (self.density_bits as usize + 7) / 8
    }

    /// Shift-word width in bytes (8 for 64-bit parts, 4 otherwise).
    pub fn word_width(&self) -> usize {
        if self.flags.contains(PromFlags::WORD_64BIT) {
            8
        } else {
            4
        }
    }
}

/// All supported models, keyed by the lookup alias.
#[rustfmt::skip]
pub const PROMS: &[(&str, PromProfile)] = &[
    /*             name                      code  5V     5Vprog 64bit  density  id     reset  tpgm  tpgm1 tprst */
    ("xc1736e",    PromProfile::new("XC1736E",                0xED, true,  true,  false,   36288,  2056,  2048, 1000,   0, 5000)),
    ("xc1765e",    PromProfile::new("XC1765E",                0xFD, true,  true,  false,   65536,  2056,  2048, 1000,   0, 5000)),
    ("xc1765x",    PromProfile::new("XC1765X aka XC1765EL",   0xFC, false, true,  false,   65536,  2056,  2048, 1000,   0, 5000)),
    ("xc1765el",   PromProfile::new("XC1765X aka XC1765EL",   0xFC, false, true,  false,   65536,  2056,  2048, 1000,   0, 5000)),
    ("xc17128e",   PromProfile::new("XC17128E",               0x8D, true,  true,  true,   131072,  4600,  4104, 1000,   0, 5000)),
    ("xc17128x",   PromProfile::new("XC17128X aka XC17128EL", 0x8C, false, true,  true,   131072,  4600,  4104, 1000,   0, 5000)),
    ("xc17128el",  PromProfile::new("XC17128X aka XC17128EL", 0x8C, false, true,  true,   131072,  4600,  4104, 1000,   0, 5000)),
    ("xc17256e",   PromProfile::new("XC17256E",               0xAD, true,  true,  true,   262144,  4600,  4104, 1000,   0, 5000)),
    ("xc17256x",   PromProfile::new("XC17256X aka XC17256EL", 0xAC, false, true,  true,   262144,  4600,  4104, 1000,   0, 5000)),
    ("xc17256el",  PromProfile::new("XC17256X aka XC17256EL", 0xAC, false, true,  true,   262144,  4600,  4104, 1000,   0, 5000)),
    ("xc17s05",    PromProfile::new("XC17S05",                0xF8, true,  true,  false,   65536,  2056,  2048,  102, 502, 5000)),
    ("xc17s05xl",  PromProfile::new("XC17S05XL",              0x87, false, true,  true,   131072,  4600,  4104,  102, 502, 5000)),
    ("xc17s10",    PromProfile::new("XC17S10",                0x88, true,  true,  true,   131072,  4600,  4104,  102, 502, 5000)),
    ("xc17s10xl",  PromProfile::new("XC17S10XL",              0x89, false, true,  true,   131072,  4600,  4104,  102, 502, 5000)),
    ("xc17s20",    PromProfile::new("XC17S20",                0xA8, true,  true,  true,   262144,  4600,  4104,  102, 502, 5000)),
    ("xc17s20xl",  PromProfile::new("XC17S20XL",              0xA9, false, true,  true,   262144,  4600,  4104,  102, 502, 5000)),
    ("xc17s30",    PromProfile::new("XC17S30",                0xA6, true,  true,  true,   262144,  4600,  4104,  102, 502, 5000)),
    ("xc17s30xl",  PromProfile::new("XC17S30XL",              0xA7, false, true,  true,   262144,  4600,  4104,  102, 502, 5000)),
    ("xc17s40",    PromProfile::new("XC17S40",                0x98, true,  true,  true,   524288, 19791, 16384,  102, 502, 5000)),
    ("xc17s40xl",  PromProfile::new("XC17S40XL",              0x99, false, true,  true,   524288, 19791, 16384,  102, 502, 5000)),
    ("xc17s50xl",  PromProfile::new("XC17S50XL",              0xD6, false, true,  true,  1048576, 19791, 16384,  102, 502, 5000)),
    ("xc17s100xl", PromProfile::new("XC17S100XL",             0xD7, false, true,  true,  1048576, 19791, 16384,  102, 502, 5000)),
    ("xc17s150xl", PromProfile::new("XC17S150XL",             0xD9, false, true,  true,  1048576, 19791, 16384,  102, 502, 5000)),
    ("xc17512l",   PromProfile::new("XC17512L",               0x9B, false, true,  true,   524288, 19791, 16384,  102, 502, 5000)),
    ("xc1701",     PromProfile::new("XC1701",                 0xDA, true,  true,  true,  1048576, 19791, 16384,  102, 502, 5000)),
    ("xc1701l",    PromProfile::new("XC1701L",                0xDB, false, true,  true,  1048576, 19791, 16384,  102, 502, 5000)),
    ("xc1702l",    PromProfile::new("XC1702L",                0x3B, false, false, true,  2097152, 65632, 65536,  102, 200,  400)),
    ("xc1704l",    PromProfile::new("XC1704L",                0xBB, false, false, true,  4194304, 65632, 65536,  102, 200,  400)),
];

/// Look up a profile by model name (case-insensitive).
pub fn find_prom(name: &str) -> Option<&'static PromProfile> {
    PROMS
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, profile)| profile)
}

/// Iterate over all lookup aliases, in table order.
pub fn prom_names() -> impl Iterator<Item = &'static str> {
    PROMS.iter().map(|(alias, _)| *alias)
}
