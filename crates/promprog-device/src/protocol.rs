//! Wire protocol constants and frame codec
//!
//! Command frames are exactly 6 bytes: a start-of-frame marker, the command
//! code and four argument bytes. Data frames replace the last two argument
//! bytes with a little-endian payload length and append the raw payload.
//! The device answers every frame with a single result byte; bulk replies
//! are raw bytes with no framing or checksum.

use crate::error::{Error, Result};
use promprog_core::PromProfile;
use std::fmt;
use std::time::Duration;

/// Start-of-frame marker
pub const SOF: u8 = 0x1B;

/// Size of the programmer's on-board staging buffer in bytes
pub const BUFFER_SIZE: usize = 4096;
/// Buffer addressing granularity in bytes; command offsets count these steps
pub const OFFSET_STEP: usize = 256;
/// Hardware counter ticks per microsecond
pub const TICKS_PER_USEC: u32 = 12;

/// Serial link speed
pub const BAUD_RATE: u32 = 1_000_000;
/// Per-read/write link timeout
pub const LINK_TIMEOUT: Duration = Duration::from_millis(1000);
/// Wall-clock limit for one busy-poll loop, measured from the first poll
pub const POLL_TIMEOUT: Duration = Duration::from_millis(1000);
/// Hold/settle time around a line-break during link reset
pub const BREAK_SETTLE: Duration = Duration::from_millis(10);

/// Command codes understood by the programmer firmware
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ReadBuffer = 0x01,
    WriteBuffer = 0x81,
    Poll = 0x02,
    TestEcho = 0x03,
    TestVoltage = 0x04,
    ConfigProm = 0x05,
    QueryInfo = 0x06,
    PowerOff = 0x07,
    PowerOnRead = 0x08,
    PowerOnVerify = 0x09,
    PowerOnProg = 0x0A,
    Read = 0x0B,
    ProgIncrement = 0x0C,
    ProgVerify = 0x0D,
    ProgStart = 0x0E,
}

/// Single-byte result codes
///
/// These are the only values the device may return; any other byte is a
/// protocol violation surfaced as [`Error::InvalidResultByte`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// Command completed
    Ack,
    /// Command rejected or failed
    Nack,
    /// Bulk payload follows
    Data,
    /// Async operation started; poll for completion
    Async,
    /// Async operation still running; poll again
    Busy,
    /// Chip-enable-out reached: last addressable bit of the device
    Ceo,
    /// Chip-enable-out reached before the expected amount of data
    EarlyCeo,
}

impl ResultCode {
    /// Decode a reply byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x06 => Ok(ResultCode::Ack),
            0x15 => Ok(ResultCode::Nack),
            0x1A => Ok(ResultCode::Data),
            0x16 => Ok(ResultCode::Async),
            0x07 => Ok(ResultCode::Busy),
            0x04 => Ok(ResultCode::Ceo),
            0x14 => Ok(ResultCode::EarlyCeo),
            other => Err(Error::InvalidResultByte(other)),
        }
    }

    /// Wire encoding of this result code
    pub fn to_byte(self) -> u8 {
        match self {
            ResultCode::Ack => 0x06,
            ResultCode::Nack => 0x15,
            ResultCode::Data => 0x1A,
            ResultCode::Async => 0x16,
            ResultCode::Busy => 0x07,
            ResultCode::Ceo => 0x04,
            ResultCode::EarlyCeo => 0x14,
        }
    }
}

/// Build a 6-byte command frame
pub fn command_frame(cmd: Command, args: [u8; 4]) -> [u8; 6] {
    [SOF, cmd as u8, args[0], args[1], args[2], args[3]]
}

/// Build a data frame: command frame with a little-endian length in the
/// last two argument bytes, followed by the payload.
///
/// The caller validates the payload length against the buffer size.
pub fn data_frame(cmd: Command, a0: u8, a1: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(6 + payload.len());
    frame.extend_from_slice(&[
        SOF,
        cmd as u8,
        a0,
        a1,
        payload.len() as u8,
        (payload.len() >> 8) as u8,
    ]);
    frame.extend_from_slice(payload);
    frame
}

/// Pack a PROM profile into the four ConfigProm argument bytes.
///
/// The three electrical flags occupy bits 0..2 of the first byte. Each
/// pulse duration is converted to 12 MHz ticks with the five least
/// significant bits discarded (the hardware counter's resolution), then
/// the resulting 11/9/11-bit values are packed at fixed overlapping bit
/// offsets. This layout must match the firmware bit-for-bit.
pub fn pack_prom_config(prom: &PromProfile) -> [u8; 4] {
    let tpgm = (prom.prog_pulse_us * TICKS_PER_USEC) >> 5;
    let tpgm1 = (prom.prog_retry_pulse_us * TICKS_PER_USEC) >> 5;
    let tprst = (prom.prog_reset_pulse_us * TICKS_PER_USEC) >> 5;

    let a0 = (prom.flags.bits() & 0x07) | ((tpgm & 0x01F) << 3) as u8;
    let a1 = ((tpgm & 0x1E0) >> 5) as u8 | ((tpgm1 & 0x00F) << 4) as u8;
    let a2 = ((tpgm1 & 0x1F0) >> 4) as u8 | ((tprst & 0x007) << 5) as u8;
    let a3 = ((tprst & 0x7F8) >> 3) as u8;

    [a0, a1, a2, a3]
}

/// Supply/programming-voltage states selectable with the voltage test
/// command. Never use these with a PROM in the socket.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageMode {
    Off = 0,
    VccGnd = 1,
    Vcc3V3 = 2,
    Vcc5V = 3,
    VppGnd = 4,
    VppGndWeak = 5,
    Vpp3V3 = 6,
    Vpp3V7 = 7,
    Vpp5V = 8,
    Vpp5V4 = 9,
    Vpp12V25 = 10,
    Vpp12V25Weak = 11,
}

/// Voltage mode lookup table, in wire-value order
const VOLTAGE_MODES: &[(&str, VoltageMode)] = &[
    ("off", VoltageMode::Off),
    ("vcc-gnd", VoltageMode::VccGnd),
    ("vcc-3v3", VoltageMode::Vcc3V3),
    ("vcc-5v", VoltageMode::Vcc5V),
    ("vpp-gnd", VoltageMode::VppGnd),
    ("vpp-gnd-weak", VoltageMode::VppGndWeak),
    ("vpp-3v3", VoltageMode::Vpp3V3),
    ("vpp-3v7", VoltageMode::Vpp3V7),
    ("vpp-5v", VoltageMode::Vpp5V),
    ("vpp-5v4", VoltageMode::Vpp5V4),
    ("vpp-12v25", VoltageMode::Vpp12V25),
    ("vpp-12v25-weak", VoltageMode::Vpp12V25Weak),
];

impl VoltageMode {
    /// Parse a voltage mode name (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        VOLTAGE_MODES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, mode)| *mode)
    }

    /// Decode a raw mode value
    pub fn from_value(v: u8) -> Option<Self> {
        VOLTAGE_MODES.iter().map(|(_, mode)| *mode).find(|m| *m as u8 == v)
    }

    /// Canonical mode name
    pub fn name(self) -> &'static str {
        VOLTAGE_MODES
            .iter()
            .find(|(_, mode)| *mode == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    /// All mode names, for help text
    pub fn names() -> impl Iterator<Item = &'static str> {
        VOLTAGE_MODES.iter().map(|(name, _)| *name)
    }
}

impl fmt::Display for VoltageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hardware type tag reported by the info query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwType {
    PromProgrammer,
    PromProgrammerHx8k,
    Unknown,
}

impl HwType {
    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => HwType::PromProgrammer,
            2 => HwType::PromProgrammerHx8k,
            _ => HwType::Unknown,
        }
    }
}

impl fmt::Display for HwType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwType::PromProgrammer => write!(f, "XC17xxx PROM Programmer"),
            HwType::PromProgrammerHx8k => {
                write!(f, "XC17xxx PROM Programmer with HX8K Breakout Board")
            }
            HwType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Version/capability word reported by the programmer
///
/// Fields are populated conditionally on the leading format-version byte;
/// firmware too old to report a field leaves it `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgrammerInfo {
    /// HDL (firmware gateware) version
    pub hdl_version: Option<u8>,
    /// Hardware revision
    pub hw_version: Option<u8>,
    /// Hardware type
    pub hw_type: HwType,
}

impl ProgrammerInfo {
    /// Decode the 4-byte info word
    pub fn decode(word: [u8; 4]) -> Self {
        Self {
            hdl_version: (word[0] >= 2).then_some(word[1]),
            hw_version: (word[0] >= 3).then_some(word[2]),
            hw_type: if word[0] >= 4 {
                HwType::from_tag(word[3])
            } else {
                HwType::Unknown
            },
        }
    }
}
