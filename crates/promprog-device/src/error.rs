//! Error types for programmer operations

use thiserror::Error;

/// Errors raised by the protocol engine
#[derive(Debug, Error)]
pub enum Error {
    /// Operation needs a configured PROM profile
    #[error("no PROM configured; call configure() first")]
    NotConfigured,

    /// Out-of-range offset/length/mode, checked before any I/O
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// No reply byte (or short bulk read) within the link timeout
    #[error("transport timeout")]
    Timeout,

    /// Device kept answering Busy past the completion timeout
    #[error("device busy past completion timeout")]
    PollTimeout,

    /// Device did not acknowledge a command
    #[error("no acknowledge from device")]
    NoAck,

    /// Device answered with a result code the command does not allow
    #[error("unexpected reply 0x{reply:02x} to command 0x{command:02x}")]
    UnexpectedReply { command: u8, reply: u8 },

    /// Device answered with a byte outside the result-code enumeration
    #[error("invalid result byte 0x{0:02x}")]
    InvalidResultByte(u8),

    /// Manufacturer code read from the identity register does not match
    #[error("read manufacturer ID (0x{found:02x}) does not match Xilinx ID (0x{expected:02x})")]
    ManufacturerIdMismatch { expected: u8, found: u8 },

    /// Device code read from the identity register does not match the profile
    #[error("read device ID (0x{found:02x}) does not match {name} (0x{expected:02x})")]
    DeviceIdMismatch {
        name: &'static str,
        expected: u8,
        found: u8,
    },

    /// Reset-polarity word was not a consistent all-0x00 or all-0xFF
    #[error("inconsistent reset polarity readback")]
    InconsistentResetPolarity,

    /// Device reported chip-enable-out before the declared density was read
    #[error("chip enable out before end of device")]
    EarlyEndOfChip,

    /// Device never reported chip-enable-out at the declared density
    #[error("no chip enable out at end of device")]
    MissingEndOfChip,

    /// Echo test read back a byte that differs from what was written
    #[error("data mismatch at offset {offset}: wrote 0x{expected:02x}, read 0x{found:02x}")]
    DataMismatch {
        offset: usize,
        expected: u8,
        found: u8,
    },

    /// One or more chunks failed to program (continue-on-error mode)
    #[error("programming failed")]
    ProgramFailed,

    /// Serial port error
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Other I/O error during communication
    #[error("I/O error: {0}")]
    Io(String),
}

/// Result type for programmer operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            Error::Timeout
        } else {
            Error::Io(e.to_string())
        }
    }
}
