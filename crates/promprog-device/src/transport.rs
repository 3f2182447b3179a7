//! Transport layer abstraction for the programmer link
//!
//! The protocol engine only needs a byte stream that can exchange one
//! command frame for one reply byte, pull bulk reply bytes, and assert a
//! line-break condition for link resets. The production implementation is
//! a serial port; tests substitute an in-memory simulator.

use crate::error::Result;
use crate::protocol::{BAUD_RATE, LINK_TIMEOUT};

/// Byte-stream transport to the programmer
pub trait Transport {
    /// Write one frame and read back the single reply byte.
    ///
    /// Fails with [`crate::Error::Timeout`] if no reply arrives within the
    /// link timeout.
    fn send(&mut self, frame: &[u8]) -> Result<u8>;

    /// Read exactly `buf.len()` bulk reply bytes.
    ///
    /// Short reads within the link timeout are a [`crate::Error::Timeout`].
    fn receive(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Assert the line-break condition.
    ///
    /// The caller is responsible for holding it for the settle delay.
    fn assert_break(&mut self) -> Result<()>;

    /// Clear the line-break condition.
    fn clear_break(&mut self) -> Result<()>;

    /// Drop any pending input and output.
    fn discard_buffers(&mut self) -> Result<()>;
}

/// Serial port transport
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open the programmer's serial port.
    ///
    /// The link runs at 1 Mbaud, 8N1, with RTS/CTS flow control and DTR
    /// deasserted (the programmer repurposes DTR).
    pub fn open(device: &str) -> Result<Self> {
        let mut port = serialport::new(device, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::Hardware)
            .timeout(LINK_TIMEOUT)
            .open()?;

        port.write_data_terminal_ready(false)?;

        log::info!("Opened serial port {} at {} baud", device, BAUD_RATE);

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn send(&mut self, frame: &[u8]) -> Result<u8> {
        use std::io::{Read, Write};

        self.port.write_all(frame)?;
        let mut reply = [0u8];
        self.port.read_exact(&mut reply)?;
        Ok(reply[0])
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        use std::io::Read;

        self.port.read_exact(buf)?;
        Ok(())
    }

    fn assert_break(&mut self) -> Result<()> {
        self.port.set_break()?;
        Ok(())
    }

    fn clear_break(&mut self) -> Result<()> {
        self.port.clear_break()?;
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }
}
