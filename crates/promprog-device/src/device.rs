//! PROM programmer session
//!
//! `PromProgrammer` owns the transport for its lifetime and layers the
//! synchronous command/response channel, the busy-poll completion loop and
//! the double-buffered streaming operations on top of it. All operations
//! are blocking; the only concurrency in this system is between the host's
//! serial I/O and the device's electrical execution.
//!
//! Every public operation that applies power performs the full
//! power-on -> work -> power-off bracket itself; power is never left
//! applied between calls. If an error escapes a powered section, the
//! session makes one best-effort attempt to reset the link and switch the
//! power off before propagating the original error.

use std::io::{Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use promprog_core::{PromProfile, XILINX_MANUFACTURER_ID};

use crate::buffer::{check_buffer_range, Chunk, Chunks};
use crate::error::{Error, Result};
use crate::protocol::{
    command_frame, data_frame, pack_prom_config, Command, ProgrammerInfo, ResultCode, VoltageMode,
    BREAK_SETTLE, BUFFER_SIZE, POLL_TIMEOUT,
};
use crate::transport::Transport;

/// Power applied to the PROM socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    /// Normal read supply
    Read,
    /// Reduced-margin verify supply
    Verify,
    /// Programming supply
    Prog,
}

/// A session with one XC17xxx PROM programmer
pub struct PromProgrammer<T: Transport> {
    transport: T,
    prom: Option<PromProfile>,
    power: PowerState,
    poll_timeout: Duration,
}

impl<T: Transport> PromProgrammer<T> {
    /// Create a session over an open transport.
    ///
    /// Resets the link and resynchronizes framing before returning.
    pub fn new(transport: T) -> Result<Self> {
        let mut prog = Self {
            transport,
            prom: None,
            power: PowerState::Off,
            poll_timeout: POLL_TIMEOUT,
        };
        prog.reset_link()?;
        Ok(prog)
    }

    /// Reset the serial link: hold a break, flush both directions on each
    /// edge, then issue one non-acknowledged poll to resynchronize framing.
    pub fn reset_link(&mut self) -> Result<()> {
        self.transport.assert_break()?;
        thread::sleep(BREAK_SETTLE);
        self.transport.discard_buffers()?;
        self.transport.clear_break()?;
        thread::sleep(BREAK_SETTLE);
        self.transport.discard_buffers()?;
        self.poll_until_ready(false)?;
        log::debug!("Link reset complete");
        Ok(())
    }

    /// Currently configured PROM profile, if any
    pub fn prom(&self) -> Option<&PromProfile> {
        self.prom.as_ref()
    }

    /// Current power state of the PROM socket
    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Override the async-completion timeout (mainly for tests)
    pub fn set_poll_timeout(&mut self, timeout: Duration) {
        self.poll_timeout = timeout;
    }

    // ---- Command channel ----

    fn send_command(&mut self, cmd: Command, args: [u8; 4]) -> Result<ResultCode> {
        let reply = self.transport.send(&command_frame(cmd, args))?;
        ResultCode::from_byte(reply)
    }

    fn send_data(&mut self, cmd: Command, a0: u8, a1: u8, payload: &[u8]) -> Result<ResultCode> {
        if payload.is_empty() || payload.len() > BUFFER_SIZE {
            return Err(Error::InvalidArgument("data payload length out of range"));
        }
        let reply = self.transport.send(&data_frame(cmd, a0, a1, payload))?;
        ResultCode::from_byte(reply)
    }

    /// Poll until the device leaves the Busy state.
    ///
    /// This is the only place asynchronous completion is observed. The
    /// deadline is wall-clock time measured from the first poll.
    fn poll_until_ready(&mut self, want_ack: bool) -> Result<ResultCode> {
        let deadline = Instant::now() + self.poll_timeout;
        loop {
            let result = self.send_command(Command::Poll, [0; 4])?;
            if result == ResultCode::Busy {
                if Instant::now() > deadline {
                    return Err(Error::PollTimeout);
                }
                continue;
            }
            if want_ack && result != ResultCode::Ack {
                return Err(Error::NoAck);
            }
            return Ok(result);
        }
    }

    /// Start an async command and wait for its completion.
    ///
    /// The immediate reply must be Async; anything else means the device
    /// and host disagree about the command set.
    fn send_command_synced(
        &mut self,
        cmd: Command,
        args: [u8; 4],
        want_ack: bool,
    ) -> Result<ResultCode> {
        match self.send_command(cmd, args)? {
            ResultCode::Async => self.poll_until_ready(want_ack),
            other => Err(Error::UnexpectedReply {
                command: cmd as u8,
                reply: other.to_byte(),
            }),
        }
    }

    // ---- Staging buffer access ----

    fn write_buffer(&mut self, offset_steps: u8, data: &[u8]) -> Result<()> {
        check_buffer_range(offset_steps, data.len())?;
        match self.send_data(Command::WriteBuffer, 0, offset_steps, data)? {
            ResultCode::Ack => Ok(()),
            ResultCode::Nack => Err(Error::NoAck),
            other => Err(Error::UnexpectedReply {
                command: Command::WriteBuffer as u8,
                reply: other.to_byte(),
            }),
        }
    }

    fn read_buffer(&mut self, offset_steps: u8, len: usize) -> Result<Vec<u8>> {
        check_buffer_range(offset_steps, len)?;
        let args = [0, offset_steps, len as u8, (len >> 8) as u8];
        match self.send_command(Command::ReadBuffer, args)? {
            ResultCode::Data => {
                let mut buf = vec![0u8; len];
                self.transport.receive(&mut buf)?;
                Ok(buf)
            }
            other => Err(Error::UnexpectedReply {
                command: Command::ReadBuffer as u8,
                reply: other.to_byte(),
            }),
        }
    }

    /// Kick off an async read/program covering one chunk of the buffer.
    ///
    /// The word count and buffer-half offset share the first two argument
    /// bytes; `a3` carries per-command flag bits.
    fn start_async(&mut self, cmd: Command, chunk: Chunk, word_width: usize, a3: u8) -> Result<()> {
        check_buffer_range(chunk.offset_steps, chunk.len)?;
        let words = chunk.word_count(word_width)?;
        let a0 = (words & 0xFF) as u8;
        let a1 = ((words >> 8) & 0x03) as u8 | (chunk.offset_steps & 0x0F) << 2;
        match self.send_command(cmd, [a0, a1, 0, a3])? {
            ResultCode::Async => Ok(()),
            other => Err(Error::UnexpectedReply {
                command: cmd as u8,
                reply: other.to_byte(),
            }),
        }
    }

    /// Advance the device's address counter by `count` clock pulses
    fn prog_increment(&mut self, count: u32, sense_reset: bool) -> Result<()> {
        let args = [
            count as u8,
            (count >> 8) as u8,
            ((count >> 16) & 0x01) as u8,
            sense_reset as u8,
        ];
        self.send_command_synced(Command::ProgIncrement, args, true)?;
        Ok(())
    }

    /// Capture one verify word into the buffer and read it back
    fn prog_verify(&mut self, sense_reset: bool, word_width: usize) -> Result<Vec<u8>> {
        self.send_command_synced(Command::ProgVerify, [0, 0, 0, sense_reset as u8], true)?;
        self.read_buffer(0, word_width)
    }

    // ---- Power control ----

    fn power_on(&mut self, state: PowerState, invert_reset: bool) -> Result<()> {
        let (cmd, a0) = match state {
            PowerState::Read => (Command::PowerOnRead, invert_reset as u8),
            PowerState::Verify => (Command::PowerOnVerify, invert_reset as u8),
            PowerState::Prog => (Command::PowerOnProg, 0),
            PowerState::Off => return self.power_off(),
        };
        self.send_command_synced(cmd, [a0, 0, 0, 0], true)?;
        self.power = state;
        log::debug!("Power on: {:?}", state);
        Ok(())
    }

    /// Switch off all supplies to the PROM socket
    pub fn power_off(&mut self) -> Result<()> {
        self.send_command_synced(Command::PowerOff, [0; 4], true)?;
        self.power = PowerState::Off;
        log::debug!("Power off");
        Ok(())
    }

    /// Run `work` inside a power-on/power-off bracket.
    ///
    /// If any step errors out, including the power transitions themselves,
    /// the session tries once to reset the link and power off so the PROM
    /// is not left under voltage; failures during that recovery are
    /// discarded so the original diagnosis is not masked.
    fn powered<R>(
        &mut self,
        state: PowerState,
        invert_reset: bool,
        work: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let result = match self.power_on(state, invert_reset) {
            Ok(()) => match work(self) {
                Ok(value) => self.power_off().map(|()| value),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };
        if result.is_err() && self.reset_link().is_ok() {
            let _ = self.power_off();
        }
        result
    }

    fn require_prom(&self) -> Result<PromProfile> {
        self.prom.ok_or(Error::NotConfigured)
    }

    // ---- Public operations ----

    /// Configure the programmer for one PROM model.
    ///
    /// Packs the profile's electrical flags and pulse durations into the
    /// hardware configuration word and latches the profile for subsequent
    /// operations.
    pub fn configure(&mut self, prom: PromProfile) -> Result<()> {
        self.send_command_synced(Command::ConfigProm, pack_prom_config(&prom), true)?;
        log::info!("Configured programmer for {}", prom.name);
        self.prom = Some(prom);
        Ok(())
    }

    /// Verify the device identity word against the configured profile.
    ///
    /// The identity shift register is wired bit-reversed within each byte,
    /// so both ID bytes are reversed before comparison. Power is switched
    /// off before any mismatch is reported.
    pub fn verify_device_id(&mut self) -> Result<()> {
        let prom = self.require_prom()?;
        let word = self.powered(PowerState::Prog, false, |dev| {
            dev.prog_increment(prom.clock_to_id, false)?;
            dev.prog_verify(false, prom.word_width())
        })?;

        let manufacturer = word[0].reverse_bits();
        let device = word[1].reverse_bits();
        if manufacturer != XILINX_MANUFACTURER_ID {
            return Err(Error::ManufacturerIdMismatch {
                expected: XILINX_MANUFACTURER_ID,
                found: manufacturer,
            });
        }
        if device != prom.code {
            return Err(Error::DeviceIdMismatch {
                name: prom.name,
                expected: prom.code,
                found: device,
            });
        }
        log::info!("Device ID verified: 0x{:02x} 0x{:02x}", manufacturer, device);
        Ok(())
    }

    /// Read the reset-polarity word.
    ///
    /// Returns true when the reset-inverted bit is programmed (reset is
    /// active low). The word must read back as a consistent all-0x00 or
    /// all-0xFF.
    pub fn is_reset_inverted(&mut self) -> Result<bool> {
        let prom = self.require_prom()?;
        let word = self.powered(PowerState::Prog, false, |dev| {
            dev.prog_increment(prom.clock_to_reset, true)?;
            dev.prog_verify(true, prom.word_width())
        })?;

        let first = word[0];
        if (first != 0x00 && first != 0xFF) || word[1..4].iter().any(|&b| b != first) {
            return Err(Error::InconsistentResetPolarity);
        }
        Ok(first == 0x00)
    }

    /// Check whether the device is blank (all bits erased, reading 0xFF)
    pub fn is_blank(&mut self, invert_reset: bool) -> Result<bool> {
        self.read_sweep(&mut std::io::sink(), invert_reset, false)
    }

    /// Read the full device contents into `sink`.
    ///
    /// `margin_voltage` selects the reduced-margin verify supply instead of
    /// the normal read supply.
    pub fn read(
        &mut self,
        sink: &mut dyn Write,
        invert_reset: bool,
        margin_voltage: bool,
    ) -> Result<()> {
        self.read_sweep(sink, invert_reset, margin_voltage)?;
        Ok(())
    }

    /// Read the device and compare against `source`.
    ///
    /// A length mismatch is tolerated by treating the shorter stream's
    /// missing tail as 0xFF (erased cells). Returns true iff every compared
    /// position matches.
    pub fn verify(
        &mut self,
        source: &mut dyn Read,
        invert_reset: bool,
        margin_voltage: bool,
    ) -> Result<bool> {
        let prom = self.require_prom()?;
        let mut image = Vec::with_capacity(prom.byte_len());
        self.read_sweep(&mut image, invert_reset, margin_voltage)?;

        let mut reference = Vec::new();
        source.read_to_end(&mut reference)?;

        let len = image.len().max(reference.len());
        for i in 0..len {
            let a = image.get(i).copied().unwrap_or(0xFF);
            let b = reference.get(i).copied().unwrap_or(0xFF);
            if a != b {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Double-buffered streaming read shared by read, blank check and
    /// verify. Returns whether every byte read was 0xFF.
    ///
    /// Each iteration polls the async read started in the previous one,
    /// kicks off the read of the current chunk into one buffer half, then
    /// pulls the previous chunk out of the other half while the device is
    /// executing. The final poll must report chip-enable-out; CEO anywhere
    /// earlier (or no CEO at the end) is a hard error, reported after the
    /// sweep has powered off.
    fn read_sweep(
        &mut self,
        sink: &mut dyn Write,
        invert_reset: bool,
        margin_voltage: bool,
    ) -> Result<bool> {
        let prom = self.require_prom()?;
        let word_width = prom.word_width();
        let total = prom.byte_len();
        let state = if margin_voltage {
            PowerState::Verify
        } else {
            PowerState::Read
        };
        log::debug!("Reading {} bytes from {}", total, prom.name);

        let (blank, early_ceo, ceo) = self.powered(state, invert_reset, |dev| {
            let mut chunks = Chunks::new(total);
            let mut prev: Option<Chunk> = None;
            let mut blank = true;
            let mut early_ceo = false;
            let mut ceo = false;
            loop {
                let cur = chunks.next();
                if prev.is_some() {
                    match dev.poll_until_ready(false)? {
                        ResultCode::Ack => {}
                        ResultCode::Ceo => {
                            if cur.is_some() {
                                early_ceo = true;
                            } else {
                                ceo = true;
                            }
                        }
                        ResultCode::EarlyCeo => early_ceo = true,
                        _ => return Err(Error::NoAck),
                    }
                }
                if let Some(chunk) = cur {
                    dev.start_async(Command::Read, chunk, word_width, 0)?;
                }
                if let Some(chunk) = prev {
                    let buf = dev.read_buffer(chunk.offset_steps, chunk.len)?;
                    if buf.iter().any(|&b| b != 0xFF) {
                        blank = false;
                    }
                    sink.write_all(&buf)?;
                }
                match cur {
                    Some(chunk) => prev = Some(chunk),
                    None => break,
                }
            }
            sink.flush()?;
            Ok((blank, early_ceo, ceo))
        })?;

        if early_ceo {
            return Err(Error::EarlyEndOfChip);
        }
        if !ceo {
            return Err(Error::MissingEndOfChip);
        }
        Ok(blank)
    }

    /// Program the device from `source`.
    ///
    /// Mirrors the read sweep in the opposite direction: fill one buffer
    /// half over the wire, poll the async program of the previous half,
    /// then start programming the half just filled. A short source is
    /// padded with 0xFF (cells left unprogrammed). With
    /// `continue_on_error` a failed chunk is recorded and the sweep
    /// continues; the call still fails at the end if any chunk failed.
    pub fn program(&mut self, source: &mut dyn Read, continue_on_error: bool) -> Result<()> {
        let prom = self.require_prom()?;
        let word_width = prom.word_width();
        let total = prom.byte_len();
        let flags = if continue_on_error { 0x02 } else { 0x00 };
        log::debug!("Programming {} bytes to {}", total, prom.name);

        let failed = self.powered(PowerState::Prog, false, |dev| {
            let mut chunks = Chunks::new(total);
            let mut started = false;
            let mut failed = false;
            loop {
                let cur = chunks.next();
                if let Some(chunk) = cur {
                    let mut data = vec![0xFF; chunk.len];
                    read_padded(source, &mut data)?;
                    dev.write_buffer(chunk.offset_steps, &data)?;
                }
                if started && dev.poll_until_ready(false)? != ResultCode::Ack {
                    failed = true;
                    if !continue_on_error {
                        return Err(Error::NoAck);
                    }
                }
                match cur {
                    Some(chunk) => {
                        dev.start_async(Command::ProgStart, chunk, word_width, flags)?;
                        started = true;
                    }
                    None => break,
                }
            }
            Ok(failed)
        })?;

        if failed {
            return Err(Error::ProgramFailed);
        }
        Ok(())
    }

    /// Program the reset-inverted bit (make reset active low).
    ///
    /// Fixed-size operation: seeds the buffer with one all-zero word pair,
    /// advances to the reset-polarity word and issues a single synchronous
    /// program start.
    pub fn program_reset_polarity(&mut self) -> Result<()> {
        let prom = self.require_prom()?;
        self.powered(PowerState::Prog, false, |dev| {
            dev.write_buffer(0, &[0u8; 8])?;
            dev.prog_increment(prom.clock_to_reset, false)?;
            dev.send_command_synced(Command::ProgStart, [1, 0, 0, 1], true)?;
            Ok(())
        })
    }

    // ---- Diagnostics ----

    /// Exercise the link and the programmer's staging RAM with a ramp
    /// pattern round trip
    pub fn test_echo(&mut self) -> Result<()> {
        let pattern: Vec<u8> = (0..=255).collect();
        self.write_buffer(0, &pattern)?;
        self.send_command_synced(Command::TestEcho, [0; 4], true)?;
        let readback = self.read_buffer(0, pattern.len())?;
        for (offset, (&expected, &found)) in pattern.iter().zip(readback.iter()).enumerate() {
            if expected != found {
                return Err(Error::DataMismatch {
                    offset,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Switch on a single supply voltage for bench testing.
    ///
    /// Never use this with a PROM in the socket.
    pub fn test_voltage(&mut self, mode: VoltageMode) -> Result<()> {
        self.send_command_synced(Command::TestVoltage, [mode as u8, 0, 0, 0], true)?;
        Ok(())
    }

    /// Query the programmer's version/capability word
    pub fn query_info(&mut self) -> Result<ProgrammerInfo> {
        self.send_command_synced(Command::QueryInfo, [0; 4], true)?;
        let word = self.read_buffer(0, 4)?;
        Ok(ProgrammerInfo::decode([word[0], word[1], word[2], word[3]]))
    }
}

/// Fill `buf` from `source`, leaving the pre-set 0xFF padding in place
/// past the source's end.
fn read_padded(source: &mut dyn Read, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(())
}
