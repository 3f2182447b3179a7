//! End-to-end session tests against a simulated programmer
//!
//! The simulator implements `Transport` and models the firmware's frame
//! handling: a 4 KiB staging buffer, one outstanding async operation with
//! a queued completion result, and fault-injection knobs for the error
//! paths (corrupted echo, Nack'd program chunks, early/missing CEO, a
//! device stuck Busy).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use promprog_core::{find_prom, PromFlags, PromProfile};
use promprog_device::{Error, PowerState, PromProgrammer, Result, Transport, VoltageMode};

const ACK: u8 = 0x06;
const NACK: u8 = 0x15;
const DATA: u8 = 0x1A;
const ASYNC: u8 = 0x16;
const BUSY: u8 = 0x07;
const CEO: u8 = 0x04;
const EARLY_CEO: u8 = 0x14;

/// Simulated XC17xxx programmer behind the serial link
struct Sim {
    /// Staging buffer
    buffer: [u8; 4096],
    /// Device contents served by the async read command
    memory: Vec<u8>,
    /// Shift-word width of the inserted device
    word_width: usize,
    /// Raw identity word (as shifted out, before host-side bit reversal)
    id_word: [u8; 8],
    /// Raw reset-polarity word
    reset_word: [u8; 8],
    /// Version/capability word
    info: [u8; 4],

    /// Pending bulk reply bytes
    out: VecDeque<u8>,
    /// Queued async completion results, popped by Poll
    completions: VecDeque<u8>,
    /// Raw frames seen, for wire-level assertions
    frames: Vec<Vec<u8>>,

    read_pos: usize,
    read_chunks: usize,
    prog_pos: usize,
    prog_chunks: usize,
    write_buffer_count: usize,
    power_on_count: usize,
    power_off_count: usize,
    powered: bool,
    breaks: usize,

    // Fault knobs
    corrupt_echo_at: Option<usize>,
    nack_program_chunk: Option<usize>,
    nack_power_on: bool,
    nack_power_off: bool,
    force_early_ceo_at: Option<usize>,
    suppress_ceo: bool,
    busy_forever: bool,
}

impl Sim {
    fn new(memory: Vec<u8>, word_width: usize) -> Self {
        Self {
            buffer: [0; 4096],
            memory,
            word_width,
            id_word: [0; 8],
            reset_word: [0; 8],
            info: [4, 7, 1, 1],
            out: VecDeque::new(),
            completions: VecDeque::new(),
            frames: Vec::new(),
            read_pos: 0,
            read_chunks: 0,
            prog_pos: 0,
            prog_chunks: 0,
            write_buffer_count: 0,
            power_on_count: 0,
            power_off_count: 0,
            powered: false,
            breaks: 0,
            corrupt_echo_at: None,
            nack_program_chunk: None,
            nack_power_on: false,
            nack_power_off: false,
            force_early_ceo_at: None,
            suppress_ceo: false,
            busy_forever: false,
        }
    }

    fn handle_frame(&mut self, frame: &[u8]) -> u8 {
        assert_eq!(frame[0], 0x1B, "missing start-of-frame marker");
        self.frames.push(frame.to_vec());
        let cmd = frame[1];
        let args = [frame[2], frame[3], frame[4], frame[5]];

        match cmd {
            // Poll
            0x02 => {
                if self.busy_forever {
                    return BUSY;
                }
                self.completions.pop_front().unwrap_or(ACK)
            }
            // ReadBuffer
            0x01 => {
                let offset = args[1] as usize * 256;
                let len = args[2] as usize | (args[3] as usize) << 8;
                self.out.extend(&self.buffer[offset..offset + len]);
                DATA
            }
            // WriteBuffer (data frame: payload follows the header)
            0x81 => {
                let offset = args[1] as usize * 256;
                let len = args[2] as usize | (args[3] as usize) << 8;
                let payload = &frame[6..];
                assert_eq!(payload.len(), len, "data frame length field mismatch");
                self.buffer[offset..offset + len].copy_from_slice(payload);
                self.write_buffer_count += 1;
                ACK
            }
            // TestEcho
            0x03 => {
                if let Some(i) = self.corrupt_echo_at {
                    self.buffer[i] ^= 0x40;
                }
                self.completions.push_back(ACK);
                ASYNC
            }
            // TestVoltage / ConfigProm
            0x04 | 0x05 => {
                self.completions.push_back(ACK);
                ASYNC
            }
            // QueryInfo
            0x06 => {
                self.buffer[..4].copy_from_slice(&self.info);
                self.completions.push_back(ACK);
                ASYNC
            }
            // PowerOff
            0x07 => {
                self.power_off_count += 1;
                let result = if self.nack_power_off {
                    self.nack_power_off = false;
                    NACK
                } else {
                    self.powered = false;
                    ACK
                };
                self.completions.push_back(result);
                ASYNC
            }
            // PowerOnRead / PowerOnVerify / PowerOnProg
            0x08..=0x0A => {
                self.power_on_count += 1;
                let result = if self.nack_power_on {
                    self.nack_power_on = false;
                    NACK
                } else {
                    self.powered = true;
                    ACK
                };
                self.completions.push_back(result);
                ASYNC
            }
            // Async read to buffer
            0x0B => {
                let (offset, len) = decode_word_args(args, self.word_width);
                let end = self.read_pos + len;
                let avail_end = end.min(self.memory.len());
                if avail_end > self.read_pos {
                    let src = &self.memory[self.read_pos..avail_end];
                    self.buffer[offset..offset + src.len()].copy_from_slice(src);
                }
                let result = if self.force_early_ceo_at == Some(self.read_chunks) {
                    EARLY_CEO
                } else if end > self.memory.len() {
                    EARLY_CEO
                } else if end == self.memory.len() && !self.suppress_ceo {
                    CEO
                } else {
                    ACK
                };
                self.read_pos = end.min(self.memory.len());
                self.read_chunks += 1;
                self.completions.push_back(result);
                ASYNC
            }
            // ProgIncrement
            0x0C => {
                self.completions.push_back(ACK);
                ASYNC
            }
            // ProgVerify
            0x0D => {
                let word = if args[3] != 0 {
                    self.reset_word
                } else {
                    self.id_word
                };
                self.buffer[..8].copy_from_slice(&word);
                self.completions.push_back(ACK);
                ASYNC
            }
            // ProgStart
            0x0E => {
                let (offset, len) = decode_word_args(args, self.word_width);
                let end = (self.prog_pos + len).min(self.memory.len());
                if end > self.prog_pos {
                    let n = end - self.prog_pos;
                    self.memory[self.prog_pos..end].copy_from_slice(&self.buffer[offset..offset + n]);
                }
                self.prog_pos = end;
                let result = if self.nack_program_chunk == Some(self.prog_chunks) {
                    NACK
                } else {
                    ACK
                };
                self.prog_chunks += 1;
                self.completions.push_back(result);
                ASYNC
            }
            other => panic!("unknown command 0x{other:02x}"),
        }
    }

    /// Frames matching a command code
    fn frames_for(&self, cmd: u8) -> Vec<&Vec<u8>> {
        self.frames.iter().filter(|f| f[1] == cmd).collect()
    }
}

fn decode_word_args(args: [u8; 4], word_width: usize) -> (usize, usize) {
    let words = args[0] as usize | ((args[1] & 0x03) as usize) << 8;
    let offset = ((args[1] >> 2) & 0x0F) as usize * 256;
    (offset, words * word_width)
}

/// Cloneable transport handle so tests keep access to the simulator after
/// the session takes ownership of its copy
#[derive(Clone)]
struct SimHandle(Rc<RefCell<Sim>>);

impl SimHandle {
    fn new(sim: Sim) -> Self {
        Self(Rc::new(RefCell::new(sim)))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Sim) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl Transport for SimHandle {
    fn send(&mut self, frame: &[u8]) -> Result<u8> {
        Ok(self.0.borrow_mut().handle_frame(frame))
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut sim = self.0.borrow_mut();
        if sim.out.len() < buf.len() {
            return Err(Error::Timeout);
        }
        for byte in buf.iter_mut() {
            *byte = sim.out.pop_front().unwrap();
        }
        Ok(())
    }

    fn assert_break(&mut self) -> Result<()> {
        self.0.borrow_mut().breaks += 1;
        Ok(())
    }

    fn clear_break(&mut self) -> Result<()> {
        Ok(())
    }

    fn discard_buffers(&mut self) -> Result<()> {
        self.0.borrow_mut().out.clear();
        Ok(())
    }
}

/// 256-byte (2048-bit) synthetic model: a single-chunk transfer
fn small_profile() -> PromProfile {
    let mut prom = *find_prom("xc1736e").unwrap();
    prom.flags = PromFlags::VCC_5V | PromFlags::VPP_5V;
    prom.density_bits = 2048;
    prom
}

fn session(handle: &SimHandle) -> PromProgrammer<SimHandle> {
    PromProgrammer::new(handle.clone()).unwrap()
}

fn configured(handle: &SimHandle, prom: PromProfile) -> PromProgrammer<SimHandle> {
    let mut prog = session(handle);
    prog.configure(prom).unwrap();
    prog
}

#[test]
fn test_configure_sends_packed_config_word() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let _prog = configured(&handle, *find_prom("xc1736e").unwrap());

    handle.with(|sim| {
        let frames = sim.frames_for(0x05);
        assert_eq!(frames.len(), 1);
        // flags 0x03, tpgm 375, tpgm1 0, tprst 1875 ticks
        assert_eq!(&frames[0][2..6], &[0xBB, 0x0B, 0x60, 0xEA]);
    });
}

#[test]
fn test_operations_require_configuration() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);
    let frames_after_open = handle.with(|sim| sim.frames.len());

    assert!(matches!(prog.is_blank(false), Err(Error::NotConfigured)));
    assert!(matches!(prog.verify_device_id(), Err(Error::NotConfigured)));
    assert!(matches!(prog.is_reset_inverted(), Err(Error::NotConfigured)));
    assert!(matches!(
        prog.program(&mut std::io::empty(), false),
        Err(Error::NotConfigured)
    ));

    // Precondition failures happen before any I/O
    handle.with(|sim| assert_eq!(sim.frames.len(), frames_after_open));
}

#[test]
fn test_echo_round_trip() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);
    prog.test_echo().unwrap();
}

#[test]
fn test_echo_detects_corruption() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);
    handle.with(|sim| sim.corrupt_echo_at = Some(7));

    match prog.test_echo() {
        Err(Error::DataMismatch {
            offset,
            expected,
            found,
        }) => {
            assert_eq!(offset, 7);
            assert_eq!(expected, 7);
            assert_eq!(found, 7 ^ 0x40);
        }
        other => panic!("expected DataMismatch, got {other:?}"),
    }
}

#[test]
fn test_voltage_command_encoding() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);
    prog.test_voltage(VoltageMode::Vpp12V25Weak).unwrap();

    handle.with(|sim| {
        let frames = sim.frames_for(0x04);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][2], 11);
    });
}

#[test]
fn test_query_info() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);

    let info = prog.query_info().unwrap();
    assert_eq!(info.hdl_version, Some(7));
    assert_eq!(info.hw_version, Some(1));
    assert_eq!(
        info.hw_type,
        promprog_device::HwType::PromProgrammer
    );
}

#[test]
fn test_scenario_read_single_chunk() {
    let pattern: Vec<u8> = (0..=255).collect();
    let handle = SimHandle::new(Sim::new(pattern.clone(), 4));
    let mut prog = configured(&handle, small_profile());

    let mut image = Vec::new();
    prog.read(&mut image, false, false).unwrap();
    assert_eq!(image, pattern);
    assert_eq!(prog.power_state(), PowerState::Off);
}

#[test]
fn test_scenario_blank_check_all_erased() {
    let handle = SimHandle::new(Sim::new(vec![0xFF; 256], 4));
    let mut prog = configured(&handle, small_profile());
    assert!(prog.is_blank(false).unwrap());

    let handle = SimHandle::new(Sim::new(vec![0xFF; 255].into_iter().chain([0xFE]).collect(), 4));
    let mut prog = configured(&handle, small_profile());
    assert!(!prog.is_blank(false).unwrap());
}

#[test]
fn test_is_blank_idempotent_no_power_leak() {
    let handle = SimHandle::new(Sim::new(vec![0xFF; 256], 4));
    let mut prog = configured(&handle, small_profile());

    assert_eq!(prog.power_state(), PowerState::Off);
    // Each sweep reads from the start again
    assert!(prog.is_blank(false).unwrap());
    assert_eq!(prog.power_state(), PowerState::Off);
    handle.with(|sim| {
        sim.read_pos = 0;
        sim.read_chunks = 0;
    });
    assert!(prog.is_blank(false).unwrap());
    assert_eq!(prog.power_state(), PowerState::Off);

    handle.with(|sim| {
        assert_eq!(sim.power_on_count, 2);
        assert_eq!(sim.power_off_count, 2);
        assert!(!sim.powered);
    });
}

#[test]
fn test_read_multi_chunk_pipelined() {
    // 4536 bytes: chunks of 2048 + 2048 + 440, alternating buffer halves
    let prom = *find_prom("xc1736e").unwrap();
    let image: Vec<u8> = (0..prom.byte_len()).map(|i| (i % 251) as u8).collect();
    let handle = SimHandle::new(Sim::new(image.clone(), 4));
    let mut prog = configured(&handle, prom);

    let mut out = Vec::new();
    prog.read(&mut out, false, false).unwrap();
    assert_eq!(out, image);

    handle.with(|sim| {
        let reads = sim.frames_for(0x0B);
        assert_eq!(reads.len(), 3);
        // Offsets alternate between the two buffer halves (steps 0 and 8)
        let offsets: Vec<u8> = reads.iter().map(|f| (f[3] >> 2) & 0x0F).collect();
        assert_eq!(offsets, vec![0, 8, 0]);
        // Word counts: 512, 512, 110
        let words: Vec<usize> = reads
            .iter()
            .map(|f| f[2] as usize | ((f[3] & 3) as usize) << 8)
            .collect();
        assert_eq!(words, vec![512, 512, 110]);
    });
}

#[test]
fn test_early_ceo_aborts_with_single_power_off() {
    let prom = *find_prom("xc1736e").unwrap();
    // Device holds fewer bytes than the profile declares
    let handle = SimHandle::new(Sim::new(vec![0xAB; 3000], 4));
    let mut prog = configured(&handle, prom);

    let mut out = Vec::new();
    match prog.read(&mut out, false, false) {
        Err(Error::EarlyEndOfChip) => {}
        other => panic!("expected EarlyEndOfChip, got {other:?}"),
    }
    assert_eq!(prog.power_state(), PowerState::Off);
    handle.with(|sim| {
        assert_eq!(sim.power_off_count, 1);
        assert!(!sim.powered);
    });
}

#[test]
fn test_missing_ceo_is_an_error() {
    let handle = SimHandle::new(Sim::new(vec![0xFF; 256], 4));
    handle.with(|sim| sim.suppress_ceo = true);
    let mut prog = configured(&handle, small_profile());

    match prog.is_blank(false) {
        Err(Error::MissingEndOfChip) => {}
        other => panic!("expected MissingEndOfChip, got {other:?}"),
    }
    assert_eq!(prog.power_state(), PowerState::Off);
}

#[test]
fn test_failed_power_off_triggers_recovery() {
    let handle = SimHandle::new(Sim::new(vec![0xFF; 256], 4));
    let mut prog = configured(&handle, small_profile());
    let breaks_before = handle.with(|sim| {
        sim.nack_power_off = true;
        sim.breaks
    });

    match prog.is_blank(false) {
        Err(Error::NoAck) => {}
        other => panic!("expected NoAck, got {other:?}"),
    }
    // The rejected power-off is retried after a link reset
    assert_eq!(prog.power_state(), PowerState::Off);
    handle.with(|sim| {
        assert_eq!(sim.frames_for(0x07).len(), 2);
        assert_eq!(sim.breaks, breaks_before + 1);
        assert!(!sim.powered);
    });
}

#[test]
fn test_failed_power_on_triggers_recovery() {
    let handle = SimHandle::new(Sim::new(vec![0xFF; 256], 4));
    let mut prog = configured(&handle, small_profile());
    let breaks_before = handle.with(|sim| {
        sim.nack_power_on = true;
        sim.breaks
    });

    match prog.is_blank(false) {
        Err(Error::NoAck) => {}
        other => panic!("expected NoAck, got {other:?}"),
    }
    assert_eq!(prog.power_state(), PowerState::Off);
    handle.with(|sim| {
        // No read was ever started, but the supplies were still shut off
        assert!(sim.frames_for(0x0B).is_empty());
        assert_eq!(sim.frames_for(0x07).len(), 1);
        assert_eq!(sim.breaks, breaks_before + 1);
        assert!(!sim.powered);
    });
}

#[test]
fn test_verify_device_id_match() {
    let prom = *find_prom("xc1765e").unwrap();
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| {
        // The identity register shifts out bit-reversed bytes
        sim.id_word[0] = 0xC9u8.reverse_bits();
        sim.id_word[1] = prom.code.reverse_bits();
    });
    let mut prog = configured(&handle, prom);
    prog.verify_device_id().unwrap();
    assert_eq!(prog.power_state(), PowerState::Off);
}

#[test]
fn test_verify_device_id_mismatch() {
    let prom = *find_prom("xc1765e").unwrap();
    let other = *find_prom("xc17s05").unwrap();
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| {
        sim.id_word[0] = 0xC9u8.reverse_bits();
        sim.id_word[1] = other.code.reverse_bits();
    });
    let mut prog = configured(&handle, prom);

    match prog.verify_device_id() {
        Err(Error::DeviceIdMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, prom.code);
            assert_eq!(found, other.code);
        }
        result => panic!("expected DeviceIdMismatch, got {result:?}"),
    }
    // Power is off even on mismatch
    assert_eq!(prog.power_state(), PowerState::Off);
    handle.with(|sim| assert!(!sim.powered));
}

#[test]
fn test_verify_device_id_bad_manufacturer() {
    let prom = *find_prom("xc1765e").unwrap();
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| {
        sim.id_word[0] = 0x12u8.reverse_bits();
        sim.id_word[1] = prom.code.reverse_bits();
    });
    let mut prog = configured(&handle, prom);

    assert!(matches!(
        prog.verify_device_id(),
        Err(Error::ManufacturerIdMismatch {
            expected: 0xC9,
            found: 0x12,
        })
    ));
}

#[test]
fn test_reset_polarity_readback() {
    let prom = *find_prom("xc1765e").unwrap();

    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| sim.reset_word = [0x00; 8]);
    let mut prog = configured(&handle, prom);
    assert!(prog.is_reset_inverted().unwrap());

    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| sim.reset_word = [0xFF; 8]);
    let mut prog = configured(&handle, prom);
    assert!(!prog.is_reset_inverted().unwrap());

    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    handle.with(|sim| sim.reset_word = [0x00, 0xFF, 0x00, 0x00, 0, 0, 0, 0]);
    let mut prog = configured(&handle, prom);
    assert!(matches!(
        prog.is_reset_inverted(),
        Err(Error::InconsistentResetPolarity)
    ));
}

#[test]
fn test_program_streams_whole_image() {
    let prom = *find_prom("xc1736e").unwrap();
    let image: Vec<u8> = (0..prom.byte_len()).map(|i| (i % 239) as u8).collect();
    let handle = SimHandle::new(Sim::new(vec![0xFF; prom.byte_len()], 4));
    let mut prog = configured(&handle, prom);

    prog.program(&mut &image[..], false).unwrap();

    handle.with(|sim| {
        assert_eq!(sim.memory, image);
        assert_eq!(sim.prog_chunks, 3);
        assert_eq!(sim.write_buffer_count, 3);
        assert!(!sim.powered);
    });
}

#[test]
fn test_program_pads_short_source_with_erased_cells() {
    let prom = small_profile();
    let handle = SimHandle::new(Sim::new(vec![0x00; 256], 4));
    let mut prog = configured(&handle, prom);

    let source = [0x11u8; 100];
    prog.program(&mut &source[..], false).unwrap();

    handle.with(|sim| {
        assert_eq!(&sim.memory[..100], &[0x11; 100]);
        assert_eq!(&sim.memory[100..], &[0xFF; 156]);
    });
}

#[test]
fn test_scenario_program_aborts_on_nack() {
    // Device rejects the first chunk; the failure is observed during the
    // second chunk's iteration and the third chunk is never transferred.
    let prom = *find_prom("xc1736e").unwrap();
    let image = vec![0x5A; prom.byte_len()];
    let handle = SimHandle::new(Sim::new(vec![0xFF; prom.byte_len()], 4));
    handle.with(|sim| sim.nack_program_chunk = Some(0));
    let mut prog = configured(&handle, prom);

    match prog.program(&mut &image[..], false) {
        Err(Error::NoAck) => {}
        other => panic!("expected NoAck, got {other:?}"),
    }
    handle.with(|sim| {
        assert_eq!(sim.write_buffer_count, 2);
        assert_eq!(sim.prog_chunks, 1);
        assert!(!sim.powered);
    });
    assert_eq!(prog.power_state(), PowerState::Off);
}

#[test]
fn test_program_continue_on_error_attempts_every_chunk() {
    let prom = *find_prom("xc1736e").unwrap();
    let image = vec![0x5A; prom.byte_len()];
    let handle = SimHandle::new(Sim::new(vec![0xFF; prom.byte_len()], 4));
    handle.with(|sim| sim.nack_program_chunk = Some(0));
    let mut prog = configured(&handle, prom);

    match prog.program(&mut &image[..], true) {
        Err(Error::ProgramFailed) => {}
        other => panic!("expected ProgramFailed, got {other:?}"),
    }
    handle.with(|sim| {
        assert_eq!(sim.prog_chunks, 3);
        assert_eq!(sim.write_buffer_count, 3);
        // Continue-on-error is passed down to the firmware
        assert!(sim.frames_for(0x0E).iter().all(|f| f[5] & 0x02 != 0));
        assert!(!sim.powered);
    });
}

#[test]
fn test_program_reset_polarity() {
    let prom = *find_prom("xc1765e").unwrap();
    let handle = SimHandle::new(Sim::new(vec![0xFF; 16], 4));
    let mut prog = configured(&handle, prom);

    prog.program_reset_polarity().unwrap();

    handle.with(|sim| {
        // 8-byte all-zero seed, then a single-word program start
        assert_eq!(&sim.buffer[..8], &[0u8; 8]);
        let incs = sim.frames_for(0x0C);
        assert_eq!(incs.len(), 1);
        let count =
            incs[0][2] as u32 | (incs[0][3] as u32) << 8 | ((incs[0][4] & 1) as u32) << 16;
        assert_eq!(count, prom.clock_to_reset);
        assert!(!sim.powered);
    });
}

#[test]
fn test_verify_tolerates_length_mismatch_as_erased() {
    let prom = small_profile();

    // Device image: 100 programmed bytes, erased tail
    let mut memory = vec![0xFF; 256];
    memory[..100].copy_from_slice(&[0x22; 100]);

    let handle = SimHandle::new(Sim::new(memory.clone(), 4));
    let mut prog = configured(&handle, prom);
    let mut reference = &[0x22u8; 100][..];
    assert!(prog.verify(&mut reference, false, false).unwrap());

    handle.with(|sim| {
        sim.read_pos = 0;
        sim.read_chunks = 0;
    });
    let mut wrong = &[0x23u8; 100][..];
    assert!(!prog.verify(&mut wrong, false, false).unwrap());

    handle.with(|sim| {
        sim.read_pos = 0;
        sim.read_chunks = 0;
    });
    // Reference longer than the device, tail not erased
    let long: Vec<u8> = (0..300).map(|_| 0x22).collect();
    assert!(!prog.verify(&mut &long[..], false, false).unwrap());
}

#[test]
fn test_poll_timeout_on_stuck_device() {
    let handle = SimHandle::new(Sim::new(Vec::new(), 4));
    let mut prog = session(&handle);
    prog.set_poll_timeout(Duration::from_millis(20));
    handle.with(|sim| sim.busy_forever = true);

    match prog.test_voltage(VoltageMode::Off) {
        Err(Error::PollTimeout) => {}
        other => panic!("expected PollTimeout, got {other:?}"),
    }
}

#[test]
fn test_invalid_result_byte_is_a_protocol_error() {
    struct Garbage;
    impl Transport for Garbage {
        fn send(&mut self, _frame: &[u8]) -> Result<u8> {
            Ok(0x42)
        }
        fn receive(&mut self, _buf: &mut [u8]) -> Result<()> {
            Ok(())
        }
        fn assert_break(&mut self) -> Result<()> {
            Ok(())
        }
        fn clear_break(&mut self) -> Result<()> {
            Ok(())
        }
        fn discard_buffers(&mut self) -> Result<()> {
            Ok(())
        }
    }

    match PromProgrammer::new(Garbage) {
        Err(Error::InvalidResultByte(0x42)) => {}
        other => panic!("expected InvalidResultByte, got {:?}", other.err()),
    }
}

#[test]
fn test_id_word_width_follows_profile() {
    // 64-bit part: the identity readback pulls an 8-byte word
    let prom = *find_prom("xc17128e").unwrap();
    let handle = SimHandle::new(Sim::new(Vec::new(), 8));
    handle.with(|sim| {
        sim.id_word[0] = 0xC9u8.reverse_bits();
        sim.id_word[1] = prom.code.reverse_bits();
    });
    let mut prog = configured(&handle, prom);
    prog.verify_device_id().unwrap();

    handle.with(|sim| {
        let reads = sim.frames_for(0x01);
        let last = reads.last().unwrap();
        let len = last[4] as usize | (last[5] as usize) << 8;
        assert_eq!(len, 8);
    });
}
