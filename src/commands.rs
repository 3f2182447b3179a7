//! CLI command implementations

use indicatif::{ProgressBar, ProgressStyle};
use promprog_core::{find_prom, prom_names, PromProfile};
use promprog_device::{PromProgrammer, SerialTransport, VoltageMode};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

type Session = PromProgrammer<SerialTransport>;
type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Open the serial port and bring up a programmer session
pub fn open(port: &str) -> CommandResult<Session> {
    let transport = SerialTransport::open(port)?;
    let mut prog = PromProgrammer::new(transport)?;
    let info = prog.query_info()?;
    log::info!(
        "Programmer: {} (HDL {:?}, HW rev {:?})",
        info.hw_type,
        info.hdl_version,
        info.hw_version
    );
    Ok(prog)
}

/// Configure the programmer for a PROM model, verify the inserted device's
/// identity and report its reset polarity.
///
/// Every device operation starts here; the returned polarity is fed back
/// into the read power-on so images come out with a consistent bit sense.
fn setup(prog: &mut Session, prom_name: &str) -> CommandResult<(PromProfile, bool)> {
    let prom = *find_prom(prom_name)
        .ok_or_else(|| format!("unknown PROM model '{}' (see list-proms)", prom_name))?;
    // Known state before applying any profile
    prog.power_off()?;
    prog.configure(prom)?;
    prog.verify_device_id()?;
    println!("Found: {} ({} bytes)", prom.name, prom.byte_len());

    let inverted = prog.is_reset_inverted()?;
    if inverted {
        println!("Reset polarity: inverted (active low)");
    } else {
        println!("Reset polarity: normal (active high)");
    }
    Ok((prom, inverted))
}

fn progress_bar(total: u64) -> CommandResult<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Writer that advances a progress bar as bytes stream through
struct ProgressWriter<W: Write> {
    inner: W,
    bar: ProgressBar,
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bar.inc(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Reader counterpart of [`ProgressWriter`]
struct ProgressReader<R: Read> {
    inner: R,
    bar: ProgressBar,
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bar.inc(n as u64);
        Ok(n)
    }
}

/// Run the info command
pub fn run_info(prog: &mut Session) -> CommandResult<()> {
    let info = prog.query_info()?;
    println!("Hardware type:   {}", info.hw_type);
    match info.hdl_version {
        Some(v) => println!("HDL version:     {}", v),
        None => println!("HDL version:     not reported"),
    }
    match info.hw_version {
        Some(v) => println!("Hardware rev:    {}", v),
        None => println!("Hardware rev:    not reported"),
    }
    Ok(())
}

/// Run the echo test command
pub fn run_test_echo(prog: &mut Session) -> CommandResult<()> {
    prog.test_echo()?;
    println!("Echo test passed");
    Ok(())
}

/// Run the voltage test command
pub fn run_test_voltage(prog: &mut Session, voltage: &str) -> CommandResult<()> {
    let mode = VoltageMode::from_name(voltage)
        .ok_or_else(|| format!("unknown voltage mode '{}'", voltage))?;
    prog.test_voltage(mode)?;
    println!("Voltage mode set to {}", mode);
    Ok(())
}

/// Run the detect command
pub fn run_detect(prog: &mut Session, prom: &str) -> CommandResult<()> {
    setup(prog, prom)?;
    Ok(())
}

/// Run the read-reset command. Returns whether reset is inverted.
pub fn run_read_reset(prog: &mut Session, prom: &str) -> CommandResult<bool> {
    let (_, inverted) = setup(prog, prom)?;
    Ok(inverted)
}

/// Run the read command
pub fn run_read(prog: &mut Session, prom: &str, output: &Path, margin: bool) -> CommandResult<()> {
    let (prom, inverted) = setup(prog, prom)?;

    let file = File::create(output)?;
    let mut sink = ProgressWriter {
        inner: file,
        bar: progress_bar(prom.byte_len() as u64)?,
    };
    prog.read(&mut sink, inverted, margin)?;
    sink.bar.finish_with_message("Read complete");

    println!("Wrote {} bytes to {:?}", prom.byte_len(), output);
    Ok(())
}

/// Run the blank check command. Returns whether the device is blank.
pub fn run_blank(prog: &mut Session, prom: &str) -> CommandResult<bool> {
    let (_, inverted) = setup(prog, prom)?;
    let blank = prog.is_blank(inverted)?;
    if blank {
        println!("Device is blank");
    } else {
        println!("Device is NOT blank");
    }
    Ok(blank)
}

/// Run the program command
pub fn run_program(
    prog: &mut Session,
    prom: &str,
    input: &Path,
    continue_on_error: bool,
) -> CommandResult<()> {
    let (prom, _) = setup(prog, prom)?;

    let file = File::open(input)?;
    let file_len = file.metadata()?.len();
    if file_len > prom.byte_len() as u64 {
        return Err(format!(
            "{:?} is {} bytes but {} holds only {}",
            input,
            file_len,
            prom.name,
            prom.byte_len()
        )
        .into());
    }

    let mut source = ProgressReader {
        inner: file,
        bar: progress_bar(file_len)?,
    };
    prog.program(&mut source, continue_on_error)?;
    source.bar.finish_with_message("Programming complete");

    println!("Programmed {} bytes to {}", file_len, prom.name);
    Ok(())
}

/// Run the verify command. Returns whether the contents match.
pub fn run_verify(
    prog: &mut Session,
    prom: &str,
    input: &Path,
    margin: bool,
) -> CommandResult<bool> {
    let (_, inverted) = setup(prog, prom)?;

    let mut file = File::open(input)?;
    let matches = prog.verify(&mut file, inverted, margin)?;
    if matches {
        println!("Verify OK");
    } else {
        println!("Verify FAILED: device contents differ from {:?}", input);
    }
    Ok(matches)
}

/// Run the program-reset command
pub fn run_program_reset(prog: &mut Session, prom: &str) -> CommandResult<()> {
    let (_, inverted) = setup(prog, prom)?;
    if inverted {
        println!("Reset polarity already inverted; nothing to do");
        return Ok(());
    }
    prog.program_reset_polarity()?;
    if !prog.is_reset_inverted()? {
        return Err("reset polarity did not read back as inverted".into());
    }
    println!("Reset polarity programmed to inverted (active low)");
    Ok(())
}

/// List all supported PROM models
pub fn list_proms() {
    println!("Supported PROM models:");
    println!();
    println!(
        "{:<12} {:<24} {:>6} {:>10} {:>6}",
        "model", "name", "id", "bytes", "word"
    );
    for alias in prom_names() {
        // Every alias in the table resolves
        if let Some(prom) = find_prom(alias) {
            println!(
                "{:<12} {:<24} {:>#6x} {:>10} {:>6}",
                alias,
                prom.name,
                prom.code,
                prom.byte_len(),
                prom.word_width() * 8,
            );
        }
    }
}
