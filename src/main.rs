//! promprog - programmer frontend for Xilinx XC17xxx serial PROMs
//!
//! Drives an FPGA-based programmer over a serial link: the host streams
//! framed commands and image data, the device handles the electrical
//! sequencing. Every device operation configures the programmer for the
//! selected PROM model, verifies the inserted device's identity word and
//! reads its reset polarity before touching any data.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

/// Default log filter for a `-v` count; `RUST_LOG` still overrides it
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    match cli.command {
        Commands::Info { port } => {
            let mut prog = commands::open(&port)?;
            commands::run_info(&mut prog)
        }
        Commands::TestEcho { port } => {
            let mut prog = commands::open(&port)?;
            commands::run_test_echo(&mut prog)
        }
        Commands::TestVoltage { port, voltage } => {
            let mut prog = commands::open(&port)?;
            commands::run_test_voltage(&mut prog, &voltage)
        }
        Commands::Detect { port, prom } => {
            let mut prog = commands::open(&port)?;
            commands::run_detect(&mut prog, &prom)
        }
        Commands::ReadReset { port, prom } => {
            let mut prog = commands::open(&port)?;
            let inverted = commands::run_read_reset(&mut prog, &prom)?;
            if !inverted {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Read {
            port,
            prom,
            output,
            margin,
        } => {
            let mut prog = commands::open(&port)?;
            commands::run_read(&mut prog, &prom, &output, margin)
        }
        Commands::Blank { port, prom } => {
            let mut prog = commands::open(&port)?;
            let blank = commands::run_blank(&mut prog, &prom)?;
            if !blank {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Program {
            port,
            prom,
            input,
            continue_on_error,
        } => {
            let mut prog = commands::open(&port)?;
            commands::run_program(&mut prog, &prom, &input, continue_on_error)
        }
        Commands::Verify {
            port,
            prom,
            input,
            margin,
        } => {
            let mut prog = commands::open(&port)?;
            let matches = commands::run_verify(&mut prog, &prom, &input, margin)?;
            if !matches {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::ProgramReset { port, prom } => {
            let mut prog = commands::open(&port)?;
            commands::run_program_reset(&mut prog, &prom)
        }
        Commands::ListProms => {
            commands::list_proms();
            Ok(())
        }
    }
}
