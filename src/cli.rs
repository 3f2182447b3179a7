//! CLI argument parsing

use clap::{Parser, Subcommand};
use promprog_core::prom_names;
use promprog_device::VoltageMode;
use std::path::PathBuf;

/// Generate dynamic help text for the PROM model argument
fn prom_help() -> String {
    format!(
        "PROM model [available: {}]",
        prom_names().collect::<Vec<_>>().join(", ")
    )
}

/// Generate dynamic help text for the voltage mode argument
fn voltage_help() -> String {
    format!(
        "Voltage mode [available: {}]",
        VoltageMode::names().collect::<Vec<_>>().join(", ")
    )
}

#[derive(Parser)]
#[command(name = "promprog")]
#[command(author, version, about = "XC17xxx serial PROM programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show programmer version information
    Info {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,
    },

    /// Round-trip a test pattern through the programmer's buffer RAM
    TestEcho {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,
    },

    /// Switch on one supply voltage for bench testing.
    /// Never use this with a PROM in the socket.
    TestVoltage {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// Voltage mode
        #[arg(long, help = voltage_help())]
        voltage: String,
    },

    /// Verify the inserted device's identity against a PROM model
    Detect {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,
    },

    /// Read the reset-polarity word (exit code 0 if inverted, 1 otherwise)
    ReadReset {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,
    },

    /// Read the device contents to a file
    Read {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Read with the reduced-margin verify supply
        #[arg(long)]
        margin: bool,
    },

    /// Check whether the device is blank (exit code 1 if not)
    Blank {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,
    },

    /// Program the device from a file
    Program {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Keep programming remaining chunks after a failed one
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Verify the device contents against a file (exit code 1 on mismatch)
    Verify {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,

        /// Input file path to verify against
        #[arg(short, long)]
        input: PathBuf,

        /// Verify with the reduced-margin verify supply
        #[arg(long)]
        margin: bool,
    },

    /// Program the reset-inverted bit (make reset active low)
    ProgramReset {
        /// Serial port of the programmer
        #[arg(short, long)]
        port: String,

        /// PROM model
        #[arg(long, help = prom_help())]
        prom: String,
    },

    /// List supported PROM models
    ListProms,
}
