//! promprog-device - Serial protocol engine for the XC17xxx PROM programmer
//!
//! This crate drives the FPGA-based XC17xxx PROM programmer over a
//! point-to-point serial link. The host sends 6-byte command frames (or
//! length-prefixed data frames) and receives a single result byte per
//! frame; electrically sensitive operations run asynchronously on the
//! device and are observed through a busy-poll loop.
//!
//! Streaming operations (read, program, blank check, verify) split the
//! device image into chunks of at most half the programmer's 4 KiB staging
//! buffer and alternate between the two buffer halves, so the host can
//! transfer chunk N+1 over the wire while the device is still executing
//! chunk N. That pipelining is the whole point of the buffer layout; see
//! [`buffer`].
//!
//! # Example
//!
//! ```no_run
//! use promprog_device::{PromProgrammer, SerialTransport};
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0")?;
//! let mut prog = PromProgrammer::new(transport)?;
//!
//! let info = prog.query_info()?;
//! println!("HDL version: {:?}", info.hdl_version);
//!
//! let profile = promprog_core::find_prom("xc1765e").unwrap();
//! prog.configure(*profile)?;
//! prog.verify_device_id()?;
//! # Ok::<(), promprog_device::Error>(())
//! ```

pub mod buffer;
pub mod device;
pub mod error;
pub mod protocol;
pub mod transport;

pub use device::{PowerState, PromProgrammer};
pub use error::{Error, Result};
pub use protocol::{HwType, ProgrammerInfo, ResultCode, VoltageMode};
pub use transport::{SerialTransport, Transport};
