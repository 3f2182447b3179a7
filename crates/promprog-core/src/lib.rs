//! promprog-core - XC17xxx PROM profile database
//!
//! Static electrical/timing profiles for the Xilinx XC17xxx family of
//! one-time-programmable serial configuration PROMs, looked up by model
//! name. The protocol engine in `promprog-device` consumes these records;
//! it never invents electrical parameters on its own.

pub mod prom;

pub use prom::{find_prom, prom_names, PromFlags, PromProfile, XILINX_MANUFACTURER_ID};
