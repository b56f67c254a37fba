//! Device emulation backends
//!
//! This module contains device implementations:
//! - RS-232 bridge from the emulated UART to a host character device

pub mod rs232;
