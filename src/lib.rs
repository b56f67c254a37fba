//! rs232-bridge: Host-side RS-232 for emulated machines
//!
//! Connects an emulator's virtual UART to a host device or file so guest
//! software talking to its serial port reaches a real line (or a capture
//! file) unchanged.
//!
//! - **Lazy connection**: the host device is opened on the first outbound byte
//! - **Buffered input**: a background reader queues incoming bytes in a
//!   fixed-size ring buffer, dropping the oldest on overrun
//! - **Advisory line control**: baud, parity and handshake are decoded and
//!   reported, never applied to the host device
//!
//! # Example
//!
//! ```no_run
//! use rs232_bridge::{Rs232Bridge, Rs232Config};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Rs232Config::default()
//!         .device_path("/dev/ttyUSB0")
//!         .enabled(true);
//!
//!     let bridge = Rs232Bridge::new(config)?;
//!     bridge.init();
//!
//!     bridge.transfer_out(b"ATZ\r")?;
//!     if bridge.status_has_input() {
//!         let mut reply = [0u8; 16];
//!         let n = bridge.read_in(&mut reply)?;
//!         println!("modem said {:?}", &reply[..n]);
//!     }
//!
//!     bridge.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod devices;
pub mod error;
pub mod line;

// Re-exports for convenience
pub use config::Rs232Config;
pub use devices::rs232::{
    ActivityIndicator, ConnectionState, Direction, ReaderState, Rs232Bridge, StatsSnapshot,
};
pub use error::{Error, Result};
pub use line::{LineParams, LineSettings};
