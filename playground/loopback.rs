//! RS-232 Loopback Playground
//!
//! Bridges a virtual serial port to a FIFO opened read/write, so everything
//! "the guest" sends comes straight back as input. Shows the lazy open, the
//! background reader and the advisory line configuration.
//!
//! Run:
//!   RUST_LOG=rs232_bridge=debug cargo run --example loopback
//!
//! Or against a real device / pty:
//!   RS232_DEVICE=/dev/pts/7 cargo run --example loopback

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::{Duration, Instant};

use rs232_bridge::{Rs232Bridge, Rs232Config};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let dir = tempfile::tempdir()?;
    let fifo = dir.path().join("loopback");
    mkfifo(&fifo)?;

    let config = Rs232Config::new()
        .device_path(&fifo)
        .enabled(true)
        .with_env_overrides();
    println!("device: {}", config.device_path.display());

    let bridge = Rs232Bridge::new(config)?;
    bridge.init();

    // 19200 baud, RTS/CTS, 8E1: logged, not applied
    let line = bridge.configure(19200, 0x02, 0x0E);
    println!("line: {}", line);

    let message = b"Hello from the guest\r\n";
    bridge.transfer_out(message)?;
    println!("sent {} bytes", message.len());

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(2);
    while received.len() < message.len() && Instant::now() < deadline {
        if bridge.status_has_input() {
            let mut buf = [0u8; 32];
            let n = bridge.read_in(&mut buf)?;
            received.extend_from_slice(&buf[..n]);
        } else {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    println!("received: {:?}", String::from_utf8_lossy(&received));
    println!("stats: {}", serde_json::to_string(&bridge.stats())?);

    bridge.shutdown();
    Ok(())
}

fn mkfifo(path: &Path) -> std::io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
