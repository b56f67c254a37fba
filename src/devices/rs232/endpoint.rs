//! Host side of the serial cable
//!
//! A [`HostEndpoint`] owns the open device file while connected. It is never
//! shared directly: the bridge keeps it behind a mutex so the reader thread
//! and the emulator thread cannot observe a half-closed handle.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{info, trace};

use crate::{Error, Result};

/// Whether a host endpoint is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// The host device file and its connection state.
pub struct HostEndpoint {
    path: PathBuf,
    handle: Option<File>,
    is_tty: bool,
}

impl HostEndpoint {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            handle: None,
            is_tty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// True if the open endpoint is a terminal rather than a plain file or pipe.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Open the device for reading and writing.
    ///
    /// Opening an already connected endpoint is a no-op. Device nodes and
    /// FIFOs are opened as-is; a regular file is created or truncated, as a
    /// binary read/write stream would be.
    pub fn open(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let truncate = match fs::metadata(&self.path) {
            Ok(meta) => meta.is_file(),
            Err(e) => e.kind() == ErrorKind::NotFound,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&self.path)
            .map_err(|source| Error::DeviceOpen {
                path: self.path.clone(),
                source,
            })?;

        self.is_tty = rustix::termios::isatty(&file);
        self.handle = Some(file);

        info!(
            "Opened RS-232 endpoint {} (tty={})",
            self.path.display(),
            self.is_tty
        );
        Ok(())
    }

    /// Release the device handle. No-op when already disconnected.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            self.is_tty = false;
            info!("Closed RS-232 endpoint {}", self.path.display());
        }
    }

    /// Write as much of `bytes` as the host accepts right now.
    ///
    /// Returns `Ok(0)` when the host buffer is full. The caller decides how
    /// to wait; nothing here sleeps, so the endpoint lock is never held
    /// across a retry.
    pub fn try_write(&mut self, bytes: &[u8]) -> Result<usize> {
        let file = self.handle.as_mut().ok_or(Error::NotConnected)?;
        if bytes.is_empty() {
            return Ok(0);
        }
        loop {
            match file.write(bytes) {
                Ok(0) => {
                    return Err(Error::Io(io::Error::new(
                        ErrorKind::WriteZero,
                        "host endpoint accepted no bytes",
                    )))
                }
                Ok(n) => {
                    trace!("RS-232 TX {} bytes", n);
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        let file = self.handle.as_mut().ok_or(Error::NotConnected)?;
        file.flush()?;
        Ok(())
    }

    /// Read whatever the host has ready, without blocking.
    ///
    /// Returns `Ok(0)` on end of file or when no data is pending.
    pub fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.handle.as_mut().ok_or(Error::NotConnected)?;
        loop {
            match file.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(0),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for HostEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}
