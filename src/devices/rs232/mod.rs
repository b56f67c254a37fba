//! RS-232 bridge between the emulated UART and a host device
//!
//! Outbound bytes are written straight to the host device, which is opened
//! lazily on the first transfer. Inbound bytes are collected by a background
//! [`ReaderTask`] into an [`InputRingBuffer`] that the emulator drains at its
//! own pace.
//!
//! Line-control parameters are accepted and decoded but never applied to the
//! host device; see [`Rs232Bridge::configure`].
//!
//! Lock order is endpoint, then input buffer. The line-settings lock is never
//! held while taking another.

pub mod endpoint;
pub mod reader;
pub mod ring_buffer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Rs232Config;
use crate::line::LineSettings;
use crate::{Error, Result};

pub use self::endpoint::{ConnectionState, HostEndpoint};
pub use self::reader::{ReaderState, ReaderTask};
pub use self::ring_buffer::{InputRingBuffer, PushOutcome, INPUT_BUFFER_SLOTS};

use self::reader::Pauses;

/// Back-off while the host refuses more output.
const WRITE_RETRY_PAUSE: Duration = Duration::from_millis(1);

/// Direction of traffic reported to an [`ActivityIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Emulator to host
    Outbound,
    /// Host to emulator buffer
    Inbound,
}

/// Observer for serial traffic, e.g. a status-bar icon.
///
/// Called from both the emulator thread and the reader thread after the
/// bridge has released its locks, so implementations may query the bridge.
/// Slow implementations still delay the calling thread.
pub trait ActivityIndicator: Send + Sync {
    fn on_activity(&self, direction: Direction, bytes: usize);
}

/// Point-in-time traffic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub bytes_out: u64,
    pub bytes_in: u64,
    /// Buffered bytes discarded because the input buffer overflowed
    pub bytes_dropped: u64,
    pub opens: u64,
    pub failed_opens: u64,
}

#[derive(Default)]
struct BridgeStats {
    bytes_out: AtomicU64,
    bytes_in: AtomicU64,
    bytes_dropped: AtomicU64,
    opens: AtomicU64,
    failed_opens: AtomicU64,
}

impl BridgeStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            opens: self.opens.load(Ordering::Relaxed),
            failed_opens: self.failed_opens.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the emulator thread and the reader thread.
pub(crate) struct Shared {
    pub(crate) endpoint: Mutex<HostEndpoint>,
    pub(crate) input: Mutex<InputRingBuffer>,
    stats: BridgeStats,
    indicator: Option<Arc<dyn ActivityIndicator>>,
}

impl Shared {
    /// Queue bytes from the host. Caller holds the endpoint lock and reports
    /// the activity with [`Shared::notify`] once it has released it.
    pub(crate) fn receive(&self, bytes: &[u8]) {
        let dropped = lock(&self.input).extend_from_slice(bytes);
        if dropped > 0 {
            warn!("RS-232 input overrun, dropped {} oldest bytes", dropped);
            self.stats
                .bytes_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
        self.stats
            .bytes_in
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
    }

    pub(crate) fn notify(&self, direction: Direction, bytes: usize) {
        if let Some(ref indicator) = self.indicator {
            indicator.on_activity(direction, bytes);
        }
    }
}

/// Lock a mutex, recovering the data if another thread panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The emulator-facing RS-232 port.
///
/// One instance stands in for the machine's single serial port. It is
/// created by the emulator, started with [`init`](Self::init) and torn down
/// with [`shutdown`](Self::shutdown) or by dropping it.
pub struct Rs232Bridge {
    config: Rs232Config,
    shared: Arc<Shared>,
    reader: Mutex<Option<ReaderTask>>,
    line: Mutex<LineSettings>,
}

impl Rs232Bridge {
    /// Create a bridge. Nothing is opened or spawned until used.
    pub fn new(config: Rs232Config) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a bridge that reports traffic to `indicator`.
    pub fn with_indicator(
        config: Rs232Config,
        indicator: Arc<dyn ActivityIndicator>,
    ) -> Result<Self> {
        Self::build(config, Some(indicator))
    }

    fn build(config: Rs232Config, indicator: Option<Arc<dyn ActivityIndicator>>) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            endpoint: Mutex::new(HostEndpoint::new(&config.device_path)),
            input: Mutex::new(InputRingBuffer::new()),
            stats: BridgeStats::default(),
            indicator,
        });
        let line = Mutex::new(config.default_line.decode());
        Ok(Self {
            config,
            shared,
            reader: Mutex::new(None),
            line,
        })
    }

    pub fn config(&self) -> &Rs232Config {
        &self.config
    }

    /// Start the background reader. The host endpoint stays closed.
    ///
    /// Does nothing if the reader is disabled or already running. A reader
    /// that cannot be spawned leaves the bridge output-only.
    pub fn init(&self) {
        if !self.config.reader_enabled {
            debug!("RS-232 reader disabled by configuration");
            return;
        }

        let mut reader = lock(&self.reader);
        if reader.is_some() {
            return;
        }

        let pauses = Pauses {
            poll: self.config.poll_interval,
            idle: self.config.idle_interval,
        };
        match ReaderTask::spawn(self.shared.clone(), pauses) {
            Ok(task) => {
                *reader = Some(task);
                info!("RS-232 bridge started for {}", self.config.device_path.display());
            }
            Err(e) => warn!("RS-232 input unavailable: {}", e),
        }
    }

    /// Stop the reader, then close the host endpoint. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let task = lock(&self.reader).take();
        if let Some(task) = task {
            if let Err(e) = task.stop() {
                warn!("RS-232 reader did not stop cleanly: {}", e);
            }
            debug!("RS-232 reader stopped");
        }

        let mut endpoint = lock(&self.shared.endpoint);
        if endpoint.is_connected() {
            endpoint.close();
            lock(&self.shared.input).clear();
            info!("RS-232 bridge shut down");
        }
    }

    /// Accept the emulated UART's line parameters.
    ///
    /// The values are decoded, logged and remembered for
    /// [`line_settings`](Self::line_settings), but not applied to the host
    /// device: baud rate, parity, stop bits and handshake have no effect on
    /// the bytes exchanged. Never fails and never changes the connection.
    pub fn configure(&self, baud: u32, ctrl: u16, ucr: u16) -> LineSettings {
        let settings = LineSettings::decode(baud, ctrl, ucr);
        if baud == 0 {
            warn!("RS-232 configured with zero baud rate");
        }
        debug!(
            "RS-232 configure(baud={}, ctrl={:#06x}, ucr={:#06x}) -> {}",
            baud, ctrl, ucr, settings
        );
        *lock(&self.line) = settings;
        settings
    }

    /// Line parameters most recently passed to [`configure`](Self::configure).
    pub fn line_settings(&self) -> LineSettings {
        *lock(&self.line)
    }

    /// Send bytes to the host device, opening it first if needed.
    ///
    /// Blocks until the bytes are written and flushed. Fails with
    /// [`Error::Disabled`] when RS-232 is off and nothing is open, or with
    /// [`Error::DeviceOpen`] when the device cannot be opened. While the host
    /// is not accepting output the endpoint lock is released, so the reader
    /// keeps draining and `shutdown` can close the endpoint; a transfer cut
    /// short that way fails with [`Error::NotConnected`].
    pub fn transfer_out(&self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;
        let mut first_attempt = true;

        loop {
            let mut endpoint = lock(&self.shared.endpoint);

            if !endpoint.is_connected() {
                if !first_attempt {
                    warn!(
                        "RS-232 endpoint closed after {} of {} bytes",
                        written,
                        bytes.len()
                    );
                    return Err(Error::NotConnected);
                }
                if !self.config.enabled {
                    return Err(Error::Disabled);
                }
                self.open_endpoint(&mut endpoint)?;
            }
            first_attempt = false;

            while written < bytes.len() {
                match endpoint.try_write(&bytes[written..]) {
                    Ok(0) => break,
                    Ok(n) => written += n,
                    Err(e) => {
                        warn!("RS-232 write failed: {}", e);
                        return Err(e);
                    }
                }
            }

            if written == bytes.len() {
                endpoint.flush().inspect_err(|e| {
                    warn!("RS-232 flush failed: {}", e);
                })?;
                break;
            }

            drop(endpoint);
            thread::sleep(WRITE_RETRY_PAUSE);
        }

        self.shared
            .stats
            .bytes_out
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        self.shared.notify(Direction::Outbound, bytes.len());
        Ok(())
    }

    fn open_endpoint(&self, endpoint: &mut HostEndpoint) -> Result<()> {
        if let Err(e) = endpoint.open() {
            self.shared
                .stats
                .failed_opens
                .fetch_add(1, Ordering::Relaxed);
            warn!("{}", e);
            return Err(e);
        }
        self.shared.stats.opens.fetch_add(1, Ordering::Relaxed);

        let line = self.config.default_line;
        self.configure(line.baud, line.ctrl, line.ucr);
        Ok(())
    }

    /// Move buffered input into `buf`, returning how many bytes were copied.
    ///
    /// A read larger than what is buffered is truncated to the buffered
    /// amount. Fails with [`Error::NotConnected`] when no endpoint is open,
    /// leaving `buf` untouched, and with [`Error::BufferUnderflow`] when
    /// nothing at all is buffered.
    pub fn read_in(&self, buf: &mut [u8]) -> Result<usize> {
        let endpoint = lock(&self.shared.endpoint);
        if !endpoint.is_connected() {
            return Err(Error::NotConnected);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let copied = lock(&self.shared.input).drain_into(buf);
        if copied == 0 {
            return Err(Error::BufferUnderflow);
        }
        Ok(copied)
    }

    /// True when connected and at least one byte is buffered.
    pub fn status_has_input(&self) -> bool {
        let endpoint = lock(&self.shared.endpoint);
        endpoint.is_connected() && !lock(&self.shared.input).is_empty()
    }

    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.shared.endpoint).state()
    }

    /// State of the reader loop, or `None` if it is not running.
    pub fn reader_state(&self) -> Option<ReaderState> {
        lock(&self.reader).as_ref().map(ReaderTask::state)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for Rs232Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
