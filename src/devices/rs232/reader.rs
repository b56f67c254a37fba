//! Background thread feeding the input ring buffer
//!
//! The reader polls the host endpoint while it is open and idles while it is
//! closed. It stops cooperatively: the stop flag is checked once per loop, so
//! shutdown waits at most one pause interval and never while a lock is held.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::{lock, Direction, Shared};
use crate::{Error, Result};

/// Largest number of bytes moved from the host per poll.
const READ_CHUNK: usize = 64;

/// Observable state of the reader loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReaderState {
    /// No endpoint open; waiting for a connection
    Idle = 0,
    /// Endpoint open; waiting for bytes
    Polling = 1,
    /// Stop requested; the loop has exited or is about to
    Stopped = 2,
}

impl ReaderState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReaderState::Idle,
            1 => ReaderState::Polling,
            _ => ReaderState::Stopped,
        }
    }
}

/// Pause lengths for the two waiting states.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pauses {
    pub poll: Duration,
    pub idle: Duration,
}

/// Handle to the running reader thread.
pub struct ReaderTask {
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderTask {
    /// Spawn the reader thread.
    pub(crate) fn spawn(shared: Arc<Shared>, pauses: Pauses) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(ReaderState::Idle as u8));

        let stop_clone = stop.clone();
        let state_clone = state.clone();
        let handle = thread::Builder::new()
            .name("rs232-reader".into())
            .spawn(move || reader_thread(shared, pauses, stop_clone, state_clone))
            .map_err(|e| Error::Thread(format!("failed to spawn rs232-reader: {}", e)))?;
        debug!("Spawned rs232-reader thread");

        Ok(Self {
            stop,
            state,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Request the loop to exit and wait for it.
    pub fn stop(mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Thread("rs232-reader thread panic".into())),
            None => Ok(()),
        }
    }
}

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

fn reader_thread(
    shared: Arc<Shared>,
    pauses: Pauses,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
) {
    let mut buf = [0u8; READ_CHUNK];
    let set_state = |next: ReaderState| {
        let prev = state.swap(next as u8, Ordering::SeqCst);
        if prev != next as u8 {
            debug!(
                "rs232-reader {:?} -> {:?}",
                ReaderState::from_u8(prev),
                next
            );
        }
    };

    while !stop.load(Ordering::SeqCst) {
        let mut received = 0;
        let pause = {
            let mut endpoint = lock(&shared.endpoint);
            if !endpoint.is_connected() {
                set_state(ReaderState::Idle);
                pauses.idle
            } else {
                set_state(ReaderState::Polling);
                match endpoint.read_available(&mut buf) {
                    Ok(0) => pauses.poll,
                    Ok(n) => {
                        trace!("RS-232 RX {} bytes", n);
                        // Pushed while the endpoint lock is still held, so a
                        // concurrent close cannot interleave with this batch.
                        shared.receive(&buf[..n]);
                        received = n;
                        Duration::ZERO
                    }
                    Err(e) => {
                        warn!("RS-232 read failed, closing endpoint: {}", e);
                        endpoint.close();
                        lock(&shared.input).clear();
                        pauses.idle
                    }
                }
            }
        };

        if received > 0 {
            shared.notify(Direction::Inbound, received);
        }
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }

    set_state(ReaderState::Stopped);
    debug!("rs232-reader thread exiting");
}
