//! VISA resources (GPIB, USBTMC, VXI-11) through the system VISA library.
//!
//! `visa-rs` is blocking, so every exchange runs on tokio's blocking pool with the
//! instrument behind a standard mutex.

use super::framing::reply_text;
use super::Transport;
use crate::codec::BlockHeader;
use crate::config::TransportSettings;
use crate::error::{AppResult, ScpiError};
use async_trait::async_trait;
use std::ffi::CString;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use visa_rs::flags::AccessMode;
use visa_rs::{DefaultRM, Instrument};

const CHUNK: usize = 4096;

/// Instrument session together with the resource manager that opened it.
///
/// Closing the resource manager closes every session it opened, so it is kept
/// alive here and dropped after the instrument.
struct VisaSession {
    instrument: Instrument,
    _rm: DefaultRM,
}

/// SCPI over a VISA session.
pub struct VisaTransport {
    resource: String,
    session: Arc<Mutex<VisaSession>>,
    write_terminator: String,
    read_terminator: u8,
}

impl VisaTransport {
    /// Open `resource` through the default resource manager.
    pub fn open(resource: &str, settings: &TransportSettings) -> AppResult<Self> {
        let rm = DefaultRM::new().map_err(|e| {
            ScpiError::Transport(format!("Failed to initialize VISA resource manager: {:?}", e))
        })?;
        let name = CString::new(resource)
            .map_err(|_| ScpiError::Transport(format!("Invalid VISA resource '{}'", resource)))?;
        let instrument = rm
            .open(&name.into(), AccessMode::NO_LOCK, settings.timeout())
            .map_err(|e| {
                ScpiError::Transport(format!("Failed to open VISA resource {}: {:?}", resource, e))
            })?;

        tracing::info!("Opened VISA resource {}", resource);

        Ok(Self {
            resource: resource.to_string(),
            session: Arc::new(Mutex::new(VisaSession {
                instrument,
                _rm: rm,
            })),
            write_terminator: settings.write_terminator.clone(),
            read_terminator: super::terminator_byte(settings)?,
        })
    }

    async fn blocking<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Instrument) -> AppResult<T> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session.lock().unwrap_or_else(PoisonError::into_inner);
            op(&mut guard.instrument)
        })
        .await
        .map_err(|e| ScpiError::Transport(format!("VISA task failed: {}", e)))?
    }
}

fn send(instrument: &mut Instrument, command: &str, terminator: &str) -> AppResult<()> {
    instrument
        .write_all(format!("{}{}", command, terminator).as_bytes())
        .map_err(|e| ScpiError::Transport(format!("Failed to write '{}': {}", command, e)))
}

/// Read chunks until the reply ends with `terminator`.
fn receive_line(instrument: &mut Instrument, terminator: u8) -> AppResult<Vec<u8>> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; CHUNK];
    loop {
        let n = instrument
            .read(&mut chunk)
            .map_err(|e| ScpiError::Transport(format!("VISA read failed: {}", e)))?;
        if n == 0 {
            return Ok(raw);
        }
        raw.extend_from_slice(&chunk[..n]);
        if raw.last() == Some(&terminator) {
            return Ok(raw);
        }
    }
}

/// Read a whole block reply, using the declared length when there is one.
fn receive_block(instrument: &mut Instrument, terminator: u8) -> AppResult<Vec<u8>> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; CHUNK];
    loop {
        let n = instrument
            .read(&mut chunk)
            .map_err(|e| ScpiError::Transport(format!("VISA read failed: {}", e)))?;
        raw.extend_from_slice(&chunk[..n]);
        let complete = match BlockHeader::parse(&raw)? {
            Some(BlockHeader {
                header_len,
                payload_len: Some(len),
            }) => raw.len() >= header_len + len,
            Some(BlockHeader {
                payload_len: None, ..
            }) => raw.last() == Some(&terminator),
            None => false,
        };
        if complete || n == 0 {
            return Ok(raw);
        }
    }
}

#[async_trait]
impl Transport for VisaTransport {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        tracing::debug!("VISA write to {}: {:?}", self.resource, command);
        let command = command.to_string();
        let terminator = self.write_terminator.clone();
        self.blocking(move |inst| send(inst, &command, &terminator))
            .await
    }

    async fn query_with_delay(&self, command: &str, delay: Duration) -> AppResult<String> {
        let owned = command.to_string();
        let terminator = self.write_terminator.clone();
        let read_terminator = self.read_terminator;
        let raw = self
            .blocking(move |inst| {
                send(inst, &owned, &terminator)?;
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                receive_line(inst, read_terminator)
            })
            .await?;
        let answer = reply_text(&raw);
        tracing::debug!("VISA reply from {}: {:?}", self.resource, answer);
        Ok(answer)
    }

    async fn query_block(&self, command: &str) -> AppResult<Vec<u8>> {
        let owned = command.to_string();
        let terminator = self.write_terminator.clone();
        let read_terminator = self.read_terminator;
        self.blocking(move |inst| {
            send(inst, &owned, &terminator)?;
            receive_block(inst, read_terminator)
        })
        .await
    }

    async fn read_raw(&self) -> AppResult<Vec<u8>> {
        let read_terminator = self.read_terminator;
        self.blocking(move |inst| receive_line(inst, read_terminator))
            .await
    }

    async fn close(&self) -> AppResult<()> {
        // Instrument and resource manager sessions are released on drop
        tracing::info!("Closed {}", self.resource);
        Ok(())
    }
}
