//! Line-oriented SCPI over any async byte stream.
//!
//! Raw TCP sockets and serial ports speak the same protocol: commands end with the
//! write terminator, replies end with the read terminator, binary replies are
//! IEEE blocks. [`StreamTransport`] implements that once for both.

use super::framing::{discard_pending, read_block, read_line, reply_text};
use super::Transport;
use crate::error::{AppResult, ScpiError};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// SCPI transport over a buffered async stream.
pub struct StreamTransport<S> {
    resource: String,
    stream: Mutex<BufReader<S>>,
    timeout: Duration,
    write_terminator: String,
    read_terminator: u8,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already connected stream.
    pub fn new(
        resource: impl Into<String>,
        stream: S,
        timeout: Duration,
        write_terminator: impl Into<String>,
        read_terminator: u8,
    ) -> Self {
        Self {
            resource: resource.into(),
            stream: Mutex::new(BufReader::new(stream)),
            timeout,
            write_terminator: write_terminator.into(),
            read_terminator,
        }
    }

    /// Reply timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn send(&self, stream: &mut BufReader<S>, command: &str) -> AppResult<()> {
        let cmd = format!("{}{}", command, self.write_terminator);
        tracing::debug!("SCPI write to {}: {:?}", self.resource, command);
        let inner = stream.get_mut();
        inner.write_all(cmd.as_bytes()).await.map_err(|e| {
            ScpiError::Transport(format!("Failed to write '{}' to {}: {}", command, self.resource, e))
        })?;
        inner.flush().await?;
        Ok(())
    }

    async fn with_deadline<T, F>(&self, command: &str, read: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        timeout(self.timeout, read)
            .await
            .map_err(|_| ScpiError::Timeout {
                command: command.to_string(),
                waited: self.timeout,
            })?
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        let mut stream = self.stream.lock().await;
        self.send(&mut stream, command).await
    }

    async fn query_with_delay(&self, command: &str, delay: Duration) -> AppResult<String> {
        let mut stream = self.stream.lock().await;
        discard_pending(&mut *stream).await?;
        self.send(&mut stream, command).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let raw = self
            .with_deadline(command, read_line(&mut *stream, self.read_terminator))
            .await?;
        let answer = reply_text(&raw);
        tracing::debug!("SCPI reply from {}: {:?}", self.resource, answer);
        Ok(answer)
    }

    async fn query_block(&self, command: &str) -> AppResult<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        discard_pending(&mut *stream).await?;
        self.send(&mut stream, command).await?;
        let raw = self
            .with_deadline(command, read_block(&mut *stream, self.read_terminator))
            .await?;
        tracing::debug!("SCPI block from {}: {} bytes", self.resource, raw.len());
        Ok(raw)
    }

    async fn read_raw(&self) -> AppResult<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        self.with_deadline("<read>", read_line(&mut *stream, self.read_terminator))
            .await
    }

    async fn close(&self) -> AppResult<()> {
        let mut stream = self.stream.lock().await;
        stream.get_mut().shutdown().await?;
        tracing::info!("Closed {}", self.resource);
        Ok(())
    }
}
