//! Raw-socket SCPI (`TCPIP0::host::port::SOCKET`).

use super::stream::StreamTransport;
use crate::config::TransportSettings;
use crate::error::{AppResult, ScpiError};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default SCPI raw socket port.
pub const DEFAULT_PORT: u16 = 5025;

/// SCPI over a TCP connection.
pub type TcpTransport = StreamTransport<TcpStream>;

/// Connect to `host:port`.
pub async fn connect(
    resource: &str,
    host: &str,
    port: u16,
    settings: &TransportSettings,
) -> AppResult<TcpTransport> {
    let address = format!("{}:{}", host, port);
    let stream = timeout(settings.timeout(), TcpStream::connect(&address))
        .await
        .map_err(|_| ScpiError::Timeout {
            command: format!("connect {}", address),
            waited: settings.timeout(),
        })?
        .map_err(|e| ScpiError::Transport(format!("Failed to connect to {}: {}", address, e)))?;

    // Commands are short; do not let Nagle hold them back
    stream.set_nodelay(true)?;

    tracing::info!("Connected to {} at {}", resource, address);

    Ok(StreamTransport::new(
        resource,
        stream,
        settings.timeout(),
        settings.write_terminator.clone(),
        super::terminator_byte(settings)?,
    ))
}
