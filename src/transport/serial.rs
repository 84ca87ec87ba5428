//! Serial line SCPI (`ASRL<port>::INSTR`).

use super::stream::StreamTransport;
use crate::config::TransportSettings;
use crate::error::{AppResult, ScpiError};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// SCPI over a serial port.
pub type SerialTransport = StreamTransport<SerialStream>;

/// Open `path` at the configured baud rate, 8N1 without flow control.
pub fn open(resource: &str, path: &str, settings: &TransportSettings) -> AppResult<SerialTransport> {
    let port = tokio_serial::new(path, settings.baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .timeout(settings.timeout())
        .open_native_async()
        .map_err(|e| ScpiError::Transport(format!("Failed to open serial port {}: {}", path, e)))?;

    tracing::info!("Opened {} on {} at {} baud", resource, path, settings.baud_rate);

    Ok(StreamTransport::new(
        resource,
        port,
        settings.timeout(),
        settings.write_terminator.clone(),
        super::terminator_byte(settings)?,
    ))
}
