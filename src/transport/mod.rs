//! Communication channels to instruments.
//!
//! Every channel implements [`Transport`]. Which one is used follows from the resource
//! address, parsed by [`ResourceAddress::parse`]:
//!
//! | Address                          | Transport                  |
//! |----------------------------------|----------------------------|
//! | `SIM`                            | [`SimTransport`]           |
//! | `TCPIP0::10.0.0.5::5025::SOCKET` | [`tcp::TcpTransport`]      |
//! | `ASRL/dev/ttyUSB0::INSTR`        | `serial::SerialTransport`  |
//! | `GPIB0::8::INSTR`, `USB0::…`     | `visa::VisaTransport`      |
//!
//! Implementations lock internally, so a write followed by its reply is never
//! interleaved with another caller's traffic.

use crate::config::TransportSettings;
use crate::error::{AppResult, ScpiError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

pub mod framing;
pub mod sim;
pub mod stream;
pub mod tcp;

#[cfg(feature = "instrument_serial")]
pub mod serial;

#[cfg(feature = "instrument_visa")]
pub mod visa;

pub use sim::SimTransport;

/// Command/response channel to one instrument.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address the channel was opened with.
    fn resource(&self) -> &str;

    /// Send a command; nothing is read back.
    async fn write(&self, command: &str) -> AppResult<()>;

    /// Send a command and read one reply line, trimmed.
    async fn query(&self, command: &str) -> AppResult<String> {
        self.query_with_delay(command, Duration::ZERO).await
    }

    /// Send a command, wait `delay`, then read one reply line, trimmed.
    ///
    /// The channel stays locked for the whole exchange.
    async fn query_with_delay(&self, command: &str, delay: Duration) -> AppResult<String>;

    /// Send a command and read a complete binary block reply, header included.
    async fn query_block(&self, command: &str) -> AppResult<Vec<u8>>;

    /// Read one terminated reply without sending anything first.
    async fn read_raw(&self) -> AppResult<Vec<u8>>;

    /// Release the channel.
    async fn close(&self) -> AppResult<()>;
}

/// Parsed resource address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    /// Built-in simulator
    Sim,
    /// Raw SCPI socket
    Socket {
        /// Host name or IP address
        host: String,
        /// TCP port
        port: u16,
    },
    /// Serial port
    Serial {
        /// Device path (`/dev/ttyUSB0`, `COM3`)
        path: String,
    },
    /// Anything else is handed to the VISA library as is
    Visa(String),
}

static SOCKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^TCPIP\d*::([^:]+)(?:::(\d+))?::SOCKET$").expect("Invalid socket regex")
});
static SERIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^ASRL(.+)::INSTR$").expect("Invalid serial regex"));

impl ResourceAddress {
    /// Classify a resource string.
    pub fn parse(resource: &str) -> AppResult<Self> {
        let resource = resource.trim();
        if resource.eq_ignore_ascii_case("SIM") {
            return Ok(ResourceAddress::Sim);
        }
        if let Some(caps) = SOCKET.captures(resource) {
            let port = match caps.get(2) {
                Some(p) => p.as_str().parse::<u16>().map_err(|_| {
                    ScpiError::Configuration(format!("Invalid port in resource '{}'", resource))
                })?,
                None => tcp::DEFAULT_PORT,
            };
            return Ok(ResourceAddress::Socket {
                host: caps[1].to_string(),
                port,
            });
        }
        if let Some(caps) = SERIAL.captures(resource) {
            return Ok(ResourceAddress::Serial {
                path: serial_device(&caps[1]),
            });
        }
        if resource.contains("::") {
            return Ok(ResourceAddress::Visa(resource.to_string()));
        }
        Err(ScpiError::Configuration(format!(
            "Unrecognized resource address '{}'",
            resource
        )))
    }
}

/// `ASRL3` names the third port the way the platform numbers them.
fn serial_device(port: &str) -> String {
    if port.chars().all(|c| c.is_ascii_digit()) {
        if cfg!(windows) {
            format!("COM{}", port)
        } else {
            format!("/dev/ttyS{}", port)
        }
    } else {
        port.to_string()
    }
}

/// Read terminator as a single byte.
pub(crate) fn terminator_byte(settings: &TransportSettings) -> AppResult<u8> {
    u8::try_from(settings.read_terminator)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            ScpiError::Configuration(format!(
                "read_terminator {:?} is not an ASCII character",
                settings.read_terminator
            ))
        })
}

/// Open the transport matching `address`.
pub async fn open_transport(
    address: &str,
    settings: &TransportSettings,
) -> AppResult<Box<dyn Transport>> {
    match ResourceAddress::parse(address)? {
        ResourceAddress::Sim => Ok(Box::new(SimTransport::new().with_echo(true))),
        ResourceAddress::Socket { host, port } => {
            Ok(Box::new(tcp::connect(address, &host, port, settings).await?))
        }
        ResourceAddress::Serial { path } => open_serial(address, &path, settings),
        ResourceAddress::Visa(resource) => open_visa(&resource, settings),
    }
}

#[cfg(feature = "instrument_serial")]
fn open_serial(
    address: &str,
    path: &str,
    settings: &TransportSettings,
) -> AppResult<Box<dyn Transport>> {
    Ok(Box::new(serial::open(address, path, settings)?))
}

#[cfg(not(feature = "instrument_serial"))]
fn open_serial(
    _address: &str,
    _path: &str,
    _settings: &TransportSettings,
) -> AppResult<Box<dyn Transport>> {
    Err(ScpiError::FeatureNotEnabled("instrument_serial".to_string()))
}

#[cfg(feature = "instrument_visa")]
fn open_visa(resource: &str, settings: &TransportSettings) -> AppResult<Box<dyn Transport>> {
    Ok(Box::new(visa::VisaTransport::open(resource, settings)?))
}

#[cfg(not(feature = "instrument_visa"))]
fn open_visa(_resource: &str, _settings: &TransportSettings) -> AppResult<Box<dyn Transport>> {
    Err(ScpiError::FeatureNotEnabled("instrument_visa".to_string()))
}
