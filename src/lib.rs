//! # Lab SCPI
//!
//! Command/response sessions with laboratory instruments that speak SCPI, plus
//! drivers for the instruments on our bench. Every session keeps a plain-text
//! journal of what was sent and received, so a measurement can be reconstructed
//! from its log and the array files next to it.
//!
//! ## Crate Structure
//!
//! - **`config`**: `LabConfig`, layered from defaults, a TOML file and `LAB_SCPI_*`
//!   environment variables with `figment`.
//! - **`error`**: the `ScpiError` enum and the `AppResult` alias.
//! - **`tracing_setup`**: diagnostics subscriber, configured from `LabConfig`.
//! - **`transport`**: the `Transport` trait and its TCP socket, serial, VISA and
//!   simulated implementations, selected from the resource address.
//! - **`codec`**: ASCII value lists, IEEE 488.2 binary blocks and sample scaling.
//! - **`options`**: enumerated settings (`OptionTable`) and bounded set-points
//!   (`Limited`), resolved the way front panels label them.
//! - **`log`**: the per-instrument journal file.
//! - **`storage`**: array files in `.npy` or `.csv`, with numbered names.
//! - **`session`**: `Session`, which ties a transport to its journal.
//! - **`instruments`**: SR830 lock-in, TDS oscilloscope and ITC4001 drivers.

pub mod codec;
pub mod config;
pub mod error;
pub mod instruments;
pub mod log;
pub mod options;
pub mod session;
pub mod storage;
pub mod tracing_setup;
pub mod transport;

pub use config::LabConfig;
pub use error::{AppResult, ScpiError};
pub use session::{Logging, Session};
pub use transport::{open_transport, SimTransport, Transport};
