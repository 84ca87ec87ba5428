//! Custom error types for the library.
//!
//! This module defines the primary error type, `ScpiError`, shared by every layer of the
//! crate. Using the `thiserror` crate, it provides a centralized and consistent way to
//! handle everything that can go wrong while talking to an instrument, from I/O and
//! configuration problems to values the instrument would reject.
//!
//! ## Error Hierarchy
//!
//! - **`Config`** / **`Configuration`**: figment extraction failures and semantic
//!   validation failures of an otherwise well-formed configuration.
//! - **`Io`**: file and socket I/O, including session log and array file writes.
//! - **`Transport`**, **`Timeout`**, **`ConnectionClosed`**: the communication channel.
//! - **`InvalidOption`**, **`OutOfRange`**: a setting was rejected before anything was
//!   sent to the instrument. Both carry enough context to tell the user what is allowed.
//! - **`Parse`**, **`Block`**: a reply could not be decoded as requested.
//! - **`Buffer`**: misuse of an instrument data buffer.
//! - **`FeatureNotEnabled`**: a transport that was compiled out was requested.
//!
//! By using `#[from]`, `ScpiError` can be created from the underlying error types,
//! so the `?` operator works throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the library error type.
pub type AppResult<T> = std::result::Result<T, ScpiError>;

/// Everything that can fail in a session.
#[derive(Error, Debug)]
pub enum ScpiError {
    /// Figment could not extract the configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// The configuration parsed but holds unusable values.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// File or socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The communication channel failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply, or a poll that never completed.
    #[error("Timed out after {waited:?} waiting for '{command}'")]
    Timeout {
        /// Command that was waiting for a reply
        command: String,
        /// How long we waited
        waited: Duration,
    },

    /// The instrument closed the connection.
    #[error("Connection closed by instrument")]
    ConnectionClosed,

    /// Value does not name any entry of an option table.
    #[error("Invalid value '{value}' for {setting}. Valid choices: {}", choices.join(", "))]
    InvalidOption {
        /// Setting being changed
        setting: String,
        /// Value as given by the caller
        value: String,
        /// Every accepted choice
        choices: Vec<String>,
    },

    /// Numeric setpoint outside the documented instrument range.
    #[error("{setting} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Setting being changed
        setting: String,
        /// Rejected value
        value: f64,
        /// Lower bound (inclusive)
        min: f64,
        /// Upper bound (inclusive)
        max: f64,
    },

    /// Reply could not be decoded.
    #[error("Could not parse reply to '{command}' ({answer:?}): {reason}")]
    Parse {
        /// Command whose reply failed to decode
        command: String,
        /// Raw reply text
        answer: String,
        /// What went wrong
        reason: String,
    },

    /// Malformed IEEE 488.2 binary block.
    #[error("Malformed binary block: {0}")]
    Block(String),

    /// Instrument data buffer misuse.
    #[error("Buffer error: {0}")]
    Buffer(String),

    /// Malformed saved array file.
    #[error("Array file error: {0}")]
    ArrayFile(String),

    /// Requested functionality was compiled out.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

impl From<figment::Error> for ScpiError {
    fn from(err: figment::Error) -> Self {
        ScpiError::Config(Box::new(err))
    }
}

impl ScpiError {
    /// Shorthand for a [`ScpiError::Parse`] error.
    pub fn parse(command: &str, answer: &str, reason: impl Into<String>) -> Self {
        ScpiError::Parse {
            command: command.to_string(),
            answer: answer.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_option_lists_choices() {
        let err = ScpiError::InvalidOption {
            setting: "Reference source".into(),
            value: "Auto".into(),
            choices: vec!["External".into(), "Internal".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'Auto' for Reference source. Valid choices: External, Internal"
        );
    }

    #[test]
    fn out_of_range_display() {
        let err = ScpiError::OutOfRange {
            setting: "Amplitude".into(),
            value: 6.0,
            min: 0.004,
            max: 5.0,
        };
        assert!(err.to_string().contains("Amplitude = 6 is out of range"));
    }

    #[test]
    fn io_errors_convert() {
        fn fails() -> AppResult<()> {
            Err(std::io::Error::from(std::io::ErrorKind::NotFound))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(ScpiError::Io(_))));
    }
}
