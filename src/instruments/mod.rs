//! Instrument drivers built on [`Session`].
//!
//! - [`lockin`]: Stanford Research SR830 lock-in amplifier, organised in front-panel
//!   groups (reference, input, channels, auxiliary outputs, ...)
//! - [`oscilloscope`]: Tektronix TDS-style waveform capture
//! - [`itc4001`]: Thorlabs ITC4001 laser diode and TEC controller
//!
//! The helpers below turn validated settings into commands and enumerated replies
//! back into labels; every driver goes through them.

use crate::error::{AppResult, ScpiError};
use crate::options::{Limited, OptionTable, OptionValue};
use crate::session::{parse_integer, Logging, Session};

pub mod itc4001;
pub mod lockin;
pub mod oscilloscope;

/// Query an enumerated setting and return its label.
pub(crate) async fn read_label(
    session: &Session,
    query: &str,
    table: &OptionTable,
    logging: Logging,
) -> AppResult<&'static str> {
    let index = session.query_i64(query, logging).await?;
    let index = usize::try_from(index)
        .map_err(|_| ScpiError::parse(query, &index.to_string(), "negative option index"))?;
    table.label(index)
}

/// Resolve `value` in `table` and send `<header> <index>`.
pub(crate) async fn write_option(
    session: &Session,
    header: &str,
    table: &OptionTable,
    value: impl Into<OptionValue>,
    logging: Logging,
) -> AppResult<usize> {
    let index = table.index_of(value)?;
    session
        .write(&format!("{} {}", header, index), logging)
        .await?;
    Ok(index)
}

/// Validate `value` against `limit` and send `<header> <value>` at instrument precision.
pub(crate) async fn write_limited(
    session: &Session,
    header: &str,
    limit: &Limited,
    value: f64,
    logging: Logging,
) -> AppResult<f64> {
    let text = limit.format(value)?;
    session
        .write(&format!("{} {}", header, text), logging)
        .await?;
    limit.apply(value)
}

/// Reject integers outside `[min, max]`, such as channel or slot numbers.
pub(crate) fn check_range(setting: &str, value: i64, min: i64, max: i64) -> AppResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ScpiError::OutOfRange {
            setting: setting.to_string(),
            value: value as f64,
            min: min as f64,
            max: max as f64,
        })
    }
}

/// Split an `"a, b"` reply into two integers.
pub(crate) fn integer_pair(query: &str, answer: &str) -> AppResult<(i64, i64)> {
    let mut fields = answer.split(',').map(str::trim);
    match (fields.next(), fields.next(), fields.next()) {
        (Some(a), Some(b), None) => Ok((parse_integer(query, a)?, parse_integer(query, b)?)),
        _ => Err(ScpiError::parse(query, answer, "expected two comma separated values")),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::LabConfig;
    use crate::session::Session;
    use crate::transport::SimTransport;
    use std::path::Path;

    /// Configuration writing below `dir`, with fast polling.
    pub(crate) fn config(dir: &Path) -> LabConfig {
        let mut config = LabConfig::default().with_output_dir(dir);
        config.polling.interval_ms = 1;
        config.polling.timeout_ms = 100;
        config
    }

    /// Session on a clone of `sim`.
    pub(crate) async fn session(sim: &SimTransport, dir: &Path) -> Session {
        Session::open(Box::new(sim.clone()), &config(dir))
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs() {
        assert_eq!(integer_pair("DDEF? 1", "1,0").unwrap(), (1, 0));
        assert_eq!(integer_pair("OEXP? 1", " 2 , 1 ").unwrap(), (2, 1));
        assert!(integer_pair("DDEF? 1", "1").is_err());
        assert!(integer_pair("DDEF? 1", "1,2,3").is_err());
    }

    #[test]
    fn ranges() {
        assert!(check_range("Setup slot", 9, 1, 9).is_ok());
        assert!(matches!(
            check_range("Setup slot", 10, 1, 9),
            Err(ScpiError::OutOfRange { .. })
        ));
    }
}
