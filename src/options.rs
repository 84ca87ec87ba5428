//! Option tables and range limits for instrument settings.
//!
//! Instruments encode enumerated settings as an integer index into a fixed table
//! (`FMOD 1` selects the internal reference, `SENS 22` selects 100 mV). An
//! [`OptionTable`] translates whatever the user supplied (an index, a label such as
//! `"Internal"`, or a physical value such as `0.1`) into that index, and turns the
//! instrument's index back into a label. [`Limited`] does the same job for continuous
//! setpoints: range check plus rounding to the precision the instrument accepts.

use crate::error::{AppResult, ScpiError};
use std::fmt;

/// A value supplied for an enumerated setting.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Position in the option table
    Index(usize),
    /// Human-readable label, matched case-insensitively
    Label(String),
    /// Physical value, matched against the table's numeric values
    Number(f64),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Index(i) => write!(f, "{}", i),
            OptionValue::Label(s) => write!(f, "{}", s),
            OptionValue::Number(x) => write!(f, "{}", x),
        }
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        OptionValue::Index(value)
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Index(value as usize)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        // Negative indices can never match; keep them as numbers so the error shows them
        usize::try_from(value)
            .map(OptionValue::Index)
            .unwrap_or(OptionValue::Number(f64::from(value)))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Number(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Label(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Label(value)
    }
}

/// Fixed table of choices for one enumerated setting.
#[derive(Debug, Clone, Copy)]
pub struct OptionTable {
    setting: &'static str,
    labels: &'static [&'static str],
    values: Option<&'static [f64]>,
}

impl OptionTable {
    /// Table addressed by index or label only.
    pub const fn new(setting: &'static str, labels: &'static [&'static str]) -> Self {
        Self {
            setting,
            labels,
            values: None,
        }
    }

    /// Table whose entries also correspond to physical values (sensitivities,
    /// time constants, sample rates). `values` must be parallel to `labels`.
    pub const fn with_values(
        setting: &'static str,
        labels: &'static [&'static str],
        values: &'static [f64],
    ) -> Self {
        Self {
            setting,
            labels,
            values: Some(values),
        }
    }

    /// Name of the setting, used in error messages.
    pub fn setting(&self) -> &'static str {
        self.setting
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True for an empty table.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Resolve a user value to the canonical index.
    pub fn index_of(&self, value: impl Into<OptionValue>) -> AppResult<usize> {
        let value = value.into();
        let found = match &value {
            OptionValue::Index(i) => (*i < self.labels.len()).then_some(*i),
            OptionValue::Label(label) => {
                let wanted = normalize(label);
                self.labels.iter().position(|l| normalize(l) == wanted)
            }
            OptionValue::Number(x) => match self.values {
                Some(values) => values.iter().position(|v| approx_eq(*v, *x)),
                None if x.fract() == 0.0 && *x >= 0.0 && (*x as usize) < self.labels.len() => {
                    Some(*x as usize)
                }
                None => None,
            },
        };

        found.ok_or_else(|| ScpiError::InvalidOption {
            setting: self.setting.to_string(),
            value: value.to_string(),
            choices: self.choices(),
        })
    }

    /// Label for an index reported by the instrument.
    pub fn label(&self, index: usize) -> AppResult<&'static str> {
        self.labels.get(index).copied().ok_or_else(|| {
            ScpiError::parse(
                self.setting,
                &index.to_string(),
                format!("index outside table of {} entries", self.labels.len()),
            )
        })
    }

    /// Physical value for an index, if the table carries values.
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.and_then(|v| v.get(index).copied())
    }

    fn choices(&self) -> Vec<String> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| match self.value(i) {
                Some(v) => format!("{} ({}: {})", label, i, v),
                None => format!("{} ({})", label, i),
            })
            .collect()
    }
}

fn normalize(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['µ', 'μ'], "u")
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs())
}

/// Range and precision of a continuous setpoint.
#[derive(Debug, Clone, Copy)]
pub struct Limited {
    /// Name of the setting, used in error messages
    pub setting: &'static str,
    /// Lower bound (inclusive)
    pub min: f64,
    /// Upper bound (inclusive)
    pub max: f64,
    /// Decimal places accepted by the instrument
    pub precision: usize,
}

impl Limited {
    /// Describe a setpoint range.
    pub const fn new(setting: &'static str, min: f64, max: f64, precision: usize) -> Self {
        Self {
            setting,
            min,
            max,
            precision,
        }
    }

    /// Validate `value` and round it to the instrument precision.
    pub fn apply(&self, value: f64) -> AppResult<f64> {
        if !value.is_finite() || value < self.min || value > self.max {
            return Err(ScpiError::OutOfRange {
                setting: self.setting.to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        let scale = 10f64.powi(self.precision as i32);
        Ok((value * scale).round() / scale)
    }

    /// Validate, round and render with exactly `precision` decimals.
    pub fn format(&self, value: f64) -> AppResult<String> {
        let v = self.apply(value)?;
        Ok(format!("{:.*}", self.precision, v))
    }
}

/// One line of a panel listing: `"Frequency               1000.000 Hz"`.
pub fn format_property(name: &str, value: impl fmt::Display, unit: &str) -> String {
    format!("{:<24}{} {}", name, value, unit).trim_end().to_string()
}
