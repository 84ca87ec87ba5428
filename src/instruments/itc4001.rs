//! Thorlabs ITC4001 laser diode and TEC controller.

use crate::config::LabConfig;
use crate::error::{AppResult, ScpiError};
use crate::session::{Logging, Session};
use crate::transport::Transport;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Quantity read with `MEAS:…?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurand {
    /// TEC temperature, °C
    Temperature,
    /// Laser diode current, A
    Current,
    /// Laser diode voltage, V
    Voltage,
    /// Optical power, W
    Power,
}

impl Measurand {
    /// Measurement query.
    pub fn query(self) -> &'static str {
        match self {
            Measurand::Temperature => "MEAS:TEMP?",
            Measurand::Current => "MEAS:CURR?",
            Measurand::Voltage => "MEAS:VOLT?",
            Measurand::Power => "MEAS:POW?",
        }
    }
}

impl fmt::Display for Measurand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Measurand::Temperature => "TEMP",
            Measurand::Current => "CURR",
            Measurand::Voltage => "VOLT",
            Measurand::Power => "POW",
        })
    }
}

impl FromStr for Measurand {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEMP" | "TEMPERATURE" => Ok(Measurand::Temperature),
            "CURR" | "CURRENT" => Ok(Measurand::Current),
            "VOLT" | "VOLTAGE" => Ok(Measurand::Voltage),
            "POW" | "POWER" => Ok(Measurand::Power),
            _ => Err(ScpiError::InvalidOption {
                setting: "Measurand".to_string(),
                value: s.to_string(),
                choices: vec!["TEMP".into(), "CURR".into(), "VOLT".into(), "POW".into()],
            }),
        }
    }
}

/// Stepped temperature ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSweep {
    /// First set-point, °C
    pub start: f64,
    /// Final set-point, °C (not visited)
    pub stop: f64,
    /// Step size, °C; the sign is taken from the sweep direction
    pub step: f64,
    /// Time spent at each set-point
    pub dwell: Duration,
}

impl Default for TemperatureSweep {
    fn default() -> Self {
        Self {
            start: 22.5,
            stop: 23.5,
            step: 0.01,
            dwell: Duration::from_secs(4),
        }
    }
}

impl TemperatureSweep {
    fn plan(&self) -> AppResult<(f64, usize)> {
        if !self.step.is_finite() || self.step == 0.0 {
            return Err(ScpiError::OutOfRange {
                setting: "Temperature step".to_string(),
                value: self.step,
                min: f64::MIN_POSITIVE,
                max: f64::INFINITY,
            });
        }
        let span = self.stop - self.start;
        let points = (span.abs() / self.step.abs() + 1e-9).floor() as usize;
        Ok((self.step.abs().copysign(span), points))
    }
}

/// Elapsed times and readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    /// Seconds since the first reading
    pub elapsed: Vec<f64>,
    /// Measured values
    pub values: Vec<f64>,
}

/// ITC4001 driver.
#[derive(Debug)]
pub struct Itc4001 {
    session: Session,
}

impl Itc4001 {
    /// Wrap an open session.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Open a session on an existing transport.
    pub async fn open(transport: Box<dyn Transport>, config: &LabConfig) -> AppResult<Self> {
        Ok(Self::new(Session::open(transport, config).await?))
    }

    /// Connect to `transport.resource` from `config`.
    pub async fn connect(config: &LabConfig) -> AppResult<Self> {
        Ok(Self::new(Session::connect(config).await?))
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Read one quantity.
    pub async fn measure(&self, measurand: Measurand, logging: Logging) -> AppResult<f64> {
        self.session.query_f64(measurand.query(), logging).await
    }

    /// Laser diode current set-point, A.
    pub async fn set_current(&self, amps: f64) -> AppResult<()> {
        check_finite("Current set-point", amps)?;
        self.session
            .write(&format!("SOUR:CURR {}", amps), Logging::Enabled)
            .await
    }

    /// TEC temperature set-point, °C.
    pub async fn set_temperature(&self, celsius: f64) -> AppResult<()> {
        self.write_temperature(celsius, Logging::Enabled).await
    }

    async fn write_temperature(&self, celsius: f64, logging: Logging) -> AppResult<()> {
        check_finite("Temperature set-point", celsius)?;
        self.session
            .write(&format!("SOUR2:TEMP {}C", celsius), logging)
            .await
    }

    /// Take `count` readings back to back, unlogged.
    pub async fn record(&self, measurand: Measurand, count: usize) -> AppResult<Trace> {
        let started = Instant::now();
        let mut trace = Trace {
            elapsed: Vec::with_capacity(count),
            values: Vec::with_capacity(count),
        };
        for _ in 0..count {
            trace.elapsed.push(started.elapsed().as_secs_f64());
            trace
                .values
                .push(self.measure(measurand, Logging::Disabled).await?);
        }
        Ok(trace)
    }

    /// Step the temperature set-point from `start` towards `stop`.
    ///
    /// At each set-point the temperature is read, `hook` is called with the point
    /// index and reading (e.g. to take a spectrum), then the controller dwells
    /// before moving on. Individual steps are not journaled.
    pub async fn sweep_temperature<F>(
        &self,
        sweep: &TemperatureSweep,
        mut hook: Option<F>,
    ) -> AppResult<Trace>
    where
        F: FnMut(usize, f64),
    {
        let (step, points) = sweep.plan()?;
        tracing::info!(
            "Temperature sweep {} to {} °C, {} points",
            sweep.start,
            sweep.stop,
            points
        );
        self.session.annotate(&format!(
            "Temperature sweep {} to {} C, step {} C, {} points",
            sweep.start, sweep.stop, step, points
        ))?;

        self.write_temperature(sweep.start, Logging::Disabled).await?;
        let started = Instant::now();
        let mut trace = Trace::default();
        for i in 0..points {
            trace.elapsed.push(started.elapsed().as_secs_f64());
            let temperature = self
                .measure(Measurand::Temperature, Logging::Disabled)
                .await?;
            trace.values.push(temperature);
            if let Some(hook) = hook.as_mut() {
                hook(i, temperature);
            }
            if !sweep.dwell.is_zero() {
                tokio::time::sleep(sweep.dwell).await;
            }
            let next = sweep.start + (i + 1) as f64 * step;
            self.write_temperature(next, Logging::Disabled).await?;
        }
        Ok(trace)
    }

    /// Close the session.
    pub async fn close(self) -> AppResult<()> {
        self.session.close().await
    }
}

fn check_finite(setting: &str, value: f64) -> AppResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScpiError::OutOfRange {
            setting: setting.to_string(),
            value,
            min: f64::MIN,
            max: f64::MAX,
        })
    }
}
