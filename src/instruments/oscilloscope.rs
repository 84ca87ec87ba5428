//! Tektronix TDS-style digital oscilloscope.
//!
//! A capture is two steps: the waveform preamble (`WFMPRE:…?`) gives the scaling
//! from digitizer codes to seconds and volts, then `CURV?` returns the codes as a
//! binary block in the encoding chosen with [`Oscilloscope::setup_curve`].

use crate::codec::{time_axis, ByteOrder, DataType, Scaling};
use crate::config::LabConfig;
use crate::error::{AppResult, ScpiError};
use crate::session::{Logging, Session};
use crate::storage::Array2;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PREAMBLE_QUERY: &str = "WFMPRE:XZE?;XIN?;YZE?;YMU?;YOFF?;";

/// `CURV?` transfer encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Positive binary, most significant byte first
    #[default]
    Rpb,
    /// Signed binary, most significant byte first
    Rib,
    /// Positive binary, least significant byte first
    Srp,
    /// Signed binary, least significant byte first
    Sri,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Encoding::Rpb => "RPB",
            Encoding::Rib => "RIB",
            Encoding::Srp => "SRP",
            Encoding::Sri => "SRI",
        })
    }
}

impl FromStr for Encoding {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RPB" | "RPBINARY" => Ok(Encoding::Rpb),
            "RIB" | "RIBINARY" => Ok(Encoding::Rib),
            "SRP" | "SRPBINARY" => Ok(Encoding::Srp),
            "SRI" | "SRIBINARY" => Ok(Encoding::Sri),
            _ => Err(ScpiError::InvalidOption {
                setting: "Curve encoding".to_string(),
                value: s.to_string(),
                choices: vec!["RPB".into(), "RIB".into(), "SRP".into(), "SRI".into()],
            }),
        }
    }
}

/// Which trace `CURV?` returns and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveSetup {
    /// Trace source (`CH1`, `CH2`, `MATH`, `REF1`, ...)
    pub source: String,
    /// Transfer encoding
    pub encoding: Encoding,
    /// Bytes per sample (1 or 2)
    pub width: u8,
    /// First point transferred (1-based)
    pub start: u32,
    /// Last point transferred
    pub stop: u32,
}

impl Default for CurveSetup {
    fn default() -> Self {
        Self {
            source: "CH1".to_string(),
            encoding: Encoding::Rpb,
            width: 1,
            start: 1,
            stop: 2500,
        }
    }
}

impl CurveSetup {
    /// Sample type and byte order of the transferred codes.
    pub fn data_type(&self) -> (DataType, ByteOrder) {
        let dtype = match (self.encoding, self.width) {
            (Encoding::Rpb | Encoding::Srp, 1) => DataType::U8,
            (Encoding::Rpb | Encoding::Srp, _) => DataType::U16,
            (Encoding::Rib | Encoding::Sri, 1) => DataType::I8,
            (Encoding::Rib | Encoding::Sri, _) => DataType::I16,
        };
        let order = match self.encoding {
            Encoding::Rpb | Encoding::Rib => ByteOrder::Big,
            Encoding::Srp | Encoding::Sri => ByteOrder::Little,
        };
        (dtype, order)
    }

    fn validate(&self) -> AppResult<()> {
        if !(1..=2).contains(&self.width) {
            return Err(ScpiError::OutOfRange {
                setting: "Curve width".to_string(),
                value: f64::from(self.width),
                min: 1.0,
                max: 2.0,
            });
        }
        if self.start == 0 || self.start > self.stop {
            return Err(ScpiError::OutOfRange {
                setting: "Curve start".to_string(),
                value: f64::from(self.start),
                min: 1.0,
                max: f64::from(self.stop),
            });
        }
        Ok(())
    }
}

/// Scaling reported by `WFMPRE`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preamble {
    /// Time of the first point, s
    pub x_zero: f64,
    /// Time between points, s
    pub x_increment: f64,
    /// Volts at the offset code
    pub y_zero: f64,
    /// Volts per code
    pub y_multiplier: f64,
    /// Code of the vertical offset
    pub y_offset: f64,
}

impl Preamble {
    fn from_values(values: &[f64]) -> AppResult<Self> {
        match values {
            [x_zero, x_increment, y_zero, y_multiplier, y_offset] => Ok(Self {
                x_zero: *x_zero,
                x_increment: *x_increment,
                y_zero: *y_zero,
                y_multiplier: *y_multiplier,
                y_offset: *y_offset,
            }),
            _ => Err(ScpiError::parse(
                PREAMBLE_QUERY,
                &format!("{:?}", values),
                format!("expected 5 values, got {}", values.len()),
            )),
        }
    }

    /// Code to volts conversion.
    pub fn vertical(&self) -> Scaling {
        Scaling {
            zero: self.y_zero,
            scale: self.y_multiplier,
            offset: self.y_offset,
        }
    }
}

/// One captured trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waveform {
    /// Sample times, s
    pub time: Vec<f64>,
    /// Sample values, V
    pub volts: Vec<f64>,
}

/// Oscilloscope driver.
#[derive(Debug)]
pub struct Oscilloscope {
    session: Session,
    setup: CurveSetup,
    preamble: Option<Preamble>,
}

impl Oscilloscope {
    /// Take over `session`, apply the default curve setup and read the preamble.
    pub async fn new(session: Session) -> AppResult<Self> {
        let mut scope = Self {
            session,
            setup: CurveSetup::default(),
            preamble: None,
        };
        scope.setup_curve(CurveSetup::default()).await?;
        scope.waveform_preamble(Logging::Disabled).await?;
        Ok(scope)
    }

    /// Open a session on an existing transport.
    pub async fn open(transport: Box<dyn Transport>, config: &LabConfig) -> AppResult<Self> {
        Self::new(Session::open(transport, config).await?).await
    }

    /// Connect to `transport.resource` from `config`.
    pub async fn connect(config: &LabConfig) -> AppResult<Self> {
        Self::new(Session::connect(config).await?).await
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Underlying session, mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Active curve setup.
    pub fn curve_setup(&self) -> &CurveSetup {
        &self.setup
    }

    /// Last preamble read.
    pub fn preamble(&self) -> Option<&Preamble> {
        self.preamble.as_ref()
    }

    /// Select trace, encoding and point range for `CURV?`.
    pub async fn setup_curve(&mut self, setup: CurveSetup) -> AppResult<()> {
        setup.validate()?;
        let commands = [
            format!("DATa:SOUrce {}", setup.source),
            format!("DATa:ENC {}", setup.encoding),
            format!("DATa:WIDth {}", setup.width),
            format!("DATa:STARt {}", setup.start),
            format!("DATa:STOP {}", setup.stop),
        ];
        for command in &commands {
            self.session.write(command, Logging::Enabled).await?;
        }
        self.setup = setup;
        Ok(())
    }

    /// Read and remember the waveform scaling.
    pub async fn waveform_preamble(&mut self, logging: Logging) -> AppResult<Preamble> {
        let values = self
            .session
            .query_ascii_values(PREAMBLE_QUERY, ';', logging)
            .await?;
        let preamble = Preamble::from_values(&values)?;
        self.preamble = Some(preamble);
        Ok(preamble)
    }

    /// Acquire in sample mode.
    pub async fn configure_acquisition(&self) -> AppResult<()> {
        self.session.write("ACQ:MOD SAMP", Logging::Enabled).await
    }

    /// Transfer the selected trace in physical units.
    ///
    /// With `auto_preamble` the scaling is read again first, otherwise the last one
    /// is reused. When logging, `[time, volts]` is saved and the journal entry for
    /// `CURV?` points at the file.
    pub async fn curve(&mut self, auto_preamble: bool, logging: Logging) -> AppResult<Waveform> {
        let preamble = match (auto_preamble, self.preamble) {
            (false, Some(preamble)) => preamble,
            _ => self.waveform_preamble(logging).await?,
        };

        let (dtype, order) = self.setup.data_type();
        let raw = self
            .session
            .query_binary_values("CURV?", dtype, order, Logging::Disabled)
            .await?;
        let volts = preamble.vertical().apply_all(&raw);
        let time = time_axis(preamble.x_zero, preamble.x_increment, volts.len());
        tracing::debug!(
            "Captured {} points from {}",
            volts.len(),
            self.setup.source
        );

        let waveform = Waveform { time, volts };
        if logging == Logging::Enabled {
            let array = Array2::from_rows(vec![waveform.time.clone(), waveform.volts.clone()])?;
            self.session.record_array("CURV?", &array)?;
        }
        Ok(waveform)
    }

    /// Close the session.
    pub async fn close(self) -> AppResult<()> {
        self.session.close().await
    }
}
