//! Data acquisition: single readings, snapshots, frequency sweeps and the
//! internal data buffer.

use crate::error::{AppResult, ScpiError};
use crate::instruments::check_range;
use crate::instruments::lockin::reference::frequency_limit;
use crate::options::{OptionTable, OptionValue};
use crate::session::{parse_integer, Logging, Session};
use crate::storage::Array2;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Buffer capacity in points.
pub const BUFFER_CAPACITY: usize = 16_383;

/// Longest frequency sweep.
pub const MAX_SWEEP_POINTS: usize = 100_000;

/// Smallest frequency step, in Hz; `FREQ` is sent with three decimals.
const SWEEP_RESOLUTION: f64 = 0.001;

/// Buffer sample rates.
pub const SAMPLE_RATE: OptionTable = OptionTable::with_values(
    "Sample rate",
    &[
        "62.5 mHz", "125 mHz", "250 mHz", "500 mHz", "1 Hz", "2 Hz", "4 Hz", "8 Hz", "16 Hz",
        "32 Hz", "64 Hz", "128 Hz", "256 Hz", "512 Hz",
    ],
    &[
        0.0625, 0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0,
    ],
);

/// Output quantity read with `OUTP?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    /// In-phase component
    X,
    /// Quadrature component
    Y,
    /// Magnitude
    R,
    /// Phase
    Theta,
}

impl Quantity {
    fn code(self) -> u8 {
        match self {
            Quantity::X => 1,
            Quantity::Y => 2,
            Quantity::R => 3,
            Quantity::Theta => 4,
        }
    }
}

impl FromStr for Quantity {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" | "1" => Ok(Quantity::X),
            "Y" | "2" => Ok(Quantity::Y),
            "R" | "3" => Ok(Quantity::R),
            "T" | "THETA" | "4" => Ok(Quantity::Theta),
            _ => Err(ScpiError::InvalidOption {
                setting: "Output quantity".to_string(),
                value: s.to_string(),
                choices: ["X", "Y", "R", "T"].iter().map(|c| c.to_string()).collect(),
            }),
        }
    }
}

/// Parameter accepted by `SNAP?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapParameter {
    /// X
    X,
    /// Y
    Y,
    /// R
    R,
    /// θ
    Theta,
    /// Aux In 1
    AuxIn1,
    /// Aux In 2
    AuxIn2,
    /// Aux In 3
    AuxIn3,
    /// Aux In 4
    AuxIn4,
    /// Reference frequency
    Frequency,
    /// Channel 1 display
    Ch1,
    /// Channel 2 display
    Ch2,
}

impl SnapParameter {
    const ALL: [SnapParameter; 11] = [
        SnapParameter::X,
        SnapParameter::Y,
        SnapParameter::R,
        SnapParameter::Theta,
        SnapParameter::AuxIn1,
        SnapParameter::AuxIn2,
        SnapParameter::AuxIn3,
        SnapParameter::AuxIn4,
        SnapParameter::Frequency,
        SnapParameter::Ch1,
        SnapParameter::Ch2,
    ];

    /// Index sent to the instrument.
    pub fn code(self) -> u8 {
        match self {
            SnapParameter::X => 1,
            SnapParameter::Y => 2,
            SnapParameter::R => 3,
            SnapParameter::Theta => 4,
            SnapParameter::AuxIn1 => 5,
            SnapParameter::AuxIn2 => 6,
            SnapParameter::AuxIn3 => 7,
            SnapParameter::AuxIn4 => 8,
            SnapParameter::Frequency => 9,
            SnapParameter::Ch1 => 10,
            SnapParameter::Ch2 => 11,
        }
    }

    /// Short name, as accepted by `from_str`.
    pub fn name(self) -> &'static str {
        match self {
            SnapParameter::X => "X",
            SnapParameter::Y => "Y",
            SnapParameter::R => "R",
            SnapParameter::Theta => "T",
            SnapParameter::AuxIn1 => "AuxIn1",
            SnapParameter::AuxIn2 => "AuxIn2",
            SnapParameter::AuxIn3 => "AuxIn3",
            SnapParameter::AuxIn4 => "AuxIn4",
            SnapParameter::Frequency => "Freq",
            SnapParameter::Ch1 => "Ch1",
            SnapParameter::Ch2 => "Ch2",
        }
    }
}

impl fmt::Display for SnapParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SnapParameter {
    type Err = ScpiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.eq_ignore_ascii_case("theta") {
            return Ok(SnapParameter::Theta);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ScpiError::InvalidOption {
                setting: "Snapshot parameter".to_string(),
                value: s.to_string(),
                choices: Self::ALL.iter().map(|p| p.name().to_string()).collect(),
            })
    }
}

/// Spacing of sweep points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepStep {
    /// Fixed step in Hz; its sign is taken from the sweep direction
    Step(f64),
    /// Number of points, evenly spaced from the start (the end is excluded)
    Points(usize),
}

/// Reference frequency sweep.
#[derive(Debug, Clone)]
pub struct FrequencySweep {
    /// First frequency in Hz
    pub start: f64,
    /// Last frequency in Hz (excluded)
    pub end: f64,
    /// Point spacing
    pub step: SweepStep,
    /// Settling time after each frequency change
    pub delay: Duration,
    /// Quantities read at each point
    pub params: Vec<SnapParameter>,
}

impl FrequencySweep {
    /// 200-point sweep reading X, Y, R and θ.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            step: SweepStep::Points(200),
            delay: Duration::ZERO,
            params: vec![
                SnapParameter::X,
                SnapParameter::Y,
                SnapParameter::R,
                SnapParameter::Theta,
            ],
        }
    }

    /// Signed step and number of points.
    ///
    /// Steps finer than the 1 mHz frequency resolution and sweeps longer than
    /// [`MAX_SWEEP_POINTS`] are rejected.
    fn plan(&self) -> AppResult<(f64, usize)> {
        let span = self.end - self.start;
        let (step, points) = match self.step {
            SweepStep::Points(n) => {
                check_sweep_points(n)?;
                (span / n as f64, n)
            }
            SweepStep::Step(step) => {
                let step = check_sweep_step(step)?.copysign(span);
                // Tolerate rounding in span / step
                let points = (span / step + 1e-9).floor();
                if !(1.0..=MAX_SWEEP_POINTS as f64).contains(&points) {
                    return Err(sweep_points_error(points));
                }
                (step, points as usize)
            }
        };
        check_sweep_step(step)?;
        Ok((step, points))
    }
}

fn check_sweep_points(points: usize) -> AppResult<()> {
    if (1..=MAX_SWEEP_POINTS).contains(&points) {
        Ok(())
    } else {
        Err(sweep_points_error(points as f64))
    }
}

fn sweep_points_error(points: f64) -> ScpiError {
    ScpiError::OutOfRange {
        setting: "Sweep points".to_string(),
        value: points,
        min: 1.0,
        max: MAX_SWEEP_POINTS as f64,
    }
}

/// Absolute step, if the instrument can resolve it.
fn check_sweep_step(step: f64) -> AppResult<f64> {
    let max = frequency_limit().max;
    if step.is_finite() && (SWEEP_RESOLUTION..=max).contains(&step.abs()) {
        return Ok(step.abs());
    }
    Err(ScpiError::OutOfRange {
        setting: "Sweep step".to_string(),
        value: step,
        min: SWEEP_RESOLUTION,
        max,
    })
}

/// Frequencies and readings of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    /// Frequencies visited
    pub frequencies: Vec<f64>,
    /// One row per swept parameter, parallel to `frequencies`
    pub readings: Vec<Vec<f64>>,
}

/// Readings and buffer control. Needs exclusive access to the session, since long
/// vectors may be saved to array files.
pub struct AcquisitionPanel<'a> {
    session: &'a mut Session,
    logging: Logging,
}

impl<'a> AcquisitionPanel<'a> {
    pub(crate) fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            logging: Logging::Enabled,
        }
    }

    /// Same panel, without journal entries.
    pub fn quiet(self) -> Self {
        Self {
            logging: Logging::Disabled,
            ..self
        }
    }

    /// Read X, Y, R or θ.
    pub async fn read_value(&self, quantity: Quantity) -> AppResult<f64> {
        self.session
            .query_f64(&format!("OUTP? {}", quantity.code()), self.logging)
            .await
    }

    /// Read what channel display `display` (1 or 2) shows.
    pub async fn read_display(&self, display: u8) -> AppResult<f64> {
        check_range("Display", i64::from(display), 1, 2)?;
        self.session
            .query_f64(&format!("OUTR? {}", display), self.logging)
            .await
    }

    /// Read aux input `input` (1 to 4) in volts.
    pub async fn read_auxiliary(&self, input: u8) -> AppResult<f64> {
        check_range("Aux input", i64::from(input), 1, 4)?;
        self.session
            .query_f64(&format!("OAUX? {}", input), self.logging)
            .await
    }

    /// Read 2 to 6 parameters at the same instant.
    pub async fn read_multiple(&mut self, params: &[SnapParameter]) -> AppResult<Vec<f64>> {
        let logging = self.logging;
        self.snapshot(params, logging).await
    }

    async fn snapshot(
        &mut self,
        params: &[SnapParameter],
        logging: Logging,
    ) -> AppResult<Vec<f64>> {
        check_snapshot(params)?;
        let codes: Vec<String> = params.iter().map(|p| p.code().to_string()).collect();
        let command = format!("SNAP? {}", codes.join(", "));
        let values = self
            .session
            .query_ascii_values(&command, ',', logging)
            .await?;
        if values.len() != params.len() {
            return Err(ScpiError::parse(
                &command,
                &format!("{:?}", values),
                format!("expected {} values", params.len()),
            ));
        }
        Ok(values)
    }

    /// Step the reference frequency and take a snapshot at each point.
    ///
    /// Individual steps are never journaled. When logging, the whole sweep is saved
    /// as one array (frequencies first, then one row per parameter) and summarised
    /// in a single journal entry.
    pub async fn sweep_frequency(&mut self, sweep: &FrequencySweep) -> AppResult<SweepResult> {
        let limit = frequency_limit();
        limit.apply(sweep.start)?;
        limit.apply(sweep.end)?;
        check_snapshot(&sweep.params)?;
        let (step, points) = sweep.plan()?;

        tracing::info!(
            "Sweeping {:.3} Hz to {:.3} Hz, {} points",
            sweep.start,
            sweep.end,
            points
        );
        let mut frequencies = Vec::with_capacity(points);
        let mut readings = vec![Vec::with_capacity(points); sweep.params.len()];
        for i in 0..points {
            let frequency = sweep.start + i as f64 * step;
            self.session
                .write(&format!("FREQ {:.3}", frequency), Logging::Disabled)
                .await?;
            let values = self.snapshot(&sweep.params, Logging::Disabled).await?;
            for (row, value) in readings.iter_mut().zip(values) {
                row.push(value);
            }
            frequencies.push(frequency);
            if !sweep.delay.is_zero() {
                tokio::time::sleep(sweep.delay).await;
            }
        }

        let result = SweepResult {
            frequencies,
            readings,
        };
        if self.logging == Logging::Enabled {
            let mut rows = vec![result.frequencies.clone()];
            rows.extend(result.readings.iter().cloned());
            let path = self
                .session
                .save(&Array2::from_rows(rows)?, "sweep", Logging::Disabled)?;
            let names: Vec<&str> = sweep.params.iter().map(|p| p.name()).collect();
            let summary = format!(
                "Sweep frequency {:.3} to {:.3} Hz with step {:.3} Hz (Freq, {})",
                sweep.start,
                sweep.end,
                step,
                names.join(", ")
            );
            self.session.log().exchange_saved(&summary, &path)?;
        }
        Ok(result)
    }

    /// Points currently held in the buffer. Never journaled.
    pub async fn buffer_stored(&self) -> AppResult<usize> {
        let count = self.session.query_i64("SPTS?", Logging::Disabled).await?;
        usize::try_from(count)
            .map_err(|_| ScpiError::parse("SPTS?", &count.to_string(), "negative point count"))
    }

    /// Reset the buffer and fill it once at `sample_rate`.
    ///
    /// With `wait`, returns once at least `points` are stored; the deadline is the
    /// polling timeout plus the nominal fill time. Returns the stored point count.
    pub async fn buffer_one_shot(
        &self,
        sample_rate: impl Into<OptionValue>,
        points: usize,
        wait: bool,
    ) -> AppResult<usize> {
        let rate = SAMPLE_RATE.index_of(sample_rate)?;
        if !(1..=BUFFER_CAPACITY).contains(&points) {
            return Err(ScpiError::Buffer(format!(
                "{} points requested, buffer holds 1 to {}",
                points, BUFFER_CAPACITY
            )));
        }

        self.session
            .write(&format!("SRAT {}", rate), Logging::Disabled)
            .await?;
        self.session.write("SEND 0", Logging::Disabled).await?;
        self.session.write("REST", Logging::Disabled).await?;
        tracing::debug!("Buffer reset");
        self.session.write("STRT", Logging::Disabled).await?;
        tracing::info!(
            "Buffer storage started at {}",
            SAMPLE_RATE.label(rate)?
        );

        if !wait {
            return self.buffer_stored().await;
        }
        let fill_time = SAMPLE_RATE
            .value(rate)
            .map_or(Duration::ZERO, |hz| Duration::from_secs_f64(points as f64 / hz));
        let deadline = self.session.polling().timeout() + fill_time;
        let answer = self
            .session
            .poll_until_within("SPTS?", deadline, |answer| {
                let stored = parse_integer("SPTS?", answer)?;
                tracing::trace!("Buffer {}/{}", stored, points);
                Ok(stored >= points as i64)
            })
            .await?;
        let stored = parse_integer("SPTS?", &answer)?;
        tracing::info!("Buffer filled with {} points", stored);
        Ok(stored as usize)
    }

    /// Read `count` points of channel `display`'s buffer, starting at point
    /// `start` (counted from 0).
    ///
    /// All requested points must already be stored. Storage is paused first when
    /// it runs in loop mode.
    pub async fn buffer_read(
        &mut self,
        display: u8,
        start: usize,
        count: usize,
    ) -> AppResult<Vec<f64>> {
        check_range("Display", i64::from(display), 1, 2)?;
        let end = start
            .checked_add(count)
            .filter(|end| count > 0 && *end <= BUFFER_CAPACITY)
            .ok_or_else(|| {
                ScpiError::Buffer(format!(
                    "{} points from {} out of range (buffer holds {})",
                    count, start, BUFFER_CAPACITY
                ))
            })?;
        let stored = self.buffer_stored().await?;
        if end > stored {
            return Err(ScpiError::Buffer(format!(
                "Not enough points in buffer yet ({} of {})",
                stored, end
            )));
        }
        if self.session.query_i64("SEND?", Logging::Disabled).await? == 1 {
            self.session.write("PAUS", Logging::Disabled).await?;
        }
        let command = format!("TRCA? {}, {}, {}", display, start, count);
        let logging = self.logging;
        self.session
            .query_ascii_values(&command, ',', logging)
            .await
    }
}

fn check_snapshot(params: &[SnapParameter]) -> AppResult<()> {
    check_range("Snapshot parameter count", params.len() as i64, 2, 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::testing;
    use crate::transport::SimTransport;
    use tempfile::tempdir;

    #[test]
    fn parameter_names() {
        assert_eq!("r".parse::<Quantity>().unwrap(), Quantity::R);
        assert_eq!("Theta".parse::<Quantity>().unwrap(), Quantity::Theta);
        assert!("Z".parse::<Quantity>().is_err());
        assert_eq!("freq".parse::<SnapParameter>().unwrap().code(), 9);
        assert_eq!("AUXIN3".parse::<SnapParameter>().unwrap().code(), 7);
        assert!(matches!(
            "Ch3".parse::<SnapParameter>(),
            Err(ScpiError::InvalidOption { .. })
        ));
    }

    #[test]
    fn sweep_plans() {
        let mut sweep = FrequencySweep::new(100.0, 200.0);
        sweep.step = SweepStep::Points(4);
        assert_eq!(sweep.plan().unwrap(), (25.0, 4));

        let mut down = FrequencySweep::new(200.0, 100.0);
        down.step = SweepStep::Step(10.0);
        assert_eq!(down.plan().unwrap(), (-10.0, 10));

        down.step = SweepStep::Step(0.0);
        assert!(down.plan().is_err());
        down.step = SweepStep::Points(0);
        assert!(down.plan().is_err());
    }

    #[test]
    fn sweep_plans_stay_within_resolution_and_length() {
        let mut sweep = FrequencySweep::new(1.0, 102_000.0);
        sweep.step = SweepStep::Points(usize::MAX);
        assert!(matches!(
            sweep.plan(),
            Err(ScpiError::OutOfRange { ref setting, .. }) if setting == "Sweep points"
        ));
        sweep.step = SweepStep::Step(1e-12);
        assert!(matches!(
            sweep.plan(),
            Err(ScpiError::OutOfRange { ref setting, .. }) if setting == "Sweep step"
        ));
        sweep.step = SweepStep::Step(0.01);
        assert!(matches!(
            sweep.plan(),
            Err(ScpiError::OutOfRange { ref setting, .. }) if setting == "Sweep points"
        ));

        let mut narrow = FrequencySweep::new(1000.0, 1000.1);
        narrow.step = SweepStep::Points(200);
        assert!(matches!(
            narrow.plan(),
            Err(ScpiError::OutOfRange { ref setting, .. }) if setting == "Sweep step"
        ));
        narrow.step = SweepStep::Points(50);
        let (step, points) = narrow.plan().unwrap();
        assert!((step - 0.002).abs() < 1e-9);
        assert_eq!(points, 50);
    }

    #[tokio::test]
    async fn oversized_sweep_sends_nothing() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new();
        let mut session = testing::session(&sim, dir.path()).await;
        let mut sweep = FrequencySweep::new(100.0, 200.0);
        sweep.step = SweepStep::Points(usize::MAX);
        assert!(matches!(
            AcquisitionPanel::new(&mut session)
                .sweep_frequency(&sweep)
                .await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert_eq!(sim.call_log(), vec!["*IDN?"]);
    }

    #[tokio::test]
    async fn snapshot_command() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("SNAP? 1, 2, 9", "0.1,0.2,1000");
        let mut session = testing::session(&sim, dir.path()).await;
        let mut panel = AcquisitionPanel::new(&mut session);

        let params = [SnapParameter::X, SnapParameter::Y, SnapParameter::Frequency];
        assert_eq!(
            panel.read_multiple(&params).await.unwrap(),
            vec![0.1, 0.2, 1000.0]
        );
        assert!(matches!(
            panel.read_multiple(&[SnapParameter::X]).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(panel.read_multiple(&[SnapParameter::R; 7]).await.is_err());
    }

    #[tokio::test]
    async fn single_readings() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("OUTP? 4", "-45.0")
            .with_reply("OUTR? 2", "1.5e-3")
            .with_reply("OAUX? 4", "0.25");
        let mut session = testing::session(&sim, dir.path()).await;
        let panel = AcquisitionPanel::new(&mut session);

        assert_eq!(panel.read_value(Quantity::Theta).await.unwrap(), -45.0);
        assert_eq!(panel.read_display(2).await.unwrap(), 1.5e-3);
        assert_eq!(panel.read_auxiliary(4).await.unwrap(), 0.25);
        assert!(panel.read_display(3).await.is_err());
        assert!(panel.read_auxiliary(0).await.is_err());
    }

    #[tokio::test]
    async fn sweep_saves_and_summarises() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("SNAP? 1, 2", "1.0,2.0");
        let mut session = testing::session(&sim, dir.path()).await;

        let mut sweep = FrequencySweep::new(1000.0, 1003.0);
        sweep.step = SweepStep::Step(1.0);
        sweep.params = vec![SnapParameter::X, SnapParameter::Y];
        let result = AcquisitionPanel::new(&mut session)
            .sweep_frequency(&sweep)
            .await
            .unwrap();

        assert_eq!(result.frequencies, vec![1000.0, 1001.0, 1002.0]);
        assert_eq!(result.readings, vec![vec![1.0; 3], vec![2.0; 3]]);
        assert_eq!(
            sim.call_log()[1..3],
            ["FREQ 1000.000", "SNAP? 1, 2"]
        );

        let saved = session.saved_files().to_vec();
        assert_eq!(saved.len(), 1);
        assert_eq!(session.load(&saved[0]).unwrap().shape(), (3, 3));
        let journal = std::fs::read_to_string(session.log().path()).unwrap();
        assert!(journal.contains("Sweep frequency 1000.000 to 1003.000 Hz"));
        assert!(!journal.contains("FREQ 1001.000"));
    }

    #[tokio::test]
    async fn sweep_rejects_out_of_range_frequency() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new();
        let mut session = testing::session(&sim, dir.path()).await;
        let sweep = FrequencySweep::new(0.0, 1000.0);
        assert!(matches!(
            AcquisitionPanel::new(&mut session)
                .sweep_frequency(&sweep)
                .await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert_eq!(sim.call_log(), vec!["*IDN?"]);
    }

    #[tokio::test]
    async fn one_shot_waits_for_points() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_sequence("SPTS?", &["0", "5", "10"]);
        let mut session = testing::session(&sim, dir.path()).await;
        let panel = AcquisitionPanel::new(&mut session);

        assert_eq!(panel.buffer_one_shot("512 Hz", 10, true).await.unwrap(), 10);
        assert_eq!(
            sim.call_log()[1..5],
            ["SRAT 13", "SEND 0", "REST", "STRT"]
        );
        assert!(matches!(
            panel.buffer_one_shot(64.0, 0, false).await,
            Err(ScpiError::Buffer(_))
        ));
        assert!(matches!(
            panel.buffer_one_shot("3 Hz", 10, false).await,
            Err(ScpiError::InvalidOption { .. })
        ));
    }

    #[tokio::test]
    async fn buffer_read_checks_and_pauses() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("SPTS?", "100")
            .with_reply("SEND?", "1")
            .with_reply("TRCA? 1, 0, 4", "1.0e-3,2.0e-3,3.0e-3,4.0e-3,");
        let mut session = testing::session(&sim, dir.path()).await;
        let mut panel = AcquisitionPanel::new(&mut session);

        let data = panel.buffer_read(1, 0, 4).await.unwrap();
        assert_eq!(data, vec![1.0e-3, 2.0e-3, 3.0e-3, 4.0e-3]);
        assert_eq!(
            sim.call_log()[1..],
            ["SPTS?", "SEND?", "PAUS", "TRCA? 1, 0, 4"]
        );

        assert!(matches!(
            panel.buffer_read(1, 0, 200).await,
            Err(ScpiError::Buffer(_))
        ));
        assert!(matches!(
            panel.buffer_read(1, 5, 0).await,
            Err(ScpiError::Buffer(_))
        ));
        assert!(panel.buffer_read(1, 0, 20_000).await.is_err());
        assert!(panel.buffer_read(1, usize::MAX, 2).await.is_err());
    }

    #[tokio::test]
    async fn buffer_read_counts_from_start() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("SPTS?", "100")
            .with_reply("SEND?", "0")
            .with_reply("TRCA? 2, 90, 10", &vec!["0.5"; 10].join(","));
        let mut session = testing::session(&sim, dir.path()).await;
        let mut panel = AcquisitionPanel::new(&mut session);

        assert_eq!(panel.buffer_read(2, 90, 10).await.unwrap().len(), 10);
        sim.clear_call_log();
        assert!(matches!(
            panel.buffer_read(2, 95, 10).await,
            Err(ScpiError::Buffer(_))
        ));
        assert_eq!(sim.call_log(), vec!["SPTS?"]);
    }
}
