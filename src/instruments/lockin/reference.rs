//! Reference and phase panel.

use crate::error::{AppResult, ScpiError};
use crate::instruments::{read_label, write_limited, write_option};
use crate::options::{format_property, Limited, OptionTable, OptionValue};
use crate::session::{Logging, Session};

const SOURCE: OptionTable = OptionTable::new("Reference source", &["External", "Internal"]);
const TRIGGER: OptionTable =
    OptionTable::new("External trigger", &["Sine", "TTL Rising", "TTL Falling"]);

const PHASE: Limited = Limited::new("Phase", -360.0, 729.99, 2);
const FREQUENCY: Limited = Limited::new("Frequency", 0.001, 102_000.0, 3);
const AMPLITUDE: Limited = Limited::new("Amplitude", 0.004, 5.0, 3);
const HARMONIC: Limited = Limited::new("Harmonic", 1.0, 19_999.0, 0);

/// Highest detection frequency, harmonic included.
pub const MAX_DETECTION_FREQUENCY: f64 = 102_000.0;

/// Range of the internal reference frequency.
pub fn frequency_limit() -> Limited {
    FREQUENCY
}

/// Reference source, frequency, phase, amplitude and harmonic.
#[derive(Clone, Copy)]
pub struct ReferencePanel<'a> {
    session: &'a Session,
    logging: Logging,
}

impl<'a> ReferencePanel<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
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

    /// Phase shift in degrees.
    pub async fn phase(&self) -> AppResult<f64> {
        self.session.query_f64("PHAS?", self.logging).await
    }

    /// Set the phase shift (-360.00 to 729.99 degrees).
    pub async fn set_phase(&self, degrees: f64) -> AppResult<f64> {
        write_limited(self.session, "PHAS", &PHASE, degrees, self.logging).await
    }

    /// `External` or `Internal`.
    pub async fn source(&self) -> AppResult<&'static str> {
        read_label(self.session, "FMOD?", &SOURCE, self.logging).await
    }

    /// Select the reference source.
    pub async fn set_source(&self, source: impl Into<OptionValue>) -> AppResult<()> {
        write_option(self.session, "FMOD", &SOURCE, source, self.logging).await?;
        Ok(())
    }

    /// Reference frequency in Hz.
    pub async fn frequency(&self) -> AppResult<f64> {
        self.session.query_f64("FREQ?", self.logging).await
    }

    /// Set the internal reference frequency (1 mHz to 102 kHz).
    pub async fn set_frequency(&self, hz: f64) -> AppResult<f64> {
        write_limited(self.session, "FREQ", &FREQUENCY, hz, self.logging).await
    }

    /// Sine output amplitude in Vrms.
    pub async fn amplitude(&self) -> AppResult<f64> {
        self.session.query_f64("SLVL?", self.logging).await
    }

    /// Set the sine output amplitude (0.004 to 5.000 Vrms).
    pub async fn set_amplitude(&self, vrms: f64) -> AppResult<f64> {
        write_limited(self.session, "SLVL", &AMPLITUDE, vrms, self.logging).await
    }

    /// Detection harmonic.
    pub async fn harmonic(&self) -> AppResult<i64> {
        self.session.query_i64("HARM?", self.logging).await
    }

    /// Set the detection harmonic.
    ///
    /// Harmonic times the current reference frequency may not exceed 102 kHz.
    pub async fn set_harmonic(&self, harmonic: u32) -> AppResult<u32> {
        let harmonic = HARMONIC.apply(f64::from(harmonic))?;
        let frequency = self.frequency().await?;
        let detection = harmonic * frequency;
        if detection > MAX_DETECTION_FREQUENCY {
            return Err(ScpiError::OutOfRange {
                setting: "Harmonic x frequency".to_string(),
                value: detection,
                min: 0.0,
                max: MAX_DETECTION_FREQUENCY,
            });
        }
        let harmonic = harmonic as u32;
        self.session
            .write(&format!("HARM {}", harmonic), self.logging)
            .await?;
        Ok(harmonic)
    }

    /// Trigger edge used with an external reference.
    pub async fn external_trigger(&self) -> AppResult<&'static str> {
        read_label(self.session, "RSLP?", &TRIGGER, self.logging).await
    }

    /// Select the external trigger edge.
    pub async fn set_external_trigger(&self, slope: impl Into<OptionValue>) -> AppResult<()> {
        write_option(self.session, "RSLP", &TRIGGER, slope, self.logging).await?;
        Ok(())
    }

    /// Current settings, one line each.
    pub async fn describe(&self) -> AppResult<Vec<String>> {
        let panel = self.quiet();
        Ok(vec![
            format_property("Source", panel.source().await?, ""),
            format_property("Frequency", format!("{:.3}", panel.frequency().await?), "Hz"),
            format_property("Phase", format!("{:.2}", panel.phase().await?), "°"),
            format_property("Amplitude", format!("{:.3}", panel.amplitude().await?), "Vrms"),
            format_property("Harmonic", panel.harmonic().await?, ""),
            format_property("External Trigger", panel.external_trigger().await?, ""),
        ])
    }

    /// Write the panel listing to the journal.
    pub async fn log_state(&self) -> AppResult<()> {
        let lines = self.describe().await?;
        self.session.log_listing("Reference and Phase panel:", &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::testing;
    use crate::transport::SimTransport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn setters_send_indices_and_fixed_precision() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new();
        let session = testing::session(&sim, dir.path()).await;
        let panel = ReferencePanel::new(&session);

        panel.set_source("internal").await.unwrap();
        assert_eq!(panel.set_phase(12.346).await.unwrap(), 12.35);
        panel.set_frequency(1000.0).await.unwrap();
        panel.set_amplitude(0.5).await.unwrap();
        panel.set_external_trigger("TTL Falling").await.unwrap();

        assert_eq!(
            sim.call_log()[1..],
            ["FMOD 1", "PHAS 12.35", "FREQ 1000.000", "SLVL 0.500", "RSLP 2"]
        );
    }

    #[tokio::test]
    async fn rejected_values_are_not_sent() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new();
        let session = testing::session(&sim, dir.path()).await;
        let panel = ReferencePanel::new(&session);

        assert!(matches!(
            panel.set_amplitude(6.0).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(matches!(
            panel.set_source("Auto").await,
            Err(ScpiError::InvalidOption { .. })
        ));
        assert_eq!(sim.call_log(), vec!["*IDN?"]);
    }

    #[tokio::test]
    async fn harmonic_limited_by_frequency() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("FREQ?", "10000.000");
        let session = testing::session(&sim, dir.path()).await;
        let panel = ReferencePanel::new(&session);

        assert_eq!(panel.set_harmonic(10).await.unwrap(), 10);
        assert!(matches!(
            panel.set_harmonic(11).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(panel.set_harmonic(0).await.is_err());
        assert_eq!(sim.call_log().last().unwrap(), "FREQ?");
        assert!(sim.call_log().contains(&"HARM 10".to_string()));
    }

    #[tokio::test]
    async fn describe_lists_every_setting() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("FMOD?", "1")
            .with_reply("FREQ?", "1000")
            .with_reply("PHAS?", "-12.5")
            .with_reply("SLVL?", "0.004")
            .with_reply("HARM?", "2")
            .with_reply("RSLP?", "0");
        let session = testing::session(&sim, dir.path()).await;
        let lines = ReferencePanel::new(&session).describe().await.unwrap();
        assert_eq!(
            lines,
            vec![
                "Source                  Internal",
                "Frequency               1000.000 Hz",
                "Phase                   -12.50 °",
                "Amplitude               0.004 Vrms",
                "Harmonic                2",
                "External Trigger        Sine",
            ]
        );
    }
}
