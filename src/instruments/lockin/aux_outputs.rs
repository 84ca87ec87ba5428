//! Auxiliary analog outputs.

use crate::error::AppResult;
use crate::instruments::{check_range, write_limited};
use crate::options::{format_property, Limited};
use crate::session::{Logging, Session};

const VOLTAGE: Limited = Limited::new("Aux output voltage", -10.5, 10.5, 3);

/// The four rear-panel DC outputs.
#[derive(Clone, Copy)]
pub struct AuxOutputPanel<'a> {
    session: &'a Session,
    logging: Logging,
}

impl<'a> AuxOutputPanel<'a> {
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

    /// Voltage of output `output` (1 to 4).
    pub async fn voltage(&self, output: u8) -> AppResult<f64> {
        check_range("Aux output", i64::from(output), 1, 4)?;
        self.session
            .query_f64(&format!("AUXV? {}", output), self.logging)
            .await
    }

    /// Set output `output` to `volts` (-10.500 to 10.500 V, 1 mV resolution).
    pub async fn set_voltage(&self, output: u8, volts: f64) -> AppResult<f64> {
        check_range("Aux output", i64::from(output), 1, 4)?;
        let header = format!("AUXV {},", output);
        write_limited(self.session, &header, &VOLTAGE, volts, self.logging).await
    }

    /// Current settings, one line each.
    pub async fn describe(&self) -> AppResult<Vec<String>> {
        let panel = self.quiet();
        let mut lines = Vec::with_capacity(4);
        for output in 1..=4 {
            lines.push(format_property(
                &format!("Output {}", output),
                format!("{:.3}", panel.voltage(output).await?),
                "V",
            ));
        }
        Ok(lines)
    }

    /// Write the panel listing to the journal.
    pub async fn log_state(&self) -> AppResult<()> {
        let lines = self.describe().await?;
        self.session.log_listing("Auxiliary outputs:", &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScpiError;
    use crate::instruments::testing;
    use crate::transport::SimTransport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sets_and_reads_outputs() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("AUXV? 3", "-1.250");
        let session = testing::session(&sim, dir.path()).await;
        let panel = AuxOutputPanel::new(&session);

        assert_eq!(panel.set_voltage(2, 1.5).await.unwrap(), 1.5);
        assert_eq!(panel.voltage(3).await.unwrap(), -1.25);
        assert_eq!(sim.call_log()[1..], ["AUXV 2, 1.500", "AUXV? 3"]);
    }

    #[tokio::test]
    async fn rejects_bad_output_or_voltage() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new();
        let session = testing::session(&sim, dir.path()).await;
        let panel = AuxOutputPanel::new(&session);

        assert!(matches!(
            panel.set_voltage(5, 1.0).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(matches!(
            panel.set_voltage(1, 11.0).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(panel.voltage(0).await.is_err());
        assert_eq!(sim.call_log(), vec!["*IDN?"]);
    }
}
