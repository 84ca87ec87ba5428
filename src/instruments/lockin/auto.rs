//! Automatic gain, reserve, phase and offset.
//!
//! Each function starts on the instrument and is complete when status byte bit 1
//! (command execution in progress) reads back as set again.

use crate::error::AppResult;
use crate::instruments::check_range;
use crate::session::{Logging, Session};

/// Auto functions.
#[derive(Clone, Copy)]
pub struct AutoPanel<'a> {
    session: &'a Session,
    logging: Logging,
}

impl<'a> AutoPanel<'a> {
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

    async fn run(&self, command: &str, what: &str) -> AppResult<()> {
        self.session.write(command, self.logging).await?;
        self.session.wait_status_bit(1).await?;
        tracing::info!("Auto {} complete", what);
        Ok(())
    }

    /// Auto gain; may take many time constants.
    pub async fn gain(&self) -> AppResult<()> {
        self.run("AGAN", "gain").await
    }

    /// Auto reserve.
    pub async fn reserve(&self) -> AppResult<()> {
        self.run("ARSV", "reserve").await
    }

    /// Auto phase.
    pub async fn phase(&self) -> AppResult<()> {
        self.run("APHS", "phase").await
    }

    /// Auto offset of X (1), Y (2) or R (3).
    pub async fn offset(&self, quantity: u8) -> AppResult<()> {
        check_range("Auto offset quantity", i64::from(quantity), 1, 3)?;
        self.run(&format!("AOFF {}", quantity), "offset").await
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
    async fn waits_for_status_bit() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_sequence("*STB? 1", &["0", "0", "1"]);
        let session = testing::session(&sim, dir.path()).await;

        AutoPanel::new(&session).gain().await.unwrap();
        assert_eq!(
            sim.call_log()[1..],
            ["AGAN", "*STB? 1", "*STB? 1", "*STB? 1"]
        );

        AutoPanel::new(&session).offset(3).await.unwrap();
        assert_eq!(sim.call_log()[5..], ["AOFF 3", "*STB? 1"]);
    }

    #[tokio::test]
    async fn gives_up_after_timeout() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("*STB? 1", "0");
        let session = testing::session(&sim, dir.path()).await;

        assert!(matches!(
            AutoPanel::new(&session).phase().await,
            Err(ScpiError::Timeout { .. })
        ));
        assert!(AutoPanel::new(&session).offset(4).await.is_err());
    }
}
