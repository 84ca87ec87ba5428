//! Remote interface and stored setups.

use crate::error::AppResult;
use crate::instruments::{check_range, read_label, write_option};
use crate::options::{format_property, OptionTable, OptionValue};
use crate::session::{Logging, Session};

const LOCAL: OptionTable = OptionTable::new("Control", &["Local", "Remote", "Local Lockout"]);

/// Front-panel lockout state.
#[derive(Clone, Copy)]
pub struct InterfacePanel<'a> {
    session: &'a Session,
    logging: Logging,
}

impl<'a> InterfacePanel<'a> {
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

    /// `Local`, `Remote` or `Local Lockout`.
    pub async fn control(&self) -> AppResult<&'static str> {
        read_label(self.session, "LOCL?", &LOCAL, self.logging).await
    }

    /// Select local or remote control.
    pub async fn set_control(&self, value: impl Into<OptionValue>) -> AppResult<()> {
        write_option(self.session, "LOCL", &LOCAL, value, self.logging).await?;
        Ok(())
    }

    /// Current settings, one line each.
    pub async fn describe(&self) -> AppResult<Vec<String>> {
        Ok(vec![format_property(
            "Control",
            self.quiet().control().await?,
            "",
        )])
    }

    /// Write the panel listing to the journal.
    pub async fn log_state(&self) -> AppResult<()> {
        let lines = self.describe().await?;
        self.session.log_listing("Interface panel:", &lines)
    }
}

/// Nine non-volatile setup slots.
#[derive(Clone, Copy)]
pub struct SetupPanel<'a> {
    session: &'a Session,
    logging: Logging,
}

impl<'a> SetupPanel<'a> {
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

    /// Store the current configuration in `slot` (1 to 9).
    pub async fn save(&self, slot: u8) -> AppResult<()> {
        check_range("Setup slot", i64::from(slot), 1, 9)?;
        self.session
            .write(&format!("SSET {}", slot), self.logging)
            .await?;
        tracing::info!("Saved lock-in setup to slot {}", slot);
        Ok(())
    }

    /// Recall the configuration stored in `slot` (1 to 9).
    pub async fn recall(&self, slot: u8) -> AppResult<()> {
        check_range("Setup slot", i64::from(slot), 1, 9)?;
        self.session
            .write(&format!("RSET {}", slot), self.logging)
            .await?;
        tracing::info!("Recalled lock-in setup from slot {}", slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::testing;
    use crate::transport::SimTransport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn control_and_setups() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("LOCL?", "2");
        let session = testing::session(&sim, dir.path()).await;

        let interface = InterfacePanel::new(&session);
        assert_eq!(interface.control().await.unwrap(), "Local Lockout");
        interface.set_control("remote").await.unwrap();

        let setup = SetupPanel::new(&session);
        setup.save(3).await.unwrap();
        setup.recall(9).await.unwrap();
        assert!(setup.save(0).await.is_err());
        assert!(setup.recall(10).await.is_err());

        assert_eq!(
            sim.call_log()[1..],
            ["LOCL?", "LOCL 1", "SSET 3", "RSET 9"]
        );
    }
}
