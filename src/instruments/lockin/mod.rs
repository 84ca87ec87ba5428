//! Stanford Research SR830 lock-in amplifier.
//!
//! [`Lockin`] owns the session; its settings are grouped the way the front panel
//! groups them, each group a short-lived panel borrowing the session:
//!
//! ```no_run
//! use lab_scpi::config::LabConfig;
//! use lab_scpi::instruments::lockin::Lockin;
//!
//! # async fn run() -> lab_scpi::error::AppResult<()> {
//! let config = LabConfig::load()?.with_resource("GPIB0::8::INSTR");
//! let mut lockin = Lockin::connect(&config).await?;
//! lockin.reference().set_frequency(1_000.0).await?;
//! lockin.input().set_time_constant("300 ms").await?;
//! let r = lockin
//!     .acquisition()
//!     .read_value(lab_scpi::instruments::lockin::Quantity::R)
//!     .await?;
//! lockin.log_state().await?;
//! lockin.close().await?;
//! # let _ = r;
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod aux_outputs;
pub mod auto;
pub mod channels;
pub mod input;
pub mod interface;
pub mod reference;

pub use acquisition::{
    AcquisitionPanel, FrequencySweep, Quantity, SnapParameter, SweepResult, SweepStep,
};
pub use aux_outputs::AuxOutputPanel;
pub use auto::AutoPanel;
pub use channels::{ChannelPanel, OffsetExpand, CHANNEL_1, CHANNEL_2};
pub use input::InputPanel;
pub use interface::{InterfacePanel, SetupPanel};
pub use reference::ReferencePanel;

use crate::config::LabConfig;
use crate::error::AppResult;
use crate::session::Session;
use crate::transport::Transport;

/// SR830 driver.
#[derive(Debug)]
pub struct Lockin {
    session: Session,
}

impl Lockin {
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
        let session = Session::connect(config).await?;
        tracing::info!("Lock-in connected: {}", session.name());
        Ok(Self::new(session))
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Underlying session, mutably.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Reference and phase.
    pub fn reference(&self) -> ReferencePanel<'_> {
        ReferencePanel::new(&self.session)
    }

    /// Input and filters.
    pub fn input(&self) -> InputPanel<'_> {
        InputPanel::new(&self.session)
    }

    /// Channel 1 display.
    pub fn channel1(&self) -> ChannelPanel<'_> {
        ChannelPanel::new(&self.session, &CHANNEL_1)
    }

    /// Channel 2 display.
    pub fn channel2(&self) -> ChannelPanel<'_> {
        ChannelPanel::new(&self.session, &CHANNEL_2)
    }

    /// Auxiliary outputs.
    pub fn aux_outputs(&self) -> AuxOutputPanel<'_> {
        AuxOutputPanel::new(&self.session)
    }

    /// Local/remote control.
    pub fn interface(&self) -> InterfacePanel<'_> {
        InterfacePanel::new(&self.session)
    }

    /// Stored setups.
    pub fn setup(&self) -> SetupPanel<'_> {
        SetupPanel::new(&self.session)
    }

    /// Auto functions.
    pub fn auto(&self) -> AutoPanel<'_> {
        AutoPanel::new(&self.session)
    }

    /// Readings, sweeps and the data buffer.
    pub fn acquisition(&mut self) -> AcquisitionPanel<'_> {
        AcquisitionPanel::new(&mut self.session)
    }

    /// Every panel listing, one after the other.
    pub async fn describe(&self) -> AppResult<Vec<(&'static str, Vec<String>)>> {
        Ok(vec![
            ("Reference and Phase panel:", self.reference().describe().await?),
            ("Input and Lock-in system panel:", self.input().describe().await?),
            (CHANNEL_1.title, self.channel1().describe().await?),
            (CHANNEL_2.title, self.channel2().describe().await?),
            ("Auxiliary outputs:", self.aux_outputs().describe().await?),
            ("Interface panel:", self.interface().describe().await?),
        ])
    }

    /// Journal the state of every panel.
    pub async fn log_state(&self) -> AppResult<()> {
        self.reference().log_state().await?;
        self.input().log_state().await?;
        self.channel1().log_state().await?;
        self.channel2().log_state().await?;
        self.aux_outputs().log_state().await?;
        self.interface().log_state().await
    }

    /// Close the session.
    pub async fn close(self) -> AppResult<()> {
        self.session.close().await
    }
}
