//! Input and lock-in system panel.

use crate::error::AppResult;
use crate::instruments::{read_label, write_option};
use crate::options::{format_property, OptionTable, OptionValue};
use crate::session::{Logging, Session};

const SOURCE: OptionTable = OptionTable::new("Input source", &["A", "A-B", "I1", "I100"]);
const GROUND: OptionTable = OptionTable::new("Input ground", &["Float", "Ground"]);
const COUPLING: OptionTable = OptionTable::new("Input coupling", &["AC", "DC"]);
const NOTCH: OptionTable =
    OptionTable::new("Line notch", &["Out", "Line In", "2xLine In", "Both In"]);
const RESERVE: OptionTable =
    OptionTable::new("Reserve", &["High Reserve", "Normal", "Low Noise"]);
const SLOPE: OptionTable = OptionTable::new(
    "Low pass filter slope",
    &["6dB/oct", "12dB/oct", "18dB/oct", "24dB/oct"],
);
const SYNC: OptionTable = OptionTable::new("Sync filter", &["Off", "On"]);

/// Full scale sensitivity, voltage / current input.
pub const SENSITIVITY: OptionTable = OptionTable::with_values(
    "Sensitivity",
    &[
        "2 nV/fA", "5 nV/fA", "10 nV/fA", "20 nV/fA", "50 nV/fA", "100 nV/fA", "200 nV/fA",
        "500 nV/fA", "1 µV/pA", "2 µV/pA", "5 µV/pA", "10 µV/pA", "20 µV/pA", "50 µV/pA",
        "100 µV/pA", "200 µV/pA", "500 µV/pA", "1 mV/nA", "2 mV/nA", "5 mV/nA", "10 mV/nA",
        "20 mV/nA", "50 mV/nA", "100 mV/nA", "200 mV/nA", "500 mV/nA", "1 V/µA",
    ],
    &[
        2e-9, 5e-9, 10e-9, 20e-9, 50e-9, 100e-9, 200e-9, 500e-9, 1e-6, 2e-6, 5e-6, 10e-6,
        20e-6, 50e-6, 100e-6, 200e-6, 500e-6, 1e-3, 2e-3, 5e-3, 10e-3, 20e-3, 50e-3, 100e-3,
        200e-3, 500e-3, 1.0,
    ],
);

/// Output filter time constant.
pub const TIME_CONSTANT: OptionTable = OptionTable::with_values(
    "Time constant",
    &[
        "10 µs", "30 µs", "100 µs", "300 µs", "1 ms", "3 ms", "10 ms", "30 ms", "100 ms",
        "300 ms", "1 s", "3 s", "10 s", "30 s", "100 s", "300 s", "1 ks", "3 ks", "10 ks",
        "30 ks",
    ],
    &[
        10e-6, 30e-6, 100e-6, 300e-6, 1e-3, 3e-3, 10e-3, 30e-3, 100e-3, 300e-3, 1.0, 3.0, 10.0,
        30.0, 100.0, 300.0, 1e3, 3e3, 10e3, 30e3,
    ],
);

/// Input configuration, gain and filtering.
#[derive(Clone, Copy)]
pub struct InputPanel<'a> {
    session: &'a Session,
    logging: Logging,
}

macro_rules! option_setting {
    ($(#[$get_doc:meta])* $get:ident, $(#[$set_doc:meta])* $set:ident, $query:literal, $header:literal, $table:expr) => {
        $(#[$get_doc])*
        pub async fn $get(&self) -> AppResult<&'static str> {
            read_label(self.session, $query, &$table, self.logging).await
        }

        $(#[$set_doc])*
        pub async fn $set(&self, value: impl Into<OptionValue>) -> AppResult<()> {
            write_option(self.session, $header, &$table, value, self.logging).await?;
            Ok(())
        }
    };
}

impl<'a> InputPanel<'a> {
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

    option_setting!(
        /// Input configuration (`A`, `A-B`, `I1`, `I100`).
        source,
        /// Select the input configuration.
        set_source,
        "ISRC?",
        "ISRC",
        SOURCE
    );

    option_setting!(
        /// Shield grounding.
        ground,
        /// Float or ground the input shield.
        set_ground,
        "IGND?",
        "IGND",
        GROUND
    );

    option_setting!(
        /// Input coupling.
        coupling,
        /// Select AC or DC coupling.
        set_coupling,
        "ICPL?",
        "ICPL",
        COUPLING
    );

    option_setting!(
        /// Line notch filters.
        notch,
        /// Select the line notch filters.
        set_notch,
        "ILIN?",
        "ILIN",
        NOTCH
    );

    option_setting!(
        /// Full scale sensitivity label.
        sensitivity,
        /// Set sensitivity by index, label (`"100 mV/nA"`) or value in volts (`0.1`).
        set_sensitivity,
        "SENS?",
        "SENS",
        SENSITIVITY
    );

    option_setting!(
        /// Dynamic reserve mode.
        reserve,
        /// Select the dynamic reserve mode.
        set_reserve,
        "RMOD?",
        "RMOD",
        RESERVE
    );

    option_setting!(
        /// Time constant label.
        time_constant,
        /// Set the time constant by index, label (`"300 ms"`) or seconds (`0.3`).
        set_time_constant,
        "OFLT?",
        "OFLT",
        TIME_CONSTANT
    );

    option_setting!(
        /// Low pass filter slope.
        low_pass_slope,
        /// Select the low pass filter slope.
        set_low_pass_slope,
        "OFSL?",
        "OFSL",
        SLOPE
    );

    option_setting!(
        /// Synchronous filter state.
        sync_filter,
        /// Turn the synchronous filter on or off.
        set_sync_filter,
        "SYNC?",
        "SYNC",
        SYNC
    );

    /// Current settings, one line each.
    pub async fn describe(&self) -> AppResult<Vec<String>> {
        let panel = self.quiet();
        Ok(vec![
            format_property("Source", panel.source().await?, ""),
            format_property("Ground", panel.ground().await?, ""),
            format_property("Coupling", panel.coupling().await?, ""),
            format_property("Notch", panel.notch().await?, ""),
            format_property("Sensitivity", panel.sensitivity().await?, ""),
            format_property("Reserve", panel.reserve().await?, ""),
            format_property("Time Constant", panel.time_constant().await?, ""),
            format_property("Low Pass Filter", panel.low_pass_slope().await?, ""),
            format_property("Sync. Filter", panel.sync_filter().await?, ""),
        ])
    }

    /// Write the panel listing to the journal.
    pub async fn log_state(&self) -> AppResult<()> {
        let lines = self.describe().await?;
        self.session
            .log_listing("Input and Lock-in system panel:", &lines)
    }
}
