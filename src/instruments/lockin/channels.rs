//! Channel 1 and channel 2 display panels.
//!
//! Both channels share one command set, addressed by channel number. Display and
//! ratio are written together (`DDEF n, display, ratio`), so changing one reads the
//! other back first.

use crate::error::{AppResult, ScpiError};
use crate::instruments::{integer_pair, write_option};
use crate::options::{format_property, Limited, OptionTable, OptionValue};
use crate::session::{parse_number, Logging, Session};

const OFFSET: Limited = Limited::new("Offset", -105.0, 105.0, 2);
const EXPAND: OptionTable = OptionTable::new("Expand", &["x1", "x10", "x100"]);

/// Static description of one display channel.
#[derive(Debug)]
pub struct ChannelSpec {
    /// Channel number (1 or 2)
    pub number: u8,
    /// Listing title
    pub title: &'static str,
    display: OptionTable,
    ratio: OptionTable,
    output: OptionTable,
    /// Quantities whose offset and expand are set from this panel, with their
    /// `OEXP` index
    pub offsets: &'static [(&'static str, u8)],
}

/// Channel 1: X, R, X noise or Aux In 1/2.
pub static CHANNEL_1: ChannelSpec = ChannelSpec {
    number: 1,
    title: "Channel 1 panel:",
    display: OptionTable::new("Channel 1 display", &["X", "R", "Xn", "Aux1", "Aux2"]),
    ratio: OptionTable::new("Channel 1 ratio", &["None", "Aux In 1", "Aux In 2"]),
    output: OptionTable::new("Channel 1 output", &["Display", "X"]),
    offsets: &[("X", 1), ("Y", 2)],
};

/// Channel 2: Y, θ, Y noise or Aux In 3/4.
pub static CHANNEL_2: ChannelSpec = ChannelSpec {
    number: 2,
    title: "Channel 2 panel:",
    display: OptionTable::new("Channel 2 display", &["Y", "T", "Yn", "Aux3", "Aux4"]),
    ratio: OptionTable::new("Channel 2 ratio", &["None", "Aux In 3", "Aux In 4"]),
    output: OptionTable::new("Channel 2 output", &["Display", "Y"]),
    offsets: &[("R", 3)],
};

/// Offset (percent of full scale) and expand factor of one quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetExpand {
    /// Offset in percent
    pub offset: f64,
    /// Expand label (`x1`, `x10`, `x100`)
    pub expand: &'static str,
}

/// Display, ratio, front-panel output and offsets of one channel.
#[derive(Clone, Copy)]
pub struct ChannelPanel<'a> {
    session: &'a Session,
    spec: &'static ChannelSpec,
    logging: Logging,
}

impl<'a> ChannelPanel<'a> {
    pub(crate) fn new(session: &'a Session, spec: &'static ChannelSpec) -> Self {
        Self {
            session,
            spec,
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

    /// Channel description.
    pub fn spec(&self) -> &'static ChannelSpec {
        self.spec
    }

    async fn display_ratio(&self) -> AppResult<(usize, usize)> {
        let query = format!("DDEF? {}", self.spec.number);
        let answer = self.session.query(&query, self.logging).await?;
        let (display, ratio) = integer_pair(&query, &answer)?;
        let display = usize::try_from(display)
            .map_err(|_| ScpiError::parse(&query, &answer, "negative display index"))?;
        let ratio = usize::try_from(ratio)
            .map_err(|_| ScpiError::parse(&query, &answer, "negative ratio index"))?;
        Ok((display, ratio))
    }

    async fn write_display_ratio(&self, display: usize, ratio: usize) -> AppResult<()> {
        let command = format!("DDEF {}, {}, {}", self.spec.number, display, ratio);
        self.session.write(&command, self.logging).await
    }

    /// Displayed quantity.
    pub async fn display(&self) -> AppResult<&'static str> {
        let (display, _) = self.display_ratio().await?;
        self.spec.display.label(display)
    }

    /// Select the displayed quantity, keeping the ratio.
    pub async fn set_display(&self, value: impl Into<OptionValue>) -> AppResult<()> {
        let display = self.spec.display.index_of(value)?;
        let (_, ratio) = self.display_ratio().await?;
        self.write_display_ratio(display, ratio).await
    }

    /// Ratio applied to the display.
    pub async fn ratio(&self) -> AppResult<&'static str> {
        let (_, ratio) = self.display_ratio().await?;
        self.spec.ratio.label(ratio)
    }

    /// Select the ratio, keeping the displayed quantity.
    pub async fn set_ratio(&self, value: impl Into<OptionValue>) -> AppResult<()> {
        let ratio = self.spec.ratio.index_of(value)?;
        let (display, _) = self.display_ratio().await?;
        self.write_display_ratio(display, ratio).await
    }

    /// What the front-panel output carries.
    pub async fn output(&self) -> AppResult<&'static str> {
        let query = format!("FPOP? {}", self.spec.number);
        let index = self.session.query_i64(&query, self.logging).await?;
        let index = usize::try_from(index)
            .map_err(|_| ScpiError::parse(&query, &index.to_string(), "negative option index"))?;
        self.spec.output.label(index)
    }

    /// Select what the front-panel output carries.
    pub async fn set_output(&self, value: impl Into<OptionValue>) -> AppResult<()> {
        let header = format!("FPOP {},", self.spec.number);
        write_option(self.session, &header, &self.spec.output, value, self.logging).await?;
        Ok(())
    }

    fn offset_index(&self, quantity: &str) -> AppResult<u8> {
        self.spec
            .offsets
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(quantity.trim()))
            .map(|(_, index)| *index)
            .ok_or_else(|| ScpiError::InvalidOption {
                setting: format!("Channel {} offset quantity", self.spec.number),
                value: quantity.to_string(),
                choices: self.spec.offsets.iter().map(|(n, _)| n.to_string()).collect(),
            })
    }

    /// Offset and expand of `quantity` (`X`/`Y` on channel 1, `R` on channel 2).
    pub async fn offset_expand(&self, quantity: &str) -> AppResult<OffsetExpand> {
        let index = self.offset_index(quantity)?;
        let query = format!("OEXP? {}", index);
        let answer = self.session.query(&query, self.logging).await?;
        let mut fields = answer.split(',').map(str::trim);
        let (offset, expand) = match (fields.next(), fields.next(), fields.next()) {
            (Some(offset), Some(expand), None) => (offset, expand),
            _ => {
                return Err(ScpiError::parse(
                    &query,
                    &answer,
                    "expected offset and expand",
                ))
            }
        };
        let offset = parse_number(&query, offset)?;
        let expand = expand
            .parse::<usize>()
            .map_err(|e| ScpiError::parse(&query, &answer, e.to_string()))?;
        Ok(OffsetExpand {
            offset,
            expand: EXPAND.label(expand)?,
        })
    }

    /// Set offset (percent, -105.00 to 105.00) and expand of `quantity`.
    pub async fn set_offset_expand(
        &self,
        quantity: &str,
        offset: f64,
        expand: impl Into<OptionValue>,
    ) -> AppResult<OffsetExpand> {
        let index = self.offset_index(quantity)?;
        let text = OFFSET.format(offset)?;
        let expand = EXPAND.index_of(expand)?;
        self.session
            .write(&format!("OEXP {}, {}, {}", index, text, expand), self.logging)
            .await?;
        Ok(OffsetExpand {
            offset: OFFSET.apply(offset)?,
            expand: EXPAND.label(expand)?,
        })
    }

    /// Set the offset of `quantity`, keeping its expand.
    pub async fn set_offset(&self, quantity: &str, offset: f64) -> AppResult<OffsetExpand> {
        OFFSET.apply(offset)?;
        let current = self.offset_expand(quantity).await?;
        self.set_offset_expand(quantity, offset, current.expand).await
    }

    /// Set the expand of `quantity`, keeping its offset.
    pub async fn set_expand(
        &self,
        quantity: &str,
        expand: impl Into<OptionValue>,
    ) -> AppResult<OffsetExpand> {
        let expand = EXPAND.index_of(expand)?;
        let current = self.offset_expand(quantity).await?;
        self.set_offset_expand(quantity, current.offset, expand).await
    }

    /// Current settings, one line each.
    pub async fn describe(&self) -> AppResult<Vec<String>> {
        let panel = self.quiet();
        let mut lines = vec![
            format_property("Display", panel.display().await?, ""),
            format_property("Ratio", panel.ratio().await?, ""),
            format_property("Output", panel.output().await?, ""),
        ];
        for (quantity, _) in self.spec.offsets {
            let oe = panel.offset_expand(quantity).await?;
            lines.push(format_property(
                &format!("{} Offset", quantity),
                format!("{:.2}", oe.offset),
                "%",
            ));
            lines.push(format_property(&format!("{} Expand", quantity), oe.expand, ""));
        }
        Ok(lines)
    }

    /// Write the panel listing to the journal.
    pub async fn log_state(&self) -> AppResult<()> {
        let lines = self.describe().await?;
        self.session.log_listing(self.spec.title, &lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::testing;
    use crate::transport::SimTransport;
    use tempfile::tempdir;

    #[tokio::test]
    async fn display_keeps_ratio() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("DDEF? 1", "0,2")
            .with_reply("DDEF? 2", "1,0");
        let session = testing::session(&sim, dir.path()).await;

        ChannelPanel::new(&session, &CHANNEL_1)
            .set_display("R")
            .await
            .unwrap();
        ChannelPanel::new(&session, &CHANNEL_2)
            .set_ratio("Aux In 4")
            .await
            .unwrap();

        assert_eq!(
            sim.call_log()[1..],
            ["DDEF? 1", "DDEF 1, 1, 2", "DDEF? 2", "DDEF 2, 1, 2"]
        );
    }

    #[tokio::test]
    async fn channel_two_uses_its_own_tables() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("DDEF? 2", "1,2")
            .with_reply("FPOP? 2", "1");
        let session = testing::session(&sim, dir.path()).await;
        let panel = ChannelPanel::new(&session, &CHANNEL_2);

        assert_eq!(panel.display().await.unwrap(), "T");
        assert_eq!(panel.ratio().await.unwrap(), "Aux In 4");
        assert_eq!(panel.output().await.unwrap(), "Y");
        assert!(panel.set_display("X").await.is_err());
    }

    #[tokio::test]
    async fn offsets_per_quantity() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("OEXP? 2", "-12.50,1");
        let session = testing::session(&sim, dir.path()).await;
        let panel = ChannelPanel::new(&session, &CHANNEL_1);

        assert_eq!(
            panel.offset_expand("y").await.unwrap(),
            OffsetExpand {
                offset: -12.5,
                expand: "x10"
            }
        );
        panel.set_offset_expand("X", 50.0, "x100").await.unwrap();
        assert_eq!(sim.call_log().last().unwrap(), "OEXP 1, 50.00, 2");

        assert!(matches!(
            panel.offset_expand("R").await,
            Err(ScpiError::InvalidOption { .. })
        ));
        assert!(matches!(
            panel.set_offset_expand("X", 110.0, 0usize).await,
            Err(ScpiError::OutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn offset_and_expand_keep_each_other() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("OEXP? 1", "12.50,2")
            .with_reply("OEXP? 3", "-3.25,1");
        let session = testing::session(&sim, dir.path()).await;

        let x = ChannelPanel::new(&session, &CHANNEL_1)
            .set_offset("X", -40.0)
            .await
            .unwrap();
        assert_eq!(
            x,
            OffsetExpand {
                offset: -40.0,
                expand: "x100"
            }
        );
        let r = ChannelPanel::new(&session, &CHANNEL_2)
            .set_expand("R", "x1")
            .await
            .unwrap();
        assert_eq!(r.offset, -3.25);

        assert_eq!(
            sim.call_log()[1..],
            ["OEXP? 1", "OEXP 1, -40.00, 2", "OEXP? 3", "OEXP 3, -3.25, 0"]
        );
    }

    #[tokio::test]
    async fn invalid_offset_or_expand_sends_nothing() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("OEXP? 2", "0.00,0");
        let session = testing::session(&sim, dir.path()).await;
        let panel = ChannelPanel::new(&session, &CHANNEL_1);

        assert!(matches!(
            panel.set_offset("Y", 120.0).await,
            Err(ScpiError::OutOfRange { .. })
        ));
        assert!(matches!(
            panel.set_expand("Y", "x1000").await,
            Err(ScpiError::InvalidOption { .. })
        ));
        assert_eq!(sim.call_log(), vec!["*IDN?"]);
    }

    #[tokio::test]
    async fn listing_for_channel_two() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("DDEF? 2", "0,0")
            .with_reply("FPOP? 2", "0")
            .with_reply("OEXP? 3", "0.00,0");
        let session = testing::session(&sim, dir.path()).await;
        let lines = ChannelPanel::new(&session, &CHANNEL_2)
            .describe()
            .await
            .unwrap();
        assert_eq!(
            lines,
            vec![
                "Display                 Y",
                "Ratio                   None",
                "Output                  Display",
                "R Offset                0.00 %",
                "R Expand                x1",
            ]
        );
    }
}
