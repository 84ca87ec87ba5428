//! Instrument sessions.
//!
//! A [`Session`] couples one open [`Transport`] with the instrument's journal. Every
//! command goes through it, so the journal stays in step with what was actually sent:
//!
//! - **`write`** / **`query`**: plain commands and one-line replies.
//! - **`query_ascii_values`** / **`query_binary_values`**: vector replies, decoded to
//!   `f64`. Vectors longer than `session.array_threshold` are saved to an array file
//!   and the journal gets a `SAVED:` reference instead of the numbers.
//! - **`save`** / **`load`**: explicit array files, remembered for the session.
//! - **`poll_until`** / **`wait_status_bit`**: completion waits, never journaled.
//!
//! Each call takes a [`Logging`] policy so bulk loops (sweeps, polling) can stay out
//! of the journal.

use crate::codec::{decode_samples, parse_ascii_values, parse_ieee_block, ByteOrder, DataType};
use crate::config::{LabConfig, PollingSettings, SessionSettings};
use crate::error::{AppResult, ScpiError};
use crate::log::SessionLog;
use crate::storage::{self, Array2, ArrayFormat};
use crate::transport::{open_transport, Transport};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Whether a call is recorded in the session journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logging {
    /// Record the exchange
    #[default]
    Enabled,
    /// Talk to the instrument without a journal entry
    Disabled,
}

impl Logging {
    fn enabled(self) -> bool {
        self == Logging::Enabled
    }
}

impl From<bool> for Logging {
    fn from(enabled: bool) -> Self {
        if enabled {
            Logging::Enabled
        } else {
            Logging::Disabled
        }
    }
}

/// Open connection to one instrument plus its journal.
pub struct Session {
    transport: Box<dyn Transport>,
    log: SessionLog,
    name: String,
    settings: SessionSettings,
    polling: PollingSettings,
    saved: Vec<PathBuf>,
    closed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.transport.resource())
            .field("name", &self.name)
            .field("log", &self.log.path())
            .field("saved", &self.saved.len())
            .finish()
    }
}

/// Journal file name for an identification string.
///
/// The first 16 characters, with anything a file system might reject replaced.
pub fn log_file_name(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .take(16)
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ' | ',') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "instrument.log".to_string()
    } else {
        format!("{}.log", stem)
    }
}

/// Base name for arrays saved on behalf of `command`: `CURV?` gives `curv`.
fn array_stem(command: &str) -> String {
    let stem: String = command
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    if stem.is_empty() {
        "temp".to_string()
    } else {
        stem
    }
}

fn with_command(err: ScpiError, command: &str) -> ScpiError {
    match err {
        ScpiError::Parse {
            command: c,
            answer,
            reason,
        } if c.is_empty() => ScpiError::Parse {
            command: command.to_string(),
            answer,
            reason,
        },
        other => other,
    }
}

fn format_values(values: &[f64]) -> String {
    values
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse an integer reply; `"1.0"` style answers are accepted when integral.
pub fn parse_integer(command: &str, answer: &str) -> AppResult<i64> {
    let text = answer.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Ok(v);
    }
    match text.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Ok(v as i64),
        _ => Err(ScpiError::parse(command, answer, "expected an integer")),
    }
}

/// Parse a numeric reply.
pub fn parse_number(command: &str, answer: &str) -> AppResult<f64> {
    answer
        .trim()
        .parse::<f64>()
        .map_err(|_| ScpiError::parse(command, answer, "expected a number"))
}

impl Session {
    /// Open the transport named in the configuration and start a session on it.
    pub async fn connect(config: &LabConfig) -> AppResult<Self> {
        let transport = open_transport(&config.transport.resource, &config.transport).await?;
        Self::open(transport, config).await
    }

    /// Start a session on an open transport.
    ///
    /// Asks the instrument for `*IDN?`, then writes the opening banner to
    /// `log_dir/<name>.log`.
    pub async fn open(transport: Box<dyn Transport>, config: &LabConfig) -> AppResult<Self> {
        let name = transport.query("*IDN?").await?.trim().to_string();
        let log = SessionLog::new(config.session.log_dir.join(log_file_name(&name)));
        log.session_banner(&["Session started", transport.resource(), &name])?;

        tracing::info!(
            resource = transport.resource(),
            log = %log.path().display(),
            "Session started with {}",
            name
        );

        Ok(Self {
            transport,
            log,
            name,
            settings: config.session.clone(),
            polling: config.polling.clone(),
            saved: Vec::new(),
            closed: false,
        })
    }

    /// Write the closing banner and release the transport.
    pub async fn close(mut self) -> AppResult<()> {
        self.closed = true;
        self.log.session_banner(&["Session closed"])?;
        self.transport.close().await?;
        tracing::info!("Session with {} closed", self.name);
        Ok(())
    }

    /// Identification string reported at open.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource address of the transport.
    pub fn resource(&self) -> &str {
        self.transport.resource()
    }

    /// The session journal.
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Underlying channel, for traffic that bypasses the journal entirely.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Polling configuration in effect.
    pub fn polling(&self) -> &PollingSettings {
        &self.polling
    }

    /// Array files saved so far, oldest first.
    pub fn saved_files(&self) -> &[PathBuf] {
        &self.saved
    }

    /// Send a command.
    pub async fn write(&self, command: &str, logging: Logging) -> AppResult<()> {
        self.transport.write(command).await?;
        if logging.enabled() {
            self.log.command(command)?;
        }
        Ok(())
    }

    /// Send a query and return the trimmed reply.
    pub async fn query(&self, command: &str, logging: Logging) -> AppResult<String> {
        let answer = self.transport.query(command).await?;
        if logging.enabled() {
            self.log.exchange(command, &answer)?;
        }
        Ok(answer)
    }

    /// Send a query, wait `delay`, then read the reply.
    ///
    /// For instruments that need time to settle before they answer. No other
    /// traffic reaches the instrument in between.
    pub async fn query_with_delay(
        &self,
        command: &str,
        delay: Duration,
        logging: Logging,
    ) -> AppResult<String> {
        let answer = self.transport.query_with_delay(command, delay).await?;
        if logging.enabled() {
            self.log.exchange(command, &answer)?;
        }
        Ok(answer)
    }

    /// Query a numeric value.
    pub async fn query_f64(&self, command: &str, logging: Logging) -> AppResult<f64> {
        let answer = self.query(command, logging).await?;
        parse_number(command, &answer)
    }

    /// Query an integer value.
    pub async fn query_i64(&self, command: &str, logging: Logging) -> AppResult<i64> {
        let answer = self.query(command, logging).await?;
        parse_integer(command, &answer)
    }

    /// Query a separated list of numbers.
    pub async fn query_ascii_values(
        &mut self,
        command: &str,
        separator: char,
        logging: Logging,
    ) -> AppResult<Vec<f64>> {
        let answer = self.transport.query(command).await?;
        let values =
            parse_ascii_values(&answer, separator).map_err(|e| with_command(e, command))?;
        if logging.enabled() {
            self.log_values(command, &values)?;
        }
        Ok(values)
    }

    /// Query a binary block and decode its samples.
    pub async fn query_binary_values(
        &mut self,
        command: &str,
        dtype: DataType,
        order: ByteOrder,
        logging: Logging,
    ) -> AppResult<Vec<f64>> {
        let raw = self.transport.query_block(command).await?;
        let payload = parse_ieee_block(&raw)?;
        let values = decode_samples(payload, dtype, order)?;
        tracing::debug!("{} returned {} samples", command, values.len());
        if logging.enabled() {
            self.log_values(command, &values)?;
        }
        Ok(values)
    }

    fn log_values(&mut self, command: &str, values: &[f64]) -> AppResult<()> {
        if values.len() > self.settings.array_threshold {
            self.record_array(command, &Array2::from_row(values.to_vec()))?;
            Ok(())
        } else {
            self.log.values(command, &format_values(values))
        }
    }

    /// Save `array` as the answer to `command` and journal a reference to it.
    pub fn record_array(&mut self, command: &str, array: &Array2) -> AppResult<PathBuf> {
        let path = self.store(array, Path::new(&array_stem(command)))?;
        self.log.exchange_saved(command, &path)?;
        Ok(path)
    }

    fn default_array_path(&self) -> PathBuf {
        self.settings
            .array_dir
            .join(format!("temp.{}", self.settings.array_format.extension()))
    }

    fn store(&mut self, array: &Array2, template: &Path) -> AppResult<PathBuf> {
        let path = storage::unique_path(template, &self.default_array_path())?;
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => ArrayFormat::Csv,
            Some("npy") => ArrayFormat::Npy,
            _ => self.settings.array_format,
        };
        storage::write_array(&path, array, format)?;
        tracing::debug!("Saved {:?} array to {}", array.shape(), path.display());
        self.saved.push(path.clone());
        Ok(path)
    }

    /// Save an array under a numbered name derived from `template`.
    ///
    /// Missing parts of `template` come from `session.array_dir` and
    /// `session.array_format`; an empty template saves `temp0`, `temp1`, ...
    pub fn save(
        &mut self,
        array: &Array2,
        template: impl AsRef<Path>,
        logging: Logging,
    ) -> AppResult<PathBuf> {
        let path = self.store(array, template.as_ref())?;
        if logging.enabled() {
            self.log.saved(&path)?;
        }
        Ok(path)
    }

    /// Load an array, accepting the same abbreviated names `save` produces.
    pub fn load(&self, name: impl AsRef<Path>) -> AppResult<Array2> {
        let name = name.as_ref();
        let path = storage::resolve_existing(
            name,
            &self.settings.array_dir,
            self.settings.array_format.extension(),
        )
        .ok_or_else(|| ScpiError::ArrayFile(format!("{} not found", name.display())))?;
        storage::read_array(&path)
    }

    /// Free-form comment in the journal.
    pub fn annotate(&self, comment: &str) -> AppResult<()> {
        self.log.annotate(comment)
    }

    /// Underlined title followed by indented lines.
    pub fn log_listing(&self, title: &str, lines: &[String]) -> AppResult<()> {
        self.log.underline(title, '-')?;
        self.log.tabulated_lines(lines, 4)
    }

    /// Repeat `query` until `done` accepts the answer.
    ///
    /// Polls every `polling.interval_ms` and gives up with [`ScpiError::Timeout`]
    /// after `polling.timeout_ms`. Nothing is journaled.
    pub async fn poll_until<F>(&self, query: &str, done: F) -> AppResult<String>
    where
        F: FnMut(&str) -> AppResult<bool>,
    {
        self.poll_until_within(query, self.polling.timeout(), done)
            .await
    }

    /// Like [`Session::poll_until`], with an explicit deadline.
    pub async fn poll_until_within<F>(
        &self,
        query: &str,
        timeout: Duration,
        mut done: F,
    ) -> AppResult<String>
    where
        F: FnMut(&str) -> AppResult<bool>,
    {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            let answer = self.transport.query(query).await?;
            attempts += 1;
            if done(&answer)? {
                tracing::debug!("{} satisfied after {} polls", query, attempts);
                return Ok(answer);
            }
            if started.elapsed() >= timeout {
                tracing::warn!("Gave up polling {} after {} attempts", query, attempts);
                return Err(ScpiError::Timeout {
                    command: query.to_string(),
                    waited: started.elapsed(),
                });
            }
            tokio::time::sleep(self.polling.interval()).await;
        }
    }

    /// Wait until status byte bit `bit` reads as set (`*STB? bit` non-zero).
    pub async fn wait_status_bit(&self, bit: u8) -> AppResult<()> {
        let query = format!("*STB? {}", bit);
        self.poll_until(&query, |answer| Ok(parse_integer(&query, answer)? != 0))
            .await?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                "Session with {} dropped without close(); transport left to drop",
                self.name
            );
            if let Err(e) = self.log.session_banner(&["Session closed"]) {
                tracing::warn!("Could not write closing banner: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SimTransport;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn config(dir: &Path) -> LabConfig {
        let mut config = LabConfig::default().with_output_dir(dir);
        config.polling.interval_ms = 1;
        config.polling.timeout_ms = 50;
        config.session.array_threshold = 4;
        config
    }

    #[test]
    fn log_names_are_truncated_and_safe() {
        assert_eq!(
            log_file_name("Stanford_Research_Systems,SR830,s/n12345"),
            "Stanford_Researc.log"
        );
        assert_eq!(log_file_name("A/B:C"), "A_B_C.log");
        assert_eq!(log_file_name("  "), "instrument.log");
        assert_eq!(array_stem("CURV?"), "curv");
        assert_eq!(array_stem("*STB?"), "temp");
    }

    #[test]
    fn integer_replies() {
        assert_eq!(parse_integer("SPTS?", "42\n").unwrap(), 42);
        assert_eq!(parse_integer("SPTS?", "3.0").unwrap(), 3);
        assert!(parse_integer("SPTS?", "3.5").is_err());
    }

    #[tokio::test]
    async fn open_writes_banner_and_journals_traffic() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("FREQ?", "1000.000");
        let session = Session::open(Box::new(sim.clone()), &config(dir.path()))
            .await
            .unwrap();

        session.write("FMOD 1", Logging::Enabled).await.unwrap();
        session.write("FMOD 0", Logging::Disabled).await.unwrap();
        assert_eq!(session.query_f64("FREQ?", Logging::Enabled).await.unwrap(), 1000.0);
        let log_path = session.log().path().to_path_buf();
        session.close().await.unwrap();

        assert_eq!(
            log_path,
            dir.path().join("logs").join("Simulated VISA D.log")
        );
        let text = std::fs::read_to_string(&log_path).unwrap();
        assert!(text.contains("# Session started"));
        assert!(text.contains("# SIM "));
        assert!(text.contains(">> FMOD 1"));
        assert!(!text.contains("FMOD 0"));
        assert!(text.contains("         << 1000.000"));
        assert!(text.contains("# Session closed"));
        assert_eq!(sim.call_log(), vec!["*IDN?", "FMOD 1", "FMOD 0", "FREQ?"]);
    }

    #[tokio::test]
    async fn long_vectors_go_to_array_files() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new()
            .with_reply("SNAP? 1, 2", "0.5,-0.25")
            .with_reply("TRCA? 1, 0, 5", "1,2,3,4,5,6,");
        let mut session = Session::open(Box::new(sim), &config(dir.path()))
            .await
            .unwrap();

        let short = session
            .query_ascii_values("SNAP? 1, 2", ',', Logging::Enabled)
            .await
            .unwrap();
        assert_eq!(short, vec![0.5, -0.25]);
        let long = session
            .query_ascii_values("TRCA? 1, 0, 5", ',', Logging::Enabled)
            .await
            .unwrap();
        assert_eq!(long.len(), 6);

        let saved = session.saved_files().to_vec();
        assert_eq!(saved, vec![dir.path().join("data").join("trca0.npy")]);
        assert_eq!(session.load("trca0").unwrap().rows(), &[long]);

        let text = std::fs::read_to_string(session.log().path()).unwrap();
        assert!(text.contains("        0.5, -0.25"));
        assert!(text.contains("<> SAVED: "));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn binary_values_decode() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_block("CURV?", &[0, 128, 255]);
        let mut session = Session::open(Box::new(sim), &config(dir.path()))
            .await
            .unwrap();
        let values = session
            .query_binary_values("CURV?", DataType::U8, ByteOrder::Big, Logging::Enabled)
            .await
            .unwrap();
        assert_eq!(values, vec![0.0, 128.0, 255.0]);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn delayed_query_reads_pending_reply() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_reply("OUTP? 3", "1.5E-3");
        let session = Session::open(Box::new(sim), &config(dir.path()))
            .await
            .unwrap();
        let answer = session
            .query_with_delay("OUTP? 3", Duration::from_millis(1), Logging::Enabled)
            .await
            .unwrap();
        assert_eq!(answer, "1.5E-3");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_bit_wait_and_timeout() {
        let dir = tempdir().unwrap();
        let sim = SimTransport::new().with_sequence("*STB? 1", &["0", "0", "1"]);
        let session = Session::open(Box::new(sim.clone()), &config(dir.path()))
            .await
            .unwrap();
        session.wait_status_bit(1).await.unwrap();
        let polls = sim.call_log().iter().filter(|c| *c == "*STB? 1").count();
        assert_eq!(polls, 3);

        sim.script_reply("*STB? 1", "0");
        assert!(matches!(
            session.wait_status_bit(1).await,
            Err(ScpiError::Timeout { .. })
        ));

        // Polling never reaches the journal
        let text = std::fs::read_to_string(session.log().path()).unwrap();
        assert!(!text.contains("*STB?"));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn explicit_save_numbers_files() {
        let dir = tempdir().unwrap();
        let mut session = Session::open(Box::new(SimTransport::new()), &config(dir.path()))
            .await
            .unwrap();
        let array = Array2::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let first = session.save(&array, "", Logging::Enabled).unwrap();
        let second = session.save(&array, "", Logging::Disabled).unwrap();
        assert_eq!(first, dir.path().join("data").join("temp0.npy"));
        assert_eq!(second, dir.path().join("data").join("temp1.npy"));
        assert_eq!(session.load(&second).unwrap(), array);
        assert!(session.load("missing").is_err());
        session.close().await.unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn drop_without_close_warns_and_closes_journal() {
        let dir = tempdir().unwrap();
        let session = Session::open(Box::new(SimTransport::new()), &config(dir.path()))
            .await
            .unwrap();
        let log_path = session.log().path().to_path_buf();
        drop(session);

        assert!(logs_contain("dropped without close()"));
        let text = std::fs::read_to_string(log_path).unwrap();
        assert!(text.contains("Session closed"));
    }
}
