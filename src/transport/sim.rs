//! Simulated instrument for tests and dry runs.
//!
//! [`SimTransport`] stands in for the physical channel:
//! - every command is recorded in a call log for verification
//! - `*IDN?` answers `Simulated VISA Device` unless scripted otherwise
//! - replies can be scripted per query as fixed text, as a sequence whose last
//!   element repeats, or as a binary block
//! - in echo mode, `CMD args` makes a later `CMD?` answer `args`
//! - a failure can be injected into the next operation
//!
//! Clones share state, so a test can keep one handle while a session owns another.
//!
//! # Example
//!
//! ```
//! use lab_scpi::transport::{SimTransport, Transport};
//!
//! # tokio_test::block_on(async {
//! let sim = SimTransport::new().with_echo(true);
//! sim.write("FREQ 1000").await.unwrap();
//! assert_eq!(sim.query("FREQ?").await.unwrap(), "1000");
//! assert_eq!(sim.call_log(), vec!["FREQ 1000", "FREQ?"]);
//! # })
//! ```

use super::Transport;
use crate::codec::encode_ieee_block;
use crate::error::{AppResult, ScpiError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Identification string of the simulator.
pub const SIM_IDN: &str = "Simulated VISA Device";

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Block(Vec<u8>),
}

impl Reply {
    fn into_bytes(self) -> Vec<u8> {
        match self {
            Reply::Text(text) => format!("{}\n", text).into_bytes(),
            Reply::Block(raw) => raw,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    call_log: Vec<String>,
    scripted: HashMap<String, VecDeque<Reply>>,
    echoed: HashMap<String, String>,
    pending: VecDeque<Vec<u8>>,
    echo: bool,
}

impl SimState {
    fn next_reply(&mut self, query: &str) -> Option<Reply> {
        if let Some(queue) = self.scripted.get_mut(query) {
            // The last scripted reply repeats forever
            let reply = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            if reply.is_some() {
                return reply;
            }
        }
        if let Some(args) = self.echoed.get(query) {
            return Some(Reply::Text(args.clone()));
        }
        (query == "*IDN?").then(|| Reply::Text(SIM_IDN.to_string()))
    }

    fn remember_setting(&mut self, command: &str) {
        if let Some((header, args)) = command.split_once(char::is_whitespace) {
            if !header.ends_with('?') {
                self.echoed
                    .insert(format!("{}?", header), args.trim().to_string());
            }
        }
    }
}

/// Emulated instrument channel.
#[derive(Debug, Clone)]
pub struct SimTransport {
    resource: String,
    state: Arc<Mutex<SimState>>,
    latency: Duration,
    fail_next: Arc<AtomicBool>,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTransport {
    /// Simulator answering only `*IDN?`.
    pub fn new() -> Self {
        Self {
            resource: "SIM".to_string(),
            state: Arc::new(Mutex::new(SimState::default())),
            latency: Duration::ZERO,
            fail_next: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Enable or disable echo mode.
    pub fn with_echo(self, enabled: bool) -> Self {
        self.state().echo = enabled;
        self
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer `query` with `answer` every time.
    pub fn with_reply(self, query: &str, answer: &str) -> Self {
        self.script_reply(query, answer);
        self
    }

    /// Answer `query` with each element of `answers` in turn; the last one repeats.
    pub fn with_sequence(self, query: &str, answers: &[&str]) -> Self {
        self.script_sequence(query, answers);
        self
    }

    /// Answer `query` with `payload` framed as a definite-length block.
    pub fn with_block(self, query: &str, payload: &[u8]) -> Self {
        self.script_block(query, payload);
        self
    }

    /// Script a fixed text reply, replacing any earlier script for `query`.
    pub fn script_reply(&self, query: &str, answer: &str) {
        self.script_sequence(query, &[answer]);
    }

    /// Script a sequence of text replies.
    pub fn script_sequence(&self, query: &str, answers: &[&str]) {
        let queue = answers
            .iter()
            .map(|a| Reply::Text((*a).to_string()))
            .collect();
        self.state().scripted.insert(query.to_string(), queue);
    }

    /// Script a binary block reply.
    pub fn script_block(&self, query: &str, payload: &[u8]) {
        let mut raw = encode_ieee_block(payload);
        raw.push(b'\n');
        self.state()
            .scripted
            .insert(query.to_string(), VecDeque::from([Reply::Block(raw)]));
    }

    /// Make the next operation fail with a transport error.
    pub fn trigger_failure(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every command written so far, queries included.
    pub fn call_log(&self) -> Vec<String> {
        self.state().call_log.clone()
    }

    /// Forget the recorded commands.
    pub fn clear_call_log(&self) {
        self.state().call_log.clear();
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin(&self, command: &str) -> AppResult<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ScpiError::Transport(format!(
                "Simulated failure on '{}'",
                command
            )));
        }
        tracing::debug!("SIM << {}", command);
        self.state().call_log.push(command.to_string());
        Ok(())
    }

    fn reply_for(&self, query: &str) -> AppResult<Reply> {
        self.state().next_reply(query).ok_or_else(|| {
            ScpiError::Transport(format!("Simulator has no reply scripted for '{}'", query))
        })
    }
}

#[async_trait]
impl Transport for SimTransport {
    fn resource(&self) -> &str {
        &self.resource
    }

    async fn write(&self, command: &str) -> AppResult<()> {
        self.begin(command).await?;
        let command = command.trim();
        let mut state = self.state();
        if command.contains('?') {
            // Read back later through read_raw
            if let Some(reply) = state.next_reply(command) {
                state.pending.push_back(reply.into_bytes());
            }
        } else if state.echo {
            state.remember_setting(command);
        }
        Ok(())
    }

    async fn query_with_delay(&self, command: &str, delay: Duration) -> AppResult<String> {
        self.begin(command).await?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let answer = match self.reply_for(command.trim())? {
            Reply::Text(text) => text,
            Reply::Block(raw) => String::from_utf8_lossy(&raw).into_owned(),
        };
        let answer = answer.trim().to_string();
        tracing::debug!("SIM >> {}", answer);
        Ok(answer)
    }

    async fn query_block(&self, command: &str) -> AppResult<Vec<u8>> {
        self.begin(command).await?;
        Ok(self.reply_for(command.trim())?.into_bytes())
    }

    async fn read_raw(&self) -> AppResult<Vec<u8>> {
        self.state()
            .pending
            .pop_front()
            .ok_or_else(|| ScpiError::Transport("Simulator has nothing to read".into()))
    }

    async fn close(&self) -> AppResult<()> {
        tracing::info!("Simulator closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::parse_ieee_block;

    #[tokio::test]
    async fn identifies_itself() {
        let sim = SimTransport::new();
        assert_eq!(sim.query("*IDN?").await.unwrap(), SIM_IDN);
        assert_eq!(sim.resource(), "SIM");
    }

    #[tokio::test]
    async fn unscripted_query_fails() {
        let sim = SimTransport::new();
        assert!(matches!(
            sim.query("FREQ?").await,
            Err(ScpiError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn sequence_repeats_last_reply() {
        let sim = SimTransport::new().with_sequence("*STB? 1", &["0", "0", "1"]);
        let mut answers = Vec::new();
        for _ in 0..5 {
            answers.push(sim.query("*STB? 1").await.unwrap());
        }
        assert_eq!(answers, vec!["0", "0", "1", "1", "1"]);
    }

    #[tokio::test]
    async fn echo_mode_reads_back_settings() {
        let sim = SimTransport::new().with_echo(true);
        sim.write("PHAS 12.50").await.unwrap();
        sim.write("DDEF 1, 1, 0").await.unwrap();
        assert_eq!(sim.query("PHAS?").await.unwrap(), "12.50");
        assert_eq!(sim.query("DDEF?").await.unwrap(), "1, 1, 0");

        let quiet = SimTransport::new();
        quiet.write("PHAS 12.50").await.unwrap();
        assert!(quiet.query("PHAS?").await.is_err());
    }

    #[tokio::test]
    async fn script_wins_over_echo() {
        let sim = SimTransport::new()
            .with_echo(true)
            .with_reply("FREQ?", "999.000");
        sim.write("FREQ 1000").await.unwrap();
        assert_eq!(sim.query("FREQ?").await.unwrap(), "999.000");
    }

    #[tokio::test]
    async fn block_reply() {
        let sim = SimTransport::new().with_block("CURV?", &[1, 2, 3]);
        let raw = sim.query_block("CURV?").await.unwrap();
        assert_eq!(parse_ieee_block(&raw).unwrap(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn delayed_read_after_write() {
        let sim = SimTransport::new().with_reply("OUTP? 1", "0.25");
        sim.write("OUTP? 1").await.unwrap();
        assert_eq!(sim.read_raw().await.unwrap(), b"0.25\n");
        assert!(sim.read_raw().await.is_err());
    }

    #[tokio::test]
    async fn injected_failure_hits_once() {
        let sim = SimTransport::new();
        let handle = sim.clone();
        handle.trigger_failure();
        assert!(sim.write("*RST").await.is_err());
        sim.write("*RST").await.unwrap();
        assert_eq!(handle.call_log(), vec!["*RST"]);
    }
}
