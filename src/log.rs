//! Session journal.
//!
//! Every instrument session appends a human-readable record of its traffic to a text
//! file. The layout is fixed so journals from different days line up:
//!
//! ```text
//! ########################################
//! # 10/16/26 - 14:02:11                  #
//! # Session started                      #
//! # GPIB0::8::INSTR                      #
//! # Stanford_Research_Systems,SR830,...  #
//! ########################################
//! 14:02:12 >> FREQ 1000.000
//! 14:02:12 >> FREQ?
//!          << 1000.000
//! 14:02:15 >> CURV?
//! 14:02:15 <> SAVED: data/temp/curve0.npy
//! ```
//!
//! Each entry is formatted in memory and appended with a single write, so lines of
//! one entry never interleave with another.

use crate::error::AppResult;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const BANNER_WIDTH: usize = 40;
const ANSWER_INDENT: &str = "        ";

/// Append-only text journal for one instrument.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    /// Journal at `path`. The parent directory is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Framed banner with the current date and time as first line.
    pub fn session_banner(&self, lines: &[&str]) -> AppResult<()> {
        let mut entry = String::from("\n");
        entry.push_str(&"#".repeat(BANNER_WIDTH));
        entry.push('\n');
        let now = Local::now().format("%x - %X").to_string();
        for line in std::iter::once(now.as_str()).chain(lines.iter().copied()) {
            entry.push_str(&format!("# {:<36} #\n", line));
        }
        entry.push_str(&"#".repeat(BANNER_WIDTH));
        entry.push('\n');
        self.append(&entry)
    }

    /// `HH:MM:SS >> command`
    pub fn command(&self, command: &str) -> AppResult<()> {
        self.append(&command_line(command))
    }

    /// Command followed by the instrument's answer.
    pub fn exchange(&self, command: &str, answer: &str) -> AppResult<()> {
        let entry = format!("{}{} << {}\n", command_line(command), ANSWER_INDENT, answer);
        self.append(&entry)
    }

    /// Command followed by decoded values (or any other indented text).
    pub fn values(&self, command: &str, text: &str) -> AppResult<()> {
        let entry = format!("{}{}{}\n", command_line(command), ANSWER_INDENT, text);
        self.append(&entry)
    }

    /// Command whose answer was written to an array file.
    pub fn exchange_saved(&self, command: &str, path: &Path) -> AppResult<()> {
        let entry = format!("{}{}", command_line(command), saved_line(path));
        self.append(&entry)
    }

    /// `HH:MM:SS <> SAVED: path`
    pub fn saved(&self, path: &Path) -> AppResult<()> {
        self.append(&saved_line(path))
    }

    /// Free-form comment: `HH:MM:SS ## comment`.
    pub fn annotate(&self, comment: &str) -> AppResult<()> {
        self.append(&format!("{} ## {}\n\n", timestamp(), comment))
    }

    /// Framed block of text, each line padded and truncated to fit `width`.
    pub fn block(&self, lines: &[&str], border: char, width: usize) -> AppResult<()> {
        let inner = width.saturating_sub(4);
        let rule: String = std::iter::repeat(border).take(width).collect();
        let mut entry = format!("{}\n", rule);
        for line in lines {
            let clipped: String = line.chars().take(inner).collect();
            entry.push_str(&format!("{} {:<inner$} {}\n", border, clipped, border));
        }
        entry.push_str(&rule);
        entry.push_str("\n\n");
        self.append(&entry)
    }

    /// Title underlined with `style`.
    pub fn underline(&self, text: &str, style: char) -> AppResult<()> {
        let rule: String = std::iter::repeat(style).take(text.chars().count()).collect();
        self.append(&format!("{}\n{}\n\n", text, rule))
    }

    /// Lines indented by `tab` spaces, followed by a blank line.
    pub fn tabulated_lines(&self, lines: &[String], tab: usize) -> AppResult<()> {
        let indent = " ".repeat(tab);
        let mut entry = String::new();
        for line in lines {
            entry.push_str(&indent);
            entry.push_str(line);
            entry.push('\n');
        }
        entry.push('\n');
        self.append(&entry)
    }

    fn append(&self, entry: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())?;
        Ok(())
    }
}

fn timestamp() -> String {
    Local::now().format("%X").to_string()
}

fn command_line(command: &str) -> String {
    format!("{} >> {}\n", timestamp(), command)
}

fn saved_line(path: &Path) -> String {
    format!("{} <> SAVED: {}\n", timestamp(), path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read(log: &SessionLog) -> String {
        fs::read_to_string(log.path()).unwrap()
    }

    #[test]
    fn banner_is_framed() {
        let dir = tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("nested/inst.log"));
        log.session_banner(&["Session started", "SIM"]).unwrap();

        let text = read(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "#".repeat(40));
        assert_eq!(lines[3], format!("# {:<36} #", "Session started"));
        assert_eq!(lines[4], format!("# {:<36} #", "SIM"));
        assert_eq!(lines[5], "#".repeat(40));
        assert!(lines.iter().skip(1).all(|l| l.len() == 40));
    }

    #[test]
    fn exchange_layout() {
        let dir = tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("inst.log"));
        log.command("FMOD 1").unwrap();
        log.exchange("FREQ?", "1000.000").unwrap();

        let text = read(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with(" >> FMOD 1"));
        assert_eq!(lines[0].len(), "HH:MM:SS >> FMOD 1".len());
        assert!(lines[1].ends_with(" >> FREQ?"));
        assert_eq!(lines[2], "         << 1000.000");
    }

    #[test]
    fn saved_reference() {
        let dir = tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("inst.log"));
        log.exchange_saved("CURV?", Path::new("data/curve0.npy")).unwrap();

        let text = read(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with(">> CURV?"));
        assert!(lines[1].ends_with("<> SAVED: data/curve0.npy"));
    }

    #[test]
    fn block_clips_long_lines() {
        let dir = tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("inst.log"));
        log.block(&["short", &"x".repeat(30)], '*', 20).unwrap();

        let text = read(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "*".repeat(20));
        assert_eq!(lines[1], "* short            *");
        assert_eq!(lines[2], format!("* {} *", "x".repeat(16)));
        assert_eq!(lines[3], "*".repeat(20));
    }

    #[test]
    fn underline_and_tabulated() {
        let dir = tempdir().unwrap();
        let log = SessionLog::new(dir.path().join("inst.log"));
        log.underline("Auxiliary outputs:", '-').unwrap();
        log.tabulated_lines(&["Output 1   1.000 V".to_string()], 4)
            .unwrap();

        let text = read(&log);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Auxiliary outputs:");
        assert_eq!(lines[1], "-".repeat(18));
        assert_eq!(lines[3], "    Output 1   1.000 V");
    }
}
