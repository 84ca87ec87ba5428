//! CLI entry point for lab-scpi
//!
//! Talks to one instrument per invocation:
//! - `idn`, `write`, `query`, `values` for ad-hoc SCPI traffic
//! - `curve` to capture an oscilloscope trace
//! - `lockin-status` to list and journal every SR830 panel
//!
//! # Usage
//!
//! ```bash
//! lab-scpi --resource TCPIP0::10.0.0.5::5025::SOCKET query "FREQ?"
//! lab-scpi --sim write "FREQ 1000"
//! lab-scpi --config config/lab_scpi.toml --json curve --source CH2 --out trace.csv
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lab_scpi::instruments::lockin::Lockin;
use lab_scpi::instruments::oscilloscope::{CurveSetup, Oscilloscope};
use lab_scpi::storage::Array2;
use lab_scpi::{tracing_setup, LabConfig, Logging, Session};
use serde_json::json;
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lab-scpi")]
#[command(about = "Journaled SCPI sessions with lab instruments", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/lab_scpi.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resource address, overriding the configuration
    #[arg(long, global = true)]
    resource: Option<String>,

    /// Use the built-in simulator
    #[arg(long, global = true, conflicts_with = "resource")]
    sim: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the instrument identification
    Idn,

    /// Send a command without reading a reply
    Write {
        /// SCPI command
        command: String,
    },

    /// Send a query and print the reply
    Query {
        /// SCPI query
        command: String,
    },

    /// Send a query and decode the reply as a list of numbers
    Values {
        /// SCPI query
        command: String,

        /// Separator between values
        #[arg(long, default_value_t = ',')]
        separator: char,
    },

    /// Capture an oscilloscope trace
    Curve {
        /// Trace source
        #[arg(long, default_value = "CH1")]
        source: String,

        /// Save `[time, volts]` to this file as well
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List every lock-in panel and write it to the journal
    LockinStatus,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LabConfig::load_from(path)
            .with_context(|| format!("Loading configuration from {}", path.display()))?,
        None => LabConfig::load().context("Loading configuration")?,
    };
    if cli.sim {
        config = config.with_resource("SIM");
    } else if let Some(resource) = &cli.resource {
        config = config.with_resource(resource.clone());
    }
    tracing_setup::init_from_config(&config)?;

    let session = Session::connect(&config)
        .await
        .with_context(|| format!("Opening {}", config.transport.resource))?;
    tracing::info!("Connected to {} ({})", session.name(), session.resource());

    run(cli.command, cli.json, session).await
}

async fn run(command: Commands, as_json: bool, mut session: Session) -> Result<()> {
    match command {
        Commands::Idn => {
            emit(
                as_json,
                json!({ "resource": session.resource(), "idn": session.name() }),
                session.name(),
            );
            session.close().await?;
        }
        Commands::Write { command } => {
            session.write(&command, Logging::Enabled).await?;
            emit(as_json, json!({ "written": command }), "OK");
            session.close().await?;
        }
        Commands::Query { command } => {
            let answer = session.query(&command, Logging::Enabled).await?;
            emit(
                as_json,
                json!({ "query": command, "answer": answer }),
                &answer,
            );
            session.close().await?;
        }
        Commands::Values { command, separator } => {
            let values = session
                .query_ascii_values(&command, separator, Logging::Enabled)
                .await?;
            let text = values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            emit(as_json, json!({ "query": command, "values": values }), text);
            session.close().await?;
        }
        Commands::Curve { source, out } => {
            let mut scope = Oscilloscope::new(session).await?;
            if source != scope.curve_setup().source {
                scope
                    .setup_curve(CurveSetup {
                        source,
                        ..CurveSetup::default()
                    })
                    .await?;
            }
            let waveform = scope.curve(true, Logging::Enabled).await?;
            let saved = match out {
                Some(path) => {
                    let array =
                        Array2::from_rows(vec![waveform.time.clone(), waveform.volts.clone()])?;
                    Some(scope.session_mut().save(&array, path, Logging::Enabled)?)
                }
                None => None,
            };
            let text = match &saved {
                Some(path) => format!("{} points saved to {}", waveform.volts.len(), path.display()),
                None => format!("{} points", waveform.volts.len()),
            };
            emit(
                as_json,
                json!({ "waveform": waveform, "saved": saved }),
                text,
            );
            scope.close().await?;
        }
        Commands::LockinStatus => {
            let lockin = Lockin::new(session);
            let panels = lockin.describe().await?;
            lockin.log_state().await?;
            if as_json {
                let value: serde_json::Map<String, serde_json::Value> = panels
                    .iter()
                    .map(|(title, lines)| (title.trim_end_matches(':').to_string(), json!(lines)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                for (title, lines) in &panels {
                    println!("{}", title);
                    for line in lines {
                        println!("    {}", line);
                    }
                    println!();
                }
            }
            lockin.close().await?;
        }
    }
    Ok(())
}

fn emit(as_json: bool, value: serde_json::Value, text: impl Display) {
    if as_json {
        println!("{}", value);
    } else {
        println!("{}", text);
    }
}
