use clap::{Parser, Subcommand};
use drover_agent::SimulatedInvoker;
use drover_bridge::{ConfigResponse, DesktopBridge, EventEmitter, StatsSource};
use drover_core::{DroverConfig, LogStyle};
use drover_models::{FileModelPerformanceStore, ModelPerformanceStore};
use drover_orchestrator::{Backlog, InMemoryBacklog, Orchestrator, RunMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drover", about = "Drover - autonomous backlog orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "drover.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drain the backlog through the agent pipeline
    Run {
        /// Skip the confirmation prompt and start immediately
        #[arg(long)]
        autonomous: bool,
        /// Keep polling the backlog after it drains
        #[arg(long, conflicts_with = "once")]
        continuous: bool,
        /// Process at most one item, then exit
        #[arg(long)]
        once: bool,
        /// File with one work item title per line
        #[arg(long)]
        backlog: Option<PathBuf>,
        /// Ad-hoc work item title (repeatable)
        #[arg(long = "item", value_name = "TITLE")]
        items: Vec<String>,
    },
    /// Show recorded per-model performance
    Stats,
    /// Print the effective configuration
    Config,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Attempted")]
    attempted: u64,
    #[tabled(rename = "Succeeded")]
    succeeded: u64,
    #[tabled(rename = "Failed")]
    failed: u64,
    #[tabled(rename = "Success")]
    success_rate: String,
    #[tabled(rename = "Avg time")]
    avg_duration: String,
    #[tabled(rename = "Retries")]
    retries: u64,
    #[tabled(rename = "Last used")]
    last_used: String,
}

/// Loads the config file, falling back to built-in defaults when it does not
/// exist. A file that exists but fails to parse is fatal.
async fn load_config(path: &Path) -> anyhow::Result<(DroverConfig, bool)> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => {
            let config: DroverConfig = toml::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("Config file '{}' is not valid TOML: {}", path.display(), e)
            })?;
            Ok((config, true))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok((DroverConfig::default(), false))
        }
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        )),
    }
}

fn style_mark(style: LogStyle) -> &'static str {
    match style {
        LogStyle::Success => "+",
        LogStyle::Warning => "!",
        LogStyle::Error => "x",
        LogStyle::Info | LogStyle::Muted => " ",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let (config, exists) = load_config(&cli.config).await?;

    match cli.command {
        Commands::Run {
            autonomous,
            continuous,
            once,
            backlog,
            items,
        } => {
            let mut titles: Vec<String> = Vec::new();
            if let Some(path) = backlog {
                let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    anyhow::anyhow!("Failed to read backlog file '{}': {}", path.display(), e)
                })?;
                titles.extend(
                    raw.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(str::to_string),
                );
            }
            titles.extend(items);

            if titles.is_empty() && !continuous {
                println!("Backlog is empty; nothing to do.");
                println!("Seed it with --backlog <FILE> or --item <TITLE>.");
                return Ok(());
            }

            let backlog = Arc::new(InMemoryBacklog::from_titles(titles));

            if !autonomous {
                let count = backlog.len().await;
                println!(
                    "Project '{}': about to process {} item(s) under model '{}'.",
                    config.project_name, count, config.models.default
                );
                print!("Continue? [y/N] ");
                use std::io::Write as _;
                std::io::stdout().flush()?;
                let mut answer = String::new();
                std::io::stdin().read_line(&mut answer)?;
                if !matches!(answer.trim(), "y" | "Y" | "yes") {
                    println!("Aborted.");
                    return Ok(());
                }
            }

            let cancel = CancellationToken::new();
            {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Ctrl-C received, stopping after the current stage");
                        cancel.cancel();
                    }
                });
            }

            let emitter = EventEmitter::default();
            let store = Arc::new(
                FileModelPerformanceStore::open(config.data_dir.join("model_performance"))
                    .await?,
            );
            let invoker = Arc::new(SimulatedInvoker::new());
            let orchestrator = Orchestrator::new(
                &config,
                backlog,
                invoker,
                store.clone(),
                emitter.clone(),
                cancel,
            );

            let stats: Arc<dyn StatsSource> = orchestrator.stats().clone();
            let bridge = DesktopBridge::new(
                emitter,
                stats,
                store,
                ConfigResponse {
                    path: cli.config.clone(),
                    config: config.clone(),
                    exists,
                },
            );

            // Mirror the UI activity feed onto stdout.
            let mut log_stream = bridge.subscribe_logs();
            let drain = tokio::spawn(async move {
                while let Some(event) = log_stream.next().await {
                    match event {
                        Ok(entry) => println!(
                            "{} {} [{}] {}",
                            entry.timestamp.format("%H:%M:%S"),
                            style_mark(entry.style),
                            entry.target,
                            entry.message
                        ),
                        Err(e) => warn!(error = %e, "Log stream lagging"),
                    }
                }
            });

            let mode = if once {
                RunMode::SingleShot
            } else if continuous {
                RunMode::Continuous
            } else {
                RunMode::Drain
            };
            let result = orchestrator.run(mode).await;

            // Dropping every emitter handle ends the stream so the drain task
            // can flush its tail and exit.
            drop(orchestrator);
            drop(bridge);
            let _ = drain.await;
            let report = result?;

            println!();
            println!(
                "Run {}: {} processed, {} done, {} failed in {:.1}s",
                report.run_id,
                report.items_processed,
                report.items_done,
                report.items_failed,
                report.elapsed_seconds
            );
        }
        Commands::Stats => {
            let store =
                FileModelPerformanceStore::open(config.data_dir.join("model_performance"))
                    .await?;
            let mut summaries: Vec<_> = store.load_all().await.into_values().collect();
            if summaries.is_empty() {
                println!("No model performance recorded yet.");
                println!("Run `drover run` to start collecting.");
                return Ok(());
            }

            summaries.sort_by(|a, b| b.total_items_attempted.cmp(&a.total_items_attempted));
            let rows: Vec<ModelRow> = summaries
                .iter()
                .map(|s| ModelRow {
                    model: s.model.clone(),
                    attempted: s.total_items_attempted,
                    succeeded: s.total_items_succeeded,
                    failed: s.total_items_failed,
                    success_rate: format!("{:.0}%", s.success_rate * 100.0),
                    avg_duration: format!("{:.1}s", s.average_duration_seconds),
                    retries: s.total_retries,
                    last_used: s
                        .last_used
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "never".to_string()),
                })
                .collect();

            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        Commands::Config => {
            if exists {
                println!("# {}", cli.config.display());
            } else {
                println!("# {} (not found, using built-in defaults)", cli.config.display());
            }
            let rendered = toml::to_string_pretty(&config)?;
            print!("{rendered}");
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, exists) = load_config(&dir.path().join("absent.toml")).await.unwrap();
        assert!(!exists);
        assert_eq!(config.project_name, "drover");
    }

    #[tokio::test]
    async fn corrupt_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        tokio::fs::write(&path, "models = \"not a table\"")
            .await
            .unwrap();
        assert!(load_config(&path).await.is_err());
    }

    #[tokio::test]
    async fn valid_config_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drover.toml");
        tokio::fs::write(
            &path,
            r#"
project_name = "demo"

[models]
default = "m-main"
fallback = "m-backup"
candidate_models = ["m-a", "m-b"]
"#,
        )
        .await
        .unwrap();

        let (config, exists) = load_config(&path).await.unwrap();
        assert!(exists);
        assert_eq!(config.project_name, "demo");
        assert_eq!(config.models.default, "m-main");
        assert_eq!(config.models.candidate_models.len(), 2);
    }
}
