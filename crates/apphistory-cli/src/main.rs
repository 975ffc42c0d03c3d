//! App History CLI - Replays navigation scripts against an in-memory history
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   { "op": "push", "path": "/inbox" },
//!   { "op": "push", "path": "/inbox/42", "state": { "scroll": 10 } },
//!   { "op": "find_last", "href": "/inbox" },
//!   { "op": "back_to", "pattern": "^/inbox$" },
//!   { "op": "cut" }
//! ]
//! ```

use anyhow::{bail, Context};
use apphistory_core::{AppHistory, AppHistoryConfig, LocationDescriptor, Matcher};
use clap::Parser;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apphistory")]
#[command(about = "App History - depth tracking and cutting over a linear history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Replay a navigation script
    Replay {
        /// Script file path
        script: PathBuf,
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override the configured cache limit
        #[arg(long)]
        cache_limit: Option<usize>,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path
        config: PathBuf,
    },
}

/// One scripted operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Push {
        path: String,
        #[serde(default)]
        state: Value,
    },
    Replace {
        path: String,
        #[serde(default)]
        state: Value,
    },
    Go {
        delta: isize,
    },
    Back,
    BackTo {
        #[serde(default)]
        href: Option<String>,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        state: Option<Value>,
    },
    Forward,
    Home {
        #[serde(default)]
        path: Option<String>,
    },
    Cut,
    FindLast {
        #[serde(default)]
        href: Option<String>,
        #[serde(default)]
        pattern: Option<String>,
    },
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Replace { .. } => "replace",
            Self::Go { .. } => "go",
            Self::Back => "back",
            Self::BackTo { .. } => "back_to",
            Self::Forward => "forward",
            Self::Home { .. } => "home",
            Self::Cut => "cut",
            Self::FindLast { .. } => "find_last",
        }
    }
}

fn matcher(href: Option<&str>, pattern: Option<&str>) -> anyhow::Result<Option<Matcher>> {
    match (href, pattern) {
        (Some(_), Some(_)) => bail!("give either href or pattern, not both"),
        (Some(href), None) => Ok(Some(Matcher::from(href))),
        (None, Some(pattern)) => {
            let pattern = Regex::new(pattern).with_context(|| format!("invalid pattern {pattern:?}"))?;
            Ok(Some(Matcher::from(pattern)))
        }
        (None, None) => Ok(None),
    }
}

fn descriptor(path: &str, state: &Value) -> LocationDescriptor {
    LocationDescriptor::path(path).with_state(state.clone())
}

/// Runs one step and renders its return value.
async fn apply(history: &AppHistory, step: &Step) -> anyhow::Result<String> {
    let outcome = match step {
        Step::Push { path, state } => {
            history.push(descriptor(path, state)).await?;
            "ok".to_string()
        }
        Step::Replace { path, state } => {
            history.replace(descriptor(path, state)).await?;
            "ok".to_string()
        }
        Step::Go { delta } => {
            history.go(*delta).await?;
            "ok".to_string()
        }
        Step::Back => {
            history.go_back().await?;
            "ok".to_string()
        }
        Step::BackTo {
            href,
            pattern,
            state,
        } => {
            let matcher = matcher(href.as_deref(), pattern.as_deref())?;
            history.go_back_to(matcher, state.clone()).await?.to_string()
        }
        Step::Forward => {
            history.go_forward().await?;
            "ok".to_string()
        }
        Step::Home { path } => {
            let target = path.as_deref().map(LocationDescriptor::path);
            history.go_home(target).await?;
            "ok".to_string()
        }
        Step::Cut => {
            history.cut().await?;
            "ok".to_string()
        }
        Step::FindLast { href, pattern } => {
            let Some(matcher) = matcher(href.as_deref(), pattern.as_deref())? else {
                bail!("find_last needs an href or a pattern");
            };
            match history.find_last(matcher).await? {
                Some(delta) => delta.to_string(),
                None => "not found".to_string(),
            }
        }
    };

    Ok(outcome)
}

fn render_state(history: &AppHistory) -> String {
    format!(
        "depth={} length={} action={} href={}",
        history.depth(),
        history.len(),
        history.action(),
        history.location().href()
    )
}

/// Replays `steps` and returns one report line per step, preceded by the
/// initial state.
async fn replay(history: &AppHistory, steps: &[Step]) -> anyhow::Result<Vec<String>> {
    history.init().await.context("failed to initialize app history")?;

    let mut lines = vec![format!("{:>3} {:<10} {}", 0, "init", render_state(history))];

    for (index, step) in steps.iter().enumerate() {
        debug!("step {}: {:?}", index + 1, step);
        let outcome = match apply(history, step).await {
            Ok(outcome) => outcome,
            Err(error) => format!("error: {error:#}"),
        };
        lines.push(format!(
            "{:>3} {:<10} {} -> {}",
            index + 1,
            step.name(),
            render_state(history),
            outcome
        ));
    }

    Ok(lines)
}

fn load_config(path: &Path) -> anyhow::Result<AppHistoryConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AppHistoryConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppHistoryConfig) -> anyhow::Result<()> {
    let entries = config.memory.initial_entries.len();
    if let Some(index) = config.memory.initial_index {
        if entries == 0 || index >= entries {
            bail!("initial_index {} is out of range for {} initial entries", index, entries);
        }
    }
    Ok(())
}

fn load_script(path: &Path) -> anyhow::Result<Vec<Step>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse script {}", path.display()))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Replay {
            script,
            config,
            cache_limit,
        }) => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => AppHistoryConfig::default(),
            };
            if let Some(limit) = cache_limit {
                config = config.with_cache_limit(limit);
            }

            let steps = load_script(&script)?;
            info!("replaying {} steps from {}", steps.len(), script.display());

            let history = AppHistory::new(config);
            for line in replay(&history, &steps).await? {
                println!("{}", line);
            }
        }
        Some(Commands::Check { config }) => {
            let parsed = load_config(&config)?;
            println!("Config OK: {}", config.display());
            match parsed.cache_limit {
                Some(limit) => println!("  cache limit: {}", limit),
                None => println!("  cache limit: unbounded"),
            }
            println!("  initial entries: {:?}", parsed.memory.initial_entries);
        }
        None => {
            println!("App History v0.1.0 - Use --help for commands");
        }
    }

    Ok(())
}
