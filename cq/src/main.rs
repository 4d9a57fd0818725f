//! cq - catalog queue CLI
//!
//! CLI entry point for fetching catalog data through the request scheduler.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use catalogqueue::api::endpoints::{self, RECOMMENDED_IDS};
use catalogqueue::cli::{Cli, Command};
use catalogqueue::config::Config;
use catalogqueue::fetch::{self, RetryPolicy, submit_with};
use catalogqueue::{FetchError, HttpTransport, Scheduler};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("catalogqueue")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("catalogqueue.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        debug!(%base_url, "main: overriding base URL");
        config.api.base_url = base_url.clone();
    }
    config.validate()?;

    info!("cq loaded config: base-url={}", config.api.base_url);

    if let Command::ShowConfig = cli.command {
        print!("{}", serde_yaml::to_string(&config).context("Failed to serialize config")?);
        return Ok(());
    }

    let transport = HttpTransport::from_config(&config.api).context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(config.scheduler.clone(), Arc::new(transport));
    let app = App {
        scheduler,
        config,
        json: cli.json,
        retry: cli.retry,
    };

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Get { endpoint } => app.show(&endpoint).await,
        Command::Top => app.show(&endpoints::top_anime()).await,
        Command::Season { which } => app.show(&endpoints::season(which.into())).await,
        Command::Search { query, limit } => app.search(&query, limit).await,
        Command::Anime { id, section } => {
            let endpoint = match section {
                Some(section) => endpoints::anime_section(id, section),
                None => endpoints::anime(id),
            };
            app.show(&endpoint).await
        }
        Command::Recommended => app.recommended().await,
        Command::ShowConfig => Ok(()),
    }
}

struct App {
    scheduler: Scheduler,
    config: Config,
    json: bool,
    retry: bool,
}

impl App {
    /// Retry policy when --retry was given
    fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.then_some(&self.config.retry)
    }

    async fn show(&self, endpoint: &str) -> Result<()> {
        debug!(%endpoint, retry = self.retry, "App::show: called");
        let data = submit_with(&self.scheduler, endpoint, self.retry_policy())
            .await
            .map_err(|e| report(endpoint, e))?;
        self.render(&data)
    }

    async fn search(&self, query: &str, limit: u32) -> Result<()> {
        let results = fetch::search_with(&self.scheduler, query, limit, self.retry_policy())
            .await
            .map_err(|e| report(query, e))?;
        if results.is_empty() && !self.json {
            println!("No results for '{}'", query);
            return Ok(());
        }
        self.render(&Value::Array(results))
    }

    async fn recommended(&self) -> Result<()> {
        let endpoints = RECOMMENDED_IDS.iter().map(|id| endpoints::anime(*id));
        let found = fetch::fetch_all_with(&self.scheduler, endpoints, self.retry_policy(), "recommended anime")
            .await
            .map_err(|e| report("recommended", e))?;
        self.render(&Value::Array(found))
    }

    fn render(&self, data: &Value) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(data)?);
            return Ok(());
        }

        match data {
            Value::Array(items) => {
                for item in items {
                    println!("{}", summary_line(item));
                }
            }
            Value::Object(_) if title_of(data).is_some() => print_title(data),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
        Ok(())
    }
}

fn report(what: &str, e: FetchError) -> eyre::Report {
    eprintln!("{} {}", "error:".red().bold(), e);
    eyre::eyre!("{} failed: {} ({})", what, e, e.kind())
}

fn title_of(item: &Value) -> Option<&str> {
    item.get("title")
        .or_else(|| item.get("name"))
        .or_else(|| item.pointer("/entry/title"))
        .or_else(|| item.pointer("/entry/name"))
        .or_else(|| item.pointer("/character/name"))
        .or_else(|| item.pointer("/person/name"))
        .and_then(Value::as_str)
}

fn summary_line(item: &Value) -> String {
    let id = item
        .get("mal_id")
        .or_else(|| item.pointer("/entry/mal_id"))
        .or_else(|| item.pointer("/character/mal_id"))
        .and_then(Value::as_u64)
        .map(|id| id.to_string())
        .unwrap_or_default();
    match title_of(item) {
        Some(title) => format!("{:>7}  {}", id.dimmed(), title),
        None => item.to_string(),
    }
}

fn print_title(item: &Value) {
    if let Some(title) = title_of(item) {
        println!("{}", title.bold());
    }
    for field in ["mal_id", "type", "episodes", "status", "score", "year", "rating"] {
        if let Some(value) = item.get(field).filter(|v| !v.is_null()) {
            let shown = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
            println!("  {:<9} {}", field.cyan(), shown);
        }
    }
    if let Some(synopsis) = item.get("synopsis").and_then(Value::as_str) {
        println!();
        println!("{}", synopsis);
    }
}
