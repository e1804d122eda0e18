//! district-intel - command line front end
//!
//! # Usage
//!
//! ```bash
//! # One orchestrated answer, against Postgres (DATABASE_URL)
//! district-intel ask "Which district has the highest health vulnerability?"
//!
//! # Offline, against a JSON snapshot of the four tables, no LLM
//! district-intel --snapshot districts.json --no-llm scores --district Pune
//!
//! # Interactive chat
//! district-intel chat
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL`: Postgres connection string
//! - `GROQ_API_KEY`: LLM API key (variable name set by `llm.api_key_env`)
//! - `DISTRICT_INTEL_CONFIG`: path to a TOML config file
//! - `P_SCORE_WEIGHT_HVI` / `_ISS` / `_RCS`: P-Score weight overrides
//! - `RUST_LOG`: logging level (default: info)

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use district_intel::config::AppConfig;
use district_intel::data::{DataAccess, PgDataAccess, SnapshotDataAccess};
use district_intel::llm::LlmClients;
use district_intel::{ChatSession, Orchestrator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "district-intel")]
#[command(about = "Cross-sectoral district intelligence: agents, risk scores and alerts")]
#[command(version)]
struct CliArgs {
    /// TOML config file (otherwise $DISTRICT_INTEL_CONFIG, then ./district_intel.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a JSON snapshot of the four tables instead of Postgres
    #[arg(long, global = true, value_name = "JSON")]
    snapshot: Option<PathBuf>,

    /// Disable every LLM call; all steps use their deterministic fallback
    #[arg(long, global = true)]
    no_llm: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Answer one question and print the explainability trace
    Ask {
        query: String,
        /// Target district (skips district detection)
        #[arg(long)]
        district: Option<String>,
        /// Print the full run output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive chat on stdin (`:history`, `:clear`, `:quit`)
    Chat,

    /// Comprehensive P-Score breakdown as JSON
    Scores {
        #[arg(long)]
        district: Option<String>,
    },

    /// Health, infrastructure and resource alerts above a threshold
    Alerts {
        /// Defaults to `alerts.threshold` from config
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// List known districts
    Districts,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut c = AppConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            c.apply_env_overrides();
            c.warn_suspicious();
            c
        }
        None => AppConfig::load(),
    };
    if args.no_llm {
        config.llm.enabled = false;
    }
    config.validate().context("invalid configuration after overrides")?;
    Ok(config)
}

async fn open_data(args: &CliArgs, config: &AppConfig) -> Result<Arc<dyn DataAccess>> {
    let data: Arc<dyn DataAccess> = match &args.snapshot {
        Some(path) => Arc::new(
            SnapshotDataAccess::from_file(path)
                .with_context(|| format!("loading snapshot {}", path.display()))?,
        ),
        None => Arc::new(
            PgDataAccess::connect(&config.database)
                .await
                .context("connecting to Postgres")?,
        ),
    };
    info!(source = data.source_name(), "Data source ready");
    Ok(data)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

async fn run_chat(mut session: ChatSession) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    println!("District Intel chat. Commands: :history, :clear, :quit");

    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":clear" => {
                session.clear();
                println!("History cleared.");
            }
            ":history" => {
                for turn in session.history(None) {
                    println!("[{:?}] {}", turn.role, turn.content);
                }
            }
            query => {
                let reply = session.ask(query, None).await;
                println!("{}\n", reply.response);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    if let Ok(path) = dotenvy::dotenv() {
        info!(path = %path.display(), "Loaded .env");
    }

    let config = load_config(&args)?;
    let data = open_data(&args, &config).await?;
    let llm = LlmClients::from_config(&config.llm);
    let chat_llm = Arc::clone(&llm.chat);
    let orchestrator = Arc::new(Orchestrator::new(Arc::clone(&data), llm, &config));

    match args.command {
        SubCommand::Ask {
            query,
            district,
            json,
        } => {
            let output = orchestrator.run(&query, district.as_deref()).await;
            if json {
                print_json(&output)?;
            } else {
                match (&output.response, &output.error) {
                    (Some(response), _) => println!("{response}"),
                    (None, Some(error)) => println!("Run failed: {error}"),
                    (None, None) => println!("No response generated"),
                }
                println!("\n--- trace ---\n{}", output.trace.render_text());
            }
            if !output.success {
                anyhow::bail!("orchestrator run failed");
            }
        }
        SubCommand::Chat => {
            run_chat(ChatSession::new(orchestrator, chat_llm, config.chat)).await?;
        }
        SubCommand::Scores { district } => {
            let district = match district {
                Some(d) => Some(orchestrator.canonical_district(&d).await),
                None => None,
            };
            let scores = orchestrator.scoring().comprehensive(district.as_deref()).await;
            print_json(&scores)?;
        }
        SubCommand::Alerts { threshold } => {
            let threshold = threshold.unwrap_or(config.alerts.threshold);
            let report = orchestrator.alerts(threshold).await?;
            if report.is_empty() {
                info!(threshold, "No districts above alert threshold");
            }
            print_json(&report)?;
        }
        SubCommand::Districts => {
            for d in data.list_districts().await? {
                println!("{d}");
            }
        }
    }

    Ok(())
}
