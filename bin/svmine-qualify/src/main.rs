use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, warn};

use ghapi::GitHubClient;
use qualify::{load_config, run_pipeline};

/// svmine-qualify — HDL repository qualification pipeline.
///
/// Searches the configured language universe, evaluates every candidate
/// against the qualification checks, and writes accepted RepoCards and
/// RejectRecords as JSONL.
///
/// Exit codes:
///   0  Success
///   1  Unhandled error
///   2  --token conflicts with GITHUB_TOKEN
#[derive(Parser)]
#[command(name = "svmine-qualify", version, about)]
struct Cli {
    /// Path to JSON config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output JSONL path for accepted repos
    #[arg(long, default_value = "output/repo_cards.jsonl")]
    output: PathBuf,

    /// Output JSONL path for rejected repos
    #[arg(long, default_value = "output/rejects.jsonl")]
    rejects: PathBuf,

    /// GitHub token (defaults to GITHUB_TOKEN env)
    #[arg(long)]
    token: Option<String>,

    /// Logging level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let token = match resolve_token(cli.token.as_deref()) {
        Ok(token) => token,
        Err(message) => {
            error!("{}", message);
            std::process::exit(2);
        }
    };
    if token.is_none() {
        warn!("GITHUB_TOKEN not set; rate limits will be low");
    }

    if let Err(e) = run(&cli, token) {
        eprintln!("[svmine-qualify] ERROR: {:?}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, token: Option<String>) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("failed to load config")?;
    let client = GitHubClient::new(token);
    run_pipeline(&client, &config, &cli.output, &cli.rejects)
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn resolve_token(flag: Option<&str>) -> Result<Option<String>, String> {
    let env_token = std::env::var("GITHUB_TOKEN").ok();
    match (flag, env_token) {
        (Some(flag), Some(env)) if flag != env => {
            Err("token mismatch: --token differs from GITHUB_TOKEN".to_string())
        }
        (Some(flag), _) => Ok(Some(flag.to_string())),
        (None, env) => Ok(env),
    }
}
