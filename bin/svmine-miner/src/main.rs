use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, warn};

use ghapi::GitHubClient;
use miner::{load_miner_config, run_miner, MinerConfig};

/// svmine-miner — mine commit pairs and author contributions from
/// qualified repositories.
///
/// Consumes a RepoCard JSONL stream and writes CommitPairs, one
/// AuthorContribution stream, and MinerRejectRecords. With --progress the
/// run is resumable: completed repositories are journaled and skipped on
/// restart.
///
/// Exit codes:
///   0  Success
///   1  Unhandled error
///   2  --token conflicts with GITHUB_TOKEN
#[derive(Parser)]
#[command(name = "svmine-miner", version, about)]
struct Cli {
    /// Input JSONL path with repo cards
    #[arg(long, default_value = "output/repo_cards.jsonl")]
    input: PathBuf,

    /// Output JSONL path for commit pairs
    #[arg(long, default_value = "output/commit_pairs.jsonl")]
    output: PathBuf,

    /// Output JSONL path for rejected candidates
    #[arg(long, default_value = "output/miner_rejects.jsonl")]
    rejects: PathBuf,

    /// Progress file for resumption (optional)
    #[arg(long)]
    progress: Option<PathBuf>,

    /// Path to miner config JSON (optional)
    #[arg(long)]
    config: Option<PathBuf>,

    /// GitHub token (defaults to GITHUB_TOKEN env)
    #[arg(long)]
    token: Option<String>,

    /// Number of days to look back (overrides config)
    #[arg(long)]
    lookback_days: Option<i64>,

    /// Max PRs per repo (overrides config)
    #[arg(long)]
    max_prs: Option<usize>,

    /// Max commits per repo (overrides config)
    #[arg(long)]
    max_commits: Option<usize>,

    /// Disable author contribution mining (PR only)
    #[arg(long)]
    no_clusters: bool,

    /// Use REST API instead of GraphQL
    #[arg(long)]
    no_graphql: bool,

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
        eprintln!("[svmine-miner] ERROR: {:?}", e);
        std::process::exit(1);
    }
}

fn apply_overrides(mut config: MinerConfig, cli: &Cli) -> MinerConfig {
    if let Some(lookback_days) = cli.lookback_days {
        config.lookback_days = lookback_days;
    }
    if let Some(max_prs) = cli.max_prs {
        config.max_prs_per_repo = max_prs;
    }
    if let Some(max_commits) = cli.max_commits {
        config.max_commits_per_repo = max_commits;
    }
    if cli.no_clusters {
        config.enable_cluster_mining = false;
    }
    if cli.no_graphql {
        config.use_graphql = false;
    }
    config
}

fn run(cli: &Cli, token: Option<String>) -> anyhow::Result<()> {
    let config = load_miner_config(cli.config.as_deref()).context("failed to load config")?;
    let config = apply_overrides(config, cli);
    let client = GitHubClient::new(token);
    run_miner(
        &client,
        &config,
        &cli.input,
        &cli.output,
        &cli.rejects,
        None,
        cli.progress.as_deref(),
    )
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
