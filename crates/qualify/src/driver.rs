use std::path::Path;

use anyhow::Context;
use tracing::{debug, info};

use ghapi::GitHubApi;
use models::JsonlSink;
use scanner::ScanPatterns;

use crate::config::PipelineConfig;
use crate::discover::discover_candidates;
use crate::engine::{evaluate_repo, Verdict};

/// Drive discovery and qualification over the candidate universe, writing
/// accepted cards and rejects to their JSONL streams with a flush after
/// every record.
pub fn run_pipeline<C: GitHubApi>(
    client: &C,
    config: &PipelineConfig,
    output_path: &Path,
    reject_path: &Path,
) -> anyhow::Result<()> {
    let patterns = ScanPatterns::new(&config.allowlist_terms, &config.denylist_terms)
        .context("failed to compile vocabulary patterns")?;

    let mut cards = JsonlSink::create(output_path)
        .with_context(|| format!("failed to open {}", output_path.display()))?;
    let mut rejects = JsonlSink::create(reject_path)
        .with_context(|| format!("failed to open {}", reject_path.display()))?;

    let candidates = discover_candidates(client, config).context("repository discovery failed")?;
    info!(count = candidates.len(), "evaluating candidates");

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for item in &candidates {
        match evaluate_repo(client, item, config, &patterns) {
            Verdict::Accepted(card) => {
                info!(repo = %card.repo, stars = card.stars, "accepted");
                cards.write(card.as_ref())?;
                accepted += 1;
            }
            Verdict::Rejected(reject) => {
                debug!(repo = %reject.repo, reasons = ?reject.reasons, "rejected");
                rejects.write(&reject)?;
                rejected += 1;
            }
        }
    }

    info!(accepted, rejected, "qualification complete");
    Ok(())
}
