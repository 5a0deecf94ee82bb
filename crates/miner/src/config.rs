use std::path::Path;

use serde::{Deserialize, Serialize};

/// Miner configuration. Deserialized from JSON; missing fields keep their
/// compiled defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Lookback horizon for PRs and commits, in days.
    pub lookback_days: i64,

    pub max_prs_per_repo: usize,
    pub max_commits_per_repo: usize,

    pub enable_cluster_mining: bool,
    /// Max days between commits that still extend the same feature.
    pub author_time_window_days: i64,
    /// Minimum commits for a cluster to become a contribution.
    pub min_commits_per_contribution: usize,

    /// Legacy knob from the retired clustering scheme; parsed for
    /// compatibility with older config files, never read.
    pub cluster_time_window_hours: i64,

    /// Minimum additions+deletions on the code side.
    pub min_code_changes: u64,
    /// Minimum additions+deletions on the test side.
    pub min_test_changes: u64,

    pub use_graphql: bool,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            lookback_days: 1825,
            max_prs_per_repo: 500,
            max_commits_per_repo: 1000,
            enable_cluster_mining: true,
            author_time_window_days: 60,
            min_commits_per_contribution: 1,
            cluster_time_window_hours: 24,
            min_code_changes: 5,
            min_test_changes: 5,
            use_graphql: true,
        }
    }
}

/// Load miner configuration, returning defaults when no path is given.
pub fn load_miner_config(path: Option<&Path>) -> anyhow::Result<MinerConfig> {
    match path {
        None => Ok(MinerConfig::default()),
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let config = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("config parse error in {}: {}", path.display(), e))?;
            Ok(config)
        }
    }
}
