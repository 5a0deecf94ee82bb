use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use ghapi::GitHubApi;
use models::{JsonlSink, MinerRejectRecord};

use crate::config::MinerConfig;
use crate::mine::CommitMiner;

const CONTRIBUTIONS_FILENAME: &str = "author_contributions.jsonl";

/// Append-only journal of completed repositories, consulted on restart.
/// A repository name is recorded only after every record derived from it
/// is durably written.
pub struct Journal {
    file: File,
    completed: HashSet<String>,
}

impl Journal {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let completed: HashSet<String> = if path.exists() {
            std::fs::read_to_string(path)?
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect()
        } else {
            HashSet::new()
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file, completed })
    }

    pub fn contains(&self, repo: &str) -> bool {
        self.completed.contains(repo)
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn record(&mut self, repo: &str) -> anyhow::Result<()> {
        writeln!(self.file, "{}", repo)?;
        self.file.flush()?;
        self.completed.insert(repo.to_string());
        Ok(())
    }
}

/// Drive the miner over a `RepoCard` JSONL stream. Output streams open in
/// append mode when a journal shows prior progress; each repository's
/// records are written and flushed before its name reaches the journal,
/// so an interrupted repository is reprocessed from scratch on resume.
pub fn run_miner<C: GitHubApi>(
    client: &C,
    config: &MinerConfig,
    input_path: &Path,
    output_path: &Path,
    rejects_path: &Path,
    contributions_path: Option<&Path>,
    progress_path: Option<&Path>,
) -> anyhow::Result<()> {
    let contributions_path: PathBuf = match contributions_path {
        Some(path) => path.to_path_buf(),
        None => output_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(CONTRIBUTIONS_FILENAME),
    };

    let mut journal = match progress_path {
        Some(path) => Some(Journal::load(path).context("failed to load progress journal")?),
        None => None,
    };
    let resume = journal.as_ref().map(|j| !j.is_empty()).unwrap_or(false);
    if resume {
        info!(
            completed = journal.as_ref().map(|j| j.len()).unwrap_or(0),
            "resuming from journal"
        );
    }

    let mut pairs_sink = JsonlSink::open(output_path, resume)
        .with_context(|| format!("failed to open {}", output_path.display()))?;
    let mut contribs_sink = JsonlSink::open(&contributions_path, resume)
        .with_context(|| format!("failed to open {}", contributions_path.display()))?;
    let mut rejects_sink = JsonlSink::open(rejects_path, resume)
        .with_context(|| format!("failed to open {}", rejects_path.display()))?;

    let input = File::open(input_path)
        .with_context(|| format!("failed to open {}", input_path.display()))?;
    let miner = CommitMiner::new(client, config);

    for line in BufReader::new(input).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => {
                let snippet: String = line.chars().take(50).collect();
                warn!(snippet = %snippet, "skipping invalid JSON input line");
                continue;
            }
        };
        let repo = value
            .get("repo")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        if repo.is_empty() {
            continue;
        }
        if journal.as_ref().is_some_and(|j| j.contains(&repo)) {
            debug!(repo = %repo, "already processed; skipping");
            continue;
        }

        match miner.mine_repo(&repo) {
            Ok(mined) => {
                for pair in &mined.pairs {
                    pairs_sink.write(pair)?;
                }
                for contribution in &mined.contributions {
                    contribs_sink.write(contribution)?;
                }
                for reject in &mined.rejects {
                    rejects_sink.write(reject)?;
                }
                info!(
                    repo = %repo,
                    pairs = mined.pairs.len(),
                    contributions = mined.contributions.len(),
                    rejects = mined.rejects.len(),
                    "processed"
                );
                if let Some(journal) = journal.as_mut() {
                    journal.record(&repo)?;
                }
            }
            Err(e) => {
                error!(repo = %repo, error = format!("{:#}", e), "processing failed");
                rejects_sink.write(&MinerRejectRecord {
                    repo,
                    source_type: "repo".to_string(),
                    source_id: String::new(),
                    reasons: vec![format!("processing error: {:#}", e)],
                })?;
            }
        }
    }

    info!(
        pairs = %output_path.display(),
        contributions = %contributions_path.display(),
        "mining complete"
    );
    Ok(())
}
