use std::collections::HashSet;

use anyhow::Context;
use chrono::{Duration, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use classify::{classify_files, has_valid_patches};
use ghapi::{GitHubApi, MergedPr};
use models::{AuthorContribution, CommitInfo, CommitPair, MinerRejectRecord};

use crate::cluster::collect_author_contributions;
use crate::config::MinerConfig;

/// Everything mined from one repository.
#[derive(Debug, Default)]
pub struct MinedRepo {
    pub pairs: Vec<CommitPair>,
    pub contributions: Vec<AuthorContribution>,
    pub rejects: Vec<MinerRejectRecord>,
}

/// Mines commit pairs from merged PRs, then author contributions from the
/// commits PRs did not cover.
pub struct CommitMiner<'a, C: GitHubApi> {
    client: &'a C,
    config: &'a MinerConfig,
}

impl<'a, C: GitHubApi> CommitMiner<'a, C> {
    pub fn new(client: &'a C, config: &'a MinerConfig) -> Self {
        Self { client, config }
    }

    pub fn mine_repo(&self, repo: &str) -> anyhow::Result<MinedRepo> {
        let (owner, name) = repo
            .split_once('/')
            .with_context(|| format!("invalid repo name: {}", repo))?;

        let since = (Utc::now() - Duration::days(self.config.lookback_days))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        info!(repo = %repo, since = %since, "mining repository");

        let mut mined = MinedRepo::default();
        let covered_shas = self.mine_prs(owner, name, &since, &mut mined)?;
        info!(
            repo = %repo,
            pairs = mined.pairs.len(),
            rejects = mined.rejects.len(),
            covered = covered_shas.len(),
            "PR mining done"
        );

        if self.config.enable_cluster_mining {
            self.mine_author_contributions(owner, name, &since, &covered_shas, &mut mined)?;
            info!(
                repo = %repo,
                contributions = mined.contributions.len(),
                "contribution mining done"
            );
        }

        Ok(mined)
    }

    fn list_merged_prs(
        &self,
        owner: &str,
        name: &str,
        since: &str,
    ) -> Result<Vec<MergedPr>, ghapi::ApiError> {
        if self.config.use_graphql {
            match self.client.list_merged_prs_graphql(
                owner,
                name,
                self.config.max_prs_per_repo,
                Some(since),
            ) {
                Ok(prs) => return Ok(prs),
                Err(e) => warn!(error = %e, "GraphQL PR listing failed; falling back to REST"),
            }
        }
        self.client
            .list_merged_prs_rest(owner, name, self.config.max_prs_per_repo, Some(since))
    }

    /// Phase 1: one candidate pair per merged PR. The merge SHA joins the
    /// covered set whether or not the PR is accepted — it represents work
    /// already accounted for.
    fn mine_prs(
        &self,
        owner: &str,
        name: &str,
        since: &str,
        mined: &mut MinedRepo,
    ) -> anyhow::Result<HashSet<String>> {
        let repo = format!("{}/{}", owner, name);
        let mut covered_shas = HashSet::new();

        let prs = self
            .list_merged_prs(owner, name, since)
            .context("failed to list merged PRs")?;
        debug!(count = prs.len(), "fetched merged PRs");

        for pr in prs {
            let source_id = pr.number.to_string();
            let base = pr.base_sha.clone().filter(|sha| !sha.is_empty());
            let merge = pr.merge_sha.clone().filter(|sha| !sha.is_empty());
            if let Some(merge_sha) = &merge {
                covered_shas.insert(merge_sha.clone());
            }

            let (Some(base_sha), Some(merge_sha)) = (base, merge) else {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "pr".to_string(),
                    source_id,
                    reasons: vec!["missing base_sha or merge_sha".to_string()],
                });
                continue;
            };

            let files = match pr.files {
                Some(files) => files,
                None => self
                    .client
                    .get_pr_files(owner, name, pr.number)
                    .with_context(|| format!("failed to fetch files for PR {}", pr.number))?,
            };

            if !has_valid_patches(
                &files,
                self.config.min_code_changes,
                self.config.min_test_changes,
            ) {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "pr".to_string(),
                    source_id,
                    reasons: vec!["insufficient code or test changes".to_string()],
                });
                continue;
            }

            let (code_patches, test_patches, _) = classify_files(&files);

            if code_patches.is_empty() {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "pr".to_string(),
                    source_id,
                    reasons: vec!["no Verilog/SV code changes".to_string()],
                });
                continue;
            }
            if test_patches.is_empty() {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "pr".to_string(),
                    source_id,
                    reasons: vec!["no test file changes".to_string()],
                });
                continue;
            }

            mined.pairs.push(CommitPair {
                repo: repo.clone(),
                base_sha,
                target_sha: merge_sha,
                source_type: "pr".to_string(),
                source_id,
                code_patches,
                test_patches,
                validation_status: "pending".to_string(),
            });
        }

        Ok(covered_shas)
    }

    /// Phase 2: cluster uncovered commits per author and keep the
    /// contributions that clear the change thresholds.
    fn mine_author_contributions(
        &self,
        owner: &str,
        name: &str,
        since: &str,
        covered_shas: &HashSet<String>,
        mined: &mut MinedRepo,
    ) -> anyhow::Result<()> {
        let repo = format!("{}/{}", owner, name);

        let raw_commits = self
            .client
            .list_commits(owner, name, Some(since), self.config.max_commits_per_repo)
            .context("failed to list commits")?;
        debug!(count = raw_commits.len(), "fetched commits");

        let mut commits: Vec<CommitInfo> = Vec::new();
        for item in raw_commits {
            if covered_shas.contains(&item.sha) {
                continue;
            }
            let files = self
                .client
                .get_commit_files(owner, name, &item.sha)
                .with_context(|| format!("failed to fetch files for commit {}", item.sha))?;
            let (code, test, _) = classify_files(&files);
            let mut patches = code;
            patches.extend(test);

            commits.push(CommitInfo {
                sha: item.sha,
                message: item.message,
                author: item.author_name,
                authored_date: item.authored_date,
                parents: item.parents,
                files: patches,
            });
        }

        if commits.is_empty() {
            return Ok(());
        }

        let candidates = collect_author_contributions(
            &repo,
            commits,
            self.config.author_time_window_days,
            self.config.min_commits_per_contribution,
        );
        debug!(count = candidates.len(), "author contribution candidates");

        for contribution in candidates {
            let code_changes: u64 = contribution
                .code_patches
                .iter()
                .map(|p| p.additions + p.deletions)
                .sum();
            let test_changes: u64 = contribution
                .test_patches
                .iter()
                .map(|p| p.additions + p.deletions)
                .sum();
            let source_id = format!("{}:{}", contribution.author, contribution.contribution_id);

            if code_changes < self.config.min_code_changes {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "author".to_string(),
                    source_id,
                    reasons: vec![format!(
                        "insufficient code changes ({} < {})",
                        code_changes, self.config.min_code_changes
                    )],
                });
                continue;
            }
            if test_changes < self.config.min_test_changes {
                mined.rejects.push(MinerRejectRecord {
                    repo: repo.clone(),
                    source_type: "author".to_string(),
                    source_id,
                    reasons: vec![format!(
                        "insufficient test changes ({} < {})",
                        test_changes, self.config.min_test_changes
                    )],
                });
                continue;
            }

            mined.contributions.push(contribution);
        }

        Ok(())
    }
}
