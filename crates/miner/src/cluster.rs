use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use models::hash::contribution_id;
use models::{AuthorContribution, CommitInfo, FilePatch, PatchKind};

/// Same-feature test: within the window with modest overlap, or strong
/// overlap regardless of the gap (lets very-same-file churn cross
/// arbitrary time gaps).
const PRIMARY_OVERLAP: f64 = 0.2;
const ABSOLUTE_OVERLAP: f64 = 0.5;

const SUMMARY_MAX_CHARS: usize = 100;

/// Parse an ISO-8601 authored timestamp, tolerating a truncated form
/// without an offset.
pub fn parse_commit_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let head = value.get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Jaccard overlap of two path sets; 0 when either side is empty.
pub fn file_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

struct DatedCommit {
    date: DateTime<Utc>,
    commit: CommitInfo,
}

fn commit_paths(commit: &CommitInfo) -> BTreeSet<String> {
    commit.files.iter().map(|f| f.path.clone()).collect()
}

/// Partition one author's chronologically sorted commits into feature
/// clusters by time proximity and file overlap.
fn split_into_features(commits: Vec<DatedCommit>, window_days: i64) -> Vec<Vec<DatedCommit>> {
    let mut clusters: Vec<Vec<DatedCommit>> = Vec::new();
    let mut current: Vec<DatedCommit> = Vec::new();
    let mut current_paths: BTreeSet<String> = BTreeSet::new();
    let mut last_time: Option<DateTime<Utc>> = None;

    for dated in commits {
        let paths = commit_paths(&dated.commit);

        let same_feature = match last_time {
            None => true,
            Some(last) => {
                let gap_days = (dated.date - last).num_days();
                let overlap = file_overlap(&current_paths, &paths);
                (gap_days <= window_days && overlap >= PRIMARY_OVERLAP)
                    || overlap >= ABSOLUTE_OVERLAP
            }
        };

        if !same_feature {
            clusters.push(std::mem::take(&mut current));
            current_paths.clear();
        }

        current_paths.extend(paths);
        last_time = Some(dated.date);
        current.push(dated);
    }

    if !current.is_empty() {
        clusters.push(current);
    }

    clusters
}

fn first_line_summary(message: &str) -> String {
    message
        .lines()
        .next()
        .unwrap_or("")
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect()
}

/// Merge a cluster's patches per file path, split by classification.
/// Returns (code, test) patch lists ordered by path.
fn merge_cluster_patches(commits: &[DatedCommit]) -> (Vec<FilePatch>, Vec<FilePatch>) {
    let mut code: BTreeMap<String, FilePatch> = BTreeMap::new();
    let mut test: BTreeMap<String, FilePatch> = BTreeMap::new();

    for dated in commits {
        for patch in &dated.commit.files {
            let target = match patch.patch_type {
                PatchKind::Code => &mut code,
                PatchKind::Test => &mut test,
                PatchKind::Other => continue,
            };
            match target.entry(patch.path.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().merge(patch),
                Entry::Vacant(entry) => {
                    entry.insert(patch.clone());
                }
            }
        }
    }

    (
        code.into_values().collect(),
        test.into_values().collect(),
    )
}

fn build_contribution(repo: &str, author: &str, commits: &[DatedCommit]) -> Option<AuthorContribution> {
    let (code_patches, test_patches) = merge_cluster_patches(commits);
    if code_patches.is_empty() || test_patches.is_empty() {
        return None;
    }

    let commit_shas: Vec<String> = commits.iter().map(|d| d.commit.sha.clone()).collect();
    let commit_summaries = commits
        .iter()
        .map(|d| first_line_summary(&d.commit.message))
        .collect();

    Some(AuthorContribution {
        repo: repo.to_string(),
        author: author.to_string(),
        contribution_id: contribution_id(repo, author, &commit_shas),
        first_commit_date: commits[0].commit.authored_date.clone(),
        last_commit_date: commits[commits.len() - 1].commit.authored_date.clone(),
        commit_shas,
        code_patches,
        test_patches,
        commit_summaries,
        validation_status: "pending".to_string(),
    })
}

/// Group commits by author display name (verbatim comparison), cluster
/// each author's stream into features, and emit one contribution per
/// cluster that has both code and test patches and enough commits.
pub fn collect_author_contributions(
    repo: &str,
    commits: Vec<CommitInfo>,
    time_window_days: i64,
    min_commits: usize,
) -> Vec<AuthorContribution> {
    let mut by_author: BTreeMap<String, Vec<DatedCommit>> = BTreeMap::new();
    for commit in commits {
        let Some(date) = parse_commit_date(&commit.authored_date) else {
            debug!(sha = %commit.sha, date = %commit.authored_date, "dropping commit with unparseable date");
            continue;
        };
        by_author
            .entry(commit.author.clone())
            .or_default()
            .push(DatedCommit { date, commit });
    }

    let mut contributions = Vec::new();
    for (author, mut dated) in by_author {
        // Chronological order; SHA breaks ties for determinism.
        dated.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.commit.sha.cmp(&b.commit.sha)));

        for cluster in split_into_features(dated, time_window_days) {
            if cluster.len() < min_commits {
                continue;
            }
            if let Some(contribution) = build_contribution(repo, &author, &cluster) {
                contributions.push(contribution);
            }
        }
    }

    contributions
}
