use serde::{Deserialize, Serialize};

/// One hit of a vocabulary pattern inside a scanned file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEvidence {
    pub path: String,
    /// 1-based line number of the matching line.
    pub line_number: usize,
    /// The matching line, trimmed.
    pub line: String,
    /// Source pattern that produced the hit.
    pub pattern: String,
}

/// Qualification verdict for one accepted repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoCard {
    /// Canonical `owner/name`.
    pub repo: String,
    pub default_branch: String,
    pub stars: u64,
    pub pushed_at: String,
    /// (Verilog + SystemVerilog bytes) / total bytes.
    pub sv_ratio: f64,
    pub sv_file_count: usize,
    /// Cumulative HDL line count; -1 when the line scan never ran.
    pub sv_line_count: i64,
    pub has_ci: bool,
    pub ci_files: Vec<String>,
    pub commit_count_last_12m: Option<u64>,
    pub commit_count_last_6m: Option<u64>,
    pub pr_total: u64,
    pub issue_total: u64,
    pub has_release_or_tags: bool,
    #[serde(default)]
    pub open_eda_evidence: Vec<MatchEvidence>,
    #[serde(default)]
    pub deny_evidence: Vec<MatchEvidence>,
    #[serde(default)]
    pub candidate_build_cmds: Vec<String>,
    #[serde(default)]
    pub candidate_test_cmds: Vec<String>,
}

/// A rejected repository with its sorted, deduplicated reason tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRecord {
    pub repo: String,
    pub reasons: Vec<String>,
}

/// Classification of one changed file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Code,
    Test,
    Other,
}

/// A raw changed-file record as the remote API reports it. REST payloads
/// name the path `filename`; GraphQL payloads name it `path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(alias = "filename")]
    pub path: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    /// Unified diff text, when the API included it.
    #[serde(default)]
    pub patch: Option<String>,
}

/// One file's delta after classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilePatch {
    pub path: String,
    pub patch_type: PatchKind,
    pub additions: u64,
    pub deletions: u64,
    pub patch: Option<String>,
}

impl FilePatch {
    pub fn from_change(change: &FileChange, patch_type: PatchKind) -> Self {
        Self {
            path: change.path.clone(),
            patch_type,
            additions: change.additions,
            deletions: change.deletions,
            patch: change.patch.clone(),
        }
    }

    /// Fold a later patch for the same path into this one. Additions and
    /// deletions accumulate; the diff text of the most recent contributor
    /// wins.
    pub fn merge(&mut self, later: &FilePatch) {
        self.additions += later.additions;
        self.deletions += later.deletions;
        self.patch = later.patch.clone();
    }
}

/// One commit, with its classified file patches once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    /// Author display name, compared verbatim.
    pub author: String,
    /// Authored timestamp, ISO-8601.
    pub authored_date: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub files: Vec<FilePatch>,
}

/// A PR-sourced training unit: base/target SHAs plus code and test patches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitPair {
    pub repo: String,
    pub base_sha: String,
    pub target_sha: String,
    pub source_type: String,
    /// PR number as a string.
    pub source_id: String,
    pub code_patches: Vec<FilePatch>,
    pub test_patches: Vec<FilePatch>,
    pub validation_status: String,
}

/// A cluster-sourced training unit: one author's feature-window commits
/// with their patches merged per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorContribution {
    pub repo: String,
    pub author: String,
    /// First 12 hex digits of the cluster's SHA-256 identity.
    pub contribution_id: String,
    /// Commit SHAs in chronological order.
    pub commit_shas: Vec<String>,
    pub first_commit_date: String,
    pub last_commit_date: String,
    pub code_patches: Vec<FilePatch>,
    pub test_patches: Vec<FilePatch>,
    /// Per-commit subject lines, truncated to 100 chars.
    pub commit_summaries: Vec<String>,
    pub validation_status: String,
}

/// A rejected mining candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerRejectRecord {
    pub repo: String,
    pub source_type: String,
    pub source_id: String,
    pub reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_accumulates_and_keeps_latest_patch_text() {
        let mut a = FilePatch {
            path: "rtl/core.sv".to_string(),
            patch_type: PatchKind::Code,
            additions: 10,
            deletions: 2,
            patch: Some("first".to_string()),
        };
        let b = FilePatch {
            path: "rtl/core.sv".to_string(),
            patch_type: PatchKind::Code,
            additions: 3,
            deletions: 1,
            patch: Some("second".to_string()),
        };
        a.merge(&b);
        assert_eq!(a.additions, 13);
        assert_eq!(a.deletions, 3);
        assert_eq!(a.patch.as_deref(), Some("second"));
    }

    #[test]
    fn test_merge_is_associative_on_counts() {
        let patch = |adds, dels, text: &str| FilePatch {
            path: "rtl/alu.sv".to_string(),
            patch_type: PatchKind::Code,
            additions: adds,
            deletions: dels,
            patch: Some(text.to_string()),
        };
        let (a, b, c) = (patch(1, 2, "a"), patch(3, 4, "b"), patch(5, 6, "c"));

        let mut left = a.clone();
        left.merge(&b);
        left.merge(&c);

        let mut bc = b.clone();
        bc.merge(&c);
        let mut right = a.clone();
        right.merge(&bc);

        assert_eq!(left.additions, right.additions);
        assert_eq!(left.deletions, right.deletions);
        assert_eq!(left.patch.as_deref(), Some("c"));
    }

    #[test]
    fn test_patch_kind_serializes_lowercase() {
        let fp = FilePatch {
            path: "tb/alu_tb.sv".to_string(),
            patch_type: PatchKind::Test,
            additions: 1,
            deletions: 0,
            patch: None,
        };
        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(json["patch_type"], "test");
    }
}
