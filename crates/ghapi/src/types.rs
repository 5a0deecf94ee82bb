use serde::{Deserialize, Serialize};

use models::FileChange;

/// Repository descriptor as returned by the search endpoint. Only the
/// fields the qualification engine consumes are kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub full_name: String,
    pub name: String,
    pub owner: RepoOwner,
    #[serde(default)]
    pub default_branch: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub pushed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// One entry of a recursive git tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    #[serde(default)]
    pub path: String,
    /// "blob" or "tree".
    #[serde(rename = "type", default)]
    pub entry_type: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

/// One entry of a contents-endpoint directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type", default)]
    pub entry_type: String,
}

impl ContentsEntry {
    pub fn is_file(&self) -> bool {
        self.entry_type == "file"
    }
}

/// A merged pull request, normalised across the GraphQL and REST shapes.
#[derive(Debug, Clone)]
pub struct MergedPr {
    pub number: u64,
    pub merged_at: Option<String>,
    pub base_sha: Option<String>,
    pub merge_sha: Option<String>,
    /// Inline file list when listed via GraphQL; REST callers fetch files
    /// with a separate per-PR request.
    pub files: Option<Vec<FileChange>>,
}

/// One commit from the commit-list endpoint, before its files are fetched.
#[derive(Debug, Clone)]
pub struct CommitListItem {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub authored_date: String,
    pub parents: Vec<String>,
}

/// A single-page probe: how many items the page held and the raw `Link`
/// response header, for rel="last" count estimation.
#[derive(Debug, Clone)]
pub struct PageProbe {
    pub page_len: usize,
    pub link: Option<String>,
}
