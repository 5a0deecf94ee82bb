use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::ApiError;
use crate::types::{CommitListItem, ContentsEntry, MergedPr, PageProbe, RepoDescriptor, TreeEntry};
use models::FileChange;

/// The remote API capability contract — the only abstraction the pipeline
/// uses. Every operation may fail; callers turn unexpected failures into
/// reason tags. 404 surfaces as `Ok(None)`, never as an error.
pub trait GitHubApi {
    /// Paged repository search; at most `max_results` descriptors.
    fn search_repositories(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        max_results: usize,
    ) -> Result<Vec<RepoDescriptor>, ApiError>;

    /// Language → byte count for one repository.
    fn get_languages(&self, owner: &str, repo: &str) -> Result<BTreeMap<String, u64>, ApiError>;

    /// Recursive tree listing at `reference`; `None` when absent.
    fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Option<Vec<TreeEntry>>, ApiError>;

    /// Text body of one file, following base64 inline content or the
    /// download redirect; `None` when absent or not a file.
    fn get_file_text(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, ApiError>;

    /// Directory listing under `path`; `None` when absent or not a
    /// directory.
    fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<Vec<ContentsEntry>>, ApiError>;

    /// `total_count` of an issue/PR search.
    fn search_issues_total(&self, query: &str) -> Result<u64, ApiError>;

    /// One release-list page plus its Link header.
    fn get_releases(&self, owner: &str, repo: &str, per_page: usize)
        -> Result<PageProbe, ApiError>;

    /// One tag-list page plus its Link header.
    fn get_tags(&self, owner: &str, repo: &str, per_page: usize) -> Result<PageProbe, ApiError>;

    /// One commit-list page (`per_page=1`, filtered by `since`) plus its
    /// Link header, for the page-count estimation trick.
    fn probe_commits(&self, owner: &str, repo: &str, since: &str) -> Result<PageProbe, ApiError>;

    /// Raw GraphQL call; an `errors` field in the payload is an error.
    fn post_graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError>;

    /// Merged PRs via GraphQL, newest-updated first, file lists inline,
    /// stopping early once `mergedAt` falls before `since`.
    fn list_merged_prs_graphql(
        &self,
        owner: &str,
        repo: &str,
        max_prs: usize,
        since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError>;

    /// Merged PRs via REST (fallback path); files are not inlined.
    fn list_merged_prs_rest(
        &self,
        owner: &str,
        repo: &str,
        max_prs: usize,
        since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError>;

    /// Changed files of one PR, paged to completion.
    fn get_pr_files(&self, owner: &str, repo: &str, number: u64)
        -> Result<Vec<FileChange>, ApiError>;

    /// Commits on the default branch since `since`, at most `max_commits`.
    fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<&str>,
        max_commits: usize,
    ) -> Result<Vec<CommitListItem>, ApiError>;

    /// One commit's detail payload; `None` when absent.
    fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Option<Value>, ApiError>;

    /// Changed files of one commit (empty when the commit is absent).
    fn get_commit_files(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<FileChange>, ApiError>;

    /// Two-commit comparison payload; `None` when absent.
    fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Option<Value>, ApiError>;
}
