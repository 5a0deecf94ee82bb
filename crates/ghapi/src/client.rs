use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::GitHubApi;
use crate::error::ApiError;
use crate::types::{CommitListItem, ContentsEntry, MergedPr, PageProbe, RepoDescriptor, TreeEntry};
use models::FileChange;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "svmine/0.1.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: usize = 100;

const MERGED_PRS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    pullRequests(
      first: 50,
      after: $cursor,
      states: [MERGED],
      orderBy: {field: UPDATED_AT, direction: DESC}
    ) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        number
        mergedAt
        baseRefOid
        mergeCommit {
          oid
        }
        files(first: 100) {
          nodes {
            path
            additions
            deletions
          }
        }
      }
    }
  }
}
"#;

/// Blocking GitHub client over one `ureq` agent. All requests carry the
/// GitHub media type and the bearer token when one is configured; a 403
/// with an exhausted rate-limit header sleeps until the advertised reset
/// and retries exactly once.
pub struct GitHubClient {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(token: Option<String>, base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, url)
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", USER_AGENT);
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Bearer {}", token));
        }
        req
    }

    /// Issue a request, honouring the rate-limit protocol: on 403 with
    /// `X-RateLimit-Remaining: 0`, sleep until `X-RateLimit-Reset` and
    /// retry once. Everything else propagates.
    fn send(&self, req: ureq::Request, body: Option<&Value>) -> Result<ureq::Response, ApiError> {
        let attempt = |r: ureq::Request| match body {
            Some(value) => r.send_json(value),
            None => r.call(),
        };

        match attempt(req.clone()) {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(403, resp))
                if resp.header("x-ratelimit-remaining") == Some("0") =>
            {
                let reset = resp
                    .header("x-ratelimit-reset")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(0);
                let wait = reset.saturating_sub(unix_now());
                warn!(seconds = wait, "rate limit hit; sleeping until reset");
                std::thread::sleep(Duration::from_secs(wait));
                attempt(req).map_err(ApiError::from)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, path: &str, params: &[(&str, String)]) -> Result<ureq::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.request("GET", &url);
        for (key, value) in params {
            req = req.query(key, value);
        }
        self.send(req, None)
    }

    fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ApiError> {
        let resp = self.get(path, params)?;
        resp.into_json().map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn get_json_or_none(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<Value>, ApiError> {
        match self.get(path, params) {
            Ok(resp) => {
                let value = resp
                    .into_json()
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            Err(ApiError::Status { code: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn get_json_with_link(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<(Value, Option<String>), ApiError> {
        let resp = self.get(path, params)?;
        let link = resp.header("link").map(|s| s.to_string());
        let value = resp
            .into_json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok((value, link))
    }

    fn contents_json(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(r) = reference {
            params.push(("ref", r.to_string()));
        }
        self.get_json_or_none(&format!("/repos/{}/{}/contents/{}", owner, repo, path), &params)
    }

    fn file_changes_from_values(values: &[Value]) -> Vec<FileChange> {
        values
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect()
    }
}

impl GitHubApi for GitHubClient {
    fn search_repositories(
        &self,
        query: &str,
        sort: &str,
        order: &str,
        max_results: usize,
    ) -> Result<Vec<RepoDescriptor>, ApiError> {
        let mut collected = Vec::new();
        let mut page = 1usize;

        while collected.len() < max_results {
            let params = [
                ("q", query.to_string()),
                ("sort", sort.to_string()),
                ("order", order.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let data = self.get_json("/search/repositories", &params)?;
            let items = data
                .get("items")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                break;
            }
            let page_len = items.len();
            for item in items {
                match serde_json::from_value::<RepoDescriptor>(item) {
                    Ok(descriptor) => collected.push(descriptor),
                    Err(e) => debug!(error = %e, "skipping unparseable search item"),
                }
                if collected.len() >= max_results {
                    break;
                }
            }
            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(collected)
    }

    fn get_languages(&self, owner: &str, repo: &str) -> Result<BTreeMap<String, u64>, ApiError> {
        let data = self.get_json(&format!("/repos/{}/{}/languages", owner, repo), &[])?;
        serde_json::from_value(data).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        reference: &str,
    ) -> Result<Option<Vec<TreeEntry>>, ApiError> {
        let data = self.get_json_or_none(
            &format!("/repos/{}/{}/git/trees/{}", owner, repo, reference),
            &[("recursive", "1".to_string())],
        )?;
        let Some(data) = data else {
            return Ok(None);
        };
        let entries = data
            .get("tree")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Some(entries))
    }

    fn get_file_text(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let Some(data) = self.contents_json(owner, repo, path, reference)? else {
            return Ok(None);
        };
        if data.get("type").and_then(|v| v.as_str()) != Some("file") {
            return Ok(None);
        }

        if data.get("encoding").and_then(|v| v.as_str()) == Some("base64") {
            if let Some(content) = data.get("content").and_then(|v| v.as_str()) {
                let stripped: String = content.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(stripped.as_bytes())
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()));
            }
        }

        if let Some(url) = data.get("download_url").and_then(|v| v.as_str()) {
            return match self.send(self.request("GET", url), None) {
                Ok(resp) => {
                    let text = resp
                        .into_string()
                        .map_err(|e| ApiError::Decode(e.to_string()))?;
                    Ok(Some(text))
                }
                // The redirect target vanished; the file is simply absent.
                Err(_) => Ok(None),
            };
        }

        Ok(None)
    }

    fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<Vec<ContentsEntry>>, ApiError> {
        let Some(data) = self.contents_json(owner, repo, path, None)? else {
            return Ok(None);
        };
        match data {
            Value::Array(items) => Ok(Some(
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect(),
            )),
            // A file object, not a directory listing.
            _ => Ok(None),
        }
    }

    fn search_issues_total(&self, query: &str) -> Result<u64, ApiError> {
        let params = [("q", query.to_string()), ("per_page", "1".to_string())];
        let data = self.get_json("/search/issues", &params)?;
        Ok(data.get("total_count").and_then(|v| v.as_u64()).unwrap_or(0))
    }

    fn get_releases(
        &self,
        owner: &str,
        repo: &str,
        per_page: usize,
    ) -> Result<PageProbe, ApiError> {
        let (data, link) = self.get_json_with_link(
            &format!("/repos/{}/{}/releases", owner, repo),
            &[("per_page", per_page.to_string())],
        )?;
        Ok(PageProbe {
            page_len: data.as_array().map(|a| a.len()).unwrap_or(0),
            link,
        })
    }

    fn get_tags(&self, owner: &str, repo: &str, per_page: usize) -> Result<PageProbe, ApiError> {
        let (data, link) = self.get_json_with_link(
            &format!("/repos/{}/{}/tags", owner, repo),
            &[("per_page", per_page.to_string())],
        )?;
        Ok(PageProbe {
            page_len: data.as_array().map(|a| a.len()).unwrap_or(0),
            link,
        })
    }

    fn probe_commits(&self, owner: &str, repo: &str, since: &str) -> Result<PageProbe, ApiError> {
        let (data, link) = self.get_json_with_link(
            &format!("/repos/{}/{}/commits", owner, repo),
            &[("since", since.to_string()), ("per_page", "1".to_string())],
        )?;
        Ok(PageProbe {
            page_len: data.as_array().map(|a| a.len()).unwrap_or(0),
            link,
        })
    }

    fn post_graphql(&self, query: &str, variables: Value) -> Result<Value, ApiError> {
        let url = format!("{}/graphql", self.base_url);
        let body = json!({ "query": query, "variables": variables });
        let resp = self.send(self.request("POST", &url), Some(&body))?;
        let payload: Value = resp
            .into_json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        if let Some(errors) = payload.get("errors") {
            return Err(ApiError::GraphQl(errors.to_string()));
        }
        Ok(payload.get("data").cloned().unwrap_or(Value::Null))
    }

    fn list_merged_prs_graphql(
        &self,
        owner: &str,
        repo: &str,
        max_prs: usize,
        since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError> {
        let mut prs = Vec::new();
        let mut cursor: Option<String> = None;

        while prs.len() < max_prs {
            let variables = json!({ "owner": owner, "repo": repo, "cursor": cursor });
            let data = self.post_graphql(MERGED_PRS_QUERY, variables)?;

            let Some(repository) = data.get("repository").filter(|v| !v.is_null()) else {
                break;
            };
            let pull_requests = repository.get("pullRequests").cloned().unwrap_or(Value::Null);
            let nodes = pull_requests
                .get("nodes")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();

            for node in &nodes {
                if node.is_null() {
                    continue;
                }
                let merged_at = node.get("mergedAt").and_then(|v| v.as_str());
                if let (Some(since), Some(merged_at)) = (since, merged_at) {
                    if merged_at < since {
                        return Ok(prs);
                    }
                }
                let files = node
                    .get("files")
                    .and_then(|v| v.get("nodes"))
                    .and_then(|v| v.as_array())
                    .map(|nodes| Self::file_changes_from_values(nodes))
                    .unwrap_or_default();
                prs.push(MergedPr {
                    number: node.get("number").and_then(|v| v.as_u64()).unwrap_or(0),
                    merged_at: merged_at.map(|s| s.to_string()),
                    base_sha: node
                        .get("baseRefOid")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    merge_sha: node
                        .get("mergeCommit")
                        .and_then(|v| v.get("oid"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    files: Some(files),
                });
                if prs.len() >= max_prs {
                    break;
                }
            }

            let has_next = pull_requests
                .get("pageInfo")
                .and_then(|v| v.get("hasNextPage"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if !has_next {
                break;
            }
            cursor = pull_requests
                .get("pageInfo")
                .and_then(|v| v.get("endCursor"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
        }

        Ok(prs)
    }

    fn list_merged_prs_rest(
        &self,
        owner: &str,
        repo: &str,
        max_prs: usize,
        since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError> {
        let mut prs = Vec::new();
        let mut page = 1usize;

        while prs.len() < max_prs {
            let params = [
                ("state", "closed".to_string()),
                ("sort", "updated".to_string()),
                ("direction", "desc".to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let data = self.get_json(&format!("/repos/{}/{}/pulls", owner, repo), &params)?;
            let items = data.as_array().cloned().unwrap_or_default();
            if items.is_empty() {
                break;
            }
            let page_len = items.len();

            for pr in &items {
                let Some(merged_at) = pr.get("merged_at").and_then(|v| v.as_str()) else {
                    continue;
                };
                if let Some(since) = since {
                    if merged_at < since {
                        return Ok(prs);
                    }
                }
                prs.push(MergedPr {
                    number: pr.get("number").and_then(|v| v.as_u64()).unwrap_or(0),
                    merged_at: Some(merged_at.to_string()),
                    base_sha: pr
                        .get("base")
                        .and_then(|v| v.get("sha"))
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    merge_sha: pr
                        .get("merge_commit_sha")
                        .and_then(|v| v.as_str())
                        .map(|s| s.to_string()),
                    files: None,
                });
                if prs.len() >= max_prs {
                    break;
                }
            }

            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(prs)
    }

    fn get_pr_files(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<FileChange>, ApiError> {
        let mut files = Vec::new();
        let mut page = 1usize;

        loop {
            let params = [
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            let data = self.get_json(
                &format!("/repos/{}/{}/pulls/{}/files", owner, repo, number),
                &params,
            )?;
            let items = data.as_array().cloned().unwrap_or_default();
            if items.is_empty() {
                break;
            }
            let page_len = items.len();
            files.extend(Self::file_changes_from_values(&items));
            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(files)
    }

    fn list_commits(
        &self,
        owner: &str,
        repo: &str,
        since: Option<&str>,
        max_commits: usize,
    ) -> Result<Vec<CommitListItem>, ApiError> {
        let mut commits = Vec::new();
        let mut page = 1usize;

        while commits.len() < max_commits {
            let mut params = vec![
                ("per_page", PAGE_SIZE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(since) = since {
                params.push(("since", since.to_string()));
            }
            let data = self.get_json(&format!("/repos/{}/{}/commits", owner, repo), &params)?;
            let items = data.as_array().cloned().unwrap_or_default();
            if items.is_empty() {
                break;
            }
            let page_len = items.len();

            for item in &items {
                let commit = item.get("commit").cloned().unwrap_or(Value::Null);
                let author = commit.get("author").cloned().unwrap_or(Value::Null);
                commits.push(CommitListItem {
                    sha: item
                        .get("sha")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    message: commit
                        .get("message")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    author_name: author
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    authored_date: author
                        .get("date")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    parents: item
                        .get("parents")
                        .and_then(|v| v.as_array())
                        .map(|parents| {
                            parents
                                .iter()
                                .filter_map(|p| p.get("sha").and_then(|v| v.as_str()))
                                .map(|s| s.to_string())
                                .collect()
                        })
                        .unwrap_or_default(),
                });
                if commits.len() >= max_commits {
                    break;
                }
            }

            if page_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        Ok(commits)
    }

    fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<Option<Value>, ApiError> {
        self.get_json_or_none(&format!("/repos/{}/{}/commits/{}", owner, repo, sha), &[])
    }

    fn get_commit_files(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Vec<FileChange>, ApiError> {
        let Some(commit) = self.get_commit(owner, repo, sha)? else {
            return Ok(Vec::new());
        };
        Ok(commit
            .get("files")
            .and_then(|v| v.as_array())
            .map(|files| Self::file_changes_from_values(files))
            .unwrap_or_default())
    }

    fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Option<Value>, ApiError> {
        self.get_json_or_none(
            &format!("/repos/{}/{}/compare/{}...{}", owner, repo, base, head),
            &[],
        )
    }
}
