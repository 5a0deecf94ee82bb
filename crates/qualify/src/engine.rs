use std::collections::BTreeSet;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::json;
use tracing::{debug, warn};

use ghapi::{GitHubApi, RepoDescriptor, TreeEntry};
use models::{MatchEvidence, RejectRecord, RepoCard};
use scanner::ScanPatterns;

use crate::config::PipelineConfig;

const COMMIT_COUNT_QUERY: &str = r#"
query($owner: String!, $name: String!, $since: GitTimestamp!) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(since: $since) {
            totalCount
          }
        }
      }
    }
  }
}
"#;

/// Outcome of qualifying one candidate: exactly one of a card or a
/// reject record.
#[derive(Debug)]
pub enum Verdict {
    Accepted(Box<RepoCard>),
    Rejected(RejectRecord),
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn within_days(pushed_at: &str, days: i64) -> bool {
    let Some(pushed) = parse_timestamp(pushed_at) else {
        return false;
    };
    pushed >= Utc::now() - Duration::days(days)
}

/// Estimate a total item count from a `Link` header's rel="last" page
/// number multiplied by the page size.
pub fn estimate_total_from_link(link: Option<&str>, per_page: u64) -> Option<u64> {
    let link = link?;
    for part in link.split(',') {
        if !part.contains(r#"rel="last""#) {
            continue;
        }
        let url = part.trim().trim_start_matches('<');
        let url = &url[..url.find('>')?];
        for marker in ["?page=", "&page="] {
            if let Some(pos) = url.find(marker) {
                let digits: String = url[pos + marker.len()..]
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(last_page) = digits.parse::<u64>() {
                    return Some(last_page * per_page);
                }
            }
        }
        return None;
    }
    None
}

fn language_ratio(languages: &std::collections::BTreeMap<String, u64>) -> f64 {
    let total: u64 = languages.values().sum();
    if total == 0 {
        return 0.0;
    }
    let hdl = languages.get("Verilog").copied().unwrap_or(0)
        + languages.get("SystemVerilog").copied().unwrap_or(0);
    hdl as f64 / total as f64
}

fn has_hdl_extension(path: &str, extensions: &[String]) -> bool {
    let lower = path.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

fn count_hdl_files(tree: &[TreeEntry], extensions: &[String]) -> usize {
    tree.iter()
        .filter(|entry| entry.is_blob() && has_hdl_extension(&entry.path, extensions))
        .count()
}

/// Cumulative line count over HDL blobs, stopping as soon as the
/// threshold is reached. Unfetchable files are skipped.
fn count_hdl_lines<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    paths: &[String],
    min_lines: u64,
    reference: &str,
) -> u64 {
    let mut total = 0u64;
    for path in paths {
        match client.get_file_text(owner, repo, path, Some(reference)) {
            Ok(Some(text)) => total += text.lines().count() as u64,
            Ok(None) => {}
            Err(e) => debug!(path = %path, error = %e, "skipping unreadable HDL file"),
        }
        if total >= min_lines {
            break;
        }
    }
    total
}

/// CI presence: workflow files under `.github/workflows/`, else a
/// top-level `.gitlab-ci.yml`.
fn detect_ci<C: GitHubApi>(client: &C, owner: &str, repo: &str) -> (bool, Vec<String>) {
    let mut ci_files = Vec::new();
    if let Ok(Some(entries)) = client.list_contents(owner, repo, ".github/workflows") {
        for entry in entries {
            if entry.is_file() {
                ci_files.push(entry.name.clone());
            }
        }
    }
    if !ci_files.is_empty() {
        return (true, ci_files);
    }

    if let Ok(Some(_)) = client.get_file_text(owner, repo, ".gitlab-ci.yml", None) {
        return (true, vec![".gitlab-ci.yml".to_string()]);
    }

    (false, Vec::new())
}

/// Deterministic scan corpus: configured fixed paths, CI workflow paths,
/// and up to `max_script_files` entries of `scripts/`, deduplicated and
/// sorted.
fn collect_scan_paths<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    config: &PipelineConfig,
    ci_files: &[String],
) -> Vec<String> {
    let mut paths: BTreeSet<String> = config.scan_paths.iter().cloned().collect();

    if config.scan_workflows {
        for name in ci_files {
            if name == ".gitlab-ci.yml" {
                paths.insert(name.clone());
            } else {
                paths.insert(format!(".github/workflows/{}", name));
            }
        }
    }

    if config.scan_scripts_dir {
        if let Ok(Some(entries)) = client.list_contents(owner, repo, "scripts") {
            for entry in entries.iter().take(config.max_script_files) {
                if entry.is_file() {
                    paths.insert(entry.path.clone());
                }
            }
        }
    }

    paths.into_iter().filter(|p| !p.is_empty()).collect()
}

type ScanOutput = (
    Vec<MatchEvidence>,
    Vec<MatchEvidence>,
    Vec<String>,
    Vec<String>,
);

fn scan_corpus<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    paths: &[String],
    patterns: &ScanPatterns,
) -> ScanOutput {
    let mut allow_hits = Vec::new();
    let mut deny_hits = Vec::new();
    let mut build_cmds = Vec::new();
    let mut test_cmds = Vec::new();

    for path in paths {
        let text = match client.get_file_text(owner, repo, path, None) {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(e) => {
                debug!(path = %path, error = %e, "skipping unscannable file");
                continue;
            }
        };
        let (allow, deny) = patterns.scan_text(path, &text);
        allow_hits.extend(allow);
        deny_hits.extend(deny);
        let (build, test) = patterns.extract_candidate_cmds(path, &text);
        build_cmds.extend(build);
        test_cmds.extend(test);
    }

    (allow_hits, deny_hits, build_cmds, test_cmds)
}

fn commit_count_graphql<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    since: DateTime<Utc>,
) -> Result<Option<u64>, ghapi::ApiError> {
    let variables = json!({
        "owner": owner,
        "name": repo,
        "since": since.to_rfc3339_opts(SecondsFormat::Secs, true),
    });
    let data = client.post_graphql(COMMIT_COUNT_QUERY, variables)?;
    Ok(data
        .get("repository")
        .and_then(|v| v.get("defaultBranchRef"))
        .filter(|v| !v.is_null())
        .and_then(|v| v.get("target"))
        .and_then(|v| v.get("history"))
        .filter(|v| !v.is_null())
        .and_then(|v| v.get("totalCount"))
        .and_then(|v| v.as_u64()))
}

fn commit_count_rest<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    since: DateTime<Utc>,
) -> Result<u64, ghapi::ApiError> {
    let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
    let probe = client.probe_commits(owner, repo, &since)?;
    if probe.page_len == 0 {
        return Ok(0);
    }
    Ok(estimate_total_from_link(probe.link.as_deref(), 1).unwrap_or(probe.page_len as u64))
}

/// Commit count in the window, preferring one GraphQL round trip and
/// falling back to the REST page-header trick.
fn commit_count<C: GitHubApi>(
    client: &C,
    owner: &str,
    repo: &str,
    since: DateTime<Utc>,
    use_graphql: bool,
) -> Option<u64> {
    if use_graphql {
        match commit_count_graphql(client, owner, repo, since) {
            Ok(count) => return count,
            Err(e) => warn!(error = %e, "GraphQL commit count failed; falling back to REST"),
        }
    }
    match commit_count_rest(client, owner, repo, since) {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "REST commit count failed");
            None
        }
    }
}

/// Evaluate every qualification check for one candidate. Checks append
/// reason tags instead of aborting; the candidate is accepted only when
/// the final reason set is empty.
pub fn evaluate_repo<C: GitHubApi>(
    client: &C,
    item: &RepoDescriptor,
    config: &PipelineConfig,
    patterns: &ScanPatterns,
) -> Verdict {
    let full_name = item.full_name.clone();
    let owner = item.owner.login.as_str();
    let repo = item.name.as_str();
    let default_branch = item.default_branch.clone();
    let mut reasons: Vec<String> = Vec::new();

    if item.archived || item.fork {
        reasons.push("archived_or_fork".to_string());
    }

    if item.stargazers_count < config.min_stars {
        reasons.push("min_stars".to_string());
    }

    let pushed_at = item.pushed_at.clone().unwrap_or_default();
    if pushed_at.is_empty() || !within_days(&pushed_at, config.pushed_within_days) {
        reasons.push("pushed_at".to_string());
    }

    let languages = match client.get_languages(owner, repo) {
        Ok(languages) => Some(languages),
        Err(e) => {
            debug!(repo = %full_name, error = %e, "languages endpoint failed");
            reasons.push("languages_api".to_string());
            None
        }
    };

    let sv_ratio = languages.as_ref().map(language_ratio).unwrap_or(0.0);
    if languages.is_some() && sv_ratio < config.min_sv_ratio {
        reasons.push("sv_ratio".to_string());
    }

    let mut sv_file_count = 0usize;
    let mut sv_line_count: i64 = -1;
    let tree = match client.get_tree(owner, repo, &default_branch) {
        Ok(tree) => tree,
        Err(e) => {
            debug!(repo = %full_name, error = %e, "tree endpoint failed");
            None
        }
    };

    match tree {
        Some(tree) => {
            sv_file_count = count_hdl_files(&tree, &config.verilog_extensions);
            let file_pass = config.min_sv_files == 0 || sv_file_count >= config.min_sv_files;

            let mut line_pass = true;
            if config.min_sv_lines > 0 && !file_pass {
                let hdl_paths: Vec<String> = tree
                    .iter()
                    .filter(|entry| {
                        entry.is_blob() && has_hdl_extension(&entry.path, &config.verilog_extensions)
                    })
                    .map(|entry| entry.path.clone())
                    .collect();
                let counted = count_hdl_lines(
                    client,
                    owner,
                    repo,
                    &hdl_paths,
                    config.min_sv_lines,
                    &default_branch,
                );
                sv_line_count = counted as i64;
                line_pass = counted >= config.min_sv_lines;
            }

            if !(file_pass || line_pass) {
                reasons.push("sv_size".to_string());
            }
        }
        None => reasons.push("tree_api".to_string()),
    }

    let (has_ci, ci_files) = detect_ci(client, owner, repo);
    let scan_paths = collect_scan_paths(client, owner, repo, config, &ci_files);
    let (allow_hits, deny_hits, build_cmds, test_cmds) =
        scan_corpus(client, owner, repo, &scan_paths, patterns);

    if !deny_hits.is_empty() {
        reasons.push("denylist_tools".to_string());
    }
    if allow_hits.is_empty() {
        reasons.push("allowlist_missing".to_string());
    }

    let pr_query = format!("repo:{} is:pr", full_name);
    let pr_total = if config.min_pr_total > 0 {
        match client.search_issues_total(&pr_query) {
            Ok(total) => {
                if total < config.min_pr_total {
                    reasons.push("pr_total".to_string());
                }
                total
            }
            Err(_) => {
                reasons.push("pr_total_api".to_string());
                0
            }
        }
    } else {
        client.search_issues_total(&pr_query).unwrap_or(0)
    };

    let issue_query = format!("repo:{} is:issue", full_name);
    let issue_total = if config.min_issue_total > 0 {
        match client.search_issues_total(&issue_query) {
            Ok(total) => {
                if total < config.min_issue_total {
                    reasons.push("issue_total".to_string());
                }
                total
            }
            Err(_) => {
                reasons.push("issue_total_api".to_string());
                0
            }
        }
    } else {
        client.search_issues_total(&issue_query).unwrap_or(0)
    };

    let mut commit_12m = None;
    let mut commit_6m = None;
    if config.min_commit_last_12m > 0 || config.min_commit_last_6m > 0 {
        let now = Utc::now();
        commit_12m = commit_count(client, owner, repo, now - Duration::days(365), config.use_graphql);
        commit_6m = commit_count(client, owner, repo, now - Duration::days(182), config.use_graphql);
        match (commit_12m, commit_6m) {
            (Some(twelve), Some(six)) => {
                // Either window passing its threshold is sufficient.
                if twelve < config.min_commit_last_12m && six < config.min_commit_last_6m {
                    reasons.push("commit_activity".to_string());
                }
            }
            _ => reasons.push("commit_count".to_string()),
        }
    }

    let mut has_release_or_tags = true;
    if config.min_releases > 0 || config.min_tags > 0 {
        let release_check = client.get_releases(owner, repo, 1).and_then(|releases| {
            client.get_tags(owner, repo, 1).map(|tags| (releases, tags))
        });
        match release_check {
            Ok((releases, tags)) => {
                let has_release =
                    config.min_releases > 0 && releases.page_len >= config.min_releases;
                let tags_count = estimate_total_from_link(tags.link.as_deref(), 1)
                    .unwrap_or(tags.page_len as u64);
                has_release_or_tags = has_release || tags_count >= config.min_tags;
                if !has_release_or_tags {
                    reasons.push("release_or_tags".to_string());
                }
            }
            Err(_) => {
                reasons.push("release_or_tags_api".to_string());
                has_release_or_tags = false;
            }
        }
    }

    if !reasons.is_empty() {
        reasons.sort();
        reasons.dedup();
        return Verdict::Rejected(RejectRecord {
            repo: full_name,
            reasons,
        });
    }

    let dedup_sorted = |cmds: Vec<String>| -> Vec<String> {
        cmds.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
    };

    Verdict::Accepted(Box::new(RepoCard {
        repo: full_name,
        default_branch,
        stars: item.stargazers_count,
        pushed_at,
        sv_ratio,
        sv_file_count,
        sv_line_count,
        has_ci,
        ci_files,
        commit_count_last_12m: commit_12m,
        commit_count_last_6m: commit_6m,
        pr_total,
        issue_total,
        has_release_or_tags,
        open_eda_evidence: allow_hits,
        deny_evidence: deny_hits,
        candidate_build_cmds: dedup_sorted(build_cmds),
        candidate_test_cmds: dedup_sorted(test_cmds),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_header_last_page_estimation() {
        let link = r#"<https://api.github.com/repositories/1/tags?per_page=1&page=2>; rel="next", <https://api.github.com/repositories/1/tags?per_page=1&page=17>; rel="last""#;
        assert_eq!(estimate_total_from_link(Some(link), 1), Some(17));
        assert_eq!(estimate_total_from_link(Some(link), 30), Some(510));
    }

    #[test]
    fn test_link_header_without_last_rel_is_none() {
        let link = r#"<https://api.github.com/repositories/1/tags?page=2>; rel="next""#;
        assert_eq!(estimate_total_from_link(Some(link), 1), None);
        assert_eq!(estimate_total_from_link(None, 1), None);
    }

    #[test]
    fn test_link_header_page_param_leading_url() {
        let link = r#"<https://api.github.com/x?page=9&per_page=1>; rel="last""#;
        assert_eq!(estimate_total_from_link(Some(link), 1), Some(9));
    }

    #[test]
    fn test_language_ratio() {
        let mut languages = std::collections::BTreeMap::new();
        languages.insert("Verilog".to_string(), 300u64);
        languages.insert("SystemVerilog".to_string(), 200u64);
        languages.insert("C".to_string(), 500u64);
        assert!((language_ratio(&languages) - 0.5).abs() < f64::EPSILON);
        assert_eq!(language_ratio(&std::collections::BTreeMap::new()), 0.0);
    }

    #[test]
    fn test_within_days_rejects_garbage_timestamps() {
        assert!(!within_days("not-a-date", 180));
        assert!(!within_days("", 180));
    }

    #[test]
    fn test_within_days_accepts_recent_push() {
        let recent = (Utc::now() - Duration::days(3)).to_rfc3339();
        assert!(within_days(&recent, 180));
        let stale = (Utc::now() - Duration::days(300)).to_rfc3339();
        assert!(!within_days(&stale, 180));
    }
}
