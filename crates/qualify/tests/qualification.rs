use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use ghapi::{
    ApiError, CommitListItem, ContentsEntry, GitHubApi, MergedPr, PageProbe, RepoDescriptor,
    TreeEntry,
};
use models::FileChange;
use qualify::{evaluate_repo, run_pipeline, PipelineConfig, Verdict};
use scanner::ScanPatterns;

#[derive(Default)]
struct FakeApi {
    descriptors: Vec<RepoDescriptor>,
    languages: BTreeMap<String, u64>,
    languages_fail: bool,
    tree: Option<Vec<TreeEntry>>,
    files: HashMap<String, String>,
    contents: HashMap<String, Vec<ContentsEntry>>,
    issue_totals: HashMap<String, u64>,
    release_page_len: usize,
    tags_link: Option<String>,
    graphql_commit_total: Option<u64>,
    commit_probe: Option<PageProbe>,
}

fn blob(path: &str) -> TreeEntry {
    serde_json::from_value(json!({ "path": path, "type": "blob" })).unwrap()
}

fn file_entry(name: &str, path: &str) -> ContentsEntry {
    serde_json::from_value(json!({ "name": name, "path": path, "type": "file" })).unwrap()
}

impl GitHubApi for FakeApi {
    fn search_repositories(
        &self,
        _query: &str,
        _sort: &str,
        _order: &str,
        _max_results: usize,
    ) -> Result<Vec<RepoDescriptor>, ApiError> {
        Ok(self.descriptors.clone())
    }

    fn get_languages(&self, _owner: &str, _repo: &str) -> Result<BTreeMap<String, u64>, ApiError> {
        if self.languages_fail {
            return Err(ApiError::Status {
                code: 500,
                body: "server error".to_string(),
            });
        }
        Ok(self.languages.clone())
    }

    fn get_tree(
        &self,
        _owner: &str,
        _repo: &str,
        _reference: &str,
    ) -> Result<Option<Vec<TreeEntry>>, ApiError> {
        Ok(self.tree.clone())
    }

    fn get_file_text(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        _reference: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        Ok(self.files.get(path).cloned())
    }

    fn list_contents(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
    ) -> Result<Option<Vec<ContentsEntry>>, ApiError> {
        Ok(self.contents.get(path).cloned())
    }

    fn search_issues_total(&self, query: &str) -> Result<u64, ApiError> {
        Ok(self.issue_totals.get(query).copied().unwrap_or(0))
    }

    fn get_releases(
        &self,
        _owner: &str,
        _repo: &str,
        _per_page: usize,
    ) -> Result<PageProbe, ApiError> {
        Ok(PageProbe {
            page_len: self.release_page_len,
            link: None,
        })
    }

    fn get_tags(&self, _owner: &str, _repo: &str, _per_page: usize) -> Result<PageProbe, ApiError> {
        Ok(PageProbe {
            page_len: 1,
            link: self.tags_link.clone(),
        })
    }

    fn probe_commits(
        &self,
        _owner: &str,
        _repo: &str,
        _since: &str,
    ) -> Result<PageProbe, ApiError> {
        match &self.commit_probe {
            Some(probe) => Ok(probe.clone()),
            None => Err(ApiError::Transport("no commits endpoint".to_string())),
        }
    }

    fn post_graphql(&self, _query: &str, _variables: Value) -> Result<Value, ApiError> {
        match self.graphql_commit_total {
            Some(total) => Ok(json!({
                "repository": {
                    "defaultBranchRef": {
                        "target": { "history": { "totalCount": total } }
                    }
                }
            })),
            None => Err(ApiError::GraphQl("schema mismatch".to_string())),
        }
    }

    fn list_merged_prs_graphql(
        &self,
        _owner: &str,
        _repo: &str,
        _max_prs: usize,
        _since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError> {
        Ok(Vec::new())
    }

    fn list_merged_prs_rest(
        &self,
        _owner: &str,
        _repo: &str,
        _max_prs: usize,
        _since: Option<&str>,
    ) -> Result<Vec<MergedPr>, ApiError> {
        Ok(Vec::new())
    }

    fn get_pr_files(
        &self,
        _owner: &str,
        _repo: &str,
        _number: u64,
    ) -> Result<Vec<FileChange>, ApiError> {
        Ok(Vec::new())
    }

    fn list_commits(
        &self,
        _owner: &str,
        _repo: &str,
        _since: Option<&str>,
        _max_commits: usize,
    ) -> Result<Vec<CommitListItem>, ApiError> {
        Ok(Vec::new())
    }

    fn get_commit(&self, _owner: &str, _repo: &str, _sha: &str) -> Result<Option<Value>, ApiError> {
        Ok(None)
    }

    fn get_commit_files(
        &self,
        _owner: &str,
        _repo: &str,
        _sha: &str,
    ) -> Result<Vec<FileChange>, ApiError> {
        Ok(Vec::new())
    }

    fn compare_commits(
        &self,
        _owner: &str,
        _repo: &str,
        _base: &str,
        _head: &str,
    ) -> Result<Option<Value>, ApiError> {
        Ok(None)
    }
}

fn descriptor(full_name: &str, stars: u64, archived: bool) -> RepoDescriptor {
    let (owner, name) = full_name.split_once('/').unwrap();
    let pushed_at = (Utc::now() - Duration::days(5)).to_rfc3339();
    serde_json::from_value(json!({
        "full_name": full_name,
        "name": name,
        "owner": { "login": owner },
        "default_branch": "main",
        "archived": archived,
        "fork": false,
        "stargazers_count": stars,
        "pushed_at": pushed_at,
    }))
    .unwrap()
}

/// A fake repository that clears every check with room to spare.
fn healthy_api() -> FakeApi {
    let mut api = FakeApi::default();
    api.languages.insert("Verilog".to_string(), 700);
    api.languages.insert("C".to_string(), 300);
    api.tree = Some(vec![
        blob("rtl/core.sv"),
        blob("rtl/alu.sv"),
        blob("tb/core_tb.sv"),
        blob("README.md"),
    ]);
    api.files.insert(
        "README.md".to_string(),
        "Simulate with verilator.\nRun yosys for synthesis.".to_string(),
    );
    api.files.insert(
        ".github/workflows/ci.yml".to_string(),
        "steps:\n  - run: make build\n  - run: make test\n".to_string(),
    );
    api.contents.insert(
        ".github/workflows".to_string(),
        vec![file_entry("ci.yml", ".github/workflows/ci.yml")],
    );
    api.issue_totals
        .insert("repo:octo/chip is:pr".to_string(), 40);
    api.issue_totals
        .insert("repo:octo/chip is:issue".to_string(), 120);
    api.release_page_len = 1;
    api.tags_link =
        Some(r#"<https://api.github.com/repos/octo/chip/tags?per_page=1&page=12>; rel="last""#.to_string());
    api.graphql_commit_total = Some(250);
    api
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        min_sv_files: 2,
        min_issue_total: 50,
        ..PipelineConfig::default()
    }
}

fn patterns(config: &PipelineConfig) -> ScanPatterns {
    ScanPatterns::new(&config.allowlist_terms, &config.denylist_terms).unwrap()
}

#[test]
fn fully_qualified_repo_emits_card() {
    let api = healthy_api();
    let config = test_config();
    let item = descriptor("octo/chip", 500, false);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Accepted(card) => {
            assert_eq!(card.repo, "octo/chip");
            assert_eq!(card.stars, 500);
            assert!((card.sv_ratio - 0.7).abs() < 1e-9);
            assert_eq!(card.sv_file_count, 3);
            assert_eq!(card.sv_line_count, -1);
            assert!(card.has_ci);
            assert_eq!(card.ci_files, vec!["ci.yml"]);
            assert_eq!(card.commit_count_last_12m, Some(250));
            assert_eq!(card.pr_total, 40);
            assert_eq!(card.issue_total, 120);
            assert!(card.has_release_or_tags);
            assert!(!card.open_eda_evidence.is_empty());
            assert!(card.deny_evidence.is_empty());
            assert_eq!(card.candidate_build_cmds, vec!["make build"]);
            assert_eq!(card.candidate_test_cmds, vec!["make test"]);
        }
        Verdict::Rejected(reject) => panic!("unexpected rejection: {:?}", reject.reasons),
    }
}

#[test]
fn failing_checks_accumulate_sorted_deduped_reasons() {
    let mut api = healthy_api();
    api.files.insert(
        "Makefile".to_string(),
        "sim:\n\tsynopsys vcs -full64 top.sv\n".to_string(),
    );
    let config = test_config();
    let item = descriptor("octo/chip", 3, true);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Rejected(reject) => {
            assert!(reject.reasons.contains(&"archived_or_fork".to_string()));
            assert!(reject.reasons.contains(&"min_stars".to_string()));
            assert!(reject.reasons.contains(&"denylist_tools".to_string()));
            let mut sorted = reject.reasons.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(reject.reasons, sorted);
        }
        Verdict::Accepted(_) => panic!("expected rejection"),
    }
}

#[test]
fn languages_failure_is_its_own_reason_without_ratio_check() {
    let mut api = healthy_api();
    api.languages_fail = true;
    let config = test_config();
    let item = descriptor("octo/chip", 500, false);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Rejected(reject) => {
            assert!(reject.reasons.contains(&"languages_api".to_string()));
            assert!(!reject.reasons.contains(&"sv_ratio".to_string()));
        }
        Verdict::Accepted(_) => panic!("expected rejection"),
    }
}

#[test]
fn line_count_fallback_rescues_small_file_counts() {
    let mut api = healthy_api();
    api.files
        .insert("rtl/core.sv".to_string(), "x\n".repeat(40));
    api.files.insert("rtl/alu.sv".to_string(), "y\n".repeat(40));
    api.files
        .insert("tb/core_tb.sv".to_string(), "z\n".repeat(40));
    let config = PipelineConfig {
        min_sv_files: 10,
        min_sv_lines: 100,
        min_issue_total: 50,
        ..PipelineConfig::default()
    };
    let item = descriptor("octo/chip", 500, false);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Accepted(card) => {
            assert!(card.sv_line_count >= 100);
        }
        Verdict::Rejected(reject) => panic!("unexpected rejection: {:?}", reject.reasons),
    }
}

#[test]
fn commit_count_falls_back_to_rest_link_estimate() {
    let mut api = healthy_api();
    api.graphql_commit_total = None;
    api.commit_probe = Some(PageProbe {
        page_len: 1,
        link: Some(
            r#"<https://api.github.com/repos/octo/chip/commits?per_page=1&page=240>; rel="last""#
                .to_string(),
        ),
    });
    let config = test_config();
    let item = descriptor("octo/chip", 500, false);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Accepted(card) => {
            assert_eq!(card.commit_count_last_12m, Some(240));
            assert_eq!(card.commit_count_last_6m, Some(240));
        }
        Verdict::Rejected(reject) => panic!("unexpected rejection: {:?}", reject.reasons),
    }
}

#[test]
fn commit_count_total_failure_is_a_reason() {
    let mut api = healthy_api();
    api.graphql_commit_total = None;
    api.commit_probe = None;
    let config = test_config();
    let item = descriptor("octo/chip", 500, false);

    match evaluate_repo(&api, &item, &config, &patterns(&config)) {
        Verdict::Rejected(reject) => {
            assert!(reject.reasons.contains(&"commit_count".to_string()));
        }
        Verdict::Accepted(_) => panic!("expected rejection"),
    }
}

#[test]
fn pipeline_partitions_candidates_across_the_two_streams() {
    let mut api = healthy_api();
    api.descriptors = vec![
        descriptor("octo/chip", 500, false),
        descriptor("octo/stale", 2, true),
    ];
    // The second candidate resolves against the same fake endpoints but
    // fails the star and archive checks.
    api.issue_totals
        .insert("repo:octo/stale is:issue".to_string(), 120);
    api.issue_totals
        .insert("repo:octo/stale is:pr".to_string(), 10);

    let config = test_config();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("repo_cards.jsonl");
    let rejects = dir.path().join("rejects.jsonl");

    run_pipeline(&api, &config, &output, &rejects).unwrap();

    let cards: Vec<Value> = std::fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let rejected: Vec<Value> = std::fs::read_to_string(&rejects)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    let accepted_names: HashSet<&str> = cards.iter().map(|c| c["repo"].as_str().unwrap()).collect();
    let rejected_names: HashSet<&str> =
        rejected.iter().map(|r| r["repo"].as_str().unwrap()).collect();

    assert_eq!(accepted_names.len() + rejected_names.len(), 2);
    assert!(accepted_names.is_disjoint(&rejected_names));
    assert!(accepted_names.contains("octo/chip"));
    assert!(rejected_names.contains("octo/stale"));
}
