use std::path::Path;

use serde::{Deserialize, Serialize};

/// Qualification pipeline configuration. Deserialized from JSON; any
/// missing field keeps its compiled default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub search_languages: Vec<String>,
    pub search_qualifiers: String,
    pub search_sort: String,
    pub search_order: String,
    pub max_repos_per_language: usize,

    pub pushed_within_days: i64,
    pub min_stars: u64,

    pub min_sv_ratio: f64,
    pub min_sv_files: usize,
    pub min_sv_lines: u64,

    pub min_pr_total: u64,
    pub min_issue_total: u64,

    pub min_commit_last_12m: u64,
    pub min_commit_last_6m: u64,

    pub min_tags: u64,
    pub min_releases: usize,

    pub allowlist_terms: Vec<String>,
    pub denylist_terms: Vec<String>,

    pub scan_paths: Vec<String>,
    pub scan_workflows: bool,
    pub scan_scripts_dir: bool,
    pub max_script_files: usize,

    pub use_graphql: bool,

    pub verilog_extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_languages: vec!["Verilog".to_string(), "SystemVerilog".to_string()],
            search_qualifiers: "fork:false archived:false".to_string(),
            search_sort: "stars".to_string(),
            search_order: "desc".to_string(),
            max_repos_per_language: 500,

            pushed_within_days: 180,
            min_stars: 100,

            min_sv_ratio: 0.30,
            min_sv_files: 20,
            min_sv_lines: 3000,

            min_pr_total: 0,
            min_issue_total: 50,

            min_commit_last_12m: 100,
            min_commit_last_6m: 30,

            min_tags: 5,
            min_releases: 1,

            allowlist_terms: [
                "iverilog",
                "verilator",
                "yosys",
                "symbiyosys",
                "sby",
                "sv2v",
                "surelog",
                "uhdm",
                "cocotb",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            denylist_terms: [
                "Synopsys VCS",
                "VCS",
                "xrun",
                "xcelium",
                "questa",
                "modelsim",
                "dc_shell",
                "genus",
                "innovus",
                "primetime",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),

            scan_paths: [
                "README.md",
                "README.rst",
                "README.txt",
                "README",
                "CONTRIBUTING.md",
                "CONTRIBUTING",
                "Makefile",
                "Dockerfile",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            scan_workflows: true,
            scan_scripts_dir: true,
            max_script_files: 20,

            use_graphql: true,

            verilog_extensions: [".v", ".vh", ".sv", ".svh"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Load configuration, returning defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        None => Ok(PipelineConfig::default()),
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let config = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("config parse error in {}: {}", path.display(), e))?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"min_stars": 5, "min_sv_ratio": 0.1}"#).unwrap();
        assert_eq!(config.min_stars, 5);
        assert!((config.min_sv_ratio - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.max_repos_per_language, 500);
        assert_eq!(config.search_languages.len(), 2);
    }
}
