use anyhow::Context;
use regex::Regex;

use models::MatchEvidence;

/// Compiled vocabulary patterns for one scan run. Built once from the
/// configured allow/deny term lists.
pub struct ScanPatterns {
    allow: Regex,
    deny: Regex,
    vcs_token: Regex,
    vcs_flag: Regex,
    test_cmd: Regex,
    make_target: Regex,
}

fn compile_vocabulary(terms: &[String]) -> anyhow::Result<Regex> {
    let escaped: Vec<String> = terms.iter().map(|t| regex::escape(t)).collect();
    let pattern = format!(r"(?i)\b({})\b", escaped.join("|"));
    Regex::new(&pattern).with_context(|| format!("invalid vocabulary pattern: {}", pattern))
}

impl ScanPatterns {
    pub fn new(allow_terms: &[String], deny_terms: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            allow: compile_vocabulary(allow_terms)?,
            deny: compile_vocabulary(deny_terms)?,
            vcs_token: Regex::new(r"\bvcs\b")?,
            vcs_flag: Regex::new(r"\bvcs\b\s+[-+]")?,
            test_cmd: Regex::new(r"\btest\b|\bcheck\b|pytest")?,
            make_target: Regex::new(r"^(test|check|build|all)\s*:")?,
        })
    }

    /// "version control" mentions are never the simulator.
    fn is_version_control_mention(&self, line_lower: &str) -> bool {
        line_lower.contains("version control") || line_lower.contains("version-control")
    }

    /// Contextual evidence that `vcs` means the Synopsys tool: the vendor
    /// name, a trailing `-`/`+` flag, `vlogan`, or `-full64` on the line.
    fn is_vcs_tool_usage(&self, line_lower: &str) -> bool {
        if line_lower.contains("synopsys") && line_lower.contains("vcs") {
            return true;
        }
        if self.vcs_flag.is_match(line_lower) {
            return true;
        }
        line_lower.contains("vlogan") || (line_lower.contains("vcs") && line_lower.contains("-full64"))
    }

    /// Line-oriented scan of one fetched text file. Returns allow hits and
    /// surviving deny hits as evidence records.
    pub fn scan_text(&self, path: &str, content: &str) -> (Vec<MatchEvidence>, Vec<MatchEvidence>) {
        let mut allow_hits = Vec::new();
        let mut deny_hits = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_number = idx + 1;
            if self.allow.is_match(line) {
                allow_hits.push(MatchEvidence {
                    path: path.to_string(),
                    line_number,
                    line: line.trim().to_string(),
                    pattern: self.allow.as_str().to_string(),
                });
            }
            if self.deny.is_match(line) {
                let line_lower = line.to_lowercase();
                if self.vcs_token.is_match(&line_lower) {
                    if self.is_version_control_mention(&line_lower) {
                        continue;
                    }
                    if !self.is_vcs_tool_usage(&line_lower) {
                        continue;
                    }
                }
                deny_hits.push(MatchEvidence {
                    path: path.to_string(),
                    line_number,
                    line: line.trim().to_string(),
                    pattern: self.deny.as_str().to_string(),
                });
            }
        }

        (allow_hits, deny_hits)
    }

    /// Extract candidate build/test invocations from CI YAML and Makefiles.
    /// Returns (build commands, test commands).
    pub fn extract_candidate_cmds(&self, path: &str, content: &str) -> (Vec<String>, Vec<String>) {
        let mut build_cmds = Vec::new();
        let mut test_cmds = Vec::new();
        let path_lower = path.to_lowercase();

        if path_lower.ends_with(".yml") || path_lower.ends_with(".yaml") {
            for line in content.lines() {
                if let Some((_, rest)) = line.split_once("run:") {
                    let cmd = rest.trim();
                    if cmd.is_empty() || cmd == "|" || cmd == ">" {
                        continue;
                    }
                    if self.test_cmd.is_match(cmd) {
                        test_cmds.push(cmd.to_string());
                    } else {
                        build_cmds.push(cmd.to_string());
                    }
                }
            }
        }

        if path.ends_with("Makefile") {
            for line in content.lines() {
                if let Some(caps) = self.make_target.captures(line) {
                    let target = &caps[1];
                    let cmd = format!("make {}", target);
                    if target == "test" || target == "check" {
                        test_cmds.push(cmd);
                    } else {
                        build_cmds.push(cmd);
                    }
                }
            }
        }

        (build_cmds, test_cmds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns() -> ScanPatterns {
        let allow: Vec<String> = ["iverilog", "verilator", "yosys", "cocotb"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let deny: Vec<String> = ["Synopsys VCS", "VCS", "xrun", "xcelium", "questa", "modelsim"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        ScanPatterns::new(&allow, &deny).unwrap()
    }

    #[test]
    fn test_allow_hit_records_line_and_number() {
        let p = patterns();
        let (allow, deny) = p.scan_text("README.md", "intro\nbuilt with Verilator 5.0\n");
        assert_eq!(allow.len(), 1);
        assert_eq!(allow[0].line_number, 2);
        assert_eq!(allow[0].line, "built with Verilator 5.0");
        assert!(deny.is_empty());
    }

    #[test]
    fn test_version_control_vcs_is_not_a_deny_hit() {
        let p = patterns();
        let (_, deny) = p.scan_text("README.md", "use version control system (vcs) responsibly");
        assert!(deny.is_empty());
    }

    #[test]
    fn test_bare_vcs_without_tool_context_is_suppressed() {
        let p = patterns();
        let (_, deny) = p.scan_text("README.md", "our vcs of choice is git");
        assert!(deny.is_empty());
    }

    #[test]
    fn test_synopsys_vcs_invocation_is_a_deny_hit() {
        let p = patterns();
        let (_, deny) = p.scan_text("Makefile", "\tsynopsys vcs -full64 +v2k top.sv");
        assert_eq!(deny.len(), 1);
    }

    #[test]
    fn test_vcs_with_flag_is_a_deny_hit() {
        let p = patterns();
        let (_, deny) = p.scan_text("run.sh", "vcs -sverilog tb.sv");
        assert_eq!(deny.len(), 1);
    }

    #[test]
    fn test_other_proprietary_tools_always_deny() {
        let p = patterns();
        let (_, deny) = p.scan_text("doc.md", "simulate with xcelium or questa");
        assert_eq!(deny.len(), 1);
    }

    #[test]
    fn test_word_boundaries_prevent_substring_hits() {
        let p = patterns();
        // "cocotbext" must not satisfy the bare "cocotb" term.
        let (allow, _) = p.scan_text("README.md", "uses cocotbext-axi only");
        assert!(allow.is_empty());
    }

    #[test]
    fn test_yaml_run_lines_split_into_build_and_test() {
        let p = patterns();
        let yaml = "jobs:\n  build:\n    steps:\n      - run: make all\n      - run: |\n      - run: pytest tests/\n      - run: make check\n";
        let (build, test) = p.extract_candidate_cmds(".github/workflows/ci.yml", yaml);
        assert_eq!(build, vec!["make all".to_string()]);
        assert_eq!(
            test,
            vec!["pytest tests/".to_string(), "make check".to_string()]
        );
    }

    #[test]
    fn test_makefile_targets_emit_make_commands() {
        let p = patterns();
        let makefile = "all: build\n\ttrue\nbuild:\n\ttrue\ntest: build\n\ttrue\ninstall:\n\ttrue\n";
        let (build, test) = p.extract_candidate_cmds("Makefile", makefile);
        assert_eq!(build, vec!["make all".to_string(), "make build".to_string()]);
        assert_eq!(test, vec!["make test".to_string()]);
    }
}
