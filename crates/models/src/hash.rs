use sha2::{Digest, Sha256};

/// Compute a SHA-256 hash of arbitrary bytes, returned as a hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute a SHA-256 hash of a string, returned as a hex string.
pub fn sha256_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}

/// Deterministic contribution id: the first 12 hex digits of the SHA-256
/// over `"{repo}:{author}:{concatenated 8-char prefixes of the first 5
/// commit SHAs}"`. Stable across runs for identical inputs.
pub fn contribution_id(repo: &str, author: &str, commit_shas: &[String]) -> String {
    let prefixes: String = commit_shas
        .iter()
        .take(5)
        .map(|sha| sha.chars().take(8).collect::<String>())
        .collect();
    sha256_str(&format!("{}:{}:{}", repo, author, prefixes))
        .chars()
        .take(12)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_id_is_deterministic() {
        let shas = vec![
            "c1c1c1c1c1c1c1c1c1c1".to_string(),
            "c2c2c2c2c2c2c2c2c2c2".to_string(),
            "c3c3c3c3c3c3c3c3c3c3".to_string(),
        ];
        let a = contribution_id("owner/repo", "alice", &shas);
        let b = contribution_id("owner/repo", "alice", &shas);
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_contribution_id_distinguishes_authors() {
        let shas = vec!["abcdef0123456789".to_string()];
        let a = contribution_id("owner/repo", "alice", &shas);
        let b = contribution_id("owner/repo", "bob", &shas);
        assert_ne!(a, b);
    }

    #[test]
    fn test_contribution_id_ignores_commits_beyond_the_fifth() {
        let mut shas: Vec<String> = (0..5).map(|i| format!("{:040x}", i)).collect();
        let five = contribution_id("owner/repo", "alice", &shas);
        shas.push(format!("{:040x}", 99));
        let six = contribution_id("owner/repo", "alice", &shas);
        assert_eq!(five, six);
    }
}
