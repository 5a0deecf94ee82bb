use std::collections::HashSet;

use tracing::info;

use ghapi::{ApiError, GitHubApi, RepoDescriptor};

use crate::config::PipelineConfig;

/// Run one repository search per configured language and deduplicate the
/// union by canonical name (first occurrence wins; descriptors for the
/// same repository are identical across queries).
pub fn discover_candidates<C: GitHubApi>(
    client: &C,
    config: &PipelineConfig,
) -> Result<Vec<RepoDescriptor>, ApiError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for language in &config.search_languages {
        let query = format!(
            "language:{} {} stars:>={}",
            language, config.search_qualifiers, config.min_stars
        );
        let found = client.search_repositories(
            &query,
            &config.search_sort,
            &config.search_order,
            config.max_repos_per_language,
        )?;
        info!(language = %language, count = found.len(), "search complete");
        for descriptor in found {
            if seen.insert(descriptor.full_name.clone()) {
                candidates.push(descriptor);
            }
        }
    }

    Ok(candidates)
}
