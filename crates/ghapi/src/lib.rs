pub mod api;
pub mod client;
pub mod error;
pub mod types;

pub use api::GitHubApi;
pub use client::GitHubClient;
pub use error::ApiError;
pub use types::{CommitListItem, ContentsEntry, MergedPr, PageProbe, RepoDescriptor, TreeEntry};
