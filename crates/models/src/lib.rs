pub mod hash;
pub mod jsonl;
pub mod record;

pub use jsonl::JsonlSink;
pub use record::{
    AuthorContribution, CommitInfo, CommitPair, FileChange, FilePatch, MatchEvidence,
    MinerRejectRecord, PatchKind, RejectRecord, RepoCard,
};
