pub mod config;
pub mod discover;
pub mod driver;
pub mod engine;

pub use config::{load_config, PipelineConfig};
pub use discover::discover_candidates;
pub use driver::run_pipeline;
pub use engine::{evaluate_repo, Verdict};
