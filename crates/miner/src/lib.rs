pub mod cluster;
pub mod config;
pub mod driver;
pub mod mine;

pub use cluster::collect_author_contributions;
pub use config::{load_miner_config, MinerConfig};
pub use driver::run_miner;
pub use mine::{CommitMiner, MinedRepo};
