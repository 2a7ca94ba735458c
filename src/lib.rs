pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliConfig;

pub use adapters::clock::{FixedClock, SystemClock};
pub use adapters::http_scorer::HttpScorer;
pub use adapters::json_store::JsonFileStore;
pub use adapters::memory_store::InMemoryStore;
pub use config::toml_config::EngineConfig;
pub use core::{engine::ReviewEngine, evaluator::AnswerEvaluator};
pub use domain::model::{Card, CardId, OwnerId, Quality, ReviewMode, ReviewType};
pub use utils::error::{ReviewError, Result};
