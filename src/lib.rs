pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::SyncConfig;

pub use adapters::{CsvStore, DanjuanLookup, DryRunStore, FeishuStore, LocalStorage};
pub use core::{
    engine::SyncEngine, matcher::TagMatcher, resolver::TypeOverrideResolver,
    sync::RecordSynchronizer, tagging::TaggingJob, type_fill::TypeFillJob,
};
pub use domain::model::{MatchResult, RunSummary, Taxonomy};
pub use utils::error::{Result, SyncError};
