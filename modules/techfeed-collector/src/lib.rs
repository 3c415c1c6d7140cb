pub mod error;
pub mod http;
pub mod jobs;
pub mod monitor;
pub mod paging;
pub mod persist;
pub mod registry;
pub mod runner;
pub mod sources;
pub mod staging;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

#[cfg(test)]
mod chain_tests;

pub use error::{CollectError, Result};
pub use http::Http;
pub use jobs::{CollectPostsJob, PersistPostsJob, COLLECT_JOB, PERSIST_JOB, RUN_ID_PARAM};
pub use monitor::{CollectMonitor, CollectMonitorSnapshot, SourceStat};
pub use persist::PersistStage;
pub use registry::SourceRegistry;
pub use runner::{Job, JobParams, JobRunner};
pub use staging::{ListStore, RedisListStore, StagingKey, StagingQueue};
pub use traits::Catalog;
