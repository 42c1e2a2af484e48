pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod service;
pub mod store;
pub mod view;

pub use config::{AppConfig, BackendKind};
pub use error::{StoreError, StoreResult};
pub use model::*;
pub use service::{TaskflowService, ViewSnapshot};
pub use store::{BatchOutcome, CategoryStore, RecordFailure, TaskStore};
