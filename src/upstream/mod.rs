pub mod models;
pub mod service;

pub use models::{AccountGroup, AccountInfo, RecordInfo, StatusUpdateOutcome};
pub use service::UpstreamService;
