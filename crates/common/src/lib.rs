pub mod config;
pub mod error;
pub mod recorder;
pub mod source;
pub mod types;

pub use config::{Config, FeedMode};
pub use error::{Error, Result};
pub use recorder::{MemoryRecorder, OutcomeRecorder};
pub use source::SnapshotSource;
pub use types::*;
