pub mod config;
pub mod manager;
pub mod summary;

pub use config::PositionConfig;
pub use manager::{exit_reason, PositionManager};
pub use summary::{PnlSummary, PositionMark};
