pub mod config;
pub mod detector;
pub mod ranker;

pub use config::SignalConfig;
pub use detector::{Screen, SignalDetector, SkipReason};
pub use ranker::{rank, Ranker};
