pub mod baseline;
pub mod config;
pub mod history;
pub mod kite;
pub mod rest;
pub mod snapshot_file;
pub mod universe;

#[cfg(test)]
mod test_http;

pub use baseline::BaselineVolumes;
pub use config::{FeedConfig, ReferencePrice};
pub use history::KiteHistory;
pub use kite::KiteQuoteSource;
pub use rest::KiteRest;
pub use snapshot_file::{save_snapshot, SnapshotFileSource};
pub use universe::load_universe;
