pub mod clock;
pub mod config;
pub mod csv_recorder;
pub mod outbox;
pub mod recorder;
pub mod session;

pub use clock::{AlwaysOpen, MarketClock, SessionClock};
pub use config::{ScanConfig, SessionConfig};
pub use csv_recorder::CsvRecorder;
pub use outbox::Outbox;
pub use recorder::SqliteRecorder;
pub use session::{Session, SessionHandle, SessionReport, StopReason, TickReport};
