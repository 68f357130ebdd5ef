//! # Persistence
//!
//! Best-effort local persistence of ingested samples.
//!
//! 负责：
//! - Threshold buffering inside each driver (`PersistenceBuffer`)
//! - Append-only CSV file per device class (`CsvStore`)
//! - Isolated worker queue so disk I/O never blocks ingestion (`StoreHandle`)

pub mod buffer;
pub mod csv_store;
pub mod error;
pub mod handle;
pub mod metrics;

pub use buffer::PersistenceBuffer;
pub use contracts::SampleStore;
pub use csv_store::{CsvStore, CSV_HEADER};
pub use error::PersistenceError;
pub use handle::{channel, StoreHandle, StoreSender};
pub use metrics::{MetricsSnapshot, StoreMetrics};
