pub mod duckdb;
pub mod elasticsearch;
pub mod traits;

pub use traits::{open_sink, BulkSummary, Sink, StorageError};
