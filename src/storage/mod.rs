pub mod duckdb;
pub mod traits;

pub use self::duckdb::DuckDbStore;
pub use traits::{
    Batch, BatchClaim, NewBatch, NewRecord, Record, RecordFilter, RecordStore, StorageError,
};
