//! Checkpoint persistence.
//!
//! - **CheckpointStore**: SQLite file with the accepted results (one row per
//!   category, last write wins) and the append-only failure log
//! - **StatusSnapshot**: JSON progress file replaced atomically on each checkpoint
//! - **Migrations**: upgrade of older record layouts at load time
//!
//! # Usage
//!
//! ```rust,ignore
//! use product_forge::storage::CheckpointStore;
//!
//! let store = CheckpointStore::open("output/checkpoint.db").await?;
//! store.upsert_accepted(&result).await?;
//! let done = store.accepted_paths().await?;
//! ```

pub mod checkpoint;
pub mod migrations;
pub mod schema;
pub mod status;

pub use checkpoint::{CheckpointStore, FailedAttempt, StoreCounts};
pub use migrations::upgrade_record;
pub use status::{read_snapshot, write_snapshot, StatusSnapshot};
