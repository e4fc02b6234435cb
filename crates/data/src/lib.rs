//! Persistence gateway and export helpers.
//!
//! [`DatabaseClient`] implements the [`SnapshotStore`] contract against
//! Postgres; [`MemoryStore`] is the in-process double used by tests. The
//! `export` module writes collected price points to CSV.
//!
//! [`SnapshotStore`]: arb_collect_core::SnapshotStore

pub mod database;
pub mod export;
pub mod memory;

pub use database::DatabaseClient;
pub use export::{generate_csv_filename, validate_query_params, write_price_csv};
pub use memory::MemoryStore;
