//! `SQLite` record store and its helpers.
//!
//! - [`connection`]: mutex acquisition, pragmas, error mapping
//! - [`schema`]: table and index creation
//! - [`sql`]: filter clause construction
//! - [`metrics`]: per-operation metrics
//! - [`store`]: the [`SqliteRecordStore`] itself

mod connection;
mod metrics;
mod schema;
mod sql;
mod store;

pub use connection::{acquire_lock, configure_connection, map_sqlite_error};
pub use metrics::record_operation_metrics;
pub use schema::ensure_schema;
pub use sql::{FilterClause, attendance_filter_clause, grade_filter_clause};
pub use store::SqliteRecordStore;
