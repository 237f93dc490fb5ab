//! Storage layer.
//!
//! [`RecordStore`] is the collaborator the services read from and write to;
//! [`SqliteRecordStore`] is the `SQLite` implementation.

// Dropping the connection guard slightly earlier buys nothing here.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteRecordStore;
pub use traits::RecordStore;
