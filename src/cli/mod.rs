//! CLI command implementations.
//!
//! Each submodule implements one command. Commands return their output as a
//! string so the binary decides where it goes.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `authorize` | Answer whether a role holds a capability |
//! | `roles` | Print the effective role table |
//! | `report` | Generate a report as JSON |
//! | `sheet` | Print a class's roll-call sheet for a date |
//! | `serve` | Run the HTTP adapter (feature `http`) |
//!
//! # Example Usage
//!
//! ```bash
//! classbook authorize professor create_notas
//! classbook report class-performance --role coordenador --user-id 7
//! classbook report ranking --mode at_risk --limit 5 --role diretor --user-id 1
//! ```

mod authorize;
mod report;
mod roles;
mod serve;
mod sheet;

pub use authorize::cmd_authorize;
pub use report::{ReportArgs, cmd_report};
pub use roles::{RolesOutputFormat, cmd_roles, write_json, write_table};
pub use serve::cmd_serve;
pub use sheet::cmd_sheet;

use crate::config::ClassbookConfig;
use crate::services::ClassbookService;
use crate::storage::{RecordStore, SqliteRecordStore};
use crate::{Error, Result};
use std::sync::Arc;

/// Opens the configured database and builds the service.
///
/// # Errors
///
/// Returns an error if the role overrides are invalid or the database cannot
/// be opened.
pub fn build_service(config: &ClassbookConfig) -> Result<ClassbookService> {
    let table = Arc::new(config.role_table()?);
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(config.database.clone())?);
    tracing::debug!(database = %config.database.display(), "Opened record store");
    Ok(ClassbookService::new(table, store))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })
}
