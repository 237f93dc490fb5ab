//! `authorize` command.

use super::to_json;
use crate::Result;
use crate::config::ClassbookConfig;
use crate::security::AuthorizationGuard;
use std::sync::Arc;

/// Answers `authorize(role, capability)` against the configured table.
///
/// Needs no database.
///
/// # Errors
///
/// Returns an error if the configured role overrides are invalid.
pub fn cmd_authorize(config: &ClassbookConfig, role: &str, capability: &str) -> Result<String> {
    let guard = AuthorizationGuard::new(Arc::new(config.role_table()?));
    to_json(&guard.evaluate(role, capability))
}
