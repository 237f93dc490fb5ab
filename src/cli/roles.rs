//! `roles` command: prints the effective role table.

use super::to_json;
use crate::config::ClassbookConfig;
use crate::security::RoleSummary;
use crate::{Error, Result};
use std::fmt::Write;
use std::str::FromStr;

/// Output format for the roles command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RolesOutputFormat {
    /// Table format (default).
    #[default]
    Table,
    /// JSON format.
    Json,
}

impl FromStr for RolesOutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Table,
        })
    }
}

/// Renders the role summary as a table.
///
/// Bypass roles show `*` instead of their listed capabilities.
#[must_use]
pub fn write_table(summary: &[RoleSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<14}CAPABILITIES", "ROLE");
    for entry in summary {
        let capabilities = if entry.bypass {
            "*".to_string()
        } else {
            entry
                .capabilities
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(out, "{:<14}{capabilities}", entry.role.as_str());
    }
    out
}

/// Renders the role summary as JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn write_json(summary: &[RoleSummary]) -> Result<String> {
    to_json(&summary)
}

/// Executes the roles command.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the configured overrides are invalid.
pub fn cmd_roles(config: &ClassbookConfig, format: RolesOutputFormat) -> Result<String> {
    let table = config.role_table().map_err(|e| match e {
        Error::InvalidInput(msg) => Error::InvalidInput(format!("role overrides: {msg}")),
        other => other,
    })?;
    let summary = table.summary();

    match format {
        RolesOutputFormat::Table => Ok(write_table(&summary)),
        RolesOutputFormat::Json => write_json(&summary),
    }
}
