//! `sheet` command: the roll-call sheet of a class.

use super::{build_service, to_json};
use crate::Result;
use crate::config::ClassbookConfig;
use crate::models::parse_date;
use crate::security::CallContext;

/// Prints a class's roll-call sheet for a date as JSON.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidInput`] for a malformed date,
/// [`crate::Error::NotFound`] for an unknown class, an authorization error
/// when the caller lacks `view_frequencia`, or a storage error.
pub fn cmd_sheet(
    config: &ClassbookConfig,
    ctx: &mut CallContext,
    class_id: i64,
    date: &str,
) -> Result<String> {
    let date = parse_date(date)?;
    let service = build_service(config)?;
    let sheet = service.attendance_sheet(ctx, class_id, date)?;
    to_json(&sheet)
}
