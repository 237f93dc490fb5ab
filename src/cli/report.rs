//! `report` command.

use super::{build_service, to_json};
use crate::Result;
use crate::config::ClassbookConfig;
use crate::models::{ReportKind, ReportRequest};
use crate::security::CallContext;
use std::collections::HashMap;

/// Arguments of the report command.
///
/// Filters are passed through the same query-parameter parsing the HTTP
/// adapter uses, so both surfaces accept the same values.
#[derive(Debug, Clone, Default)]
pub struct ReportArgs {
    /// Report kind, e.g. `class-performance` or a legacy alias.
    pub kind: String,
    /// Class filter.
    pub class_id: Option<i64>,
    /// Subject filter.
    pub subject: Option<String>,
    /// Bimester filter.
    pub bimester: Option<i64>,
    /// Student filter; required for `report-card`.
    pub student_id: Option<i64>,
    /// Exact date filter, `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Month filter, `YYYY-MM`.
    pub month: Option<String>,
    /// Ranking mode.
    pub mode: Option<String>,
    /// Ranking size.
    pub limit: Option<String>,
    /// Caller user id.
    pub user_id: Option<String>,
    /// Caller role.
    pub role: Option<String>,
}

impl ReportArgs {
    /// Creates arguments for a report kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn as_caller(mut self, user_id: impl Into<String>, role: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.role = Some(role.into());
        self
    }

    fn query(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                params.insert(key.to_string(), value);
            }
        };
        put("class_id", self.class_id.map(|v| v.to_string()));
        put("subject", self.subject.clone());
        put("bimester", self.bimester.map(|v| v.to_string()));
        put("student_id", self.student_id.map(|v| v.to_string()));
        put("date", self.date.clone());
        put("month", self.month.clone());
        put("mode", self.mode.clone());
        put("limit", self.limit.clone());
        params
    }
}

/// Generates a report and renders it as JSON.
///
/// # Errors
///
/// Returns an error for an unknown kind, invalid filters, a rejected call or
/// a storage failure.
pub fn cmd_report(config: &ClassbookConfig, args: &ReportArgs) -> Result<String> {
    let kind = ReportKind::parse(&args.kind)?;
    let request = ReportRequest::from_query(kind, &args.query(), config.reports.default_rank_limit)?;

    let service = build_service(config)?;
    let mut ctx = CallContext::new(args.user_id.as_deref(), args.role.as_deref());
    let report = service.report(&mut ctx, &request)?;
    to_json(&report)
}
