//! Filters over grade and attendance records.
//!
//! Every field is optional and fields combine with AND semantics. Filters can
//! be built programmatically or parsed from query-string style maps, where
//! both the English keys and the legacy Portuguese keys are accepted.

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

/// Filter for grade queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Restrict to one class.
    pub class_id: Option<i64>,
    /// Restrict to one subject (exact match).
    pub subject: Option<String>,
    /// Restrict to one bimester.
    pub bimester: Option<i64>,
    /// Restrict to one student.
    pub student_id: Option<i64>,
}

impl RecordFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            class_id: None,
            subject: None,
            bimester: None,
            student_id: None,
        }
    }

    /// Restricts to a class.
    #[must_use]
    pub const fn with_class(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Restricts to a subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Restricts to a bimester.
    #[must_use]
    pub const fn with_bimester(mut self, bimester: i64) -> Self {
        self.bimester = Some(bimester);
        self
    }

    /// Restricts to a student.
    #[must_use]
    pub const fn with_student(mut self, student_id: i64) -> Self {
        self.student_id = Some(student_id);
        self
    }

    /// Returns true if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.class_id.is_none()
            && self.subject.is_none()
            && self.bimester.is_none()
            && self.student_id.is_none()
    }

    /// Returns true if an enrollment's class and student pass the filter.
    #[must_use]
    pub fn admits_enrollment(&self, class_id: i64, student_id: i64) -> bool {
        self.class_id.is_none_or(|id| id == class_id)
            && self.student_id.is_none_or(|id| id == student_id)
    }

    /// Returns true if a grade's subject and bimester pass the filter.
    #[must_use]
    pub fn admits_grade(&self, subject: &str, bimester: i64) -> bool {
        self.subject.as_deref().is_none_or(|s| s == subject)
            && self.bimester.is_none_or(|b| b == bimester)
    }

    /// Parses a filter from query parameters.
    ///
    /// Recognized keys: `class_id`/`turma_id`, `subject`/`disciplina`,
    /// `bimester`/`bimestre`, `student_id`/`aluno_id`. Empty values are
    /// treated as absent; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a numeric field is not a number.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            class_id: parse_id(params, &["class_id", "turma_id"])?,
            subject: lookup(params, &["subject", "disciplina"]).map(str::to_string),
            bimester: parse_id(params, &["bimester", "bimestre"])?,
            student_id: parse_id(params, &["student_id", "aluno_id"])?,
        })
    }
}

/// Filter for attendance queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    /// Restrict to one class.
    pub class_id: Option<i64>,
    /// Restrict to one student.
    pub student_id: Option<i64>,
    /// Restrict to one lesson date.
    pub date: Option<NaiveDate>,
    /// Restrict to one calendar month, as `(year, month)`.
    pub month: Option<(i32, u32)>,
}

impl AttendanceFilter {
    /// Creates an empty filter (matches all).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            class_id: None,
            student_id: None,
            date: None,
            month: None,
        }
    }

    /// Restricts to a class.
    #[must_use]
    pub const fn with_class(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Restricts to a student.
    #[must_use]
    pub const fn with_student(mut self, student_id: i64) -> Self {
        self.student_id = Some(student_id);
        self
    }

    /// Restricts to a date.
    #[must_use]
    pub const fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Restricts to a month.
    #[must_use]
    pub const fn with_month(mut self, year: i32, month: u32) -> Self {
        self.month = Some((year, month));
        self
    }

    /// Returns the month as stored-date prefix (`YYYY-MM`).
    #[must_use]
    pub fn month_prefix(&self) -> Option<String> {
        self.month.map(|(year, month)| format!("{year:04}-{month:02}"))
    }

    /// Returns true if an enrollment's class and student pass the filter.
    #[must_use]
    pub fn admits_enrollment(&self, class_id: i64, student_id: i64) -> bool {
        self.class_id.is_none_or(|id| id == class_id)
            && self.student_id.is_none_or(|id| id == student_id)
    }

    /// Returns true if a lesson date passes the filter.
    #[must_use]
    pub fn admits_date(&self, date: NaiveDate) -> bool {
        self.date.is_none_or(|d| d == date)
            && self
                .month
                .is_none_or(|(year, month)| date.year() == year && date.month() == month)
    }

    /// Parses a filter from query parameters.
    ///
    /// Recognized keys: `class_id`/`turma_id`, `student_id`/`aluno_id`,
    /// `date`/`data` (`YYYY-MM-DD`), `month`/`mes` (`YYYY-MM`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for non-numeric ids or malformed dates.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self> {
        let date = lookup(params, &["date", "data"]).map(parse_date).transpose()?;
        let month = lookup(params, &["month", "mes"])
            .map(parse_month)
            .transpose()?;

        Ok(Self {
            class_id: parse_id(params, &["class_id", "turma_id"])?,
            student_id: parse_id(params, &["student_id", "aluno_id"])?,
            date,
            month,
        })
    }
}

/// Parses a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not a calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("date must be YYYY-MM-DD, got '{value}'")))
}

fn parse_month(value: &str) -> Result<(i32, u32)> {
    let first = format!("{}-01", value.trim());
    NaiveDate::parse_from_str(&first, "%Y-%m-%d")
        .map(|date| (date.year(), date.month()))
        .map_err(|_| Error::InvalidInput(format!("month must be YYYY-MM, got '{value}'")))
}

fn lookup<'a>(params: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn parse_id(params: &HashMap<String, String>, keys: &[&str]) -> Result<Option<i64>> {
    lookup(params, keys)
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|_| Error::InvalidInput(format!("{} must be numeric, got '{value}'", keys[0])))
        })
        .transpose()
}
