//! SQL filter clause construction.
//!
//! Clauses use numbered parameters (`?1`, `?2`, ...) and return their bound
//! values alongside, ready for `params_from_iter`.

use crate::models::{AttendanceFilter, RecordFilter};
use rusqlite::types::Value;

/// A `WHERE` clause (empty when nothing is filtered) plus its bound values.
#[derive(Debug, Default, PartialEq)]
pub struct FilterClause {
    /// The clause text, starting with ` WHERE` when non-empty.
    pub sql: String,
    /// Values bound to the numbered parameters, in order.
    pub params: Vec<Value>,
}

impl FilterClause {
    fn from_conditions(conditions: Vec<String>, params: Vec<Value>) -> Self {
        let sql = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        Self { sql, params }
    }
}

/// Builds the grade clause for the fields a grade row carries itself.
///
/// Class and student need the enrollment join and are not included.
#[must_use]
pub fn grade_filter_clause(filter: &RecordFilter) -> FilterClause {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(subject) = &filter.subject {
        params.push(Value::Text(subject.clone()));
        conditions.push(format!("disciplina = ?{}", params.len()));
    }
    if let Some(bimester) = filter.bimester {
        params.push(Value::Integer(bimester));
        conditions.push(format!("bimestre = ?{}", params.len()));
    }

    FilterClause::from_conditions(conditions, params)
}

/// Builds the attendance clause for the date and month fields.
#[must_use]
pub fn attendance_filter_clause(filter: &AttendanceFilter) -> FilterClause {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(date) = filter.date {
        params.push(Value::Text(date.format("%Y-%m-%d").to_string()));
        conditions.push(format!("data = ?{}", params.len()));
    }
    if let Some(prefix) = filter.month_prefix() {
        params.push(Value::Text(prefix));
        conditions.push(format!("strftime('%Y-%m', data) = ?{}", params.len()));
    }

    FilterClause::from_conditions(conditions, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_filter_has_no_clause() {
        assert_eq!(grade_filter_clause(&RecordFilter::new()), FilterClause::default());
        assert_eq!(
            attendance_filter_clause(&AttendanceFilter::new()),
            FilterClause::default()
        );
    }

    #[test]
    fn test_grade_clause_numbers_params() {
        let clause = grade_filter_clause(
            &RecordFilter::new()
                .with_subject("Math")
                .with_bimester(2)
                .with_class(9),
        );
        assert_eq!(clause.sql, " WHERE disciplina = ?1 AND bimestre = ?2");
        assert_eq!(
            clause.params,
            vec![Value::Text("Math".to_string()), Value::Integer(2)]
        );
    }

    #[test]
    fn test_attendance_clause() {
        let clause = attendance_filter_clause(
            &AttendanceFilter::new()
                .with_date(NaiveDate::from_ymd_opt(2024, 3, 11).unwrap())
                .with_month(2024, 3),
        );
        assert_eq!(
            clause.sql,
            " WHERE data = ?1 AND strftime('%Y-%m', data) = ?2"
        );
        assert_eq!(clause.params[1], Value::Text("2024-03".to_string()));
    }
}
