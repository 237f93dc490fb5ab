//! # Classbook
//!
//! Role-gated school records core with grade and attendance analytics.
//!
//! Classbook sits between a CRUD/HTTP layer and the school database. Every
//! call carries the caller's claimed identity and role; the authorization
//! pipeline decides whether the call may proceed, and report calls are then
//! answered by joining enrollments, grades and attendance into analytics.
//!
//! ## Features
//!
//! - Immutable role -> capability table with the `admin`/`diretor` bypass
//! - Composable identity + capability pipeline over a per-call context
//! - Grade classification (approved / recovery / failed) and attendance rates
//! - Subject, class and bimester aggregates plus student rankings
//! - `SQLite` record store with a unique grade index and atomic batch attendance
//!
//! ## Example
//!
//! ```rust,ignore
//! use classbook::{CallContext, ClassbookService, ReportRequest, RoleCapabilityTable};
//! use classbook::storage::SqliteRecordStore;
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteRecordStore::new("escola.db")?);
//! let service = ClassbookService::new(Arc::new(RoleCapabilityTable::standard()), store);
//!
//! let mut ctx = CallContext::new(Some("42"), Some("coordenador"));
//! let report = service.report(&mut ctx, &ReportRequest::SubjectPerformance(Default::default()))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
#[cfg(feature = "http")]
pub mod http;
pub mod models;
pub mod observability;
pub mod security;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::ClassbookConfig;
pub use models::{
    AttendanceBatch, AttendanceFilter, GradeClass, NewGrade, RankMode, RecordFilter, Report,
    ReportKind, ReportRequest,
};
pub use security::{
    AuthorizationGuard, AuthorizationOutcome, CallContext, Capability, Decision, Operation,
    Pipeline, Role, RoleCapabilityTable,
};
pub use services::analytics::{approval_rate, attendance_rate, average_grade, classify_grade};
pub use services::{AcademicRecordView, ClassbookService, ReportAssembler};
pub use storage::{RecordStore, SqliteRecordStore};

/// Error type for classbook operations.
///
/// The first five variants are the domain failure kinds the transport layer
/// must keep apart; see [`Error::kind`] and [`Error::http_status`].
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Unauthenticated` | Identity or role missing on a gated operation |
/// | `Forbidden` | Role lacks the required capability |
/// | `InvalidInput` | Malformed filter or report parameters, bad config values |
/// | `NotFound` | Referenced student, class or enrollment is absent |
/// | `Conflict` | Duplicate grade for (enrollment, subject, bimester) |
/// | `OperationFailed` | `SQLite` or filesystem failures |
/// | `FeatureNotEnabled` | Using a transport compiled out by feature flags |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The call carried no identity or no role.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// The caller's role does not hold the required capability.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A numeric filter or limit is not a number
    /// - A report kind or rank mode is unknown
    /// - A grade value is not finite
    /// - A batch attendance entry names an enrollment outside the class
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness rule was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

/// Coarse classification of an [`Error`], stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Unauthenticated`].
    Unauthenticated,
    /// See [`Error::Forbidden`].
    Forbidden,
    /// See [`Error::InvalidInput`].
    Validation,
    /// See [`Error::NotFound`].
    NotFound,
    /// See [`Error::Conflict`].
    Conflict,
    /// Storage, IO or feature failures.
    Internal,
}

impl ErrorKind {
    /// Returns the snake-case label used in logs and response bodies.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::Validation => "validation_error",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl Error {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::InvalidInput(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::OperationFailed { .. } | Self::FeatureNotEnabled(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code a transport should answer with.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal => 500,
        }
    }
}

/// Result type alias for classbook operations.
pub type Result<T> = std::result::Result<T, Error>;
