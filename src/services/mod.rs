//! Academic services.
//!
//! - [`record_view`]: joined read-only projection over the store
//! - [`analytics`]: pure computation over joined tuples
//! - [`ReportAssembler`]: shapes engine output into report rows
//! - [`ClassbookService`]: the authorized facade used by transports

pub mod analytics;
mod classbook;
pub mod record_view;
mod reports;

pub use classbook::ClassbookService;
pub use record_view::{AcademicRecordView, AttendanceTuple, Directory, GradeTuple, RosterEntry};
pub use reports::ReportAssembler;
