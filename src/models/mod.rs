//! Data models for classbook.
//!
//! Persisted records, query filters and report shapes.

mod filter;
mod records;
mod reports;

pub use filter::{AttendanceFilter, RecordFilter, parse_date};
pub use records::{
    ACTIVE_GROUP, ACTIVE_PERSON, AttendanceBatch, AttendanceEntry, AttendanceRecord, Enrollment,
    GradeRecord, NewAttendance, NewClass, NewEnrollment, NewGrade, NewStudent, NewTeacher,
    SchoolClass, Student, Teacher,
};
pub use reports::{
    AttendanceOverview, AttendanceSheetEntry, BimesterEvolution, ClassAttendance,
    ClassPerformance, GradeClass, GradeOverview, GradeReportRow, HeadCounts, OverviewReport,
    RankMode, RankingEntry, Report, ReportCard, ReportCardGrade, ReportKind, ReportRequest,
    SubjectPerformance,
};
