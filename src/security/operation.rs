//! Operation catalog and gate set.

use super::rbac::Capability;
use crate::models::ReportKind;
use std::fmt;

/// Operations the core exposes to its transport collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Generate a report.
    Report(ReportKind),
    /// Read the roll-call sheet of a class for one date.
    AttendanceSheet,
    /// Create a student.
    CreateStudent,
    /// Delete a student (enrollments are left in place).
    DeleteStudent,
    /// Create a teacher.
    CreateTeacher,
    /// Create a class.
    CreateClass,
    /// Delete a class (enrollments are left in place).
    DeleteClass,
    /// Enroll a student in a class.
    CreateEnrollment,
    /// Record a grade.
    CreateGrade,
    /// Record a single attendance mark.
    RecordAttendance,
    /// Replace the attendance of a class for one date.
    ReplaceAttendance,
}

impl Operation {
    /// Returns the capability this operation is gated by.
    ///
    /// Every operation is gated by the catalog entry for the data it reads
    /// or writes.
    #[must_use]
    pub const fn required_capability(&self) -> Capability {
        match self {
            Self::Report(kind) => kind.required_capability(),
            Self::AttendanceSheet => Capability::ViewAttendance,
            Self::CreateStudent => Capability::CreateStudents,
            Self::DeleteStudent => Capability::DeleteStudents,
            Self::CreateTeacher => Capability::CreateTeachers,
            Self::CreateClass => Capability::CreateClasses,
            Self::DeleteClass => Capability::DeleteClasses,
            Self::CreateEnrollment => Capability::CreateEnrollments,
            Self::CreateGrade => Capability::CreateGrades,
            Self::RecordAttendance | Self::ReplaceAttendance => Capability::CreateAttendance,
        }
    }

    /// Returns true if the operation writes to the store.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Report(_) | Self::AttendanceSheet)
    }

    /// Returns a stable name for logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Report(kind) => kind.as_str(),
            Self::AttendanceSheet => "attendance_sheet",
            Self::CreateStudent => "create_student",
            Self::DeleteStudent => "delete_student",
            Self::CreateTeacher => "create_teacher",
            Self::CreateClass => "create_class",
            Self::DeleteClass => "delete_class",
            Self::CreateEnrollment => "create_enrollment",
            Self::CreateGrade => "create_grade",
            Self::RecordAttendance => "record_attendance",
            Self::ReplaceAttendance => "replace_attendance",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
