//! Record store trait.

use crate::Result;
use crate::models::{
    AttendanceBatch, AttendanceFilter, AttendanceRecord, Enrollment, GradeRecord, NewAttendance,
    NewClass, NewEnrollment, NewGrade, NewStudent, NewTeacher, RecordFilter, SchoolClass, Student,
    Teacher,
};

/// Trait for school record stores.
///
/// The store is the authoritative source for every record the analytics read.
/// Reads return raw rows; joining through enrollments is the caller's job.
/// Implementations enforce two rules themselves:
///
/// - at most one grade per (enrollment, subject, bimester), violations are
///   `Conflict` even under concurrent writers;
/// - replacing a class's attendance for a date is all-or-nothing.
pub trait RecordStore: Send + Sync {
    /// Lists all students.
    fn students(&self) -> Result<Vec<Student>>;

    /// Retrieves a student by id.
    fn student(&self, id: i64) -> Result<Option<Student>>;

    /// Lists all teachers.
    fn teachers(&self) -> Result<Vec<Teacher>>;

    /// Lists all classes.
    fn classes(&self) -> Result<Vec<SchoolClass>>;

    /// Lists all enrollments.
    fn enrollments(&self) -> Result<Vec<Enrollment>>;

    /// Lists grades. Only the subject and bimester fields of the filter apply
    /// here; class and student need the enrollment join.
    fn grades(&self, filter: &RecordFilter) -> Result<Vec<GradeRecord>>;

    /// Lists attendance marks. Only the date and month fields of the filter
    /// apply here.
    fn attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>>;

    /// Creates a student and returns its id.
    fn create_student(&self, student: &NewStudent) -> Result<i64>;

    /// Creates a teacher and returns its id.
    fn create_teacher(&self, teacher: &NewTeacher) -> Result<i64>;

    /// Creates a class and returns its id.
    fn create_class(&self, class: &NewClass) -> Result<i64>;

    /// Enrolls a student; `NotFound` if the student or class is absent.
    fn create_enrollment(&self, enrollment: &NewEnrollment) -> Result<i64>;

    /// Records a grade; `NotFound` for a missing enrollment, `Conflict` for a
    /// duplicate (enrollment, subject, bimester).
    fn create_grade(&self, grade: &NewGrade) -> Result<i64>;

    /// Records one attendance mark; `NotFound` for a missing enrollment.
    fn record_attendance(&self, mark: &NewAttendance) -> Result<i64>;

    /// Replaces every mark of a class for a date with the batch, atomically.
    /// Returns the number of marks written.
    fn replace_class_attendance(&self, batch: &AttendanceBatch) -> Result<usize>;

    /// Deletes a student. Enrollments, grades and attendance are left in place.
    fn delete_student(&self, id: i64) -> Result<bool>;

    /// Deletes a class. Enrollments, grades and attendance are left in place.
    fn delete_class(&self, id: i64) -> Result<bool>;
}
