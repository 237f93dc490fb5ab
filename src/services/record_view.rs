//! Read-only joined projection over the record store.
//!
//! Grades and attendance reference enrollments, which reference a student
//! and a class. Rows whose chain is broken (a deleted student or class, a
//! missing enrollment) are orphans: they are dropped from every projection
//! and never raise an error.

use crate::Result;
use crate::models::{
    AttendanceFilter, Enrollment, RecordFilter, SchoolClass, Student, Teacher,
};
use crate::storage::RecordStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// A grade joined through its enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeTuple {
    /// Grade row id.
    pub grade_id: i64,
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Student.
    pub student_id: i64,
    /// Class.
    pub class_id: i64,
    /// Subject.
    pub subject: String,
    /// Grade value.
    pub grade: f64,
    /// Bimester.
    pub bimester: i64,
}

/// An attendance mark joined through its enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceTuple {
    /// Attendance row id.
    pub attendance_id: i64,
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Student.
    pub student_id: i64,
    /// Class.
    pub class_id: i64,
    /// Lesson date.
    pub date: NaiveDate,
    /// Presence flag.
    pub present: bool,
}

/// An enrollment of an existing student in an active class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry {
    /// Class.
    pub class_id: i64,
    /// Enrollment.
    pub enrollment_id: i64,
    /// Student.
    pub student_id: i64,
    /// Whether the enrollment itself is active.
    pub active: bool,
}

/// Snapshot of the students, classes and enrollments used to resolve joins
/// and display names.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    students: HashMap<i64, Student>,
    classes: HashMap<i64, SchoolClass>,
    enrollments: HashMap<i64, Enrollment>,
    enrollment_order: Vec<i64>,
}

impl Directory {
    /// Builds a directory from raw rows.
    #[must_use]
    pub fn new(students: Vec<Student>, classes: Vec<SchoolClass>, enrollments: Vec<Enrollment>) -> Self {
        let enrollment_order = enrollments.iter().map(|e| e.id).collect();
        Self {
            students: students.into_iter().map(|s| (s.id, s)).collect(),
            classes: classes.into_iter().map(|c| (c.id, c)).collect(),
            enrollments: enrollments.into_iter().map(|e| (e.id, e)).collect(),
            enrollment_order,
        }
    }

    /// Returns a student.
    #[must_use]
    pub fn student(&self, id: i64) -> Option<&Student> {
        self.students.get(&id)
    }

    /// Returns a class.
    #[must_use]
    pub fn class(&self, id: i64) -> Option<&SchoolClass> {
        self.classes.get(&id)
    }

    /// Returns a student's name, empty when unknown.
    #[must_use]
    pub fn student_name(&self, id: i64) -> &str {
        self.student(id).map_or("", |s| s.name.as_str())
    }

    /// Returns a class's name, empty when unknown.
    #[must_use]
    pub fn class_name(&self, id: i64) -> &str {
        self.class(id).map_or("", |c| c.name.as_str())
    }

    /// Iterates over all students.
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }

    /// Iterates over all classes.
    pub fn classes(&self) -> impl Iterator<Item = &SchoolClass> {
        self.classes.values()
    }

    /// Enrollments of a class in enrollment id order.
    pub fn enrollments_of(&self, class_id: i64) -> impl Iterator<Item = &Enrollment> {
        self.enrollment_order
            .iter()
            .filter_map(|id| self.enrollments.get(id))
            .filter(move |e| e.class_id == class_id)
    }

    /// Resolves an enrollment to `(student_id, class_id)` when the whole
    /// chain exists.
    fn resolve(&self, enrollment_id: i64) -> Option<(i64, i64)> {
        let enrollment = self.enrollments.get(&enrollment_id)?;
        (self.students.contains_key(&enrollment.student_id)
            && self.classes.contains_key(&enrollment.class_id))
        .then_some((enrollment.student_id, enrollment.class_id))
    }

    /// Enrollments of existing students in active classes, in enrollment id
    /// order, restricted by `admits(class_id, student_id)`.
    #[must_use]
    pub fn rosters(&self, admits: impl Fn(i64, i64) -> bool) -> Vec<RosterEntry> {
        self.enrollment_order
            .iter()
            .filter_map(|id| self.enrollments.get(id))
            .filter(|e| self.students.contains_key(&e.student_id))
            .filter(|e| self.classes.get(&e.class_id).is_some_and(SchoolClass::is_active))
            .filter(|e| admits(e.class_id, e.student_id))
            .map(|e| RosterEntry {
                class_id: e.class_id,
                enrollment_id: e.id,
                student_id: e.student_id,
                active: e.is_active(),
            })
            .collect()
    }
}

/// Joined, read-only view over a [`RecordStore`].
#[derive(Clone)]
pub struct AcademicRecordView {
    store: Arc<dyn RecordStore>,
}

impl AcademicRecordView {
    /// Creates a view over a store.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Loads the directory snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn directory(&self) -> Result<Directory> {
        Ok(Directory::new(
            self.store.students()?,
            self.store.classes()?,
            self.store.enrollments()?,
        ))
    }

    /// Lists teachers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn teachers(&self) -> Result<Vec<Teacher>> {
        self.store.teachers()
    }

    /// Grade tuples matching the filter, in store order, orphans excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn grade_tuples(&self, directory: &Directory, filter: &RecordFilter) -> Result<Vec<GradeTuple>> {
        let grades = self.store.grades(filter)?;
        let total = grades.len();

        let tuples: Vec<GradeTuple> = grades
            .into_iter()
            .filter(|g| filter.admits_grade(&g.subject, g.bimester))
            .filter_map(|g| {
                let (student_id, class_id) = directory.resolve(g.enrollment_id)?;
                filter
                    .admits_enrollment(class_id, student_id)
                    .then(|| GradeTuple {
                        grade_id: g.id,
                        enrollment_id: g.enrollment_id,
                        student_id,
                        class_id,
                        subject: g.subject,
                        grade: g.grade,
                        bimester: g.bimester,
                    })
            })
            .collect();

        tracing::debug!(fetched = total, kept = tuples.len(), "Joined grade tuples");
        Ok(tuples)
    }

    /// Attendance tuples matching the filter, in store order, orphans excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn attendance_tuples(
        &self,
        directory: &Directory,
        filter: &AttendanceFilter,
    ) -> Result<Vec<AttendanceTuple>> {
        let marks = self.store.attendance(filter)?;
        let total = marks.len();

        let tuples: Vec<AttendanceTuple> = marks
            .into_iter()
            .filter(|m| filter.admits_date(m.date))
            .filter_map(|m| {
                let (student_id, class_id) = directory.resolve(m.enrollment_id)?;
                filter
                    .admits_enrollment(class_id, student_id)
                    .then_some(AttendanceTuple {
                        attendance_id: m.id,
                        enrollment_id: m.enrollment_id,
                        student_id,
                        class_id,
                        date: m.date,
                        present: m.present,
                    })
            })
            .collect();

        tracing::debug!(fetched = total, kept = tuples.len(), "Joined attendance tuples");
        Ok(tuples)
    }
}

impl std::fmt::Debug for AcademicRecordView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcademicRecordView").finish_non_exhaustive()
    }
}
