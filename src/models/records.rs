//! Persisted school records and their creation inputs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Status stored for an active student or teacher.
pub const ACTIVE_PERSON: &str = "ativo";

/// Status stored for an active class or enrollment.
pub const ACTIVE_GROUP: &str = "ativa";

/// A student (`alunos`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    /// Row id.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Tax id.
    pub cpf: Option<String>,
    /// Birth date as stored.
    pub birth_date: Option<String>,
    /// Status (`ativo` when active).
    pub status: String,
}

impl Student {
    /// Returns true if the student is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_PERSON
    }
}

/// A teacher (`professores`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    /// Row id.
    pub id: i64,
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Tax id.
    pub cpf: Option<String>,
    /// Subject area.
    pub specialization: Option<String>,
    /// Status (`ativo` when active).
    pub status: String,
}

impl Teacher {
    /// Returns true if the teacher is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_PERSON
    }
}

/// A class (`turmas`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    /// Row id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// School year as stored (`2024`, `1º ano`, ...).
    pub year: Option<String>,
    /// Shift (morning, afternoon, ...).
    pub shift: Option<String>,
    /// Homeroom teacher.
    pub teacher_id: Option<i64>,
    /// Status (`ativa` when active).
    pub status: String,
}

impl SchoolClass {
    /// Returns true if the class is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_GROUP
    }
}

/// An enrollment of a student in a class (`matriculas`).
///
/// Duplicate (student, class) pairs are independent records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    /// Row id.
    pub id: i64,
    /// Enrolled student.
    pub student_id: i64,
    /// Class enrolled in.
    pub class_id: i64,
    /// Status (`ativa` when active).
    pub status: String,
}

impl Enrollment {
    /// Returns true if the enrollment is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_GROUP
    }
}

/// A grade (`notas`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    /// Row id.
    pub id: i64,
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Free-text subject.
    pub subject: String,
    /// Grade value.
    pub grade: f64,
    /// Bimester, 1 to 4 by convention.
    pub bimester: i64,
}

/// An attendance mark (`frequencia`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    /// Row id.
    pub id: i64,
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Lesson date.
    pub date: NaiveDate,
    /// Whether the student was present.
    pub present: bool,
}

/// Input for creating a student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Tax id.
    pub cpf: Option<String>,
    /// Birth date.
    pub birth_date: Option<String>,
}

impl NewStudent {
    /// Creates an input with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Input for creating a teacher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeacher {
    /// Full name.
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Tax id.
    pub cpf: Option<String>,
    /// Subject area.
    pub specialization: Option<String>,
}

/// Input for creating a class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    /// Display name.
    pub name: String,
    /// School year.
    pub year: Option<String>,
    /// Shift.
    pub shift: Option<String>,
    /// Homeroom teacher.
    pub teacher_id: Option<i64>,
}

impl NewClass {
    /// Creates an input with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Input for enrolling a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEnrollment {
    /// Student to enroll.
    pub student_id: i64,
    /// Target class.
    pub class_id: i64,
}

/// Input for recording a grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGrade {
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Subject.
    pub subject: String,
    /// Grade value.
    pub grade: f64,
    /// Bimester.
    pub bimester: i64,
}

impl NewGrade {
    /// Creates a grade input.
    #[must_use]
    pub fn new(enrollment_id: i64, subject: impl Into<String>, grade: f64, bimester: i64) -> Self {
        Self {
            enrollment_id,
            subject: subject.into(),
            grade,
            bimester,
        }
    }
}

/// Input for recording one attendance mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendance {
    /// Owning enrollment.
    pub enrollment_id: i64,
    /// Lesson date.
    pub date: NaiveDate,
    /// Presence flag.
    pub present: bool,
}

/// One line of a roll call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    /// Enrollment the mark belongs to.
    pub enrollment_id: i64,
    /// Presence flag.
    pub present: bool,
}

/// Full roll call of a class for one date.
///
/// Storing a batch replaces every existing mark of the class for that date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceBatch {
    /// Class the roll call is for.
    pub class_id: i64,
    /// Lesson date.
    pub date: NaiveDate,
    /// Marks, one per enrollment.
    pub entries: Vec<AttendanceEntry>,
}
