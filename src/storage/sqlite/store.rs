//! `SQLite` record store.

use super::connection::{acquire_lock, configure_connection, map_sqlite_error};
use super::metrics::{record_operation_metrics, status_label};
use super::schema::ensure_schema;
use super::sql::{attendance_filter_clause, grade_filter_clause};
use crate::models::{
    AttendanceBatch, AttendanceFilter, AttendanceRecord, Enrollment, GradeRecord, NewAttendance,
    NewClass, NewEnrollment, NewGrade, NewStudent, NewTeacher, RecordFilter, SchoolClass, Student,
    Teacher,
};
use crate::observability::current_request_id;
use crate::storage::traits::RecordStore;
use crate::{Error, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite`-backed record store.
///
/// # Concurrency Model
///
/// Each handle owns one `Mutex<Connection>`. Writes run inside
/// `BEGIN IMMEDIATE` transactions, so two handles on the same file serialize
/// on the database write lock (waiting up to the busy timeout) and the unique
/// grade index settles races between them.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or its schema
    /// cannot be created.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: format!("{}: {e}", db_path.display()),
        })?;
        Self::initialize(conn, Some(db_path))
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;
        Self::initialize(conn, None)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        ensure_schema(&conn)?;
        tracing::debug!(path = ?db_path, "Opened SQLite record store");
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Runs a read against the connection, recording metrics.
    fn read<T>(&self, operation: &'static str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn)
        };
        record_operation_metrics(BACKEND, operation, start, status_label(&result));
        result
    }

    /// Runs a write inside an immediate transaction, recording metrics.
    ///
    /// Any error from `f` rolls the transaction back.
    fn write<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);

            conn.execute("BEGIN IMMEDIATE", [])
                .map_err(|e| map_sqlite_error("begin_transaction", &e))?;

            let result = f(&conn);

            if result.is_ok() {
                conn.execute("COMMIT", [])
                    .map_err(|e| map_sqlite_error("commit_transaction", &e))?;
            } else {
                let _ = conn.execute("ROLLBACK", []);
            }

            result
        })();

        if let Err(err) = &result {
            tracing::debug!(
                operation,
                request_id = ?current_request_id(),
                error = %err,
                "Write rolled back"
            );
        }
        record_operation_metrics(BACKEND, operation, start, status_label(&result));
        result
    }
}

fn row_exists(conn: &Connection, table: &str, id: i64) -> Result<bool> {
    conn.query_row(
        &format!("SELECT 1 FROM {table} WHERE id = ?1"),
        params![id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| map_sqlite_error("lookup", &e))
}

fn require_row(conn: &Connection, table: &str, label: &str, id: i64) -> Result<()> {
    if row_exists(conn, table, id)? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("{label} {id}")))
    }
}

fn query_all<T>(
    conn: &Connection,
    operation: &str,
    sql: &str,
    params: impl rusqlite::Params,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| map_sqlite_error(operation, &e))?;
    let rows = stmt
        .query_map(params, map)
        .map_err(|e| map_sqlite_error(operation, &e))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| map_sqlite_error(operation, &e))
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        cpf: row.get(3)?,
        birth_date: row.get(4)?,
        status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

const STUDENT_COLUMNS: &str = "id, nome, email, cpf, data_nascimento, status";

impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self), fields(operation = "students", backend = "sqlite"))]
    fn students(&self) -> Result<Vec<Student>> {
        self.read("students", |conn| {
            query_all(
                conn,
                "list_students",
                &format!("SELECT {STUDENT_COLUMNS} FROM alunos ORDER BY nome, id"),
                [],
                student_from_row,
            )
        })
    }

    #[instrument(skip(self), fields(operation = "student", backend = "sqlite"))]
    fn student(&self, id: i64) -> Result<Option<Student>> {
        self.read("student", |conn| {
            conn.query_row(
                &format!("SELECT {STUDENT_COLUMNS} FROM alunos WHERE id = ?1"),
                params![id],
                student_from_row,
            )
            .optional()
            .map_err(|e| map_sqlite_error("get_student", &e))
        })
    }

    #[instrument(skip(self), fields(operation = "teachers", backend = "sqlite"))]
    fn teachers(&self) -> Result<Vec<Teacher>> {
        self.read("teachers", |conn| {
            query_all(
                conn,
                "list_teachers",
                "SELECT id, nome, email, cpf, especializacao, status FROM professores ORDER BY nome, id",
                [],
                |row| {
                    Ok(Teacher {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        email: row.get(2)?,
                        cpf: row.get(3)?,
                        specialization: row.get(4)?,
                        status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    })
                },
            )
        })
    }

    #[instrument(skip(self), fields(operation = "classes", backend = "sqlite"))]
    fn classes(&self) -> Result<Vec<SchoolClass>> {
        self.read("classes", |conn| {
            query_all(
                conn,
                "list_classes",
                "SELECT id, nome, ano, turno, professor_id, status FROM turmas ORDER BY nome, id",
                [],
                |row| {
                    Ok(SchoolClass {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        year: row.get(2)?,
                        shift: row.get(3)?,
                        teacher_id: row.get(4)?,
                        status: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    })
                },
            )
        })
    }

    #[instrument(skip(self), fields(operation = "enrollments", backend = "sqlite"))]
    fn enrollments(&self) -> Result<Vec<Enrollment>> {
        self.read("enrollments", |conn| {
            query_all(
                conn,
                "list_enrollments",
                "SELECT id, aluno_id, turma_id, status FROM matriculas ORDER BY id",
                [],
                |row| {
                    Ok(Enrollment {
                        id: row.get(0)?,
                        student_id: row.get(1)?,
                        class_id: row.get(2)?,
                        status: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    })
                },
            )
        })
    }

    #[instrument(skip(self), fields(operation = "grades", backend = "sqlite"))]
    fn grades(&self, filter: &RecordFilter) -> Result<Vec<GradeRecord>> {
        let clause = grade_filter_clause(filter);
        self.read("grades", |conn| {
            query_all(
                conn,
                "list_grades",
                &format!(
                    "SELECT id, matricula_id, disciplina, nota, bimestre FROM notas{} ORDER BY id",
                    clause.sql
                ),
                params_from_iter(clause.params.iter()),
                |row| {
                    Ok(GradeRecord {
                        id: row.get(0)?,
                        enrollment_id: row.get(1)?,
                        subject: row.get(2)?,
                        grade: row.get(3)?,
                        bimester: row.get(4)?,
                    })
                },
            )
        })
    }

    #[instrument(skip(self), fields(operation = "attendance", backend = "sqlite"))]
    fn attendance(&self, filter: &AttendanceFilter) -> Result<Vec<AttendanceRecord>> {
        let clause = attendance_filter_clause(filter);
        let rows = self.read("attendance", |conn| {
            query_all(
                conn,
                "list_attendance",
                &format!(
                    "SELECT id, matricula_id, data, presente FROM frequencia{} ORDER BY data, id",
                    clause.sql
                ),
                params_from_iter(clause.params.iter()),
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, enrollment_id, date, present)| {
                match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                    Ok(date) => Some(AttendanceRecord {
                        id,
                        enrollment_id,
                        date,
                        present: present == Some(1),
                    }),
                    Err(_) => {
                        tracing::warn!(id, date = %date, "Skipping attendance row with malformed date");
                        None
                    },
                }
            })
            .collect())
    }

    #[instrument(skip(self, student), fields(operation = "create_student", backend = "sqlite"))]
    fn create_student(&self, student: &NewStudent) -> Result<i64> {
        self.write("create_student", |conn| {
            conn.execute(
                "INSERT INTO alunos (nome, email, cpf, data_nascimento) VALUES (?1, ?2, ?3, ?4)",
                params![student.name, student.email, student.cpf, student.birth_date],
            )
            .map_err(|e| map_sqlite_error("insert_student", &e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(skip(self, teacher), fields(operation = "create_teacher", backend = "sqlite"))]
    fn create_teacher(&self, teacher: &NewTeacher) -> Result<i64> {
        self.write("create_teacher", |conn| {
            conn.execute(
                "INSERT INTO professores (nome, email, cpf, especializacao) VALUES (?1, ?2, ?3, ?4)",
                params![teacher.name, teacher.email, teacher.cpf, teacher.specialization],
            )
            .map_err(|e| map_sqlite_error("insert_teacher", &e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(skip(self, class), fields(operation = "create_class", backend = "sqlite"))]
    fn create_class(&self, class: &NewClass) -> Result<i64> {
        self.write("create_class", |conn| {
            if let Some(teacher_id) = class.teacher_id {
                require_row(conn, "professores", "teacher", teacher_id)?;
            }
            conn.execute(
                "INSERT INTO turmas (nome, ano, turno, professor_id) VALUES (?1, ?2, ?3, ?4)",
                params![class.name, class.year, class.shift, class.teacher_id],
            )
            .map_err(|e| map_sqlite_error("insert_class", &e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(skip(self), fields(operation = "create_enrollment", backend = "sqlite"))]
    fn create_enrollment(&self, enrollment: &NewEnrollment) -> Result<i64> {
        self.write("create_enrollment", |conn| {
            require_row(conn, "alunos", "student", enrollment.student_id)?;
            require_row(conn, "turmas", "class", enrollment.class_id)?;
            conn.execute(
                "INSERT INTO matriculas (aluno_id, turma_id) VALUES (?1, ?2)",
                params![enrollment.student_id, enrollment.class_id],
            )
            .map_err(|e| map_sqlite_error("insert_enrollment", &e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(
        skip(self, grade),
        fields(operation = "create_grade", backend = "sqlite", enrollment_id = grade.enrollment_id)
    )]
    fn create_grade(&self, grade: &NewGrade) -> Result<i64> {
        if !grade.grade.is_finite() {
            return Err(Error::InvalidInput(format!(
                "grade must be a finite number, got {}",
                grade.grade
            )));
        }

        self.write("create_grade", |conn| {
            require_row(conn, "matriculas", "enrollment", grade.enrollment_id)?;
            conn.execute(
                "INSERT INTO notas (matricula_id, disciplina, nota, bimestre) VALUES (?1, ?2, ?3, ?4)",
                params![grade.enrollment_id, grade.subject, grade.grade, grade.bimester],
            )
            .map_err(|e| match map_sqlite_error("insert_grade", &e) {
                Error::Conflict(_) => Error::Conflict(format!(
                    "grade already recorded for enrollment {} in '{}' bimester {}",
                    grade.enrollment_id, grade.subject, grade.bimester
                )),
                other => other,
            })?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(skip(self), fields(operation = "record_attendance", backend = "sqlite"))]
    fn record_attendance(&self, mark: &NewAttendance) -> Result<i64> {
        self.write("record_attendance", |conn| {
            require_row(conn, "matriculas", "enrollment", mark.enrollment_id)?;
            conn.execute(
                "INSERT INTO frequencia (matricula_id, data, presente) VALUES (?1, ?2, ?3)",
                params![
                    mark.enrollment_id,
                    mark.date.format("%Y-%m-%d").to_string(),
                    i64::from(mark.present)
                ],
            )
            .map_err(|e| map_sqlite_error("insert_attendance", &e))?;
            Ok(conn.last_insert_rowid())
        })
    }

    #[instrument(
        skip(self, batch),
        fields(operation = "replace_class_attendance", backend = "sqlite", class_id = batch.class_id, entries = batch.entries.len())
    )]
    fn replace_class_attendance(&self, batch: &AttendanceBatch) -> Result<usize> {
        let date = batch.date.format("%Y-%m-%d").to_string();

        self.write("replace_class_attendance", |conn| {
            require_row(conn, "turmas", "class", batch.class_id)?;

            let roster: HashSet<i64> = query_all(
                conn,
                "class_roster",
                "SELECT id FROM matriculas WHERE turma_id = ?1",
                params![batch.class_id],
                |row| row.get(0),
            )?
            .into_iter()
            .collect();

            if let Some(stray) = batch
                .entries
                .iter()
                .find(|entry| !roster.contains(&entry.enrollment_id))
            {
                return Err(Error::InvalidInput(format!(
                    "enrollment {} is not in class {}",
                    stray.enrollment_id, batch.class_id
                )));
            }

            let removed = conn
                .execute(
                    "DELETE FROM frequencia
                     WHERE matricula_id IN (SELECT id FROM matriculas WHERE turma_id = ?1)
                       AND data = ?2",
                    params![batch.class_id, date],
                )
                .map_err(|e| map_sqlite_error("delete_attendance", &e))?;

            let mut stmt = conn
                .prepare("INSERT INTO frequencia (matricula_id, data, presente) VALUES (?1, ?2, ?3)")
                .map_err(|e| map_sqlite_error("prepare_insert_attendance", &e))?;
            for entry in &batch.entries {
                stmt.execute(params![entry.enrollment_id, date, i64::from(entry.present)])
                    .map_err(|e| map_sqlite_error("insert_attendance", &e))?;
            }

            tracing::debug!(removed, written = batch.entries.len(), "Replaced class attendance");
            Ok(batch.entries.len())
        })
    }

    #[instrument(skip(self), fields(operation = "delete_student", backend = "sqlite"))]
    fn delete_student(&self, id: i64) -> Result<bool> {
        self.write("delete_student", |conn| {
            conn.execute("DELETE FROM alunos WHERE id = ?1", params![id])
                .map(|deleted| deleted > 0)
                .map_err(|e| map_sqlite_error("delete_student", &e))
        })
    }

    #[instrument(skip(self), fields(operation = "delete_class", backend = "sqlite"))]
    fn delete_class(&self, id: i64) -> Result<bool> {
        self.write("delete_class", |conn| {
            conn.execute("DELETE FROM turmas WHERE id = ?1", params![id])
                .map(|deleted| deleted > 0)
                .map_err(|e| map_sqlite_error("delete_class", &e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceEntry;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded() -> (SqliteRecordStore, i64, i64) {
        let store = SqliteRecordStore::in_memory().unwrap();
        let student = store.create_student(&NewStudent::named("Ana")).unwrap();
        let class = store.create_class(&NewClass::named("1A")).unwrap();
        let enrollment = store
            .create_enrollment(&NewEnrollment {
                student_id: student,
                class_id: class,
            })
            .unwrap();
        (store, class, enrollment)
    }

    #[test]
    fn test_created_records_are_active() {
        let (store, class, _) = seeded();
        assert!(store.students().unwrap()[0].is_active());
        let classes = store.classes().unwrap();
        assert_eq!(classes[0].id, class);
        assert!(classes[0].is_active());
        assert!(store.enrollments().unwrap()[0].is_active());
    }

    #[test]
    fn test_duplicate_grade_is_conflict() {
        let (store, _, enrollment) = seeded();
        store
            .create_grade(&NewGrade::new(enrollment, "Math", 8.0, 1))
            .unwrap();
        let err = store
            .create_grade(&NewGrade::new(enrollment, "Math", 3.0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // other bimester and other subject are distinct triples
        store
            .create_grade(&NewGrade::new(enrollment, "Math", 3.0, 2))
            .unwrap();
        store
            .create_grade(&NewGrade::new(enrollment, "History", 3.0, 1))
            .unwrap();
        assert_eq!(store.grades(&RecordFilter::new()).unwrap().len(), 3);
    }

    #[test]
    fn test_grade_for_missing_enrollment() {
        let store = SqliteRecordStore::in_memory().unwrap();
        let err = store
            .create_grade(&NewGrade::new(42, "Math", 8.0, 1))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_non_finite_grade_rejected() {
        let (store, _, enrollment) = seeded();
        let err = store
            .create_grade(&NewGrade::new(enrollment, "Math", f64::NAN, 1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_grades_filter_pushdown() {
        let (store, _, enrollment) = seeded();
        store.create_grade(&NewGrade::new(enrollment, "Math", 8.0, 1)).unwrap();
        store.create_grade(&NewGrade::new(enrollment, "Math", 6.0, 2)).unwrap();
        store.create_grade(&NewGrade::new(enrollment, "Art", 9.0, 2)).unwrap();

        let grades = store
            .grades(&RecordFilter::new().with_subject("Math").with_bimester(2))
            .unwrap();
        assert_eq!(grades.len(), 1);
        assert!((grades[0].grade - 6.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_replace_class_attendance() {
        let (store, class, enrollment) = seeded();
        let day = date("2024-03-11");
        store
            .record_attendance(&NewAttendance {
                enrollment_id: enrollment,
                date: day,
                present: true,
            })
            .unwrap();

        let written = store
            .replace_class_attendance(&AttendanceBatch {
                class_id: class,
                date: day,
                entries: vec![AttendanceEntry {
                    enrollment_id: enrollment,
                    present: false,
                }],
            })
            .unwrap();
        assert_eq!(written, 1);

        let marks = store
            .attendance(&AttendanceFilter::new().with_date(day))
            .unwrap();
        assert_eq!(marks.len(), 1);
        assert!(!marks[0].present);
    }

    #[test]
    fn test_replace_rolls_back_on_stray_enrollment() {
        let (store, class, enrollment) = seeded();
        let day = date("2024-03-11");
        store
            .record_attendance(&NewAttendance {
                enrollment_id: enrollment,
                date: day,
                present: true,
            })
            .unwrap();

        let err = store
            .replace_class_attendance(&AttendanceBatch {
                class_id: class,
                date: day,
                entries: vec![
                    AttendanceEntry {
                        enrollment_id: enrollment,
                        present: false,
                    },
                    AttendanceEntry {
                        enrollment_id: 999,
                        present: true,
                    },
                ],
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let marks = store.attendance(&AttendanceFilter::new()).unwrap();
        assert_eq!(marks.len(), 1);
        assert!(marks[0].present, "original mark must survive");
    }

    #[test]
    fn test_malformed_attendance_dates_are_skipped() {
        let (store, _, enrollment) = seeded();
        {
            let conn = acquire_lock(&store.conn);
            conn.execute(
                "INSERT INTO frequencia (matricula_id, data, presente) VALUES (?1, '11/03/2024', 1)",
                params![enrollment],
            )
            .unwrap();
        }
        assert!(store.attendance(&AttendanceFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_delete_does_not_cascade() {
        let (store, class, enrollment) = seeded();
        store.create_grade(&NewGrade::new(enrollment, "Math", 8.0, 1)).unwrap();
        assert!(store.delete_class(class).unwrap());
        assert!(!store.delete_class(class).unwrap());
        assert_eq!(store.enrollments().unwrap().len(), 1);
        assert_eq!(store.grades(&RecordFilter::new()).unwrap().len(), 1);
    }

    #[test]
    fn test_enrollment_requires_student_and_class() {
        let (store, class, _) = seeded();
        let err = store
            .create_enrollment(&NewEnrollment {
                student_id: 404,
                class_id: class,
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("student")));
    }
}
