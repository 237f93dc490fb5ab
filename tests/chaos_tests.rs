//! Chaos testing for concurrent access.
//!
//! Tests concurrent operations to find race conditions and deadlocks:
//! - Racing duplicate grades through one shared store
//! - Racing duplicate grades through separate connections to one file
//! - Batch attendance replacement racing report reads

// Chaos tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
// Needless collect is sometimes needed for clearer concurrent test structure
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::needless_collect
)]

use chrono::NaiveDate;
use classbook::models::{AttendanceEntry, NewClass, NewEnrollment, NewStudent};
use classbook::{
    AttendanceBatch, AttendanceFilter, CallContext, ClassbookService, Error, NewGrade,
    RecordStore, Report, ReportRequest, RoleCapabilityTable, SqliteRecordStore,
};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const THREADS: usize = 8;

/// Seeds one student enrolled in one class; returns (class, enrollment).
fn seed(store: &SqliteRecordStore) -> (i64, i64) {
    let student_id = store.create_student(&NewStudent::named("Ana")).unwrap();
    let class_id = store.create_class(&NewClass::named("1A")).unwrap();
    let enrollment = store
        .create_enrollment(&NewEnrollment {
            student_id,
            class_id,
        })
        .unwrap();
    (class_id, enrollment)
}

fn tally(results: Vec<classbook::Result<i64>>) -> (usize, usize) {
    let mut ok = 0;
    let mut conflicts = 0;
    for result in results {
        match result {
            Ok(_) => ok += 1,
            Err(Error::Conflict(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    (ok, conflicts)
}

#[test]
fn test_duplicate_grades_on_shared_store() {
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let (_, enrollment) = seed(&store);

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                #[allow(clippy::cast_precision_loss)]
                let value = 5.0 + i as f64 / 10.0;
                store.create_grade(&NewGrade::new(enrollment, "Math", value, 1))
            })
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, THREADS - 1));
}

#[test]
fn test_duplicate_grades_across_connections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("escola.db");
    let (_, enrollment) = seed(&SqliteRecordStore::new(path.clone()).unwrap());

    // Open every handle up front; the race is on the insert.
    let stores: Vec<SqliteRecordStore> = (0..THREADS)
        .map(|_| SqliteRecordStore::new(path.clone()).unwrap())
        .collect();

    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            thread::spawn(move || store.create_grade(&NewGrade::new(enrollment, "Math", 7.0, 2)))
        })
        .collect();
    let results = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(tally(results), (1, THREADS - 1));
    assert_eq!(count_grades(&path), 1);
}

fn count_grades(path: &Path) -> usize {
    SqliteRecordStore::new(path.to_path_buf())
        .unwrap()
        .grades(&classbook::RecordFilter::new())
        .unwrap()
        .len()
}

#[test]
fn test_batch_replace_races_reports() {
    let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
    let (class_id, enrollment) = seed(&store);
    let service = Arc::new(ClassbookService::new(
        Arc::new(RoleCapabilityTable::standard()),
        Arc::clone(&store) as Arc<dyn RecordStore>,
    ));
    let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

    let writers: Vec<_> = (0..THREADS)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let batch = AttendanceBatch {
                    class_id,
                    date: day,
                    entries: vec![AttendanceEntry {
                        enrollment_id: enrollment,
                        present: i % 2 == 0,
                    }],
                };
                service
                    .replace_attendance(&mut CallContext::new(Some("1"), Some("diretor")), &batch)
                    .unwrap()
            })
        })
        .collect();

    let readers: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let report = service
                    .report(
                        &mut CallContext::new(Some("1"), Some("diretor")),
                        &ReportRequest::ClassAttendance(AttendanceFilter::new()),
                    )
                    .unwrap();
                let Report::ClassAttendance(rows) = report else {
                    panic!("wrong report kind");
                };
                // A batch is atomic: a reader never sees two marks for the day.
                rows.iter().map(|r| r.total_records).max().unwrap_or(0)
            })
        })
        .collect();

    for writer in writers {
        assert_eq!(writer.join().unwrap(), 1);
    }
    for reader in readers {
        assert!(reader.join().unwrap() <= 1);
    }

    let marks = store
        .attendance(&AttendanceFilter::new().with_class(class_id).with_date(day))
        .unwrap();
    assert_eq!(marks.len(), 1);
}
