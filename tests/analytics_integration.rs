//! End-to-end report tests over an on-disk `SQLite` store.
//!
//! Each test seeds a small school through the service (so mutations are
//! authorized too) and checks the report the facade returns.

// Integration tests use expect/unwrap/panic for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use chrono::NaiveDate;
use classbook::models::{
    AttendanceEntry, NewAttendance, NewClass, NewEnrollment, NewStudent, RankingEntry,
};
use classbook::storage::SqliteRecordStore;
use classbook::{
    AttendanceBatch, AttendanceFilter, CallContext, ClassbookService, NewGrade, RankMode,
    RecordFilter, RecordStore, Report, ReportRequest, RoleCapabilityTable,
};
use std::sync::Arc;
use tempfile::TempDir;

struct School {
    _dir: TempDir,
    service: ClassbookService,
    class_a: i64,
    class_b: i64,
    ana: i64,
    bia: i64,
    ana_a: i64,
    bia_a: i64,
    caio_b: i64,
}

fn director() -> CallContext {
    CallContext::new(Some("1"), Some("diretor"))
}

/// Ana and Bia in 1A, Caio in 1B. Math: Ana 8, Bia 4. Caio has no grades.
fn school() -> School {
    let dir = TempDir::new().unwrap();
    let store = SqliteRecordStore::new(dir.path().join("escola.db")).unwrap();
    let service = ClassbookService::new(
        Arc::new(RoleCapabilityTable::standard()),
        Arc::new(store) as Arc<dyn RecordStore>,
    );

    let mut ctx = director();
    let ana = service.create_student(&mut ctx, &NewStudent::named("Ana")).unwrap();
    let bia = service.create_student(&mut ctx, &NewStudent::named("Bia")).unwrap();
    let caio = service.create_student(&mut ctx, &NewStudent::named("Caio")).unwrap();
    let class_a = service.create_class(&mut ctx, &NewClass::named("1A")).unwrap();
    let class_b = service.create_class(&mut ctx, &NewClass::named("1B")).unwrap();

    let enroll = |student_id, class_id| {
        service
            .create_enrollment(&mut director(), &NewEnrollment {
                student_id,
                class_id,
            })
            .unwrap()
    };
    let ana_a = enroll(ana, class_a);
    let bia_a = enroll(bia, class_a);
    let caio_b = enroll(caio, class_b);

    service.create_grade(&mut ctx, &NewGrade::new(ana_a, "Math", 8.0, 1)).unwrap();
    service.create_grade(&mut ctx, &NewGrade::new(bia_a, "Math", 4.0, 1)).unwrap();

    School {
        _dir: dir,
        service,
        class_a,
        class_b,
        ana,
        bia,
        ana_a,
        bia_a,
        caio_b,
    }
}

fn report(school: &School, request: &ReportRequest) -> Report {
    school.service.report(&mut director(), request).unwrap()
}

fn ranking(school: &School, mode: RankMode) -> Vec<RankingEntry> {
    match report(school, &ReportRequest::Ranking { mode, limit: 10 }) {
        Report::Ranking(rows) => rows,
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn test_subject_performance_mixed_grades() {
    let school = school();
    let Report::SubjectPerformance(rows) =
        report(&school, &ReportRequest::SubjectPerformance(RecordFilter::new()))
    else {
        panic!("wrong report kind");
    };

    assert_eq!(rows.len(), 1);
    let math = &rows[0];
    assert_eq!(math.subject, "Math");
    assert_eq!(math.total_grades, 2);
    assert!((math.avg - 6.0).abs() < f64::EPSILON);
    assert_eq!((math.approved, math.recovery, math.failed), (1, 0, 1));
}

#[test]
fn test_class_performance_includes_ungraded_class() {
    let school = school();
    let Report::ClassPerformance(rows) =
        report(&school, &ReportRequest::ClassPerformance(RecordFilter::new()))
    else {
        panic!("wrong report kind");
    };

    let by_class: Vec<_> = rows
        .iter()
        .map(|r| (r.class_id, r.total_students, r.avg))
        .collect();
    assert_eq!(by_class, vec![(school.class_a, 2, 6.0), (school.class_b, 1, 0.0)]);
}

#[test]
fn test_ranking_modes() {
    let school = school();

    let top = ranking(&school, RankMode::Top);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].student_id, school.ana);
    assert_eq!(top[0].class, "1A");

    let at_risk = ranking(&school, RankMode::AtRisk);
    assert_eq!(at_risk.len(), 1);
    assert_eq!(at_risk[0].student_id, school.bia);
    assert!((at_risk[0].avg - 4.0).abs() < f64::EPSILON);
}

#[test]
fn test_duplicate_grade_is_conflict() {
    let school = school();
    let err = school
        .service
        .create_grade(&mut director(), &NewGrade::new(school.ana_a, "Math", 9.5, 1))
        .unwrap_err();
    assert!(matches!(err, classbook::Error::Conflict(_)));

    // Another bimester is a different key.
    school
        .service
        .create_grade(&mut director(), &NewGrade::new(school.ana_a, "Math", 9.5, 2))
        .unwrap();
}

#[test]
fn test_deleted_student_grades_drop_out_of_reports() {
    let school = school();
    school.service.delete_student(&mut director(), school.bia).unwrap();

    let Report::SubjectPerformance(rows) =
        report(&school, &ReportRequest::SubjectPerformance(RecordFilter::new()))
    else {
        panic!("wrong report kind");
    };
    assert_eq!(rows[0].total_grades, 1);
    assert!((rows[0].avg - 8.0).abs() < f64::EPSILON);
    assert!(ranking(&school, RankMode::AtRisk).is_empty());
}

#[test]
fn test_bimester_evolution_by_subject() {
    let school = school();
    school
        .service
        .create_grade(&mut director(), &NewGrade::new(school.ana_a, "Math", 10.0, 2))
        .unwrap();

    let Report::BimesterEvolution(evolution) =
        report(&school, &ReportRequest::BimesterEvolution(RecordFilter::new()))
    else {
        panic!("wrong report kind");
    };
    assert!((evolution[&1]["Math"] - 6.0).abs() < f64::EPSILON);
    assert!((evolution[&2]["Math"] - 10.0).abs() < f64::EPSILON);
}

#[test]
fn test_bimester_evolution_is_stable_over_unchanged_data() {
    let school = school();
    school
        .service
        .create_grade(&mut director(), &NewGrade::new(school.bia_a, "Art", 6.5, 3))
        .unwrap();

    let request = ReportRequest::BimesterEvolution(RecordFilter::new());
    let first = report(&school, &request);
    let second = report(&school, &request);
    assert_eq!(first, second);
    let Report::BimesterEvolution(evolution) = first else {
        panic!("wrong report kind");
    };
    assert_eq!(evolution.keys().copied().collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn test_batch_attendance_and_class_rates() {
    let school = school();
    let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();

    let replaced = school
        .service
        .replace_attendance(&mut director(), &AttendanceBatch {
            class_id: school.class_a,
            date: day,
            entries: vec![
                AttendanceEntry {
                    enrollment_id: school.ana_a,
                    present: true,
                },
                AttendanceEntry {
                    enrollment_id: school.bia_a,
                    present: false,
                },
            ],
        })
        .unwrap();
    assert_eq!(replaced, 2);

    let Report::ClassAttendance(rows) =
        report(&school, &ReportRequest::ClassAttendance(AttendanceFilter::new()))
    else {
        panic!("wrong report kind");
    };
    let class_a = rows.iter().find(|r| r.class_id == school.class_a).unwrap();
    assert_eq!((class_a.total_records, class_a.presences), (2, 1));
    assert!((class_a.rate - 50.0).abs() < f64::EPSILON);

    let sheet = school
        .service
        .attendance_sheet(&mut director(), school.class_a, day)
        .unwrap();
    let marks: Vec<_> = sheet.iter().map(|e| (e.student.as_str(), e.present)).collect();
    assert_eq!(marks, vec![("Ana", true), ("Bia", false)]);
}

#[test]
fn test_batch_with_foreign_enrollment_changes_nothing() {
    let school = school();
    let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
    school
        .service
        .record_attendance(&mut director(), &NewAttendance {
            enrollment_id: school.ana_a,
            date: day,
            present: false,
        })
        .unwrap();

    let err = school
        .service
        .replace_attendance(&mut director(), &AttendanceBatch {
            class_id: school.class_a,
            date: day,
            entries: vec![
                AttendanceEntry {
                    enrollment_id: school.ana_a,
                    present: true,
                },
                AttendanceEntry {
                    enrollment_id: school.caio_b,
                    present: true,
                },
            ],
        })
        .unwrap_err();
    assert!(matches!(err, classbook::Error::InvalidInput(_)));

    let sheet = school
        .service
        .attendance_sheet(&mut director(), school.class_a, day)
        .unwrap();
    assert!(!sheet.iter().find(|e| e.enrollment_id == school.ana_a).unwrap().present);
}

#[test]
fn test_report_card_lists_own_grades() {
    let school = school();
    let Report::ReportCard(card) = school
        .service
        .report(&mut director(), &ReportRequest::ReportCard {
            student_id: school.ana,
        })
        .unwrap()
    else {
        panic!("wrong report kind");
    };
    assert_eq!(card.student.name, "Ana");
    assert_eq!(card.grades.len(), 1);
    assert_eq!(card.grades[0].class, "1A");
}

#[test]
fn test_overview_counts() {
    let school = school();
    let Report::Overview(overview) = report(&school, &ReportRequest::Overview) else {
        panic!("wrong report kind");
    };
    assert_eq!(overview.counts.students, 3);
    assert_eq!(overview.counts.classes, 2);
    assert_eq!(overview.grades.total_grades, 2);
    assert!((overview.grades.avg - 6.0).abs() < f64::EPSILON);
}
