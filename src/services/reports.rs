//! Report shaping.
//!
//! The assembler turns engine output into the report rows callers see,
//! adding display names from the same directory snapshot the tuples were
//! joined against.

use super::analytics::{
    AttendanceTally, ClassAggregate, ClassAttendanceAggregate, GradeTally, StudentStanding,
    SubjectAggregate, classify_grade,
};
use super::record_view::{Directory, GradeTuple};
use crate::models::{
    AttendanceOverview, ClassAttendance, ClassPerformance, GradeOverview, GradeReportRow,
    HeadCounts, OverviewReport, RankingEntry, ReportCard, ReportCardGrade, Student,
    SubjectPerformance,
};

/// Shapes analytics output into reports.
#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler<'a> {
    directory: &'a Directory,
}

impl<'a> ReportAssembler<'a> {
    /// Creates an assembler over a directory snapshot.
    #[must_use]
    pub const fn new(directory: &'a Directory) -> Self {
        Self { directory }
    }

    /// Per-subject rows.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn subject_performance(&self, aggregates: Vec<SubjectAggregate>) -> Vec<SubjectPerformance> {
        aggregates
            .into_iter()
            .map(|a| SubjectPerformance {
                subject: a.subject,
                total_grades: a.tally.count,
                avg: a.tally.average(),
                approved: a.tally.approved,
                recovery: a.tally.recovery,
                failed: a.tally.failed,
            })
            .collect()
    }

    /// Per-class rows.
    #[must_use]
    pub fn class_performance(&self, aggregates: &[ClassAggregate]) -> Vec<ClassPerformance> {
        aggregates
            .iter()
            .map(|a| ClassPerformance {
                class_id: a.class_id,
                class: self.directory.class_name(a.class_id).to_string(),
                total_students: a.students,
                avg: a.tally.average(),
                approved: a.tally.approved,
                recovery: a.tally.recovery,
                failed: a.tally.failed,
            })
            .collect()
    }

    /// Ranking rows. A student graded in several classes lists them all.
    #[must_use]
    pub fn ranking(&self, standings: &[StudentStanding]) -> Vec<RankingEntry> {
        standings
            .iter()
            .map(|s| RankingEntry {
                student_id: s.student_id,
                student: self.directory.student_name(s.student_id).to_string(),
                class: s
                    .class_ids
                    .iter()
                    .map(|id| self.directory.class_name(*id))
                    .collect::<Vec<_>>()
                    .join(", "),
                avg: s.average,
                grade_count: s.grade_count,
            })
            .collect()
    }

    /// Per-class attendance rows.
    #[must_use]
    pub fn class_attendance(&self, aggregates: &[ClassAttendanceAggregate]) -> Vec<ClassAttendance> {
        aggregates
            .iter()
            .map(|a| ClassAttendance {
                class_id: a.class_id,
                class: self.directory.class_name(a.class_id).to_string(),
                total_records: a.tally.total,
                presences: a.tally.presences,
                rate: a.tally.rate(),
            })
            .collect()
    }

    /// Overview figures.
    #[must_use]
    pub fn overview(
        &self,
        active_teachers: usize,
        grades: &GradeTally,
        attendance: &AttendanceTally,
    ) -> OverviewReport {
        OverviewReport {
            counts: HeadCounts {
                students: self.directory.students().filter(|s| s.is_active()).count(),
                teachers: active_teachers,
                classes: self.directory.classes().filter(|c| c.is_active()).count(),
            },
            grades: GradeOverview {
                total_grades: grades.count,
                avg: grades.average(),
                approved: grades.approved,
                recovery: grades.recovery,
                failed: grades.failed,
            },
            attendance: AttendanceOverview {
                total_records: attendance.total,
                presences: attendance.presences,
                rate: attendance.rate(),
            },
        }
    }

    /// Grade listing ordered by class name, student name, subject.
    #[must_use]
    pub fn grade_report(&self, grades: &[GradeTuple]) -> Vec<GradeReportRow> {
        let mut rows: Vec<GradeReportRow> = grades
            .iter()
            .map(|g| GradeReportRow {
                student: self.directory.student_name(g.student_id).to_string(),
                class: self.directory.class_name(g.class_id).to_string(),
                subject: g.subject.clone(),
                grade: g.grade,
                bimester: g.bimester,
                status: classify_grade(g.grade),
            })
            .collect();
        rows.sort_by(|a, b| {
            (&a.class, &a.student, &a.subject).cmp(&(&b.class, &b.student, &b.subject))
        });
        rows
    }

    /// A student's report card, grades ordered by subject then bimester.
    #[must_use]
    pub fn report_card(&self, student: Student, grades: &[GradeTuple]) -> ReportCard {
        let mut rows: Vec<ReportCardGrade> = grades
            .iter()
            .filter(|g| g.student_id == student.id)
            .map(|g| ReportCardGrade {
                grade_id: g.grade_id,
                enrollment_id: g.enrollment_id,
                class: self.directory.class_name(g.class_id).to_string(),
                subject: g.subject.clone(),
                grade: g.grade,
                bimester: g.bimester,
            })
            .collect();
        rows.sort_by(|a, b| (&a.subject, a.bimester).cmp(&(&b.subject, b.bimester)));
        ReportCard {
            student,
            grades: rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Enrollment, GradeClass, SchoolClass};

    fn student(id: i64, name: &str) -> Student {
        Student {
            id,
            name: name.to_string(),
            email: None,
            cpf: None,
            birth_date: None,
            status: "ativo".to_string(),
        }
    }

    fn class(id: i64, name: &str, status: &str) -> SchoolClass {
        SchoolClass {
            id,
            name: name.to_string(),
            year: None,
            shift: None,
            teacher_id: None,
            status: status.to_string(),
        }
    }

    fn directory() -> Directory {
        Directory::new(
            vec![student(1, "Bia"), student(2, "Ana")],
            vec![class(10, "1A", "ativa"), class(20, "2B", "encerrada")],
            vec![Enrollment {
                id: 100,
                student_id: 1,
                class_id: 10,
                status: "ativa".to_string(),
            }],
        )
    }

    fn tuple(student_id: i64, class_id: i64, subject: &str, grade: f64, bimester: i64) -> GradeTuple {
        GradeTuple {
            grade_id: bimester,
            enrollment_id: 100,
            student_id,
            class_id,
            subject: subject.to_string(),
            grade,
            bimester,
        }
    }

    #[test]
    fn test_ranking_joins_class_names() {
        let dir = directory();
        let rows = ReportAssembler::new(&dir).ranking(&[StudentStanding {
            student_id: 1,
            class_ids: vec![10, 20],
            average: 8.5,
            grade_count: 4,
        }]);
        assert_eq!(rows[0].student, "Bia");
        assert_eq!(rows[0].class, "1A, 2B");
    }

    #[test]
    fn test_grade_report_order_and_labels() {
        let dir = directory();
        let rows = ReportAssembler::new(&dir).grade_report(&[
            tuple(1, 20, "Math", 9.0, 1),
            tuple(2, 10, "Math", 6.0, 1),
            tuple(1, 10, "Art", 3.0, 1),
        ]);
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.class.as_str(), r.student.as_str(), r.status))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("1A", "Ana", GradeClass::Recovery),
                ("1A", "Bia", GradeClass::Failed),
                ("2B", "Bia", GradeClass::Approved),
            ]
        );
    }

    #[test]
    fn test_report_card_order() {
        let dir = directory();
        let card = ReportAssembler::new(&dir).report_card(
            student(1, "Bia"),
            &[
                tuple(1, 10, "Math", 7.0, 2),
                tuple(1, 10, "Art", 8.0, 1),
                tuple(1, 10, "Math", 6.0, 1),
            ],
        );
        let order: Vec<_> = card
            .grades
            .iter()
            .map(|g| (g.subject.as_str(), g.bimester))
            .collect();
        assert_eq!(order, vec![("Art", 1), ("Math", 1), ("Math", 2)]);
    }

    #[test]
    fn test_overview_counts_active_only() {
        let dir = directory();
        let report = ReportAssembler::new(&dir).overview(
            3,
            &GradeTally::from_grades([8.0, 4.0]),
            &AttendanceTally::default(),
        );
        assert_eq!(report.counts.students, 2);
        assert_eq!(report.counts.classes, 1);
        assert_eq!(report.counts.teachers, 3);
        assert!((report.grades.avg - 6.0).abs() < f64::EPSILON);
        assert!(report.attendance.rate.abs() < f64::EPSILON);
    }
}
