//! Classbook facade.
//!
//! Every entry point runs the authorization pipeline first, then reads
//! through the [`AcademicRecordView`], computes with the analytics engine and
//! shapes the result with the [`ReportAssembler`]. Mutations go straight to
//! the store once authorized.

use super::analytics::{self, AttendanceTally, GradeTally};
use super::record_view::AcademicRecordView;
use super::reports::ReportAssembler;
use crate::models::{
    AttendanceBatch, AttendanceFilter, AttendanceSheetEntry, NewAttendance, NewClass,
    NewEnrollment, NewGrade, NewStudent, NewTeacher, RecordFilter, Report, ReportRequest,
};
use crate::observability::{RequestContextGuard, enter_request_context};
use crate::security::{
    AuthorizationGuard, AuthorizationOutcome, CallContext, Operation, Pipeline,
    RoleCapabilityTable, RoleSummary,
};
use crate::storage::RecordStore;
use crate::{Error, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Entry point for transports.
pub struct ClassbookService {
    guard: AuthorizationGuard,
    pipeline: Pipeline,
    view: AcademicRecordView,
    store: Arc<dyn RecordStore>,
}

impl ClassbookService {
    /// Creates a service with the standard identity + capability pipeline.
    #[must_use]
    pub fn new(table: Arc<RoleCapabilityTable>, store: Arc<dyn RecordStore>) -> Self {
        let guard = AuthorizationGuard::new(table);
        Self {
            pipeline: Pipeline::standard(guard.clone()),
            guard,
            view: AcademicRecordView::new(Arc::clone(&store)),
            store,
        }
    }

    /// Replaces the pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Returns the pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Answers whether a role holds a capability, by name.
    #[must_use]
    pub fn authorize(&self, role: &str, capability: &str) -> AuthorizationOutcome {
        self.guard.evaluate(role, capability)
    }

    /// Summarizes the effective role table.
    #[must_use]
    pub fn roles(&self) -> Vec<RoleSummary> {
        self.guard.table().summary()
    }

    /// Generates a report.
    ///
    /// # Errors
    ///
    /// Returns an authorization error if the pipeline rejects the call,
    /// [`Error::NotFound`] for a report card of an unknown student, or a
    /// storage error.
    #[instrument(skip(self, ctx, request), fields(request_id = ctx.request_id(), kind = request.kind().as_str()))]
    pub fn report(&self, ctx: &mut CallContext, request: &ReportRequest) -> Result<Report> {
        let kind = request.kind();
        let _request = self.gate(ctx, Operation::Report(kind))?;

        let start = Instant::now();
        let result = self.build_report(request);
        let status = if result.is_ok() { "success" } else { "error" };

        metrics::counter!(
            "reports_generated_total",
            "kind" => kind.as_str(),
            "status" => status
        )
        .increment(1);
        metrics::histogram!("report_duration_ms", "kind" => kind.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = &result {
            tracing::warn!(error = %err, "Report failed");
        }
        result
    }

    /// Enters the call's request context and runs the pipeline.
    fn gate(&self, ctx: &mut CallContext, operation: Operation) -> Result<RequestContextGuard> {
        let guard = enter_request_context(ctx.request().clone());
        self.pipeline.run(ctx, operation)?;
        Ok(guard)
    }

    fn build_report(&self, request: &ReportRequest) -> Result<Report> {
        let directory = self.view.directory()?;
        let assembler = ReportAssembler::new(&directory);

        let report = match request {
            ReportRequest::Overview => {
                let grades = self.view.grade_tuples(&directory, &RecordFilter::new())?;
                let marks = self
                    .view
                    .attendance_tuples(&directory, &AttendanceFilter::new())?;
                let active_teachers = self
                    .view
                    .teachers()?
                    .iter()
                    .filter(|t| t.is_active())
                    .count();

                let grade_tally = GradeTally::from_grades(grades.iter().map(|g| g.grade));
                let mut attendance_tally = AttendanceTally::default();
                marks.iter().for_each(|m| attendance_tally.push(m.present));

                Report::Overview(assembler.overview(active_teachers, &grade_tally, &attendance_tally))
            },
            ReportRequest::SubjectPerformance(filter) => {
                let grades = self.view.grade_tuples(&directory, filter)?;
                Report::SubjectPerformance(
                    assembler.subject_performance(analytics::aggregate_by_subject(&grades)),
                )
            },
            ReportRequest::ClassPerformance(filter) => {
                let grades = self.view.grade_tuples(&directory, filter)?;
                let rosters = directory.rosters(|class_id, student_id| {
                    filter.admits_enrollment(class_id, student_id)
                });
                Report::ClassPerformance(
                    assembler.class_performance(&analytics::aggregate_by_class(&rosters, &grades)),
                )
            },
            ReportRequest::BimesterEvolution(filter) => {
                let grades = self.view.grade_tuples(&directory, filter)?;
                Report::BimesterEvolution(analytics::bimester_evolution(&grades))
            },
            ReportRequest::Ranking { mode, limit } => {
                let grades = self.view.grade_tuples(&directory, &RecordFilter::new())?;
                Report::Ranking(assembler.ranking(&analytics::rank(&grades, *mode, *limit)))
            },
            ReportRequest::ClassAttendance(filter) => {
                let marks = self.view.attendance_tuples(&directory, filter)?;
                let rosters = directory.rosters(|class_id, student_id| {
                    filter.admits_enrollment(class_id, student_id)
                });
                Report::ClassAttendance(
                    assembler.class_attendance(&analytics::class_attendance(&rosters, &marks)),
                )
            },
            ReportRequest::GradeReport(filter) => {
                let grades = self.view.grade_tuples(&directory, filter)?;
                Report::GradeReport(assembler.grade_report(&grades))
            },
            ReportRequest::ReportCard { student_id } => {
                let student = directory
                    .student(*student_id)
                    .cloned()
                    .ok_or_else(|| Error::NotFound(format!("student {student_id}")))?;
                let grades = self
                    .view
                    .grade_tuples(&directory, &RecordFilter::new().with_student(*student_id))?;
                Report::ReportCard(assembler.report_card(student, &grades))
            },
        };
        Ok(report)
    }

    /// Roll-call sheet of a class for a date.
    ///
    /// One line per active enrollment, ordered by student name. Enrollments
    /// without a mark for the date are listed as present.
    ///
    /// # Errors
    ///
    /// Returns an authorization error without `view_frequencia`,
    /// [`Error::NotFound`] for an unknown class, or a storage error.
    #[instrument(skip(self, ctx), fields(request_id = ctx.request_id()))]
    pub fn attendance_sheet(
        &self,
        ctx: &mut CallContext,
        class_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceSheetEntry>> {
        let _request = self.gate(ctx, Operation::AttendanceSheet)?;

        let directory = self.view.directory()?;
        if directory.class(class_id).is_none() {
            return Err(Error::NotFound(format!("class {class_id}")));
        }

        let filter = AttendanceFilter::new().with_class(class_id).with_date(date);
        let recorded: HashMap<i64, bool> = self
            .view
            .attendance_tuples(&directory, &filter)?
            .into_iter()
            .map(|m| (m.enrollment_id, m.present))
            .collect();

        let mut sheet: Vec<AttendanceSheetEntry> = directory
            .enrollments_of(class_id)
            .filter(|e| e.is_active())
            .filter_map(|e| {
                let student = directory.student(e.student_id)?;
                Some(AttendanceSheetEntry {
                    enrollment_id: e.id,
                    student_id: student.id,
                    student: student.name.clone(),
                    present: recorded.get(&e.id).copied().unwrap_or(true),
                })
            })
            .collect();
        sheet.sort_by(|a, b| (&a.student, a.enrollment_id).cmp(&(&b.student, b.enrollment_id)));
        Ok(sheet)
    }

    /// Creates a student.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn create_student(&self, ctx: &mut CallContext, student: &NewStudent) -> Result<i64> {
        let _request = self.gate(ctx, Operation::CreateStudent)?;
        self.store.create_student(student)
    }

    /// Deletes a student, leaving its enrollments in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no student was deleted.
    pub fn delete_student(&self, ctx: &mut CallContext, id: i64) -> Result<()> {
        let _request = self.gate(ctx, Operation::DeleteStudent)?;
        if self.store.delete_student(id)? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("student {id}")))
        }
    }

    /// Creates a teacher.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn create_teacher(&self, ctx: &mut CallContext, teacher: &NewTeacher) -> Result<i64> {
        let _request = self.gate(ctx, Operation::CreateTeacher)?;
        self.store.create_teacher(teacher)
    }

    /// Creates a class.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn create_class(&self, ctx: &mut CallContext, class: &NewClass) -> Result<i64> {
        let _request = self.gate(ctx, Operation::CreateClass)?;
        self.store.create_class(class)
    }

    /// Deletes a class, leaving its enrollments in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no class was deleted.
    pub fn delete_class(&self, ctx: &mut CallContext, id: i64) -> Result<()> {
        let _request = self.gate(ctx, Operation::DeleteClass)?;
        if self.store.delete_class(id)? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("class {id}")))
        }
    }

    /// Enrolls a student in a class.
    ///
    /// # Errors
    ///
    /// Returns an authorization error, [`Error::NotFound`] for an unknown
    /// student or class, or a storage error.
    pub fn create_enrollment(&self, ctx: &mut CallContext, enrollment: &NewEnrollment) -> Result<i64> {
        let _request = self.gate(ctx, Operation::CreateEnrollment)?;
        self.store.create_enrollment(enrollment)
    }

    /// Records a grade.
    ///
    /// # Errors
    ///
    /// Returns an authorization error, [`Error::Conflict`] for a duplicate
    /// (enrollment, subject, bimester), or a storage error.
    pub fn create_grade(&self, ctx: &mut CallContext, grade: &NewGrade) -> Result<i64> {
        let _request = self.gate(ctx, Operation::CreateGrade)?;
        self.store.create_grade(grade)
    }

    /// Records a single attendance mark.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    pub fn record_attendance(&self, ctx: &mut CallContext, mark: &NewAttendance) -> Result<i64> {
        let _request = self.gate(ctx, Operation::RecordAttendance)?;
        self.store.record_attendance(mark)
    }

    /// Replaces a class's attendance for a date.
    ///
    /// # Errors
    ///
    /// Returns an authorization error, [`Error::InvalidInput`] if an entry
    /// names an enrollment outside the class, or a storage error. On error
    /// nothing is changed.
    pub fn replace_attendance(&self, ctx: &mut CallContext, batch: &AttendanceBatch) -> Result<usize> {
        let _request = self.gate(ctx, Operation::ReplaceAttendance)?;
        self.store.replace_class_attendance(batch)
    }
}

impl std::fmt::Debug for ClassbookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassbookService")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RankMode, ReportKind};
    use crate::storage::SqliteRecordStore;

    fn service() -> (ClassbookService, Arc<SqliteRecordStore>) {
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let service = ClassbookService::new(
            Arc::new(RoleCapabilityTable::standard()),
            Arc::clone(&store) as Arc<dyn RecordStore>,
        );
        (service, store)
    }

    fn coordinator() -> CallContext {
        CallContext::new(Some("7"), Some("coordenador"))
    }

    #[test]
    fn test_reports_need_view_relatorios() {
        let (service, _) = service();
        let request = ReportRequest::Ranking {
            mode: RankMode::Top,
            limit: 10,
        };

        let err = service
            .report(&mut CallContext::new(Some("3"), Some("professor")), &request)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let err = service.report(&mut CallContext::anonymous(), &request).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));

        assert!(matches!(
            service.report(&mut coordinator(), &request).unwrap(),
            Report::Ranking(rows) if rows.is_empty()
        ));
    }

    #[test]
    fn test_report_card_unknown_student() {
        let (service, _) = service();
        let err = service
            .report(&mut coordinator(), &ReportRequest::ReportCard { student_id: 5 })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_empty_store_reports_are_zero_valued() {
        let (service, _) = service();
        for kind in ReportKind::all() {
            if *kind == ReportKind::ReportCard {
                continue;
            }
            let request = ReportRequest::from_query(*kind, &HashMap::new(), 10).unwrap();
            let report = service.report(&mut coordinator(), &request).unwrap();
            assert_eq!(report.kind(), *kind);
        }
    }

    #[test]
    fn test_attendance_sheet_defaults_to_present() {
        let (service, store) = service();
        let mut ctx = coordinator();
        let bia = service.create_student(&mut ctx, &NewStudent::named("Bia")).unwrap();
        let ana = service.create_student(&mut ctx, &NewStudent::named("Ana")).unwrap();
        let class = service.create_class(&mut ctx, &NewClass::named("1A")).unwrap();
        let bia_e = service
            .create_enrollment(&mut ctx, &NewEnrollment { student_id: bia, class_id: class })
            .unwrap();
        service
            .create_enrollment(&mut ctx, &NewEnrollment { student_id: ana, class_id: class })
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        store
            .record_attendance(&NewAttendance {
                enrollment_id: bia_e,
                date: day,
                present: false,
            })
            .unwrap();

        let sheet = service.attendance_sheet(&mut ctx, class, day).unwrap();
        let lines: Vec<_> = sheet.iter().map(|e| (e.student.as_str(), e.present)).collect();
        assert_eq!(lines, vec![("Ana", true), ("Bia", false)]);

        assert!(matches!(
            service.attendance_sheet(&mut ctx, 999, day),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            service.attendance_sheet(&mut CallContext::anonymous(), class, day),
            Err(Error::Unauthenticated(_))
        ));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (service, _) = service();
        let err = service.delete_class(&mut coordinator(), 1).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_teacher_cannot_delete_students() {
        let (service, _) = service();
        let err = service
            .delete_student(&mut CallContext::new(Some("3"), Some("professor")), 1)
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_authorize_by_name() {
        let (service, _) = service();
        assert!(service.authorize("diretor", "anything").allowed);
        assert!(!service.authorize("secretaria", "create_notas").allowed);
    }
}
