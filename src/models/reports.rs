//! Report requests and report shapes.

use super::filter::{AttendanceFilter, RecordFilter};
use super::records::Student;
use crate::security::Capability;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Classification of a single grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeClass {
    /// Grade of at least 7.
    Approved,
    /// Grade of at least 5 and below 7.
    Recovery,
    /// Grade below 5.
    Failed,
}

impl GradeClass {
    /// Returns the classification as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Recovery => "recovery",
            Self::Failed => "failed",
        }
    }

    /// Returns the label shown on school documents.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Approved => "Aprovado",
            Self::Recovery => "Recuperação",
            Self::Failed => "Reprovado",
        }
    }
}

impl fmt::Display for GradeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMode {
    /// Highest averages first.
    #[default]
    Top,
    /// Students averaging below 5, lowest first.
    AtRisk,
}

impl RankMode {
    /// Returns the mode as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::AtRisk => "at_risk",
        }
    }

    /// Parses a mode name (`top`/`melhores`, `at_risk`/`risco`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for any other name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "melhores" => Ok(Self::Top),
            "at_risk" | "at-risk" | "risco" => Ok(Self::AtRisk),
            other => Err(Error::InvalidInput(format!("unknown ranking mode '{other}'"))),
        }
    }

    /// Parses a ranking size, falling back to `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the text is not a non-negative number.
    pub fn parse_limit(value: Option<&str>, default: usize) -> Result<usize> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|_| Error::InvalidInput(format!("limit must be numeric, got '{v}'"))),
        }
    }
}

/// Report kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Headline counts and rates.
    Overview,
    /// Per-subject grade aggregates.
    SubjectPerformance,
    /// Per-class grade aggregates.
    ClassPerformance,
    /// Per-bimester, per-subject averages.
    BimesterEvolution,
    /// Student ranking.
    Ranking,
    /// Per-class attendance rates.
    ClassAttendance,
    /// Per-grade listing with classification.
    GradeReport,
    /// One student's grades.
    ReportCard,
}

impl ReportKind {
    /// Returns all report kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Overview,
            Self::SubjectPerformance,
            Self::ClassPerformance,
            Self::BimesterEvolution,
            Self::Ranking,
            Self::ClassAttendance,
            Self::GradeReport,
            Self::ReportCard,
        ]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::SubjectPerformance => "subject_performance",
            Self::ClassPerformance => "class_performance",
            Self::BimesterEvolution => "bimester_evolution",
            Self::Ranking => "ranking",
            Self::ClassAttendance => "class_attendance",
            Self::GradeReport => "grade_report",
            Self::ReportCard => "report_card",
        }
    }

    /// Returns the capability gating this report.
    ///
    /// Analytics need `view_relatorios`; the grade listing and report card
    /// expose raw grades and need `view_notas`.
    #[must_use]
    pub const fn required_capability(&self) -> Capability {
        match self {
            Self::GradeReport | Self::ReportCard => Capability::ViewGrades,
            Self::Overview
            | Self::SubjectPerformance
            | Self::ClassPerformance
            | Self::BimesterEvolution
            | Self::Ranking
            | Self::ClassAttendance => Capability::ViewReports,
        }
    }

    /// Parses a report kind from its name or its legacy route name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "overview" | "estatisticas" => Self::Overview,
            "subject_performance" | "subjects" | "desempenho_disciplinas" => {
                Self::SubjectPerformance
            },
            "class_performance" | "classes" | "desempenho_turmas" => Self::ClassPerformance,
            "bimester_evolution" | "evolution" | "evolucao_bimestres" => Self::BimesterEvolution,
            "ranking" | "ranking_alunos" => Self::Ranking,
            "class_attendance" | "attendance" | "frequencia_turmas" => Self::ClassAttendance,
            "grade_report" | "grades" | "notas_relatorio" => Self::GradeReport,
            "report_card" | "boletim" => Self::ReportCard,
            _ => return Err(Error::InvalidInput(format!("unknown report kind '{s}'"))),
        };
        Ok(kind)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportRequest {
    /// Headline counts and rates.
    Overview,
    /// Per-subject aggregates.
    SubjectPerformance(RecordFilter),
    /// Per-class aggregates.
    ClassPerformance(RecordFilter),
    /// Per-bimester averages.
    BimesterEvolution(RecordFilter),
    /// Student ranking.
    Ranking {
        /// Direction.
        mode: RankMode,
        /// Maximum entries.
        limit: usize,
    },
    /// Per-class attendance.
    ClassAttendance(AttendanceFilter),
    /// Per-grade listing.
    GradeReport(RecordFilter),
    /// One student's report card.
    ReportCard {
        /// Student id.
        student_id: i64,
    },
}

impl ReportRequest {
    /// Returns the kind of report requested.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        match self {
            Self::Overview => ReportKind::Overview,
            Self::SubjectPerformance(_) => ReportKind::SubjectPerformance,
            Self::ClassPerformance(_) => ReportKind::ClassPerformance,
            Self::BimesterEvolution(_) => ReportKind::BimesterEvolution,
            Self::Ranking { .. } => ReportKind::Ranking,
            Self::ClassAttendance(_) => ReportKind::ClassAttendance,
            Self::GradeReport(_) => ReportKind::GradeReport,
            Self::ReportCard { .. } => ReportKind::ReportCard,
        }
    }

    /// Builds a request from a kind and query parameters.
    ///
    /// Rankings read `mode`/`tipo` and `limit`/`limite`; report cards need
    /// `student_id`/`aluno_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for malformed parameters or a report
    /// card request without a student id.
    pub fn from_query(
        kind: ReportKind,
        params: &HashMap<String, String>,
        default_limit: usize,
    ) -> Result<Self> {
        let get = |keys: &[&str]| keys.iter().find_map(|k| params.get(*k)).map(String::as_str);

        let request = match kind {
            ReportKind::Overview => Self::Overview,
            ReportKind::SubjectPerformance => {
                Self::SubjectPerformance(RecordFilter::from_query(params)?)
            },
            ReportKind::ClassPerformance => Self::ClassPerformance(RecordFilter::from_query(params)?),
            ReportKind::BimesterEvolution => {
                Self::BimesterEvolution(RecordFilter::from_query(params)?)
            },
            ReportKind::Ranking => Self::Ranking {
                mode: get(&["mode", "tipo"])
                    .filter(|m| !m.trim().is_empty())
                    .map_or(Ok(RankMode::Top), RankMode::parse)?,
                limit: RankMode::parse_limit(get(&["limit", "limite"]), default_limit)?,
            },
            ReportKind::ClassAttendance => {
                Self::ClassAttendance(AttendanceFilter::from_query(params)?)
            },
            ReportKind::GradeReport => Self::GradeReport(RecordFilter::from_query(params)?),
            ReportKind::ReportCard => {
                let student_id = RecordFilter::from_query(params)?
                    .student_id
                    .ok_or_else(|| Error::InvalidInput("report card needs student_id".to_string()))?;
                Self::ReportCard { student_id }
            },
        };
        Ok(request)
    }
}

/// Grade aggregate for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    /// Subject.
    pub subject: String,
    /// Number of grades.
    pub total_grades: usize,
    /// Rounded average.
    pub avg: f64,
    /// Grades classified approved.
    pub approved: usize,
    /// Grades classified recovery.
    pub recovery: usize,
    /// Grades classified failed.
    pub failed: usize,
}

/// Grade aggregate for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPerformance {
    /// Class id.
    pub class_id: i64,
    /// Class name.
    pub class: String,
    /// Distinct enrolled students.
    pub total_students: usize,
    /// Rounded average, 0 when the class has no grades.
    pub avg: f64,
    /// Grades classified approved.
    pub approved: usize,
    /// Grades classified recovery.
    pub recovery: usize,
    /// Grades classified failed.
    pub failed: usize,
}

/// One ranked student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    /// Student id.
    pub student_id: i64,
    /// Student name.
    pub student: String,
    /// Classes the grades came from, comma separated.
    pub class: String,
    /// Rounded average.
    pub avg: f64,
    /// Number of grades averaged.
    pub grade_count: usize,
}

/// Attendance aggregate for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendance {
    /// Class id.
    pub class_id: i64,
    /// Class name.
    pub class: String,
    /// Attendance marks recorded.
    pub total_records: usize,
    /// Marks that were presences.
    pub presences: usize,
    /// Presence rate in percent.
    pub rate: f64,
}

/// Headline counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadCounts {
    /// Active students.
    pub students: usize,
    /// Active teachers.
    pub teachers: usize,
    /// Active classes.
    pub classes: usize,
}

/// School-wide grade figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOverview {
    /// Number of grades.
    pub total_grades: usize,
    /// Rounded overall average.
    pub avg: f64,
    /// Grades classified approved.
    pub approved: usize,
    /// Grades classified recovery.
    pub recovery: usize,
    /// Grades classified failed.
    pub failed: usize,
}

/// School-wide attendance figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceOverview {
    /// Attendance marks recorded.
    pub total_records: usize,
    /// Marks that were presences.
    pub presences: usize,
    /// Presence rate in percent.
    pub rate: f64,
}

/// Overview report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewReport {
    /// Active record counts.
    pub counts: HeadCounts,
    /// Grade figures.
    pub grades: GradeOverview,
    /// Attendance figures.
    pub attendance: AttendanceOverview,
}

/// One line of the grade report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReportRow {
    /// Student name.
    pub student: String,
    /// Class name.
    pub class: String,
    /// Subject.
    pub subject: String,
    /// Grade value.
    pub grade: f64,
    /// Bimester.
    pub bimester: i64,
    /// Classification.
    pub status: GradeClass,
}

/// One grade on a report card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCardGrade {
    /// Grade id.
    pub grade_id: i64,
    /// Enrollment id.
    pub enrollment_id: i64,
    /// Class name.
    pub class: String,
    /// Subject.
    pub subject: String,
    /// Grade value.
    pub grade: f64,
    /// Bimester.
    pub bimester: i64,
}

/// A student's report card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    /// The student.
    pub student: Student,
    /// Grades ordered by subject then bimester.
    pub grades: Vec<ReportCardGrade>,
}

/// One line of a class roll-call sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheetEntry {
    /// Enrollment id.
    pub enrollment_id: i64,
    /// Student id.
    pub student_id: i64,
    /// Student name.
    pub student: String,
    /// Recorded presence, true when nothing was recorded.
    pub present: bool,
}

/// Bimester -> subject -> rounded average.
pub type BimesterEvolution = BTreeMap<i64, BTreeMap<String, f64>>;

/// A generated report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Report {
    /// Headline counts and rates.
    Overview(OverviewReport),
    /// Per-subject aggregates.
    SubjectPerformance(Vec<SubjectPerformance>),
    /// Per-class aggregates.
    ClassPerformance(Vec<ClassPerformance>),
    /// Per-bimester averages.
    BimesterEvolution(BimesterEvolution),
    /// Student ranking.
    Ranking(Vec<RankingEntry>),
    /// Per-class attendance.
    ClassAttendance(Vec<ClassAttendance>),
    /// Per-grade listing.
    GradeReport(Vec<GradeReportRow>),
    /// One student's report card.
    ReportCard(ReportCard),
}

impl Report {
    /// Returns the kind of this report.
    #[must_use]
    pub const fn kind(&self) -> ReportKind {
        match self {
            Self::Overview(_) => ReportKind::Overview,
            Self::SubjectPerformance(_) => ReportKind::SubjectPerformance,
            Self::ClassPerformance(_) => ReportKind::ClassPerformance,
            Self::BimesterEvolution(_) => ReportKind::BimesterEvolution,
            Self::Ranking(_) => ReportKind::Ranking,
            Self::ClassAttendance(_) => ReportKind::ClassAttendance,
            Self::GradeReport(_) => ReportKind::GradeReport,
            Self::ReportCard(_) => ReportKind::ReportCard,
        }
    }
}
