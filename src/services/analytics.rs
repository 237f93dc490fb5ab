//! Academic analytics.
//!
//! Pure functions over joined snapshots. Nothing here touches storage or
//! caches results; empty input always yields zero-valued output.
//!
//! Averages and rates are rounded to one decimal place, half away from zero.

use super::record_view::{AttendanceTuple, GradeTuple, RosterEntry};
use crate::models::{BimesterEvolution, GradeClass, RankMode};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Minimum grade classified as approved.
pub const APPROVAL_THRESHOLD: f64 = 7.0;

/// Minimum grade classified as recovery.
pub const RECOVERY_THRESHOLD: f64 = 5.0;

/// Classifies a grade.
///
/// NaN compares false against both thresholds and lands in `Failed`.
#[must_use]
pub fn classify_grade(grade: f64) -> GradeClass {
    if grade >= APPROVAL_THRESHOLD {
        GradeClass::Approved
    } else if grade >= RECOVERY_THRESHOLD {
        GradeClass::Recovery
    } else {
        GradeClass::Failed
    }
}

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(100.0 * part as f64 / total as f64)
    }
}

/// Presence rate in percent; 0 for no marks.
#[must_use]
pub fn attendance_rate(marks: impl IntoIterator<Item = bool>) -> f64 {
    let mut tally = AttendanceTally::default();
    marks.into_iter().for_each(|present| tally.push(present));
    tally.rate()
}

/// Share of approved grades in percent; 0 for no grades.
#[must_use]
pub fn approval_rate(grades: impl IntoIterator<Item = f64>) -> f64 {
    GradeTally::from_grades(grades).approval_rate()
}

/// Mean grade; 0 for no grades.
#[must_use]
pub fn average_grade(grades: impl IntoIterator<Item = f64>) -> f64 {
    GradeTally::from_grades(grades).average()
}

/// Running grade statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradeTally {
    /// Grades seen.
    pub count: usize,
    /// Sum of grades.
    pub total: f64,
    /// Approved grades.
    pub approved: usize,
    /// Recovery grades.
    pub recovery: usize,
    /// Failed grades.
    pub failed: usize,
}

impl GradeTally {
    /// Tallies a sequence of grades.
    #[must_use]
    pub fn from_grades(grades: impl IntoIterator<Item = f64>) -> Self {
        let mut tally = Self::default();
        grades.into_iter().for_each(|g| tally.push(g));
        tally
    }

    /// Adds one grade.
    pub fn push(&mut self, grade: f64) {
        self.count += 1;
        self.total += grade;
        match classify_grade(grade) {
            GradeClass::Approved => self.approved += 1,
            GradeClass::Recovery => self.recovery += 1,
            GradeClass::Failed => self.failed += 1,
        }
    }

    /// Unrounded mean; 0 for no grades.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    /// Rounded mean; 0 for no grades.
    #[must_use]
    pub fn average(&self) -> f64 {
        round1(self.mean())
    }

    /// Share of approved grades in percent.
    #[must_use]
    pub fn approval_rate(&self) -> f64 {
        percent(self.approved, self.count)
    }
}

/// Running attendance statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceTally {
    /// Marks seen.
    pub total: usize,
    /// Presences seen.
    pub presences: usize,
}

impl AttendanceTally {
    /// Adds one mark.
    pub fn push(&mut self, present: bool) {
        self.total += 1;
        if present {
            self.presences += 1;
        }
    }

    /// Presence rate in percent; 0 for no marks.
    #[must_use]
    pub fn rate(&self) -> f64 {
        percent(self.presences, self.total)
    }
}

/// Grade statistics for one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectAggregate {
    /// Subject.
    pub subject: String,
    /// Statistics.
    pub tally: GradeTally,
}

/// Grade statistics for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAggregate {
    /// Class.
    pub class_id: i64,
    /// Distinct enrolled students.
    pub students: usize,
    /// Statistics over the class's grades.
    pub tally: GradeTally,
}

/// A student's place in a ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentStanding {
    /// Student.
    pub student_id: i64,
    /// Classes the grades came from, in first-seen order.
    pub class_ids: Vec<i64>,
    /// Rounded average.
    pub average: f64,
    /// Grades averaged.
    pub grade_count: usize,
}

/// Attendance statistics for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAttendanceAggregate {
    /// Class.
    pub class_id: i64,
    /// Statistics.
    pub tally: AttendanceTally,
}

/// Groups by key in first-seen order.
fn group_in_order<K, T, I>(items: I, key: impl Fn(&T) -> K) -> Vec<(K, Vec<T>)>
where
    K: std::hash::Hash + Eq + Clone,
    I: IntoIterator<Item = T>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();
    for item in items {
        let k = key(&item);
        if let Some(&slot) = index.get(&k) {
            groups[slot].1.push(item);
        } else {
            index.insert(k.clone(), groups.len());
            groups.push((k, vec![item]));
        }
    }
    groups
}

/// Per-subject statistics, highest mean first, ties in first-seen order.
#[must_use]
pub fn aggregate_by_subject(grades: &[GradeTuple]) -> Vec<SubjectAggregate> {
    let mut aggregates: Vec<SubjectAggregate> = group_in_order(grades, |g| g.subject.clone())
        .into_iter()
        .map(|(subject, group)| SubjectAggregate {
            subject,
            tally: GradeTally::from_grades(group.iter().map(|g| g.grade)),
        })
        .collect();
    aggregates.sort_by(|a, b| b.tally.mean().total_cmp(&a.tally.mean()));
    aggregates
}

/// Per-class statistics over active-class rosters.
///
/// Every class with at least one roster entry appears; classes without
/// grades average 0. Grades whose enrollment is not on a roster are ignored.
/// Highest mean first, ties in roster order.
#[must_use]
pub fn aggregate_by_class(rosters: &[RosterEntry], grades: &[GradeTuple]) -> Vec<ClassAggregate> {
    let on_roster: HashSet<i64> = rosters.iter().map(|r| r.enrollment_id).collect();
    let mut by_class: HashMap<i64, GradeTally> = HashMap::new();
    for grade in grades.iter().filter(|g| on_roster.contains(&g.enrollment_id)) {
        by_class.entry(grade.class_id).or_default().push(grade.grade);
    }

    let mut aggregates: Vec<ClassAggregate> = group_in_order(rosters, |r| r.class_id)
        .into_iter()
        .map(|(class_id, entries)| ClassAggregate {
            class_id,
            students: entries
                .iter()
                .map(|r| r.student_id)
                .collect::<HashSet<_>>()
                .len(),
            tally: by_class.get(&class_id).copied().unwrap_or_default(),
        })
        .collect();
    aggregates.sort_by(|a, b| b.tally.mean().total_cmp(&a.tally.mean()));
    aggregates
}

/// Ranks students by their unrounded mean.
///
/// `Top` orders descending; `AtRisk` keeps means strictly below
/// [`RECOVERY_THRESHOLD`] and orders ascending. Ties keep first-seen order.
/// The reported `average` is rounded after ordering. Students without grades
/// never appear. At most `limit` entries.
#[must_use]
pub fn rank(grades: &[GradeTuple], mode: RankMode, limit: usize) -> Vec<StudentStanding> {
    let mut standings: Vec<(f64, StudentStanding)> = group_in_order(grades, |g| g.student_id)
        .into_iter()
        .map(|(student_id, group)| {
            let mut class_ids: Vec<i64> = Vec::new();
            for g in &group {
                if !class_ids.contains(&g.class_id) {
                    class_ids.push(g.class_id);
                }
            }
            let tally = GradeTally::from_grades(group.iter().map(|g| g.grade));
            let standing = StudentStanding {
                student_id,
                class_ids,
                average: tally.average(),
                grade_count: tally.count,
            };
            (tally.mean(), standing)
        })
        .collect();

    match mode {
        RankMode::Top => standings.sort_by(|a, b| b.0.total_cmp(&a.0)),
        RankMode::AtRisk => {
            standings.retain(|(mean, _)| *mean < RECOVERY_THRESHOLD);
            standings.sort_by(|a, b| a.0.total_cmp(&b.0));
        },
    }
    standings
        .into_iter()
        .take(limit)
        .map(|(_, standing)| standing)
        .collect()
}

/// Bimester -> subject -> rounded average, for the combinations present.
#[must_use]
pub fn bimester_evolution(grades: &[GradeTuple]) -> BimesterEvolution {
    let mut tallies: BTreeMap<i64, BTreeMap<String, GradeTally>> = BTreeMap::new();
    for g in grades {
        tallies
            .entry(g.bimester)
            .or_default()
            .entry(g.subject.clone())
            .or_default()
            .push(g.grade);
    }
    tallies
        .into_iter()
        .map(|(bimester, subjects)| {
            let averages = subjects
                .into_iter()
                .map(|(subject, tally)| (subject, tally.average()))
                .collect();
            (bimester, averages)
        })
        .collect()
}

/// Per-class attendance over active-class rosters, highest rate first.
///
/// Every class with at least one roster entry appears, with a zero tally
/// when nothing was recorded.
#[must_use]
pub fn class_attendance(
    rosters: &[RosterEntry],
    marks: &[AttendanceTuple],
) -> Vec<ClassAttendanceAggregate> {
    let on_roster: HashSet<i64> = rosters.iter().map(|r| r.enrollment_id).collect();
    let mut by_class: HashMap<i64, AttendanceTally> = HashMap::new();
    for mark in marks.iter().filter(|m| on_roster.contains(&m.enrollment_id)) {
        by_class.entry(mark.class_id).or_default().push(mark.present);
    }

    let mut aggregates: Vec<ClassAttendanceAggregate> = group_in_order(rosters, |r| r.class_id)
        .into_iter()
        .map(|(class_id, _)| ClassAttendanceAggregate {
            class_id,
            tally: by_class.get(&class_id).copied().unwrap_or_default(),
        })
        .collect();
    aggregates.sort_by(|a, b| b.tally.rate().total_cmp(&a.tally.rate()));
    aggregates
}
