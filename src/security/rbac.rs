//! Role capability table.
//!
//! Maps each school role to the set of capabilities it holds. The table is
//! built once at startup, optionally with per-role overrides from
//! configuration, and shared read-only afterwards.
//!
//! # Roles
//!
//! | Role | Wire name | Capabilities |
//! |------|-----------|--------------|
//! | `Admin` | `admin` | Everything (bypass) |
//! | `Director` | `diretor` | Everything (bypass) |
//! | `Coordinator` | `coordenador` | All record and report capabilities except teacher edits |
//! | `Teacher` | `professor` | Viewing plus grade and attendance entry |
//! | `Secretary` | `secretaria` | Student and enrollment administration |
//! | `Unknown` | anything else | None |
//!
//! # Example
//!
//! ```rust
//! use classbook::security::{Capability, Role, RoleCapabilityTable};
//!
//! let table = RoleCapabilityTable::standard();
//!
//! assert!(table.holds(&Role::Coordinator, Capability::DeleteGrades));
//! assert!(!table.holds(&Role::Secretary, Capability::DeleteStudents));
//! assert!(table.capabilities_of(&Role::parse("zelador")).is_empty());
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// School roles.
///
/// Role strings arrive unvalidated from the caller, so anything outside the
/// known catalog becomes [`Role::Unknown`] and holds no capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// System administrator (`admin`).
    Admin,
    /// School director (`diretor`).
    Director,
    /// Pedagogical coordinator (`coordenador`).
    Coordinator,
    /// Teacher (`professor`).
    Teacher,
    /// School secretary (`secretaria`).
    Secretary,
    /// Any unrecognized role string, kept verbatim for logging.
    Unknown(String),
}

impl Role {
    /// Returns the known roles, in catalog order.
    #[must_use]
    pub const fn known() -> &'static [Self] {
        &[
            Self::Admin,
            Self::Director,
            Self::Coordinator,
            Self::Teacher,
            Self::Secretary,
        ]
    }

    /// Parses a role string. Never fails; unknown strings map to [`Role::Unknown`].
    ///
    /// Matching is exact: surrounding whitespace or a different case yields
    /// an unknown role.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Self::Admin,
            "diretor" => Self::Director,
            "coordenador" => Self::Coordinator,
            "professor" => Self::Teacher,
            "secretaria" => Self::Secretary,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::Director => "diretor",
            Self::Coordinator => "coordenador",
            Self::Teacher => "professor",
            Self::Secretary => "secretaria",
            Self::Unknown(raw) => raw,
        }
    }

    /// Returns true for the roles that pass every capability check.
    #[must_use]
    pub const fn bypasses_checks(&self) -> bool {
        matches!(self, Self::Admin | Self::Director)
    }

    /// Returns true if the role string was not recognized.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Atomic permission names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// View the dashboard.
    #[serde(rename = "view_dashboard")]
    ViewDashboard,

    /// View students.
    #[serde(rename = "view_alunos")]
    ViewStudents,
    /// Create students.
    #[serde(rename = "create_alunos")]
    CreateStudents,
    /// Edit students.
    #[serde(rename = "edit_alunos")]
    EditStudents,
    /// Delete students.
    #[serde(rename = "delete_alunos")]
    DeleteStudents,

    /// View teachers.
    #[serde(rename = "view_professores")]
    ViewTeachers,
    /// Create teachers.
    #[serde(rename = "create_professores")]
    CreateTeachers,
    /// Edit teachers.
    #[serde(rename = "edit_professores")]
    EditTeachers,
    /// Delete teachers.
    #[serde(rename = "delete_professores")]
    DeleteTeachers,

    /// View classes.
    #[serde(rename = "view_turmas")]
    ViewClasses,
    /// Create classes.
    #[serde(rename = "create_turmas")]
    CreateClasses,
    /// Edit classes.
    #[serde(rename = "edit_turmas")]
    EditClasses,
    /// Delete classes.
    #[serde(rename = "delete_turmas")]
    DeleteClasses,

    /// View grades.
    #[serde(rename = "view_notas")]
    ViewGrades,
    /// Create grades.
    #[serde(rename = "create_notas")]
    CreateGrades,
    /// Edit grades.
    #[serde(rename = "edit_notas")]
    EditGrades,
    /// Delete grades.
    #[serde(rename = "delete_notas")]
    DeleteGrades,

    /// View attendance.
    #[serde(rename = "view_frequencia")]
    ViewAttendance,
    /// Record attendance.
    #[serde(rename = "create_frequencia")]
    CreateAttendance,
    /// Edit attendance.
    #[serde(rename = "edit_frequencia")]
    EditAttendance,
    /// Delete attendance.
    #[serde(rename = "delete_frequencia")]
    DeleteAttendance,

    /// View calendar events.
    #[serde(rename = "view_eventos")]
    ViewEvents,
    /// Create calendar events.
    #[serde(rename = "create_eventos")]
    CreateEvents,
    /// Edit calendar events.
    #[serde(rename = "edit_eventos")]
    EditEvents,
    /// Delete calendar events.
    #[serde(rename = "delete_eventos")]
    DeleteEvents,

    /// View analytics reports.
    #[serde(rename = "view_relatorios")]
    ViewReports,

    /// View enrollments.
    #[serde(rename = "view_matriculas")]
    ViewEnrollments,
    /// Create enrollments.
    #[serde(rename = "create_matriculas")]
    CreateEnrollments,
    /// Edit enrollments.
    #[serde(rename = "edit_matriculas")]
    EditEnrollments,
    /// Delete enrollments.
    #[serde(rename = "delete_matriculas")]
    DeleteEnrollments,

    /// Reserved capability that satisfies every check when held.
    #[serde(rename = "all")]
    All,
}

impl Capability {
    /// Returns the full catalog.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::ViewDashboard,
            Self::ViewStudents,
            Self::CreateStudents,
            Self::EditStudents,
            Self::DeleteStudents,
            Self::ViewTeachers,
            Self::CreateTeachers,
            Self::EditTeachers,
            Self::DeleteTeachers,
            Self::ViewClasses,
            Self::CreateClasses,
            Self::EditClasses,
            Self::DeleteClasses,
            Self::ViewGrades,
            Self::CreateGrades,
            Self::EditGrades,
            Self::DeleteGrades,
            Self::ViewAttendance,
            Self::CreateAttendance,
            Self::EditAttendance,
            Self::DeleteAttendance,
            Self::ViewEvents,
            Self::CreateEvents,
            Self::EditEvents,
            Self::DeleteEvents,
            Self::ViewReports,
            Self::ViewEnrollments,
            Self::CreateEnrollments,
            Self::EditEnrollments,
            Self::DeleteEnrollments,
            Self::All,
        ]
    }

    /// Returns the wire name of the capability.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ViewDashboard => "view_dashboard",
            Self::ViewStudents => "view_alunos",
            Self::CreateStudents => "create_alunos",
            Self::EditStudents => "edit_alunos",
            Self::DeleteStudents => "delete_alunos",
            Self::ViewTeachers => "view_professores",
            Self::CreateTeachers => "create_professores",
            Self::EditTeachers => "edit_professores",
            Self::DeleteTeachers => "delete_professores",
            Self::ViewClasses => "view_turmas",
            Self::CreateClasses => "create_turmas",
            Self::EditClasses => "edit_turmas",
            Self::DeleteClasses => "delete_turmas",
            Self::ViewGrades => "view_notas",
            Self::CreateGrades => "create_notas",
            Self::EditGrades => "edit_notas",
            Self::DeleteGrades => "delete_notas",
            Self::ViewAttendance => "view_frequencia",
            Self::CreateAttendance => "create_frequencia",
            Self::EditAttendance => "edit_frequencia",
            Self::DeleteAttendance => "delete_frequencia",
            Self::ViewEvents => "view_eventos",
            Self::CreateEvents => "create_eventos",
            Self::EditEvents => "edit_eventos",
            Self::DeleteEvents => "delete_eventos",
            Self::ViewReports => "view_relatorios",
            Self::ViewEnrollments => "view_matriculas",
            Self::CreateEnrollments => "create_matriculas",
            Self::EditEnrollments => "edit_matriculas",
            Self::DeleteEnrollments => "delete_matriculas",
            Self::All => "all",
        }
    }

    /// Parses a capability wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::all().iter().copied().find(|cap| cap.as_str() == s)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable role -> capability mapping.
///
/// Only the known non-bypass roles have entries. `admin` and `diretor` are
/// listed with [`Capability::All`] for reporting purposes, but the guard
/// never consults the table for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCapabilityTable {
    entries: HashMap<Role, HashSet<Capability>>,
}

impl Default for RoleCapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RoleCapabilityTable {
    /// Builds the standard school table.
    #[must_use]
    pub fn standard() -> Self {
        use Capability as C;

        let mut entries = HashMap::new();

        entries.insert(Role::Admin, HashSet::from([C::All]));
        entries.insert(Role::Director, HashSet::from([C::All]));

        entries.insert(
            Role::Coordinator,
            [
                C::ViewDashboard,
                C::ViewStudents,
                C::CreateStudents,
                C::EditStudents,
                C::DeleteStudents,
                C::ViewTeachers,
                C::ViewClasses,
                C::CreateClasses,
                C::EditClasses,
                C::DeleteClasses,
                C::ViewGrades,
                C::CreateGrades,
                C::EditGrades,
                C::DeleteGrades,
                C::ViewAttendance,
                C::CreateAttendance,
                C::EditAttendance,
                C::DeleteAttendance,
                C::ViewEvents,
                C::CreateEvents,
                C::EditEvents,
                C::DeleteEvents,
                C::ViewReports,
                C::ViewEnrollments,
                C::CreateEnrollments,
                C::EditEnrollments,
                C::DeleteEnrollments,
            ]
            .into_iter()
            .collect(),
        );

        // Teachers are scoped to their own classes by the CRUD layer.
        entries.insert(
            Role::Teacher,
            [
                C::ViewDashboard,
                C::ViewStudents,
                C::ViewClasses,
                C::ViewGrades,
                C::CreateGrades,
                C::EditGrades,
                C::ViewAttendance,
                C::CreateAttendance,
                C::EditAttendance,
                C::ViewEvents,
            ]
            .into_iter()
            .collect(),
        );

        // No deletes for students.
        entries.insert(
            Role::Secretary,
            [
                C::ViewDashboard,
                C::ViewStudents,
                C::CreateStudents,
                C::EditStudents,
                C::ViewTeachers,
                C::ViewClasses,
                C::ViewEnrollments,
                C::CreateEnrollments,
                C::EditEnrollments,
                C::DeleteEnrollments,
            ]
            .into_iter()
            .collect(),
        );

        Self { entries }
    }

    /// Builds a table from the standard one with whole-role replacements.
    ///
    /// Overrides for the bypass roles are accepted but have no effect on
    /// authorization. Unknown roles cannot be given capabilities.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] if an override names an unknown role.
    pub fn with_overrides<I>(overrides: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (Role, HashSet<Capability>)>,
    {
        let mut table = Self::standard();
        for (role, capabilities) in overrides {
            if role.is_unknown() {
                return Err(crate::Error::InvalidInput(format!(
                    "cannot assign capabilities to unknown role '{role}'"
                )));
            }
            table.entries.insert(role, capabilities);
        }
        Ok(table)
    }

    /// Returns the capabilities of a role; empty for unknown roles.
    #[must_use]
    pub fn capabilities_of(&self, role: &Role) -> HashSet<Capability> {
        self.entries.get(role).cloned().unwrap_or_default()
    }

    /// Returns true if the role's entry contains the capability or `all`.
    ///
    /// This is a table lookup only; the bypass lives in the guard.
    #[must_use]
    pub fn holds(&self, role: &Role, capability: Capability) -> bool {
        self.entries
            .get(role)
            .is_some_and(|caps| caps.contains(&capability) || caps.contains(&Capability::All))
    }

    /// Returns a sorted summary of the table, one entry per known role.
    #[must_use]
    pub fn summary(&self) -> Vec<RoleSummary> {
        Role::known()
            .iter()
            .map(|role| {
                let mut capabilities: Vec<Capability> =
                    self.capabilities_of(role).into_iter().collect();
                capabilities.sort();
                RoleSummary {
                    role: role.clone(),
                    bypass: role.bypasses_checks(),
                    capabilities,
                }
            })
            .collect()
    }
}

/// Summary of a role's capabilities.
#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    /// The role.
    pub role: Role,
    /// Whether the role bypasses capability checks.
    pub bypass: bool,
    /// Capabilities listed in the table, sorted.
    pub capabilities: Vec<Capability>,
}
