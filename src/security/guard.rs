//! Authorization guard.
//!
//! A pure decision function over the claimed identity, the claimed role and
//! the capability an operation requires. The guard holds no session state
//! and is consulted on every call.

use super::rbac::{Capability, Role, RoleCapabilityTable};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A caller identity that passed identity extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    user_id: String,
    role: Role,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Returns the opaque user identifier.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the claimed role.
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.role
    }
}

/// Why a call was denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Identity or role absent.
    Unauthenticated,
    /// The role does not hold the capability.
    Forbidden {
        /// Role that was checked.
        role: Role,
        /// Required capability, as its wire name.
        capability: String,
    },
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("authentication required"),
            Self::Forbidden { role, capability } => {
                write!(f, "role '{role}' lacks capability '{capability}'")
            },
        }
    }
}

/// Outcome of a single authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed.
    Allow,
    /// The call must be rejected.
    Deny(DenyReason),
}

impl Decision {
    /// Returns true if the call may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts the decision into a result, mapping denials to their error kinds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] or [`Error::Forbidden`] on denial.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason @ DenyReason::Unauthenticated) => {
                Err(Error::Unauthenticated(reason.to_string()))
            },
            Self::Deny(reason @ DenyReason::Forbidden { .. }) => {
                Err(Error::Forbidden(reason.to_string()))
            },
        }
    }
}

/// Serializable answer to an `authorize(role, capability)` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationOutcome {
    /// Whether the role may perform the capability.
    pub allowed: bool,
    /// Denial reason, absent when allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<Decision> for AuthorizationOutcome {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self {
                allowed: true,
                reason: None,
            },
            Decision::Deny(reason) => Self {
                allowed: false,
                reason: Some(reason.to_string()),
            },
        }
    }
}

/// Capability checker backed by an immutable [`RoleCapabilityTable`].
#[derive(Debug, Clone)]
pub struct AuthorizationGuard {
    table: Arc<RoleCapabilityTable>,
}

impl AuthorizationGuard {
    /// Creates a guard over a shared table.
    #[must_use]
    pub const fn new(table: Arc<RoleCapabilityTable>) -> Self {
        Self { table }
    }

    /// Returns the table this guard consults.
    #[must_use]
    pub fn table(&self) -> &RoleCapabilityTable {
        &self.table
    }

    /// Decides whether a caller may use `required`.
    ///
    /// An empty user id counts as absent.
    #[must_use]
    pub fn authorize(
        &self,
        user_id: Option<&str>,
        role: Option<&Role>,
        required: Capability,
    ) -> Decision {
        let (Some(user_id), Some(role)) = (user_id.filter(|id| !id.is_empty()), role) else {
            return Decision::Deny(DenyReason::Unauthenticated);
        };
        self.decide(user_id, role, required.as_str(), Some(required))
    }

    /// Decides for an already extracted identity.
    #[must_use]
    pub fn check(&self, identity: Option<&Identity>, required: Capability) -> Decision {
        match identity {
            Some(identity) => self.authorize(Some(identity.user_id()), Some(identity.role()), required),
            None => Decision::Deny(DenyReason::Unauthenticated),
        }
    }

    /// Answers an `authorize(role, capability)` query over raw strings.
    ///
    /// The identity is taken as present. An unrecognized capability string
    /// is allowed only for the bypass roles.
    #[must_use]
    pub fn evaluate(&self, role: &str, capability: &str) -> AuthorizationOutcome {
        let role = Role::parse(role);
        self.decide("-", &role, capability.trim(), Capability::parse(capability))
            .into()
    }

    fn decide(
        &self,
        user_id: &str,
        role: &Role,
        label: &str,
        capability: Option<Capability>,
    ) -> Decision {
        let decision = if role.bypasses_checks()
            || capability.is_some_and(|cap| self.table.holds(role, cap))
        {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::Forbidden {
                role: role.clone(),
                capability: label.to_string(),
            })
        };

        if decision.is_allowed() {
            tracing::debug!(
                user_id,
                role = %role,
                capability = label,
                bypass = role.bypasses_checks(),
                "Authorization granted"
            );
            metrics::counter!("authorization_decisions_total", "outcome" => "allow").increment(1);
        } else {
            tracing::warn!(
                user_id,
                role = %role,
                capability = label,
                "Authorization denied"
            );
            metrics::counter!("authorization_decisions_total", "outcome" => "deny").increment(1);
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn guard() -> AuthorizationGuard {
        AuthorizationGuard::new(Arc::new(RoleCapabilityTable::standard()))
    }

    #[test]
    fn test_missing_identity_is_unauthenticated() {
        let guard = guard();
        let role = Role::Admin;
        assert_eq!(
            guard.authorize(None, Some(&role), Capability::ViewReports),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            guard.authorize(Some(""), Some(&role), Capability::ViewReports),
            Decision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            guard.authorize(Some("7"), None, Capability::ViewReports),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn test_bypass_ignores_table_contents() {
        let table = RoleCapabilityTable::with_overrides([
            (Role::Admin, HashSet::new()),
            (Role::Director, HashSet::new()),
        ])
        .unwrap();
        let guard = AuthorizationGuard::new(Arc::new(table));
        for cap in Capability::all() {
            assert!(guard.authorize(Some("1"), Some(&Role::Admin), *cap).is_allowed());
            assert!(guard.authorize(Some("1"), Some(&Role::Director), *cap).is_allowed());
        }
    }

    #[test]
    fn test_forbidden_names_role_and_capability() {
        let decision = guard().authorize(Some("9"), Some(&Role::Teacher), Capability::DeleteGrades);
        let err = decision.into_result().unwrap_err();
        assert!(matches!(err, crate::Error::Forbidden(_)));
        let message = err.to_string();
        assert!(message.contains("professor"));
        assert!(message.contains("delete_notas"));
    }

    #[test]
    fn test_padded_bypass_role_is_not_bypassed() {
        let outcome = guard().evaluate("admin ", "delete_alunos");
        assert!(!outcome.allowed);
        assert!(guard().evaluate("admin", "delete_alunos").allowed);
    }

    #[test]
    fn test_unknown_role_is_forbidden_not_unauthenticated() {
        let role = Role::parse("estagiario");
        let decision = guard().authorize(Some("3"), Some(&role), Capability::ViewDashboard);
        assert!(matches!(decision, Decision::Deny(DenyReason::Forbidden { .. })));
    }

    #[test]
    fn test_check_uses_identity() {
        let guard = guard();
        let identity = Identity::new("5", Role::Secretary);
        assert!(guard.check(Some(&identity), Capability::CreateStudents).is_allowed());
        assert_eq!(
            guard.check(None, Capability::CreateStudents),
            Decision::Deny(DenyReason::Unauthenticated)
        );
    }

    #[test]
    fn test_evaluate_serializes_reason_only_on_denial() {
        let guard = guard();
        let allowed = guard.evaluate("coordenador", "view_relatorios");
        assert_eq!(serde_json::to_value(&allowed).unwrap(), serde_json::json!({"allowed": true}));

        let denied = guard.evaluate("secretaria", "delete_alunos");
        assert!(!denied.allowed);
        assert!(denied.reason.unwrap().contains("delete_alunos"));
    }

    #[test]
    fn test_evaluate_unknown_capability() {
        let guard = guard();
        assert!(guard.evaluate("diretor", "launch_rockets").allowed);
        assert!(!guard.evaluate("coordenador", "launch_rockets").allowed);
    }

    #[test]
    fn test_guard_does_not_cache_decisions() {
        let guard = guard();
        let teacher = Role::Teacher;
        assert!(guard.authorize(Some("1"), Some(&teacher), Capability::CreateGrades).is_allowed());
        assert!(!guard.authorize(Some("1"), Some(&teacher), Capability::DeleteGrades).is_allowed());
        assert!(guard.authorize(Some("1"), Some(&teacher), Capability::CreateGrades).is_allowed());
    }
}
