//! Authorization: role table, guard and per-call pipeline.

mod guard;
mod operation;
mod pipeline;
pub mod rbac;

pub use guard::{AuthorizationGuard, AuthorizationOutcome, Decision, DenyReason, Identity};
pub use operation::Operation;
pub use pipeline::{
    CallContext, CapabilityStage, HeaderSource, IdentityStage, Pipeline, Stage, USER_ID_HEADER,
    USER_ROLE_HEADER,
};
pub use rbac::{Capability, Role, RoleCapabilityTable, RoleSummary};
