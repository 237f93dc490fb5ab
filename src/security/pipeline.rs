//! Per-call authorization pipeline.
//!
//! A call passes through an ordered list of [`Stage`]s before it reaches the
//! record store. The standard pipeline has two stages:
//!
//! 1. [`IdentityStage`] turns the claimed `user_id` / `user_role` fields into
//!    an [`Identity`] on the context (or leaves it empty).
//! 2. [`CapabilityStage`] asks the [`AuthorizationGuard`] whether that
//!    identity may perform the operation.
//!
//! Stages operate on a [`CallContext`] and know nothing about routes, so the
//! same pipeline serves the CLI, the HTTP adapter and tests.

use super::guard::{AuthorizationGuard, Identity};
use super::operation::Operation;
use super::rbac::Role;
use crate::Result;
use crate::observability::RequestContext;
use std::collections::HashMap;
use tracing::info_span;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the caller's role.
pub const USER_ROLE_HEADER: &str = "x-user-cargo";

/// Source of header-like key/value pairs.
pub trait HeaderSource {
    /// Returns the value of a header, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Per-call context threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct CallContext {
    request: RequestContext,
    claimed_user_id: Option<String>,
    claimed_role: Option<String>,
    identity: Option<Identity>,
}

impl CallContext {
    /// Creates a context from the claimed identity fields.
    #[must_use]
    pub fn new(user_id: Option<&str>, role: Option<&str>) -> Self {
        Self {
            request: RequestContext::new(),
            claimed_user_id: user_id.map(str::to_string),
            claimed_role: role.map(str::to_string),
            identity: None,
        }
    }

    /// Creates a context with no claimed identity.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(None, None)
    }

    /// Creates a context from request headers.
    #[must_use]
    pub fn from_headers<H: HeaderSource + ?Sized>(headers: &H) -> Self {
        Self::new(headers.header(USER_ID_HEADER), headers.header(USER_ROLE_HEADER))
    }

    /// Replaces the generated correlation id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request = RequestContext::from_id(request_id);
        self
    }

    /// Returns the correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.request.request_id()
    }

    /// Returns the request context for correlation propagation.
    #[must_use]
    pub const fn request(&self) -> &RequestContext {
        &self.request
    }

    /// Returns the claimed user id, as received.
    #[must_use]
    pub fn claimed_user_id(&self) -> Option<&str> {
        self.claimed_user_id.as_deref()
    }

    /// Returns the claimed role string, as received.
    #[must_use]
    pub fn claimed_role(&self) -> Option<&str> {
        self.claimed_role.as_deref()
    }

    /// Returns the extracted identity, if identity extraction succeeded.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    /// Returns the stage name for tracing.
    fn name(&self) -> &'static str;

    /// Processes the call; an error stops the pipeline.
    fn process(&self, ctx: &mut CallContext, operation: Operation) -> Result<()>;
}

/// Extracts the identity from the claimed fields.
///
/// Missing or empty fields leave the identity unset; rejecting the call is
/// left to the capability stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStage;

impl Stage for IdentityStage {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn process(&self, ctx: &mut CallContext, _operation: Operation) -> Result<()> {
        let user_id = ctx.claimed_user_id().filter(|id| !id.trim().is_empty());
        let role = ctx.claimed_role().filter(|role| !role.trim().is_empty());

        let identity = match (user_id, role) {
            (Some(user_id), Some(role)) => {
                let role = Role::parse(role);
                if role.is_unknown() {
                    tracing::debug!(role = %role, "Unrecognized role claimed");
                }
                Some(Identity::new(user_id.trim(), role))
            },
            _ => None,
        };
        ctx.set_identity(identity);
        Ok(())
    }
}

/// Enforces the operation's required capability.
#[derive(Debug, Clone)]
pub struct CapabilityStage {
    guard: AuthorizationGuard,
}

impl CapabilityStage {
    /// Creates the stage around a guard.
    #[must_use]
    pub const fn new(guard: AuthorizationGuard) -> Self {
        Self { guard }
    }
}

impl Stage for CapabilityStage {
    fn name(&self) -> &'static str {
        "capability"
    }

    fn process(&self, ctx: &mut CallContext, operation: Operation) -> Result<()> {
        self.guard
            .check(ctx.identity(), operation.required_capability())
            .into_result()
    }
}

/// Ordered list of stages.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Creates an empty pipeline. An empty pipeline allows everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the identity + capability pipeline.
    #[must_use]
    pub fn standard(guard: AuthorizationGuard) -> Self {
        Self::new()
            .with_stage(IdentityStage)
            .with_stage(CapabilityStage::new(guard))
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the stage names, in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Runs every stage in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first stage error; authorization errors are terminal for
    /// the call.
    pub fn run(&self, ctx: &mut CallContext, operation: Operation) -> Result<()> {
        let span = info_span!(
            "classbook.authorize",
            request_id = ctx.request_id(),
            operation = operation.name(),
        );
        let _guard = span.enter();

        for stage in &self.stages {
            if let Err(err) = stage.process(ctx, operation) {
                tracing::info!(
                    stage = stage.name(),
                    kind = err.kind().as_str(),
                    "Call rejected"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}
