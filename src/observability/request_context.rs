//! Correlation ids for service calls.
//!
//! A call's context is entered on the thread that executes it and read back
//! by storage code when it logs. HTTP handlers hand calls to the blocking
//! pool, so the executing thread is always the one holding the context.

use std::cell::RefCell;
use uuid::Uuid;

/// Correlation id attached to one call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    request_id: String,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Generates a fresh v4 id.
    #[must_use]
    pub fn new() -> Self {
        Self::from_id(Uuid::new_v4().to_string())
    }

    /// Wraps an id supplied by the caller.
    #[must_use]
    pub fn from_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }

    /// The correlation id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

thread_local! {
    static ACTIVE: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Restores the enclosing call's context when dropped.
#[derive(Debug)]
pub struct RequestContextGuard {
    outer: Option<RequestContext>,
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        let outer = self.outer.take();
        ACTIVE.with(|slot| *slot.borrow_mut() = outer);
    }
}

/// Makes `context` the active one on this thread until the guard drops.
#[must_use]
pub fn enter_request_context(context: RequestContext) -> RequestContextGuard {
    let outer = ACTIVE.with(|slot| slot.borrow_mut().replace(context));
    RequestContextGuard { outer }
}

/// Id of the call running on this thread, if any.
#[must_use]
pub fn current_request_id() -> Option<String> {
    ACTIVE.with(|slot| slot.borrow().as_ref().map(|ctx| ctx.request_id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_calls_restore_outer_id() {
        {
            let _outer = enter_request_context(RequestContext::from_id("outer"));
            {
                let _inner = enter_request_context(RequestContext::from_id("inner"));
                assert_eq!(current_request_id().as_deref(), Some("inner"));
            }
            assert_eq!(current_request_id().as_deref(), Some("outer"));
        }
        assert_eq!(current_request_id(), None);
    }

    #[test]
    fn test_context_does_not_leak_across_threads() {
        let _guard = enter_request_context(RequestContext::from_id("main"));
        let seen = std::thread::spawn(current_request_id).join().unwrap();
        assert_eq!(seen, None);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(RequestContext::new(), RequestContext::new());
    }
}
