//! Capability tables binding operations to handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use polyapi_plugins::{FacetError, RequestEnvelope, ResponseEnvelope};

use super::debug::DebugFlags;
use super::verb::Operation;

/// Per-call state shared with a handler.
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    path_key: String,
    operation: Operation,
    debug: DebugFlags,
}

impl CallContext {
    /// Builds a context for one dispatched call.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        path_key: impl Into<String>,
        operation: Operation,
        debug: DebugFlags,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            path_key: path_key.into(),
            operation,
            debug,
        }
    }

    /// Returns the correlation id assigned to this call.
    #[must_use]
    pub const fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Returns the mounted path key.
    #[must_use]
    pub const fn path_key(&self) -> &str {
        self.path_key.as_str()
    }

    /// Returns the operation being served.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Reports whether a process-wide debug flag is enabled.
    #[must_use]
    pub fn debug_enabled(&self, flag: &str) -> bool {
        self.debug.is_set(flag)
    }
}

/// Successful handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerReply {
    /// Response status code.
    pub status: StatusCode,
    /// Response body.
    pub body: ResponseEnvelope,
}

impl HandlerReply {
    /// Wraps a body with `200 OK`.
    #[must_use]
    pub const fn ok(body: ResponseEnvelope) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    /// Wraps a body with an explicit status.
    #[must_use]
    pub const fn with_status(status: StatusCode, body: ResponseEnvelope) -> Self {
        Self { status, body }
    }
}

/// Handler bound to one operation.
pub type Handler =
    Arc<dyn Fn(&CallContext, &RequestEnvelope) -> Result<HandlerReply, FacetError> + Send + Sync>;

/// Explicit operation to handler mapping for one path.
///
/// # Example
///
/// ```
/// use polyapid::{CapabilityTable, HandlerReply, Operation};
/// use polyapi_plugins::ResponseEnvelope;
///
/// let table = CapabilityTable::new()
///     .on(Operation::Read, |_ctx, _envelope| Ok(HandlerReply::ok(ResponseEnvelope::success())));
/// assert!(table.supports(Operation::Read));
/// assert!(!table.supports(Operation::Delete));
/// ```
#[derive(Clone, Default)]
pub struct CapabilityTable {
    handlers: BTreeMap<Operation, Handler>,
}

impl CapabilityTable {
    /// Creates a table with no operations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `operation`, replacing any earlier binding.
    #[must_use]
    pub fn on<F>(mut self, operation: Operation, handler: F) -> Self
    where
        F: Fn(&CallContext, &RequestEnvelope) -> Result<HandlerReply, FacetError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(operation, Arc::new(handler));
        self
    }

    /// Reports whether `operation` is implemented.
    #[must_use]
    pub fn supports(&self, operation: Operation) -> bool {
        self.handlers.contains_key(&operation)
    }

    /// Returns the handler for `operation`.
    #[must_use]
    pub fn get(&self, operation: Operation) -> Option<&Handler> {
        self.handlers.get(&operation)
    }

    /// Iterates over implemented operations in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.handlers.keys().copied()
    }
}

impl fmt::Debug for CapabilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityTable")
            .field("operations", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
