//! Generic verb dispatch for mounted capability tables.
//!
//! A [`Dispatcher`] owns one [`CapabilityTable`] per path key. Each call is
//! assigned a request id and runs inside a `tracing` span carrying it, so every
//! log line emitted while serving the call can be correlated. The HTTP method
//! is mapped to an [`Operation`] and the bound handler runs synchronously.
//!
//! Handler errors are routed through the [`ErrorTranslator`]. Anything it
//! declines to translate is an internal fault: it is logged with its trace and
//! handed back to the transport untouched.
//!
//! The `abac=log` request option enables the process-wide [`ABAC_FLAG`] for
//! the duration of one call. The flag is held by a [`DebugScope`] and cleared
//! on every exit path, unwinding included.

mod debug;
mod errors;
mod request_id;
mod table;
mod translate;
mod verb;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::http::StatusCode;
use polyapi_plugins::{FacetError, RequestEnvelope, ResponseEnvelope};
use serde_json::Value;
use tracing::{debug, error, info, info_span};

pub use self::debug::{ABAC_FLAG, DebugFlags, DebugScope};
pub use self::errors::DispatchError;
pub use self::request_id::RequestIdGenerator;
pub use self::table::{CallContext, CapabilityTable, Handler, HandlerReply};
pub use self::translate::{DEFAULT_AUTH_DELAY, ErrorTranslator, Translation, UNAUTHORIZED_MESSAGE};
pub use self::verb::Operation;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Message sent for unknown path keys.
pub const NOT_FOUND_MESSAGE: &str = "Not Found";

/// Request option that scopes the `abac` debug flag to one call.
const ABAC_OPTION: &str = "abac";

/// Rendered response for a dispatched call.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Correlation id assigned to the call.
    pub request_id: String,
    /// Response status code.
    pub status: StatusCode,
    /// JSON object body; always carries `status`.
    pub body: Value,
    /// Pause to apply before sending the response.
    pub delay: Option<Duration>,
}

/// Builder validating capability tables as they are mounted.
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    routes: BTreeMap<String, CapabilityTable>,
    translator: ErrorTranslator,
    debug: DebugFlags,
    ids: Option<RequestIdGenerator>,
}

impl DispatcherBuilder {
    /// Starts an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the error translator.
    #[must_use]
    pub fn translator(mut self, translator: ErrorTranslator) -> Self {
        self.translator = translator;
        self
    }

    /// Shares an existing debug flag set.
    #[must_use]
    pub fn debug_flags(mut self, debug: DebugFlags) -> Self {
        self.debug = debug;
        self
    }

    /// Replaces the randomly seeded request id source.
    #[must_use]
    pub fn request_ids(mut self, ids: RequestIdGenerator) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Mounts `table` under `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicatePath`] when `path` is already mounted
    /// and [`DispatchError::MissingCapability`] when the table lacks one of
    /// the `required` operations.
    pub fn mount(
        mut self,
        path: impl Into<String>,
        table: CapabilityTable,
        required: &[Operation],
    ) -> Result<Self, DispatchError> {
        let path_key = path.into();
        if self.routes.contains_key(&path_key) {
            return Err(DispatchError::DuplicatePath { path: path_key });
        }
        if let Some(operation) = required.iter().copied().find(|op| !table.supports(*op)) {
            return Err(DispatchError::MissingCapability {
                path: path_key,
                operation,
            });
        }
        debug!(
            target: DISPATCH_TARGET,
            path = path_key.as_str(),
            operations = ?table.operations().collect::<Vec<_>>(),
            "mounted capability table"
        );
        self.routes.insert(path_key, table);
        Ok(self)
    }

    /// Finishes the dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        Dispatcher {
            routes: self.routes,
            translator: self.translator,
            debug: self.debug,
            ids: self.ids.unwrap_or_default(),
            served: AtomicU64::new(0),
        }
    }
}

/// Routes calls to mounted capability tables.
#[derive(Debug)]
pub struct Dispatcher {
    routes: BTreeMap<String, CapabilityTable>,
    translator: ErrorTranslator,
    debug: DebugFlags,
    ids: RequestIdGenerator,
    served: AtomicU64,
}

impl Dispatcher {
    /// Starts a [`DispatcherBuilder`].
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Dispatches one call.
    ///
    /// Unknown path keys answer `404`, unimplemented operations `405`, and
    /// translated handler errors their mapped status.
    ///
    /// # Errors
    ///
    /// Returns the handler's [`FacetError::InternalFault`] untranslated after
    /// logging it with its trace.
    pub fn dispatch(
        &self,
        method: &str,
        path_key: &str,
        envelope: &RequestEnvelope,
    ) -> Result<DispatchOutcome, FacetError> {
        let request_id = self.ids.next_id();
        let span = info_span!(
            target: DISPATCH_TARGET,
            "dispatch",
            request_id = request_id.as_str(),
            method,
            path = path_key
        );
        let _entered = span.enter();
        self.served.fetch_add(1, Ordering::Relaxed);

        match self.route(method, path_key, envelope, &request_id) {
            Ok((status, body, delay)) => {
                info!(
                    target: DISPATCH_TARGET,
                    r#type = "http",
                    status = status.as_u16(),
                    method,
                    path = path_key,
                    request_id = request_id.as_str(),
                    "request served"
                );
                Ok(DispatchOutcome {
                    request_id,
                    status,
                    body,
                    delay,
                })
            }
            Err(fault) => {
                if let FacetError::InternalFault { message, trace } = &fault {
                    error!(
                        target: DISPATCH_TARGET,
                        r#type = "error",
                        fault = message.as_str(),
                        traceback = &**trace,
                        "internal fault while serving request"
                    );
                }
                info!(
                    target: DISPATCH_TARGET,
                    r#type = "http",
                    status = StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    method,
                    path = path_key,
                    request_id = request_id.as_str(),
                    "request failed"
                );
                Err(fault)
            }
        }
    }

    /// Answers a call the transport could not parse with a failure body.
    ///
    /// No handler runs, but the call gets a request id, counts towards
    /// [`Dispatcher::requests_served`] and writes the usual access line.
    #[must_use]
    pub fn reject(
        &self,
        method: &str,
        path_key: &str,
        status: StatusCode,
        message: &str,
    ) -> DispatchOutcome {
        let request_id = self.ids.next_id();
        self.served.fetch_add(1, Ordering::Relaxed);
        info!(
            target: DISPATCH_TARGET,
            r#type = "http",
            status = status.as_u16(),
            method,
            path = path_key,
            request_id = request_id.as_str(),
            reason = message,
            "request rejected"
        );
        DispatchOutcome {
            request_id,
            status,
            body: ResponseEnvelope::failure(message).into_value(),
            delay: None,
        }
    }

    fn route(
        &self,
        method: &str,
        path_key: &str,
        envelope: &RequestEnvelope,
        request_id: &str,
    ) -> Result<(StatusCode, Value, Option<Duration>), FacetError> {
        let Some(table) = self.routes.get(path_key) else {
            return Ok(failure(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE));
        };
        let bound = Operation::from_method(method)
            .and_then(|operation| table.get(operation).map(|handler| (operation, handler)));
        let Some((operation, handler)) = bound else {
            return Ok(failure(
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("HTTP {method} is not a supported method"),
            ));
        };

        let _abac = (envelope.param(ABAC_OPTION) == Some("log"))
            .then(|| self.debug.scope(ABAC_FLAG));
        let context = CallContext::new(request_id, path_key, operation, self.debug.clone());

        match handler(&context, envelope) {
            Ok(reply) => {
                let mut body = reply.body;
                body.ensure_status();
                Ok((reply.status, body.into_value(), None))
            }
            Err(err) => {
                if let FacetError::AuthFailure { message } = &err {
                    info!(
                        target: DISPATCH_TARGET,
                        r#type = "authfail",
                        reason = message.as_str(),
                        "authorization rejected"
                    );
                }
                match self.translator.translate(&err) {
                    Some(translation) => {
                        Ok((translation.status, translation.body, translation.delay))
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// Returns the number of calls dispatched so far.
    #[must_use]
    pub fn requests_served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Returns the shared debug flag set.
    #[must_use]
    pub const fn debug_flags(&self) -> &DebugFlags {
        &self.debug
    }

    /// Iterates over mounted path keys in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}

fn failure(status: StatusCode, message: &str) -> (StatusCode, Value, Option<Duration>) {
    (status, ResponseEnvelope::failure(message).into_value(), None)
}
