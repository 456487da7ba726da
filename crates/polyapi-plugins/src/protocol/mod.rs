//! Wire types for process-backed entry points.
//!
//! The exchange is a single JSONL line in each direction. The host writes one
//! [`ProcessRequest`] to the child's stdin and closes it. The child writes one
//! [`ProcessReply`] to stdout and exits with status zero. Stderr is captured
//! for diagnostics only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope};
use crate::error::{Detail, ErrorKind, FacetError};

/// Request envelope as seen by a child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopePayload {
    /// Lower-cased request headers.
    pub headers: BTreeMap<String, String>,
    /// Parsed JSON body, `null` when absent.
    pub parsed_body: Value,
}

impl From<&RequestEnvelope> for EnvelopePayload {
    fn from(envelope: &RequestEnvelope) -> Self {
        Self {
            headers: envelope.headers().clone(),
            parsed_body: envelope.parsed_body().clone(),
        }
    }
}

/// Line written to a child's stdin.
///
/// # Example
///
/// ```
/// use polyapi_plugins::protocol::ProcessRequest;
/// use polyapi_plugins::{FacetContext, RequestEnvelope};
///
/// let context = FacetContext::new("billing.invoice", "/srv/polys/billing/invoice", "2a");
/// let request = ProcessRequest::new("process", &RequestEnvelope::new(), &context);
/// let line = serde_json::to_string(&request).expect("serialises");
/// assert!(line.contains(r#""function":"process""#));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    function: String,
    envelope: EnvelopePayload,
    context: FacetContext,
}

impl ProcessRequest {
    /// Builds the request for one invocation.
    #[must_use]
    pub fn new(function: impl Into<String>, envelope: &RequestEnvelope, context: &FacetContext) -> Self {
        Self {
            function: function.into(),
            envelope: EnvelopePayload::from(envelope),
            context: context.clone(),
        }
    }

    /// Returns the function the child should run.
    #[must_use]
    pub const fn function(&self) -> &str {
        self.function.as_str()
    }

    /// Returns the envelope payload.
    #[must_use]
    pub const fn envelope(&self) -> &EnvelopePayload {
        &self.envelope
    }

    /// Returns the invocation context.
    #[must_use]
    pub const fn context(&self) -> &FacetContext {
        &self.context
    }
}

/// Error reported by a child process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedError {
    /// Error discriminator.
    pub kind: ErrorKind,
    /// Human message.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Detail>,
}

/// Line read from a child's stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessReply {
    /// The function returned a response object.
    Result(Map<String, Value>),
    /// The function raised an error.
    Error(ReportedError),
}

impl ProcessReply {
    /// Converts the reply into the entry point outcome.
    ///
    /// # Errors
    ///
    /// Returns the reported [`FacetError`] for [`ProcessReply::Error`].
    pub fn into_outcome(self) -> Result<ResponseEnvelope, FacetError> {
        match self {
            Self::Result(fields) => Ok(ResponseEnvelope::from_map(fields)),
            Self::Error(reported) => Err(FacetError::from_reported(
                reported.kind,
                reported.message,
                reported.detail,
            )),
        }
    }
}
