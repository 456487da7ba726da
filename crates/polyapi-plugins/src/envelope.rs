//! Request and response envelopes passed to entry points.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FacetError;

/// Field carrying the outcome marker in every response body.
pub const STATUS_FIELD: &str = "status";

/// Outcome marker stored in a response's `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// The operation succeeded.
    Success,
    /// The operation failed.
    Failed,
}

impl ResponseStatus {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped input handed to an entry point.
///
/// Header names are stored lower-cased so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestEnvelope {
    headers: BTreeMap<String, String>,
    parsed_body: Value,
    params: BTreeMap<String, String>,
}

impl RequestEnvelope {
    /// Creates an envelope with no headers, a `null` body and no parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, lower-casing its name.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert_header(name, value);
        self
    }

    /// Inserts a header in place, lower-casing its name.
    pub fn insert_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Sets the parsed body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.parsed_body = body;
        self
    }

    /// Adds a path or query parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Returns all headers keyed by lower-cased name.
    #[must_use]
    pub const fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Looks up a header by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the parsed JSON body, `null` when the request had none.
    #[must_use]
    pub const fn parsed_body(&self) -> &Value {
        &self.parsed_body
    }

    /// Returns path and query parameters.
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Looks up a single parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// JSON object returned by an entry point.
///
/// # Example
///
/// ```
/// use polyapi_plugins::{ResponseEnvelope, ResponseStatus};
/// use serde_json::json;
///
/// let mut response = ResponseEnvelope::from_value(json!({"total": 10})).expect("object");
/// response.ensure_status();
/// assert_eq!(response.status(), Some(ResponseStatus::Success));
/// assert_eq!(response.get("total"), Some(&json!(10)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseEnvelope {
    fields: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Creates an empty response with no status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a response carrying only `status: "success"`.
    #[must_use]
    pub fn success() -> Self {
        Self::new().with_status(ResponseStatus::Success)
    }

    /// Creates a `failed` response with a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new()
            .with_status(ResponseStatus::Failed)
            .with_field("message", Value::String(message.into()))
    }

    /// Wraps an existing JSON object.
    #[must_use]
    pub const fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wraps a JSON value that must be an object.
    ///
    /// # Errors
    ///
    /// Returns an internal fault when `value` is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, FacetError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(FacetError::internal(format!(
                "entry point returned a non-object response: {other}"
            ))),
        }
    }

    /// Sets the `status` field.
    #[must_use]
    pub fn with_status(self, status: ResponseStatus) -> Self {
        self.with_field(STATUS_FIELD, Value::String(status.as_str().to_owned()))
    }

    /// Sets an arbitrary field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns a field by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the parsed `status`, if it is one of the known markers.
    #[must_use]
    pub fn status(&self) -> Option<ResponseStatus> {
        match self.fields.get(STATUS_FIELD)?.as_str()? {
            "success" => Some(ResponseStatus::Success),
            "failed" => Some(ResponseStatus::Failed),
            _ => None,
        }
    }

    /// Fills `status: "success"` when the field is absent, `null`, `false`
    /// or an empty string. Any other value is left untouched.
    pub fn ensure_status(&mut self) {
        let missing = match self.fields.get(STATUS_FIELD) {
            None | Some(Value::Null | Value::Bool(false)) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        };
        if missing {
            self.fields.insert(
                STATUS_FIELD.to_owned(),
                Value::String(ResponseStatus::Success.as_str().to_owned()),
            );
        }
    }

    /// Returns the underlying object.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts into a JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Per-call context handed to an entry point next to the envelope.
///
/// Entry points resolve relative resources against [`FacetContext::base_dir`]
/// instead of the process working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetContext {
    facet: String,
    base_dir: PathBuf,
    request_id: String,
}

impl FacetContext {
    /// Creates a context for one invocation.
    #[must_use]
    pub fn new(
        facet: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            facet: facet.into(),
            base_dir: base_dir.into(),
            request_id: request_id.into(),
        }
    }

    /// Returns the qualified facet name.
    #[must_use]
    pub const fn facet(&self) -> &str {
        self.facet.as_str()
    }

    /// Returns the facet's absolute base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the request id of the current call.
    #[must_use]
    pub const fn request_id(&self) -> &str {
        self.request_id.as_str()
    }

    /// Resolves a facet-relative path against the base directory.
    #[must_use]
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.base_dir.join(relative)
    }
}
