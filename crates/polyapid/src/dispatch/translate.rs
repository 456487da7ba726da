//! Pure mapping from facet errors to HTTP responses.

use std::time::Duration;

use axum::http::StatusCode;
use polyapi_plugins::{FacetError, ResponseEnvelope, ResponseStatus};
use serde_json::Value;

/// Pause applied before answering an authentication failure.
pub const DEFAULT_AUTH_DELAY: Duration = Duration::from_secs(5);

/// Body sent for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// HTTP rendering of a translated error.
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Response status code.
    pub status: StatusCode,
    /// JSON object body carrying `status: "failed"`.
    pub body: Value,
    /// Pause the transport must apply before sending the response.
    pub delay: Option<Duration>,
}

/// Maps [`FacetError`] variants to status codes and bodies.
///
/// Internal faults are never translated; they belong to the transport's
/// generic fault handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorTranslator {
    auth_delay: Duration,
}

impl ErrorTranslator {
    /// Builds a translator with the given authentication failure delay.
    #[must_use]
    pub const fn new(auth_delay: Duration) -> Self {
        Self { auth_delay }
    }

    /// Returns the authentication failure delay.
    #[must_use]
    pub const fn auth_delay(&self) -> Duration {
        self.auth_delay
    }

    /// Translates `error`, or returns `None` for an internal fault.
    ///
    /// # Example
    ///
    /// ```
    /// use axum::http::StatusCode;
    /// use polyapi_plugins::FacetError;
    /// use polyapid::ErrorTranslator;
    /// use serde_json::json;
    ///
    /// let translation = ErrorTranslator::default()
    ///     .translate(&FacetError::validation("amount is required"))
    ///     .expect("validation failures are translated");
    /// assert_eq!(translation.status, StatusCode::BAD_REQUEST);
    /// assert_eq!(translation.body, json!({"status": "failed", "message": "amount is required"}));
    /// ```
    #[must_use]
    pub fn translate(&self, error: &FacetError) -> Option<Translation> {
        match error {
            FacetError::AuthFailure { .. } => Some(Translation {
                status: StatusCode::UNAUTHORIZED,
                body: ResponseEnvelope::failure(UNAUTHORIZED_MESSAGE).into_value(),
                delay: Some(self.auth_delay),
            }),
            FacetError::ValidationFailure { message, detail }
            | FacetError::NotFound { message, detail } => {
                let body = detail.as_ref().map_or_else(
                    || ResponseEnvelope::failure(message.as_str()),
                    |fields| {
                        ResponseEnvelope::from_map(fields.clone())
                            .with_status(ResponseStatus::Failed)
                    },
                );
                Some(Translation {
                    status: StatusCode::BAD_REQUEST,
                    body: body.into_value(),
                    delay: None,
                })
            }
            FacetError::InternalFault { .. } => None,
        }
    }
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_DELAY)
    }
}
