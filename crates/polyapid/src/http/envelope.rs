//! Request envelope extraction from HTTP parts.

use axum::http::HeaderMap;
use polyapi_plugins::RequestEnvelope;
use serde_json::Value;

/// Builds an envelope from headers, query pairs and a raw JSON body.
///
/// Headers that are not valid UTF-8 are dropped. An empty body parses as
/// `null`.
///
/// # Errors
///
/// Returns the JSON parser's message when a non-empty body is not JSON.
pub(crate) fn build_envelope(
    headers: &HeaderMap,
    query: Vec<(String, String)>,
    body: &[u8],
) -> Result<RequestEnvelope, String> {
    let parsed_body = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|err| err.to_string())?
    };

    let mut envelope = RequestEnvelope::new().with_body(parsed_body);
    for (name, value) in headers {
        if let Ok(text) = value.to_str() {
            envelope.insert_header(name.as_str(), text);
        }
    }
    Ok(query
        .into_iter()
        .fold(envelope, |acc, (name, value)| acc.with_param(name, value)))
}
