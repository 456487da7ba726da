//! HTTP surface built on `axum`.
//!
//! Routes under the configured base:
//!
//! - `{base}/polyform/{facet}` for every verb;
//! - `{base}/health`;
//! - everything else falls through to the dispatcher's `404`.
//!
//! Handlers never run facet code on the async runtime. Each call moves to the
//! blocking pool, and any pause requested by the translator (the fixed
//! authentication failure delay) is slept here before the response leaves.

mod envelope;
mod headers;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::any;
use polyapi_plugins::{RequestEnvelope, ResponseEnvelope};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

pub use self::headers::SERVER_NAME;
use self::envelope::build_envelope;
use crate::bootstrap::Daemon;
use crate::dispatch::Dispatcher;
use crate::endpoints::{FACET_PARAM, HEALTH_PATH, POLYFORM_PATH};
use crate::heartbeat::spawn_monitor;

/// Tracing target for the HTTP transport.
const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");

/// Message sent for faults the dispatcher did not translate.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// Failures while binding or serving HTTP.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listener could not bind.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Address from the configuration.
        address: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The server loop stopped with an error.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] io::Error),
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

/// Builds the router for `dispatcher` under `route_base`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use polyapid::{Dispatcher, router};
///
/// let app = router("/api/v1", Arc::new(Dispatcher::builder().build()));
/// let _ = app;
/// ```
pub fn router(route_base: &str, dispatcher: Arc<Dispatcher>) -> Router {
    let base = route_base.trim_end_matches('/');
    Router::new()
        .route(&format!("{base}/{POLYFORM_PATH}/{{facet}}"), any(polyform))
        .route(&format!("{base}/{HEALTH_PATH}"), any(health))
        .fallback(unrouted)
        .with_state(AppState { dispatcher })
        .layer(middleware::from_fn(headers::secure_headers))
}

/// Binds the configured address and serves until `shutdown` resolves.
///
/// The heartbeat monitor runs for as long as the server does.
///
/// # Errors
///
/// Returns [`ServeError`] when the listener cannot bind or the server loop
/// fails.
pub async fn serve<F>(daemon: Daemon, shutdown: F) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = daemon.config().listen_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServeError::Bind {
            address: address.clone(),
            source,
        })?;
    let local: SocketAddr = listener.local_addr().map_err(ServeError::Serve)?;
    daemon.reporter().server_listening(local);

    let monitor = spawn_monitor(
        Arc::clone(daemon.heartbeat()),
        Arc::clone(daemon.dispatcher()),
        daemon.catalog().len(),
        std::time::Duration::from_secs(daemon.config().status_report_secs()),
        Arc::clone(daemon.reporter()),
    );
    let app = router(daemon.config().route_base(), Arc::clone(daemon.dispatcher()));

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve);
    monitor.abort();
    info!(target: HTTP_TARGET, "HTTP server stopped");
    served
}

type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

async fn polyform(
    State(state): State<AppState>,
    Path(facet): Path<String>,
    method: Method,
    query: QueryPairs,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match parse_request(query, &headers, &body) {
        Ok(envelope) => {
            let request = envelope.with_param(FACET_PARAM, facet);
            dispatch(state, method, POLYFORM_PATH.to_owned(), request).await
        }
        Err(message) => reject(&state, &method, POLYFORM_PATH, &message),
    }
}

async fn health(
    State(state): State<AppState>,
    method: Method,
    query: QueryPairs,
    headers: HeaderMap,
) -> Response {
    match parse_request(query, &headers, &[]) {
        Ok(envelope) => dispatch(state, method, HEALTH_PATH.to_owned(), envelope).await,
        Err(message) => reject(&state, &method, HEALTH_PATH, &message),
    }
}

fn parse_request(
    query: QueryPairs,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<RequestEnvelope, String> {
    let Query(pairs) =
        query.map_err(|rejection| format!("Invalid query string: {}", rejection.body_text()))?;
    build_envelope(headers, pairs, body)
        .map_err(|message| format!("Invalid JSON body: {message}"))
}

/// Answers an unparseable request through the dispatcher so it is counted
/// and logged with a request id like any other call.
fn reject(state: &AppState, method: &Method, path_key: &str, message: &str) -> Response {
    let outcome = state
        .dispatcher
        .reject(method.as_str(), path_key, StatusCode::BAD_REQUEST, message);
    (outcome.status, Json(outcome.body)).into_response()
}

async fn unrouted(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    dispatch(state, method, uri.path().to_owned(), RequestEnvelope::new()).await
}

async fn dispatch(
    state: AppState,
    method: Method,
    path_key: String,
    envelope: RequestEnvelope,
) -> Response {
    let dispatcher = state.dispatcher;
    let joined = tokio::task::spawn_blocking(move || {
        dispatcher.dispatch(method.as_str(), &path_key, &envelope)
    })
    .await;

    match joined {
        Ok(Ok(outcome)) => {
            if let Some(delay) = outcome.delay {
                tokio::time::sleep(delay).await;
            }
            (outcome.status, Json(outcome.body)).into_response()
        }
        Ok(Err(_fault)) => internal_error(),
        Err(join_error) => {
            error!(
                target: HTTP_TARGET,
                error = %join_error,
                "request handler panicked"
            );
            internal_error()
        }
    }
}

fn internal_error() -> Response {
    let body = ResponseEnvelope::failure(INTERNAL_ERROR_MESSAGE);
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body.into_value())).into_response()
}

#[cfg(test)]
mod tests;
