//! Capability tables for the polyform and health endpoints.

use std::sync::Arc;

use axum::http::StatusCode;
use polyapi_plugins::{FacetError, ResponseEnvelope, ResponseStatus};
use serde_json::json;

use crate::dispatch::{
    CapabilityTable, DispatchError, Dispatcher, ErrorTranslator, HandlerReply, Operation,
};
use crate::heartbeat::Heartbeat;
use crate::invoker::FacetInvoker;

/// Path key of the facet endpoint.
pub const POLYFORM_PATH: &str = "polyform";

/// Path key of the health endpoint.
pub const HEALTH_PATH: &str = "health";

/// Path parameter naming the facet.
pub const FACET_PARAM: &str = "facet";

/// Message reported while the heartbeat is stale.
pub const STALE_HEARTBEAT_MESSAGE: &str = "Have not heard a heartbeat";

/// Facet endpoint. Only `POST` is implemented.
#[must_use]
pub fn polyform_table(invoker: FacetInvoker) -> CapabilityTable {
    CapabilityTable::new().on(Operation::Create, move |ctx, envelope| {
        let facet = envelope
            .param(FACET_PARAM)
            .ok_or_else(|| FacetError::validation("Missing polyform facet name"))?;
        invoker.invoke(facet, envelope, ctx).map(HandlerReply::ok)
    })
}

/// Health endpoint. `GET ?detail=true` adds `last-heartbeat` and `version`.
#[must_use]
pub fn health_table(heartbeat: Arc<Heartbeat>, deploy_ver: u64) -> CapabilityTable {
    CapabilityTable::new().on(Operation::Read, move |_ctx, envelope| {
        let mut body = ResponseEnvelope::new();
        if envelope.param("detail") == Some("true") {
            body = body
                .with_field("last-heartbeat", json!(heartbeat.last_beat().unwrap_or(0)))
                .with_field("version", json!(deploy_ver));
        }
        if heartbeat.is_stale() {
            return Ok(HandlerReply::with_status(
                StatusCode::SERVICE_UNAVAILABLE,
                body.with_status(ResponseStatus::Failed)
                    .with_field("message", json!(STALE_HEARTBEAT_MESSAGE)),
            ));
        }
        Ok(HandlerReply::ok(body))
    })
}

/// Mounts both endpoints on a fresh dispatcher.
///
/// # Errors
///
/// Returns [`DispatchError`] when a table misses a required operation.
pub fn build_dispatcher(
    invoker: FacetInvoker,
    heartbeat: Arc<Heartbeat>,
    deploy_ver: u64,
    translator: ErrorTranslator,
) -> Result<Dispatcher, DispatchError> {
    let dispatcher = Dispatcher::builder()
        .translator(translator)
        .mount(POLYFORM_PATH, polyform_table(invoker), &[Operation::Create])?
        .mount(
            HEALTH_PATH,
            health_table(heartbeat, deploy_ver),
            &[Operation::Read],
        )?
        .build();
    Ok(dispatcher)
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use polyapi_plugins::{PluginCatalog, RequestEnvelope, StaticModules};
    use rstest::{fixture, rstest};
    use serde_json::Value;

    use super::*;
    use crate::auth::AllowAll;

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock after epoch")
            .as_secs()
    }

    #[fixture]
    fn heartbeat() -> Arc<Heartbeat> {
        Arc::new(Heartbeat::new(Duration::from_secs(10)))
    }

    fn dispatcher_for(heartbeat: Arc<Heartbeat>) -> Dispatcher {
        let root = tempfile::tempdir().expect("temp dir");
        let catalog = PluginCatalog::load(root.path(), &StaticModules::new()).expect("empty tree");
        let invoker = FacetInvoker::new(Arc::new(catalog), Arc::new(AllowAll));
        build_dispatcher(invoker, heartbeat, 7, ErrorTranslator::default()).expect("mounts")
    }

    fn read_health(dispatcher: &Dispatcher, detail: bool) -> (StatusCode, Value) {
        let mut envelope = RequestEnvelope::new();
        if detail {
            envelope = envelope.with_param("detail", "true");
        }
        let outcome = dispatcher
            .dispatch("GET", HEALTH_PATH, &envelope)
            .expect("health never faults");
        (outcome.status, outcome.body)
    }

    #[rstest]
    fn health_without_beat_is_ok(heartbeat: Arc<Heartbeat>) {
        let dispatcher = dispatcher_for(heartbeat);
        assert_eq!(
            read_health(&dispatcher, false),
            (StatusCode::OK, json!({"status": "success"}))
        );
    }

    #[rstest]
    fn health_detail_reports_heartbeat_and_version(heartbeat: Arc<Heartbeat>) {
        let beat = now();
        heartbeat.beat_at(beat);
        let dispatcher = dispatcher_for(heartbeat);

        let (status, body) = read_health(&dispatcher, true);

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"status": "success", "last-heartbeat": beat, "version": 7})
        );
    }

    #[rstest]
    fn stale_heartbeat_is_unavailable(heartbeat: Arc<Heartbeat>) {
        heartbeat.beat_at(now() - 60);
        let dispatcher = dispatcher_for(heartbeat);

        let (status, body) = read_health(&dispatcher, false);

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body,
            json!({"status": "failed", "message": "Have not heard a heartbeat"})
        );
    }

    #[rstest]
    fn polyform_read_is_not_supported(heartbeat: Arc<Heartbeat>) {
        let dispatcher = dispatcher_for(heartbeat);
        let envelope = RequestEnvelope::new().with_param(FACET_PARAM, "billing.invoice");

        let outcome = dispatcher
            .dispatch("GET", POLYFORM_PATH, &envelope)
            .expect("dispatch succeeds");

        assert_eq!(outcome.status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            outcome.body,
            json!({"status": "failed", "message": "HTTP GET is not a supported method"})
        );
    }

    #[rstest]
    fn unknown_facet_is_bad_request(heartbeat: Arc<Heartbeat>) {
        let dispatcher = dispatcher_for(heartbeat);
        let envelope = RequestEnvelope::new().with_param(FACET_PARAM, "unknown.facet");

        let outcome = dispatcher
            .dispatch("POST", POLYFORM_PATH, &envelope)
            .expect("dispatch succeeds");

        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            outcome.body,
            json!({"status": "failed", "message": "Cannot find polyform facet: unknown.facet"})
        );
    }
}
