//! End-to-end tests for the HTTP surface using `tower::ServiceExt::oneshot`.

use std::fs;
use std::time::{Duration, Instant};

use axum::body::{self, Body};
use axum::http::Request;
use polyapi_plugins::{FacetError, MANIFEST_FILE, PluginCatalog, StaticModules};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use super::*;
use crate::auth::{AllowAll, Authorizer, StaticTokenAuthorizer};
use crate::dispatch::{ABAC_FLAG, ErrorTranslator};
use crate::endpoints::build_dispatcher;
use crate::heartbeat::Heartbeat;
use crate::invoker::FacetInvoker;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const AUTH_DELAY: Duration = Duration::from_millis(200);

struct Harness {
    _root: TempDir,
    app: Router,
    dispatcher: Arc<Dispatcher>,
}

fn modules() -> StaticModules {
    StaticModules::new()
        .with_function("handlers", "process", |envelope, _ctx| {
            let amount = envelope
                .parsed_body()
                .get("amount")
                .cloned()
                .ok_or_else(|| FacetError::validation("amount is required"))?;
            Ok(ResponseEnvelope::new()
                .with_field("amount", amount.clone())
                .with_field("total", amount))
        })
        .with_function("handlers", "broken", |_envelope, _ctx| {
            Err(FacetError::internal("ledger unavailable at /srv/secret"))
        })
        .with_function("handlers", "panics", |_envelope, _ctx| panic!("facet bug"))
}

fn write_facet(root: &TempDir, group: &str, facet: &str, run: &str) {
    let dir = root.path().join(group).join(facet);
    fs::create_dir_all(&dir).expect("create facet dir");
    let manifest = json!({"forms": {"default": {"run": run}}, "target": "default"});
    fs::write(dir.join(MANIFEST_FILE), manifest.to_string()).expect("write manifest");
}

fn harness_with(authorizer: Arc<dyn Authorizer>) -> Harness {
    let root = TempDir::new().expect("temp dir");
    write_facet(&root, "billing", "invoice", "handlers.process");
    write_facet(&root, "billing", "broken", "handlers.broken");
    write_facet(&root, "billing", "panics", "handlers.panics");
    let catalog = PluginCatalog::load(root.path(), &modules()).expect("catalog loads");

    let invoker = FacetInvoker::new(Arc::new(catalog), authorizer);
    let heartbeat = Arc::new(Heartbeat::new(Duration::from_secs(10)));
    let dispatcher = Arc::new(
        build_dispatcher(invoker, heartbeat, 3, ErrorTranslator::new(AUTH_DELAY))
            .expect("endpoints mount"),
    );
    Harness {
        _root: root,
        app: router("/api/v1", Arc::clone(&dispatcher)),
        dispatcher,
    }
}

#[fixture]
fn harness() -> Harness {
    harness_with(Arc::new(AllowAll))
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body reads");
    let value = serde_json::from_slice(&bytes).expect("body is JSON");
    (status, headers, value)
}

// ---------------------------------------------------------------------------
// Polyform endpoint
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn post_invokes_facet(harness: Harness) {
    let (status, _, body) = send(
        &harness.app,
        post("/api/v1/polyform/billing.invoice", &json!({"amount": 10})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "success", "amount": 10, "total": 10}));
}

#[rstest]
#[tokio::test]
async fn unknown_facet_is_bad_request(harness: Harness) {
    let (status, _, body) = send(
        &harness.app,
        post("/api/v1/polyform/unknown.facet", &json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": "failed", "message": "Cannot find polyform facet: unknown.facet"})
    );
}

#[rstest]
#[tokio::test]
async fn facet_validation_failure_is_bad_request(harness: Harness) {
    let (status, _, body) = send(
        &harness.app,
        post("/api/v1/polyform/billing.invoice", &json!({"currency": "EUR"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "failed", "message": "amount is required"}));
}

#[rstest]
#[tokio::test]
async fn get_is_not_supported(harness: Harness) {
    let (status, _, body) = send(&harness.app, get("/api/v1/polyform/billing.invoice")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body,
        json!({"status": "failed", "message": "HTTP GET is not a supported method"})
    );
}

#[rstest]
#[tokio::test]
async fn malformed_json_is_bad_request(harness: Harness) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/polyform/billing.invoice")
        .header("content-type", "application/json")
        .body(Body::from("{amount"))
        .expect("request builds");

    let (status, _, body) = send(&harness.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!("failed"));
    assert!(
        body["message"]
            .as_str()
            .is_some_and(|message| message.starts_with("Invalid JSON body: "))
    );
    assert_eq!(harness.dispatcher.requests_served(), 1);
}

#[rstest]
#[case(post("/api/v1/polyform/billing.invoice?abac=%ff&&=&x", &json!({"amount": 2})))]
#[case(get("/api/v1/health?detail=%zz&%%"))]
#[tokio::test]
async fn odd_query_strings_still_answer_json(
    harness: Harness,
    #[case] request: Request<Body>,
) {
    let (_, _, body) = send(&harness.app, request).await;

    assert!(body.get("status").is_some(), "missing status in {body}");
    assert_eq!(harness.dispatcher.requests_served(), 1);
}

#[rstest]
#[tokio::test]
async fn internal_fault_is_generic_server_error(harness: Harness) {
    let (status, _, body) =
        send(&harness.app, post("/api/v1/polyform/billing.broken", &json!({}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"status": "failed", "message": "Internal Server Error"})
    );
}

#[rstest]
#[tokio::test]
async fn panicking_facet_is_server_error_and_clears_debug_flag(harness: Harness) {
    let (status, _, body) = send(
        &harness.app,
        post("/api/v1/polyform/billing.panics?abac=log", &json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Internal Server Error"));
    assert!(!harness.dispatcher.debug_flags().is_set(ABAC_FLAG));
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_credentials_are_delayed_and_opaque() {
    let harness = harness_with(Arc::new(StaticTokenAuthorizer::new(["secret"])));
    let started = Instant::now();

    let (status, _, body) = send(
        &harness.app,
        post("/api/v1/polyform/billing.invoice", &json!({"amount": 10})),
    )
    .await;

    assert!(started.elapsed() >= AUTH_DELAY, "401 sent before the delay");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"status": "failed", "message": "Unauthorized"}));
}

#[tokio::test]
async fn accepted_credentials_reach_the_facet() {
    let harness = harness_with(Arc::new(StaticTokenAuthorizer::new(["secret"])));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/polyform/billing.invoice")
        .header("authorization", "Bearer secret")
        .body(Body::from(json!({"amount": 4}).to_string()))
        .expect("request builds");

    let (status, _, body) = send(&harness.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(4));
}

// ---------------------------------------------------------------------------
// Health, fallback and headers
// ---------------------------------------------------------------------------

#[rstest]
#[tokio::test]
async fn health_reports_version_on_request(harness: Harness) {
    let (status, _, body) = send(&harness.app, get("/api/v1/health?detail=true")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "success", "last-heartbeat": 0, "version": 3})
    );
}

#[rstest]
#[case("/nowhere")]
#[case("/api/v1/polyform")]
#[case("/api/v2/health")]
#[tokio::test]
async fn unrouted_paths_are_not_found(harness: Harness, #[case] uri: &str) {
    let (status, _, body) = send(&harness.app, get(uri)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"status": "failed", "message": "Not Found"}));
}

#[rstest]
#[case(get("/api/v1/health"))]
#[case(get("/nowhere"))]
#[case(post("/api/v1/polyform/billing.invoice", &json!({"amount": 1})))]
#[tokio::test]
async fn security_headers_are_always_present(harness: Harness, #[case] request: Request<Body>) {
    let (_, headers, _) = send(&harness.app, request).await;

    assert_eq!(headers.get("server").map(|v| v.as_bytes()), Some(&b"polyapi"[..]));
    assert_eq!(
        headers.get("x-frame-options").map(|v| v.as_bytes()),
        Some(&b"DENY"[..])
    );
    assert_eq!(
        headers.get("x-xss-protection").map(|v| v.as_bytes()),
        Some(&b"1; mode=block"[..])
    );
    assert_eq!(
        headers.get("content-security-policy").map(|v| v.as_bytes()),
        Some(&b"default-src 'self'"[..])
    );
}

#[rstest]
#[tokio::test]
async fn every_request_is_counted(harness: Harness) {
    send(&harness.app, get("/api/v1/health")).await;
    send(&harness.app, get("/nowhere")).await;
    assert_eq!(harness.dispatcher.requests_served(), 2);
}
