//! Crate-level integration and BDD tests.

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use crate::catalog::PluginCatalog;
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::FacetError;
use crate::manifest::MANIFEST_FILE;
use crate::resolver::StaticModules;


/// Modules shared by the crate-level tests.
fn sample_modules() -> StaticModules {
    StaticModules::new().with_function("handlers", "process", |envelope, _ctx| {
        let amount = envelope
            .parsed_body()
            .get("amount")
            .cloned()
            .ok_or_else(|| FacetError::validation("amount is required"))?;
        Ok(ResponseEnvelope::new()
            .with_field("amount", amount.clone())
            .with_field("total", amount))
    })
}

#[test]
fn end_to_end_catalog_with_static_modules() {
    let root = TempDir::new().expect("temp dir");
    let facet_dir = root.path().join("billing").join("invoice");
    fs::create_dir_all(&facet_dir).expect("mkdir");
    fs::write(
        facet_dir.join(MANIFEST_FILE),
        r#"{"forms": {"default": {"run": "handlers.process"}}, "target": "default"}"#,
    )
    .expect("write manifest");

    let catalog = PluginCatalog::load(root.path(), &sample_modules()).expect("catalog loads");
    let mut response = catalog
        .get("billing.invoice")
        .expect("facet present")
        .call(&RequestEnvelope::new().with_body(json!({"amount": 10})), "1")
        .expect("call succeeds");
    response.ensure_status();

    assert_eq!(
        response.into_value(),
        json!({"status": "success", "amount": 10, "total": 10})
    );
}
