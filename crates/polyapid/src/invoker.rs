//! Facet lookup, authorization and invocation.

use std::fmt;
use std::sync::Arc;

use polyapi_plugins::{FacetError, PluginCatalog, RequestEnvelope, ResponseEnvelope};
use tracing::{debug, info};

use crate::auth::Authorizer;
use crate::dispatch::{ABAC_FLAG, CallContext};

/// Tracing target for facet invocation.
const INVOKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::invoker");

/// Runs catalog facets behind the authorization gate.
#[derive(Clone)]
pub struct FacetInvoker {
    catalog: Arc<PluginCatalog>,
    authorizer: Arc<dyn Authorizer>,
}

impl FacetInvoker {
    /// Binds a catalog to an authorization gate.
    #[must_use]
    pub fn new(catalog: Arc<PluginCatalog>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            catalog,
            authorizer,
        }
    }

    /// Returns the shared catalog.
    #[must_use]
    pub const fn catalog(&self) -> &Arc<PluginCatalog> {
        &self.catalog
    }

    /// Invokes the facet called `name`.
    ///
    /// The entry point receives the envelope and a [`polyapi_plugins::FacetContext`]
    /// naming the facet's base directory. A response without a usable
    /// `status` gains `status: "success"`.
    ///
    /// # Errors
    ///
    /// Returns a validation failure for an unknown facet, the gate's
    /// [`FacetError::AuthFailure`] unchanged, or whatever the entry point
    /// raises.
    pub fn invoke(
        &self,
        name: &str,
        envelope: &RequestEnvelope,
        ctx: &CallContext,
    ) -> Result<ResponseEnvelope, FacetError> {
        let Some(handle) = self.catalog.get(name) else {
            info!(
                target: INVOKER_TARGET,
                facet = name,
                known = self.catalog.len(),
                "unknown polyform facet requested"
            );
            return Err(FacetError::validation(format!(
                "Cannot find polyform facet: {name}"
            )));
        };

        let decision = self.authorizer.authorize(envelope.headers());
        if ctx.debug_enabled(ABAC_FLAG) {
            info!(
                target: INVOKER_TARGET,
                r#type = "abac",
                facet = name,
                allowed = decision.is_ok(),
                request_id = ctx.request_id(),
                "authorization decision"
            );
        }
        decision?;

        debug!(
            target: INVOKER_TARGET,
            facet = name,
            entry = %handle.spec(),
            "invoking facet"
        );
        let mut response = handle.call(envelope, ctx.request_id())?;
        response.ensure_status();
        Ok(response)
    }
}

impl fmt::Debug for FacetInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacetInvoker")
            .field("facets", &self.catalog.len())
            .finish_non_exhaustive()
    }
}
