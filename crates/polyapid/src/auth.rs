//! Authorization gate applied before a facet runs.
//!
//! The invoker only knows the [`Authorizer`] trait. Token verification lives
//! behind it and is chosen at bootstrap.

use std::collections::{BTreeMap, BTreeSet};

use polyapi_plugins::FacetError;
use tracing::warn;

/// Tracing target for authorization decisions.
pub(crate) const AUTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auth");

/// Pluggable request gate.
pub trait Authorizer: Send + Sync {
    /// Checks the request headers, keyed by lower-cased name.
    ///
    /// # Errors
    ///
    /// Returns [`FacetError::AuthFailure`] when the caller is rejected.
    fn authorize(&self, headers: &BTreeMap<String, String>) -> Result<(), FacetError>;
}

/// Gate that admits every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _headers: &BTreeMap<String, String>) -> Result<(), FacetError> {
        Ok(())
    }
}

/// Gate accepting `Authorization: Bearer <token>` for a fixed token set.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthorizer {
    tokens: BTreeSet<String>,
}

impl StaticTokenAuthorizer {
    /// Builds a gate for the given tokens. Blank entries are ignored.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accepted = tokens
            .into_iter()
            .map(Into::into)
            .filter(|token| !token.trim().is_empty())
            .collect::<BTreeSet<_>>();
        if accepted.is_empty() {
            warn!(
                target: AUTH_TARGET,
                "no bearer tokens configured; every request will be rejected"
            );
        }
        Self { tokens: accepted }
    }

    /// Returns the number of accepted tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` when no token is accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authorizer for StaticTokenAuthorizer {
    fn authorize(&self, headers: &BTreeMap<String, String>) -> Result<(), FacetError> {
        let header = headers
            .get("authorization")
            .ok_or_else(|| FacetError::auth_failure("missing authorization header"))?;
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| FacetError::auth_failure("authorization is not a bearer token"))?;
        if self.tokens.contains(token) {
            Ok(())
        } else {
            Err(FacetError::auth_failure("bearer token not recognised"))
        }
    }
}
