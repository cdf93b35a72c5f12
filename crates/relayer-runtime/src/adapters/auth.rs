//! Token provider decorator counting fetches and invalidations.

use async_trait::async_trait;
use bridge_telemetry::metrics::{AUTH_INVALIDATIONS, AUTH_TOKEN_REQUESTS};
use cb_01_ledger_session::{AccessToken, AuthError, TokenProvider};
use std::sync::Arc;

/// Wraps a [`TokenProvider`] and records `cb_auth_*` metrics.
pub struct MeteredTokenProvider {
    inner: Arc<dyn TokenProvider>,
}

impl MeteredTokenProvider {
    /// Decorate `inner`.
    pub fn new(inner: Arc<dyn TokenProvider>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl TokenProvider for MeteredTokenProvider {
    async fn token(&self) -> Result<AccessToken, AuthError> {
        let result = self.inner.token().await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        AUTH_TOKEN_REQUESTS.with_label_values(&[outcome]).inc();
        result
    }

    fn invalidate_token(&self) {
        AUTH_INVALIDATIONS.inc();
        self.inner.invalidate_token();
    }
}
