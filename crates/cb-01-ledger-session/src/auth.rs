//! # Auth Provider
//!
//! Bearer tokens for the ledger API via the OAuth2 client-credentials grant.
//!
//! The token is cached together with a refresh-by instant computed ahead of
//! the server-declared expiry. The cache is the only state shared between
//! concurrent callers: the lock is held only to read or publish, never across
//! the token exchange itself.

use crate::domain::AuthError;
use crate::ports::{AccessToken, TokenProvider};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::env;
use tracing::{debug, info};

/// TTL assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

/// Default safety margin before expiry.
pub const DEFAULT_LEEWAY_SECS: i64 = 60;

/// Client-credentials configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Token endpoint URL.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Audience requested for the token.
    pub audience: String,
    /// Grant type sent to the endpoint.
    pub grant_type: String,
    /// Refresh this long before the declared expiry.
    pub leeway: Duration,
    /// Timeout of the exchange.
    pub request_timeout: std::time::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            audience: String::new(),
            grant_type: "client_credentials".to_string(),
            leeway: Duration::seconds(DEFAULT_LEEWAY_SECS),
            request_timeout: std::time::Duration::from_secs(10),
        }
    }
}

impl AuthConfig {
    /// Read configuration from the environment.
    ///
    /// # Environment Variables
    ///
    /// - `CB_AUTH_TOKEN_URL`: token endpoint
    /// - `CB_AUTH_CLIENT_ID` / `CB_AUTH_CLIENT_SECRET`: credentials
    /// - `CB_AUTH_AUDIENCE`: audience (default: empty)
    /// - `CB_AUTH_LEEWAY_SECS`: refresh margin (default: 60)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token_url: env::var("CB_AUTH_TOKEN_URL").unwrap_or_default(),
            client_id: env::var("CB_AUTH_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("CB_AUTH_CLIENT_SECRET").unwrap_or_default(),
            audience: env::var("CB_AUTH_AUDIENCE").unwrap_or_default(),
            grant_type: env::var("CB_AUTH_GRANT_TYPE").unwrap_or(defaults.grant_type),
            leeway: env::var("CB_AUTH_LEEWAY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::seconds)
                .unwrap_or(defaults.leeway),
            request_timeout: defaults.request_timeout,
        }
    }

    /// True when any credential is set. Partially set credentials are a
    /// configuration error, not "auth disabled".
    pub fn is_configured(&self) -> bool {
        !self.token_url.is_empty() || !self.client_id.is_empty() || !self.client_secret.is_empty()
    }

    /// Fail fast on missing credentials.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.token_url.is_empty() {
            return Err(AuthError::ConfigInvalid("token URL is not set".into()));
        }
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::ConfigInvalid(
                "client id and client secret must both be set".into(),
            ));
        }
        Ok(())
    }
}

/// Compute the instant after which a token must be refreshed.
///
/// `issued + ttl - leeway`, with a 5 minute TTL when the server omits one,
/// and the half-life midpoint when the leeway would put the refresh at or
/// before issuance.
pub fn compute_refresh_by(
    issued: DateTime<Utc>,
    expires_in_secs: Option<i64>,
    leeway: Duration,
) -> DateTime<Utc> {
    let ttl = match expires_in_secs {
        Some(secs) if secs > 0 => Duration::seconds(secs),
        _ => return issued + Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
    };
    let candidate = issued + ttl - leeway;
    if candidate <= issued {
        issued + ttl / 2
    } else {
        candidate
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Client-credentials token provider with a mutex-guarded cache.
pub struct OAuthTokenProvider {
    config: AuthConfig,
    http: reqwest::Client,
    cached: Mutex<Option<AccessToken>>,
}

impl OAuthTokenProvider {
    /// Create a provider; fails on incomplete credentials.
    pub fn new(config: AuthConfig) -> Result<Self, AuthError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(Self {
            config,
            http,
            cached: Mutex::new(None),
        })
    }

    fn cached_if_fresh(&self, now: DateTime<Utc>) -> Option<AccessToken> {
        self.cached
            .lock()
            .as_ref()
            .filter(|t| now < t.refresh_by)
            .cloned()
    }

    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        let mut params = vec![
            ("grant_type", self.config.grant_type.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if !self.config.audience.is_empty() {
            params.push(("audience", self.config.audience.as_str()));
        }

        let issued = Utc::now();
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Response(format!("status {}: {}", status, body)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Response(format!("invalid token body: {}", e)))?;
        if body.access_token.is_empty() {
            return Err(AuthError::Response("empty access_token".into()));
        }

        let refresh_by = compute_refresh_by(issued, body.expires_in, self.config.leeway);
        let expires_at = body
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| issued + Duration::seconds(secs));
        debug!(
            expires_at = ?expires_at,
            %refresh_by,
            "[cb-01] Obtained ledger access token"
        );
        Ok(AccessToken {
            token: body.access_token,
            expires_at,
            refresh_by,
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn token(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached_if_fresh(Utc::now()) {
            return Ok(token);
        }

        let fresh = self.exchange().await?;
        *self.cached.lock() = Some(fresh.clone());
        Ok(fresh)
    }

    fn invalidate_token(&self) {
        if self.cached.lock().take().is_some() {
            info!("[cb-01] Access token invalidated");
        }
    }
}

/// Pre-issued token that never refreshes.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wrap a fixed token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<AccessToken, AuthError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: None,
            refresh_by: DateTime::<Utc>::MAX_UTC,
        })
    }

    fn invalidate_token(&self) {
        debug!("[cb-01] Static token cannot be refreshed; ignoring invalidation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone)]
    struct TokenServer {
        hits: Arc<AtomicUsize>,
        expires_in: Option<i64>,
        status: StatusCode,
    }

    async fn issue(
        State(server): State<TokenServer>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        let n = server.hits.fetch_add(1, Ordering::SeqCst) + 1;
        if form.get("client_secret").map(String::as_str) != Some("secret") {
            return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
        }
        let mut body = serde_json::json!({ "access_token": format!("token-{}", n) });
        if let Some(exp) = server.expires_in {
            body["expires_in"] = serde_json::json!(exp);
        }
        (server.status, Json(body))
    }

    async fn spawn_token_server(expires_in: Option<i64>, status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route("/oauth/token", post(issue)).with_state(TokenServer {
            hits: hits.clone(),
            expires_in,
            status,
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/oauth/token", addr), hits)
    }

    fn config(url: &str) -> AuthConfig {
        AuthConfig {
            token_url: url.to_string(),
            client_id: "relayer".into(),
            client_secret: "secret".into(),
            audience: "https://canton.network.global".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_refresh_by_subtracts_leeway() {
        let issued = Utc::now();
        let refresh = compute_refresh_by(issued, Some(120), Duration::seconds(60));
        assert_eq!(refresh - issued, Duration::seconds(60));
        // 60 seconds before the 120s expiry.
        assert_eq!((issued + Duration::seconds(120)) - refresh, Duration::seconds(60));
    }

    #[test]
    fn test_refresh_by_half_life_when_leeway_exceeds_ttl() {
        let issued = Utc::now();
        let refresh = compute_refresh_by(issued, Some(120), Duration::seconds(130));
        assert_eq!(refresh - issued, Duration::seconds(60));
    }

    #[test]
    fn test_refresh_by_default_ttl() {
        let issued = Utc::now();
        assert_eq!(
            compute_refresh_by(issued, None, Duration::seconds(60)) - issued,
            Duration::seconds(DEFAULT_TOKEN_TTL_SECS)
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = OAuthTokenProvider::new(AuthConfig::default()).err().unwrap();
        assert!(matches!(err, AuthError::ConfigInvalid(_)));

        let partial = AuthConfig {
            token_url: "http://localhost/token".into(),
            client_id: "relayer".into(),
            ..Default::default()
        };
        assert!(partial.is_configured());
        assert!(matches!(partial.validate(), Err(AuthError::ConfigInvalid(_))));
    }

    #[tokio::test]
    async fn test_token_cached_until_invalidated() {
        let (url, hits) = spawn_token_server(Some(3600), StatusCode::OK).await;
        let provider = OAuthTokenProvider::new(config(&url)).unwrap();

        let first = provider.token().await.unwrap();
        let second = provider.token().await.unwrap();
        assert_eq!(first.token, "token-1");
        let expires_at = first.expires_at.unwrap();
        assert_eq!(expires_at - first.refresh_by, Duration::seconds(DEFAULT_LEEWAY_SECS));
        assert_eq!(second.token, "token-1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        provider.invalidate_token();
        let third = provider.token().await.unwrap();
        assert_eq!(third.token, "token-2");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_token_refreshed() {
        // Leeway larger than the TTL: half-life of a 1s token is 500ms.
        let (url, hits) = spawn_token_server(Some(1), StatusCode::OK).await;
        let mut cfg = config(&url);
        cfg.leeway = Duration::seconds(5);
        let provider = OAuthTokenProvider::new(cfg).unwrap();

        provider.token().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(700)).await;
        let token = provider.token().await.unwrap();
        assert_eq!(token.token, "token-2");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_undeclared_expiry_uses_default_ttl() {
        let (url, _) = spawn_token_server(None, StatusCode::OK).await;
        let provider = OAuthTokenProvider::new(config(&url)).unwrap();

        let before = Utc::now();
        let token = provider.token().await.unwrap();
        assert_eq!(token.expires_at, None);
        assert!(token.refresh_by >= before + Duration::seconds(DEFAULT_TOKEN_TTL_SECS));
    }

    #[tokio::test]
    async fn test_non_200_is_response_error() {
        let (url, _) = spawn_token_server(Some(60), StatusCode::SERVICE_UNAVAILABLE).await;
        let provider = OAuthTokenProvider::new(config(&url)).unwrap();
        assert!(matches!(
            provider.token().await,
            Err(AuthError::Response(_))
        ));

        let mut cfg = config(&url);
        cfg.client_secret = "wrong".into();
        let provider = OAuthTokenProvider::new(cfg).unwrap();
        assert!(matches!(
            provider.token().await,
            Err(AuthError::Response(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider =
            OAuthTokenProvider::new(config(&format!("http://{}/oauth/token", addr))).unwrap();
        assert!(matches!(
            provider.token().await,
            Err(AuthError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_static_token_provider() {
        let provider = StaticTokenProvider::new("fixed");
        provider.invalidate_token();
        assert_eq!(provider.token().await.unwrap().token, "fixed");
    }
}
