use crate::infrastructure::SessionClient;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// Values that front-end stores leave behind in place of a real token
const PLACEHOLDER_TOKENS: [&str; 5] = ["null", "undefined", "placeholder", "dummy-token", "none"];

/// Whether a token is worth sending to the server
pub fn is_valid_token(token: &str) -> bool {
    let token = token.trim();
    !token.is_empty()
        && !PLACEHOLDER_TOKENS
            .iter()
            .any(|placeholder| token.eq_ignore_ascii_case(placeholder))
}

/// Supplies the bearer token used in the `authenticate` handshake
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` when the user has no session
    async fn token(&self) -> Option<String>;
}

/// Token kept in local storage by the app (customer and admin logins)
#[derive(Debug, Default)]
pub struct StoredTokenProvider {
    token: RwLock<Option<String>>,
}

impl StoredTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Replace the stored token, e.g. after login or logout
    pub fn set(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Token obtained from the session service (driver logins)
#[derive(Debug, Clone)]
pub struct SessionServiceTokenProvider {
    client: SessionClient,
}

impl SessionServiceTokenProvider {
    pub fn new(session_url: impl Into<String>) -> Self {
        Self {
            client: SessionClient::new(session_url),
        }
    }
}

#[async_trait]
impl TokenProvider for SessionServiceTokenProvider {
    async fn token(&self) -> Option<String> {
        match self.client.fetch_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(
                    "Could not read token from {}: {}",
                    self.client.session_url(),
                    e
                );
                None
            }
        }
    }
}

/// Prefers the primary provider and falls back to the secondary one when the
/// primary has no usable token
pub struct FallbackTokenProvider {
    primary: Arc<dyn TokenProvider>,
    secondary: Arc<dyn TokenProvider>,
}

impl FallbackTokenProvider {
    pub fn new(primary: Arc<dyn TokenProvider>, secondary: Arc<dyn TokenProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl TokenProvider for FallbackTokenProvider {
    async fn token(&self) -> Option<String> {
        if let Some(token) = self.primary.token().await
            && is_valid_token(&token)
        {
            return Some(token);
        }
        tracing::debug!("Primary token unavailable, asking fallback provider");
        self.secondary.token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn session_service(status: u16, body: serde_json::Value) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/session"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    #[test]
    fn test_placeholder_tokens_are_invalid() {
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("   "));
        assert!(!is_valid_token("null"));
        assert!(!is_valid_token("undefined"));
        assert!(!is_valid_token("Dummy-Token"));
        assert!(is_valid_token("eyJhbGciOiJIUzI1NiJ9.e30.sig"));
    }

    #[tokio::test]
    async fn test_stored_token_can_be_replaced() {
        let provider = StoredTokenProvider::new(None);
        assert_eq!(provider.token().await, None);

        provider.set(Some("t-1".to_string()));
        assert_eq!(provider.token().await.as_deref(), Some("t-1"));
    }

    #[tokio::test]
    async fn test_fallback_prefers_primary() {
        let provider = FallbackTokenProvider::new(
            Arc::new(StoredTokenProvider::new(Some("local".to_string()))),
            Arc::new(StoredTokenProvider::new(Some("session".to_string()))),
        );
        assert_eq!(provider.token().await.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_fallback_skips_placeholder_primary() {
        let provider = FallbackTokenProvider::new(
            Arc::new(StoredTokenProvider::new(Some("undefined".to_string()))),
            Arc::new(StoredTokenProvider::new(Some("session".to_string()))),
        );
        assert_eq!(provider.token().await.as_deref(), Some("session"));
    }

    #[tokio::test]
    async fn test_fallback_reaches_session_service() {
        let mock_server =
            session_service(200, serde_json::json!({ "accessToken": "from-session" })).await;

        let provider = FallbackTokenProvider::new(
            Arc::new(StoredTokenProvider::new(None)),
            Arc::new(SessionServiceTokenProvider::new(format!(
                "{}/api/auth/session",
                mock_server.uri()
            ))),
        );
        assert_eq!(provider.token().await.as_deref(), Some("from-session"));
    }

    #[tokio::test]
    async fn test_session_service_error_yields_no_token() {
        let mock_server = session_service(500, serde_json::json!({ "error": "down" })).await;

        let provider =
            SessionServiceTokenProvider::new(format!("{}/api/auth/session", mock_server.uri()));
        assert_eq!(provider.token().await, None);
    }
}
