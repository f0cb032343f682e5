use crate::types::{RealtimeError, error::Result};
use serde_json::Value;
use url::Url;

/// Fetches the current session from the session service over HTTP
#[derive(Debug, Clone)]
pub struct SessionClient {
    session_url: String,
    http: reqwest::Client,
}

impl SessionClient {
    pub fn new(session_url: impl Into<String>) -> Self {
        Self {
            session_url: session_url.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn session_url(&self) -> &str {
        &self.session_url
    }

    /// Requests the session document and pulls a bearer token out of it
    pub async fn fetch_token(&self) -> Result<Option<String>> {
        let response = self
            .http
            .get(&self.session_url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| RealtimeError::Connection(format!("Session lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RealtimeError::Auth(format!(
                "Session lookup at '{}' failed with status: {}",
                self.session_url,
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        let token = extract_session_token(&body);

        tracing::debug!(
            "Session lookup returned {}",
            if token.is_some() { "a token" } else { "no token" }
        );
        Ok(token)
    }
}

/// Reads a token from the shapes session services commonly return
pub fn extract_session_token(session: &Value) -> Option<String> {
    let candidates = [
        session.get("accessToken"),
        session.get("token"),
        session.pointer("/user/accessToken"),
        session.pointer("/user/token"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .map(str::to_string)
}

/// Converts the page origin into the realtime endpoint URL.
///
/// `https` pages get `wss`, `http` pages get `ws`; the path is replaced and any
/// query or fragment dropped.
pub fn realtime_endpoint(origin: &str, path: &str) -> Result<Url> {
    let mut url = Url::parse(origin)?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(RealtimeError::Config(format!(
                "Unsupported page scheme '{}'",
                other
            )));
        }
    };

    url.set_scheme(scheme).map_err(|_| {
        RealtimeError::Config(format!("Cannot use scheme '{}' for {}", scheme, origin))
    })?;
    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
