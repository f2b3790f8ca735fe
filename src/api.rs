use anyhow::{bail, Context};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::debug;

use crate::models::LoginResponse;
use crate::session::normalize_token;

/// Thin client over the marketplace admin REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.and_then(normalize_token),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<LoginResponse> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            bail!("username and password are both required");
        }

        let url = format!("{}/users/login", self.base_url);
        debug!(%url, %username, "logging in");
        let response = self
            .http
            .post(&url)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .with_context(|| format!("no response from {url}; is the backend running?"))?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    bail!("{}", server_message(&body, "Invalid username or password."))
                }
                StatusCode::NOT_FOUND => bail!(
                    "login endpoint not found at {url}; check the backend URL"
                ),
                _ => bail!(
                    "login failed: {} {}",
                    status.as_u16(),
                    server_message(&body, "unexpected server error")
                ),
            }
        }

        let mut login: LoginResponse =
            serde_json::from_value(body).context("malformed login response")?;
        login.token = login.token.as_deref().and_then(normalize_token);
        if login.token.is_none() {
            bail!("login succeeded but the server returned no token");
        }
        Ok(login)
    }

    pub async fn fetch_buyers(&self) -> anyhow::Result<Vec<Value>> {
        self.fetch_list("buyers").await
    }

    pub async fn fetch_sellers(&self) -> anyhow::Result<Vec<Value>> {
        self.fetch_list("sellers").await
    }

    pub async fn fetch_products(&self) -> anyhow::Result<Vec<Value>> {
        self.fetch_list("products").await
    }

    // Listing endpoints share envelope quirks and error mapping; the
    // collection name doubles as the payload key to probe.
    async fn fetch_list(&self, collection: &str) -> anyhow::Result<Vec<Value>> {
        let url = format!("{}/{collection}", self.base_url);
        let mut request = self.http.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(%url, has_token = self.token.is_some(), "fetching list");
        let response = request
            .send()
            .await
            .with_context(|| format!("no response from {url}; is the backend running?"))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Ok(Vec::new()),
            StatusCode::UNAUTHORIZED => {
                bail!("unauthorized fetching {collection}: log in again, the session may have expired")
            }
            StatusCode::FORBIDDEN => {
                bail!("forbidden fetching {collection}: admin privileges required")
            }
            _ => {}
        }
        if !status.is_success() {
            bail!("fetching {collection} failed with status {}", status.as_u16());
        }

        let payload: Value = response
            .json()
            .await
            .with_context(|| format!("malformed JSON from {url}"))?;
        Ok(extract_list(payload, collection))
    }
}

/// Unwraps the list from whichever envelope the backend used: a bare array,
/// `{<key>: []}`, `{data: []}`, or `{data: {<key>: []}}`.
fn extract_list(payload: Value, key: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove(key) {
                return items;
            }
            match map.remove("data") {
                Some(Value::Array(items)) => items,
                Some(Value::Object(mut inner)) => match inner.remove(key) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                },
                _ => Vec::new(),
            }
        }
        _ => Vec::new(),
    }
}

fn server_message(body: &Value, fallback: &str) -> String {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .unwrap_or(fallback)
        .to_string()
}
