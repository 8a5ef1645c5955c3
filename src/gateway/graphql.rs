use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GatewayBuildError, ProgressGateway, PushError};
use crate::{
    config::{ServerAuth, ServerConnection},
    domain::models::ProgressPayload,
};

const UPDATE_PROGRESS_MUTATION: &str = "mutation UpdateMediaProgress($id: ID!, $input: MediaProgressInput!) { updateMediaProgress(id: $id, input: $input) { __typename } }";

/// Pushes progress through the server's GraphQL endpoint.
#[derive(Clone, Debug)]
pub struct GraphqlGateway {
    server_id: String,
    base_url: String,
    auth: ServerAuth,
    client: reqwest::Client,
}

impl GraphqlGateway {
    /// Create a gateway for the given base URL (e.g. "http://localhost:10801").
    pub fn new(
        server_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GatewayBuildError> {
        let server_id = server_id.into();
        let base_url_str = base_url.into();
        let trimmed = base_url_str.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(GatewayBuildError::InvalidBaseUrl {
                server_id,
                base_url: base_url_str,
            });
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::debug!(%server_id, base_url = %trimmed, "creating GraphqlGateway");
        Ok(GraphqlGateway {
            server_id,
            base_url: trimmed.to_string(),
            auth: ServerAuth::None,
            client,
        })
    }

    pub fn from_connection(conn: &ServerConnection) -> Result<Self, GatewayBuildError> {
        Ok(Self::new(&conn.id, &conn.base_url)?.with_auth(conn.auth.clone()))
    }

    /// Return a gateway with the provided credentials set
    pub fn with_auth(mut self, auth: ServerAuth) -> Self {
        self.auth = auth;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> Option<(String, String)> {
        match &self.auth {
            ServerAuth::None => None,
            ServerAuth::Bearer { token } => {
                Some(("Authorization".to_string(), format!("Bearer {}", token)))
            }
            ServerAuth::Basic { username, password } => Some((
                "Authorization".to_string(),
                format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password))),
            )),
        }
    }
}

/// GraphQL `MediaProgressInput` for one payload.
pub(crate) fn progress_input(payload: &ProgressPayload) -> Value {
    match payload {
        ProgressPayload::Paged {
            page,
            elapsed_seconds,
        } => json!({
            "paged": { "page": page, "elapsedSeconds": elapsed_seconds }
        }),
        ProgressPayload::Epub {
            locator,
            percentage,
            elapsed_seconds,
        } => json!({
            "epub": {
                "locator": locator,
                "percentage": percentage,
                "elapsedSeconds": elapsed_seconds,
            }
        }),
    }
}

/// At most `max` bytes of `body`, cut back to a char boundary.
fn snippet(body: &str, max: usize) -> &str {
    if body.len() <= max {
        return body;
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

pub(crate) fn classify_status(status: StatusCode, body: &str) -> PushError {
    let message = format!("{}: {}", status, snippet(body, 500));
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        PushError::Transient(message)
    } else {
        PushError::Rejected(message)
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[async_trait::async_trait]
impl ProgressGateway for GraphqlGateway {
    /// POST /api/graphql
    #[tracing::instrument(level = "debug", skip(self, payload), fields(server_id = %self.server_id))]
    async fn push_progress(
        &self,
        book_id: &str,
        payload: &ProgressPayload,
    ) -> Result<(), PushError> {
        let url = self.url("/api/graphql");
        let body = json!({
            "query": UPDATE_PROGRESS_MUTATION,
            "variables": { "id": book_id, "input": progress_input(payload) },
        });
        tracing::debug!(%url, kind = ?payload.kind(), "POST progress");
        let mut req = self.client.post(&url).json(&body);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| PushError::Transient(e.to_string()))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| PushError::Transient(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        match serde_json::from_str::<GraphqlResponse>(&text) {
            Ok(parsed) if parsed.errors.is_empty() => Ok(()),
            Ok(parsed) => {
                let messages: Vec<_> = parsed.errors.into_iter().map(|e| e.message).collect();
                Err(PushError::Rejected(messages.join("; ")))
            }
            Err(e) => {
                let snippet = snippet(&text, 2000);
                tracing::error!(error = %e, body_snippet = %snippet, "failed to parse GraphQL response");
                Err(PushError::Rejected(format!("unreadable response: {}", e)))
            }
        }
    }
}
