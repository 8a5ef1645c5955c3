// Per-server capability to push one book's progress

mod graphql;

pub use graphql::GraphqlGateway;

use thiserror::Error;

use crate::domain::models::ProgressPayload;

/// Why a push did not land. Callers resolve both kinds the same way; the split is kept for logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("server rejected the update: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum GatewayBuildError {
    #[error("server {server_id} has an invalid base url {base_url:?}")]
    InvalidBaseUrl { server_id: String, base_url: String },
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Single remote "update progress" call. Implementations never retry internally.
#[async_trait::async_trait]
pub trait ProgressGateway: Send + Sync {
    async fn push_progress(&self, book_id: &str, payload: &ProgressPayload)
    -> Result<(), PushError>;
}
