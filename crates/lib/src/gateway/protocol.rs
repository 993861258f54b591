//! Gateway HTTP body types.

use serde::{Deserialize, Serialize};

/// Body of `POST /test-backend`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestBackendRequest {
    #[serde(default)]
    pub message: Option<String>,
}

/// Successful `POST /test-backend` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBackendResponse {
    pub response: String,
}

/// `{ "error": ... }` body for 4xx replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
