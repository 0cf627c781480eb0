// src/service/types.rs
// Remote service payloads and error definitions

use crate::campaign::PartialCampaign;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a forced reconciliation against the upstream dialer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncReport {
    pub new_records_added: u32,
    pub status_updates: u32,
    pub recording_updates: u32,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.new_records_added > 0 || self.status_updates > 0 || self.recording_updates > 0
    }
}

/// Caller-ID assignment sent to the remote service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerPhoneRequest {
    pub number: String,
    /// Free-form provider data (trunk, SID, voice settings), passed through untouched.
    pub provider_metadata: serde_json::Map<String, serde_json::Value>,
    /// Knowledge-base documents the voice agent should use on this line.
    pub document_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallerPhoneResponse {
    pub success: bool,
    pub campaign: PartialCampaign,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerPhone {
    #[serde(default)]
    pub caller_number: Option<String>,
    #[serde(default)]
    pub knowledge_base: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerPhoneInfo {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub caller_phone: Option<CallerPhone>,
}

/// Remote service error types with retry classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    TimeoutError,

    #[error("Campaign not found")]
    NotFound,

    #[error("Authentication failed")]
    AuthenticationError,

    #[error("Rate limit exceeded")]
    RateLimitError,

    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    DecodeError(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ServiceError {
    /// Returns true if the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::NetworkError(_)
            | ServiceError::TimeoutError
            | ServiceError::RateLimitError => true,
            ServiceError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
