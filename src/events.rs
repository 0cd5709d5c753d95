//! Issue lifecycle events recorded on the ledger.
//!
//! The ledger stores payloads as opaque strings; these types are a
//! convenience for callers that want to produce (or read back) the JSON
//! payloads the issue-tracking service writes.

use crate::error::{ChainError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEvent {
    /// A student raised a new issue.
    IssueRaised {
        id: String,
        title: String,
        reporter: String,
        severity: i64,
    },
    /// A vendor filed a (possibly voice-transcribed) work report for an issue.
    ReportSubmitted {
        issue_id: String,
        vendor: String,
        transcript: String,
        summary: String,
    },
    ComplaintFiled {
        #[serde(rename = "complaintId")]
        complaint_id: String,
        severity: i64,
        title: String,
    },
}

impl LedgerEvent {
    /// Serialize to the compact JSON payload stored on the ledger.
    pub fn to_payload(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| ChainError::InvalidPayload(format!("Failed to encode event: {}", e)))
    }

    /// Parse a stored payload. Payloads that are not events (the genesis
    /// sentinel, free-form strings) are an error.
    pub fn from_payload(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| ChainError::InvalidPayload(format!("Not an event payload: {}", e)))
    }

    /// The `type` tag as written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::IssueRaised { .. } => "ISSUE_RAISED",
            LedgerEvent::ReportSubmitted { .. } => "REPORT_SUBMITTED",
            LedgerEvent::ComplaintFiled { .. } => "COMPLAINT_FILED",
        }
    }

    /// Identifier of the issue this event concerns.
    pub fn issue_id(&self) -> &str {
        match self {
            LedgerEvent::IssueRaised { id, .. } => id,
            LedgerEvent::ReportSubmitted { issue_id, .. } => issue_id,
            LedgerEvent::ComplaintFiled { complaint_id, .. } => complaint_id,
        }
    }
}
