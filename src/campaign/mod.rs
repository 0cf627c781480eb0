use serde::{Deserialize, Serialize};
use std::fmt;

pub mod merge;
pub mod progress;

pub use merge::{merge, replace, PartialCampaign};
pub use progress::Progress;

/// Opaque campaign identifier assigned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CampaignId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CampaignId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    PendingApproval,
    Idle,
    Active,
    Running,
    Paused,
    Completed,
    #[serde(other)]
    Unknown,
}

impl CampaignStatus {
    /// A live campaign is being dialed remotely and must be polled.
    pub fn is_live(self) -> bool {
        matches!(self, CampaignStatus::Active | CampaignStatus::Running)
    }

    /// Polling stops once one of these is observed.
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::PendingApproval => "pending_approval",
            CampaignStatus::Idle => "idle",
            CampaignStatus::Active => "active",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single dialed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Pending,
    Idle,
    Ringing,
    Answered,
    Completed,
    NoAnswer,
    Busy,
    Failed,
    Voicemail,
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    /// Everything except `pending` and `idle` counts toward progress.
    pub fn is_settled(self) -> bool {
        !matches!(self, CallStatus::Pending | CallStatus::Idle)
    }
}

/// Distinguishes the caller-identity pseudo-record from genuine targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordRole {
    Caller,
    Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub phone_number: String,
    pub call_status: CallStatus,
    #[serde(default)]
    pub recording_url: Option<String>,
    pub role: RecordRole,
}

impl TargetRecord {
    pub fn target(phone_number: impl Into<String>, call_status: CallStatus) -> Self {
        Self {
            phone_number: phone_number.into(),
            call_status,
            recording_url: None,
            role: RecordRole::Target,
        }
    }

    pub fn caller(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            call_status: CallStatus::Idle,
            recording_url: None,
            role: RecordRole::Caller,
        }
    }

    pub fn is_caller(&self) -> bool {
        self.role == RecordRole::Caller
    }
}

/// One batch-calling job as last seen from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    #[serde(default)]
    pub name: Option<String>,
    pub status: CampaignStatus,
    #[serde(default)]
    pub assigned_caller_number: Option<String>,
    #[serde(default)]
    pub remote_job_id: Option<String>,
    #[serde(default)]
    pub target_records: Vec<TargetRecord>,
}

impl Campaign {
    /// Same shape as a real campaign, shown until the first authoritative read lands.
    pub fn placeholder(id: CampaignId) -> Self {
        Self {
            id,
            name: None,
            status: CampaignStatus::Draft,
            assigned_caller_number: None,
            remote_job_id: None,
            target_records: Vec::new(),
        }
    }

    pub fn targets(&self) -> impl Iterator<Item = &TargetRecord> {
        self.target_records.iter().filter(|r| !r.is_caller())
    }

    pub fn target_count(&self) -> usize {
        self.targets().count()
    }

    pub fn progress(&self) -> Progress {
        Progress::from_records(&self.target_records)
    }

    pub fn has_caller_number(&self) -> bool {
        self.assigned_caller_number
            .as_deref()
            .map(|n| !n.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_and_terminal_statuses_are_disjoint() {
        let all = [
            CampaignStatus::Draft,
            CampaignStatus::PendingApproval,
            CampaignStatus::Idle,
            CampaignStatus::Active,
            CampaignStatus::Running,
            CampaignStatus::Paused,
            CampaignStatus::Completed,
            CampaignStatus::Unknown,
        ];

        for status in all {
            assert!(!(status.is_live() && status.is_terminal()), "{}", status);
        }
        assert!(CampaignStatus::Active.is_live());
        assert!(CampaignStatus::Running.is_live());
        assert!(CampaignStatus::Paused.is_terminal());
        assert!(CampaignStatus::Completed.is_terminal());
    }

    #[test]
    fn unknown_wire_values_decode_to_unknown() {
        let status: CampaignStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, CampaignStatus::Unknown);

        let call: CallStatus = serde_json::from_str("\"no-answer\"").unwrap();
        assert_eq!(call, CallStatus::NoAnswer);

        let call: CallStatus = serde_json::from_str("\"transferred\"").unwrap();
        assert_eq!(call, CallStatus::Unknown);
    }

    #[test]
    fn targets_skip_caller_records() {
        let mut campaign = Campaign::placeholder("c-1".into());
        campaign.target_records = vec![
            TargetRecord::caller("+15550000000"),
            TargetRecord::target("+15551111111", CallStatus::Pending),
        ];

        assert_eq!(campaign.target_count(), 1);
        assert_eq!(campaign.targets().next().unwrap().phone_number, "+15551111111");
    }

    #[test]
    fn blank_caller_number_is_not_assigned() {
        let mut campaign = Campaign::placeholder("c-1".into());
        assert!(!campaign.has_caller_number());

        campaign.assigned_caller_number = Some("  ".to_string());
        assert!(!campaign.has_caller_number());

        campaign.assigned_caller_number = Some("+15551234567".to_string());
        assert!(campaign.has_caller_number());
    }
}
