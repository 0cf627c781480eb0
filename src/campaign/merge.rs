//! Folding fresh server reads into the displayed campaign.
//!
//! The merge is shallow and right-biased: a field present in the incoming
//! value overwrites the current one, an absent field is kept. Record lists
//! are replaced wholesale, never diffed per record.

use super::{Campaign, CampaignStatus, TargetRecord};

/// A campaign as echoed by a response that may omit fields.
///
/// Nullable fields are doubly optional: the outer `None` means "absent",
/// `Some(None)` means "present and cleared".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCampaign {
    pub name: Option<Option<String>>,
    pub status: Option<CampaignStatus>,
    pub assigned_caller_number: Option<Option<String>>,
    pub remote_job_id: Option<Option<String>>,
    pub target_records: Option<Vec<TargetRecord>>,
}

impl From<Campaign> for PartialCampaign {
    fn from(campaign: Campaign) -> Self {
        Self {
            name: Some(campaign.name),
            status: Some(campaign.status),
            assigned_caller_number: Some(campaign.assigned_caller_number),
            remote_job_id: Some(campaign.remote_job_id),
            target_records: Some(campaign.target_records),
        }
    }
}

pub fn merge(current: &Campaign, incoming: PartialCampaign) -> Campaign {
    Campaign {
        id: current.id.clone(),
        name: incoming.name.unwrap_or_else(|| current.name.clone()),
        status: incoming.status.unwrap_or(current.status),
        assigned_caller_number: incoming
            .assigned_caller_number
            .unwrap_or_else(|| current.assigned_caller_number.clone()),
        remote_job_id: incoming
            .remote_job_id
            .unwrap_or_else(|| current.remote_job_id.clone()),
        target_records: incoming
            .target_records
            .unwrap_or_else(|| current.target_records.clone()),
    }
}

/// Full replacement from an authoritative read. The id never changes.
pub fn replace(current: &Campaign, incoming: Campaign) -> Campaign {
    if incoming.id != current.id {
        tracing::warn!(
            current = %current.id,
            incoming = %incoming.id,
            "Authoritative read returned a different campaign id, keeping current id"
        );
    }
    merge(current, incoming.into())
}
