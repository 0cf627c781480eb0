// src/service/wire.rs
// JSON bodies exchanged with the campaign backend

use super::types::{CallerPhoneRequest, CallerPhoneResponse};
use crate::campaign::{
    CallStatus, Campaign, CampaignId, CampaignStatus, PartialCampaign, RecordRole, TargetRecord,
};
use serde::{Deserialize, Deserializer, Serialize};

const CALLER_FLAG: &str = "isCallerRecord";

/// Some deployments wrap the campaign in `{"campaign": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CampaignEnvelope {
    Wrapped { campaign: CampaignBody },
    Bare(CampaignBody),
}

impl From<CampaignEnvelope> for Campaign {
    fn from(envelope: CampaignEnvelope) -> Self {
        match envelope {
            CampaignEnvelope::Wrapped { campaign } => campaign.into(),
            CampaignEnvelope::Bare(campaign) => campaign.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CampaignBody {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default)]
    name: Option<String>,
    status: CampaignStatus,
    #[serde(default)]
    assigned_caller_number: Option<String>,
    #[serde(default)]
    remote_job_id: Option<String>,
    #[serde(default)]
    target_records: Vec<RecordBody>,
}

impl From<CampaignBody> for Campaign {
    fn from(body: CampaignBody) -> Self {
        Campaign {
            id: CampaignId::new(body.id),
            name: body.name,
            status: body.status,
            assigned_caller_number: body.assigned_caller_number,
            remote_job_id: body.remote_job_id,
            target_records: body.target_records.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordBody {
    phone_number: String,
    #[serde(default = "default_call_status")]
    call_status: CallStatus,
    #[serde(default)]
    recording_url: Option<String>,
    #[serde(default)]
    is_caller_record: Option<bool>,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_call_status() -> CallStatus {
    CallStatus::Pending
}

impl RecordBody {
    fn role(&self) -> RecordRole {
        let flagged = self.is_caller_record.unwrap_or_else(|| {
            self.metadata
                .as_ref()
                .and_then(|m| m.get(CALLER_FLAG))
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        });

        if flagged {
            RecordRole::Caller
        } else {
            RecordRole::Target
        }
    }
}

impl From<RecordBody> for TargetRecord {
    fn from(body: RecordBody) -> Self {
        let role = body.role();
        TargetRecord {
            phone_number: body.phone_number,
            call_status: body.call_status,
            recording_url: body.recording_url,
            role,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PartialCampaignBody {
    #[serde(default, deserialize_with = "present")]
    name: Option<Option<String>>,
    #[serde(default)]
    status: Option<CampaignStatus>,
    #[serde(default, deserialize_with = "present")]
    assigned_caller_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    remote_job_id: Option<Option<String>>,
    #[serde(default)]
    target_records: Option<Vec<RecordBody>>,
}

/// Marks a field that appeared in the body, even as `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl From<PartialCampaignBody> for PartialCampaign {
    fn from(body: PartialCampaignBody) -> Self {
        PartialCampaign {
            name: body.name,
            status: body.status,
            assigned_caller_number: body.assigned_caller_number,
            remote_job_id: body.remote_job_id,
            target_records: body
                .target_records
                .map(|records| records.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallerPhoneResponseBody {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    campaign: Option<PartialCampaignBody>,
    #[serde(default)]
    message: Option<String>,
}

impl CallerPhoneResponseBody {
    pub(crate) fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl From<CallerPhoneResponseBody> for CallerPhoneResponse {
    fn from(body: CallerPhoneResponseBody) -> Self {
        CallerPhoneResponse {
            success: body.success,
            campaign: body.campaign.map(Into::into).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CallerPhoneRequestBody<'a> {
    caller_number: &'a str,
    provider_metadata: &'a serde_json::Map<String, serde_json::Value>,
    document_ids: &'a [String],
}

impl<'a> From<&'a CallerPhoneRequest> for CallerPhoneRequestBody<'a> {
    fn from(request: &'a CallerPhoneRequest) -> Self {
        CallerPhoneRequestBody {
            caller_number: &request.number,
            provider_metadata: &request.provider_metadata,
            document_ids: &request.document_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_flag_is_read_from_top_level_or_metadata() {
        let raw = r#"{
            "id": "c-1",
            "status": "active",
            "targetRecords": [
                {"phoneNumber": "+15550000000", "isCallerRecord": true},
                {"phoneNumber": "+15550000001", "metadata": {"isCallerRecord": true}},
                {"phoneNumber": "+15550000002", "callStatus": "no-answer", "metadata": {"source": "csv"}}
            ]
        }"#;

        let campaign: Campaign = serde_json::from_str::<CampaignEnvelope>(raw).unwrap().into();

        let roles: Vec<_> = campaign.target_records.iter().map(|r| r.role).collect();
        assert_eq!(
            roles,
            vec![RecordRole::Caller, RecordRole::Caller, RecordRole::Target]
        );
        assert_eq!(campaign.target_records[0].call_status, CallStatus::Pending);
        assert_eq!(campaign.progress().total, 1);
        assert_eq!(campaign.progress().completed, 1);
    }

    #[test]
    fn wrapped_and_bare_envelopes_decode_alike() {
        let bare = r#"{"_id": "c-9", "status": "paused"}"#;
        let wrapped = r#"{"campaign": {"id": "c-9", "status": "paused"}}"#;

        let a: Campaign = serde_json::from_str::<CampaignEnvelope>(bare).unwrap().into();
        let b: Campaign = serde_json::from_str::<CampaignEnvelope>(wrapped).unwrap().into();

        assert_eq!(a, b);
        assert_eq!(a.status, CampaignStatus::Paused);
    }

    #[test]
    fn partial_body_distinguishes_absent_from_null() {
        let raw = r#"{"assignedCallerNumber": null, "status": "draft"}"#;
        let partial: PartialCampaign = serde_json::from_str::<PartialCampaignBody>(raw)
            .unwrap()
            .into();

        assert_eq!(partial.assigned_caller_number, Some(None));
        assert_eq!(partial.remote_job_id, None);
        assert_eq!(partial.status, Some(CampaignStatus::Draft));
        assert_eq!(partial.target_records, None);
    }

    #[test]
    fn request_body_uses_camel_case() {
        let mut metadata = serde_json::Map::new();
        metadata.insert("provider".into(), serde_json::json!("twilio"));
        let request = CallerPhoneRequest {
            number: "+15551234567".into(),
            provider_metadata: metadata,
            document_ids: vec!["doc-1".into()],
        };

        let value = serde_json::to_value(CallerPhoneRequestBody::from(&request)).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "callerNumber": "+15551234567",
                "providerMetadata": {"provider": "twilio"},
                "documentIds": ["doc-1"]
            })
        );
    }
}
