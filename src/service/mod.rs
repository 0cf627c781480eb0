// src/service/mod.rs
// Remote Campaign Service - the authoritative owner of campaign state

mod http;
mod types;
mod wire;

pub use http::HttpCampaignService;
pub use types::{
    CallerPhone, CallerPhoneInfo, CallerPhoneRequest, CallerPhoneResponse, ServiceError,
    SyncReport,
};

use crate::campaign::{Campaign, CampaignId};
use async_trait::async_trait;

/// Operations the synchronizer consumes from the backend.
///
/// Implementations must tolerate concurrent callers: other clients and the
/// backend's own job runner mutate the same campaign.
#[async_trait]
pub trait CampaignService: Send + Sync {
    /// Authoritative read of the whole campaign
    async fn get_campaign_detail(&self, id: &CampaignId) -> Result<Campaign, ServiceError>;

    /// Force the backend to reconcile its records with the remote dialer
    async fn sync_campaign_records(&self, id: &CampaignId) -> Result<SyncReport, ServiceError>;

    async fn launch_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError>;

    async fn pause_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError>;

    async fn resume_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError>;

    async fn set_caller_phone(
        &self,
        id: &CampaignId,
        request: &CallerPhoneRequest,
    ) -> Result<CallerPhoneResponse, ServiceError>;

    async fn get_caller_phone(&self, id: &CampaignId) -> Result<CallerPhoneInfo, ServiceError>;

    /// Get service name for logs
    fn name(&self) -> &str;
}
