//! In-process `CampaignService` with scripted responses and a call log.

use crate::campaign::{Campaign, CampaignId, CampaignStatus, PartialCampaign};
use crate::service::{
    CallerPhone, CallerPhoneInfo, CallerPhoneRequest, CallerPhoneResponse, CampaignService,
    ServiceError, SyncReport,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

#[derive(Default)]
struct Script {
    calls: Vec<&'static str>,
    details: VecDeque<Result<Campaign, ServiceError>>,
    detail_error: Option<ServiceError>,
    command_error: Option<ServiceError>,
    sync_report: SyncReport,
    reject_caller_phone: bool,
    status_after_caller_phone: Option<CampaignStatus>,
    requests: Vec<CallerPhoneRequest>,
}

pub(crate) struct ScriptedService {
    campaign: Mutex<Campaign>,
    script: Mutex<Script>,
    /// When set, every detail read waits for a permit.
    detail_gate: Option<Arc<Semaphore>>,
}

impl ScriptedService {
    pub(crate) fn new(campaign: Campaign) -> Self {
        Self {
            campaign: Mutex::new(campaign),
            script: Mutex::new(Script::default()),
            detail_gate: None,
        }
    }

    /// Detail reads block until the returned semaphore is given permits.
    pub(crate) fn gated(campaign: Campaign) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut service = Self::new(campaign);
        service.detail_gate = Some(gate.clone());
        (service, gate)
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.script.lock().unwrap().calls.clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub(crate) fn requests(&self) -> Vec<CallerPhoneRequest> {
        self.script.lock().unwrap().requests.clone()
    }

    pub(crate) fn set_status(&self, status: CampaignStatus) {
        self.campaign.lock().unwrap().status = status;
    }

    /// One-shot detail responses, served before the stored campaign.
    pub(crate) fn push_detail(&self, response: Result<Campaign, ServiceError>) {
        self.script.lock().unwrap().details.push_back(response);
    }

    pub(crate) fn fail_details(&self, error: Option<ServiceError>) {
        self.script.lock().unwrap().detail_error = error;
    }

    pub(crate) fn fail_commands(&self, error: ServiceError) {
        self.script.lock().unwrap().command_error = Some(error);
    }

    pub(crate) fn reject_caller_phone(&self) {
        self.script.lock().unwrap().reject_caller_phone = true;
    }

    /// The backend flips the campaign to `status` when a caller is assigned.
    pub(crate) fn flip_status_on_caller_phone(&self, status: CampaignStatus) {
        self.script.lock().unwrap().status_after_caller_phone = Some(status);
    }

    pub(crate) fn set_sync_report(&self, report: SyncReport) {
        self.script.lock().unwrap().sync_report = report;
    }

    fn log(&self, call: &'static str) {
        self.script.lock().unwrap().calls.push(call);
    }

    fn command_error(&self) -> Option<ServiceError> {
        self.script.lock().unwrap().command_error.clone()
    }

    fn transition(&self, call: &'static str, status: CampaignStatus) -> Result<Campaign, ServiceError> {
        self.log(call);
        if let Some(e) = self.command_error() {
            return Err(e);
        }
        let mut campaign = self.campaign.lock().unwrap();
        campaign.status = status;
        Ok(campaign.clone())
    }
}

#[async_trait]
impl CampaignService for ScriptedService {
    async fn get_campaign_detail(&self, _id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.log("detail");
        if let Some(gate) = &self.detail_gate {
            gate.acquire()
                .await
                .map_err(|e| ServiceError::NetworkError(e.to_string()))?
                .forget();
        }

        let scripted = {
            let mut script = self.script.lock().unwrap();
            match script.details.pop_front() {
                Some(response) => Some(response),
                None => script.detail_error.clone().map(Err),
            }
        };
        match scripted {
            Some(response) => response,
            None => Ok(self.campaign.lock().unwrap().clone()),
        }
    }

    async fn sync_campaign_records(&self, _id: &CampaignId) -> Result<SyncReport, ServiceError> {
        self.log("sync");
        Ok(self.script.lock().unwrap().sync_report)
    }

    async fn launch_campaign(&self, _id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.transition("launch", CampaignStatus::Active)
    }

    async fn pause_campaign(&self, _id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.transition("pause", CampaignStatus::Paused)
    }

    async fn resume_campaign(&self, _id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.transition("resume", CampaignStatus::Active)
    }

    async fn set_caller_phone(
        &self,
        _id: &CampaignId,
        request: &CallerPhoneRequest,
    ) -> Result<CallerPhoneResponse, ServiceError> {
        self.log("set_caller_phone");
        if let Some(e) = self.command_error() {
            return Err(e);
        }

        let mut script = self.script.lock().unwrap();
        script.requests.push(request.clone());
        if script.reject_caller_phone {
            return Ok(CallerPhoneResponse {
                success: false,
                campaign: PartialCampaign::default(),
            });
        }

        let mut campaign = self.campaign.lock().unwrap();
        campaign.assigned_caller_number = Some(request.number.clone());
        if let Some(status) = script.status_after_caller_phone {
            campaign.status = status;
        }
        Ok(CallerPhoneResponse {
            success: true,
            campaign: PartialCampaign::from(campaign.clone()),
        })
    }

    async fn get_caller_phone(&self, _id: &CampaignId) -> Result<CallerPhoneInfo, ServiceError> {
        self.log("get_caller_phone");
        if let Some(e) = self.command_error() {
            return Err(e);
        }
        let number = self.campaign.lock().unwrap().assigned_caller_number.clone();
        Ok(CallerPhoneInfo {
            success: true,
            caller_phone: Some(CallerPhone {
                caller_number: number,
                knowledge_base: None,
            }),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
