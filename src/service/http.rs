// src/service/http.rs
// JSON-over-HTTP adapter for the campaign backend

use super::types::{
    CallerPhoneInfo, CallerPhoneRequest, CallerPhoneResponse, ServiceError, SyncReport,
};
use super::wire::{CallerPhoneRequestBody, CallerPhoneResponseBody, CampaignEnvelope};
use super::CampaignService;
use crate::campaign::{Campaign, CampaignId};
use crate::config::SyncConfig;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 512;

pub struct HttpCampaignService {
    base_url: Url,
    api_token: Option<String>,
    client: reqwest::Client,
}

impl HttpCampaignService {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidEndpoint(base_url.to_string()));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(base_url = %base_url, "Campaign HTTP service initialized");

        Ok(Self {
            base_url,
            api_token: api_token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ServiceError> {
        Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.request_timeout(),
        )
    }

    fn endpoint(&self, id: &CampaignId, action: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("campaigns").push(id.as_str());
            if let Some(action) = action {
                segments.push(action);
            }
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();

        if status.is_success() {
            let bytes = response.bytes().await.map_err(map_transport_error)?;
            return serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::DecodeError(e.to_string()));
        }

        match status {
            StatusCode::NOT_FOUND => Err(ServiceError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ServiceError::AuthenticationError)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ServiceError::RateLimitError),
            _ => {
                let mut body = response.text().await.unwrap_or_default();
                truncate_on_char_boundary(&mut body, ERROR_BODY_LIMIT);
                Err(ServiceError::HttpError {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn campaign_command(&self, id: &CampaignId, action: &str) -> Result<Campaign, ServiceError> {
        let envelope: CampaignEnvelope = self
            .send(self.client.post(self.endpoint(id, Some(action))))
            .await?;
        Ok(envelope.into())
    }
}

#[async_trait]
impl CampaignService for HttpCampaignService {
    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn get_campaign_detail(&self, id: &CampaignId) -> Result<Campaign, ServiceError> {
        let envelope: CampaignEnvelope = self.send(self.client.get(self.endpoint(id, None))).await?;
        Ok(envelope.into())
    }

    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn sync_campaign_records(&self, id: &CampaignId) -> Result<SyncReport, ServiceError> {
        self.send(self.client.post(self.endpoint(id, Some("sync"))))
            .await
    }

    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn launch_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.campaign_command(id, "launch").await
    }

    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn pause_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.campaign_command(id, "pause").await
    }

    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn resume_campaign(&self, id: &CampaignId) -> Result<Campaign, ServiceError> {
        self.campaign_command(id, "resume").await
    }

    #[tracing::instrument(skip(self, request), fields(campaign_id = %id, number = %request.number))]
    async fn set_caller_phone(
        &self,
        id: &CampaignId,
        request: &CallerPhoneRequest,
    ) -> Result<CallerPhoneResponse, ServiceError> {
        let body = CallerPhoneRequestBody::from(request);
        let response: CallerPhoneResponseBody = self
            .send(
                self.client
                    .post(self.endpoint(id, Some("caller-phone")))
                    .json(&body),
            )
            .await?;

        if let Some(message) = response.message() {
            tracing::debug!(message, "Caller phone response message");
        }

        Ok(response.into())
    }

    #[tracing::instrument(skip(self), fields(campaign_id = %id))]
    async fn get_caller_phone(&self, id: &CampaignId) -> Result<CallerPhoneInfo, ServiceError> {
        self.send(self.client.get(self.endpoint(id, Some("caller-phone"))))
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn map_transport_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::TimeoutError
    } else if e.is_decode() {
        ServiceError::DecodeError(e.to_string())
    } else {
        ServiceError::NetworkError(e.to_string())
    }
}

fn truncate_on_char_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut cut = limit;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}
