//! User-initiated writes.
//!
//! Every command validates locally first and sends nothing on a validation
//! failure. Writes hold the cycle gate for the write and its follow-up read,
//! so the poll task can never interleave a stale read.

use super::{Inner, Notice, NoticeLevel, SettleOutcome, SyncPhase, Synchronizer};
use crate::campaign::{merge, Campaign, CampaignStatus};
use crate::error::{Command, SyncError, ValidationFailure};
use crate::service::{CallerPhoneInfo, CallerPhoneRequest, ServiceError};
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Strips the usual separators and checks for an E.164-style number.
pub fn normalize_phone_number(input: &str) -> Option<String> {
    static PHONE_RE: OnceLock<Regex> = OnceLock::new();
    let re = PHONE_RE.get_or_init(|| Regex::new(r"^\+?[1-9]\d{6,14}$").expect("valid phone regex"));

    let compact: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    re.is_match(&compact).then_some(compact)
}

/// Local preconditions for `start`.
pub fn validate_start(campaign: &Campaign) -> Result<(), ValidationFailure> {
    if campaign.status.is_live() {
        return Err(ValidationFailure::AlreadyLive);
    }
    if !campaign.has_caller_number() {
        return Err(ValidationFailure::MissingCallerNumber);
    }
    if campaign.target_count() == 0 {
        return Err(ValidationFailure::NoTargets);
    }
    Ok(())
}

impl Synchronizer {
    /// Launches a draft campaign, or resumes a paused one.
    pub async fn start(&self) -> Result<Campaign, SyncError> {
        let inner = &self.inner;
        let current = inner.require_loaded()?;
        if let Err(failure) = validate_start(&current) {
            return Err(inner.reject(failure));
        }

        let command = if current.status == CampaignStatus::Paused {
            Command::Resume
        } else {
            Command::Launch
        };
        let previous = inner.enter_loading()?;

        let _cycle = inner.gate.lock().await;
        tracing::info!(campaign_id = %inner.id, %command, "Starting campaign");

        let written = match command {
            Command::Resume => inner.service.resume_campaign(&inner.id).await,
            _ => inner.service.launch_campaign(&inner.id).await,
        };
        match written {
            Ok(campaign) => {
                inner.record(command.as_str(), true);
                inner.apply_authoritative(campaign)?;
                inner.notify(Notice::info("Campaign started"));
            }
            Err(e) => return Err(inner.fail_command(command, e, Some(previous))),
        }

        inner.run_cycle("command").await?;
        inner.displayed().ok_or(SyncError::Unmounted)
    }

    /// Pauses a live campaign. The paused status is shown immediately and
    /// then confirmed (or corrected) by the follow-up read.
    pub async fn stop(&self) -> Result<Campaign, SyncError> {
        let inner = &self.inner;
        let current = inner.require_loaded()?;
        if !current.status.is_live() {
            return Err(inner.reject(ValidationFailure::NotLive));
        }
        let previous = inner.enter_loading()?;

        let _cycle = inner.gate.lock().await;
        tracing::info!(campaign_id = %inner.id, "Stopping campaign");

        match inner.service.pause_campaign(&inner.id).await {
            Ok(_) => {
                inner.record(Command::Pause.as_str(), true);
                inner.apply_optimistic_pause()?;
                inner.notify(Notice::info("Campaign paused"));
            }
            Err(e) => return Err(inner.fail_command(Command::Pause, e, Some(previous))),
        }

        inner.run_cycle("command").await?;
        inner.displayed().ok_or(SyncError::Unmounted)
    }

    /// Assigns the outbound caller number, then re-reads until the backend's
    /// own sync has settled.
    pub async fn set_caller_phone(
        &self,
        number: &str,
        provider_metadata: serde_json::Map<String, serde_json::Value>,
        document_ids: Vec<String>,
    ) -> Result<Campaign, SyncError> {
        let inner = &self.inner;
        let Some(number) = normalize_phone_number(number) else {
            return Err(inner.reject(ValidationFailure::InvalidPhoneNumber(number.to_string())));
        };
        let current = inner.require_loaded()?;

        let _cycle = inner.gate.lock().await;
        tracing::info!(campaign_id = %inner.id, documents = document_ids.len(), "Assigning caller phone");

        let request = CallerPhoneRequest {
            number,
            provider_metadata,
            document_ids,
        };
        let response = match inner.service.set_caller_phone(&inner.id, &request).await {
            Ok(response) if response.success => response,
            Ok(_) => {
                let rejected = ServiceError::Rejected("caller phone not accepted".to_string());
                return Err(inner.fail_command(Command::SetCallerPhone, rejected, None));
            }
            Err(e) => return Err(inner.fail_command(Command::SetCallerPhone, e, None)),
        };
        inner.record(Command::SetCallerPhone.as_str(), true);

        let merged = inner.update(|snap| {
            let base = snap.campaign.take().unwrap_or(current);
            let merged = merge(&base, response.campaign);
            snap.phase = SyncPhase::for_status(merged.status);
            snap.progress = merged.progress();
            snap.campaign = Some(merged.clone());
            snap.last_error = None;
            merged
        })?;
        inner.cache.store(&merged);
        // The write may flip the status as a side effect.
        inner.reconcile_polling(merged.status);
        inner.notify(Notice::info("Caller phone number updated"));

        if let Some(job_id) = merged.remote_job_id.clone() {
            let _ = inner.resync(&job_id).await;
        }

        let reader: &Inner = inner;
        let settled = inner
            .settle
            .settle(
                merged,
                &inner.lifecycle,
                move || reader.service.get_campaign_detail(&reader.id),
                ServiceError::is_retryable,
            )
            .await;

        match settled {
            Ok(outcome) => {
                match &outcome {
                    SettleOutcome::Stable { attempts, .. } => {
                        tracing::debug!(attempts, "Campaign settled");
                    }
                    SettleOutcome::Exhausted { attempts, .. } => {
                        tracing::warn!(attempts, "Campaign did not settle, keeping last read");
                    }
                    SettleOutcome::Cancelled { .. } => {
                        tracing::debug!(
                            attempts = outcome.attempts(),
                            "Unmounted while settling, dropping reads"
                        );
                        return Err(SyncError::Unmounted);
                    }
                }
                inner.record("settle", true);
                if let Some(campaign) = outcome.into_value() {
                    inner.apply_authoritative(campaign)?;
                }
            }
            Err(e) => {
                inner.record("settle", false);
                tracing::warn!("Settle read failed, keeping merged state: {}", e);
            }
        }

        inner.displayed().ok_or(SyncError::Unmounted)
    }

    /// Current caller assignment, for prefilling a form. Leaves state alone.
    pub async fn caller_phone(&self) -> Result<CallerPhoneInfo, SyncError> {
        let inner = &self.inner;
        if !inner.is_alive() {
            return Err(SyncError::Unmounted);
        }

        match inner.service.get_caller_phone(&inner.id).await {
            Ok(info) => {
                inner.record(Command::GetCallerPhone.as_str(), true);
                Ok(info)
            }
            Err(e) => {
                inner.record(Command::GetCallerPhone.as_str(), false);
                let err = SyncError::CommandFailure {
                    command: Command::GetCallerPhone,
                    error: e,
                };
                inner.report(&err, NoticeLevel::Error);
                Err(err)
            }
        }
    }
}

impl Inner {
    fn require_loaded(&self) -> Result<Campaign, SyncError> {
        let snap = self.state.borrow();
        if snap.phase == SyncPhase::Unmounted {
            return Err(SyncError::Unmounted);
        }
        snap.campaign
            .clone()
            .ok_or(SyncError::Validation(ValidationFailure::NotLoaded))
    }

    fn reject(&self, failure: ValidationFailure) -> SyncError {
        tracing::info!(campaign_id = %self.id, "Command rejected: {}", failure);
        let err = SyncError::Validation(failure);
        self.report(&err, NoticeLevel::Warning);
        err
    }

    fn enter_loading(&self) -> Result<SyncPhase, SyncError> {
        self.update(|snap| std::mem::replace(&mut snap.phase, SyncPhase::Loading))
    }

    /// Restores the phase and surfaces the failure; campaign data is untouched.
    fn fail_command(
        &self,
        command: Command,
        error: ServiceError,
        restore: Option<SyncPhase>,
    ) -> SyncError {
        self.record(command.as_str(), false);
        tracing::warn!(campaign_id = %self.id, %command, "Command failed: {}", error);

        let err = SyncError::CommandFailure { command, error };
        let applied = self.update(|snap| {
            if let Some(phase) = restore {
                snap.phase = phase;
            }
            snap.last_error = Some(err.clone());
        });
        if let Err(unmounted) = applied {
            return unmounted;
        }

        self.report(&err, NoticeLevel::Error);
        err
    }

    /// Shows `paused` before the server confirms it.
    fn apply_optimistic_pause(self: &Arc<Self>) -> Result<(), SyncError> {
        self.update(|snap| {
            if let Some(campaign) = snap.campaign.as_mut() {
                campaign.status = CampaignStatus::Paused;
            }
            snap.phase = SyncPhase::SyncedStatic;
        })?;
        self.cache.invalidate(&self.id);
        self.disarm();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{CallStatus, CampaignId, TargetRecord};

    fn campaign(status: CampaignStatus, caller: Option<&str>, targets: usize) -> Campaign {
        let mut campaign = Campaign::placeholder(CampaignId::new("c-1"));
        campaign.status = status;
        campaign.assigned_caller_number = caller.map(str::to_string);
        campaign.target_records = (0..targets)
            .map(|i| TargetRecord::target(format!("+1555000000{}", i), CallStatus::Pending))
            .collect();
        campaign
    }

    #[test]
    fn phone_numbers_are_normalized() {
        assert_eq!(
            normalize_phone_number("+1 (555) 123-4567").as_deref(),
            Some("+15551234567")
        );
        assert_eq!(normalize_phone_number("447911123456").as_deref(), Some("447911123456"));
        assert_eq!(normalize_phone_number("12345"), None);
        assert_eq!(normalize_phone_number("+0123456789"), None);
        assert_eq!(normalize_phone_number("call me"), None);
    }

    #[test]
    fn start_requires_caller_and_targets() {
        assert_eq!(
            validate_start(&campaign(CampaignStatus::Draft, None, 3)),
            Err(ValidationFailure::MissingCallerNumber)
        );
        assert_eq!(
            validate_start(&campaign(CampaignStatus::Draft, Some("+15550000000"), 0)),
            Err(ValidationFailure::NoTargets)
        );
        assert_eq!(
            validate_start(&campaign(CampaignStatus::Running, Some("+15550000000"), 3)),
            Err(ValidationFailure::AlreadyLive)
        );
        assert_eq!(
            validate_start(&campaign(CampaignStatus::Paused, Some("+15550000000"), 3)),
            Ok(())
        );
    }
}
