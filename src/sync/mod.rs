//! Keeps one displayed campaign consistent with the remote service.
//!
//! The [`Synchronizer`] owns the polling lifecycle for a single campaign view:
//!
//! - `load` paints from the advisory cache (or a placeholder), then replaces
//!   it with the first authoritative read.
//! - While the displayed status is live (`active`/`running`) a poll task runs
//!   every `poll_interval`; each tick reconciles with the remote dialer (when
//!   a job id is known) and then re-reads the campaign.
//! - A terminal status (`completed`/`paused`) disarms the poll task.
//! - Commands write first, then run one out-of-band cycle under the same
//!   cycle gate as ticks, so a tick never reads between a write and its
//!   follow-up fetch.
//! - `unmount` (or dropping the synchronizer) cancels the poll task and
//!   discards every result still in flight.
//!
//! State is published through a [`tokio::sync::watch`] channel; user-facing
//! messages go through an unbounded notice channel.

mod commands;
mod metrics;
mod notice;
mod poller;
mod settle;

#[cfg(test)]
mod testing;

pub use commands::{normalize_phone_number, validate_start};
pub use metrics::SyncMetrics;
pub use notice::{Notice, NoticeLevel, NoticeReceiver, NoticeSender};
pub use settle::{SettleOutcome, SettlePolicy};

use crate::cache::{FileCache, MemoryCache, SnapshotCache};
use crate::campaign::{replace, Campaign, CampaignId, CampaignStatus, Progress};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::service::{CampaignService, HttpCampaignService, ServiceError, SyncReport};
use chrono::{DateTime, Utc};
use poller::PollHandle;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    SyncedStatic,
    SyncedLive,
    Unmounted,
}

impl SyncPhase {
    fn for_status(status: CampaignStatus) -> Self {
        if status.is_live() {
            SyncPhase::SyncedLive
        } else {
            SyncPhase::SyncedStatic
        }
    }
}

/// What the view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSnapshot {
    pub phase: SyncPhase,
    pub campaign: Option<Campaign>,
    pub progress: Progress,
    pub is_refreshing: bool,
    pub last_error: Option<SyncError>,
    /// Displayed campaign came from the cache and has not been confirmed yet.
    pub from_cache: bool,
    /// The last load failed; what is shown may be stale or a placeholder.
    pub partial: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl Default for SyncSnapshot {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            campaign: None,
            progress: Progress::default(),
            is_refreshing: false,
            last_error: None,
            from_cache: false,
            partial: false,
            last_synced_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A previous cycle was still in flight; nothing was sent.
    Skipped,
    Applied {
        status: CampaignStatus,
        progress: Progress,
    },
    Failed(ServiceError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// `None` when the campaign has no remote job to reconcile.
    pub resync: Option<Result<SyncReport, ServiceError>>,
    pub outcome: TickOutcome,
}

impl TickReport {
    fn skipped() -> Self {
        Self {
            resync: None,
            outcome: TickOutcome::Skipped,
        }
    }
}

pub struct Synchronizer {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) id: CampaignId,
    service: Arc<dyn CampaignService>,
    cache: Arc<dyn SnapshotCache>,
    config: SyncConfig,
    settle: SettlePolicy,
    state: watch::Sender<SyncSnapshot>,
    notices: NoticeSender,
    /// Held for the whole of any network cycle; ticks skip when it is taken.
    gate: tokio::sync::Mutex<()>,
    lifecycle: CancellationToken,
    poller: Mutex<Option<PollHandle>>,
    metrics: Mutex<SyncMetrics>,
}

impl Synchronizer {
    pub fn new(
        id: CampaignId,
        service: Arc<dyn CampaignService>,
        cache: Arc<dyn SnapshotCache>,
        config: SyncConfig,
    ) -> (Self, NoticeReceiver) {
        let (notices, notice_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SyncSnapshot::default());

        tracing::info!(
            campaign_id = %id,
            service = service.name(),
            poll_interval_secs = config.poll_interval().as_secs(),
            "Synchronizer created"
        );

        let inner = Inner {
            id,
            service,
            cache,
            settle: SettlePolicy::new(&config.settle),
            config,
            state,
            notices,
            gate: tokio::sync::Mutex::new(()),
            lifecycle: CancellationToken::new(),
            poller: Mutex::new(None),
            metrics: Mutex::new(SyncMetrics::new()),
        };

        (
            Self {
                inner: Arc::new(inner),
            },
            notice_rx,
        )
    }

    /// HTTP service plus a file cache when `cache_dir` is configured.
    pub fn from_config(
        id: CampaignId,
        config: SyncConfig,
    ) -> Result<(Self, NoticeReceiver), ServiceError> {
        let service = Arc::new(HttpCampaignService::from_config(&config)?);
        let cache: Arc<dyn SnapshotCache> = match &config.cache_dir {
            Some(dir) => {
                let cache = FileCache::new(dir);
                tracing::info!(dir = %cache.dir().display(), "Using file snapshot cache");
                Arc::new(cache)
            }
            None => Arc::new(MemoryCache::new()),
        };
        Ok(Self::new(id, service, cache, config))
    }

    pub fn campaign_id(&self) -> &CampaignId {
        &self.inner.id
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn metrics(&self) -> SyncMetrics {
        self.inner
            .metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .map(|p| p.as_ref().map(PollHandle::is_active).unwrap_or(false))
            .unwrap_or(false)
    }

    pub async fn load(&self) -> Result<Campaign, SyncError> {
        self.inner.load().await
    }

    /// One polling cycle. Normally driven by the poll task.
    pub async fn tick(&self) -> Result<TickReport, SyncError> {
        self.inner.tick().await
    }

    /// Out-of-band cycle; waits for an in-flight cycle instead of skipping.
    pub async fn force_refresh(&self) -> Result<Campaign, SyncError> {
        let _cycle = self.inner.gate.lock().await;
        let report = self.inner.run_cycle("refresh").await?;
        match report.outcome {
            TickOutcome::Failed(e) => {
                let err = SyncError::TickFailure(e);
                self.inner.report(&err, NoticeLevel::Warning);
                Err(err)
            }
            _ => self.inner.displayed().ok_or(SyncError::Unmounted),
        }
    }

    /// Stops polling and discards every result still in flight. Idempotent.
    pub fn unmount(&self) {
        let changed = self.inner.state.send_if_modified(|snap| {
            if snap.phase == SyncPhase::Unmounted {
                return false;
            }
            snap.phase = SyncPhase::Unmounted;
            snap.is_refreshing = false;
            true
        });

        self.inner.lifecycle.cancel();
        if let Ok(mut poller) = self.inner.poller.lock() {
            if let Some(handle) = poller.take() {
                handle.abort();
            }
        }

        if changed {
            tracing::info!(campaign_id = %self.inner.id, "Synchronizer unmounted");
        }
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl Inner {
    /// Applies `f` unless the view is unmounted; the check and the write
    /// happen under the snapshot lock.
    fn update<T>(&self, f: impl FnOnce(&mut SyncSnapshot) -> T) -> Result<T, SyncError> {
        let mut out = None;
        self.state.send_if_modified(|snap| {
            if snap.phase == SyncPhase::Unmounted {
                return false;
            }
            out = Some(f(snap));
            true
        });
        out.ok_or(SyncError::Unmounted)
    }

    fn displayed(&self) -> Option<Campaign> {
        self.state.borrow().campaign.clone()
    }

    fn is_alive(&self) -> bool {
        !self.lifecycle.is_cancelled()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Routine failures (polling, unmount races) stay in the logs.
    fn report(&self, err: &SyncError, level: NoticeLevel) {
        if err.is_user_visible() {
            self.notify(Notice::new(level, err.to_string()));
        }
    }

    fn record(&self, operation: &'static str, ok: bool) {
        if let Ok(mut metrics) = self.metrics.lock() {
            if ok {
                metrics.record_success(operation);
            } else {
                metrics.record_failure(operation);
            }
        }
    }

    /// Full replacement from a server read; clears any error banner.
    fn apply_authoritative(self: &Arc<Self>, incoming: Campaign) -> Result<Campaign, SyncError> {
        let merged = self.update(|snap| {
            let merged = match &snap.campaign {
                Some(current) => replace(current, incoming),
                None => incoming,
            };
            snap.phase = SyncPhase::for_status(merged.status);
            snap.progress = merged.progress();
            snap.campaign = Some(merged.clone());
            snap.is_refreshing = false;
            snap.last_error = None;
            snap.from_cache = false;
            snap.partial = false;
            snap.last_synced_at = Some(Utc::now());
            merged
        })?;

        self.cache.store(&merged);
        self.reconcile_polling(merged.status);
        Ok(merged)
    }

    /// Poll task armed exactly while the displayed status is live.
    fn reconcile_polling(self: &Arc<Self>, status: CampaignStatus) {
        if status.is_live() {
            self.arm();
        } else {
            self.disarm();
        }
    }

    fn arm(self: &Arc<Self>) {
        let Ok(mut poller) = self.poller.lock() else {
            return;
        };
        if !self.is_alive() {
            return;
        }
        if poller.as_ref().map(PollHandle::is_active).unwrap_or(false) {
            return;
        }

        tracing::info!(
            campaign_id = %self.id,
            interval_secs = self.config.poll_interval().as_secs(),
            "Polling armed"
        );
        *poller = Some(PollHandle::spawn(
            Arc::downgrade(self),
            self.config.poll_interval(),
            self.lifecycle.child_token(),
        ));
    }

    fn disarm(&self) {
        let handle = self.poller.lock().ok().and_then(|mut p| p.take());
        if let Some(handle) = handle {
            tracing::info!(campaign_id = %self.id, "Polling disarmed");
            handle.stop();
        }
    }

    async fn load(self: &Arc<Self>) -> Result<Campaign, SyncError> {
        let cached = self.cache.read(&self.id);
        let from_cache = cached.is_some();
        let initial = cached.unwrap_or_else(|| Campaign::placeholder(self.id.clone()));

        self.update(|snap| {
            snap.phase = SyncPhase::Loading;
            snap.progress = initial.progress();
            snap.campaign = Some(initial);
            snap.from_cache = from_cache;
            snap.partial = false;
            snap.is_refreshing = true;
        })?;

        tracing::info!(campaign_id = %self.id, from_cache, "Loading campaign");

        let _cycle = self.gate.lock().await;
        match self.service.get_campaign_detail(&self.id).await {
            Ok(campaign) => {
                self.record("load", true);
                self.apply_authoritative(campaign)
            }
            Err(ServiceError::NotFound) => {
                self.record("load", false);
                let err = SyncError::NotFound(self.id.clone());
                let placeholder = Campaign::placeholder(self.id.clone());
                let status = placeholder.status;
                self.update(|snap| {
                    snap.progress = placeholder.progress();
                    snap.campaign = Some(placeholder);
                    snap.is_refreshing = false;
                    snap.from_cache = false;
                    snap.partial = false;
                    snap.last_error = Some(err.clone());
                })?;
                // A cached copy of a deleted campaign is worse than nothing
                self.cache.invalidate(&self.id);
                self.settle_phase(Some(status));
                tracing::warn!(campaign_id = %self.id, "Campaign not found");
                self.report(&err, NoticeLevel::Error);
                Err(err)
            }
            Err(e) => {
                self.record("load", false);
                tracing::warn!(campaign_id = %self.id, "Load failed, keeping fallback: {}", e);
                let err = SyncError::LoadFailure(e);
                let shown = self.update(|snap| {
                    snap.is_refreshing = false;
                    snap.partial = true;
                    snap.last_error = Some(err.clone());
                    snap.campaign.clone()
                })?;
                let shown = shown.unwrap_or_else(|| Campaign::placeholder(self.id.clone()));
                self.settle_phase(Some(shown.status));
                self.report(&err, NoticeLevel::Warning);
                Ok(shown)
            }
        }
    }

    /// Leaves `Loading` for the phase matching what is displayed.
    fn settle_phase(self: &Arc<Self>, status: Option<CampaignStatus>) {
        let status = status.unwrap_or(CampaignStatus::Draft);
        let _ = self.update(|snap| snap.phase = SyncPhase::for_status(status));
        self.reconcile_polling(status);
    }

    async fn tick(self: &Arc<Self>) -> Result<TickReport, SyncError> {
        if !self.is_alive() {
            return Err(SyncError::Unmounted);
        }

        let Ok(_cycle) = self.gate.try_lock() else {
            tracing::debug!(campaign_id = %self.id, "Previous cycle still in flight, skipping tick");
            if let Ok(mut metrics) = self.metrics.lock() {
                metrics.record_skip();
            }
            return Ok(TickReport::skipped());
        };

        self.run_cycle("tick").await
    }

    /// Resync (when a remote job exists) then authoritative fetch.
    /// Callers hold the cycle gate.
    async fn run_cycle(self: &Arc<Self>, trigger: &'static str) -> Result<TickReport, SyncError> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::debug_span!("sync_cycle", campaign_id = %self.id, %cycle_id, trigger);

        async move {
            let remote_job = self.update(|snap| {
                snap.is_refreshing = true;
                snap.campaign.as_ref().and_then(|c| c.remote_job_id.clone())
            })?;

            let resync = match remote_job {
                Some(job_id) => Some(self.resync(&job_id).await),
                None => None,
            };

            match self.service.get_campaign_detail(&self.id).await {
                Ok(campaign) => {
                    self.record(trigger, true);
                    let merged = self.apply_authoritative(campaign)?;
                    tracing::debug!(status = %merged.status, "Cycle applied");
                    Ok(TickReport {
                        resync,
                        outcome: TickOutcome::Applied {
                            status: merged.status,
                            progress: merged.progress(),
                        },
                    })
                }
                Err(e) => {
                    self.record(trigger, false);
                    tracing::warn!("Campaign fetch failed, retrying next cycle: {}", e);
                    self.update(|snap| snap.is_refreshing = false)?;
                    Ok(TickReport {
                        resync,
                        outcome: TickOutcome::Failed(e),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Best effort: the caller decides what a failure means.
    async fn resync(&self, job_id: &str) -> Result<SyncReport, ServiceError> {
        let result = self.service.sync_campaign_records(&self.id).await;
        match &result {
            Ok(report) => {
                self.record("resync", true);
                if report.changed() {
                    tracing::info!(
                        job_id,
                        new_records = report.new_records_added,
                        status_updates = report.status_updates,
                        recording_updates = report.recording_updates,
                        "Resync applied remote changes"
                    );
                }
            }
            Err(e) => {
                self.record("resync", false);
                tracing::warn!(job_id, "Resync failed: {}", e);
            }
        }
        result
    }
}
