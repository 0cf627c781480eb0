//! Keeps a displayed outbound calling campaign in step with the remote
//! campaign service: initial load with a cached first paint, fixed-interval
//! polling while the campaign is live, and write-then-refresh commands.

pub mod cache;
pub mod campaign;
pub mod config;
pub mod error;
pub mod service;
pub mod sync;

pub use cache::{FileCache, MemoryCache, SnapshotCache};
pub use campaign::{
    merge, replace, CallStatus, Campaign, CampaignId, CampaignStatus, PartialCampaign, Progress,
    RecordRole, TargetRecord,
};
pub use config::{SettleConfig, SyncConfig};
pub use error::{Command, SyncError, ValidationFailure};
pub use service::{CampaignService, HttpCampaignService, ServiceError, SyncReport};
pub use sync::{
    Notice, NoticeLevel, NoticeReceiver, SyncPhase, SyncSnapshot, Synchronizer, TickOutcome,
    TickReport,
};
