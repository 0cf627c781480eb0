//! Command-line front end for the campaign synchronizer.
//!
//! Usage:
//! ```bash
//! campaign-sync watch <id>                      # Follow a live campaign
//! campaign-sync start <id>                      # Launch, or resume if paused
//! campaign-sync stop <id>                       # Pause a live campaign
//! campaign-sync set-caller <id> <number>        # Assign the outbound caller number
//! campaign-sync caller <id>                     # Show the assigned caller number
//! ```

use anyhow::{Context, Result};
use campaign_sync::config;
use campaign_sync::{
    CampaignId, Notice, NoticeLevel, NoticeReceiver, SyncPhase, SyncSnapshot, Synchronizer,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// JSON config file; written with defaults when missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow a campaign until it stops being live (or Ctrl-C)
    Watch { id: String },

    /// Launch a draft campaign or resume a paused one
    Start { id: String },

    /// Pause a live campaign
    Stop { id: String },

    /// Assign the caller phone number
    SetCaller {
        id: String,
        number: String,

        /// Provider metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,

        /// Knowledge-base document id (repeatable)
        #[arg(long = "document")]
        documents: Vec<String>,
    },

    /// Show the caller phone assignment
    Caller { id: String },
}

impl Command {
    fn campaign_id(&self) -> CampaignId {
        match self {
            Command::Watch { id }
            | Command::Start { id }
            | Command::Stop { id }
            | Command::SetCaller { id, .. }
            | Command::Caller { id } => CampaignId::new(id.as_str()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse().context("failed to parse log directive")?),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).context("failed to load config")?;
    let (sync, mut notices) = Synchronizer::from_config(cli.command.campaign_id(), config)
        .context("failed to create campaign service")?;

    let result = run(&cli.command, &sync, &mut notices).await;
    sync.unmount();
    drain_notices(&mut notices);
    result
}

async fn run(command: &Command, sync: &Synchronizer, notices: &mut NoticeReceiver) -> Result<()> {
    match command {
        Command::Watch { .. } => watch(sync, notices).await,
        Command::Start { .. } => {
            sync.load().await?;
            let campaign = sync.start().await?;
            println!("{} is now {}", campaign.id, campaign.status);
            Ok(())
        }
        Command::Stop { .. } => {
            sync.load().await?;
            let campaign = sync.stop().await?;
            println!("{} is now {}", campaign.id, campaign.status);
            Ok(())
        }
        Command::SetCaller {
            number,
            metadata,
            documents,
            ..
        } => {
            let metadata = match metadata {
                Some(raw) => serde_json::from_str(raw).context("--metadata must be a JSON object")?,
                None => serde_json::Map::new(),
            };
            sync.load().await?;
            let campaign = sync
                .set_caller_phone(number, metadata, documents.clone())
                .await?;
            println!(
                "{} caller number: {}",
                campaign.id,
                campaign.assigned_caller_number.as_deref().unwrap_or("(none)")
            );
            Ok(())
        }
        Command::Caller { .. } => {
            let info = sync.caller_phone().await?;
            let number = info
                .caller_phone
                .and_then(|phone| phone.caller_number)
                .unwrap_or_else(|| "(none)".to_string());
            println!("{}", number);
            Ok(())
        }
    }
}

async fn watch(sync: &Synchronizer, notices: &mut NoticeReceiver) -> Result<()> {
    let mut updates = sync.subscribe();
    sync.load().await?;
    print_snapshot(&updates.borrow_and_update());

    if !sync.is_polling() {
        println!("Campaign is not live, nothing to follow");
        return Ok(());
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping watch");
                break;
            }

            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                print_snapshot(&snapshot);
                if snapshot.phase == SyncPhase::SyncedStatic && !sync.is_polling() {
                    break;
                }
            }

            Some(notice) = notices.recv() => print_notice(&notice),
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &SyncSnapshot) {
    let Some(campaign) = &snapshot.campaign else {
        return;
    };
    if snapshot.is_refreshing {
        return;
    }

    let mut flags = Vec::new();
    if snapshot.from_cache {
        flags.push("cached");
    }
    if snapshot.partial {
        flags.push("partial");
    }
    if snapshot.progress.is_finished() {
        flags.push("all calls done");
    }

    println!(
        "[{}] {} {}/{} calls ({:.0}%){}",
        campaign.status,
        campaign.name.as_deref().unwrap_or(campaign.id.as_str()),
        snapshot.progress.completed,
        snapshot.progress.total,
        snapshot.progress.percent(),
        if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(", "))
        }
    );
}

fn print_notice(notice: &Notice) {
    let label = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    eprintln!("{}: {}", label, notice.message);
}

fn drain_notices(notices: &mut NoticeReceiver) {
    while let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
}
