//! `outreach` CLI
//!
//! Each pipeline stage is a subcommand run on its own cadence; `manage`
//! holds the operator commands between stages.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use outreach_common::config::OutreachConfig;
use outreach_common::db::{init_store, leads};
use outreach_common::models::LeadStatus;
use outreach_pipeline::runners::dispatch::DispatchOptions;
use outreach_pipeline::runners::followup_run::FollowupOptions;
use outreach_pipeline::runners::{
    dispatch, draft_email, followup_run, generate_assets, harvest, manage, refine, upload,
};
use outreach_pipeline::services::classifier::LlmClassifier;
use outreach_pipeline::services::drafter::LlmDrafter;
use outreach_pipeline::services::llm_client::LlmClient;

#[derive(Parser)]
#[command(name = "outreach", about = "Creator lead generation and outreach pipeline")]
struct Cli {
    /// Config file (falls back to OUTREACH_CONFIG, then the platform
    /// config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Discover new leads by keyword search
    Harvest {
        /// Keywords to search; stored keywords are used when omitted
        keywords: Vec<String>,
    },
    /// Score and classify harvested leads
    Refine {
        /// Process at most this many leads
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Render candidate animations for approved leads
    GenerateAssets,
    /// Publish selected renders to the video host
    Upload,
    /// Write outreach drafts for leads with approved assets
    Draft,
    /// Schedule and send approved drafts
    Dispatch {
        /// Continue an interrupted schedule instead of building a new one
        #[arg(long)]
        resume: bool,
        /// Print the most recent schedule and exit
        #[arg(long)]
        show: bool,
        /// Build and persist the schedule without sending
        #[arg(long)]
        dry_run: bool,
    },
    /// Evaluate contacted leads against the follow-up cadence
    Followups {
        /// Actually send due follow-ups (default: report only)
        #[arg(long)]
        send: bool,
    },
    /// Operator commands
    Manage {
        #[command(subcommand)]
        command: ManageCommand,
    },
}

#[derive(Subcommand)]
enum ManageCommand {
    /// List leads, optionally filtered to one status
    List {
        status: Option<String>,
    },
    /// Show everything known about one lead
    Show {
        channel_id: String,
    },
    /// Lead counts per status
    Stats,
    /// Search names, emails, and descriptions
    Search {
        query: String,
    },
    /// Advance a lead past its review gate
    Approve {
        channel_id: String,
    },
    /// Approve every lead at the given review gate
    ApproveAll {
        status: String,
    },
    /// Pick a candidate render by label
    SelectAsset {
        channel_id: String,
        label: String,
    },
    /// Set or correct a lead's contact address
    SetEmail {
        channel_id: String,
        email: String,
    },
    /// Override a lead's status
    SetStatus {
        channel_id: String,
        status: String,
        /// Bypass transition validation
        #[arg(long)]
        force: bool,
    },
    /// Append a timestamped note
    AddNote {
        channel_id: String,
        note: String,
    },
    /// Record an inbound reply
    RecordReply {
        channel_id: String,
        content: String,
    },
    /// Delete a lead and its pending schedule entries
    Delete {
        channel_id: String,
    },
    /// Maintain the harvest keyword list
    Keywords {
        #[command(subcommand)]
        command: KeywordCommand,
    },
}

#[derive(Subcommand)]
enum KeywordCommand {
    Add { keyword: String },
    List,
}

fn llm_client(config: &OutreachConfig) -> Result<LlmClient> {
    let (endpoint, api_key) = config.require_llm()?;
    let model = config.llm.model.clone().unwrap_or_default();
    if model.is_empty() {
        anyhow::bail!("llm.model is not set");
    }
    Ok(LlmClient::new(
        endpoint,
        api_key,
        model,
        config.llm.timeout_secs,
    )?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = OutreachConfig::load(cli.config.as_deref())?;
    let pool = init_store(&config.store.db_path).await?;

    match cli.command {
        Command::Harvest { keywords } => {
            let summary = harvest::run(&pool, &config, keywords).await?;
            println!(
                "harvest: {} new lead(s) from {} keyword(s) ({} filtered, {} known, {} errors)",
                summary.new_leads,
                summary.keywords,
                summary.filtered_out,
                summary.already_known,
                summary.errors
            );
        }
        Command::Refine { limit } => {
            let classifier = LlmClassifier::new(llm_client(&config)?);
            let summary = refine::run(&pool, &config, &classifier, limit).await?;
            println!(
                "refine: {} qualified, {} disqualified, {} for review, {} errors",
                summary.qualified, summary.disqualified, summary.flagged_for_review, summary.errors
            );
        }
        Command::GenerateAssets => {
            let summary = generate_assets::run(&pool, &config).await?;
            println!(
                "assets: {} submitted, {} resumed, {} completed, {} errors",
                summary.submitted, summary.resumed, summary.completed, summary.errors
            );
        }
        Command::Upload => {
            let summary = upload::run(&pool, &config).await?;
            println!(
                "upload: {} uploaded, {} skipped, {} errors",
                summary.uploaded, summary.skipped, summary.errors
            );
        }
        Command::Draft => {
            let drafter = LlmDrafter::new(llm_client(&config)?);
            let summary = draft_email::run(&pool, &config, &drafter).await?;
            println!(
                "draft: {} drafted ({} from template), {} skipped",
                summary.drafted, summary.fallbacks, summary.skipped
            );
        }
        Command::Dispatch {
            resume,
            show,
            dry_run,
        } => {
            let summary = dispatch::run(
                &pool,
                &config,
                DispatchOptions {
                    resume,
                    show,
                    dry_run,
                },
            )
            .await?;
            println!(
                "dispatch: {} scheduled, {} sent, {} cancelled, {} errors",
                summary.scheduled, summary.sent, summary.cancelled, summary.errors
            );
        }
        Command::Followups { send } => {
            let summary = followup_run::run(&pool, &config, FollowupOptions { send }).await?;
            println!(
                "followups: {} examined, {} due, {} sent, {} closed as dead",
                summary.examined, summary.due, summary.sent, summary.marked_dead
            );
        }
        Command::Manage { command } => match command {
            ManageCommand::List { status } => {
                let status = status.as_deref().map(LeadStatus::parse).transpose()?;
                manage::list(&pool, status).await?;
            }
            ManageCommand::Show { channel_id } => manage::show(&pool, &channel_id).await?,
            ManageCommand::Stats => manage::stats(&pool).await?,
            ManageCommand::Search { query } => manage::search(&pool, &query).await?,
            ManageCommand::Approve { channel_id } => manage::approve(&pool, &channel_id).await?,
            ManageCommand::ApproveAll { status } => {
                manage::approve_all(&pool, LeadStatus::parse(&status)?).await?;
            }
            ManageCommand::SelectAsset { channel_id, label } => {
                manage::select_asset(&pool, &channel_id, &label).await?;
            }
            ManageCommand::SetEmail { channel_id, email } => {
                manage::set_email(&pool, &channel_id, &email).await?;
            }
            ManageCommand::SetStatus {
                channel_id,
                status,
                force,
            } => {
                leads::update_status(&pool, &channel_id, LeadStatus::parse(&status)?, force)
                    .await?;
            }
            ManageCommand::AddNote { channel_id, note } => {
                leads::add_note(&pool, &channel_id, &note).await?;
            }
            ManageCommand::RecordReply {
                channel_id,
                content,
            } => {
                manage::record_reply(&pool, &channel_id, &content).await?;
            }
            ManageCommand::Delete { channel_id } => {
                leads::delete(&pool, &channel_id).await?;
                println!("deleted {}", channel_id);
            }
            ManageCommand::Keywords { command } => match command {
                KeywordCommand::Add { keyword } => manage::keyword_add(&pool, &keyword).await?,
                KeywordCommand::List => manage::keyword_list(&pool).await?,
            },
        },
    }

    Ok(())
}
