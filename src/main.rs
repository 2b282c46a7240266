use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use retreat_dashboard::{ErrorCode, render_error};
use retreat_dashboard::config::{ConfigError, DashboardConfig};
use retreat_dashboard::model::{ActionItem, ActionStatus, Platform, PostStatus, Record, SocialPost, StaffMember};
use retreat_dashboard::services::collection::{self, CollectionError};
use retreat_dashboard::services::sync::spawn_monitor;
use retreat_dashboard::state::AppState;
use retreat_dashboard::storage::OriginStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("missing user; pass --user or set DASHBOARD_USER")]
    MissingUser,
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error("snapshot could not be written; see log for the storage error")]
    SnapshotFailed,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl ErrorCode for CliError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::MissingUser => "E_MISSING_USER",
            Self::Collection(e) => e.error_code(),
            Self::SnapshotFailed => "E_SNAPSHOT_FAILED",
            Self::InvalidJson(_) => "E_JSON",
            Self::Signal(_) => "E_SIGNAL",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Collection(e) if e.retryable())
    }
}

#[derive(Parser, Debug)]
#[command(name = "retreat-dashboard", about = "Retreat dashboard collections and sync monitor")]
struct Cli {
    /// JSON file backing local storage. In-memory when unset.
    #[arg(long, env = "DASHBOARD_STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Acting user, resolved against DASHBOARD_ROLES.
    #[arg(long, env = "DASHBOARD_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture a snapshot of every collection now.
    Sync,
    /// Report whether collections drifted from the stored snapshot.
    Check,
    /// Reload every collection and capture a fresh snapshot.
    Refresh,
    /// Run the sync monitor until interrupted.
    Watch,
    Staff(StaffCommand),
    Actions(ActionsCommand),
    Posts(PostsCommand),
}

#[derive(Args, Debug)]
struct StaffCommand {
    #[command(subcommand)]
    command: StaffSubcommand,
}

#[derive(Subcommand, Debug)]
enum StaffSubcommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        role: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    Remove {
        id: String,
    },
}

#[derive(Args, Debug)]
struct ActionsCommand {
    #[command(subcommand)]
    command: ActionsSubcommand,
}

#[derive(Subcommand, Debug)]
enum ActionsSubcommand {
    List,
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        owner: String,
        #[arg(long, help = "Due date, YYYY-MM-DD")]
        due: Option<String>,
        #[arg(long)]
        meeting: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long, value_parser = parse_enum::<ActionStatus>, help = "open, in_progress or done")]
        status: Option<ActionStatus>,
    },
    Remove {
        id: String,
    },
}

#[derive(Args, Debug)]
struct PostsCommand {
    #[command(subcommand)]
    command: PostsSubcommand,
}

#[derive(Subcommand, Debug)]
enum PostsSubcommand {
    List,
    Add {
        #[arg(long, value_parser = parse_enum::<Platform>)]
        platform: Platform,
        #[arg(long)]
        caption: String,
        #[arg(long, help = "Publish date, YYYY-MM-DD")]
        date: String,
        #[arg(long, value_parser = parse_enum::<PostStatus>, default_value = "draft")]
        status: PostStatus,
    },
    Update {
        id: String,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_parser = parse_enum::<PostStatus>)]
        status: Option<PostStatus>,
    },
    Remove {
        id: String,
    },
}

/// Parse a lowercase enum name using the record's serde representation.
fn parse_enum<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(raw.trim().to_ascii_lowercase())).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so stdout stays parseable JSON.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    if dotenvy::dotenv().is_ok() {
        info!("loaded environment from .env");
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = DashboardConfig::from_env()?;
    let origin = match cli.storage.or_else(|| config.storage_path.clone()) {
        Some(path) => {
            info!(path = %path.display(), "using file-backed storage");
            OriginStore::open(path, config.storage_quota_bytes)
        }
        None => {
            info!("using in-memory storage; nothing will persist");
            OriginStore::in_memory(config.storage_quota_bytes)
        }
    };
    if config.roles.is_empty() {
        warn!("DASHBOARD_ROLES is empty; collection commands will be refused");
    }
    let context = origin.context();
    info!(
        context = %context.id(),
        quota_bytes = origin.quota_bytes(),
        roles = config.roles.len(),
        "dashboard context opened"
    );
    let state = AppState::new(Arc::new(context), Arc::new(config.roles.clone()));

    match cli.command {
        Command::Sync => {
            let snapshot = state.monitor.sync_data().ok_or(CliError::SnapshotFailed)?;
            let rendered: Value = serde_json::from_str(&snapshot.to_json().map_err(|_| CliError::SnapshotFailed)?)?;
            print_json(&rendered)
        }
        Command::Check => print_json(&serde_json::json!({ "diverged": state.monitor.check_for_updates() })),
        Command::Refresh => {
            state.monitor.refresh_data().ok_or(CliError::SnapshotFailed)?;
            let model = state.model();
            print_json(&serde_json::json!({
                "actionItems": model.action_items.len(),
                "socialPosts": model.social_posts.len(),
                "staff": model.staff.len(),
            }))
        }
        Command::Watch => run_watch(&state, &config).await,
        Command::Staff(staff) => run_staff(&state, require_user(cli.user)?.as_str(), staff),
        Command::Actions(actions) => run_actions(&state, require_user(cli.user)?.as_str(), actions),
        Command::Posts(posts) => run_posts(&state, require_user(cli.user)?.as_str(), posts),
    }
}

fn require_user(user: Option<String>) -> Result<String, CliError> {
    user.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty()).ok_or(CliError::MissingUser)
}

async fn run_watch(state: &AppState, config: &DashboardConfig) -> Result<(), CliError> {
    let handle = spawn_monitor(state.monitor.clone(), config.sync_interval);
    tokio::signal::ctrl_c().await?;
    info!("interrupt received; stopping sync monitor");
    handle.dispose();
    Ok(())
}

fn run_staff(state: &AppState, user: &str, staff: StaffCommand) -> Result<(), CliError> {
    match staff.command {
        StaffSubcommand::List => print_records(&collection::list::<StaffMember>(state, user)?),
        StaffSubcommand::Add { name, role, email, phone } => {
            let created = collection::create(state, user, StaffMember { id: String::new(), name, role, email, phone })?;
            print_record(&created)
        }
        StaffSubcommand::Update { id, name, role, email, phone } => {
            let mut member = collection::get::<StaffMember>(state, user, &id)?;
            if let Some(name) = name {
                member.name = name;
            }
            if let Some(role) = role {
                member.role = role;
            }
            if email.is_some() {
                member.email = email;
            }
            if phone.is_some() {
                member.phone = phone;
            }
            print_record(&collection::update(state, user, member)?)
        }
        StaffSubcommand::Remove { id } => remove::<StaffMember>(state, user, &id),
    }
}

fn run_actions(state: &AppState, user: &str, actions: ActionsCommand) -> Result<(), CliError> {
    match actions.command {
        ActionsSubcommand::List => print_records(&collection::list::<ActionItem>(state, user)?),
        ActionsSubcommand::Add { description, owner, due, meeting } => {
            let item = ActionItem {
                id: String::new(),
                description,
                owner,
                due_date: due,
                status: ActionStatus::Open,
                meeting,
            };
            print_record(&collection::create(state, user, item)?)
        }
        ActionsSubcommand::Update { id, description, owner, due, status } => {
            let mut item = collection::get::<ActionItem>(state, user, &id)?;
            if let Some(description) = description {
                item.description = description;
            }
            if let Some(owner) = owner {
                item.owner = owner;
            }
            if due.is_some() {
                item.due_date = due;
            }
            if let Some(status) = status {
                item.status = status;
            }
            print_record(&collection::update(state, user, item)?)
        }
        ActionsSubcommand::Remove { id } => remove::<ActionItem>(state, user, &id),
    }
}

fn run_posts(state: &AppState, user: &str, posts: PostsCommand) -> Result<(), CliError> {
    match posts.command {
        PostsSubcommand::List => print_records(&collection::list::<SocialPost>(state, user)?),
        PostsSubcommand::Add { platform, caption, date, status } => {
            let post = SocialPost { id: String::new(), platform, caption, scheduled_for: date, status };
            print_record(&collection::create(state, user, post)?)
        }
        PostsSubcommand::Update { id, caption, date, status } => {
            let mut post = collection::get::<SocialPost>(state, user, &id)?;
            if let Some(caption) = caption {
                post.caption = caption;
            }
            if let Some(date) = date {
                post.scheduled_for = date;
            }
            if let Some(status) = status {
                post.status = status;
            }
            print_record(&collection::update(state, user, post)?)
        }
        PostsSubcommand::Remove { id } => remove::<SocialPost>(state, user, &id),
    }
}

fn remove<T: Record>(state: &AppState, user: &str, id: &str) -> Result<(), CliError> {
    collection::delete::<T>(state, user, id)?;
    print_json(&serde_json::json!({ "deleted": id }))
}

fn print_record<T: Serialize>(record: &T) -> Result<(), CliError> {
    print_json(&serde_json::to_value(record)?)
}

fn print_records<T: Serialize>(records: &[T]) -> Result<(), CliError> {
    print_json(&serde_json::to_value(records)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
