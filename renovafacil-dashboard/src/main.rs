use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

use renovafacil_dashboard::config::DashboardConfig;
use renovafacil_dashboard::error::ApiError;
use renovafacil_dashboard::handlers::{self, inbox::ListOptions, AppContext};
use renovafacil_dashboard::helpers::notifier::Notifier;
use renovafacil_dashboard::helpers::store_path::initialize_store;
use renovafacil_dashboard::inbox::ConversationFilter;
use renovafacil_dashboard::integrations::improvement::MutationAction;
use renovafacil_dashboard::integrations::BackendClient;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operator dashboard for the Renovafacil WhatsApp bot", long_about = None)]
struct Args {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    log_file_path: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session against the backend
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show the logged-in operator
    Whoami,
    /// WhatsApp conversations
    Inbox {
        #[command(subcommand)]
        command: InboxCommand,
    },
    /// Abandoned cart recovery
    Carts {
        #[command(subcommand)]
        command: CartsCommand,
    },
    /// Look up an order
    Order { number: String },
    /// Shipping status of an order
    Track { number: String },
    /// Bot metrics
    Metrics {
        /// Keep refreshing until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// Backend health check
    Health,
    /// Facebook comment moderation feed
    Comments,
    /// Self-improvement suggestions and mutations
    Improve {
        #[command(subcommand)]
        command: ImproveCommand,
    },
    /// Scripted conversation simulations
    Simulate {
        #[command(subcommand)]
        command: SimulateCommand,
    },
    /// Show the effective configuration
    Settings,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    /// all, unread, incoming or outgoing
    #[arg(long, default_value = "all")]
    filter: ConversationFilter,
    /// Case- and accent-insensitive text search
    #[arg(long)]
    search: Option<String>,
    /// Show test conversations instead of real ones
    #[arg(long)]
    test: bool,
}

impl From<ListArgs> for ListOptions {
    fn from(args: ListArgs) -> Self {
        ListOptions {
            filter: args.filter,
            search: args.search,
            test: args.test,
        }
    }
}

#[derive(Subcommand, Debug)]
enum InboxCommand {
    /// List conversations, unread first
    List(ListArgs),
    /// Open a conversation and print its messages by day
    Show { phone: String },
    /// Send a manual message
    Send { phone: String, message: String },
    /// Mark a conversation as attended
    Attend { phone: String },
    /// Order history of a phone number
    Contact { phone: String },
    /// Follow the inbox live until Ctrl+C
    Watch {
        #[command(flatten)]
        list: ListArgs,
        /// Also follow this conversation's messages
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CartsCommand {
    List,
    /// Send a recovery message for one cart
    Recover {
        cart_id: i64,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run recovery over every eligible cart
    RecoverAll {
        #[arg(long)]
        dry_run: bool,
        /// Only carts abandoned at least this many hours ago
        #[arg(long)]
        min_hours: Option<u32>,
    },
    Logs,
    Responses,
    Stats,
}

#[derive(Subcommand, Debug)]
enum ImproveCommand {
    Stats,
    Suggestions,
    Mutations,
    /// Analyze recent conversations for new suggestions
    Analyze,
    Approve { mutation_id: i64 },
    Reject { mutation_id: i64 },
    Deactivate { mutation_id: i64 },
}

#[derive(Subcommand, Debug)]
enum SimulateCommand {
    Scenarios,
    /// Start a simulation run
    Run {
        scenario: String,
        #[arg(long)]
        phone: Option<String>,
        /// Poll until the run finishes
        #[arg(long)]
        follow: bool,
    },
    Status { session_id: String },
}

fn init_tracing(log_file_path: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    if let Some(log_path) = log_file_path {
        let log_path = std::path::Path::new(log_path);
        let file_appender = tracing_appender::rolling::never(
            log_path.parent().unwrap_or(std::path::Path::new(".")),
            log_path
                .file_name()
                .unwrap_or(std::ffi::OsStr::new("renovafacil.log")),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        std::mem::forget(guard);

        tracing_subscriber::registry()
            .with(env_filter.clone())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_file_path.as_deref());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)) {
                eprintln!("Not logged in or session expired. Run `renovafacil login <username>` to continue.");
                return ExitCode::from(2);
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let (config, config_path) =
        DashboardConfig::load(args.config.as_deref()).context("Failed to load config")?;
    tracing::debug!("Using config at {:?}", config_path);

    let store = initialize_store(&config.storage).context("Failed to open local store")?;
    let backend = BackendClient::new(&config.backend, store)?;
    tracing::info!("Backend at {}", config.backend.base_url);

    let ctx = AppContext {
        config,
        config_path,
        backend,
        notifier: Notifier::new(),
        json: args.json,
    };

    match args.command {
        Command::Login { username, password } => handlers::auth::login(&ctx, &username, password).await,
        Command::Logout => handlers::auth::logout(&ctx).await,
        Command::Whoami => handlers::auth::whoami(&ctx).await,
        Command::Inbox { command } => match command {
            InboxCommand::List(list) => handlers::inbox::list(&ctx, &list.into()).await,
            InboxCommand::Show { phone } => handlers::inbox::show(&ctx, &phone).await,
            InboxCommand::Send { phone, message } => {
                handlers::inbox::send(&ctx, &phone, &message).await
            }
            InboxCommand::Attend { phone } => handlers::inbox::attend(&ctx, &phone).await,
            InboxCommand::Contact { phone } => handlers::inbox::contact(&ctx, &phone).await,
            InboxCommand::Watch { list, phone } => {
                handlers::inbox::watch(&ctx, &list.into(), phone.as_deref()).await
            }
        },
        Command::Carts { command } => match command {
            CartsCommand::List => handlers::carts::list(&ctx).await,
            CartsCommand::Recover { cart_id, dry_run } => {
                handlers::carts::recover(&ctx, cart_id, dry_run).await
            }
            CartsCommand::RecoverAll { dry_run, min_hours } => {
                handlers::carts::recover_all(&ctx, dry_run, min_hours).await
            }
            CartsCommand::Logs => handlers::carts::logs(&ctx).await,
            CartsCommand::Responses => handlers::carts::responses(&ctx).await,
            CartsCommand::Stats => handlers::carts::stats(&ctx).await,
        },
        Command::Order { number } => handlers::orders::order(&ctx, &number).await,
        Command::Track { number } => handlers::orders::track(&ctx, &number).await,
        Command::Metrics { watch } => handlers::metrics::metrics(&ctx, watch).await,
        Command::Health => handlers::metrics::health(&ctx).await,
        Command::Comments => handlers::comments::list(&ctx).await,
        Command::Improve { command } => match command {
            ImproveCommand::Stats => handlers::improvement::stats(&ctx).await,
            ImproveCommand::Suggestions => handlers::improvement::suggestions(&ctx).await,
            ImproveCommand::Mutations => handlers::improvement::mutations(&ctx).await,
            ImproveCommand::Analyze => handlers::improvement::analyze(&ctx).await,
            ImproveCommand::Approve { mutation_id } => {
                handlers::improvement::act_on_mutation(&ctx, mutation_id, MutationAction::Approve).await
            }
            ImproveCommand::Reject { mutation_id } => {
                handlers::improvement::act_on_mutation(&ctx, mutation_id, MutationAction::Reject).await
            }
            ImproveCommand::Deactivate { mutation_id } => {
                handlers::improvement::act_on_mutation(&ctx, mutation_id, MutationAction::Deactivate)
                    .await
            }
        },
        Command::Simulate { command } => match command {
            SimulateCommand::Scenarios => handlers::simulation::scenarios(&ctx).await,
            SimulateCommand::Run {
                scenario,
                phone,
                follow,
            } => handlers::simulation::run(&ctx, &scenario, phone, follow).await,
            SimulateCommand::Status { session_id } => {
                handlers::simulation::status(&ctx, &session_id).await
            }
        },
        Command::Settings => handlers::settings::show(&ctx),
    }
}
