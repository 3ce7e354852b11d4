#![forbid(unsafe_code)]

mod app;
mod cmd;
mod output;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use lostfound_core::config::{self, Config};
use output::OutputMode;
use std::env;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "lf: lost-and-found catalog that keeps working offline",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Item service base URL (overrides config and LOSTFOUND_API_URL).
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Directory for local state (overrides config and LOSTFOUND_STATE_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Flags are the highest configuration layer.
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.remote.base_url.clone_from(url);
        }
        if let Some(dir) = &self.state_dir {
            config.store.dir = Some(dir.clone());
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List items",
        long_about = "List pending local items followed by the remote catalog. Falls back to the sample dataset when the service is unreachable.",
        after_help = "EXAMPLES:\n    # Everything\n    lf list\n\n    # Lost electronics mentioning 'phone'\n    lf list --search phone --category electronic --status lost\n\n    # Emit machine-readable output\n    lf list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one item",
        long_about = "Show full details for a single item of the reconciled view.",
        after_help = "EXAMPLES:\n    # Show an item\n    lf show 64f1c2\n\n    # Emit machine-readable output\n    lf show 64f1c2 --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Report",
        about = "Report a lost or found item",
        long_about = "Report an item. When the service is unreachable the report is kept on this device until `lf retry-pending` sends it.",
        after_help = "EXAMPLES:\n    # Report a lost phone\n    lf create --title \"Black phone\" --category electronic --status lost --location \"Library\"\n\n    # Emit machine-readable output\n    lf create --title \"Keys\" --json"
    )]
    Create(cmd::create::CreateArgs),

    #[command(
        next_help_heading = "Report",
        about = "Claim an item",
        long_about = "Mark an item as claimed. The claim shows immediately, even while offline; an offline claim is kept on this device until `lf retry-pending` sends it.",
        after_help = "EXAMPLES:\n    # Claim an item\n    lf claim 64f1c2"
    )]
    Claim(cmd::claim::ClaimArgs),

    #[command(
        next_help_heading = "Report",
        about = "Edit or moderate an item",
        long_about = "Change fields of an item, or approve/reject it. Requires the service unless the item is still pending locally.",
        after_help = "EXAMPLES:\n    # Fix the location\n    lf update 64f1c2 --location \"Main hall\"\n\n    # Approve a report\n    lf update 64f1c2 --approve"
    )]
    Update(cmd::update::UpdateArgs),

    #[command(
        next_help_heading = "Report",
        about = "Delete an item",
        long_about = "Delete an item. Requires the service unless the item is still pending locally.",
        after_help = "EXAMPLES:\n    # Delete an item\n    lf delete 64f1c2"
    )]
    Delete(cmd::delete::DeleteArgs),

    #[command(
        next_help_heading = "Offline",
        about = "List items saved on this device",
        long_about = "List reports that were saved locally because the service was unreachable.",
        after_help = "EXAMPLES:\n    # What is waiting to be sent\n    lf pending\n\n    # Emit machine-readable output\n    lf pending --json"
    )]
    Pending,

    #[command(
        next_help_heading = "Offline",
        about = "Send locally saved items and claims",
        long_about = "Try to create every locally saved report on the service, then send every claim saved while offline. Sent reports and claims leave the device.",
        after_help = "EXAMPLES:\n    # Send pending reports\n    lf retry-pending"
    )]
    RetryPending,

    #[command(
        next_help_heading = "Session",
        about = "Store a session",
        long_about = "Store the signed-in user. The role claim is normalized before it is saved.",
        after_help = "EXAMPLES:\n    # Sign in\n    lf login --id u1 --name \"Ada\" --email ada@campus.edu --role user"
    )]
    Login(cmd::login::LoginArgs),

    #[command(
        next_help_heading = "Session",
        about = "Show the stored session",
        long_about = "Restore the stored session, repairing its role, and print it.",
        after_help = "EXAMPLES:\n    # Who am I?\n    lf whoami --json"
    )]
    Whoami,

    #[command(
        next_help_heading = "Session",
        about = "Forget the stored session"
    )]
    Logout,

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    lf completions bash\n\n    # Generate zsh completions\n    lf completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("LOSTFOUND_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "lostfound=debug,info"
        } else {
            "lostfound=info,warn"
        })
    });

    let format = env::var("LOSTFOUND_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return cmd::completions::run_completions(args.shell, &mut Cli::command());
    }

    let project_root = env::current_dir()?;
    let mut config = config::resolve_config(&project_root)?;
    cli.apply_overrides(&mut config);
    let output = output::resolve_output_mode(cli.format, cli.json, config.output.as_deref());
    debug!(?output, "config resolved");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let app = app::App::open(config)?;
        match cli.command {
            Commands::List(args) => cmd::list::run_list(&args, output, &app).await,
            Commands::Show(args) => cmd::show::run_show(&args, output, &app).await,
            Commands::Create(args) => cmd::create::run_create(args, output, &app).await,
            Commands::Claim(args) => cmd::claim::run_claim(&args, output, &app).await,
            Commands::Update(args) => cmd::update::run_update(&args, output, &app).await,
            Commands::Delete(args) => cmd::delete::run_delete(&args, output, &app).await,
            Commands::Pending => cmd::pending::run_pending(output, &app),
            Commands::RetryPending => cmd::pending::run_retry_pending(output, &app).await,
            Commands::Login(args) => cmd::login::run_login(args, output, &app),
            Commands::Whoami => cmd::login::run_whoami(output, &app),
            Commands::Logout => cmd::login::run_logout(output, &app),
            Commands::Completions(_) => Ok(()),
        }
    })
}
