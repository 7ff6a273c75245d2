//! Link Grabber — entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use link_grabber::Settings;
use link_grabber_cli::commands::{self, CollectArgs, ViewArgs};
use link_grabber_cli::config::resolve_settings_path;

#[derive(Parser)]
#[command(
    name = "link-grabber",
    about = "Collect every outbound link on a page, across frames, grouped and ranked",
    version
)]
struct Cli {
    /// Path to the settings file (blocked domains, extra noise rules).
    #[arg(short, long, global = true)]
    settings: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a page and its frames and list their links.
    Grab {
        /// Page URL.
        url: String,

        #[command(flatten)]
        collect: CollectArgs,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// List links from a saved HTML file, offline.
    Inspect {
        /// HTML file to read.
        file: PathBuf,

        /// URL the document was loaded from, used to resolve relative links.
        #[arg(long)]
        base_url: Option<String>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Manage the blocked-domain list.
    Blocked {
        #[command(subcommand)]
        action: BlockedAction,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   link-grabber completions bash > ~/.local/share/bash-completion/completions/link-grabber
    ///   link-grabber completions zsh > ~/.zfunc/_link-grabber
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BlockedAction {
    /// Print the blocked domains.
    List,
    /// Block a domain and all of its subdomains.
    Add { domain: String },
    /// Unblock a domain.
    Remove { domain: String },
    /// Restore the default list.
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = resolve_settings_path(cli.settings.as_deref());
    tracing::debug!("settings: {}", settings_path.display());

    let output = match cli.command {
        Commands::Grab { url, collect, view } => {
            let settings = Settings::load(&settings_path)?;
            commands::grab(&url, &settings, &collect, &view).await?
        }

        Commands::Inspect {
            file,
            base_url,
            view,
        } => {
            let settings = Settings::load(&settings_path)?;
            commands::inspect(&file, base_url.as_deref(), &settings, &view).await?
        }

        Commands::Blocked { action } => match action {
            BlockedAction::List => commands::blocked_list(&Settings::load(&settings_path)?),
            BlockedAction::Add { domain } => commands::blocked_add(&settings_path, &domain)?,
            BlockedAction::Remove { domain } => commands::blocked_remove(&settings_path, &domain)?,
            BlockedAction::Reset => commands::blocked_reset(&settings_path)?,
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "link-grabber", &mut std::io::stdout());
            return Ok(());
        }
    };

    print!("{output}");
    Ok(())
}
