// Entrypoint for the `nbcmd` CLI.
// - Parses arguments, sets up logging on stderr and builds the client.
// - The signing key is resolved once and handed to every call explicitly.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use nbcmd::{api::CallOptions, auth::Signer, ui, NostrBuildClient};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "nbcmd", version, about = "A cli application for nostr.build")]
struct Cli {
    /// Send requests without an auth event
    #[arg(long, global = true)]
    anonymous: bool,

    /// Secret key (nsec1... or hex) used to sign requests
    #[arg(long, global = true, env = "NBCMD_NSEC", hide_env_values = true)]
    nsec: Option<String>,

    /// Abort a request after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload image files
    Upload {
        /// Print the full JSON response
        #[arg(short, long)]
        verbose: bool,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete image files
    Delete {
        /// Print the full JSON response
        #[arg(short, long)]
        verbose: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[arg(required = true)]
        urls: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let api = NostrBuildClient::from_env()?;
    let keys = ui::resolve_signer(cli.anonymous, cli.nsec.as_deref())?;
    let signer = keys.as_ref().map(|k| k as &dyn Signer);
    let options = CallOptions {
        timeout: cli.timeout.map(Duration::from_secs),
    };

    match cli.command {
        Command::Upload { verbose, files } => ui::upload_files(&api, signer, &options, &files, verbose),
        Command::Delete { verbose, yes, urls } => {
            ui::delete_urls(&api, signer, &options, &urls, verbose, yes)
        }
    }
}

// `NBCMD_LOG` takes an env-filter directive, e.g. `nbcmd=debug`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("NBCMD_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
