use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storefront_pilot::error::exit_code_for;
use storefront_pilot::{AppError, AppStore, InstallOutcome, StoreConfig};

/// Drive the Mac App Store from the command line
#[derive(Parser)]
#[command(name = "storefront-pilot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a purchased app and wait for it to finish
    Install {
        name: String,
        /// Seconds to wait for the install (default: STOREFRONT_INSTALL_TIMEOUT_SECS)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Whether the signed-in account owns an app
    Purchased { name: String },
    /// Whether an app's page says it is installed
    Installed { name: String },
    /// Version shown on an app's page
    LatestVersion { name: String },
    /// Sign in, replacing any other account
    SignIn {
        #[arg(long, env = "STOREFRONT_USERNAME")]
        username: String,
        #[arg(long, env = "STOREFRONT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out if anyone is signed in
    SignOut,
    /// Whether anyone is signed in
    SignedIn,
    /// Apple ID of the signed-in account
    CurrentUser,
    /// Quit the App Store
    Quit,
    /// Whether the App Store is running
    Running,
    /// Print a JSON snapshot of the App Store state
    Status,
}

#[derive(Serialize)]
struct Status {
    bundle_id: String,
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    signed_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_page: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment before clap reads env-backed arguments
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let default_level = if cli.verbose {
        "storefront_pilot=debug"
    } else {
        "storefront_pilot=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let store = AppStore::from_platform(StoreConfig::from_env())?;

    match command {
        Commands::Install { name, timeout } => {
            let timeout = timeout
                .map(Duration::from_secs)
                .unwrap_or(store.config().install_timeout);
            match store.install(&name, timeout).await? {
                InstallOutcome::AlreadyInstalled => println!("{} is already installed", name),
                InstallOutcome::Installed => println!("{} installed", name),
            }
        }
        Commands::Purchased { name } => println!("{}", store.purchased(&name).await?),
        Commands::Installed { name } => println!("{}", store.app_installed(&name).await?),
        Commands::LatestVersion { name } => println!("{}", store.latest_version(&name).await?),
        Commands::SignIn { username, password } => {
            store.sign_in(&username, &password).await?;
            println!("Signed in");
        }
        Commands::SignOut => store.sign_out().await?,
        Commands::SignedIn => println!("{}", store.signed_in().await?),
        Commands::CurrentUser => match store.current_user().await? {
            Some(user) => println!("{}", user),
            None => println!("Not signed in"),
        },
        Commands::Quit => store.quit().await?,
        Commands::Running => println!("{}", store.running().await?),
        Commands::Status => {
            let status = status(&store).await?;
            let json =
                serde_json::to_string_pretty(&status).context("Failed to serialize status")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Never launches the storefront; UI fields are only filled when it is up
async fn status(store: &AppStore) -> Result<Status, AppError> {
    let running = store.running().await?;
    let mut status = Status {
        bundle_id: store.config().bundle_id.clone(),
        running,
        signed_in: None,
        current_user: None,
        current_page: None,
    };
    if running {
        status.signed_in = Some(store.signed_in().await?);
        status.current_user = store.current_user().await?;
        status.current_page = store.current_page().await?;
    }
    Ok(status)
}
