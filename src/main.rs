use clap::Parser;
use handsoff::app::ConsoleController;
use handsoff::{AppError, Session, Settings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Watches the camera and alerts when a hand touches the face.
#[derive(Parser)]
#[command(name = "handsoff", version, about)]
struct Cli {
    /// TOML settings file, layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Image file kept up to date by an external frame grabber
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(snapshot) = cli.snapshot {
        settings.camera.snapshot_path = snapshot;
    }

    let session = Arc::new(Session::builder(settings).build()?);
    if let Err(e) = session.init().await {
        error!("Setup failed: {}", e);
        return Err(e);
    }

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    ConsoleController::new(session).run(stdin, shutdown).await
}
