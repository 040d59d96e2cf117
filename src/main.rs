//! Binary entry point
//!
//! Loads configuration, wires the transport, fetch adapter, orchestrator,
//! and scheduled dispatcher together, then polls for updates until a
//! shutdown signal arrives. Exits non-zero only for configuration failures.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tgmedia_dl::dispatcher::ScheduledDispatcher;
use tgmedia_dl::fetch::YtDlpAdapter;
use tgmedia_dl::transport::TelegramTransport;
use tgmedia_dl::{Config, Error, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match Config::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> tgmedia_dl::Result<()> {
    config.bootstrap_dirs().await?;
    let engine = locate_engine(&config)?;
    tracing::info!(engine = %engine.display(), "extraction engine located");

    let config = Arc::new(config);
    let transport = Arc::new(TelegramTransport::new(&config.telegram, &config.proxy)?);
    let adapter = Arc::new(YtDlpAdapter::new(
        engine,
        config.directories.link_working_dir(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        config.clone(),
        transport.clone(),
        adapter,
    ));

    let dispatcher_cancel = CancellationToken::new();
    let dispatcher = ScheduledDispatcher::new(transport.clone(), &config.schedule);
    let dispatcher_task = tokio::spawn(dispatcher.run(dispatcher_cancel.clone()));

    let poll_task = tokio::spawn(poll_loop(transport, orchestrator.clone()));

    tracing::info!("running, press Ctrl-C to stop");
    tgmedia_dl::wait_for_shutdown_signal().await;

    poll_task.abort();
    dispatcher_cancel.cancel();
    orchestrator.shutdown(SHUTDOWN_TIMEOUT).await;
    dispatcher_task.await.ok();
    tracing::info!("shutdown complete");
    Ok(())
}

fn locate_engine(config: &Config) -> tgmedia_dl::Result<PathBuf> {
    match &config.fetch.ytdlp_path {
        Some(path) => Ok(path.clone()),
        None => which::which("yt-dlp").map_err(|e| Error::Config {
            message: format!("yt-dlp not found on PATH: {e}"),
            key: Some("fetch.ytdlp_path".into()),
        }),
    }
}

async fn poll_loop(transport: Arc<TelegramTransport>, orchestrator: Arc<Orchestrator>) {
    let mut offset: i64 = 0;
    loop {
        let messages = match transport.poll_updates(offset).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "update poll failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for (update_id, message) in messages {
            offset = offset.max(update_id + 1);
            match orchestrator.handle_message(message).await {
                Ok(_) => {}
                Err(Error::ShuttingDown) => return,
                Err(e) => tracing::warn!(error = %e, "failed to handle message"),
            }
        }
    }
}
