use crate::config::types::Config;
use crate::config::{load_config, ConfigError};
use crate::extract::{EntitySource, ExtractError, LlmExtractor};
use crate::pipeline::{ArchiveJob, JobSettings, Trigger};
use crate::publish::{LogOnlyPublisher, NeynarPublisher, PublishError, Publisher};
use crate::source::{HubClient, HubError};
use crate::storage::{DuckDbStore, RecordStore, StorageError};
use crate::web::{run_server, AppState};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// How long a run in progress may take to finish after Ctrl+C
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Pending on-demand runs; further triggers are refused while one is queued
const TRIGGER_QUEUE: usize = 1;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("hub client error: {0}")]
    Hub(#[from] HubError),

    #[error("extractor error: {0}")]
    Extract(#[from] ExtractError),

    #[error("publisher error: {0}")]
    Publish(#[from] PublishError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("web server error: {0}")]
    WebServer(String),
}

/// Unwrap the resolved config path or explain where it was looked for
pub fn require_config_path(config_path: Option<PathBuf>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    config_path.ok_or_else(|| {
        "config not found\n\
         Searched locations:\n  \
         ~/.config/wen/config.yml\n  \
         /etc/wen/config.yml\n\n\
         Use --config <path> to specify a config file, or run 'wen config init' to generate one."
            .into()
    })
}

pub async fn open_store(config: &Config) -> Result<Arc<DuckDbStore>, RunError> {
    info!(path = %config.storage.path.display(), "Initializing storage");
    let store = Arc::new(DuckDbStore::new(&config.storage.path)?);
    store.init_schema().await?;
    Ok(store)
}

/// Wire the production collaborators for an archive job
pub fn build_job(config: &Config, store: Arc<dyn RecordStore>) -> Result<ArchiveJob, RunError> {
    let source = Arc::new(HubClient::new(&config.hub)?);

    let mut entities = EntitySource::new(config.extractor.min_fallback_chars);
    if let Some(llm) = &config.extractor.llm {
        info!(model = %llm.model, "LLM fallback extraction enabled");
        entities = entities.with_fallback(Arc::new(LlmExtractor::new(llm)?));
    }

    let publisher: Arc<dyn Publisher> = match &config.posting.publisher {
        Some(publisher) => Arc::new(NeynarPublisher::new(publisher)?),
        None => {
            warn!("No publisher configured, summaries will only be logged");
            Arc::new(LogOnlyPublisher)
        }
    };

    Ok(ArchiveJob::new(
        store,
        source,
        entities,
        publisher,
        JobSettings::from_config(config),
    ))
}

/// `wen run`: scheduler loop with the optional web API until Ctrl+C
pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path)?;
    run_service(&config_path).await.map_err(|e| e.into())
}

/// `wen once [--post]`: a single run, printing its status line
pub async fn once(config_path: Option<PathBuf>, post: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path)?;
    let config = load_config(&config_path)?;
    let store = open_store(&config).await?;
    let job = build_job(&config, store)?;

    let outcome = job.run(post).await;
    println!("{}", outcome);
    Ok(())
}

async fn run_service(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let store = open_store(&config).await?;
    let job = Arc::new(build_job(&config, store.clone())?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE);

    let web_handle = match &config.web {
        Some(web) => {
            let listen: SocketAddr = web
                .listen
                .parse()
                .map_err(|e| RunError::WebServer(format!("invalid listen address: {}", e)))?;
            let state = AppState::new(
                store.clone(),
                Some(trigger_tx.clone()),
                web.admin_token.clone(),
                config.analysis.window_hours,
                config.posting.min_patterns(),
            );
            let web_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                run_server(listen, state, web_shutdown)
                    .await
                    .map_err(|e| RunError::WebServer(e.to_string()))
            }))
        }
        None => {
            info!("No web section configured, HTTP API disabled");
            None
        }
    };
    // Only the web API holds senders
    drop(trigger_tx);

    info!(
        interval = ?config.schedule.interval,
        mode = ?config.posting.mode,
        "Scheduler started, press Ctrl+C to shutdown"
    );
    let mut scheduler_handle = tokio::spawn(run_scheduler(
        job,
        config.schedule.interval,
        trigger_rx,
        shutdown_rx,
    ));

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        result = &mut scheduler_handle => {
            let runs = result?;
            warn!(runs, "Scheduler stopped unexpectedly");
        }
    }
    let _ = shutdown_tx.send(true);

    if !scheduler_handle.is_finished() {
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut scheduler_handle).await {
            Ok(result) => {
                result?;
            }
            Err(_) => {
                warn!("Run still in progress after grace period, aborting");
                scheduler_handle.abort();
            }
        }
    }

    if let Some(handle) = web_handle {
        match handle.await {
            Ok(Ok(())) => info!("Web server stopped"),
            Ok(Err(e)) => error!(error = %e, "Web server error"),
            Err(e) => error!(error = %e, "Web server join error"),
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Run the job on every tick of `every` (the first tick fires immediately)
/// and on every trigger, one run at a time, until `shutdown_rx` changes.
/// Returns the number of completed runs.
pub async fn run_scheduler(
    job: Arc<ArchiveJob>,
    every: Duration,
    mut triggers: mpsc::Receiver<Trigger>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> usize {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut runs = 0;

    loop {
        let force = tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => false,
            Some(trigger) = triggers.recv() => {
                info!(?trigger, "Triggered run");
                trigger.force()
            }
        };

        job.run(force).await;
        runs += 1;
    }

    info!(runs, "Scheduler stopped");
    runs
}
