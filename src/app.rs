use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::artwork::{PosterProvider, PosterSelector};
use crate::config::{ArtProvider, Config, RunMode};
use crate::fanart::FanartClient;
use crate::locale::LocalePolicy;
use crate::plex::{MediaServer, PlexClient};
use crate::processor::EntryProcessor;
use crate::report::RunReport;
use crate::resolve::IdentifierResolver;
use crate::scanner::CatalogScanner;
use crate::schedule::next_run_after;
use crate::tmdb::{MetadataApi, TmdbClient};

const SCHEDULE_POLL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct App {
    pub scanner: CatalogScanner,
    pub processor: EntryProcessor,
    pub completion_label: String,
}

impl App {
    pub fn from_config(config: &Config, media: Arc<dyn MediaServer>) -> Result<Self> {
        let tmdb = config
            .tmdb_api_key
            .as_deref()
            .map(TmdbClient::new)
            .transpose()?
            .map(Arc::new);
        let metadata: Option<Arc<dyn MetadataApi>> =
            tmdb.clone().map(|c| c as Arc<dyn MetadataApi>);

        let provider: Option<Arc<dyn PosterProvider>> = match config.provider {
            ArtProvider::Tmdb => tmdb.map(|c| c as Arc<dyn PosterProvider>),
            ArtProvider::Fanart => config
                .fanart_api_key
                .as_deref()
                .map(FanartClient::new)
                .transpose()?
                .map(|c| Arc::new(c) as Arc<dyn PosterProvider>),
        };

        let processor = EntryProcessor {
            media: media.clone(),
            resolver: IdentifierResolver::new(metadata.clone()),
            metadata,
            locale: LocalePolicy::new(
                config.original_language_countries.clone(),
                config.default_language.clone(),
            ),
            selector: PosterSelector::new(provider, config.fallback_language.clone()),
            completion_label: config.completion_label.clone(),
            legacy_label: config.legacy_label.clone(),
            artwork_enabled: config.artwork_enabled,
        };
        let scanner = CatalogScanner {
            media,
            excluded: config.excluded_labels(),
            entry_delay: config.entry_delay,
        };

        Ok(Self {
            scanner,
            processor,
            completion_label: config.completion_label.clone(),
        })
    }

    /// One full pass over the catalog. Never fails; errors end up in the log.
    pub async fn run_once(&self) -> RunReport {
        let report = match self.scanner.run(&self.processor).await {
            Ok(report) => report,
            Err(e) => {
                error!("Could not retrieve movies: {:#}", e);
                RunReport::default()
            }
        };
        report.log_summary(&self.completion_label);
        report
    }
}

pub async fn run(config: Config) -> Result<()> {
    match &config.run_mode {
        RunMode::Once => info!("Mode: RUN (execute once and exit)"),
        RunMode::Daily { at, .. } => {
            info!("Mode: TIME (run daily at {})", at.format("%H:%M"));
            info!("Current time: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        }
    }

    let plex = PlexClient::new(&config.plex_url, &config.plex_token)?;
    let name = plex
        .friendly_name()
        .await
        .context("Could not connect to Plex server")?;
    info!("Connected to Plex server: {}", name);
    config.log_summary();

    let app = App::from_config(&config, Arc::new(plex))?;
    match config.run_mode {
        RunMode::Once => {
            app.run_once().await;
            Ok(())
        }
        RunMode::Daily { at, run_on_startup } => run_daily(&app, at, run_on_startup).await,
    }
}

/// Wait for `at` every day and run; returns once the user stops the process.
pub async fn run_daily(app: &App, at: NaiveTime, run_on_startup: bool) -> Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    info!("Scheduled to run daily at {}", at.format("%H:%M"));

    if run_on_startup {
        info!("Running initial scan...");
        tokio::select! {
            _ = run_scheduled(app, at) => {}
            _ = &mut shutdown => {
                info!("Scheduler stopped by user");
                return Ok(());
            }
        }
    }

    loop {
        let next = next_run_after(Local::now().naive_local(), at);
        info!("Next run at {}", next.format("%Y-%m-%d %H:%M"));
        loop {
            let now = Local::now().naive_local();
            if now >= next {
                break;
            }
            let wait = (next - now).to_std().unwrap_or(SCHEDULE_POLL).min(SCHEDULE_POLL);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Scheduler stopped by user");
                    return Ok(());
                }
            }
        }
        tokio::select! {
            _ = run_scheduled(app, at) => {}
            _ = &mut shutdown => {
                info!("Scheduler stopped by user");
                return Ok(());
            }
        }
    }
}

async fn run_scheduled(app: &App, at: NaiveTime) {
    info!("{}", "=".repeat(60));
    info!(
        "Scheduled run started at: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    app.run_once().await;
    info!(
        "Scheduled run completed. Next run tomorrow at {}",
        at.format("%H:%M")
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
