//! Job service (decomposed into focused submodules)
//!
//! [`SbomService`] ties the pieces together: the job store, the downloader,
//! the converter and the task dispatcher.
//!
//! ## Submodules
//!
//! - [`intake`]: job creation, scheduling and queries
//! - [`orchestrator`]: the per-job download → detect → convert run
//! - [`status`]: status reconciliation against the dispatcher
//! - [`lifecycle`]: shutdown and statistics

mod intake;
mod lifecycle;
mod orchestrator;
mod status;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::converter::{self, SbomConverter};
use crate::db::Database;
use crate::dispatch::{LocalDispatcher, TaskDispatcher};
use crate::download::HttpDownloader;
use crate::error::Result;
use crate::types::{Capabilities, Event, SbomFormat};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio_util::sync::CancellationToken;

/// Buffered events per subscriber before it starts lagging
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// URL-to-SBOM conversion service
///
/// Cloning is cheap: every clone shares the same database pool, event
/// channel and dispatcher.
#[derive(Clone)]
pub struct SbomService {
    /// Job store
    pub(crate) db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Artifact downloader
    pub(crate) downloader: HttpDownloader,
    /// External SBOM engine
    pub(crate) converter: Arc<dyn SbomConverter>,
    /// Task-dispatch system the jobs are scheduled on
    pub(crate) dispatcher: Arc<dyn TaskDispatcher>,
    /// Set when the dispatcher is the in-process one owned by this service
    pub(crate) local_dispatcher: Option<LocalDispatcher>,
    /// Cleared once shutdown starts
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops background loops (status sweep)
    pub(crate) shutdown_token: CancellationToken,
}

impl SbomService {
    /// Create a service from configuration
    ///
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Locates the converter binary (explicit path, then PATH)
    /// - Starts the in-process dispatcher's worker loop
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the database cannot
    /// be opened or the HTTP client cannot be built.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let converter = converter::converter_from_config(&config.converter);
        let local = LocalDispatcher::new(&config.dispatch);

        let service = Self::assemble(
            config,
            db,
            converter,
            Arc::new(local.clone()),
            Some(local.clone()),
        )?;

        local.start(Arc::new(service.clone())).await?;

        tracing::info!(
            dispatcher = service.dispatcher.name(),
            max_concurrent_jobs = service.config.dispatch.max_concurrent_jobs,
            "SBOM service started"
        );

        Ok(service)
    }

    /// Create a service from pre-built components
    ///
    /// Nothing is started: jobs only run when the supplied dispatcher hands
    /// them to [`run`](Self::run) (or when callers invoke it directly).
    pub fn with_components(
        config: Config,
        db: Database,
        converter: Arc<dyn SbomConverter>,
        dispatcher: Arc<dyn TaskDispatcher>,
    ) -> Result<Self> {
        Self::assemble(config, db, converter, dispatcher, None)
    }

    fn assemble(
        config: Config,
        db: Database,
        converter: Arc<dyn SbomConverter>,
        dispatcher: Arc<dyn TaskDispatcher>,
        local_dispatcher: Option<LocalDispatcher>,
    ) -> Result<Self> {
        let downloader = HttpDownloader::new(&config.download)?;

        // Create broadcast channel; events are dropped when nobody listens
        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            db: Arc::new(db),
            event_tx,
            config: Arc::new(config),
            downloader,
            converter,
            dispatcher,
            local_dispatcher,
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Subscribe to job lifecycle events
    ///
    /// Each subscriber receives all events independently. A subscriber that
    /// falls more than 1000 events behind receives `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Output format identifiers that may be requested, in a fixed order
    pub fn sbom_formats(&self) -> Vec<&'static str> {
        converter::sbom_formats()
    }

    /// Version of the external SBOM engine
    ///
    /// The first successful answer is cached by the converter for its lifetime.
    pub async fn converter_version(&self) -> Result<String> {
        self.converter.version().await
    }

    /// Query what the configured converter can do
    pub fn capabilities(&self) -> Capabilities {
        let caps = self.converter.capabilities();
        Capabilities {
            converter: self.converter.name().to_string(),
            can_convert: caps.can_convert,
            converts_archives: caps.can_convert
                && self.config.converter.archive_policy == crate::config::ArchivePolicy::Convert,
            formats: SbomFormat::ALL.to_vec(),
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
