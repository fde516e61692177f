//! # sbom-convert
//!
//! Turns software artifacts published at a URL into Software Bill of
//! Materials documents.
//!
//! A job is created for a URL, handed to a task-dispatch system and, when a
//! worker picks it up, the artifact is downloaded into a private scratch
//! directory, inspected and passed to an external SBOM engine. The outcome
//! (document or error descriptor, plus the artifact's SHA-256) is written to
//! the job record exactly once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sbom_convert::{Config, JobOptions, SbomService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = SbomService::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let (id, task) = service
//!         .submit("https://example.com/app.cdx.json", JobOptions::default())
//!         .await?;
//!     println!("job {} scheduled as {}", id, task);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// External SBOM engine adapters
pub mod converter;
/// Database persistence layer
pub mod db;
/// Artifact type detection
pub mod detect;
/// Task dispatch
pub mod dispatch;
/// Artifact downloads
pub mod download;
/// Error types
pub mod error;
/// Job service (intake, per-job run, status reconciliation)
pub mod service;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{ArchivePolicy, Config};
pub use converter::{CliConverter, SbomConverter, UnavailableConverter};
pub use db::Database;
pub use dispatch::{JobPerformer, LocalDispatcher, TaskDispatcher};
pub use error::{ConversionError, DatabaseError, DownloadError, Error, ErrorDescriptor, Result};
pub use service::SbomService;
pub use types::{
    Capabilities, Event, JobId, JobInfo, JobOptions, JobStats, SbomFormat, Status, TaskHandle,
};

/// Helper function to run the service with graceful signal handling.
///
/// Starts the periodic status sweep, waits for a termination signal and then
/// calls the service's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use sbom_convert::{Config, SbomService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = SbomService::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(service).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: SbomService) -> Result<()> {
    let reconciler = service.start_reconciler();
    wait_for_signal().await;
    service.shutdown().await?;
    reconciler.await.ok();
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
