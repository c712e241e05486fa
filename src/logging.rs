//! Log output routing for the proctoring agent.
//!
//! The agent runs unattended next to a quiz session, so nothing is written
//! to the terminal: on Linux everything goes to systemd's journal, and when
//! journald is missing (or on other platforms) to a daily rolling file.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Journald is tried first on Linux; if it is not reachable, a daily file
/// under `log_dir` (or the local data directory when `None`) takes over.
/// Verbosity is read from `INVIGIL_LOG` (any `tracing` filter directive,
/// e.g. `debug` or `invigil=debug`) and defaults to `info`.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("INVIGIL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invigil")
            .join("logs")
    });

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "invigil.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // The worker guard must outlive the subscriber; park it in a static.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(_guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!("Logging initialized with file backend at {:?}", log_dir);
    Ok(())
}
