/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use crate::signals::TerminationSignal;
use miette::Diagnostic;
use thiserror::Error;

/// Result type for monitor setup and lifecycle operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors raised while configuring or arming a monitor.
///
/// None of these describe the guarded block itself: block failures are
/// carried by [`crate::monitor::MonitorExit`] and delivery failures never
/// leave the notifier.
#[derive(Error, Debug, Diagnostic)]
pub enum MonitorError {
    #[error("Invalid configuration for {key}: {reason}")]
    #[diagnostic(
        code(config::invalid),
        help("Check the explicit argument or the matching TERMINATION_MONITOR_* environment variable.")
    )]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Failed to install handler for {signal}: {source}")]
    #[diagnostic(
        code(signals::install_failed),
        help("The process may not be allowed to change this signal's disposition.")
    )]
    SignalInstall {
        signal: TerminationSignal,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to restore disposition for {signal}: {source}")]
    #[diagnostic(code(signals::restore_failed))]
    SignalRestore {
        signal: TerminationSignal,
        #[source]
        source: nix::Error,
    },

    #[error("Failed to set up signal wake-up channel: {0}")]
    #[diagnostic(code(signals::wake_channel))]
    WakeChannel(#[source] std::io::Error),

    #[error("A termination monitor is already armed in this process")]
    #[diagnostic(
        code(monitor::already_armed),
        help("Signal dispositions are process-wide; release the active guard before arming another.")
    )]
    AlreadyArmed,

    #[error("Failed to spawn monitored block thread: {0}")]
    #[diagnostic(code(monitor::spawn_failed))]
    Spawn(#[source] std::io::Error),

    #[error("Monitored block thread exited without reporting a result")]
    #[diagnostic(code(monitor::worker_lost))]
    WorkerLost,
}

impl MonitorError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        MonitorError::InvalidConfig {
            key,
            reason: reason.into(),
        }
    }
}
