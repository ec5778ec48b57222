/*!
 * Disposition Guard
 *
 * Owns the process-wide signal table for the intercepted signals while a
 * monitor is armed.
 */

use super::disposition::SavedDispositions;
use super::handler::SignalBridge;
use super::TerminationSignal;
use crate::core::guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
use crate::errors::MonitorResult;
use flume::Receiver;
use tracing::{debug, error, info};

/// Installed handlers plus the prior dispositions they replaced
///
/// # Example
///
/// ```ignore
/// let mut guard = DispositionGuard::install()?;
/// // SIGINT/SIGTERM now arrive on guard.signals()
/// guard.release()?; // prior dispositions are back
/// ```
pub struct DispositionGuard {
    saved: Option<SavedDispositions>,
    bridge: SignalBridge,
    metadata: GuardMetadata,
}

impl DispositionGuard {
    /// Open the bridge and install handlers for every intercepted signal
    pub fn install() -> MonitorResult<Self> {
        let bridge = SignalBridge::open()?;
        let saved = SavedDispositions::install(SignalBridge::handler())?;

        info!(
            signals = ?saved.signals().map(|s| s.name()).collect::<Vec<_>>(),
            "Termination signal handlers installed"
        );

        Ok(Self {
            saved: Some(saved),
            bridge,
            metadata: GuardMetadata::new("signal_dispositions"),
        })
    }

    /// Signals caught while installed
    pub fn signals(&self) -> &Receiver<TerminationSignal> {
        self.bridge.receiver()
    }

    /// The first signal caught while installed, if any
    pub fn first_signal(&self) -> Option<TerminationSignal> {
        self.bridge.first_signal()
    }
}

impl Guard for DispositionGuard {
    fn resource_type(&self) -> &'static str {
        "signal_dispositions"
    }

    fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    fn release(&mut self) -> GuardResult<()> {
        let saved = self.saved.take().ok_or(GuardError::AlreadyReleased)?;

        // Restore first: a second signal from here on gets the prior action
        let restored = saved.restore();
        self.bridge.shutdown();

        debug!(
            lifetime_micros = self.metadata.lifetime_micros(),
            "Signal dispositions restored"
        );
        restored.map_err(|e| GuardError::OperationFailed(e.to_string()))
    }
}

impl GuardDrop for DispositionGuard {
    fn on_drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.release() {
                error!(error = %e, "Signal disposition guard drop failed");
            }
        }
    }
}

impl Drop for DispositionGuard {
    fn drop(&mut self) {
        self.on_drop();
    }
}
