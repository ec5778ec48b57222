/*!
 * Signals Module
 * Interception of external termination requests
 */

mod disposition;
mod guard;
mod handler;
pub mod types;

use tracing::{error, info};

// Re-export public API
pub use disposition::{current_disposition, DispositionSnapshot, SavedDispositions, SignalDisposition};
pub use guard::DispositionGuard;
pub use handler::SignalBridge;
pub use types::TerminationSignal;

/// Send `signal` to the current thread again.
///
/// Call only after the prior disposition is back in place: with the
/// default action this does not return.
pub fn redeliver(signal: TerminationSignal) {
    info!(signal = %signal, "Re-delivering termination signal");
    if let Err(e) = nix::sys::signal::raise(signal.as_nix()) {
        error!(signal = %signal, error = %e, "Failed to re-deliver termination signal");
    }
}
