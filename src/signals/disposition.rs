/*!
 * Signal Dispositions
 *
 * Save, install and restore the process-wide action for each intercepted
 * signal. The saved actions are an owned value: whoever holds
 * `SavedDispositions` is responsible for handing the table back.
 */

use super::TerminationSignal;
use crate::errors::{MonitorError, MonitorResult};
use nix::libc;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};
use std::mem::MaybeUninit;
use std::ptr;

/// What currently happens when a signal arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Default action for the signal
    Default,
    /// Ignore the signal
    Ignore,
    /// Call a handler function
    Handle,
}

/// Read-only view of the installed action for one signal.
///
/// Two snapshots compare equal when handler address, flags and blocked mask
/// all match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispositionSnapshot {
    pub disposition: SignalDisposition,
    handler: usize,
    flags: i64,
    mask: u64,
}

impl DispositionSnapshot {
    fn from_raw(raw: &libc::sigaction) -> Self {
        let handler = raw.sa_sigaction;
        let disposition = if handler == libc::SIG_DFL {
            SignalDisposition::Default
        } else if handler == libc::SIG_IGN {
            SignalDisposition::Ignore
        } else {
            SignalDisposition::Handle
        };

        let mut mask = 0u64;
        for signum in 1..64 {
            // SAFETY: sa_mask was initialised by sigaction(2)
            if unsafe { libc::sigismember(&raw.sa_mask, signum) } == 1 {
                mask |= 1 << signum;
            }
        }

        Self {
            disposition,
            handler: handler as usize,
            flags: raw.sa_flags as i64,
            mask,
        }
    }
}

/// Read the installed disposition without modifying it
pub fn current_disposition(signal: TerminationSignal) -> MonitorResult<DispositionSnapshot> {
    let mut raw = MaybeUninit::<libc::sigaction>::zeroed();
    // SAFETY: a null new action only queries; `raw` is valid for writes
    let rc = unsafe { libc::sigaction(signal.number(), ptr::null(), raw.as_mut_ptr()) };
    if rc != 0 {
        return Err(MonitorError::SignalInstall {
            signal,
            source: nix::Error::last(),
        });
    }
    // SAFETY: sigaction(2) succeeded and filled the struct
    let raw = unsafe { raw.assume_init() };
    Ok(DispositionSnapshot::from_raw(&raw))
}

/// Prior actions captured when our handler was installed
#[derive(Debug)]
pub struct SavedDispositions {
    saved: Vec<(TerminationSignal, SigAction)>,
}

impl SavedDispositions {
    /// Install `handler` for every intercepted signal, keeping what was there.
    ///
    /// If any installation fails, the signals already switched are put back
    /// before the error is returned.
    pub fn install(handler: SigHandler) -> MonitorResult<Self> {
        let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
        let mut saved = Vec::with_capacity(TerminationSignal::ALL.len());

        for signal in TerminationSignal::ALL {
            // SAFETY: the handler only touches atomics and write(2)
            match unsafe { sigaction(signal.as_nix(), &action) } {
                Ok(previous) => saved.push((signal, previous)),
                Err(source) => {
                    let partial = SavedDispositions { saved };
                    if let Err(e) = partial.restore() {
                        tracing::error!(error = %e, "Failed to roll back partial handler installation");
                    }
                    return Err(MonitorError::SignalInstall { signal, source });
                }
            }
        }

        Ok(Self { saved })
    }

    /// Signals covered by this table
    pub fn signals(&self) -> impl Iterator<Item = TerminationSignal> + '_ {
        self.saved.iter().map(|(signal, _)| *signal)
    }

    /// Put every saved action back.
    ///
    /// All signals are attempted even if one fails; the first failure is
    /// returned.
    pub fn restore(self) -> MonitorResult<()> {
        let mut first_error = None;

        for (signal, previous) in self.saved.iter().rev() {
            // SAFETY: `previous` was returned by sigaction(2) for this signal
            if let Err(source) = unsafe { sigaction(signal.as_nix(), previous) } {
                tracing::error!(signal = %signal, error = %source, "Failed to restore signal disposition");
                first_error.get_or_insert(MonitorError::SignalRestore {
                    signal: *signal,
                    source,
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
