/*!
 * Armed Guard
 *
 * The `Armed` state of a monitor. Release runs, in order: restore the
 * prior dispositions, classify the outcome, report it, then re-deliver any
 * termination signal so the process ends the way it would have unguarded.
 */

use super::outcome::{Outcome, ReleaseTrigger};
use super::session::RunContext;
use super::TerminationMonitor;
use crate::core::guard::Guard;
use crate::errors::{MonitorError, MonitorResult};
use crate::signals::{self, DispositionGuard, TerminationSignal};
use flume::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Set while some guard owns the signal table
static ARMED: AtomicBool = AtomicBool::new(false);

/// Scoped acquisition returned by [`TerminationMonitor::acquire`].
///
/// Dropping the guard without calling [`ArmedGuard::release`] still runs the
/// full release sequence: a drop during unwinding is reported as a failure,
/// any other drop as success.
pub struct ArmedGuard<'m> {
    monitor: &'m TerminationMonitor,
    context: RunContext,
    dispositions: DispositionGuard,
    released: bool,
}

impl<'m> ArmedGuard<'m> {
    pub(super) fn arm(monitor: &'m TerminationMonitor) -> MonitorResult<Self> {
        if ARMED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MonitorError::AlreadyArmed);
        }

        let dispositions = match DispositionGuard::install() {
            Ok(dispositions) => dispositions,
            Err(e) => {
                ARMED.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let context = RunContext::new();
        info!(
            run_id = %context.run_id,
            host = %context.host,
            started_at = %crate::core::format_timestamp(context.started_at),
            "Monitoring started"
        );

        let guard = Self {
            monitor,
            context,
            dispositions,
            released: false,
        };
        guard.monitor.report_started(&guard.context);
        Ok(guard)
    }

    pub fn run_id(&self) -> Uuid {
        self.context.run_id
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Add a line to the termination report
    pub fn note(&mut self, note: impl Into<String>) {
        self.context.add_note(note);
    }

    /// First termination signal caught so far, for cooperative checks
    pub fn pending_signal(&self) -> Option<TerminationSignal> {
        self.dispositions.first_signal()
    }

    /// Caught signals, delivered outside signal-handler context
    pub fn signals(&self) -> &Receiver<TerminationSignal> {
        self.dispositions.signals()
    }

    /// Release with an explicit trigger and return the classified outcome.
    ///
    /// For signal outcomes the signal is re-delivered before this returns;
    /// under the default disposition the process ends there.
    pub fn release(mut self, trigger: ReleaseTrigger) -> Outcome {
        self.finish(trigger)
    }

    fn finish(&mut self, trigger: ReleaseTrigger) -> Outcome {
        self.released = true;

        // a. Dispositions go back before any notification I/O. The first
        // signal is read only afterwards: until the restore completes our
        // handler can still catch one.
        if let Err(e) = self.dispositions.release() {
            error!(run_id = %self.context.run_id, error = %e, "Failed to restore signal dispositions");
        }
        let late_signal = self.dispositions.first_signal();
        ARMED.store(false, Ordering::SeqCst);

        // b. Classify
        let outcome = Outcome::classify(trigger);
        match &outcome {
            Outcome::Failure { description } => {
                error!(run_id = %self.context.run_id, "Exception detected:\n{description}")
            }
            other => info!(run_id = %self.context.run_id, status = %other.status(), "Guarded block ended"),
        }

        // c. Report
        self.monitor.report_outcome(&self.context, &outcome);

        // d. Re-deliver, so the guard never swallows a termination request
        match (outcome.signal(), late_signal) {
            (Some(signal), _) => signals::redeliver(signal),
            (None, Some(late)) => {
                warn!(
                    run_id = %self.context.run_id,
                    signal = %late,
                    "Signal arrived after the block finished; re-delivering"
                );
                signals::redeliver(late);
            }
            (None, None) => {}
        }

        outcome
    }
}

impl Drop for ArmedGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let trigger = if thread::panicking() {
            ReleaseTrigger::Failed {
                description: "guarded scope unwound from a panic before release".to_string(),
            }
        } else {
            ReleaseTrigger::Completed
        };
        self.finish(trigger);
    }
}
