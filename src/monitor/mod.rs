/*!
 * Termination Monitor
 *
 * Lifecycle: `Idle -> Armed -> Released`.
 *
 * - `acquire()` installs the termination-signal handlers and sends the
 *   optional start-up notification
 * - release restores the prior dispositions, classifies the outcome, sends
 *   exactly one report, and hands the original outcome back
 * - `run()` drives the whole lifecycle around a closure
 *
 * ## Example
 *
 * ```ignore
 * let monitor = TerminationMonitor::from_env()?;
 * let rows = monitor.run(|| import_everything())?;
 * ```
 */

mod guard;
mod outcome;
mod runner;
mod session;

pub use guard::ArmedGuard;
pub use outcome::{describe_error, MonitorExit, Outcome, ReleaseTrigger};
pub use session::RunContext;

use crate::config::MonitorConfig;
use crate::core::{capture_local_offset, panic_message};
use crate::errors::MonitorResult;
use crate::notify::{NotificationReport, Notifier, SmtpNotifier};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Guards one unit of work and reports how it ended
pub struct TerminationMonitor {
    config: MonitorConfig,
    notifier: Option<Arc<dyn Notifier>>,
}

impl TerminationMonitor {
    /// Monitor delivering over SMTP; degraded if the config is incomplete
    pub fn new(config: MonitorConfig) -> Self {
        let notifier = if config.is_complete() {
            Some(Arc::new(SmtpNotifier::from_config(&config)) as Arc<dyn Notifier>)
        } else {
            None
        };
        Self::assemble(config, notifier)
    }

    /// Monitor configured entirely from the environment
    pub fn from_env() -> MonitorResult<Self> {
        Ok(Self::new(MonitorConfig::from_env()?))
    }

    /// Monitor delivering through a caller-supplied notifier.
    ///
    /// Only the recipient is required here; sender credentials belong to
    /// the transport.
    pub fn with_notifier(config: MonitorConfig, notifier: Arc<dyn Notifier>) -> Self {
        let notifier = config.recipient.as_ref().map(|_| notifier);
        Self::assemble(config, notifier)
    }

    fn assemble(config: MonitorConfig, notifier: Option<Arc<dyn Notifier>>) -> Self {
        capture_local_offset();
        match &notifier {
            Some(notifier) => info!(
                transport = notifier.transport(),
                recipient = config.recipient.as_deref().unwrap_or_default(),
                "Termination monitor configured"
            ),
            None => warn!(
                missing = ?config.missing_fields(),
                "Email configuration incomplete. Email alerts will be disabled."
            ),
        }
        Self { config, notifier }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// No notifications will be sent
    pub fn is_degraded(&self) -> bool {
        self.notifier.is_none()
    }

    /// Enter the `Armed` state.
    ///
    /// Fails with [`crate::MonitorError::AlreadyArmed`] while another guard
    /// in this process is armed.
    pub fn acquire(&self) -> MonitorResult<ArmedGuard<'_>> {
        ArmedGuard::arm(self)
    }

    fn delivery(&self) -> Option<(&dyn Notifier, &str)> {
        match (&self.notifier, &self.config.recipient) {
            (Some(notifier), Some(recipient)) => Some((notifier.as_ref(), recipient.as_str())),
            _ => None,
        }
    }

    pub(crate) fn report_started(&self, context: &RunContext) {
        if !self.config.notify_on_start {
            return;
        }
        let Some((notifier, recipient)) = self.delivery() else {
            return;
        };

        info!(run_id = %context.run_id, "Sending start-up notification...");
        let report = NotificationReport::started(recipient, context);
        dispatch(notifier, &report);
    }

    pub(crate) fn report_outcome(&self, context: &RunContext, outcome: &Outcome) {
        let Some((notifier, recipient)) = self.delivery() else {
            info!(run_id = %context.run_id, "No email configuration. Skipping alert.");
            return;
        };

        info!(run_id = %context.run_id, "Preparing termination report...");
        let report = NotificationReport::terminated(recipient, context, outcome);
        dispatch(notifier, &report);
    }
}

/// One delivery attempt; a notifier that panics counts as a failed delivery
fn dispatch(notifier: &dyn Notifier, report: &NotificationReport) -> bool {
    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
        notifier.send(&report.recipient, &report.subject, &report.body)
    }))
    .unwrap_or_else(|payload| {
        error!(
            transport = notifier.transport(),
            panic = %panic_message(&*payload),
            "Notifier panicked"
        );
        false
    });

    if delivered {
        info!(transport = notifier.transport(), subject = %report.subject, "Notification delivered");
    } else {
        warn!(transport = notifier.transport(), subject = %report.subject, "Notification not delivered");
    }
    delivered
}
