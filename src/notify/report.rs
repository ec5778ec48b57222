/*!
 * Notification Reports
 * Subject and body text for start-up and termination messages
 */

use crate::core::{format_timestamp, now};
use crate::monitor::{Outcome, RunContext};
use std::fmt::Write;
use time::OffsetDateTime;

const RULE: &str = "----------------------------------------";

/// One message, built, sent and discarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReport {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl NotificationReport {
    /// Message sent when the monitor arms
    pub fn started(recipient: &str, context: &RunContext) -> Self {
        let mut body = String::new();
        let _ = writeln!(body, "Program monitoring has started successfully.\n");
        let _ = writeln!(body, "Host Machine: {}", context.host);
        let _ = writeln!(body, "Run ID: {}", context.run_id);
        let _ = writeln!(body, "Start Time: {}", format_timestamp(context.started_at));
        let _ = writeln!(body, "{RULE}");
        let _ = writeln!(
            body,
            "You will receive another email when the program terminates (success or failure)."
        );

        Self {
            recipient: recipient.to_string(),
            subject: "[INFO] Monitoring Activated: Your Program Started".to_string(),
            body,
        }
    }

    /// Message sent on release, stamped with the current time
    pub fn terminated(recipient: &str, context: &RunContext, outcome: &Outcome) -> Self {
        Self::terminated_at(recipient, context, outcome, now())
    }

    /// Message sent on release
    pub fn terminated_at(
        recipient: &str,
        context: &RunContext,
        outcome: &Outcome,
        ended_at: OffsetDateTime,
    ) -> Self {
        let status = outcome.status();

        let mut body = String::new();
        let _ = writeln!(body, "Your program monitoring report:\n");
        let _ = writeln!(body, "Host Machine: {}", context.host);
        let _ = writeln!(body, "Run ID: {}", context.run_id);
        let _ = writeln!(body, "Status: {status}");
        let _ = writeln!(body, "Started: {}", format_timestamp(context.started_at));
        let _ = writeln!(body, "Time: {}", format_timestamp(ended_at));
        let _ = writeln!(body, "Elapsed: {:.1}s", context.elapsed().as_secs_f64());
        let _ = writeln!(body, "{RULE}");
        let _ = writeln!(body, "Error Logs / Traceback:");
        let _ = writeln!(body, "{}", outcome.details());
        for note in context.notes() {
            let _ = writeln!(body, "{note}");
        }
        let _ = writeln!(body, "{RULE}");
        let _ = write!(body, "This is an automated message from termination-monitor.");

        Self {
            recipient: recipient.to_string(),
            subject: format!("[ALERT] Your Program is Terminated: {status}"),
            body,
        }
    }
}
