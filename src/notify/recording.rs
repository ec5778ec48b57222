/*!
 * Recording Notifier
 * In-memory notifier for tests and dry runs
 */

use super::report::NotificationReport;
use super::traits::Notifier;
use parking_lot::Mutex;
use tracing::info;

/// Keeps every message it is asked to send
#[derive(Debug)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationReport>>,
    succeed: bool,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingNotifier {
    /// Notifier whose deliveries all succeed
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: true,
        }
    }

    /// Notifier that records messages but reports every delivery as failed
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            succeed: false,
        }
    }

    /// Copy of everything sent so far
    pub fn sent(&self) -> Vec<NotificationReport> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
        info!(recipient, subject, "Recording notification");
        self.sent.lock().push(NotificationReport {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        self.succeed
    }

    fn transport(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_in_order() {
        let notifier = RecordingNotifier::new();
        assert!(notifier.send("a@example.com", "first", "1"));
        assert!(notifier.send("b@example.com", "second", "2"));

        let sent = notifier.sent();
        assert_eq!(notifier.count(), 2);
        assert_eq!(sent[0].subject, "first");
        assert_eq!(sent[1].recipient, "b@example.com");
    }

    #[test]
    fn test_failing_still_records() {
        let notifier = RecordingNotifier::failing();
        assert!(!notifier.send("a@example.com", "s", "b"));
        assert_eq!(notifier.count(), 1);
    }
}
