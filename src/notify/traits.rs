/*!
 * Notifier Trait
 * Transport-agnostic delivery capability
 */

/// Delivers a human-readable message to one recipient.
///
/// Implementations must not panic or return errors past this boundary:
/// every transport failure is logged and reported as `false`. Each call is
/// an independent, single delivery attempt.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    /// Attempt delivery; `true` when the transport accepted the message
    fn send(&self, recipient: &str, subject: &str, body: &str) -> bool;

    /// Short transport name for log lines
    fn transport(&self) -> &'static str;
}
