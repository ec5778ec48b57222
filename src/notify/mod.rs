/*!
 * Notification Module
 *
 * Delivery of monitor reports:
 * - `Notifier`: the pluggable delivery capability
 * - `SmtpNotifier`: email over SMTP, optionally through a proxy tunnel
 * - `RecordingNotifier`: in-memory capture
 * - `NotificationReport`: message text
 */

mod recording;
mod report;
mod smtp;
mod traits;
mod tunnel;

pub use recording::RecordingNotifier;
pub use report::NotificationReport;
pub use smtp::{DeliveryError, SmtpNotifier};
pub use traits::Notifier;
pub use tunnel::ProxyTunnel;

#[cfg(test)]
pub use traits::MockNotifier;
