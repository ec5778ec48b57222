/*!
 * Termination Monitor Library
 * Guards a unit of work and emails a report when it ends, however it ends
 */

pub mod config;
pub mod core;
pub mod errors;
pub mod monitor;
pub mod notify;
pub mod signals;

// Re-exports
pub use config::{MonitorConfig, MonitorConfigBuilder, ProxyConfig};
pub use core::init_tracing;
pub use errors::*;
pub use monitor::{ArmedGuard, MonitorExit, Outcome, ReleaseTrigger, RunContext, TerminationMonitor};
pub use notify::{NotificationReport, Notifier, RecordingNotifier, SmtpNotifier};
pub use signals::{current_disposition, DispositionSnapshot, SignalDisposition, TerminationSignal};
