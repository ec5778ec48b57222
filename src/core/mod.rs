/*!
 * Core Module
 * Guards, host identity and tracing setup shared by the monitor
 */

pub mod guard;
pub mod host;
pub mod tracer;

// Re-export for convenience
pub use guard::{Guard, GuardDrop, GuardError, GuardMetadata, GuardResult};
pub use host::{capture_local_offset, format_timestamp, hostname, now, panic_message};
pub use tracer::init_tracing;
