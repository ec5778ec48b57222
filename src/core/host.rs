/*!
 * Host Identity
 * Hostname and wall-clock helpers used in reports
 */

use std::any::Any;
use std::sync::OnceLock;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

static LOCAL_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Name of this machine, or `unknown-host` if it cannot be read
pub fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::debug!(error = %e, "Could not read hostname");
            "unknown-host".to_string()
        }
    }
}

/// Record the local UTC offset for later timestamps.
///
/// The platform only answers while the process is single-threaded, so call
/// this early in `main`. Later calls are cheap and keep the first answer.
pub fn capture_local_offset() -> Option<UtcOffset> {
    if let Some(offset) = LOCAL_OFFSET.get() {
        return Some(*offset);
    }
    match UtcOffset::current_local_offset() {
        Ok(offset) => Some(*LOCAL_OFFSET.get_or_init(|| offset)),
        Err(e) => {
            tracing::debug!(error = %e, "Local offset unavailable; timestamps stay in UTC");
            None
        }
    }
}

/// Current wall-clock time in the captured local offset, UTC otherwise
pub fn now() -> OffsetDateTime {
    let utc = OffsetDateTime::now_utc();
    match LOCAL_OFFSET.get() {
        Some(offset) => utc.to_offset(*offset),
        None => utc,
    }
}

/// RFC 3339 rendering for report bodies
pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
