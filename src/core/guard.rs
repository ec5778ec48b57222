/*!
 * Scoped Guards
 *
 * A guard takes a process-wide resource on construction and hands it back
 * exactly once: through `release()` or, failing that, on drop.
 */

use std::time::Instant;
use thiserror::Error;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Clone, Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Release failed: {0}")]
    OperationFailed(String),
}

/// When and what a guard was created for
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: Instant,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: Instant::now(),
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}

/// A held resource that can be handed back early
pub trait Guard: Send {
    /// Resource type name for logging
    fn resource_type(&self) -> &'static str;

    fn metadata(&self) -> &GuardMetadata;

    /// Still holding the resource
    fn is_active(&self) -> bool;

    /// Hand the resource back; `Err(AlreadyReleased)` the second time
    fn release(&mut self) -> GuardResult<()>;
}

/// Cleanup hook called from `Drop`. Must not panic; log instead.
pub trait GuardDrop: Guard {
    fn on_drop(&mut self);
}
