/*!
 * Run Context
 * Identity of one armed session
 */

use crate::core::{hostname, now};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use uuid::Uuid;

/// Who, where and when for one guarded-block execution
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub host: String,
    pub started_at: OffsetDateTime,
    started: Instant,
    notes: Vec<String>,
}

impl RunContext {
    /// Context for a run starting now on this machine
    pub fn new() -> Self {
        Self::for_host(hostname(), now())
    }

    pub fn for_host(host: impl Into<String>, started_at: OffsetDateTime) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            host: host.into(),
            started_at,
            started: Instant::now(),
            notes: Vec::new(),
        }
    }

    /// Time since the run was armed
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Extra lines for the termination report, in insertion order
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
