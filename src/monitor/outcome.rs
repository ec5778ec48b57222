/*!
 * Outcome Classification
 *
 * What ended the guarded block, how that is reported, and what the caller
 * gets back.
 */

use crate::core::panic_message;
use crate::errors::MonitorError;
use crate::signals::TerminationSignal;
use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Whatever caused the guard to release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseTrigger {
    /// The block ran to completion
    Completed,
    /// The block returned an error or panicked
    Failed { description: String },
    /// An intercepted signal arrived while armed
    Signal(TerminationSignal),
}

impl ReleaseTrigger {
    /// Failure trigger carrying the error's type, message and full chain
    pub fn failed<E>(error: &E) -> Self
    where
        E: fmt::Display + fmt::Debug + 'static,
    {
        ReleaseTrigger::Failed {
            description: describe_error(error),
        }
    }

    /// Failure trigger for a panic payload
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        ReleaseTrigger::Failed {
            description: format!("panic in guarded block: {}", panic_message(payload)),
        }
    }
}

/// Text description of an error: type, message, then the `Debug` form.
///
/// An `anyhow::Error` is only a wrapper, so its `Debug` form (message plus
/// every cause) stands alone without the wrapper's type name.
pub fn describe_error<E>(error: &E) -> String
where
    E: fmt::Display + fmt::Debug + 'static,
{
    if let Some(error) = (error as &dyn Any).downcast_ref::<anyhow::Error>() {
        return format!("{error:?}");
    }
    format!("{}: {}\n\n{:?}", type_name::<E>(), error, error)
}

/// How the guarded block ended. Produced once per release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { description: String },
    UserInterrupt,
    ExternalTermination { signal_name: String },
}

impl Outcome {
    pub fn classify(trigger: ReleaseTrigger) -> Self {
        match trigger {
            ReleaseTrigger::Completed => Outcome::Success,
            ReleaseTrigger::Failed { description } => Outcome::Failure { description },
            ReleaseTrigger::Signal(signal) if signal.is_interactive() => Outcome::UserInterrupt,
            ReleaseTrigger::Signal(signal) => Outcome::ExternalTermination {
                signal_name: signal.name().to_string(),
            },
        }
    }

    /// Short status used in the subject line
    pub fn status(&self) -> Cow<'static, str> {
        match self {
            Outcome::Success => Cow::Borrowed("Success"),
            Outcome::Failure { .. } => Cow::Borrowed("Crashed"),
            Outcome::UserInterrupt => Cow::Borrowed("Interrupted by User (Ctrl+C)"),
            Outcome::ExternalTermination { signal_name } => Cow::Owned(format!("Terminated by {signal_name}")),
        }
    }

    /// Body text: the failure trace, or a short explanation
    pub fn details(&self) -> Cow<'_, str> {
        match self {
            Outcome::Success => Cow::Borrowed("None"),
            Outcome::Failure { description } => Cow::Borrowed(description.as_str()),
            Outcome::UserInterrupt => Cow::Borrowed("User manually stopped the program."),
            Outcome::ExternalTermination { signal_name } => {
                Cow::Owned(format!("Process terminated by signal {signal_name}."))
            }
        }
    }

    /// The signal that ended the block, if one did
    pub fn signal(&self) -> Option<TerminationSignal> {
        match self {
            Outcome::UserInterrupt => Some(TerminationSignal::Interrupt),
            Outcome::ExternalTermination { signal_name } => TerminationSignal::ALL
                .into_iter()
                .find(|s| s.name() == signal_name),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Why [`crate::TerminationMonitor::run`] did not return the block's value
#[derive(Debug, Error)]
pub enum MonitorExit<E> {
    /// The block's own error, unchanged
    #[error("guarded block failed: {0}")]
    Failed(E),

    /// A termination signal ended the block and the restored prior
    /// disposition let the process live
    #[error("guarded block terminated by {0}")]
    Signaled(TerminationSignal),

    /// The monitor could not be armed; the block did not run
    #[error("termination monitor could not be armed: {0}")]
    Setup(#[source] MonitorError),
}

impl<E> MonitorExit<E> {
    /// The block's error, if that is what ended it
    pub fn into_failure(self) -> Option<E> {
        match self {
            MonitorExit::Failed(e) => Some(e),
            _ => None,
        }
    }
}
