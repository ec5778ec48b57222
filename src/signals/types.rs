/*!
 * Signal Types
 * The termination requests a monitor intercepts
 */

use nix::sys::signal::Signal;
use std::fmt;

/// External termination requests intercepted while a monitor is armed.
///
/// Every other signal keeps whatever disposition the process gave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    /// Interactive interrupt from the terminal (Ctrl+C)
    Interrupt,
    /// Generic termination request (`kill <pid>`)
    Terminate,
}

impl TerminationSignal {
    /// All intercepted signals, in installation order
    pub const ALL: [TerminationSignal; 2] = [TerminationSignal::Terminate, TerminationSignal::Interrupt];

    /// Convert from a raw signal number
    pub fn from_number(n: i32) -> Option<Self> {
        match Signal::try_from(n) {
            Ok(Signal::SIGINT) => Some(TerminationSignal::Interrupt),
            Ok(Signal::SIGTERM) => Some(TerminationSignal::Terminate),
            _ => None,
        }
    }

    /// The platform signal
    pub fn as_nix(&self) -> Signal {
        match self {
            TerminationSignal::Interrupt => Signal::SIGINT,
            TerminationSignal::Terminate => Signal::SIGTERM,
        }
    }

    /// Get signal number
    pub fn number(&self) -> i32 {
        self.as_nix() as i32
    }

    /// Conventional signal name, e.g. `SIGTERM`
    pub fn name(&self) -> &'static str {
        self.as_nix().as_str()
    }

    /// Whether the request came from an operator at the terminal
    pub fn is_interactive(&self) -> bool {
        matches!(self, TerminationSignal::Interrupt)
    }

    /// Exit code a shell reports for a process killed by this signal
    pub fn shell_exit_code(&self) -> u8 {
        128 + self.number() as u8
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<Signal> for TerminationSignal {
    type Error = Signal;

    fn try_from(signal: Signal) -> Result<Self, Self::Error> {
        TerminationSignal::from_number(signal as i32).ok_or(signal)
    }
}
