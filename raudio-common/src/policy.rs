//! Severity policy for error-level reports
//!
//! Every failure in the engine is logged and returned to the caller. Some
//! deployments (standalone tools, tests that must fail loudly) want an
//! error-level report to end the process instead. That choice lives here so
//! the engine never hardcodes a process exit.

use std::fmt::Display;
use tracing::error;

/// Exit code used when [`ErrorPolicy::Exit`] terminates the process
pub const FATAL_EXIT_CODE: i32 = 1;

/// What happens after an error-level report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log and keep running; the caller receives the error
    #[default]
    Continue,

    /// Log, then terminate the process
    Exit,
}

impl ErrorPolicy {
    /// Log an error-level report and apply the policy.
    ///
    /// Returns normally only under [`ErrorPolicy::Continue`].
    pub fn report(&self, context: &str, err: &dyn Display) {
        error!("{}: {}", context, err);

        if *self == ErrorPolicy::Exit {
            error!("Error policy is Exit, terminating process");
            std::process::exit(FATAL_EXIT_CODE);
        }
    }

    /// True when error reports terminate the process
    pub fn is_fatal(&self) -> bool {
        *self == ErrorPolicy::Exit
    }
}
