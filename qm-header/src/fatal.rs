use std::fmt;
use std::sync::OnceLock;

use crate::logging;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractViolation {
    pub query: &'static str,
    pub message: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract violation in {}: {}", self.query, self.message)
    }
}

pub type AbortHook = fn(&ContractViolation);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbortHookError;

impl fmt::Display for AbortHookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "abort hook already installed")
    }
}

impl std::error::Error for AbortHookError {}

static ABORT_HOOK: OnceLock<AbortHook> = OnceLock::new();

/// Registers a process-wide callback run before a contract violation
/// aborts the process. It is meant for flushing crash reports; the process
/// is aborted once it returns.
pub fn install_abort_hook(hook: AbortHook) -> Result<(), AbortHookError> {
    ABORT_HOOK.set(hook).map_err(|_| AbortHookError)
}

#[cold]
#[inline(never)]
pub fn contract_violation(query: &'static str, args: fmt::Arguments<'_>) -> ! {
    let violation = ContractViolation {
        query,
        message: args.to_string(),
    };
    tracing::error!(
        category = %logging::category_fatal(),
        query,
        "{}",
        violation.message
    );
    if let Some(hook) = ABORT_HOOK.get() {
        hook(&violation);
    }
    terminate(&violation)
}

/// Environment variable that restores the aborting behaviour in builds that
/// otherwise unwind on violations.
pub const ABORT_ON_VIOLATION_ENV: &str = "QM_HEADER_ABORT_ON_VIOLATION";

#[cfg(any(test, feature = "unwind-on-violation"))]
fn terminate(violation: &ContractViolation) -> ! {
    if std::env::var_os(ABORT_ON_VIOLATION_ENV).is_some() {
        std::process::abort()
    }
    panic!("{violation}")
}

#[cfg(not(any(test, feature = "unwind-on-violation")))]
fn terminate(_violation: &ContractViolation) -> ! {
    std::process::abort()
}

#[macro_export]
macro_rules! check {
    ($cond:expr, $query:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::fatal::contract_violation($query, format_args!($($arg)+))
        }
    };
}

#[macro_export]
macro_rules! debug_check {
    ($cond:expr, $query:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) && !$cond {
            $crate::fatal::contract_violation($query, format_args!($($arg)+))
        }
    };
}
