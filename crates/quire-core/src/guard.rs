//! Catch-log-continue wrapper shared by every fan-out point.
//!
//! Event delivery, plugin init/destroy and command execution all call
//! into code the core doesn't control. A failure there (an `Err` or a
//! panic) is logged with context and turned into `None`; it never
//! reaches the caller of the fan-out.
//!
//! ## Learning: `catch_unwind`
//!
//! `std::panic::catch_unwind` stops an unwinding panic at a boundary.
//! `AssertUnwindSafe` is needed because the closures borrow editor state;
//! that state is `RefCell`-guarded, and borrows are released while
//! unwinding, so nothing is left half-borrowed.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Runs `f`, containing both error returns and panics.
///
/// `context` names what was being invoked, for the log line.
pub fn guarded<T, E, F>(context: fmt::Arguments<'_>, f: F) -> Option<T>
where
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(error)) => {
            tracing::error!(error = %error, "{} failed", context);
            None
        }
        Err(payload) => {
            tracing::error!(panic = %panic_message(payload.as_ref()), "{} panicked", context);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_passes_through() {
        let value = guarded(format_args!("ok"), || Ok::<_, String>(42));
        assert_eq!(value, Some(42));
    }

    #[test]
    fn test_error_is_contained() {
        let value: Option<()> = guarded(format_args!("failing"), || Err("boom"));
        assert!(value.is_none());
    }

    #[test]
    fn test_panic_is_contained() {
        let value: Option<()> = guarded(format_args!("panicking"), || -> Result<(), String> {
            panic!("kaboom")
        });
        assert!(value.is_none());
    }
}
