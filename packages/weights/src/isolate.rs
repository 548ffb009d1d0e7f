//! Panic isolation for geometry work.
//!
//! The boolean-ops backend panics on some malformed inputs (non-finite
//! coordinates among them). Every call that touches one input geometry
//! goes through [`isolate`] so a bad polygon costs one region, not the run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Runs one unit of work, converting a panic into an error message.
pub fn isolate<T>(work: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|payload| Err(panic_message(&*payload)))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "geometry library panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_error_messages() {
        let outcome: Result<(), String> = isolate(|| panic!("degenerate ring"));
        assert_eq!(outcome.unwrap_err(), "degenerate ring");

        let outcome: Result<(), String> = isolate(|| panic!("{} rings", 2));
        assert_eq!(outcome.unwrap_err(), "2 rings");
    }

    #[test]
    fn errors_and_values_pass_through() {
        assert_eq!(isolate(|| Ok::<_, String>(7)), Ok(7));
        assert_eq!(
            isolate(|| Err::<(), _>("empty".to_string())),
            Err("empty".to_string())
        );
    }
}
