//! Operation envelope: wraps a fallible operation with a
//! start log, a completion log carrying elapsed time, and an error log.
//! Logging only -- it never alters the returned status or error.

use std::time::Instant;

use tracing::{error, info};

/// Runs `op`, logging `start_message` before and `done_message` (plus
/// elapsed time) after a successful completion, or the error otherwise.
///
/// # Errors
///
/// Propagates whatever error `op` returns, unchanged.
pub async fn with_envelope<T, E, F, Fut>(start_message: &str, done_message: &str, op: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    info!(message = start_message, "operation starting");
    let started = Instant::now();
    match op().await {
        Ok(value) => {
            info!(
                message = done_message,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "operation completed"
            );
            Ok(value)
        }
        Err(err) => {
            error!(
                message = start_message,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "operation failed"
            );
            Err(err)
        }
    }
}

/// Reusable, named instance of the envelope for call sites that want a
/// value to hold onto rather than passing message strings at each call.
#[derive(Debug, Clone)]
pub struct OperationEnvelope {
    start_message: &'static str,
    done_message: &'static str,
}

impl OperationEnvelope {
    #[must_use]
    pub fn new(start_message: &'static str, done_message: &'static str) -> Self {
        Self { start_message, done_message }
    }

    /// Runs `op` through [`with_envelope`] using this envelope's messages.
    ///
    /// # Errors
    ///
    /// Propagates whatever error `op` returns, unchanged.
    pub async fn run<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        with_envelope(self.start_message, self.done_message, op).await
    }
}
