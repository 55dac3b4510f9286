//! Structured logging.
//!
//! The original's `Debug` class layers file, console and Sentry handlers
//! on top of stdlib `logging`. No `sentry` crate appears anywhere in the
//! corpus, so rather than fabricate that dependency this collaborator
//! wraps `tracing` directly, the same crate `logging/mod.rs` builds its
//! `log_info!`/`log_error!` macros over.
//! `capture_exception` is kept as a named method - with no DSN configured
//! it just traces at error level, same shape as the original falling
//! back to plain logging when Sentry init is skipped.

use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct Telemetry {
    dsn: Option<String>,
}

impl Telemetry {
    pub fn new(dsn: Option<String>) -> Self {
        Self { dsn }
    }

    pub fn debug(&self, message: &str) {
        debug!("{message}");
    }

    pub fn info(&self, message: &str) {
        info!("{message}");
    }

    pub fn warning(&self, message: &str) {
        warn!("{message}");
    }

    /// Record an exception. With a DSN configured this is where a real
    /// Sentry client would ship the event upstream; without one it's
    /// just an error-level trace, matching the original's fallback.
    pub fn capture_exception(&self, context: &str, err: &dyn std::error::Error) {
        error!(dsn_configured = self.dsn.is_some(), context, %err, "unhandled error");
    }
}

/// Install the process-wide `tracing` subscriber. Grounded on `main.rs`'s
/// bring-up (`FmtSubscriber::builder().with_max_level`).
pub fn init_subscriber(debug_mode: bool) {
    let level = if debug_mode { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_exception_does_not_panic_without_a_dsn() {
        let telemetry = Telemetry::new(None);
        let err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        telemetry.capture_exception("test", &err);
    }
}
