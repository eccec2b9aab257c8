//! Tracing helpers
// (c) 2025 Ross Younger

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{prelude::*, EnvFilter};

static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Environment variable that controls what gets logged
const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// Computes the trace level from the CLI verbosity flags
#[must_use]
pub(crate) fn trace_level(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    }
}

/// Returns whether tracing has been initialized
pub(crate) fn tracing_is_initialised() -> bool {
    TRACING_INITIALIZED.load(Ordering::Relaxed)
}

/// Sets up tracing output to stderr.
///
/// By default we log only our own events (dcp), at the given level.
/// This can be overridden by setting `RUST_LOG`.
///
/// **NOTE:** You can only run this once per process. A global bool
/// prevents re-running.
pub(crate) fn setup_tracing(trace_level: &str) -> anyhow::Result<()> {
    if TRACING_INITIALIZED.swap(true, Ordering::Relaxed) {
        tracing::warn!("setup_tracing called a second time (ignoring)");
        return Ok(());
    }

    let (filter, used_env) = match EnvFilter::try_from_env(STANDARD_ENV_VAR) {
        Ok(filter) => (filter, true),
        Err(e) => {
            // The env var was unset or invalid. Which is it?
            if std::env::var(STANDARD_ENV_VAR).is_ok() {
                anyhow::bail!("{STANDARD_ENV_VAR} (set in environment) was not understood: {e}");
            }
            (EnvFilter::try_new(format!("dcp={trace_level}"))?, false)
        }
    };

    // If the environment variable selected the filter, show log targets;
    // if it did not, we're only logging dcp, so don't.
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(used_env)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(layer).init();
    Ok(())
}
