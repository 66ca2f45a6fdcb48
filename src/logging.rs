//! Structured logging bootstrap using `tracing`.

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global tracing subscriber. `RUST_LOG` wins over
/// `default_directive` when set.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_directive))?;

    let timer = fmt::time::UtcTime::rfc_3339();

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_timer(timer)
        .with_level(true)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(fmt_layer).try_init()?;

    tracing::debug!(directive = default_directive, "tracing initialised");
    Ok(())
}
