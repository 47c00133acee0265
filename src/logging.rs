//! Tracing setup for the brownfield binary.
//!
//! Events go to stderr in compact form and, once `.brownfield/logs/` exists,
//! to `brownfield.log` as plain text. `BROWNFIELD_LOG` takes an `EnvFilter`
//! directive and overrides the default level.

use std::path::Path;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a filter directive, e.g. `brownfield=trace`.
pub const LOG_ENV: &str = "BROWNFIELD_LOG";

pub const LOG_FILE: &str = "brownfield.log";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "brownfield=debug,warn"
    } else {
        "brownfield=info,warn"
    }
}

pub fn build_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_span_events(if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE })
        .compact();

    let file_layer = log_dir.filter(|dir| dir.is_dir()).map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::never(dir, LOG_FILE))
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(build_filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
