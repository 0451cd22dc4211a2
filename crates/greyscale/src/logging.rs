//! Logging initialization.
//!
//! Uses the `tracing` ecosystem with either human-readable or JSON output.
//! Stage spans (`convert`, `index_write`, `gallery`, ...) show up as context
//! on every event logged while a batch is handled.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `level` - Default filter directive when `RUST_LOG` is not set.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
///
/// Log output goes to stderr; stdout is reserved for the run summary.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section.
///
/// `--verbose` raises anything quieter than debug to debug; `--json-logs`
/// forces JSON output.
pub fn init_from_config(
    config: &greyscale_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = effective_level(&config.logging.level, verbose_override);
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format);
}

fn effective_level(configured: &str, verbose: bool) -> &str {
    match configured {
        "trace" | "debug" => configured,
        _ if verbose => "debug",
        "error" | "warn" | "info" => configured,
        _ => "info",
    }
}
