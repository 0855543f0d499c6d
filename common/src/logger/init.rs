use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Installs the global tracing subscriber exactly once per process.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. `json` switches
/// to machine-readable output for production; otherwise events are pretty
/// printed for a terminal.
pub fn init_logger(service_name: &'static str, json: bool) {
    LOGGER_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let base = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .with_span_events(fmt::format::FmtSpan::CLOSE);

        let installed = if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(base.json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(base.pretty())
                .try_init()
        };

        if installed.is_ok() {
            tracing::info!(service = service_name, json, "logger initialized");
        }
    });
}
