//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const DEFAULT_FILTER: &str = "info,hyper=warn";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(config: Option<&LoggingConfig>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(config));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();
}

pub fn filter_for(config: Option<&LoggingConfig>) -> EnvFilter {
    match config.map(|c| c.level.trim()).filter(|level| !level.is_empty()) {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        None => EnvFilter::new(DEFAULT_FILTER),
    }
}
