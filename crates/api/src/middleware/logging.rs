//! Logging initialization and configuration.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Noisy dependencies kept at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "html5ever"];

fn default_filter(level: &str) -> EnvFilter {
    let directives = QUIET_TARGETS
        .iter()
        .fold(level.to_string(), |acc, target| format!("{},{}=warn", acc, target));
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the logging subsystem based on configuration.
///
/// `RUST_LOG` wins over `logging.level`.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            let json_layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_current_span(true)
                .with_target(true);
            subscriber.with(json_layer).init();
        }
        _ => {
            let pretty_layer = fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true);
            subscriber.with(pretty_layer).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_dependencies() {
        let filter = default_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("reqwest=warn"));
        assert!(filter.contains("html5ever=warn"));
    }

    #[test]
    fn test_default_filter_falls_back_on_garbage() {
        let filter = default_filter("[[not a level").to_string();
        assert!(filter.contains("info"));
    }
}
