//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter when `RUST_LOG` is not set.
pub fn default_filter(config: &ObservabilityConfig) -> String {
    let level = config.log_level.to_ascii_lowercase();
    format!("forward_proxy={level},tower_http={level}")
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config.
pub fn init(config: &ObservabilityConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(config))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_uses_configured_level() {
        let config = ObservabilityConfig {
            log_level: "WARN".into(),
        };
        assert_eq!(default_filter(&config), "forward_proxy=warn,tower_http=warn");
    }
}
