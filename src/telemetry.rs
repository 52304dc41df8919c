use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

const DEFAULT_FILTER: &str = "info,tower_http=info";

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = INIT.get_or_init(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let span_events = fmt::layer()
            .with_target(false)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
        let _ = tracing_subscriber::registry()
            .with(span_events)
            .with(env_filter)
            .try_init();
    });
}
