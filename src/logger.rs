use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` drives filtering (default `info`); `json` switches to one JSON
/// object per event.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().with_current_span(false).init();
    } else {
        builder.init();
    }
}
