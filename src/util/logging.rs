use tracing_subscriber::{fmt, EnvFilter};

/// Tracing setup. `RUST_LOG` wins when set; the fallback keeps the
/// pipeline's own generate/execute/learn logs at info while muting
/// per-request noise from the HTTP stack.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn,hyper=warn"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}
