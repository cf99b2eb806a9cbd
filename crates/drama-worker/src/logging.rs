//! Tracing setup and job-scoped log spans.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber.
///
/// `RUST_LOG` controls filtering (default `info`); `LOG_FORMAT=json` switches
/// to machine-readable output for container deployments.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Span carrying the job id through one operation's logs.
pub fn job_span(job_id: &drama_models::JobId, operation: &'static str) -> tracing::Span {
    tracing::info_span!("job", job_id = %job_id, operation)
}
