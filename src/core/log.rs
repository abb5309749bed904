use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

/// Info by default, debug with `verbose`. `RUST_LOG` overrides both.
pub fn init_logging(verbose: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (app_filter, env_filter) = filters(verbose, rust_log.as_deref());

    tracing_subscriber::registry()
        .with(fmt::layer().pretty().without_time())
        .with(app_filter)
        .with(env_filter)
        .init();
}

/// Without `RUST_LOG` only this crate logs, at the verbosity level.
fn filters(verbose: bool, rust_log: Option<&str>) -> (Option<Targets>, EnvFilter) {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        if let Ok(env_filter) = EnvFilter::try_new(directives) {
            return (None, env_filter);
        }
    }

    let (level_filter, level) = if verbose {
        (LevelFilter::DEBUG, "debug")
    } else {
        (LevelFilter::INFO, "info")
    };
    let app_filter = Targets::new().with_target("cost_report", level_filter);
    (Some(app_filter), EnvFilter::new(level))
}
