use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Bridge crates log at info; dependencies stay at warn unless `RUST_LOG`
/// says otherwise.
const DEFAULT_LOG_DIRECTIVES: &str = "threadbridge=info";

pub(crate) fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(false)
        .compact()
        .init();
}

fn build_env_filter(rust_log: Option<&str>) -> EnvFilter {
    let directives = rust_log
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_LOG_DIRECTIVES);
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives)
}
