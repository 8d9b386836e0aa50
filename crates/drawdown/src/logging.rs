use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging to stderr.
///
/// Stdout carries only the report, so every diagnostic goes to stderr. The level
/// applies to both crates and can be overridden with the `RUST_LOG` environment
/// variable.
pub fn init_logging(level: &str) -> color_eyre::Result<()> {
    let default_filter = format!("drawdown={level},drawdown_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()?;

    tracing::debug!("logging initialized (level={level})");
    Ok(())
}
