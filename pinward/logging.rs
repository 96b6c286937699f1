use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Filter used when neither the config nor `RUST_LOG` say anything, indexed by verbosity.
fn default_filter(verbosity: isize) -> &'static str {
    match verbosity {
        v if v < 0 => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

pub fn init(config: &LogConfig, verbosity: isize) {
    let filter = match config.filter {
        Some(ref filter) => EnvFilter::new(filter),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity))),
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let format = config.format.to_lowercase();
    match format.as_str() {
        "compact" => builder.compact().init(),
        "pretty" => builder.pretty().init(),
        "full" => builder.init(),
        _ => builder.init(),
    }

    tracing::info!(format = format.as_str(), "Logging initialized")
}
