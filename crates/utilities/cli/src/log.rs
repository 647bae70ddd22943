//! Tracing subscriber setup.

use tracing::Level;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
};

/// Maps a `-v` count to the most verbose level that is printed.
///
/// No flag prints `info` and above; each `-v` opens one more level, up to `trace`.
pub const fn verbosity_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global tracing subscriber.
///
/// Directives from `env_filter`, or from `RUST_LOG` when it is `None`, are combined with the
/// level derived from `verbosity`.
pub fn init_tracing_subscriber(
    verbosity: u8,
    env_filter: Option<impl Into<EnvFilter>>,
) -> Result<(), TryInitError> {
    let filter = env_filter.map(Into::into).unwrap_or_else(EnvFilter::from_default_env);
    let filter = filter.add_directive(verbosity_level(verbosity).into());

    tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init()
}
