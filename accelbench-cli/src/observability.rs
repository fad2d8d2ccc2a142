//! Logging and error reporting setup.

use std::env;

use secrecy::ExposeSecret;
use sentry::integrations::tracing as sentry_tracing;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::Config;

/// Initializes Sentry if a DSN is configured.
///
/// The returned guard flushes pending events when dropped.
pub fn init_sentry(config: &Config) -> Option<sentry::ClientInitGuard> {
    let sentry_config = &config.sentry;
    let dsn = sentry_config.dsn.as_ref()?;

    Some(sentry::init(sentry::ClientOptions {
        dsn: dsn.expose_secret().as_str().parse().ok(),
        release: sentry::release_name!(),
        environment: sentry_config.environment.clone(),
        sample_rate: sentry_config.sample_rate,
        traces_sample_rate: sentry_config.traces_sample_rate,
        debug: sentry_config.debug,
        enable_logs: true,
        ..Default::default()
    }))
}

/// Installs the global tracing subscriber writing to stderr.
pub fn init_tracing(config: &Config) {
    // Same as the default filter, except it converts warnings into events
    // and also sends everything at or above INFO as logs instead of breadcrumbs.
    let sentry_layer = config.sentry.is_enabled().then(|| {
        sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
            Level::ERROR | Level::WARN => {
                sentry_tracing::EventFilter::Event | sentry_tracing::EventFilter::Log
            }
            Level::INFO => sentry_tracing::EventFilter::Log,
            Level::DEBUG | Level::TRACE => sentry_tracing::EventFilter::Ignore,
        })
    });

    let (level, env_filter) = parse_rust_log(config.logging.level);
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(level))
        .with(sentry_layer)
        .with(env_filter)
        .init();
}

/// Resolves the output level and directive filter from `RUST_LOG`.
///
/// A bare level in `RUST_LOG` replaces the configured level. Anything else is used literally as
/// the directive list.
pub fn parse_rust_log(configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let value = env::var(EnvFilter::DEFAULT_ENV).ok();
    resolve_filter(value.as_deref(), configured)
}

fn resolve_filter(rust_log: Option<&str>, configured: LevelFilter) -> (LevelFilter, EnvFilter) {
    let level = match rust_log {
        Some(value) => match value.parse::<LevelFilter>() {
            Ok(level) => level,
            Err(_) => return (LevelFilter::TRACE, EnvFilter::new(value)),
        },
        None => configured,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        s3=WARN,\
        accelbench=TRACE,\
        accelbench_cli=TRACE,\
        accelbench_engine=TRACE,\
        ",
    );

    (level, env_filter)
}
