use std::borrow::Cow;

use sentry::integrations::tracing::EventFilter;
use sentry::{ClientInitGuard, ClientOptions};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::prelude::*;

/// Initialises Sentry and the logging to stderr.
///
/// `FIRES_BOOTSTRAP_LOG` filters the console output, `FIRES_BOOTSTRAP_SENTRY_LOG` filters what
/// gets reported as Sentry events and breadcrumbs.
pub fn init(sentry_dsn: Option<String>, traces_sample_rate: f32) -> Result<ClientInitGuard> {
    let guard = sentry::init((
        sentry_dsn,
        ClientOptions {
            release: Some(Cow::Borrowed(env!("CARGO_PKG_VERSION"))),
            traces_sample_rate,
            ..Default::default()
        },
    ));

    let sentry_layer = sentry::integrations::tracing::layer()
        .event_filter(|metadata| sentry_event_filter(*metadata.level()))
        .span_filter(|metadata| *metadata.level() <= Level::INFO)
        .with_filter(env_filter("FIRES_BOOTSTRAP_SENTRY_LOG", "fires_bootstrap=debug")?);
    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("FIRES_BOOTSTRAP_LOG", "fires_bootstrap=info")?);

    tracing_subscriber::Registry::default()
        .with(sentry_layer)
        .with(format_layer)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    Ok(guard)
}

/// Reads the filter directives from the environment variable, falling back to the default ones.
fn env_filter(variable: &str, default: &str) -> Result<EnvFilter> {
    match std::env::var(variable) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("`{}` contains invalid directives", variable)),
        _ => Ok(EnvFilter::try_new(default)?),
    }
}

/// Warnings and errors become Sentry events, the rest only goes to the breadcrumbs.
fn sentry_event_filter(level: Level) -> EventFilter {
    match level {
        Level::ERROR | Level::WARN => EventFilter::Event,
        Level::INFO | Level::DEBUG | Level::TRACE => EventFilter::Breadcrumb,
    }
}

pub fn format_duration(duration: StdDuration) -> String {
    humantime::format_duration(duration).to_string()
}

pub fn format_elapsed(instant: Instant) -> String {
    format_duration(instant.elapsed())
}
