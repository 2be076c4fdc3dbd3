use crate::error::ConfigError;
use crate::settings::{LogFormat, LoggingSettings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level` when it is set. When a log directory
/// is configured, a second, ANSI-free layer writes to a daily rolling file;
/// the returned guard must be kept alive for the lifetime of the program or
/// buffered file output is lost.
pub fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = build_filter(&settings.level)?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    layers.push(match settings.format {
        LogFormat::Full => fmt::layer().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    });

    let guard = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    Ok(guard)
}

fn build_filter(default_level: &str) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| ConfigError::LoggingError(format!("invalid level '{}': {}", default_level, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_level_directive() {
        // Only meaningful when RUST_LOG does not override the configured level.
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let err = build_filter("api_client=notalevel").unwrap_err();
        assert!(matches!(err, ConfigError::LoggingError(msg) if msg.contains("notalevel")));
    }

    #[test]
    fn accepts_directive_lists() {
        assert!(build_filter("info,api_client=debug").is_ok());
    }
}
