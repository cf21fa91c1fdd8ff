use crate::utils::error::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output shape of the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Compact single-line output for terminals.
    #[default]
    Compact,
    /// One JSON object per event, for logs shipped to Cloud Logging.
    Json,
}

/// `RUST_LOG` wins when set; otherwise the crate logs at info, or debug
/// (HTTP calls included) when verbose.
pub fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("cloud_iface=debug,info")
        } else {
            EnvFilter::new("cloud_iface=info,warn")
        }
    })
}

/// Installs the global subscriber. Fails instead of panicking when one is
/// already installed, so callers embedding the crate keep theirs.
pub fn init_logger(format: LogFormat, verbose: bool) -> Result<()> {
    let registry = tracing_subscriber::registry().with(default_filter(verbose));

    let installed = match format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .json()
                    .with_current_span(true),
            )
            .try_init(),
    };

    installed.map_err(|e| Error::Config {
        message: format!("could not install the log subscriber: {}", e),
    })
}
