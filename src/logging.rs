use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "fofax=warn",
        1 => "fofax=info",
        2 => "fofax=debug",
        _ => "fofax=trace",
    }
}

/// Installs the stderr subscriber. `RUST_LOG` overrides `-v`. Returns false
/// when a subscriber was already installed.
pub fn init(verbosity: u8) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity >= 2)
            .with_line_number(verbosity >= 3),
    );

    if subscriber.try_init().is_err() {
        return false;
    }

    tracing::debug!(verbosity, "tracing initialized");
    true
}
