use disaster_pod::logging::init_tracing;
use disaster_pod::{run, Config, LogFormat, ShutdownSignals};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Text)?;
            error!(error = %e, "Can't load env");
            return Err(e.into());
        }
    };
    init_tracing(config.log_format)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting disaster pod");
    info!(config = %config.to_json(), "Current config");

    let mut signals = ShutdownSignals::install()?;
    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!(signal, "Catch signal, shutting down");
        signal_shutdown.cancel();
    });

    if let Err(e) = run(config, shutdown).await {
        error!(error = %e, "Can't run app");
        return Err(e.into());
    }

    Ok(())
}
