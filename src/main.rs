use es_bulk_relay::{Relay, RelayConfig};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn fatal(msg: &str, error: &dyn std::fmt::Display) -> ! {
    error!(%error, "{msg}");
    std::process::exit(1);
}

fn setup_logging() {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let level = std::env::var("ES_BULK_RELAY_LOG_LEVEL")
        .ok()
        .and_then(|val| {
            val.parse::<LevelFilter>().ok().or_else(|| {
                eprintln!("invalid ES_BULK_RELAY_LOG_LEVEL: {val:?}, defaulting to WARN");
                None
            })
        })
        .unwrap_or(LevelFilter::WARN);

    tracing_subscriber::registry()
        .with(level)
        .with(tracing_microjson::JsonLayer::new(std::io::stderr).with_target(true))
        .init();
}

#[tokio::main]
async fn main() {
    setup_logging();

    let config = RelayConfig::from_env().unwrap_or_else(|e| fatal("config error", &e));
    let relay = Relay::from_config(config).unwrap_or_else(|e| fatal("failed to set up bulk client", &e));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            signal_cancel.cancel();
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = relay.run(stdin, cancel).await {
        fatal("failed to read input", &e);
    }
}
