use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;

use xmly_store::app::App;
use xmly_store::{CatalogApi, HttpCatalogClient, StoreHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = xmly_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("xmly.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; suppress connection-level DEBUG from the HTTP
    // client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("xmly log: {}", log_path.display());

    tracing::info!("xmly starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match xmly_proto::config::Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config unreadable, using defaults: {}", e);
            xmly_proto::config::Config::default()
        }
    };

    // ── Catalog service ──────────────────────────────────────────────────────
    let client = HttpCatalogClient::new(
        config.server.base_url(),
        Duration::from_secs(config.server.timeout_secs),
    )?;

    // The service must already be running; refuse to start without it.
    match client.hello().await {
        Ok(message) => tracing::info!("catalog service at {} says {:?}", client.base_url(), message),
        Err(e) => {
            tracing::error!("catalog service at {} unreachable: {}", client.base_url(), e);
            anyhow::bail!("catalog service at {} is not reachable: {}", client.base_url(), e);
        }
    }

    // ── Store + console ──────────────────────────────────────────────────────
    let store = StoreHandle::spawn(
        Arc::new(client),
        config.paging,
        config.paths.downloads_dir.clone(),
    );

    let app = App::new(store.clone());
    app.run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    store.shutdown().await;
    Ok(())
}
