//! miru engine - main entry point.

use std::sync::Arc;

use miru::store::SqliteStore;
use miru::watcher::Watcher;
use miru::Config;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    miru::observability::init_tracing(&config.observability);

    let store = SqliteStore::connect(&config.database).await?;
    store.migrate().await?;
    tracing::info!("store ready at {}", config.database.url);

    let (watcher, mut diagnostics) = Watcher::new(Arc::new(store), config.watcher);
    let supervisor = watcher.start();

    // Surface engine diagnostics into the log stream.
    let reporter = tokio::spawn(async move {
        while let Some(diagnostic) = diagnostics.recv().await {
            match diagnostic.monitor {
                Some(id) => {
                    tracing::warn!("monitor_diagnostic: monitor={}, error={}", id, diagnostic.error)
                }
                None => tracing::warn!("engine_diagnostic: error={}", diagnostic.error),
            }
        }
    });

    tracing::info!("miru engine running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    watcher.shutdown();
    supervisor.await?;
    drop(watcher); // releases the diagnostics sender so the reporter ends
    reporter.await?;

    Ok(())
}
