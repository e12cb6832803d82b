//! Watcher Startup
//!
//! Entry point and initialization for the sentinel fleet watcher.

use std::sync::Arc;

use crate::error::Result;
use crate::sentinel::config::WatchConfig;
use crate::sentinel::manager::SentinelManager;
use crate::sentinel::network::TcpDialer;

/// Run the watcher until Ctrl-C
pub async fn start_watch(config: WatchConfig) -> Result<()> {
    log::info!(
        "Starting sentinel watcher: {} sentinels, {} masters seeded",
        config.sentinels.len(),
        config.masters.len()
    );

    let dialer = Arc::new(TcpDialer::new(config.tcp_settings()));
    let manager = SentinelManager::new(dialer, config.checker_settings(), config.retry_policy());

    for master in &config.masters {
        log::info!(
            "Seeding master '{}' at {}:{}",
            master.name,
            master.ip,
            master.port
        );
        manager.seed_master(&master.name, master.addr());
    }

    let Some(processor) = manager.start() else {
        return Ok(());
    };

    for sentinel in &config.sentinels {
        manager.add_sentinel(sentinel.clone());
    }

    // Report the master table whenever a failover lands
    let mut topology = manager.watch_topology();
    let reporter = tokio::spawn(async move {
        while topology.changed().await.is_ok() {
            let state = topology.borrow_and_update().clone();
            for (name, master) in &state.masters {
                log::info!(
                    "Master '{}' at {} (switches: {})",
                    name,
                    master.addr,
                    master.switch_count
                );
            }
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => log::info!("Shutdown signal received"),
                Err(e) => log::warn!("Failed to listen for shutdown signal: {}", e),
            }
        }
        _ = processor => {
            log::warn!("Event processing stopped unexpectedly");
        }
    }

    manager.shutdown();
    reporter.abort();

    let state = manager.topology().await;
    log::info!(
        "Sentinel watcher shutting down ({} of {} sentinels alive)",
        state.alive_sentinels(),
        state.sentinels.len()
    );
    Ok(())
}
