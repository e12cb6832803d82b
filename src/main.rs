use mimalloc::MiMalloc;

use sockudo_sentinel_watch::cli::Cli;
use sockudo_sentinel_watch::logging::init_logging;
use sockudo_sentinel_watch::sentinel_main::start_watch;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::load_config().unwrap_or_else(|e| {
        eprintln!("Error loading config: {}", e);
        std::process::exit(1);
    });

    // Initialize logging from config (loglevel, logfile)
    if let Err(e) = init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
        // Fall back to env_logger
        env_logger::init();
    }

    start_watch(config).await?;
    Ok(())
}
