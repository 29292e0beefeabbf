mod app;
mod auth;
mod config;
mod error;
mod gmail;
mod inspector;
mod models;
mod pipeline;
mod responder;
mod scanner;
mod scheduler;
#[cfg(test)]
mod testing;

use crate::app::AutoReplier;
use crate::config::Config;
use crate::scheduler::Scheduler;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{Level, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let debug_logging = std::env::args().any(|arg| arg == "--debug");
    tracing_subscriber::fmt()
        .with_max_level(if debug_logging {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .init();

    let config = Config::load();

    // Handle token reset
    if std::env::args().any(|arg| arg == "--reset-token") {
        let authorizer = auth::Authorizer::new(&config.credentials_path, &config.token_path);
        if authorizer.reset()? {
            println!("Token cleared. Restart without --reset-token to re-authenticate.");
        } else {
            println!("No stored token at {}.", config.token_path.display());
        }
        return Ok(());
    }

    let mut replier = AutoReplier::new(&config);

    if std::env::args().any(|arg| arg == "--once") {
        let report = replier.run_once().await?;
        info!(?report, "Single pass complete");
        return Ok(());
    }

    let mut scheduler = Scheduler::new(
        StdRng::from_entropy(),
        config.min_interval_secs,
        config.max_interval_secs,
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    };

    scheduler.run_until(&mut replier, shutdown).await;
    Ok(())
}
