use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Something the scheduler runs once per tick.
#[async_trait]
pub trait PassRunner: Send {
    async fn run_pass(&mut self) -> anyhow::Result<()>;
}

/// Runs passes back to back with a random pause in between. The next pause
/// is only drawn after the previous pass has finished, so passes never overlap.
pub struct Scheduler<R> {
    rng: R,
    min_secs: u64,
    max_secs: u64,
}

impl<R: Rng + Send> Scheduler<R> {
    pub fn new(rng: R, min_secs: u64, max_secs: u64) -> Self {
        Self {
            rng,
            min_secs: min_secs.min(max_secs),
            max_secs: max_secs.max(min_secs),
        }
    }

    /// Whole seconds drawn uniformly from `[min_secs, max_secs]`.
    pub fn next_interval(&mut self) -> Duration {
        let secs = self.rng.gen_range(self.min_secs..=self.max_secs);
        Duration::from_secs(secs)
    }

    /// Loops until `shutdown` resolves. Returns the number of passes started.
    pub async fn run_until<P, F>(&mut self, runner: &mut P, shutdown: F) -> u64
    where
        P: PassRunner,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut passes = 0;

        loop {
            let interval = self.next_interval();
            info!("Next run in {} seconds.", interval.as_secs());

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }

            passes += 1;
            tokio::select! {
                _ = &mut shutdown => break,
                result = runner.run_pass() => {
                    if let Err(e) = result {
                        error!("An error occurred: {:#}", e);
                    }
                }
            }
        }

        info!(passes, "Scheduler stopped");
        passes
    }
}
