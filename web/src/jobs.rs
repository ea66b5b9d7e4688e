//! Background sweeps.
//!
//! Two periodic jobs run next to the HTTP server:
//!
//! - the waitlist expiry sweep, which lapses unanswered offers and passes
//!   the slot to the next waiting user;
//! - the open-match incompleteness sweep, which cancels matches that are
//!   still short of players inside the auto-cancel lead time.
//!
//! Each sweep is idempotent, so a missed or doubled tick is harmless. Both
//! stop when the shutdown channel fires.

use crate::config::SweepConfig;
use courtside_core::{BookingError, Courtside};
use std::future::Future;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Spawn both sweeps. Returns their handles, empty when sweeps are disabled.
#[must_use]
pub fn spawn_sweeps(
    service: &Courtside,
    config: &SweepConfig,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        info!("Background sweeps disabled");
        return Vec::new();
    }

    let waitlist = service.clone();
    let matches = service.clone();
    vec![
        spawn_periodic(
            "waitlist_expiry",
            config.waitlist_interval,
            shutdown.subscribe(),
            move || {
                let service = waitlist.clone();
                async move { service.sweep_expired_notifications().await }
            },
        ),
        spawn_periodic(
            "incomplete_matches",
            config.match_interval,
            shutdown.subscribe(),
            move || {
                let service = matches.clone();
                async move { service.sweep_incomplete_matches().await }
            },
        ),
    ]
}

/// Run `tick` every `period` until `shutdown` fires.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<usize, BookingError>> + Send,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = name, period_secs = period.as_secs(), "Sweep started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => match tick().await {
                    Ok(0) => debug!(job = name, "Sweep found nothing to do"),
                    Ok(processed) => info!(job = name, processed, "Sweep completed"),
                    Err(e) => {
                        metrics::counter!("courtside.sweeps.failed", "job" => name).increment(1);
                        warn!(job = name, error = %e, "Sweep failed");
                    }
                },
            }
        }

        info!(job = name, "Sweep stopped");
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn periodic_job_ticks_until_shutdown() {
        let (shutdown, _) = broadcast::channel(1);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let handle = spawn_periodic("test", Duration::from_secs(10), shutdown.subscribe(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            }
        });

        // First tick fires immediately, then every 10 seconds.
        tokio::time::sleep(Duration::from_secs(25)).await;
        shutdown.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_job() {
        let (shutdown, _) = broadcast::channel(1);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let handle = spawn_periodic("failing", Duration::from_secs(1), shutdown.subscribe(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(BookingError::conflict("busy"))
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        shutdown.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
