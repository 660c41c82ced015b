//! Periodic execution of the news and alert cycles.
//!
//! Each cycle has its own loop with its own next-run instant, so a slow news
//! cycle never delays alert polling (both loops are driven concurrently on
//! the same task and yield to each other at every await). A failing cycle is
//! logged and tried again at its next slot.

use crate::alerts::{AlertFeed, AlertTracker};
use crate::error::Result;
use crate::http::FetchPage;
use crate::news::NewsCycle;
use crate::telegram::Notifier;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error};

/// Run `cycle` now and then every `interval`, measured from the start of
/// the previous run. Never returns.
pub async fn run_every<C, Fut, T>(name: &'static str, interval: Duration, mut cycle: C)
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut next_run = Instant::now();
    loop {
        sleep_until(next_run).await;
        let started = Instant::now();

        if let Err(e) = cycle().await {
            error!(cycle = name, error = %e, "Cycle failed; retrying on schedule");
        }

        next_run = started + interval;
        debug!(
            cycle = name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            wait_ms = next_run.saturating_duration_since(Instant::now()).as_millis() as u64,
            "Cycle done"
        );
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub news_interval: Duration,
    pub alerts_interval: Duration,
}

impl Scheduler {
    /// Drive both cycles until the surrounding task is dropped. Without a
    /// tracker only the news loop runs.
    pub async fn run<F, N, A>(
        &self,
        news: &NewsCycle<'_, F, N>,
        alerts: Option<&AlertTracker<'_, A, N>>,
    ) where
        F: FetchPage,
        N: Notifier,
        A: AlertFeed,
    {
        let news_loop = run_every("news", self.news_interval, move || news.run());
        let alerts_loop = async {
            match alerts {
                Some(tracker) => run_every("alerts", self.alerts_interval, move || tracker.run()).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::join!(news_loop, alerts_loop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_failing_cycle_keeps_running() {
        let runs = Cell::new(0u32);
        let looped = run_every("test", Duration::from_millis(10), || {
            runs.set(runs.get() + 1);
            async { Err::<(), _>(Error::Config("boom".into())) }
        });

        let _ = tokio::time::timeout(Duration::from_millis(200), looped).await;
        assert!(runs.get() >= 3, "ran {} times", runs.get());
    }

    #[tokio::test]
    async fn test_first_run_is_immediate() {
        let runs = Cell::new(0u32);
        let looped = run_every("test", Duration::from_secs(3600), || {
            runs.set(runs.get() + 1);
            async { Ok::<(), Error>(()) }
        });

        let _ = tokio::time::timeout(Duration::from_millis(50), looped).await;
        assert_eq!(runs.get(), 1);
    }

    #[tokio::test]
    async fn test_loops_are_independent() {
        let slow = Cell::new(0u32);
        let fast = Cell::new(0u32);
        let slow_loop = run_every("slow", Duration::from_secs(3600), || {
            slow.set(slow.get() + 1);
            async { Ok::<(), Error>(()) }
        });
        let fast_loop = run_every("fast", Duration::from_millis(10), || {
            fast.set(fast.get() + 1);
            async { Ok::<(), Error>(()) }
        });

        let both = async {
            tokio::join!(slow_loop, fast_loop);
        };
        let _ = tokio::time::timeout(Duration::from_millis(200), both).await;
        assert_eq!(slow.get(), 1);
        assert!(fast.get() >= 3);
    }
}
