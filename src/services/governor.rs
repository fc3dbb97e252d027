/// Outbound request governor
///
/// Serializes calls to the rate-limited upstream catalog: one item in flight,
/// FIFO order, a minimum gap between dispatches, and exponential backoff when
/// the upstream answers with a rate-limit signal. It never logs; outcomes are
/// handed back to the caller through the future returned by `enqueue`.
use std::{future::Future, pin::Pin, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::Instant,
};

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernorConfig {
    /// Gap between the end of one dispatch and the start of the next
    pub min_spacing: Duration,
    /// Retry budget used by `enqueue_default`
    pub max_retries: u32,
    /// Wait before the first retry; doubles on every further retry
    pub backoff_base: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_millis(350),
            max_retries: 3,
            backoff_base: Duration::from_millis(1000),
        }
    }
}

impl From<&Config> for GovernorConfig {
    fn from(config: &Config) -> Self {
        Self {
            min_spacing: Duration::from_millis(config.governor_min_spacing_ms),
            max_retries: config.governor_max_retries,
            backoff_base: Duration::from_millis(config.governor_backoff_base_ms),
        }
    }
}

/// Cloneable front of the dispatch task. All clones feed the same queue.
#[derive(Clone)]
pub struct RequestGovernor {
    config: GovernorConfig,
    jobs_tx: mpsc::UnboundedSender<Job>,
}

/// Handle for gracefully shutting down the dispatch task. Dropping it
/// leaves the task running for as long as any `RequestGovernor` exists.
#[must_use = "keep the handle to drain queued requests on shutdown"]
pub struct GovernorHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl GovernorHandle {
    /// Stops accepting work, runs everything already queued, then waits for
    /// the dispatch task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

impl RequestGovernor {
    /// Spawns the dispatch task. Must be called inside a tokio runtime.
    pub fn new(config: GovernorConfig) -> (Self, GovernorHandle) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let min_spacing = config.min_spacing;
        let task = tokio::spawn(async move {
            Self::dispatch_task(min_spacing, jobs_rx, shutdown_rx).await;
        });

        (
            Self { config, jobs_tx },
            GovernorHandle { shutdown_tx, task },
        )
    }

    pub fn config(&self) -> GovernorConfig {
        self.config
    }

    /// Queues `work` and returns a future that settles once it succeeds, fails
    /// with anything other than a rate limit, or runs out of retries.
    ///
    /// The item is queued as soon as this is called, not when the returned
    /// future is first polled.
    pub fn enqueue<T, F, Fut>(
        &self,
        work: F,
        max_retries: u32,
    ) -> impl Future<Output = AppResult<T>> + Send + 'static
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let backoff_base = self.config.backoff_base;

        let job: Job = Box::new(move || -> Pin<Box<dyn Future<Output = ()> + Send>> {
            Box::pin(async move {
                let result = run_with_retry(work, max_retries, backoff_base).await;
                // The caller may have stopped waiting
                let _ = result_tx.send(result);
            })
        });

        // A closed queue drops the job, and with it `result_tx`
        let _ = self.jobs_tx.send(job);

        async move {
            result_rx
                .await
                .map_err(|_| AppError::Internal("Request governor is not running".to_string()))?
        }
    }

    /// `enqueue` with the configured retry budget
    pub fn enqueue_default<T, F, Fut>(
        &self,
        work: F,
    ) -> impl Future<Output = AppResult<T>> + Send + 'static
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        self.enqueue(work, self.config.max_retries)
    }

    async fn dispatch_task(
        min_spacing: Duration,
        mut jobs_rx: mpsc::UnboundedReceiver<Job>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut last_dispatch: Option<Instant> = None;

        loop {
            tokio::select! {
                Some(job) = jobs_rx.recv() => {
                    Self::dispatch(job, min_spacing, &mut last_dispatch).await;
                }
                Some(()) = shutdown_rx.recv() => {
                    jobs_rx.close();
                    while let Some(job) = jobs_rx.recv().await {
                        Self::dispatch(job, min_spacing, &mut last_dispatch).await;
                    }
                    break;
                }
                else => break,
            }
        }
    }

    async fn dispatch(job: Job, min_spacing: Duration, last_dispatch: &mut Option<Instant>) {
        if let Some(last) = *last_dispatch {
            tokio::time::sleep_until(last + min_spacing).await;
        }
        job().await;
        *last_dispatch = Some(Instant::now());
    }
}

/// Runs `work`, retrying rate-limit failures. The n-th retry waits
/// `backoff_base * 2^(n-1)`.
async fn run_with_retry<T, F, Fut>(work: F, max_retries: u32, backoff_base: Duration) -> AppResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut retries = 0u32;
    loop {
        let attempt = work();
        match attempt.await {
            Err(e) if e.is_rate_limited() && retries < max_retries => {
                retries += 1;
                let factor = 2u32.saturating_pow(retries - 1);
                tokio::time::sleep(backoff_base.saturating_mul(factor)).await;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    };

    type Log = Arc<Mutex<Vec<(u32, Instant)>>>;

    fn governor() -> (RequestGovernor, GovernorHandle) {
        RequestGovernor::new(GovernorConfig::default())
    }

    /// Work that records its start time and succeeds with `label`
    fn recorded(
        label: u32,
        log: &Log,
    ) -> impl Fn() -> Pin<Box<dyn Future<Output = AppResult<u32>> + Send>> + Send + 'static {
        let log = log.clone();
        move || -> Pin<Box<dyn Future<Output = AppResult<u32>> + Send>> {
            let log = log.clone();
            Box::pin(async move {
                log.lock().unwrap().push((label, Instant::now()));
                Ok(label)
            })
        }
    }

    /// Work that fails with a rate limit `failures` times, then succeeds
    fn flaky(
        failures: u32,
        calls: &Arc<AtomicU32>,
        log: &Log,
    ) -> impl Fn() -> Pin<Box<dyn Future<Output = AppResult<&'static str>> + Send>> + Send + 'static
    {
        let calls = calls.clone();
        let log = log.clone();
        move || -> Pin<Box<dyn Future<Output = AppResult<&'static str>> + Send>> {
            let calls = calls.clone();
            let log = log.clone();
            Box::pin(async move {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                log.lock().unwrap().push((attempt, Instant::now()));
                if attempt <= failures {
                    Err(AppError::UpstreamRateLimited("429".to_string()))
                } else {
                    Ok("done")
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatches_in_fifo_order_with_spacing() {
        let (gov, _handle) = governor();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let started = Instant::now();

        let first = gov.enqueue_default(recorded(1, &log));
        let second = gov.enqueue_default(recorded(2, &log));
        let third = gov.enqueue_default(recorded(3, &log));

        // Await out of order; dispatch order is fixed at enqueue time
        assert_eq!(third.await.unwrap(), 3);
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 2);

        let log = log.lock().unwrap();
        let labels: Vec<u32> = log.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec![1, 2, 3]);

        // First dispatch is immediate
        assert_eq!(log[0].1 - started, Duration::ZERO);
        for pair in log.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= Duration::from_millis(350));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limits_with_exponential_backoff() {
        let (gov, _handle) = governor();
        let calls = Arc::new(AtomicU32::new(0));
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let result = gov.enqueue(flaky(2, &calls, &log), 3).await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let log = log.lock().unwrap();
        assert_eq!(log[1].1 - log[0].1, Duration::from_millis(1000));
        assert_eq!(log[2].1 - log[1].1, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_budget_backoff_sequence() {
        let (gov, _handle) = governor();
        let calls = Arc::new(AtomicU32::new(0));
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let result = gov.enqueue(flaky(3, &calls, &log), 3).await;

        assert!(result.is_ok());
        let log = log.lock().unwrap();
        let gaps: Vec<Duration> = log.windows(2).map(|w| w[1].1 - w[0].1).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_returns_rate_limit_error() {
        let (gov, _handle) = governor();
        let calls = Arc::new(AtomicU32::new(0));
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let result = gov.enqueue(flaky(5, &calls, &log), 2).await;

        assert!(matches!(result, Err(AppError::UpstreamRateLimited(_))));
        // One initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let (gov, _handle) = governor();
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: AppResult<()> = gov
            .enqueue(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(AppError::UpstreamUnavailable("503".to_string())) }
                },
                3,
            )
            .await;

        assert!(matches!(result, Err(AppError::UpstreamUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_holds_the_queue() {
        let (gov, _handle) = governor();
        let calls = Arc::new(AtomicU32::new(0));
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let other: Log = Arc::new(Mutex::new(Vec::new()));

        let limited = gov.enqueue(flaky(1, &calls, &log), 3);
        let next = gov.enqueue_default(recorded(9, &other));

        limited.await.unwrap();
        next.await.unwrap();

        let retried_at = log.lock().unwrap()[1].1;
        let next_at = other.lock().unwrap()[0].1;
        assert!(next_at - retried_at >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_while_draining() {
        let (gov, _handle) = governor();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let slow_log = log.clone();
        let slow = gov.enqueue_default(move || {
            let log = slow_log.clone();
            async move {
                log.lock().unwrap().push((1, Instant::now()));
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(1u32)
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let late = gov.enqueue_default(recorded(2, &log));

        assert_eq!(slow.await.unwrap(), 1);
        assert_eq!(late.await.unwrap(), 2);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 2);
        // 100ms of work, then the minimum spacing
        assert!(log[1].1 - log[0].1 >= Duration::from_millis(450));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drains_then_rejects() {
        let (gov, handle) = governor();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let queued: Vec<_> = (1..=3)
            .map(|label| gov.enqueue_default(recorded(label, &log)))
            .collect();

        handle.shutdown().await;

        for (expected, pending) in (1..=3).zip(queued) {
            assert_eq!(pending.await.unwrap(), expected);
        }

        let after = gov.enqueue_default(recorded(4, &log)).await;
        assert!(matches!(after, Err(AppError::Internal(_))));
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_dispatching() {
        let (gov, handle) = governor();
        drop(handle);
        tokio::task::yield_now().await;

        let log: Log = Arc::new(Mutex::new(Vec::new()));
        assert_eq!(gov.enqueue_default(recorded(1, &log)).await.unwrap(), 1);
        assert_eq!(gov.enqueue_default(recorded(2, &log)).await.unwrap(), 2);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_settles_only_after_dispatch() {
        use tokio_test::{assert_pending, assert_ready_ok, task};

        let (gov, _handle) = governor();
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let mut pending = task::spawn(gov.enqueue_default(recorded(7, &log)));
        assert_pending!(pending.poll());

        // Let the dispatch task pick the item up
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert!(pending.is_woken());
        assert_eq!(assert_ready_ok!(pending.poll()), 7);
    }
}
