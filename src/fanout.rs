use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::cli::ModelArgs;

#[derive(Debug, Clone, Copy)]
pub struct PoolLimits {
    pub concurrency: usize,
    pub timeout: Duration,
    pub retries: usize,
}

impl PoolLimits {
    pub fn from_args(args: &ModelArgs) -> Self {
        Self {
            concurrency: args.concurrency.max(1),
            timeout: Duration::from_secs(args.timeout_secs.max(1)),
            retries: args.retries,
        }
    }
}

/// Runs `work` once per unit with at most `limits.concurrency` in flight.
///
/// Each attempt is bounded by `limits.timeout`; a failed attempt is retried up
/// to `limits.retries` times. Results come back in unit order, whatever the
/// completion order was. A unit failure never aborts the others; only a
/// panicked task does.
pub async fn run_all<U, T, F, Fut>(
    label: &'static str,
    units: Vec<U>,
    limits: PoolLimits,
    work: F,
) -> anyhow::Result<Vec<anyhow::Result<T>>>
where
    U: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(U) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let total = units.len();
    let concurrency = limits.concurrency.max(1).min(total.max(1));
    tracing::info!(
        task = label,
        units = total,
        concurrency = concurrency,
        timeout_secs = limits.timeout.as_secs(),
        retries = limits.retries,
        "dispatching model calls"
    );

    let work = Arc::new(work);
    let mut join_set = tokio::task::JoinSet::new();
    let mut pending = units.into_iter().enumerate();
    let mut results: Vec<Option<anyhow::Result<T>>> = (0..total).map(|_| None).collect();
    let mut done = 0usize;
    let mut failed = 0usize;
    let started_at = Instant::now();
    let mut last_progress_log_at = started_at;

    loop {
        while join_set.len() < concurrency {
            let Some((index, unit)) = pending.next() else {
                break;
            };
            let work = Arc::clone(&work);
            join_set.spawn(async move {
                let outcome =
                    attempt_with_retries(label, index, unit, limits, work.as_ref()).await;
                (index, outcome)
            });
        }

        let Some(joined) = join_set.join_next().await else {
            break;
        };
        let (index, outcome) = joined.with_context(|| format!("join {label} task"))?;
        if outcome.is_err() {
            failed += 1;
        }
        results[index] = Some(outcome);

        done += 1;
        if done == total || last_progress_log_at.elapsed() >= Duration::from_secs(2) {
            tracing::info!(
                task = label,
                done = done,
                total = total,
                failed = failed,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "progress"
            );
            last_progress_log_at = Instant::now();
        }
    }

    results
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            item.ok_or_else(|| anyhow::anyhow!("missing {label} result for unit {idx}"))
        })
        .collect()
}

async fn attempt_with_retries<U, T, F, Fut>(
    label: &'static str,
    index: usize,
    unit: U,
    limits: PoolLimits,
    work: &F,
) -> anyhow::Result<T>
where
    U: Clone,
    F: Fn(U) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let attempts = limits.retries.saturating_add(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        let err = match tokio::time::timeout(limits.timeout, work(unit.clone())).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => anyhow::anyhow!("timed out after {}s", limits.timeout.as_secs()),
        };
        if attempt >= attempts {
            return Err(err.context(format!("attempt {attempt}/{attempts}")));
        }
        tracing::warn!(
            task = label,
            unit = index,
            attempt = attempt,
            attempts = attempts,
            error = %format!("{err:#}"),
            "model call failed; retrying"
        );
    }
}
