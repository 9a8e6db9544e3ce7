//! Bounded-concurrency fan-out over tokio tasks.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{EngineError, EngineResult};

/// Run `f` over `items` with at most `parallelism` futures in flight and
/// return their outputs in input order.
///
/// Fails only if a task panics or is cancelled; the outputs themselves are
/// returned as produced.
pub(crate) async fn bounded<I, T, F, Fut>(parallelism: usize, items: Vec<I>, f: F) -> EngineResult<Vec<T>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));
    let total = items.len();
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        let fut = f(item);
        tasks.spawn(async move {
            let _permit = permit;
            (index, fut.await)
        });
    }

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, value) = joined.map_err(|e| EngineError::Internal(format!("fan-out task failed: {e}")))?;
        slots[index] = Some(value);
    }
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn preserves_input_order() {
        let out = bounded(3, (0..20u64).collect(), |n| async move {
            tokio::time::sleep(Duration::from_millis(20 - n)).await;
            n * 2
        })
        .await
        .unwrap();
        assert_eq!(out, (0..20u64).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_parallelism() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        bounded(4, (0..32).collect::<Vec<u32>>(), |_| {
            let active = active.clone();
            let peak = peak.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        })
        .await
        .unwrap();
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn empty_input() {
        let out: Vec<u8> = bounded(2, Vec::<u8>::new(), |n| async move { n }).await.unwrap();
        assert!(out.is_empty());
    }
}
