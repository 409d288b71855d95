//! Bounded concurrent fan-out.
//!
//! Callers that fetch many entities at once pass an explicit concurrency
//! limit so the remote API never sees more than that many requests in
//! flight from one fan-out.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

/// Runs futures with at most `limit` in flight, returning outputs in input
/// order. A `limit` of zero is treated as one.
pub async fn gather_with_concurrency<I, Fut>(limit: usize, futures: I) -> Vec<Fut::Output>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future,
{
    stream::iter(futures).buffered(limit.max(1)).collect().await
}

/// Like [`gather_with_concurrency`] but stops at the first error.
///
/// Futures still in flight when the error arrives are dropped, which
/// cancels them.
///
/// # Errors
///
/// Returns the first error produced, in input order.
pub async fn try_gather_with_concurrency<I, Fut, T, E>(limit: usize, futures: I) -> Result<Vec<T>, E>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(futures)
        .buffered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_bounded_and_ordered() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks = (0..20u64).map(|i| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // Later tasks finish first to prove output order is by input.
                tokio::time::sleep(Duration::from_millis(20 - i)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        });

        let results = gather_with_concurrency(4, tasks).await;

        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_zero_limit_still_runs() {
        let results = gather_with_concurrency(0, (0..3).map(|i| async move { i * 2 })).await;
        assert_eq!(results, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_try_gather_stops_on_error() {
        let result: Result<Vec<u32>, String> = try_gather_with_concurrency(
            2,
            (0..5u32).map(|i| async move {
                if i == 2 { Err(format!("failed {i}")) } else { Ok(i) }
            }),
        )
        .await;
        assert_eq!(result.unwrap_err(), "failed 2");

        let ok: Result<Vec<u32>, String> =
            try_gather_with_concurrency(2, (0..3u32).map(|i| async move { Ok(i) })).await;
        assert_eq!(ok.unwrap(), vec![0, 1, 2]);
    }
}
