//! Bounded fan-out of per-shard requests.
//!
//! Keeps at most `max_concurrent` calls in flight and hands results back in
//! input order, whatever order they complete in.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;

use crate::error::Result;

/// Run `call` once per shard, at most `max_concurrent` at a time.
///
/// The returned vector lines up with `shards`. The first call that returns
/// `Err` aborts the fan-out; calls still in flight are dropped.
///
/// # Example
///
/// ```ignore
/// let responses = fan_out(&shard_ids, |shard| db.call_shard(shard, &token, &request), 24).await?;
/// ```
pub async fn fan_out<'a, T, F, Fut>(
    shards: &'a [String],
    call: F,
    max_concurrent: usize,
) -> Result<Vec<T>>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if shards.is_empty() {
        return Ok(Vec::new());
    }

    let width = max_concurrent.max(1);
    debug!(
        "Fanning out to {} shards with max {} concurrent",
        shards.len(),
        width
    );

    let make_future = move |index: usize| {
        let fut = call(shards[index].as_str());
        async move { (index, fut.await) }
    };

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(shards.len()).collect();
    let mut in_flight = FuturesUnordered::new();
    let mut pending = 0..shards.len();

    // Seed initial batch up to the width
    for index in pending.by_ref().take(width) {
        in_flight.push(make_future(index));
    }

    // Refill as calls complete to keep the width saturated
    while let Some((index, result)) = in_flight.next().await {
        slots[index] = Some(result?);
        debug!("Shard {} answered", shards[index]);

        if let Some(next) = pending.next() {
            in_flight.push(make_future(next));
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shards(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("s{}", i)).collect()
    }

    #[tokio::test]
    async fn test_fan_out_empty() {
        let result: Result<Vec<String>> =
            fan_out(&[], |shard| async move { Ok(shard.to_string()) }, 4).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_preserves_input_order() {
        let ids = shards(4);
        // Later shards answer first
        let result = fan_out(
            &ids,
            |shard| async move {
                let n: u64 = shard[1..].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(50 - n * 10)).await;
                Ok(format!("{}-done", shard))
            },
            4,
        )
        .await
        .unwrap();

        assert_eq!(result, vec!["s1-done", "s2-done", "s3-done", "s4-done"]);
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency() {
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_observed = Arc::new(AtomicUsize::new(0));
        let ids = shards(6);

        let result = fan_out(
            &ids,
            |shard| {
                let concurrent = concurrent.clone();
                let max_observed = max_observed.clone();
                async move {
                    let current = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    max_observed.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                    Ok(shard.len())
                }
            },
            2,
        )
        .await;

        assert_eq!(result.unwrap().len(), 6);
        assert!(max_observed.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_fan_out_zero_width_still_runs() {
        let ids = shards(3);
        let result = fan_out(&ids, |shard| async move { Ok(shard.to_string()) }, 0)
            .await
            .unwrap();
        assert_eq!(result, ids);
    }

    #[tokio::test]
    async fn test_fan_out_propagates_errors() {
        let ids = shards(3);
        let result: Result<Vec<String>> = fan_out(
            &ids,
            |shard| async move {
                if shard == "s2" {
                    Err(crate::error::ApiError::HttpRequest("connection reset".to_string()).into())
                } else {
                    Ok(shard.to_string())
                }
            },
            3,
        )
        .await;

        assert!(result.is_err());
    }
}
