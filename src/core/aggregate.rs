//! # ResultAggregator: wait for every operation of a concurrent batch.
//!
//! [`when_all`] drives N independent fallible futures concurrently and never
//! short-circuits: it waits until every one has settled, then either returns all
//! values or a single [`AggregateError`] listing every failure.

use std::future::Future;

use futures::future::join_all;

use crate::error::{AggregateError, BoxError};

/// Awaits all `ops`; succeeds only if every one succeeded.
///
/// Values are returned in input order. Nested [`AggregateError`]s among the failures
/// are flattened.
///
/// # Example
/// ```rust
/// use seedvisor::when_all;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ops = (1..=3).map(|n| async move {
///     if n == 2 { Err(format!("op {n} failed")) } else { Ok(n) }
/// });
/// let err = when_all(ops).await.unwrap_err();
/// assert_eq!(err.len(), 1);
/// # }
/// ```
pub async fn when_all<I, Fut, T, E>(ops: I) -> Result<Vec<T>, AggregateError>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    let settled = join_all(ops).await;

    let mut values = Vec::with_capacity(settled.len());
    let mut errors: Vec<BoxError> = Vec::new();
    for res in settled {
        match res {
            Ok(v) => values.push(v),
            Err(e) => errors.push(e.into()),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(AggregateError::new(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time;

    #[tokio::test(start_paused = true)]
    async fn waits_for_all_and_collects_every_failure() {
        let settled = Arc::new(AtomicUsize::new(0));
        let ops = (0..5u64).map(|i| {
            let settled = Arc::clone(&settled);
            async move {
                time::sleep(Duration::from_millis(100 * (5 - i))).await;
                settled.fetch_add(1, Ordering::SeqCst);
                if i == 0 || i == 3 {
                    Err(JobError::fail(format!("op {i}")))
                } else {
                    Ok(i)
                }
            }
        });

        let err = when_all(ops).await.unwrap_err();
        assert_eq!(settled.load(Ordering::SeqCst), 5);
        assert_eq!(err.len(), 2);

        let mut messages: Vec<String> = err.errors().iter().map(|e| e.to_string()).collect();
        messages.sort();
        assert_eq!(
            messages,
            vec!["execution failed: op 0", "execution failed: op 3"]
        );
    }

    #[tokio::test]
    async fn returns_every_value_without_failures() {
        let ops = (0..5u32).map(|i| async move { Ok::<_, JobError>(i * 10) });
        let mut values = when_all(ops).await.unwrap();
        values.sort();
        assert_eq!(values, vec![0, 10, 20, 30, 40]);
    }

    #[tokio::test]
    async fn nested_aggregates_are_flattened() {
        let inner = AggregateError::new(vec![
            BoxError::from(JobError::fail("a")),
            BoxError::from(JobError::fail("b")),
        ]);
        let ops: Vec<std::pin::Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>> = vec![
            Box::pin(async move { Err(BoxError::from(inner)) }),
            Box::pin(async { Err(BoxError::from(JobError::fail("c"))) }),
            Box::pin(async { Ok(()) }),
        ];
        let err = when_all(ops).await.unwrap_err();
        assert_eq!(err.len(), 3);
    }
}
