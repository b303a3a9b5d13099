//! Parallel aggregation of independent branches
//!
//! Every branch is started together and awaited to completion; nothing is
//! cancelled when a sibling fails. Results come back in input order no matter
//! which branch finished first, and the first failure in input order is
//! reported together with the name of its branch.

use crate::domain::{DistributorError, Result};
use futures::future::{join_all, BoxFuture};
use std::fmt;

/// A failed branch and the error it produced
#[derive(Debug)]
pub struct BranchFailure<N> {
    pub branch: N,
    pub error: DistributorError,
}

impl<N: fmt::Display> fmt::Display for BranchFailure<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch '{}' failed: {}", self.branch, self.error)
    }
}

/// One named unit of concurrent work
pub type Branch<'a, N, T> = (N, BoxFuture<'a, Result<T>>);

/// Run homogeneous branches concurrently
///
/// # Example
///
/// ```rust
/// use cohort_distributor::core::parallel::gather;
/// use futures::FutureExt;
///
/// # async fn example() {
/// let results = gather(vec![
///     ("first", async { Ok(1) }.boxed()),
///     ("second", async { Ok(2) }.boxed()),
/// ])
/// .await
/// .unwrap();
/// assert_eq!(results, vec![1, 2]);
/// # }
/// ```
pub async fn gather<'a, N, T>(branches: Vec<Branch<'a, N, T>>) -> std::result::Result<Vec<T>, BranchFailure<N>> {
    let (names, futures): (Vec<N>, Vec<_>) = branches.into_iter().unzip();
    let outcomes = join_all(futures).await;

    let mut results = Vec::with_capacity(outcomes.len());
    let mut first_failure = None;

    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            Ok(value) => results.push(value),
            Err(error) => {
                if first_failure.is_none() {
                    first_failure = Some(BranchFailure {
                        branch: name,
                        error,
                    });
                } else {
                    tracing::debug!(error = %error, "Additional branch failure suppressed");
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(results),
    }
}

/// Run two heterogeneous branches concurrently
///
/// Same contract as [`gather`]: both branches complete, a failure of the
/// first takes precedence over a failure of the second.
pub async fn gather2<N, A, B, FA, FB>(
    (name_a, fut_a): (N, FA),
    (name_b, fut_b): (N, FB),
) -> std::result::Result<(A, B), BranchFailure<N>>
where
    FA: std::future::Future<Output = Result<A>>,
    FB: std::future::Future<Output = Result<B>>,
{
    let (a, b) = tokio::join!(fut_a, fut_b);

    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(error), other) => {
            if let Err(suppressed) = other {
                tracing::debug!(error = %suppressed, "Additional branch failure suppressed");
            }
            Err(BranchFailure {
                branch: name_a,
                error,
            })
        }
        (Ok(_), Err(error)) => Err(BranchFailure {
            branch: name_b,
            error,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_follows_input_not_completion() {
        let results = gather(vec![
            (
                "slow",
                async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok("slow")
                }
                .boxed(),
            ),
            ("fast", async { Ok("fast") }.boxed()),
        ])
        .await
        .unwrap();

        assert_eq!(results, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicU32::new(0));
        let f = finished.clone();

        let result = gather(vec![
            (
                "failing",
                async { Err::<u32, _>(DistributorError::Other("boom".to_string())) }.boxed(),
            ),
            (
                "slow",
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                }
                .boxed(),
            ),
        ])
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.branch, "failing");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_failure_in_input_order() {
        let result = gather(vec![
            (
                "a",
                async {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err::<(), _>(DistributorError::Other("a".to_string()))
                }
                .boxed(),
            ),
            (
                "b",
                async { Err::<(), _>(DistributorError::Other("b".to_string())) }.boxed(),
            ),
        ])
        .await;

        assert_eq!(result.unwrap_err().branch, "a");
    }

    #[tokio::test]
    async fn test_gather2_heterogeneous() {
        let (n, s) = gather2(("number", async { Ok(5u8) }), ("text", async { Ok("x") }))
            .await
            .unwrap();
        assert_eq!((n, s), (5, "x"));

        let failure = gather2(
            ("number", async { Ok(5u8) }),
            ("text", async {
                Err::<&str, _>(DistributorError::NotFound("x".to_string()))
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(failure.branch, "text");
    }

    #[tokio::test]
    async fn test_empty_gather() {
        let results: Vec<u8> = gather::<&str, u8>(Vec::new()).await.unwrap();
        assert!(results.is_empty());
    }
}
