//! Bounded worker pool that streams items from an input iterable through a
//! worker function, yielding results in completion order rather than input
//! order.

use std::future::Future;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Runs `f` over each item produced by `input` with at most `workers` tasks
/// actually running `f` concurrently, yielding results as they complete.
///
/// Up to `⌈1.5 × workers⌉` items are pulled from `input` and spawned ahead of
/// that limit, but a `Semaphore` of size `workers` gates how many of those
/// spawned tasks run `f` at once — the rest sit parked on the permit. This
/// keeps the *submitted* set a bit ahead of the *running* set so that, as
/// long as the input produces items at least as fast as workers finish,
/// every worker always has its next task ready the moment a permit frees up
/// — the 1.5 factor exists specifically so a producer that itself performs
/// I/O (e.g. a paginated query) never leaves a worker idle waiting on it.
pub fn concurrent_map<S, T, F, Fut, R>(input: S, workers: usize, f: F) -> impl Stream<Item = R>
where
    S: Stream<Item = T> + Unpin + Send + 'static,
    T: Send + 'static,
    F: Fn(T) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let target = ((workers as f64) * 1.5).ceil() as usize;
    let semaphore = Arc::new(Semaphore::new(workers));

    async_stream::stream! {
        let mut input = input;
        let mut tasks: JoinSet<R> = JoinSet::new();

        let spawn_one = |tasks: &mut JoinSet<R>, f: F, semaphore: Arc<Semaphore>, item: T| {
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                f(item).await
            });
        };

        while tasks.len() < target {
            match input.next().await {
                Some(item) => spawn_one(&mut tasks, f.clone(), semaphore.clone(), item),
                None => break,
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => yield result,
                Err(join_err) => {
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                    // Task was cancelled (aborted); nothing to yield for it.
                }
            }

            while tasks.len() < target {
                match input.next().await {
                    Some(item) => spawn_one(&mut tasks, f.clone(), semaphore.clone(), item),
                    None => break,
                }
            }
        }
    }
}
