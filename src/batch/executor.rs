//! Batch executor.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Outcome of a fan-out. Failures are kept in completion order.
#[derive(Debug, Clone)]
pub struct BatchResult<T, E> {
    pub successes: Vec<(usize, T)>,
    pub failures: Vec<(usize, E)>,
}

impl<T, E> BatchResult<T, E> {
    pub fn new() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
    pub fn add_success(&mut self, i: usize, r: T) {
        self.successes.push((i, r));
    }
    pub fn add_failure(&mut self, i: usize, e: E) {
        self.failures.push((i, e));
    }
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
    pub fn success_count(&self) -> usize {
        self.successes.len()
    }
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// The first failure to complete, discarding the rest.
    pub fn into_first_error(self) -> Option<E> {
        self.failures.into_iter().next().map(|(_, e)| e)
    }
}

impl<T, E> Default for BatchResult<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one future per item, all in flight at once, and waits for all of them.
///
/// There is no short-circuit: a failing item never stops the others, so
/// every item reports its own outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchExecutor;

impl BatchExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute_concurrent<I, T, E, F, Fut>(
        &self,
        items: Vec<I>,
        executor_fn: F,
    ) -> BatchResult<T, E>
    where
        F: Fn(usize, I) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let limit = items.len().max(1);

        let mut completions = stream::iter(items.into_iter().enumerate().map(|(i, item)| {
            let fut = executor_fn(i, item);
            async move { (i, fut.await) }
        }))
        .buffer_unordered(limit);

        let mut result = BatchResult::new();
        while let Some((i, outcome)) = completions.next().await {
            match outcome {
                Ok(r) => result.add_success(i, r),
                Err(e) => result.add_failure(i, e),
            }
        }
        result
    }
}
