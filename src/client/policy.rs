use crate::client::error_classification::RETRYABLE_CODES;
use crate::context::CallContext;
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tonic::Code;
use tracing::debug;

/// Full method path of the metrics Export RPC.
pub const METRICS_EXPORT_METHOD: &str =
    "/opentelemetry.proto.collector.metrics.v1.MetricsService/Export";

/// Full method path of the sibling trace Export RPC (shares the policy).
pub const TRACE_EXPORT_METHOD: &str =
    "/opentelemetry.proto.collector.trace.v1.TraceService/Export";

/// Service-level retry policy applied by the transport to a single call.
///
/// This is the inner retry layer: it retries one Export on the retryable
/// status codes with exponential backoff. The liveness probe loop sits on top
/// of it and is counted separately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: u32,
    pub retryable_codes: Vec<Code>,
    pub methods: Vec<&'static str>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2,
            retryable_codes: RETRYABLE_CODES.to_vec(),
            methods: vec![METRICS_EXPORT_METHOD, TRACE_EXPORT_METHOD],
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries (one attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn applies_to(&self, method: &str) -> bool {
        self.methods.iter().any(|m| *m == method)
    }

    pub fn is_retryable(&self, code: Code) -> bool {
        self.retryable_codes.contains(&code)
    }

    /// Delay before retry number `attempt` (0-based: the wait after the first failure is `backoff(0)`).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as u64;
        let cap = self.max_backoff.as_millis() as u64;
        let factor = (self.backoff_multiplier as u64)
            .checked_pow(attempt)
            .unwrap_or(u64::MAX);
        Duration::from_millis(base.saturating_mul(factor).min(cap))
    }

    /// Run `call` under this policy for `method`, bounded by `ctx`.
    ///
    /// Only status errors with a retryable code are retried; the final error
    /// is returned unchanged. Backoff sleeps end early when the context does.
    pub async fn execute<T, F, Fut>(
        &self,
        ctx: &CallContext,
        method: &str,
        mut call: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, tonic::Status>>,
    {
        let max_attempts = if self.applies_to(method) {
            self.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 0;
        loop {
            let pending = call();
            let status = match ctx.run(async { pending.await.map_err(Error::from) }).await {
                Ok(value) => return Ok(value),
                Err(Error::Status(status)) => status,
                Err(other) => return Err(other),
            };
            attempt += 1;
            if attempt >= max_attempts || !self.is_retryable(status.code()) {
                return Err(Error::Status(status));
            }
            let delay = self.backoff(attempt - 1);
            debug!(
                method,
                attempt,
                code = ?status.code(),
                delay_ms = delay.as_millis() as u64,
                "retrying export call"
            );
            ctx.sleep(delay).await?;
        }
    }
}
