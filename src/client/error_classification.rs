//! Error classification logic

use crate::Error;
use tonic::Code;

/// Status codes the OTLP response-handling rules mark as retryable.
///
/// See <https://github.com/open-telemetry/opentelemetry-specification/blob/main/specification/protocol/otlp.md#failures>.
/// The transport retry policy uses the same set, so both layers agree.
pub const RETRYABLE_CODES: [Code; 7] = [
    Code::Cancelled,
    Code::DeadlineExceeded,
    Code::ResourceExhausted,
    Code::Aborted,
    Code::OutOfRange,
    Code::Unavailable,
    Code::DataLoss,
];

/// Whether a gRPC status code is in the retryable set.
pub fn is_retryable_code(code: Code) -> bool {
    RETRYABLE_CODES.contains(&code)
}

/// Classify an error as recoverable (worth retrying with a fresh context) or fatal.
///
/// - Context cancellation and deadline expiry are recoverable
/// - Anything that is not a gRPC status is treated as fatal
/// - Status errors are recoverable iff their code is in [`RETRYABLE_CODES`]
pub fn is_recoverable(err: &Error) -> bool {
    match err {
        Error::Cancelled | Error::DeadlineExceeded => true,
        Error::Status(status) => is_retryable_code(status.code()),
        _ => false,
    }
}
