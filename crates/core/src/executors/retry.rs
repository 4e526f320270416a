//! Retry discipline around model calls.

use crate::executors::output::ParseError;
use crate::executors::ExecutorError;
use crate::models::collect_reply;
use crate::models::LanguageModel;
use crate::models::ModelRequest;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

/// Calls the model until `parse` accepts a reply.
///
/// At most `retry_limit` calls are made, with `sleep` between consecutive
/// attempts (never after the last one). An unparseable reply is retried; a
/// transport error is returned at once. A limit of zero makes no call.
pub async fn attempt_until_parsed<T, F>(
    model: &dyn LanguageModel,
    request: &ModelRequest,
    retry_limit: u32,
    sleep: Duration,
    cancel: &CancellationToken,
    parse: F,
) -> Result<T, ExecutorError>
where
    F: Fn(&str) -> Result<T, ParseError>,
{
    let mut last_error = None;

    for attempt in 1..=retry_limit {
        let reply = collect_reply(model, request, cancel).await?;
        match parse(&reply) {
            Ok(parsed) => {
                debug!(stage = %request.stage, attempt, "reply accepted");
                return Ok(parsed);
            }
            Err(error) => {
                warn!(
                    stage = %request.stage,
                    attempt,
                    retry_limit,
                    error = %error,
                    "model reply rejected"
                );
                last_error = Some(error);
            }
        }

        if attempt < retry_limit {
            pause(sleep, cancel).await?;
        }
    }

    Err(ExecutorError::RetryExhausted {
        stage: request.stage,
        attempts: retry_limit,
        last_error: last_error
            .map(|error| error.to_string())
            .unwrap_or_else(|| "retry limit is zero".to_string()),
    })
}

/// Sleeps unless the run is cancelled first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), ExecutorError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExecutorError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
