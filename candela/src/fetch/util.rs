use futures::{Stream, StreamExt};
use tokio::time::Instant;

use candela_core::types::{CandelaError, Capability};

/// Pull the next completed item off `stream`, giving up at `deadline`.
///
/// Returns `None` both when the stream is exhausted and when the deadline
/// expires; callers that need to distinguish the two check the deadline
/// afterwards. In-flight futures are dropped with the stream, so an expired
/// deadline abandons work rather than waiting it out.
pub(crate) async fn next_before_deadline<S>(
    stream: &mut S,
    deadline: Option<Instant>,
) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match deadline {
        Some(d) => match tokio::time::timeout_at(d, stream.next()).await {
            Ok(item) => item,
            Err(_) => None,
        },
        None => stream.next().await,
    }
}

/// Collapse a set of tier errors into a uniform `CandelaError` outcome.
///
/// Rules:
/// - If `attempted_any` is false → `Unsupported(capability)`.
/// - If `not_found_what` is `Some` and all errors are `NotFound` → `NotFound(what)`.
/// - Else → `AllSourcesFailed(errors)`, even when `errors` is empty (every
///   tier was consulted and produced nothing).
pub fn collapse_errors(
    capability: Capability,
    attempted_any: bool,
    errors: Vec<CandelaError>,
    not_found_what: Option<String>,
) -> CandelaError {
    if !attempted_any {
        return CandelaError::unsupported(capability.as_str());
    }
    if let Some(what) = not_found_what
        && !errors.is_empty()
        && errors
            .iter()
            .all(|e| matches!(e, CandelaError::NotFound { .. }))
    {
        return CandelaError::not_found(what);
    }
    CandelaError::AllSourcesFailed(errors)
}
