//! Shared transport plumbing for both Binance connectors.
//!
//! Single-shot requests only: retry and backoff belong to the orchestrator,
//! so every call here either yields a classified `CandelaError` or a 2xx
//! response body. Classification is what makes the retry loop upstream
//! possible: 5xx and timeouts come back `Transient`, 429 carries the
//! server-provided delay, and 404 is `NotFound`.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header};

use candela_core::types::CandelaError;

/// Seconds granted to one request, headers through body, unless overridden.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn retry_after_ms(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1_000))
}

fn classify_send_error(connector: &'static str, what: &str, err: &reqwest::Error) -> CandelaError {
    if err.is_timeout() || err.is_connect() {
        CandelaError::transient(connector, format!("{what}: {err}"))
    } else {
        CandelaError::connector(connector, format!("{what}: {err}"))
    }
}

fn classify_status(
    connector: &'static str,
    what: &str,
    response: Response,
) -> Result<Response, CandelaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(CandelaError::not_found(what));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(CandelaError::RateLimited {
            retry_after_ms: retry_after_ms(&response),
        });
    }
    if status.is_server_error() {
        return Err(CandelaError::transient(
            connector,
            format!("HTTP {status} for {what}"),
        ));
    }
    Err(CandelaError::connector(
        connector,
        format!("HTTP {status} for {what}"),
    ))
}

/// Send one request under `timeout` and classify the outcome.
pub(crate) async fn send(
    request: RequestBuilder,
    timeout: Duration,
    connector: &'static str,
    what: &str,
) -> Result<Response, CandelaError> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| CandelaError::transient(connector, format!("{what}: timed out")))?
        .map_err(|err| classify_send_error(connector, what, &err))?;
    classify_status(connector, what, response)
}

/// Send one request and drain the full body.
///
/// A body that dies mid-stream is the same retryable class as a connect
/// failure, so it maps to `Transient`.
pub(crate) async fn fetch_bytes(
    request: RequestBuilder,
    timeout: Duration,
    connector: &'static str,
    what: &str,
) -> Result<Vec<u8>, CandelaError> {
    let response = send(request, timeout, connector, what).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|err| CandelaError::transient(connector, format!("{what}: body read: {err}")))?;
    Ok(bytes.to_vec())
}
