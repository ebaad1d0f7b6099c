//! The bounded retry loop wrapped around every outbound call.
//!
//! Rate-limit responses (429) sleep for the platform-reported wait plus a
//! sampled buffer before retrying. Transient failures (transport errors,
//! 5xx) retry after a fixed one-second base plus the same buffer. 401 and
//! 403/404 are classified immediately and never retried. Exceeding the
//! attempt budget yields [`StoreError::Exhausted`].
//!
//! Sleeps are whole: cancellation is only observed between calls, never
//! mid-sleep.

use std::time::Duration;

use cordsweep_types::DurationRange;
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::StoreError;

/// Base wait before retrying a transport error or 5xx that reported no
/// `retry_after` of its own.
const TRANSIENT_RETRY_BASE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed beyond the initial attempt.
    pub max_retries: u32,
    /// Extra wait added on top of the platform-reported rate-limit delay.
    pub retry_buffer: DurationRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_buffer: DurationRange::fixed(Duration::from_secs(1)),
        }
    }
}

/// Extract the platform-reported wait from a 429/5xx response.
///
/// Discord reports `retry_after` in seconds in the JSON body; the
/// `Retry-After` header is the fallback. Absent both, one second.
async fn reported_retry_after(response: Response) -> Duration {
    let header_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok());

    let body_secs = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("retry_after").and_then(serde_json::Value::as_f64));

    let secs = body_secs.or(header_secs).unwrap_or(1.0);
    if secs.is_finite() && secs >= 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        TRANSIENT_RETRY_BASE
    }
}

/// Send a request with retry and rate-limit compliance, classifying the
/// outcome into [`StoreError`].
///
/// `build_request` is called once per attempt. `what` names the operation
/// for logs and error messages.
pub async fn send_with_retry<F>(
    build_request: F,
    what: &str,
    policy: &RetryPolicy,
) -> Result<Response, StoreError>
where
    F: Fn() -> RequestBuilder,
{
    for attempt in 0..=policy.max_retries {
        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                let wait = TRANSIENT_RETRY_BASE + policy.retry_buffer.sample();
                warn!(
                    error = %e,
                    attempt,
                    wait_secs = wait.as_secs_f64(),
                    "Network error while attempting to {what}; retrying"
                );
                tokio::time::sleep(wait).await;
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let wait = reported_retry_after(response).await + policy.retry_buffer.sample();
            warn!(
                status = status.as_u16(),
                attempt,
                wait_secs = wait.as_secs_f64(),
                "Rate limited while attempting to {what}; retrying"
            );
            tokio::time::sleep(wait).await;
            continue;
        }

        return Err(match status {
            StatusCode::UNAUTHORIZED => StoreError::Auth {
                what: what.to_string(),
            },
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                debug!(status = status.as_u16(), "Resource unavailable for {what}");
                StoreError::Unavailable {
                    status: status.as_u16(),
                    what: what.to_string(),
                }
            }
            other => StoreError::Unexpected {
                status: other.as_u16(),
                what: what.to_string(),
            },
        });
    }

    Err(StoreError::Exhausted {
        what: what.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// No-wait policy so retry tests finish immediately.
    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_buffer: DurationRange::fixed(Duration::ZERO),
        }
    }

    #[tokio::test]
    async fn success_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ok", server.uri());
        let response = send_with_retry(|| client.get(&url), "fetch ok", &fast_policy(2))
            .await
            .expect("success");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retries_rate_limit_until_success() {
        let server = MockServer::start().await;
        let attempt = AtomicU32::new(0);
        Mock::given(method("GET"))
            .and(path("/limited"))
            .respond_with(move |_: &wiremock::Request| {
                if attempt.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(429).set_body_json(serde_json::json!({
                        "retry_after": 0.0,
                    }))
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/limited", server.uri());
        let response = send_with_retry(|| client.get(&url), "fetch limited", &fast_policy(5))
            .await
            .expect("success after retries");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        let attempt = AtomicU32::new(0);
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(move |_: &wiremock::Request| {
                if attempt.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(502)
                } else {
                    ResponseTemplate::new(200)
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/flaky", server.uri());
        send_with_retry(|| client.get(&url), "fetch flaky", &fast_policy(2))
            .await
            .expect("success after 5xx retry");
    }

    #[tokio::test]
    async fn exhaustion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stuck"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({ "retry_after": 0.0 })),
            )
            .expect(3) // initial + 2 retries
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/stuck", server.uri());
        let err = send_with_retry(|| client.get(&url), "fetch stuck", &fast_policy(2))
            .await
            .expect_err("exhausted");
        assert!(matches!(err, StoreError::Exhausted { .. }));
    }

    #[tokio::test]
    async fn unavailable_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/gone", server.uri());
        let err = send_with_retry(|| client.get(&url), "fetch gone", &fast_policy(5))
            .await
            .expect_err("unavailable");
        assert!(matches!(err, StoreError::Unavailable { status: 404, .. }));
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/denied"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/denied", server.uri());
        let err = send_with_retry(|| client.get(&url), "fetch denied", &fast_policy(5))
            .await
            .expect_err("auth");
        assert!(matches!(err, StoreError::Auth { .. }));
    }
}
