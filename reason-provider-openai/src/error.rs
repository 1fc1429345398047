//! HTTP/transport error mapping, grounded on the teacher's
//! `neuron-provider-openai::error`.

use std::time::Duration;

use reason_provider::ProviderError;

/// Map an OpenAI-compatible HTTP status code to a [`ProviderError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit {
            retry_after: parse_retry_after(body),
        },
        500 | 502 | 503 => ProviderError::ServiceUnavailable(body.to_string()),
        _ => ProviderError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// OpenAI sometimes includes "Please retry after N seconds" in the error
/// message body; best-effort parse, `None` if absent.
fn parse_retry_after(body: &str) -> Option<Duration> {
    let lower = body.to_lowercase();
    let idx = lower.find("retry after ")?;
    let after = &lower[idx + "retry after ".len()..];
    let num_str: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
    num_str.parse::<u64>().ok().map(Duration::from_secs)
}

/// Map a [`reqwest::Error`] to a [`ProviderError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(Duration::from_secs(30))
    } else {
        ProviderError::Network(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_statuses() {
        assert!(matches!(
            map_http_status(reqwest::StatusCode::UNAUTHORIZED, "x"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "x"),
            ProviderError::RateLimit { .. }
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE, "x"),
            ProviderError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::NOT_FOUND, "x"),
            ProviderError::ModelNotFound(_)
        ));
    }

    #[test]
    fn retry_after_is_parsed_best_effort() {
        let err = map_http_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Please retry after 45 seconds",
        );
        match err {
            ProviderError::RateLimit { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(45)));
            }
            other => panic!("expected RateLimit, got {other:?}"),
        }
    }

    #[test]
    fn retry_after_absent_is_none() {
        let err = map_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, ProviderError::RateLimit { retry_after: None }));
    }
}
