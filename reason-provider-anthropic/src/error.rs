//! HTTP/transport error mapping, grounded on the teacher's
//! `neuron-provider-anthropic::error`.

use reason_provider::ProviderError;

/// Map an Anthropic HTTP status code to a [`ProviderError`] (§4.3.3, §7).
pub(crate) fn map_http_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit { retry_after: None },
        500..=599 => ProviderError::ServiceUnavailable(body.to_string()),
        _ => ProviderError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// Map a [`reqwest::Error`] to a [`ProviderError`] (transient transport
/// failures: timeout, connection reset, broken pipe, refused, partial-read
/// EOF — §4.3.3).
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(std::time::Duration::from_secs(30))
    } else if err.is_connect() || err.is_request() || err.is_body() || err.is_decode() {
        ProviderError::Network(Box::new(err))
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
            map_http_status(reqwest::StatusCode::BAD_GATEWAY, "x"),
            ProviderError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            map_http_status(reqwest::StatusCode::NOT_FOUND, "x"),
            ProviderError::ModelNotFound(_)
        ));
    }
}
