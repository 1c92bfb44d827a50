use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token missing or expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited by backend")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl FetchError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => FetchError::Unauthorized,
            403 => FetchError::AccessDenied(truncated),
            404 => FetchError::NotFound(truncated),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::ServerError(truncated),
            _ => FetchError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(FetchError::from_status(StatusCode::UNAUTHORIZED, ""), FetchError::Unauthorized));
        assert!(matches!(FetchError::from_status(StatusCode::FORBIDDEN, "no"), FetchError::AccessDenied(b) if b == "no"));
        assert!(matches!(FetchError::from_status(StatusCode::NOT_FOUND, ""), FetchError::NotFound(_)));
        assert!(matches!(FetchError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), FetchError::RateLimited));
        assert!(matches!(FetchError::from_status(StatusCode::BAD_GATEWAY, ""), FetchError::ServerError(_)));
        assert!(matches!(FetchError::from_status(StatusCode::IM_A_TEAPOT, ""), FetchError::InvalidResponse(_)));
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        let FetchError::ServerError(msg) = FetchError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) else {
            panic!("expected server error");
        };
        assert!(msg.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(msg.ends_with("(truncated, 2000 total bytes)"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes, so byte 500 falls inside a character
        let body = format!("a{}", "é".repeat(400));
        let truncated = FetchError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }
}
