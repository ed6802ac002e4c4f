//! Bearer-token gate for the control surface.

use axum::http::HeaderMap;

/// Caller token from the Authorization header or, for EventSource
/// callers that cannot set headers, the `token` query parameter. The
/// header wins when both are present.
pub fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| query_token.map(str::to_string))
}

/// Check the presented token against the configured one. No configured
/// token leaves the surface open.
pub fn authorized(required: Option<&str>, presented: Option<&str>) -> bool {
    match required {
        None => true,
        Some(required) => presented == Some(required),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_takes_precedence_over_query_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer sekrit"));
        assert_eq!(
            extract_token(&headers, Some("query-token")),
            Some("sekrit".to_string())
        );
    }

    #[test]
    fn query_token_is_used_without_a_header() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_token(&headers, Some("query-token")),
            Some("query-token".to_string())
        );
        assert_eq!(extract_token(&headers, None), None);
    }

    #[test]
    fn malformed_authorization_header_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers, None), None);
    }

    #[test]
    fn authorization_requires_exact_match_when_configured() {
        assert!(authorized(None, None));
        assert!(authorized(None, Some("anything")));
        assert!(authorized(Some("sekrit"), Some("sekrit")));
        assert!(!authorized(Some("sekrit"), Some("wrong")));
        assert!(!authorized(Some("sekrit"), None));
    }
}
