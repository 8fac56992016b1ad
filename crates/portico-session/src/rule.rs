//! Authentication-failure detection.
//!
//! Decides whether a failed response means "the access credential expired
//! and a refresh should be attempted" as opposed to any other failure.
//! A bare 401 is deliberately not enough: the backend must also include
//! one of the reserved sentinel codes in the response body.

use reqwest::StatusCode;
use serde_json::Value;

/// Sentinel code: the access credential has expired.
pub const CODE_TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";

/// Sentinel code: no access credential was presented.
pub const CODE_TOKEN_MISSING: &str = "TOKEN_MISSING";

/// Predicate for recognizing a refreshable authentication failure.
///
/// Matches when the response status equals the configured status *and*
/// the JSON body carries one of the configured codes at `code` or
/// `error.code`. Both the status and the code set can be overridden by
/// the embedding application.
#[derive(Debug, Clone)]
pub struct AuthFailureRule {
    status: StatusCode,
    codes: Vec<String>,
}

impl Default for AuthFailureRule {
    fn default() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            codes: vec![
                CODE_TOKEN_EXPIRED.to_string(),
                CODE_TOKEN_MISSING.to_string(),
            ],
        }
    }
}

impl AuthFailureRule {
    /// Create a rule with a custom status and code set.
    pub fn new<I, S>(status: StatusCode, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status,
            codes: codes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a failed response is a refreshable authentication failure.
    pub fn matches(&self, status: StatusCode, body: &[u8]) -> bool {
        if status != self.status {
            return false;
        }
        match extract_code(body) {
            Some(code) => self.codes.iter().any(|c| c == &code),
            None => false,
        }
    }
}

/// Pull the application error code out of a response body, checking
/// `code` first and falling back to `error.code`.
fn extract_code(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("code")
        .or_else(|| value.get("error").and_then(|e| e.get("code")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_top_level_code() {
        let rule = AuthFailureRule::default();
        let body = br#"{"code":"TOKEN_EXPIRED","message":"expired"}"#;
        assert!(rule.matches(StatusCode::UNAUTHORIZED, body));
    }

    #[test]
    fn test_matches_nested_error_code() {
        let rule = AuthFailureRule::default();
        let body = br#"{"error":{"code":"TOKEN_MISSING"}}"#;
        assert!(rule.matches(StatusCode::UNAUTHORIZED, body));
    }

    #[test]
    fn test_bare_401_does_not_match() {
        let rule = AuthFailureRule::default();
        assert!(!rule.matches(StatusCode::UNAUTHORIZED, b""));
        assert!(!rule.matches(StatusCode::UNAUTHORIZED, b"Unauthorized"));
        assert!(!rule.matches(StatusCode::UNAUTHORIZED, br#"{"message":"no"}"#));
    }

    #[test]
    fn test_unknown_code_does_not_match() {
        let rule = AuthFailureRule::default();
        let body = br#"{"code":"RATE_LIMITED"}"#;
        assert!(!rule.matches(StatusCode::UNAUTHORIZED, body));
    }

    #[test]
    fn test_other_status_does_not_match() {
        let rule = AuthFailureRule::default();
        let body = br#"{"code":"TOKEN_EXPIRED"}"#;
        assert!(!rule.matches(StatusCode::FORBIDDEN, body));
        assert!(!rule.matches(StatusCode::INTERNAL_SERVER_ERROR, body));
    }

    #[test]
    fn test_custom_rule() {
        let rule = AuthFailureRule::new(StatusCode::FORBIDDEN, ["SESSION_DEAD"]);
        assert!(rule.matches(StatusCode::FORBIDDEN, br#"{"code":"SESSION_DEAD"}"#));
        assert!(!rule.matches(StatusCode::UNAUTHORIZED, br#"{"code":"SESSION_DEAD"}"#));
        assert!(!rule.matches(StatusCode::FORBIDDEN, br#"{"code":"TOKEN_EXPIRED"}"#));
    }
}
