use axum::http::HeaderMap;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::provider::UpstreamCredentials;

pub const MISSING_AUTH: &str = "Authorization header is missing";
pub const MALFORMED_AUTH: &str =
    "Invalid Authorization header format. Expected 'Bearer $AUTH_BEARER,$AUTH_TOKEN'";

/// Extract the upstream credential pair from `Authorization: Bearer <bearer>,<token>`.
pub fn extract_credentials(headers: &HeaderMap) -> Result<UpstreamCredentials, ProxyError> {
    let value = headers
        .get("authorization")
        .ok_or_else(|| ProxyError::Unauthorized(MISSING_AUTH.into()))?;

    let malformed = || ProxyError::BadRequest(MALFORMED_AUTH.into());
    let value = value.to_str().map_err(|_| malformed())?;
    let pair = value.trim().strip_prefix("Bearer ").ok_or_else(malformed)?;

    let mut parts = pair.split(',');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(bearer), Some(token), None) if !bearer.trim().is_empty() && !token.trim().is_empty() => {
            Ok(UpstreamCredentials {
                bearer: bearer.trim().to_string(),
                token: token.trim().to_string(),
            })
        }
        _ => Err(malformed()),
    }
}

/// The bearer half of the credential pair, used as a rate-limit key.
pub fn bearer_key(headers: &HeaderMap) -> Option<String> {
    extract_credentials(headers).ok().map(|c| c.bearer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn test_valid_pair() {
        let creds = extract_credentials(&headers("Bearer abc,def")).unwrap();
        assert_eq!(creds.bearer, "abc");
        assert_eq!(creds.token, "def");

        let creds = extract_credentials(&headers("Bearer  abc , def ")).unwrap();
        assert_eq!(creds.bearer, "abc");
        assert_eq!(creds.token, "def");
    }

    #[test]
    fn test_missing_header() {
        let err = extract_credentials(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, ProxyError::Unauthorized(_)));
        assert_eq!(err.to_string(), MISSING_AUTH);
    }

    #[test]
    fn test_malformed_headers() {
        for auth in [
            "abc,def",
            "Basic abc,def",
            "Bearer abc",
            "Bearer abc,",
            "Bearer ,def",
            "Bearer a,b,c",
            "Bearer ",
        ] {
            let err = extract_credentials(&headers(auth)).unwrap_err();
            assert!(matches!(err, ProxyError::BadRequest(_)), "{auth}");
            assert_eq!(err.to_string(), MALFORMED_AUTH);
        }
    }

    #[test]
    fn test_bearer_key() {
        assert_eq!(bearer_key(&headers("Bearer abc,def")).as_deref(), Some("abc"));
        assert_eq!(bearer_key(&headers("Bearer abc")), None);
    }
}
