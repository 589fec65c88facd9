use crate::error::SourceError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};

/// Builds the default headers attached to every hub request.
///
/// The hub accepts anonymous reads; a token raises the rate limit and unlocks
/// gated datasets. The header is marked sensitive so it is never logged.
pub fn default_headers(token: Option<&str>) -> Result<HeaderMap, SourceError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("rfsd-engine/", env!("CARGO_PKG_VERSION"))),
    );

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| SourceError::InvalidCredential(e.to_string()))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(headers)
}
