//! Credential boundary.
//!
//! The pipeline only needs two things from a credential: where relative
//! URLs resolve to, and which headers authenticate a request. How the token
//! was obtained is not its concern.

use std::fmt;

use domolib_core::TokenCredential;
use reqwest::header::{AUTHORIZATION, COOKIE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::RouteError;

/// Headers always hidden from debug output.
const ALWAYS_SECRET: [&str; 2] = ["x-domo-developer-token", "x-domo-authentication"];

/// Anything that can authenticate a route call.
pub trait Credential: Send + Sync + fmt::Debug {
    /// Base URL that credential-relative paths resolve against.
    fn base_url(&self) -> &Url;

    /// Adds authentication headers.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidHeader`] if the token cannot be encoded
    /// as a header value.
    fn apply_auth(&self, headers: &mut HeaderMap) -> Result<(), RouteError>;

    /// Extra header names to hide from debug output.
    fn secret_headers(&self) -> Vec<HeaderName> {
        Vec::new()
    }
}

impl Credential for TokenCredential {
    fn base_url(&self) -> &Url {
        TokenCredential::base_url(self)
    }

    fn apply_auth(&self, headers: &mut HeaderMap) -> Result<(), RouteError> {
        let (name, value) = self.auth_header();
        let name = HeaderName::from_static(name);
        let mut value = HeaderValue::from_str(&value)
            .map_err(|e| RouteError::InvalidHeader(format!("{name}: {e}")))?;
        value.set_sensitive(true);
        headers.insert(name, value);
        Ok(())
    }
}

/// Renders headers for logging with secret values replaced.
pub fn redact_headers(headers: &HeaderMap, extra_secrets: &[HeaderName]) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let secret = *name == AUTHORIZATION
                || *name == COOKIE
                || value.is_sensitive()
                || ALWAYS_SECRET.contains(&name.as_str())
                || extra_secrets.contains(name);
            let shown = if secret {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{name}: {shown}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::ACCEPT;

    #[test]
    fn test_token_credential_applies_header() {
        let cred = TokenCredential::developer_token("acme", "tok-123").unwrap();
        let mut headers = HeaderMap::new();
        cred.apply_auth(&mut headers).unwrap();
        assert_eq!(headers.get("x-domo-developer-token").unwrap(), "tok-123");
    }

    #[test]
    fn test_redaction_hides_tokens() {
        let cred = TokenCredential::developer_token("acme", "tok-123").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-custom-secret", HeaderValue::from_static("hush"));
        cred.apply_auth(&mut headers).unwrap();

        let rendered = redact_headers(&headers, &[HeaderName::from_static("x-custom-secret")]);
        assert!(rendered.contains("accept: application/json"));
        assert!(rendered.contains("x-domo-developer-token: <redacted>"));
        assert!(!rendered.contains("tok-123"));
        assert!(!rendered.contains("hush"));
    }
}
