//! Credential data.
//!
//! A credential here is only data: the instance it belongs to, the kind of
//! token, and the token itself. How a token was obtained (login flows,
//! refresh) is outside this crate.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Domain suffix for bare instance names.
const DOMO_DOMAIN: &str = "domo.com";

// ============================================================================
// Token Kind
// ============================================================================

/// How a token is presented to the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Developer access token (`x-domo-developer-token`).
    DeveloperToken,
    /// Session token from a username/password login (`x-domo-authentication`).
    SessionToken,
    /// OAuth access token (`Authorization: Bearer ...`).
    Bearer,
}

impl TokenKind {
    /// Returns the header name that carries this kind of token.
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::DeveloperToken => "x-domo-developer-token",
            Self::SessionToken => "x-domo-authentication",
            Self::Bearer => "authorization",
        }
    }

    /// Formats the header value for a token.
    pub fn header_value(&self, token: &str) -> String {
        match self {
            Self::DeveloperToken | Self::SessionToken => token.to_string(),
            Self::Bearer => format!("Bearer {token}"),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeveloperToken => "developer_token",
            Self::SessionToken => "session_token",
            Self::Bearer => "bearer",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Token Credential
// ============================================================================

/// An instance plus the token used to authenticate against it.
///
/// The token never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenCredential {
    instance: String,
    base_url: Url,
    kind: TokenKind,
    token: String,
}

impl TokenCredential {
    /// Creates a credential.
    ///
    /// `instance` is either a bare instance name (`acme`), a host
    /// (`acme.domo.com`), or a full base URL (`https://acme.domo.com`).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCredential`] if the instance is empty,
    /// contains whitespace, or does not form a valid URL, or if the token is
    /// empty.
    pub fn new(
        instance: impl Into<String>,
        kind: TokenKind,
        token: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let instance = instance.into();
        let token = token.into();

        if token.trim().is_empty() {
            return Err(CoreError::InvalidCredential("token is empty".to_string()));
        }

        let base_url = resolve_base_url(&instance)?;

        Ok(Self {
            instance,
            base_url,
            kind,
            token,
        })
    }

    /// Creates a developer-token credential.
    ///
    /// # Errors
    ///
    /// See [`TokenCredential::new`].
    pub fn developer_token(
        instance: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Self::new(instance, TokenKind::DeveloperToken, token)
    }

    /// Creates a session-token credential.
    ///
    /// # Errors
    ///
    /// See [`TokenCredential::new`].
    pub fn session_token(
        instance: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Self::new(instance, TokenKind::SessionToken, token)
    }

    /// Returns the instance as given.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Returns the resolved base URL (always ends with `/`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the token kind.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Returns the `(name, value)` pair for the auth header.
    pub fn auth_header(&self) -> (&'static str, String) {
        (self.kind.header_name(), self.kind.header_value(&self.token))
    }
}

impl fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredential")
            .field("instance", &self.instance)
            .field("base_url", &self.base_url.as_str())
            .field("kind", &self.kind)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn resolve_base_url(instance: &str) -> Result<Url, CoreError> {
    let instance = instance.trim();
    if instance.is_empty() {
        return Err(CoreError::InvalidCredential("instance is empty".to_string()));
    }
    if instance.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidCredential(format!(
            "instance contains whitespace: {instance:?}"
        )));
    }

    let raw = if instance.contains("://") {
        instance.to_string()
    } else if instance.contains('.') {
        format!("https://{instance}")
    } else {
        format!("https://{instance}.{DOMO_DOMAIN}")
    };

    let mut url =
        Url::parse(&raw).map_err(|e| CoreError::InvalidCredential(format!("{raw}: {e}")))?;

    // Relative joins against a base only keep the last segment without this.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
