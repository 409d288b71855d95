//! HTTP session with timeout, user agent, and domain allowlist.
//!
//! An [`HttpSession`] wraps a `reqwest::Client`. Cloning it shares the
//! connection pool, so a session handed in through a
//! [`RequestContext`](crate::RequestContext) can serve many concurrent calls.
//! The pipeline never reconfigures a session it was given.
//!
//! When a context carries no session, the executor takes a
//! [`SessionLease`] on a transient one that lives exactly as long as the
//! call.

use std::time::Duration;

use reqwest::Client;
use tracing::trace;
use url::Url;

use crate::error::RouteError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for domolib.
pub const USER_AGENT: &str = concat!("domolib/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Session Settings
// ============================================================================

/// Settings used to build sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Whole-request timeout.
    pub timeout: Duration,
    /// User agent header.
    pub user_agent: String,
    /// Hosts requests may target; `None` allows any.
    pub allowed_domains: Option<Vec<String>>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: USER_AGENT.to_string(),
            allowed_domains: None,
        }
    }
}

// ============================================================================
// HTTP Session
// ============================================================================

/// Reusable HTTP session.
#[derive(Debug, Clone)]
pub struct HttpSession {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpSession {
    /// Creates a session with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Session`] if the client cannot be built, which
    /// only happens with a broken TLS setup.
    pub fn new() -> Result<Self, RouteError> {
        Self::with_settings(&SessionSettings::default())
    }

    /// Creates a session from settings.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Session`] if the client cannot be built.
    pub fn with_settings(settings: &SessionSettings) -> Result<Self, RouteError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(RouteError::Session)?;

        Ok(Self {
            inner: client,
            allowed_domains: settings.allowed_domains.clone(),
        })
    }

    /// Wraps an existing client without restrictions.
    pub fn from_client(client: Client) -> Self {
        Self {
            inner: client,
            allowed_domains: None,
        }
    }

    /// Restricts requests to the given domains and their subdomains.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's host is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidUrl`] for a URL without a host and
    /// [`RouteError::DomainNotAllowed`] for a host outside the allowlist.
    pub fn check_domain(&self, url: &Url) -> Result<(), RouteError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let host = url
            .host_str()
            .ok_or_else(|| RouteError::InvalidUrl(format!("No host in URL: {url}")))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(RouteError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Returns the inner reqwest client.
    pub fn client(&self) -> &Client {
        &self.inner
    }
}

// ============================================================================
// Session Lease
// ============================================================================

/// A session held for the duration of one call.
///
/// A borrowed session is left alone on drop. An owned one is released when
/// the lease drops, which covers early returns, errors, and cancelled
/// futures alike.
#[derive(Debug)]
pub enum SessionLease<'a> {
    /// Caller-supplied session.
    Shared(&'a HttpSession),
    /// Session created for this call only.
    Owned(HttpSession),
}

impl<'a> SessionLease<'a> {
    /// Borrows `shared` if present, otherwise builds a transient session.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Session`] if a transient session is needed and
    /// cannot be built.
    pub fn acquire(
        shared: Option<&'a HttpSession>,
        settings: &SessionSettings,
    ) -> Result<Self, RouteError> {
        match shared {
            Some(session) => Ok(Self::Shared(session)),
            None => {
                trace!("acquiring transient session");
                Ok(Self::Owned(HttpSession::with_settings(settings)?))
            }
        }
    }

    /// Returns the session.
    pub fn session(&self) -> &HttpSession {
        match self {
            Self::Shared(session) => session,
            Self::Owned(session) => session,
        }
    }

    /// Returns true if this lease owns its session.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        if self.is_owned() {
            trace!("released transient session");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_domain_allowlist() {
        let session = HttpSession::new()
            .unwrap()
            .with_allowed_domains(vec!["domo.com".to_string(), "api.example.com".to_string()]);

        assert!(session.check_domain(&url("https://acme.domo.com/api")).is_ok());
        assert!(session.check_domain(&url("https://domo.com")).is_ok());
        assert!(session.check_domain(&url("https://api.example.com/users")).is_ok());

        let err = session.check_domain(&url("https://evil.com/steal")).unwrap_err();
        assert!(matches!(err, RouteError::DomainNotAllowed(host) if host == "evil.com"));

        // Suffix without a dot boundary is not a subdomain.
        assert!(session.check_domain(&url("https://notdomo.com")).is_err());
    }

    #[test]
    fn test_no_domain_restrictions() {
        let session = HttpSession::new().unwrap();
        assert!(session.check_domain(&url("https://any.domain.com")).is_ok());
    }

    #[test]
    fn test_lease_borrows_shared_session() {
        let shared = HttpSession::new().unwrap();
        let lease = SessionLease::acquire(Some(&shared), &SessionSettings::default()).unwrap();
        assert!(!lease.is_owned());

        let lease = SessionLease::acquire(None, &SessionSettings::default()).unwrap();
        assert!(lease.is_owned());
    }
}
