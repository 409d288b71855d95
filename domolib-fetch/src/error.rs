//! Route error types.

use std::fmt;
use std::panic::Location;
use std::time::Duration;

use domolib_core::ResponseBody;
use reqwest::StatusCode;
use thiserror::Error;

// ============================================================================
// Transport Kind
// ============================================================================

/// What went wrong below the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request or connection timed out.
    Timeout,
    /// The connection could not be established (refused, DNS, TLS).
    Connect,
    /// Any other transport failure (reset mid-body, protocol error).
    Other,
}

impl TransportKind {
    /// Classifies a `reqwest` error.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Route Error
// ============================================================================

/// Error type for route calls.
///
/// Distinct status codes stay distinct so callers can map them onto their
/// own conventions (for example "not found" as an empty result).
#[derive(Debug, Error)]
pub enum RouteError {
    /// Network-level failure; no HTTP response was received.
    #[error("Transport error ({kind}) for {url}: {source}")]
    Transport {
        /// Failure classification.
        kind: TransportKind,
        /// Request URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}{}", called_from(.call_site))]
    Http {
        /// Response status.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Response body.
        body: ResponseBody,
        /// Server-requested wait before retrying.
        retry_after: Option<Duration>,
        /// Route call site; recorded in debug mode only.
        call_site: Option<&'static Location<'static>>,
    },

    /// 401 or 403.
    #[error("Access denied ({status}) for {url}{}", called_from(.call_site))]
    Auth {
        /// Response status.
        status: StatusCode,
        /// Request URL.
        url: String,
        /// Response body.
        body: ResponseBody,
        /// Route call site; recorded in debug mode only.
        call_site: Option<&'static Location<'static>>,
    },

    /// 404.
    #[error("Not found: {url}{}", called_from(.call_site))]
    NotFound {
        /// Request URL.
        url: String,
        /// Response body.
        body: ResponseBody,
        /// Route call site; recorded in debug mode only.
        call_site: Option<&'static Location<'static>>,
    },

    /// Retry attempts used up.
    #[error("Gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last: Box<RouteError>,
    },

    /// The call was cancelled through its cancellation token.
    #[error("Request cancelled")]
    Cancelled,

    /// URL could not be parsed or joined to the credential base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL host is outside the session allowlist.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Header name or value rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A transient session could not be created.
    #[error("Failed to create HTTP session: {0}")]
    Session(#[source] reqwest::Error),

    /// Response body did not have the shape the caller expected.
    #[error("Unexpected response shape from {url}: {reason}")]
    UnexpectedShape {
        /// Request URL.
        url: String,
        /// What was missing or malformed.
        reason: String,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RouteError {
    /// Returns the HTTP status, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } | Self::Auth { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Returns the request URL, if known.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. }
            | Self::Http { url, .. }
            | Self::Auth { url, .. }
            | Self::NotFound { url, .. }
            | Self::UnexpectedShape { url, .. } => Some(url),
            Self::RetryExhausted { last, .. } => last.url(),
            _ => None,
        }
    }

    /// Returns the route call site, when the failing call ran in debug mode.
    pub fn call_site(&self) -> Option<&'static Location<'static>> {
        match self {
            Self::Http { call_site, .. }
            | Self::Auth { call_site, .. }
            | Self::NotFound { call_site, .. } => *call_site,
            Self::RetryExhausted { last, .. } => last.call_site(),
            _ => None,
        }
    }

    /// Returns true if another attempt could succeed.
    ///
    /// Transport failures, 429, and 5xx qualify. Auth failures and every
    /// other 4xx never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Returns true for 401/403.
    pub fn is_no_access(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// Returns true for 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Http { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }

    /// Returns the server-requested retry delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn called_from(call_site: &Option<&'static Location<'static>>) -> String {
    call_site.map_or_else(String::new, |site| format!(" (called from {site})"))
}

/// Statuses worth retrying: 429 and any 5xx.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Statuses the executor raises as [`RouteError::Auth`].
pub fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

// ============================================================================
// Config Error
// ============================================================================

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
