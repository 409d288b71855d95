//! Uniform result of one HTTP call.

use std::panic::Location;
use std::time::Duration;

use chrono::{DateTime, Utc};
use domolib_core::ResponseBody;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{RouteError, is_auth_status};

/// Characters of a text error body kept as the error message.
const TEXT_ERROR_PREVIEW: usize = 200;

// ============================================================================
// Error Detail
// ============================================================================

/// Structured error information lifted from a non-success body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    pub message: Option<String>,
    /// Machine-readable code or status reason.
    pub code: Option<String>,
}

impl ErrorDetail {
    fn from_body(body: &ResponseBody) -> Option<Self> {
        match body {
            ResponseBody::Json(Value::Object(map)) => {
                let text = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_str))
                        .map(str::to_string)
                };
                let detail = Self {
                    message: text(&["message", "error_description", "error"]),
                    code: text(&["code", "statusReason", "error"]),
                };
                (detail != Self::default()).then_some(detail)
            }
            ResponseBody::Text(_) => Some(Self {
                message: Some(body.preview(TEXT_ERROR_PREVIEW)),
                code: None,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// Response Envelope
// ============================================================================

/// Status, body, and origin of one HTTP call.
///
/// Built once by the executor and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    status: StatusCode,
    url: String,
    headers: HeaderMap,
    body: ResponseBody,
    received_at: DateTime<Utc>,
    error: Option<ErrorDetail>,
    call_site: Option<&'static Location<'static>>,
}

impl ResponseEnvelope {
    /// Creates an envelope, deriving the error detail for non-2xx statuses.
    pub fn new(
        status: StatusCode,
        url: impl Into<String>,
        headers: HeaderMap,
        body: ResponseBody,
    ) -> Self {
        let error = if status.is_success() {
            None
        } else {
            ErrorDetail::from_body(&body)
        };

        Self {
            status,
            url: url.into(),
            headers,
            body,
            received_at: Utc::now(),
            error,
            call_site: None,
        }
    }

    /// Tags the envelope with the route call site that produced it.
    ///
    /// Errors derived through [`error_for_status`](Self::error_for_status)
    /// carry the tag along.
    pub fn with_call_site(mut self, call_site: &'static Location<'static>) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns true for 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Returns when the response arrived.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Returns structured error detail for non-2xx responses.
    pub fn error(&self) -> Option<&ErrorDetail> {
        self.error.as_ref()
    }

    /// Returns the route call site, if the executor recorded one.
    pub fn call_site(&self) -> Option<&'static Location<'static>> {
        self.call_site
    }

    /// Returns the JSON body, if any.
    pub fn json(&self) -> Option<&Value> {
        self.body.as_json()
    }

    /// Looks up a JSON pointer (`/users/0/id`) in the body.
    pub fn pointer(&self, pointer: &str) -> Option<&Value> {
        self.json().and_then(|v| v.pointer(pointer))
    }

    /// Deserializes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::UnexpectedShape`] for a non-JSON body and
    /// [`RouteError::Json`] if the JSON does not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        let value = self.json().ok_or_else(|| RouteError::UnexpectedShape {
            url: self.url.clone(),
            reason: "body is not JSON".to_string(),
        })?;
        Ok(T::deserialize(value)?)
    }

    /// Parses the `Retry-After` header given in seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Consumes the envelope and returns the body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Turns a non-success envelope into the matching error.
    ///
    /// # Errors
    ///
    /// [`RouteError::Auth`] for 401/403, [`RouteError::NotFound`] for 404,
    /// [`RouteError::Http`] for any other non-2xx status.
    pub fn error_for_status(self) -> Result<Self, RouteError> {
        if self.is_success() {
            return Ok(self);
        }

        if is_auth_status(self.status) {
            return Err(RouteError::Auth {
                status: self.status,
                url: self.url,
                body: self.body,
                call_site: self.call_site,
            });
        }

        if self.status == StatusCode::NOT_FOUND {
            return Err(RouteError::NotFound {
                url: self.url,
                body: self.body,
                call_site: self.call_site,
            });
        }

        let retry_after = self.retry_after();
        Err(RouteError::Http {
            status: self.status,
            url: self.url,
            body: self.body,
            retry_after,
            call_site: self.call_site,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde::Deserialize;
    use serde_json::json;

    fn envelope(status: u16, body: ResponseBody) -> ResponseEnvelope {
        ResponseEnvelope::new(
            StatusCode::from_u16(status).unwrap(),
            "https://acme.domo.com/api/content/v3/users",
            HeaderMap::new(),
            body,
        )
    }

    #[test]
    fn test_success_envelope() {
        let env = envelope(200, ResponseBody::Json(json!({"users": [{"id": 1}]})));
        assert!(env.is_success());
        assert!(env.error().is_none());
        assert_eq!(env.pointer("/users/0/id"), Some(&json!(1)));
    }

    #[test]
    fn test_error_detail_from_domo_body() {
        let env = envelope(
            400,
            ResponseBody::Json(json!({
                "status": 400,
                "statusReason": "Bad Request",
                "message": "Invalid filter"
            })),
        );
        let detail = env.error().unwrap();
        assert_eq!(detail.message.as_deref(), Some("Invalid filter"));
        assert_eq!(detail.code.as_deref(), Some("Bad Request"));
    }

    #[test]
    fn test_error_for_status_keeps_codes_distinct() {
        let auth = envelope(403, ResponseBody::Empty).error_for_status().unwrap_err();
        assert!(auth.is_no_access());

        let missing = envelope(404, ResponseBody::Empty).error_for_status().unwrap_err();
        assert!(matches!(missing, RouteError::NotFound { .. }));

        let conflict = envelope(409, ResponseBody::Empty).error_for_status().unwrap_err();
        assert_eq!(conflict.status(), Some(StatusCode::CONFLICT));
        assert!(!conflict.is_retryable());

        assert!(envelope(204, ResponseBody::Empty).error_for_status().is_ok());
    }

    #[test]
    fn test_call_site_carried_into_errors() {
        let site = Location::caller();
        let missing = envelope(404, ResponseBody::Empty)
            .with_call_site(site)
            .error_for_status()
            .unwrap_err();
        assert_eq!(missing.call_site(), Some(site));
        assert!(missing.to_string().contains("called from"));

        let untagged = envelope(502, ResponseBody::Empty).error_for_status().unwrap_err();
        assert!(untagged.call_site().is_none());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        let env = ResponseEnvelope::new(
            StatusCode::TOO_MANY_REQUESTS,
            "https://acme.domo.com/api",
            headers,
            ResponseBody::Empty,
        );
        assert_eq!(env.retry_after(), Some(Duration::from_secs(7)));

        let err = env.error_for_status().unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_deserialize_body() {
        #[derive(Deserialize)]
        struct User {
            id: u64,
        }

        let env = envelope(200, ResponseBody::Json(json!({"id": 42})));
        let user: User = env.deserialize().unwrap();
        assert_eq!(user.id, 42);

        let text = envelope(200, ResponseBody::Text("a,b".to_string()));
        assert!(matches!(
            text.deserialize::<User>(),
            Err(RouteError::UnexpectedShape { .. })
        ));
    }
}
