//! Outbound request description.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::RouteError;

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as-is (CSV uploads, SQL text).
    Text(String),
}

impl RequestBody {
    /// Renders the body for debug output.
    pub fn preview(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

/// What a route function asks the executor to send.
///
/// `url` may be absolute or relative to the credential's base URL.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl RouteRequest {
    /// Creates a request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Creates a PUT request.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// Creates a PATCH request.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// Creates a DELETE request.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Appends an extra header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::Json`] if `body` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, RouteError> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    /// Sets a raw text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Returns the method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the URL as given.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the body.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Resolves the final URL against `base` and appends query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidUrl`] if the URL cannot be parsed or
    /// joined.
    pub fn resolve_url(&self, base: &Url) -> Result<Url, RouteError> {
        let mut url = match Url::parse(&self.url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => base
                .join(self.url.trim_start_matches('/'))
                .map_err(|e| RouteError::InvalidUrl(format!("{}: {e}", self.url)))?,
            Err(e) => return Err(RouteError::InvalidUrl(format!("{}: {e}", self.url))),
        };

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }

    /// Builds the extra headers.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError::InvalidHeader`] for a malformed name or value.
    pub fn header_map(&self) -> Result<HeaderMap, RouteError> {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RouteError::InvalidHeader(format!("{name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| RouteError::InvalidHeader(format!("{name}: {e}")))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("https://acme.domo.com/").unwrap()
    }

    #[test]
    fn test_relative_url_joins_base() {
        let req = RouteRequest::get("/api/content/v3/users").query("limit", 50).query("offset", 0);
        let url = req.resolve_url(&base()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://acme.domo.com/api/content/v3/users?limit=50&offset=0"
        );
    }

    #[test]
    fn test_absolute_url_kept_with_existing_query() {
        let req = RouteRequest::get("https://api.example.com/users?limit=2");
        let url = req.resolve_url(&base()).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/users?limit=2");
    }

    #[test]
    fn test_invalid_header_rejected() {
        let req = RouteRequest::get("/x").header("bad header", "v");
        assert!(matches!(req.header_map(), Err(RouteError::InvalidHeader(_))));
    }

    #[test]
    fn test_json_body() {
        let req = RouteRequest::post("/api/query").json(&json!({"sql": "select 1"})).unwrap();
        assert_eq!(req.body(), Some(&RequestBody::Json(json!({"sql": "select 1"}))));
        assert_eq!(*req.method(), Method::POST);
    }
}
