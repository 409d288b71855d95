//! Single-attempt HTTP execution.
//!
//! [`RequestExecutor::execute`] sends one request and returns a
//! [`ResponseEnvelope`] for any HTTP status, leaving success/failure
//! interpretation to the route function. Two things short-circuit:
//! transport failures (no response at all) and 401/403, which no retry or
//! fallback could fix.

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;
use std::time::Instant;

use domolib_core::{LogLevel, ResponseBody};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use crate::context::RequestContext;
use crate::credential::{Credential, redact_headers};
use crate::envelope::ResponseEnvelope;
use crate::error::{RouteError, TransportKind, is_auth_status, is_retryable_status};
use crate::logging::{CallLogger, LogSink, TracingSink};
use crate::request::{RequestBody, RouteRequest};
use crate::retry::RetryPolicy;
use crate::session::{SessionLease, SessionSettings};

/// Characters of a body included in debug output.
pub const DEBUG_BODY_PREVIEW: usize = 500;

/// Executes route requests.
///
/// Cheap to clone; holds the log sink and the settings used for transient
/// sessions.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    sink: Arc<dyn LogSink>,
    transient: SessionSettings,
}

impl RequestExecutor {
    /// Creates an executor logging through `tracing`.
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink::default()))
    }

    /// Creates an executor with a custom log sink.
    pub fn with_sink(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            transient: SessionSettings::default(),
        }
    }

    /// Sets the settings used when a context carries no session.
    pub fn with_session_settings(mut self, settings: SessionSettings) -> Self {
        self.transient = settings;
        self
    }

    /// Returns the log sink.
    pub fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    /// Sends one request.
    ///
    /// Uses the context session when present, otherwise a transient one
    /// that is released on every exit path.
    ///
    /// The line calling `execute` is recorded as the call site for debug
    /// output and debug-mode errors. A route wrapper marked
    /// `#[track_caller]` hands that attribution on to its own caller, so
    /// every annotated layer is one frame skipped.
    ///
    /// # Errors
    ///
    /// - [`RouteError::Transport`] when no response was received
    /// - [`RouteError::Auth`] for 401/403
    /// - [`RouteError::Cancelled`] if the context token fires first
    /// - URL, header, and session construction errors
    #[track_caller]
    pub fn execute<'a>(
        &'a self,
        credential: &'a dyn Credential,
        request: RouteRequest,
        context: &'a RequestContext,
    ) -> impl Future<Output = Result<ResponseEnvelope, RouteError>> + 'a {
        self.execute_from(credential, request, context, Location::caller())
    }

    #[instrument(skip_all, fields(method = %request.method(), url = %request.url(), caller = %caller))]
    async fn execute_from(
        &self,
        credential: &dyn Credential,
        request: RouteRequest,
        context: &RequestContext,
        caller: &'static Location<'static>,
    ) -> Result<ResponseEnvelope, RouteError> {
        let call_site = context.debug_api().then_some(caller);
        let logger = CallLogger::new(self.sink.as_ref(), context.log_level());
        let url = request.resolve_url(credential.base_url())?;

        let lease = SessionLease::acquire(context.session(), &self.transient)?;
        let session = lease.session();
        session.check_domain(&url)?;

        let mut headers = request.header_map()?;
        credential.apply_auth(&mut headers)?;

        if context.debug_api() {
            let mut fields = caller_fields(context, caller);
            fields.push(("method", request.method().to_string()));
            fields.push(("url", url.to_string()));
            fields.push(("headers", redact_headers(&headers, &credential.secret_headers())));
            if let Some(body) = request.body() {
                fields.push(("body", truncate(&body.preview(), DEBUG_BODY_PREVIEW)));
            }
            logger.log(LogLevel::Info, "API request", fields);
        }

        let mut builder = session
            .client()
            .request(request.method().clone(), url.clone())
            .headers(headers);
        builder = match request.body() {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Text(text)) => builder.body(text.clone()),
            None => builder,
        };

        let started = Instant::now();
        let send = async {
            let response = builder.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, bytes))
        };

        let (status, response_headers, bytes) = tokio::select! {
            biased;
            () = context.cancellation().cancelled() => return Err(RouteError::Cancelled),
            result = send => result.map_err(|source| RouteError::Transport {
                kind: TransportKind::classify(&source),
                url: url.to_string(),
                source,
            })?,
        };

        let content_type = response_headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let body = ResponseBody::from_bytes(&bytes, content_type);
        let mut envelope = ResponseEnvelope::new(status, url.as_str(), response_headers, body);
        if let Some(site) = call_site {
            envelope = envelope.with_call_site(site);
        }
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        debug!(status = %status, elapsed_ms, "Response received");
        logger.log(
            LogLevel::Debug,
            "Request completed",
            vec![
                ("status", status.as_u16().to_string()),
                ("url", url.to_string()),
                ("elapsed_ms", elapsed_ms.to_string()),
            ],
        );

        if context.debug_api() {
            let mut fields = caller_fields(context, caller);
            fields.push(("status", status.as_u16().to_string()));
            fields.push(("url", url.to_string()));
            fields.push(("body", envelope.body().preview(DEBUG_BODY_PREVIEW)));
            logger.log(LogLevel::Info, "API response", fields);
        }

        if is_auth_status(status) {
            logger.log(
                LogLevel::Warn,
                "Access denied",
                vec![("status", status.as_u16().to_string()), ("url", url.to_string())],
            );
            return Err(RouteError::Auth {
                status,
                url: envelope.url().to_string(),
                body: envelope.into_body(),
                call_site,
            });
        }

        Ok(envelope)
    }

    /// Sends a request under a retry policy.
    ///
    /// 429 and 5xx responses count as failed attempts; any other status is
    /// returned as an envelope on the first try.
    ///
    /// # Errors
    ///
    /// See [`RequestExecutor::execute`] and [`RetryPolicy::run`].
    #[track_caller]
    pub fn execute_with_retry<'a>(
        &'a self,
        credential: &'a dyn Credential,
        request: RouteRequest,
        context: &'a RequestContext,
        policy: &'a RetryPolicy,
    ) -> impl Future<Output = Result<ResponseEnvelope, RouteError>> + 'a {
        let caller = Location::caller();
        async move {
            policy
                .run(context.cancellation(), |_| {
                    let request = request.clone();
                    async move {
                        let envelope = self.execute_from(credential, request, context, caller).await?;
                        if is_retryable_status(envelope.status()) {
                            return envelope.error_for_status();
                        }
                        Ok(envelope)
                    }
                })
                .await
        }
    }
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn caller_fields(
    context: &RequestContext,
    caller: &'static Location<'static>,
) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("call_site", caller.to_string()),
        ("stacks_dropped", context.debug_num_stacks_to_drop().to_string()),
        ("context_site", context.call_site().to_string()),
    ];
    if let Some(parent) = context.parent_class() {
        fields.push(("parent_class", parent.to_string()));
    }
    fields
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn test_caller_fields_include_parent() {
        let ctx = RequestContext::builder().parent_class("DomoUser").build();
        let site = Location::caller();
        let fields = caller_fields(&ctx, site);
        assert!(fields.iter().any(|(k, v)| *k == "parent_class" && v == "DomoUser"));
        assert!(fields.iter().any(|(k, v)| *k == "call_site" && *v == site.to_string()));
        assert!(fields.iter().any(|(k, v)| *k == "context_site" && v.contains("executor.rs")));
    }
}
