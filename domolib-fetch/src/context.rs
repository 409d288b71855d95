//! Request context carried into every route call.
//!
//! A [`RequestContext`] bundles the transport and diagnostics options that
//! route functions used to take one by one: the session to reuse, the debug
//! flag, the wrapper depth reported with debug output, the originating
//! entity type, and an optional log level override.
//!
//! Debug output is attributed to the line that called the executor, not to
//! the place the context was built, so one context can serve many call
//! sites.
//!
//! The pipeline only ever reads a context. Per-call tweaks go through the
//! `with_*` methods, which return a modified copy.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use domolib_core::LogLevel;
use tokio_util::sync::CancellationToken;

use crate::session::HttpSession;

/// Frames skipped by default when attributing debug output.
pub const DEFAULT_STACKS_TO_DROP: u32 = 1;

// ============================================================================
// Request Context
// ============================================================================

/// Per-call configuration envelope.
#[derive(Clone)]
pub struct RequestContext {
    session: Option<HttpSession>,
    debug_api: bool,
    debug_num_stacks_to_drop: u32,
    parent_class: Option<Arc<str>>,
    log_level: Option<LogLevel>,
    call_site: &'static Location<'static>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a builder for customizing the context.
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::new()
    }

    /// Normalizes either call shape into one context.
    ///
    /// A supplied context wins outright and `legacy` is ignored. Without
    /// one, the context is synthesized from the discrete parameters; an
    /// absent log level leaves the sink's default in charge.
    #[track_caller]
    pub fn resolve(context: Option<RequestContext>, legacy: LegacyParams) -> RequestContext {
        if let Some(context) = context {
            return context;
        }

        let mut builder = RequestContextBuilder::new()
            .debug_api(legacy.debug_api)
            .debug_num_stacks_to_drop(clamp_stacks(legacy.debug_num_stacks_to_drop));
        if let Some(session) = legacy.session {
            builder = builder.session(session);
        }
        if let Some(parent_class) = legacy.parent_class {
            builder = builder.parent_class(parent_class);
        }
        if let Some(level) = legacy.log_level {
            builder = builder.log_level(level);
        }
        builder.build()
    }

    /// Returns the shared session, if one was supplied.
    pub fn session(&self) -> Option<&HttpSession> {
        self.session.as_ref()
    }

    /// Returns true if request/response debug output is on.
    pub fn debug_api(&self) -> bool {
        self.debug_api
    }

    /// Returns the wrapper depth reported next to the call site.
    pub fn debug_num_stacks_to_drop(&self) -> u32 {
        self.debug_num_stacks_to_drop
    }

    /// Returns the originating entity type, if set.
    pub fn parent_class(&self) -> Option<&str> {
        self.parent_class.as_deref()
    }

    /// Returns the log level override, if set.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }

    /// Returns where this context was built.
    ///
    /// Per-call attribution comes from the executor; this is reported as
    /// `context_site`.
    pub fn call_site(&self) -> &'static Location<'static> {
        self.call_site
    }

    /// Returns the cancellation token observed by calls using this context.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns a copy with debug output switched on or off.
    pub fn with_debug_api(&self, debug_api: bool) -> Self {
        Self {
            debug_api,
            ..self.clone()
        }
    }

    /// Returns a copy with a different log level override.
    pub fn with_log_level(&self, log_level: Option<LogLevel>) -> Self {
        Self {
            log_level,
            ..self.clone()
        }
    }

    /// Returns a copy tagged with a different entity type.
    pub fn with_parent_class(&self, parent_class: impl Into<Arc<str>>) -> Self {
        Self {
            parent_class: Some(parent_class.into()),
            ..self.clone()
        }
    }

    /// Returns a copy using a different session.
    pub fn with_session(&self, session: HttpSession) -> Self {
        Self {
            session: Some(session),
            ..self.clone()
        }
    }

    /// Returns a copy observing a different cancellation token.
    pub fn with_cancellation(&self, cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            ..self.clone()
        }
    }
}

impl Default for RequestContext {
    #[track_caller]
    fn default() -> Self {
        RequestContextBuilder::new().build()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("session", &self.session.as_ref().map(|_| "shared"))
            .field("debug_api", &self.debug_api)
            .field("debug_num_stacks_to_drop", &self.debug_num_stacks_to_drop)
            .field("parent_class", &self.parent_class)
            .field("log_level", &self.log_level)
            .field("call_site", &self.call_site.to_string())
            .finish_non_exhaustive()
    }
}

fn clamp_stacks(raw: Option<i64>) -> u32 {
    match raw {
        None => DEFAULT_STACKS_TO_DROP,
        Some(n) => u32::try_from(n.max(0)).unwrap_or(u32::MAX),
    }
}

// ============================================================================
// Legacy Parameters
// ============================================================================

/// The discrete parameters route functions accepted before contexts.
#[derive(Debug, Clone, Default)]
pub struct LegacyParams {
    /// Session to reuse.
    pub session: Option<HttpSession>,
    /// Debug flag.
    pub debug_api: bool,
    /// Frames to skip; negative values clamp to zero, `None` uses the default.
    pub debug_num_stacks_to_drop: Option<i64>,
    /// Originating entity type.
    pub parent_class: Option<String>,
    /// Log level override.
    pub log_level: Option<LogLevel>,
}

// ============================================================================
// Request Context Builder
// ============================================================================

/// Builder for constructing a `RequestContext`.
#[derive(Debug, Clone)]
pub struct RequestContextBuilder {
    session: Option<HttpSession>,
    debug_api: bool,
    debug_num_stacks_to_drop: u32,
    parent_class: Option<Arc<str>>,
    log_level: Option<LogLevel>,
    cancellation: Option<CancellationToken>,
}

impl RequestContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            session: None,
            debug_api: false,
            debug_num_stacks_to_drop: DEFAULT_STACKS_TO_DROP,
            parent_class: None,
            log_level: None,
            cancellation: None,
        }
    }

    /// Sets the shared session.
    pub fn session(mut self, session: HttpSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Enables request/response debug output.
    pub fn debug_api(mut self, debug_api: bool) -> Self {
        self.debug_api = debug_api;
        self
    }

    /// Sets the wrapper depth reported with debug output.
    pub fn debug_num_stacks_to_drop(mut self, n: u32) -> Self {
        self.debug_num_stacks_to_drop = n;
        self
    }

    /// Sets the originating entity type.
    pub fn parent_class(mut self, parent_class: impl Into<Arc<str>>) -> Self {
        self.parent_class = Some(parent_class.into());
        self
    }

    /// Sets the log level override.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Sets the cancellation token.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the context, recording the caller as its call site.
    #[track_caller]
    pub fn build(self) -> RequestContext {
        RequestContext {
            session: self.session,
            debug_api: self.debug_api,
            debug_num_stacks_to_drop: self.debug_num_stacks_to_drop,
            parent_class: self.parent_class,
            log_level: self.log_level,
            call_site: Location::caller(),
            cancellation: self.cancellation.unwrap_or_default(),
        }
    }
}

impl Default for RequestContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Entity Context
// ============================================================================

/// Shared "build a context for this entity" helper.
///
/// Entity types implement the two accessors and get a consistently tagged
/// context for every route they call.
pub trait EntityContext {
    /// Type name used to tag log output.
    fn parent_class(&self) -> &str;

    /// Session the entity was loaded with, if any.
    fn session(&self) -> Option<&HttpSession> {
        None
    }

    /// Builds a context for a route call made on behalf of this entity.
    #[track_caller]
    fn route_context(&self, debug_api: bool) -> RequestContext {
        let mut builder = RequestContextBuilder::new()
            .debug_api(debug_api)
            .parent_class(self.parent_class());
        if let Some(session) = self.session() {
            builder = builder.session(session.clone());
        }
        builder.build()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supplied_context_wins_over_legacy() {
        let ctx = RequestContext::builder()
            .parent_class("DomoUser")
            .log_level(LogLevel::Debug)
            .build();

        let legacy = LegacyParams {
            debug_api: true,
            parent_class: Some("Ignored".to_string()),
            debug_num_stacks_to_drop: Some(7),
            ..Default::default()
        };

        let resolved = RequestContext::resolve(Some(ctx.clone()), legacy);
        assert_eq!(resolved.parent_class(), Some("DomoUser"));
        assert!(!resolved.debug_api());
        assert_eq!(resolved.debug_num_stacks_to_drop(), DEFAULT_STACKS_TO_DROP);
        assert_eq!(resolved.log_level(), Some(LogLevel::Debug));
        assert_eq!(resolved.call_site(), ctx.call_site());
    }

    #[test]
    fn test_synthesized_from_legacy() {
        let legacy = LegacyParams {
            debug_api: true,
            parent_class: Some("DomoDataset".to_string()),
            debug_num_stacks_to_drop: Some(3),
            ..Default::default()
        };

        let ctx = RequestContext::resolve(None, legacy);
        assert!(ctx.debug_api());
        assert_eq!(ctx.parent_class(), Some("DomoDataset"));
        assert_eq!(ctx.debug_num_stacks_to_drop(), 3);
        assert_eq!(ctx.log_level(), None);
        assert!(ctx.session().is_none());
        assert!(ctx.call_site().file().ends_with("context.rs"));
    }

    #[test]
    fn test_legacy_log_level_passes_through() {
        let legacy = LegacyParams {
            log_level: Some(LogLevel::Warn),
            ..Default::default()
        };
        assert_eq!(RequestContext::resolve(None, legacy).log_level(), Some(LogLevel::Warn));

        let supplied = RequestContext::default();
        let legacy = LegacyParams {
            log_level: Some(LogLevel::Trace),
            ..Default::default()
        };
        assert_eq!(RequestContext::resolve(Some(supplied), legacy).log_level(), None);
    }

    #[test]
    fn test_negative_stack_depth_clamps() {
        let legacy = LegacyParams {
            debug_num_stacks_to_drop: Some(-4),
            ..Default::default()
        };
        assert_eq!(RequestContext::resolve(None, legacy).debug_num_stacks_to_drop(), 0);
        assert_eq!(clamp_stacks(Some(i64::MAX)), u32::MAX);
        assert_eq!(clamp_stacks(None), DEFAULT_STACKS_TO_DROP);
    }

    #[test]
    fn test_overrides_copy_without_mutating() {
        let base = RequestContext::builder().parent_class("DomoGroup").build();
        let loud = base.with_log_level(Some(LogLevel::Trace)).with_debug_api(true);

        assert_eq!(base.log_level(), None);
        assert!(!base.debug_api());
        assert_eq!(loud.log_level(), Some(LogLevel::Trace));
        assert!(loud.debug_api());
        assert_eq!(loud.parent_class(), Some("DomoGroup"));
    }

    #[test]
    fn test_clones_share_cancellation() {
        let ctx = RequestContext::default();
        let copy = ctx.with_debug_api(true);
        ctx.cancellation().cancel();
        assert!(copy.cancellation().is_cancelled());
    }

    struct DomoUser {
        session: HttpSession,
    }

    impl EntityContext for DomoUser {
        fn parent_class(&self) -> &str {
            "DomoUser"
        }

        fn session(&self) -> Option<&HttpSession> {
            Some(&self.session)
        }
    }

    #[test]
    fn test_entity_context_tags_and_reuses_session() {
        let user = DomoUser {
            session: HttpSession::new().unwrap(),
        };
        let ctx = user.route_context(true);
        assert_eq!(ctx.parent_class(), Some("DomoUser"));
        assert!(ctx.debug_api());
        assert!(ctx.session().is_some());
    }
}
