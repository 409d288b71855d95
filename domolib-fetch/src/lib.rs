// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # domolib Fetch
//!
//! The request pipeline every `domolib` route function goes through.
//!
//! A route function builds a [`RouteRequest`], passes it with a credential
//! and a [`RequestContext`] to the [`RequestExecutor`], and gets back a
//! [`ResponseEnvelope`]. Paginated endpoints hand a page-fetch closure to
//! a [`PageLooper`] instead.
//!
//! ## Building Blocks
//!
//! - [`context::RequestContext`] - Session, debug flag, caller tagging, log level
//! - [`executor::RequestExecutor`] - One HTTP attempt, uniform envelope
//! - [`retry::RetryPolicy`] - Bounded, cancellable retry with backoff
//! - [`looper::PageLooper`] - Sequential cursor pagination
//! - [`fanout`] - Bounded concurrent fan-out
//! - [`logging`] - Log sink with per-call verbosity
//! - [`config::PipelineConfig`] - JSON configuration
//!
//! ## Example
//!
//! ```ignore
//! use domolib_core::TokenCredential;
//! use domolib_fetch::{PageLooper, RequestContext, RequestExecutor, RouteRequest};
//! use domolib_fetch::looper::{json_items, offset_cursor};
//!
//! let cred = TokenCredential::developer_token("acme", token)?;
//! let executor = RequestExecutor::new();
//! let ctx = RequestContext::builder().parent_class("DomoUser").build();
//!
//! let users = PageLooper::new(0usize)
//!     .collect(
//!         |offset| executor.execute(
//!             &cred,
//!             RouteRequest::get("/api/content/v3/users").query("offset", offset).query("limit", 50),
//!             &ctx,
//!         ),
//!         |env| json_items(env, ""),
//!         offset_cursor(50),
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod credential;
pub mod envelope;
pub mod error;
pub mod executor;
pub mod fanout;
pub mod logging;
pub mod looper;
pub mod request;
pub mod retry;
pub mod route;
pub mod session;

// Re-export key types at crate root

// Errors
pub use error::{ConfigError, RouteError, TransportKind};

// Context & session
pub use context::{EntityContext, LegacyParams, RequestContext, RequestContextBuilder};
pub use credential::Credential;
pub use session::{HttpSession, SessionLease, SessionSettings};

// Execution
pub use envelope::{ErrorDetail, ResponseEnvelope};
pub use executor::RequestExecutor;
pub use request::{RequestBody, RouteRequest};
pub use retry::{Backoff, RetryPolicy};

// Pagination & fan-out
pub use fanout::{gather_with_concurrency, try_gather_with_concurrency};
pub use looper::{PageLooper, PageMeta, PageOutcome, StopReason};

// Logging & config
pub use config::{PipelineConfig, RetrySettings};
pub use logging::{CallLogger, LogRecord, LogSink, MemorySink, TracingSink};
pub use route::{RouteResultExt, Suppress};

pub use tokio_util::sync::CancellationToken;
