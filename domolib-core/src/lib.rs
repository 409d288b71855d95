// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `domolib` Core
//!
//! Dependency-light types shared by the `domolib` request pipeline.
//!
//! This crate holds the plain data that flows through every route call
//! without knowing anything about HTTP transport:
//!
//! - Credential data (instance name, token kind, token)
//! - Log levels used for per-call verbosity overrides
//! - Response bodies as returned by the Domo API
//! - Error types
//!
//! ## Key Types
//!
//! - [`TokenCredential`] - Instance plus auth token, resolved to a base URL
//! - [`TokenKind`] - Which header carries the token
//! - [`LogLevel`] - Ordered verbosity levels
//! - [`ResponseBody`] - JSON, text, bytes, or nothing

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{LogLevel, ResponseBody, TokenCredential, TokenKind};
