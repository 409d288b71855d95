//! Domain models for `domolib`.
//!
//! ## Submodules
//!
//! - `credential` - Instance and token data (TokenCredential, TokenKind)
//! - `log_level` - Ordered verbosity levels
//! - `body` - Response body representation

mod body;
mod credential;
mod log_level;

pub use body::ResponseBody;
pub use credential::{TokenCredential, TokenKind};
pub use log_level::LogLevel;
