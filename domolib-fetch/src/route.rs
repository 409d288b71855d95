//! Caller-side conventions on top of [`RouteError`].
//!
//! Route functions decide per endpoint whether "not found" or "no access"
//! means an empty result. The decision is explicit at the call site;
//! nothing is suppressed by default.

use crate::error::RouteError;

/// Which failures a caller wants treated as "no result".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppress {
    /// 404.
    NotFound,
    /// 401/403.
    NoAccess,
    /// Either of the above.
    NotFoundOrNoAccess,
}

impl Suppress {
    /// Returns true if `error` is covered.
    pub fn covers(&self, error: &RouteError) -> bool {
        match self {
            Self::NotFound => error.is_not_found(),
            Self::NoAccess => error.is_no_access(),
            Self::NotFoundOrNoAccess => error.is_not_found() || error.is_no_access(),
        }
    }
}

/// Extension methods for route results.
pub trait RouteResultExt<T> {
    /// Turns covered errors into `Ok(None)`; everything else propagates.
    ///
    /// # Errors
    ///
    /// Any error not covered by `suppress`.
    fn suppress(self, suppress: Suppress) -> Result<Option<T>, RouteError>;
}

impl<T> RouteResultExt<T> for Result<T, RouteError> {
    fn suppress(self, suppress: Suppress) -> Result<Option<T>, RouteError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(error) if suppress.covers(&error) => {
                tracing::debug!(error = %error, "Suppressed route error");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domolib_core::ResponseBody;
    use reqwest::StatusCode;

    fn not_found() -> RouteError {
        RouteError::NotFound {
            url: "u".to_string(),
            body: ResponseBody::Empty,
            call_site: None,
        }
    }

    fn forbidden() -> RouteError {
        RouteError::Auth {
            status: StatusCode::FORBIDDEN,
            url: "u".to_string(),
            body: ResponseBody::Empty,
            call_site: None,
        }
    }

    #[test]
    fn test_suppress_selected_kind_only() {
        let r: Result<u8, _> = Err(not_found());
        assert_eq!(r.suppress(Suppress::NotFound).unwrap(), None);

        let r: Result<u8, _> = Err(forbidden());
        assert!(r.suppress(Suppress::NotFound).is_err());

        let r: Result<u8, _> = Err(forbidden());
        assert_eq!(r.suppress(Suppress::NotFoundOrNoAccess).unwrap(), None);
    }

    #[test]
    fn test_other_errors_propagate() {
        let r: Result<u8, _> = Err(RouteError::Cancelled);
        assert!(matches!(
            r.suppress(Suppress::NotFoundOrNoAccess),
            Err(RouteError::Cancelled)
        ));

        let ok: Result<u8, RouteError> = Ok(3);
        assert_eq!(ok.suppress(Suppress::NoAccess).unwrap(), Some(3));
    }
}
