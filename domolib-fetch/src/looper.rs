//! Cursor-driven pagination.
//!
//! The looper fetches pages strictly one after another, since each page's
//! cursor comes from the previous response. Items are kept in page order
//! and in the order the API returned them within each page; nothing is
//! reordered or deduplicated.

use std::fmt;
use std::future::Future;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::envelope::ResponseEnvelope;
use crate::error::RouteError;

// ============================================================================
// Outcome Types
// ============================================================================

/// Why the looper stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No next cursor.
    Exhausted,
    /// A page came back with no items.
    EmptyPage,
    /// `max_items` reached; the last page may have been truncated.
    MaxItems,
    /// `max_pages` reached.
    MaxPages,
    /// A page failed in best-effort mode.
    Error,
}

/// Result of a pagination run.
#[derive(Debug)]
pub struct PageOutcome<T> {
    /// Accumulated items.
    pub items: Vec<T>,
    /// Pages fetched successfully.
    pub pages: u32,
    /// Why the run ended.
    pub stop_reason: StopReason,
    /// The failure behind [`StopReason::Error`].
    pub error: Option<RouteError>,
}

impl<T> PageOutcome<T> {
    /// Returns true if every page was fetched without error.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// What the cursor extractor knows about the page just fetched.
#[derive(Debug, Clone, Copy)]
pub struct PageMeta<'a, C> {
    /// Cursor used to request this page.
    pub cursor: &'a C,
    /// Items extracted from this page, before any truncation.
    pub items: usize,
    /// 1-based page number.
    pub page: u32,
}

struct PageState<T, C> {
    items: Vec<T>,
    cursor: C,
    pages: u32,
}

impl<T, C> PageState<T, C> {
    fn finish(self, stop_reason: StopReason, error: Option<RouteError>) -> PageOutcome<T> {
        PageOutcome {
            items: self.items,
            pages: self.pages,
            stop_reason,
            error,
        }
    }
}

// ============================================================================
// Page Looper
// ============================================================================

/// Drives repeated page fetches until a stop condition is met.
#[derive(Debug, Clone)]
pub struct PageLooper<C> {
    initial_cursor: C,
    max_items: Option<usize>,
    max_pages: Option<u32>,
    best_effort: bool,
}

impl<C: Clone + fmt::Debug> PageLooper<C> {
    /// Creates a looper starting at `initial_cursor`.
    pub fn new(initial_cursor: C) -> Self {
        Self {
            initial_cursor,
            max_items: None,
            max_pages: None,
            best_effort: false,
        }
    }

    /// Stops once this many items are collected.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Stops after this many pages.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    /// Returns partial results instead of an error when a page fails.
    ///
    /// Cancellation is never swallowed, even in best-effort mode.
    pub fn best_effort(mut self, enabled: bool) -> Self {
        self.best_effort = enabled;
        self
    }

    /// Collects items across pages.
    ///
    /// Each envelope goes through
    /// [`error_for_status`](ResponseEnvelope::error_for_status) before
    /// `extract_items` sees it.
    ///
    /// # Errors
    ///
    /// The first page failure, unless best-effort mode is on. The partial
    /// accumulator is discarded in that case.
    #[instrument(skip_all, fields(initial_cursor = ?self.initial_cursor))]
    pub async fn collect<T, F, Fut, EI, EC>(
        &self,
        mut fetch_page: F,
        mut extract_items: EI,
        mut extract_next_cursor: EC,
    ) -> Result<PageOutcome<T>, RouteError>
    where
        F: FnMut(C) -> Fut,
        Fut: Future<Output = Result<ResponseEnvelope, RouteError>>,
        EI: FnMut(&ResponseEnvelope) -> Result<Vec<T>, RouteError>,
        EC: FnMut(&ResponseEnvelope, PageMeta<'_, C>) -> Option<C>,
    {
        let mut state = PageState {
            items: Vec::new(),
            cursor: self.initial_cursor.clone(),
            pages: 0,
        };

        if self.max_items == Some(0) {
            return Ok(state.finish(StopReason::MaxItems, None));
        }
        if self.max_pages == Some(0) {
            return Ok(state.finish(StopReason::MaxPages, None));
        }

        loop {
            let page = state.pages + 1;
            debug!(page, cursor = ?state.cursor, "Fetching page");

            let fetched = match fetch_page(state.cursor.clone()).await {
                Ok(envelope) => envelope
                    .error_for_status()
                    .and_then(|envelope| extract_items(&envelope).map(|items| (envelope, items))),
                Err(error) => Err(error),
            };

            let (envelope, mut items) = match fetched {
                Ok(fetched) => fetched,
                Err(error) => {
                    if !self.best_effort || matches!(error, RouteError::Cancelled) {
                        return Err(error);
                    }
                    warn!(page, error = %error, "Page failed, returning partial results");
                    return Ok(state.finish(StopReason::Error, Some(error)));
                }
            };

            let page_len = items.len();
            if page_len == 0 {
                debug!(page, "Empty page, stopping");
                return Ok(state.finish(StopReason::EmptyPage, None));
            }

            let next = extract_next_cursor(
                &envelope,
                PageMeta {
                    cursor: &state.cursor,
                    items: page_len,
                    page,
                },
            );

            if let Some(max_items) = self.max_items {
                let room = max_items.saturating_sub(state.items.len());
                items.truncate(room);
            }
            state.items.append(&mut items);
            state.pages = page;

            if self.max_items.is_some_and(|max| state.items.len() >= max) {
                return Ok(state.finish(StopReason::MaxItems, None));
            }
            if self.max_pages.is_some_and(|max| state.pages >= max) {
                return Ok(state.finish(StopReason::MaxPages, None));
            }

            match next {
                Some(cursor) => state.cursor = cursor,
                None => {
                    debug!(pages = state.pages, items = state.items.len(), "Pagination exhausted");
                    return Ok(state.finish(StopReason::Exhausted, None));
                }
            }
        }
    }
}

// ============================================================================
// Extraction Helpers
// ============================================================================

/// Reads a cursor from a JSON value; null, missing, and `""` mean "no more".
pub fn json_cursor(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Offset/limit paging: advance by the page length, stop on a short page.
pub fn offset_cursor(
    limit: usize,
) -> impl Fn(&ResponseEnvelope, PageMeta<'_, usize>) -> Option<usize> {
    move |_envelope: &ResponseEnvelope, meta: PageMeta<'_, usize>| {
        (meta.items >= limit).then(|| meta.cursor + meta.items)
    }
}

/// Extracts the array at a JSON pointer (`""` for the root).
///
/// A null value counts as an empty page.
///
/// # Errors
///
/// Returns [`RouteError::UnexpectedShape`] if the body is not JSON or the
/// pointer is missing or not an array.
pub fn json_items(envelope: &ResponseEnvelope, pointer: &str) -> Result<Vec<Value>, RouteError> {
    let shape_error = |reason: String| RouteError::UnexpectedShape {
        url: envelope.url().to_string(),
        reason,
    };

    let root = envelope
        .json()
        .ok_or_else(|| shape_error("body is not JSON".to_string()))?;
    let value = root
        .pointer(pointer)
        .ok_or_else(|| shape_error(format!("missing {pointer:?}")))?;

    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Null => Ok(Vec::new()),
        other => Err(shape_error(format!("{pointer:?} is not an array: {other}"))),
    }
}

// ============================================================================
// Tests
// ============================================================================
