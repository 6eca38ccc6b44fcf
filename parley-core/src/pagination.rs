//! Offset-free pagination
//!
//! The store has no server-side skip, so page-numbered listings materialize
//! the ordered sequence upstream and window it here. Cursor windows pull
//! one extra item from a lazy stream to learn whether another page exists.

use crate::{MessageId, ParleyError, ParleyResult, ValidationError};
use futures_util::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

/// A validated 1-based page request.
///
/// Only constructed through [`PageRequest::with_max_limit`], so `page` is
/// always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Validate `page >= 1` and `limit >= 1`.
    pub fn new(page: i64, limit: i64) -> ParleyResult<Self> {
        Self::with_max_limit(page, limit, u32::MAX)
    }

    /// Validate as [`PageRequest::new`] and additionally cap `limit`.
    pub fn with_max_limit(page: i64, limit: i64, max_limit: u32) -> ParleyResult<Self> {
        let invalid = |reason: String| {
            ParleyError::Validation(ValidationError::InvalidPagination {
                page,
                limit,
                reason,
            })
        };

        if page < 1 {
            return Err(invalid("page must be >= 1".to_string()));
        }
        if limit < 1 {
            return Err(invalid("limit must be >= 1".to_string()));
        }
        if limit > max_limit as i64 {
            return Err(invalid(format!("limit must be <= {max_limit}")));
        }
        let page = u32::try_from(page).map_err(|_| invalid("page is too large".to_string()))?;
        let limit = u32::try_from(limit).map_err(|_| invalid("limit is too large".to_string()))?;

        let offset = (page as u64 - 1) * limit as u64;
        if usize::try_from(offset).is_err() {
            return Err(invalid("page offset overflows".to_string()));
        }

        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Index of the first item on this page.
    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

/// One window of an ordered sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Length of the full sequence.
    pub total: usize,
    pub page: u32,
    pub limit: u32,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    /// Window `items` for `request`.
    ///
    /// Pages past the end are empty but still report the full `total`.
    pub fn window(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let start = request.offset().min(total);
        let end = start.saturating_add(request.limit as usize).min(total);
        let data = items.into_iter().skip(start).take(end - start).collect();

        Self {
            total,
            page: request.page,
            limit: request.limit,
            data,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            total: self.total,
            page: self.page,
            limit: self.limit,
            data: self.data.into_iter().map(f).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Validate `page`/`limit` and window `items`.
pub fn paginate<T>(items: Vec<T>, page: i64, limit: i64) -> ParleyResult<Page<T>> {
    Ok(Page::window(items, PageRequest::new(page, limit)?))
}

/// A cursor-bounded window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    /// Pass as `before` to fetch the next window; `None` at the end.
    pub next_cursor: Option<MessageId>,
}

impl<T> CursorPage<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> CursorPage<U> {
        CursorPage {
            data: self.data.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Take up to `limit` items from an ordered stream.
///
/// Reads at most `limit + 1` items; the extra one only decides whether a
/// next cursor is reported.
pub async fn window_from_stream<S, T, F>(
    stream: S,
    limit: u32,
    cursor_of: F,
) -> ParleyResult<CursorPage<T>>
where
    S: Stream<Item = ParleyResult<T>>,
    F: Fn(&T) -> MessageId,
{
    if limit == 0 {
        return Err(ParleyError::Validation(ValidationError::InvalidPagination {
            page: 1,
            limit: 0,
            reason: "limit must be >= 1".to_string(),
        }));
    }

    let limit = limit as usize;
    let mut data: Vec<T> = stream.take(limit + 1).try_collect().await?;
    let next_cursor = if data.len() > limit {
        data.truncate(limit);
        data.last().map(&cursor_of)
    } else {
        None
    };

    Ok(CursorPage { data, next_cursor })
}
