use axum::http::Uri;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Page-number pagination request: 1-based `page`, positive `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Missing values take defaults; `limit` is clamped to `1..=max_limit`, `page` to `>= 1`.
    pub fn new(page: Option<u64>, limit: Option<u64>, default_limit: u64, max_limit: u64) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    /// Zero-based page index as used by SeaORM paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }

    /// Row offset of the page, or `None` when it does not fit a signed 64-bit SQL `OFFSET`.
    pub fn offset(&self) -> Option<u64> {
        self.index()
            .checked_mul(self.limit)
            .filter(|o| i64::try_from(*o).is_ok())
    }

    /// The first page always exists; later pages must start inside `total`.
    pub fn is_in_range(&self, total: u64) -> bool {
        self.page == 1 || self.offset().is_some_and(|o| o < total)
    }
}

/// Paginated envelope: `{count, next, previous, results}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    /// Total number of items across all pages.
    pub count: u64,
    /// Relative URL of the next page, if any.
    pub next: Option<String>,
    /// Relative URL of the previous page, if any.
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Envelope without links; the REST layer adds them with [`Page::with_links`].
    pub fn new(results: Vec<T>, count: u64) -> Self {
        Self {
            count,
            next: None,
            previous: None,
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }

    /// Fill `next`/`previous` from the request URI, preserving all other query parameters.
    pub fn with_links(mut self, uri: &Uri, req: PageRequest) -> Self {
        let end = req.page.checked_mul(req.limit);
        self.next = end
            .is_some_and(|end| end < self.count)
            .then(|| page_url(uri, req.page + 1));
        self.previous = (req.page > 1).then(|| page_url(uri, req.page - 1));
        self
    }
}

/// `uri` with its `page` parameter replaced.
pub fn page_url(uri: &Uri, page: u64) -> String {
    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    if let Some(q) = uri.query() {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            if k != "page" {
                ser.append_pair(&k, &v);
            }
        }
    }
    ser.append_pair("page", &page.to_string());
    format!("{}?{}", uri.path(), ser.finish())
}
