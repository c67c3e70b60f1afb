//! Page arithmetic for transaction listings.
//!
//! Out-of-range input is clamped rather than rejected, and a page past the
//! end is an empty page, not an error.

use serde::Serialize;

/// Hard upper bound on a page size, whatever the configuration says.
pub const MAX_LIMIT: i64 = 100;

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number, at least 1.
    pub page: i64,
    /// Page size, within `[1, max_limit]`.
    pub limit: i64,
    /// Rows to skip, `(page - 1) * limit`.
    pub offset: i64,
}

impl PageWindow {
    pub fn normalize(page: i64, limit: i64, max_limit: i64) -> Self {
        let max_limit = max_limit.clamp(1, MAX_LIMIT);
        let page = page.max(1);
        let limit = limit.clamp(1, max_limit);
        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// Page metadata returned next to the items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

impl PageInfo {
    pub fn new(window: PageWindow, total_items: i64) -> Self {
        let total_items = total_items.max(0);
        // ceil(total / limit); zero items means zero pages
        let total_pages = (total_items + window.limit - 1) / window.limit;
        Self {
            current_page: window.page,
            total_pages,
            total_items,
            items_per_page: window.limit,
            has_next_page: window.page < total_pages,
            has_previous_page: window.page > 1,
        }
    }
}

/// Lenient parse of a `page`/`limit` query value.
///
/// Missing, blank or non-numeric input falls back to `default`. A fractional
/// number is treated as 1, whatever its magnitude; `3.0` is still 3.
pub fn parse_param(raw: Option<&str>, default: i64) -> i64 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };
    if let Ok(n) = raw.parse::<i64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
        Ok(f) if f.is_finite() => 1,
        _ => default,
    }
}
