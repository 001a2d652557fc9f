// SPDX-FileCopyrightText: 2026 Zapdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential pagination state.
//!
//! The backend paginates with `page`/`page_size` and a `next` link. The
//! [`Pager`] tracks where a multi-page fetch stands so callers can feed
//! each page into the store as it lands rather than buffering a full
//! result set; duplicate ids across page boundaries (rows shifting while
//! we fetch) are the store's dedup problem, not the pager's.

use zapdesk_core::types::Page;

/// Cursor over one paginated listing.
#[derive(Debug)]
pub struct Pager<T> {
    page_size: u32,
    next_page: u32,
    fetched: u64,
    total: Option<u64>,
    exhausted: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Pager<T> {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            next_page: 1,
            fetched: 0,
            total: None,
            exhausted: false,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The page number to request next, or `None` once the listing is
    /// exhausted.
    pub fn next_page(&self) -> Option<u32> {
        (!self.exhausted).then_some(self.next_page)
    }

    /// Records one fetched page and hands its rows back to the caller.
    pub fn absorb(&mut self, page: Page<T>) -> Vec<T> {
        self.fetched += page.results.len() as u64;
        self.total = Some(page.count);
        if page.has_next() {
            self.next_page += 1;
        } else {
            self.exhausted = true;
        }
        page.results
    }

    /// Rows absorbed so far.
    pub fn fetched(&self) -> u64 {
        self.fetched
    }

    /// Server-reported total, known after the first page.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
