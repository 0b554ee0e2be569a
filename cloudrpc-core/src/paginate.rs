//! # Pagination
//!
//! List RPCs return one page of results plus an opaque `next_page_token`. This module turns
//! any such call into the three shapes callers consume:
//!
//! 1. **[`first_page`]**: exactly one fetch, returning the items and the query to fetch the
//!    next page with (`auto_paginate: false`).
//! 2. **[`collect_all`]**: fetches every page and returns all items at once (the default).
//! 3. **[`into_stream`]**: a lazy stream of items, fetching a page only when the consumer
//!    polls for more. Dropping the stream stops further fetches.
//!
//! All three are thin adapters over one lazy page sequence, [`Pages`], driven by a
//! [`PageSource`].
mod query;

pub use query::PagedQuery;

use futures_util::{Stream, TryStreamExt, stream};
use std::{collections::VecDeque, future::Future};
use tracing::debug;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The query fetching the next page, `None` once the listing is exhausted.
    pub next_query: Option<PagedQuery>,
    /// The raw response the page was extracted from.
    pub response: serde_json::Value,
}

/// Anything able to fetch a page for a [`PagedQuery`].
pub trait PageSource {
    type Item;
    type Error;

    fn fetch_page(
        &mut self,
        query: &PagedQuery,
    ) -> impl Future<Output = Result<Page<Self::Item>, Self::Error>>;
}

/// The result of [`run`]: the items plus, in single-shot mode, the next query.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub next_query: Option<PagedQuery>,
    /// The raw response of the fetched page, only in single-shot mode.
    pub response: Option<serde_json::Value>,
}

/// A lazy, forward-only sequence of pages.
///
/// Every call to [`Pages::next_page`] issues at most one fetch. The sequence ends when a
/// page carries no next query, when `max_api_calls` fetches were issued, or after a fetch
/// failed.
pub struct Pages<S> {
    source: S,
    next: Option<PagedQuery>,
    api_calls: usize,
}

impl<S: PageSource> Pages<S> {
    pub fn new(source: S, query: PagedQuery) -> Self {
        Self {
            source,
            next: Some(query),
            api_calls: 0,
        }
    }

    /// Number of fetches issued so far.
    pub fn api_calls(&self) -> usize {
        self.api_calls
    }

    pub async fn next_page(&mut self) -> Option<Result<Page<S::Item>, S::Error>> {
        let query = self.next.take()?;

        if query
            .max_api_calls
            .is_some_and(|limit| self.api_calls >= limit)
        {
            debug!(api_calls = self.api_calls, "API call limit reached, ending pagination");
            return None;
        }

        self.api_calls += 1;
        let page = self.source.fetch_page(&query).await;

        if let Ok(page) = &page {
            self.next = page.next_query.clone();
        }

        Some(page)
    }
}

/// Fetches exactly one page.
pub async fn first_page<S: PageSource>(
    mut source: S,
    query: PagedQuery,
) -> Result<Page<S::Item>, S::Error> {
    source.fetch_page(&query).await
}

/// Fetches pages until the listing is exhausted or a limit of `query` is reached,
/// returning every item.
pub async fn collect_all<S: PageSource>(
    source: S,
    query: PagedQuery,
) -> Result<Vec<S::Item>, S::Error> {
    into_stream(source, query).try_collect().await
}

/// Runs `query` the way its `auto_paginate` flag asks for.
pub async fn run<S: PageSource>(
    source: S,
    query: PagedQuery,
) -> Result<Paginated<S::Item>, S::Error> {
    if query.auto_paginate {
        let items = collect_all(source, query).await?;
        Ok(Paginated {
            items,
            next_query: None,
            response: None,
        })
    } else {
        let page = first_page(source, query).await?;
        Ok(Paginated {
            items: page.items,
            next_query: page.next_query,
            response: Some(page.response),
        })
    }
}

struct StreamState<S: PageSource> {
    pages: Pages<S>,
    buffered: VecDeque<S::Item>,
    remaining: Option<usize>,
}

/// Returns a lazy stream over the items of every page.
///
/// A page is fetched only when the consumer asks for an item and the previous page is
/// drained. A failed fetch is yielded once and ends the stream; items already yielded
/// stay valid. At most `query.max_results` items are yielded.
pub fn into_stream<S: PageSource>(
    source: S,
    query: PagedQuery,
) -> impl Stream<Item = Result<S::Item, S::Error>> {
    let state = StreamState {
        remaining: query.max_results,
        pages: Pages::new(source, query),
        buffered: VecDeque::new(),
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.remaining == Some(0) {
                return None;
            }

            if let Some(item) = state.buffered.pop_front() {
                state.remaining = state.remaining.map(|n| n - 1);
                return Some((Ok(item), state));
            }

            match state.pages.next_page().await? {
                Ok(page) => state.buffered.extend(page.items),
                Err(err) => return Some((Err(err), state)),
            }
        }
    })
}
