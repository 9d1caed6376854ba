//! Search coordinator: the single writer of [`SearchState`].
//!
//! Views subscribe through a `watch` channel and only ever read. Every
//! search runs `Idle -> Loading -> Success | Failed`; the next call enters
//! `Loading` again.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;

use crate::deserializer::fofa_response::{ResultItem, SearchResponse};
use crate::error::SearchError;
use crate::searcher::export::total_pages;
use crate::searcher::fofa_searcher::{SearchRequest, Searcher};
use crate::settings::ApiCredentials;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<ResultItem>,
    pub total_results: u64,
    pub unique_ip_count: usize,
    pub elapsed_ms: u64,
    pub loading: bool,
    pub error: Option<String>,
    /// At least one search has settled.
    #[serde(skip)]
    pub searched: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState {
            query: String::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            results: Vec::new(),
            total_results: 0,
            unique_ip_count: 0,
            elapsed_ms: 0,
            loading: false,
            error: None,
            searched: false,
        }
    }
}

impl SearchState {
    pub fn phase(&self) -> Phase {
        if self.loading {
            Phase::Loading
        } else if self.error.is_some() {
            Phase::Failed
        } else if self.searched {
            Phase::Success
        } else {
            Phase::Idle
        }
    }

    /// The page count is only known once a search has succeeded; a real
    /// total of zero then means there is nowhere to go.
    pub fn pagination(&self) -> Pagination {
        Pagination {
            current: self.page,
            total_pages: (self.phase() == Phase::Success)
                .then(|| total_pages(self.total_results, self.page_size)),
        }
    }
}

/// Distinct non-empty IPs in `results`.
pub fn unique_ips(results: &[ResultItem]) -> usize {
    results
        .iter()
        .map(|item| item.ip.as_str())
        .filter(|ip| !ip.is_empty())
        .collect::<HashSet<_>>()
        .len()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    /// `None` while the total is unknown.
    pub total_pages: Option<u32>,
}

impl Pagination {
    pub fn can_prev(&self) -> bool {
        self.current > 1
    }

    pub fn can_next(&self) -> bool {
        self.target(self.current.saturating_add(1)).is_some()
    }

    /// `page` if it is a valid navigation target.
    pub fn target(&self, page: u32) -> Option<u32> {
        match self.total_pages {
            _ if page < 1 => None,
            Some(total) if page > total => None,
            _ => Some(page),
        }
    }
}

pub struct SearchCoordinator<S> {
    searcher: S,
    credentials: watch::Receiver<ApiCredentials>,
    state: watch::Sender<SearchState>,
    generation: AtomicU64,
}

impl<S: Searcher> SearchCoordinator<S> {
    /// Credentials are read at call time, so the coordinator can be built
    /// before the store has loaded anything.
    pub fn new(searcher: S, credentials: watch::Receiver<ApiCredentials>) -> Self {
        let (state, _rx) = watch::channel(SearchState::default());
        SearchCoordinator {
            searcher,
            credentials,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn searcher(&self) -> &S {
        &self.searcher
    }

    /// Credentials the next search will use.
    pub fn credentials(&self) -> ApiCredentials {
        self.credentials.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Runs a search and publishes the outcome.
    ///
    /// `None` arguments (and zero page numbers) reuse the stored values. A
    /// blank query is a no-op. When calls overlap, only the most recently
    /// started one may publish its result.
    pub async fn perform_search(
        &self,
        query: Option<&str>,
        page: Option<u32>,
        page_size: Option<u32>,
    ) {
        let (query, page, page_size) = {
            let current = self.state.borrow();
            (
                query.map_or_else(|| current.query.clone(), str::to_string),
                page.filter(|p| *p > 0).unwrap_or(current.page),
                page_size.filter(|s| *s > 0).unwrap_or(current.page_size),
            )
        };
        if query.trim().is_empty() {
            tracing::debug!("ignoring blank query");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });

        let creds = self.credentials();
        let request = SearchRequest::new(query.as_str())
            .with_page(page)
            .with_size(page_size);

        let started = Instant::now();
        let outcome = self.searcher.search(&creds, &request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, page, "discarding superseded search response");
            return;
        }

        let next = match outcome {
            Ok(response) => self.succeeded(&request, response, elapsed_ms),
            Err(err) => failed(&request, err, elapsed_ms),
        };
        self.state.send_replace(next);
    }

    fn succeeded(
        &self,
        request: &SearchRequest,
        response: SearchResponse,
        elapsed_ms: u64,
    ) -> SearchState {
        let fields = request.field_names();
        let results: Vec<ResultItem> = response
            .results
            .iter()
            .enumerate()
            .map(|(index, row)| ResultItem::from_row(row, &fields, index))
            .collect();
        let unique_ip_count = unique_ips(&results);
        tracing::info!(
            query = %request.query,
            page = request.page,
            total = response.size,
            rows = results.len(),
            elapsed_ms,
            "search completed"
        );

        SearchState {
            query: request.query.clone(),
            page: request.page,
            page_size: request.size,
            results,
            total_results: response.size,
            unique_ip_count,
            elapsed_ms,
            loading: false,
            error: None,
            searched: true,
        }
    }

    /// Re-runs the current query on `page` if there is one and the page is
    /// in range.
    pub async fn goto_page(&self, page: u32) -> bool {
        let target = {
            let state = self.state.borrow();
            if state.query.trim().is_empty() {
                None
            } else {
                state.pagination().target(page)
            }
        };
        let Some(page) = target else {
            return false;
        };
        self.perform_search(None, Some(page), None).await;
        true
    }

    pub async fn next_page(&self) -> bool {
        let current = self.state.borrow().page;
        self.goto_page(current.saturating_add(1)).await
    }

    pub async fn prev_page(&self) -> bool {
        let current = self.state.borrow().page;
        if current <= 1 {
            return false;
        }
        self.goto_page(current - 1).await
    }
}

fn failed(request: &SearchRequest, err: SearchError, elapsed_ms: u64) -> SearchState {
    match &err {
        SearchError::Api(msg) => tracing::warn!(error = %msg, "API returned an error"),
        other => tracing::error!(error = %other, "search error"),
    }

    SearchState {
        query: request.query.clone(),
        page: request.page,
        page_size: request.size,
        results: Vec::new(),
        total_results: 0,
        unique_ip_count: 0,
        elapsed_ms,
        loading: false,
        error: Some(err.user_message()),
        searched: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(ip: &str) -> ResultItem {
        ResultItem {
            ip: ip.into(),
            ..Default::default()
        }
    }

    #[test]
    fn unique_ips_ignores_duplicates_and_blanks() {
        let results = vec![item("1.1.1.1"), item("1.1.1.1"), item(""), item("2.2.2.2")];
        assert_eq!(unique_ips(&results), 2);
    }

    #[test]
    fn default_state_is_idle() {
        let state = SearchState::default();
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!((state.page, state.page_size), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn phase_precedence() {
        let mut state = SearchState {
            searched: true,
            ..Default::default()
        };
        assert_eq!(state.phase(), Phase::Success);
        state.error = Some("boom".into());
        assert_eq!(state.phase(), Phase::Failed);
        state.loading = true;
        assert_eq!(state.phase(), Phase::Loading);
    }

    #[test]
    fn pagination_bounds() {
        let p = Pagination {
            current: 1,
            total_pages: Some(3),
        };
        assert!(!p.can_prev());
        assert!(p.can_next());
        assert_eq!(p.target(0), None);
        assert_eq!(p.target(3), Some(3));
        assert_eq!(p.target(4), None);

        let last = Pagination {
            current: 3,
            total_pages: Some(3),
        };
        assert!(last.can_prev());
        assert!(!last.can_next());
    }

    #[test]
    fn unknown_total_allows_forward_navigation() {
        let p = Pagination {
            current: 5,
            total_pages: None,
        };
        assert!(p.can_next());
        assert_eq!(p.target(6), Some(6));
    }

    #[test]
    fn zero_total_blocks_navigation() {
        let state = SearchState {
            query: "port=1".into(),
            searched: true,
            ..Default::default()
        };
        let p = state.pagination();
        assert_eq!(p.total_pages, Some(0));
        assert!(!p.can_next());
        assert!(!p.can_prev());
    }

    #[test]
    fn total_is_unknown_until_success() {
        let idle = SearchState {
            total_results: 42,
            ..Default::default()
        };
        assert_eq!(idle.pagination().total_pages, None);

        let failed = SearchState {
            error: Some("boom".into()),
            searched: true,
            ..Default::default()
        };
        assert_eq!(failed.pagination().total_pages, None);
    }

    #[test]
    fn state_pagination_rounds_up() {
        let state = SearchState {
            total_results: 42,
            page_size: 10,
            page: 2,
            searched: true,
            ..Default::default()
        };
        assert_eq!(
            state.pagination(),
            Pagination {
                current: 2,
                total_pages: Some(5)
            }
        );
    }
}
