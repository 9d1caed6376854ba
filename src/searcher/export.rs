//! Bulk export: walk every page of a query and write one URL per line.

use std::collections::HashSet;
use std::path::Path;

use futures::future::join_all;
use indicatif::ProgressBar;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;

use super::fofa_searcher::{SearchRequest, Searcher};
use crate::deserializer::fofa_response::{ResultItem, SearchResponse};
use crate::error::SearchError;
use crate::settings::ApiCredentials;

const RATE_LIMIT_BACKOFF: std::time::Duration = std::time::Duration::from_secs(5);

pub struct PageFetcher<'a, S> {
    searcher: &'a S,
    creds: ApiCredentials,
    sem: Semaphore,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub total: u64,
    pub pages: u32,
    pub fetched_pages: u32,
    pub items: Vec<ResultItem>,
}

impl<'a, S: Searcher> PageFetcher<'a, S> {
    pub fn new(searcher: &'a S, creds: ApiCredentials, threads: u8) -> Self {
        PageFetcher {
            searcher,
            creds,
            sem: Semaphore::new(threads.max(1) as usize),
        }
    }

    async fn rate_limited_get(&self, request: SearchRequest) -> Result<SearchResponse, SearchError> {
        let _permit = self
            .sem
            .acquire()
            .await
            .map_err(|_| SearchError::Semaphore)?;
        tracing::info!(page = request.page, "fetching page");

        match self.searcher.search(&self.creds, &request).await {
            Err(SearchError::RateLimited) => {
                tracing::warn!(page = request.page, "rate limit exceeded, backing off");
                tokio::time::sleep(RATE_LIMIT_BACKOFF).await;
                Err(SearchError::RateLimited)
            }
            other => other,
        }
    }

    /// Fetches page 1, then the remaining pages concurrently. Pages that
    /// fail after the first are logged and skipped.
    pub async fn fetch_all(
        &self,
        request: &SearchRequest,
        max_pages: u32,
        progress: Option<&ProgressBar>,
    ) -> Result<ExportSummary, SearchError> {
        let first = request.clone().with_page(1);
        let fields = request.field_names();
        let size = first.size;

        let initial = self.rate_limited_get(first).await?;
        let total_pages = total_pages(initial.size, size).min(max_pages.max(1));
        if let Some(pb) = progress {
            pb.set_length(total_pages as u64);
            pb.inc(1);
        }

        let mut summary = ExportSummary {
            total: initial.size,
            pages: total_pages,
            fetched_pages: 1,
            items: collect_items(&initial, &fields, 1, size),
        };

        if total_pages > 1 {
            let futures: Vec<_> = (2..=total_pages)
                .map(|page| {
                    let request = request.clone().with_page(page);
                    async move {
                        let result = self.rate_limited_get(request).await;
                        if let Some(pb) = progress {
                            pb.inc(1);
                        }
                        (page, result)
                    }
                })
                .collect();

            for (page, response) in join_all(futures).await {
                match response {
                    Ok(response) => {
                        summary.fetched_pages += 1;
                        summary
                            .items
                            .extend(collect_items(&response, &fields, page, size));
                    }
                    Err(e) => tracing::error!(page, error = %e, "error processing page"),
                }
            }
        }

        Ok(summary)
    }
}

pub fn total_pages(total: u64, size: u32) -> u32 {
    let size = size.max(1) as u64;
    total.div_ceil(size).min(u32::MAX as u64) as u32
}

fn collect_items(
    response: &SearchResponse,
    fields: &[&str],
    page: u32,
    size: u32,
) -> Vec<ResultItem> {
    let offset = (page.saturating_sub(1) as usize) * size as usize;
    response
        .results
        .iter()
        .enumerate()
        .map(|(i, row)| ResultItem::from_row(row, fields, offset + i))
        .collect()
}

/// Address written for an item: its host, else `ip:port`, with `http://`
/// added when no scheme is present.
pub fn export_target(item: &ResultItem) -> String {
    let target = if !item.link.is_empty() {
        item.link.clone()
    } else if !item.host.is_empty() {
        item.host.clone()
    } else {
        item.key()
    };
    if target.contains("://") {
        target
    } else {
        format!("http://{target}")
    }
}

/// Writes unique targets to `path`, truncating it. Returns the line count.
pub async fn write_export(path: &Path, items: &[ResultItem]) -> std::io::Result<usize> {
    let mut outfile = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await?;

    let mut seen = HashSet::new();
    let mut written = 0;
    for item in items {
        let line = export_target(item);
        if line == "http://" || !seen.insert(line.clone()) {
            continue;
        }
        outfile.write_all(format!("{line}\n").as_bytes()).await?;
        written += 1;
    }
    outfile.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserializer::fofa_response::{AccountInfo, RawRow};
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves `total` rows of hosts, failing the pages listed in `broken`.
    struct Pages {
        total: u64,
        broken: Vec<u32>,
        seen: Mutex<Vec<u32>>,
    }

    impl Searcher for Pages {
        async fn search(
            &self,
            _creds: &ApiCredentials,
            request: &SearchRequest,
        ) -> Result<SearchResponse, SearchError> {
            self.seen.lock().unwrap().push(request.page);
            if self.broken.contains(&request.page) {
                return Err(SearchError::Status(reqwest::StatusCode::BAD_GATEWAY));
            }
            let start = (request.page as u64 - 1) * request.size as u64;
            let end = (start + request.size as u64).min(self.total);
            Ok(SearchResponse {
                size: self.total,
                page: request.page as u64,
                results: (start..end)
                    .map(|i| RawRow::Scalar(json!(format!("host{i}.example"))))
                    .collect(),
                ..Default::default()
            })
        }

        async fn account_info(&self, _creds: &ApiCredentials) -> Result<AccountInfo, SearchError> {
            Ok(AccountInfo::default())
        }
    }

    fn host_request(size: u32) -> SearchRequest {
        let mut request = SearchRequest::new("app=\"nginx\"").with_size(size);
        request.fields = vec!["host".into()];
        request
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 100), 0);
        assert_eq!(total_pages(1, 100), 1);
        assert_eq!(total_pages(100, 100), 1);
        assert_eq!(total_pages(101, 100), 2);
        assert_eq!(total_pages(5, 0), 5);
    }

    #[tokio::test]
    async fn fetches_every_page() {
        let searcher = Pages {
            total: 25,
            broken: vec![],
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = PageFetcher::new(&searcher, ApiCredentials::default(), 2);
        let summary = fetcher.fetch_all(&host_request(10), 100, None).await.unwrap();
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.fetched_pages, 3);
        assert_eq!(summary.items.len(), 25);
        assert_eq!(summary.items[24].id, "result-24");
        let mut seen = searcher.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failed_pages_are_skipped_and_cap_applies() {
        let searcher = Pages {
            total: 100,
            broken: vec![2],
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = PageFetcher::new(&searcher, ApiCredentials::default(), 4);
        let summary = fetcher.fetch_all(&host_request(10), 3, None).await.unwrap();
        assert_eq!(summary.total, 100);
        assert_eq!(summary.pages, 3);
        assert_eq!(summary.fetched_pages, 2);
        assert_eq!(summary.items.len(), 20);
    }

    #[tokio::test]
    async fn first_page_failure_is_fatal() {
        let searcher = Pages {
            total: 10,
            broken: vec![1],
            seen: Mutex::new(Vec::new()),
        };
        let fetcher = PageFetcher::new(&searcher, ApiCredentials::default(), 1);
        assert!(fetcher.fetch_all(&host_request(10), 10, None).await.is_err());
    }

    #[test]
    fn targets_get_scheme() {
        let item = ResultItem {
            ip: "1.2.3.4".into(),
            port: Some(8080),
            ..Default::default()
        };
        assert_eq!(export_target(&item), "http://1.2.3.4:8080");
        let item = ResultItem {
            host: "https://secure.example".into(),
            ..Default::default()
        };
        assert_eq!(export_target(&item), "https://secure.example");
    }

    #[tokio::test]
    async fn export_file_is_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");
        let items = vec![
            ResultItem {
                host: "a.example".into(),
                ..Default::default()
            },
            ResultItem {
                host: "a.example".into(),
                ..Default::default()
            },
            ResultItem {
                host: "b.example".into(),
                ..Default::default()
            },
        ];
        assert_eq!(write_export(&path, &items).await.unwrap(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "http://a.example\nhttp://b.example\n");
    }
}
