pub mod export;

pub mod fofa_searcher {
    use std::time::{Duration, Instant};

    use base64::prelude::*;
    use reqwest::{self, Url};

    use crate::deserializer::fofa_response::{self, AccountInfo, SearchResponse};
    use crate::error::SearchError;
    use crate::settings::ApiCredentials;

    /// Fields requested when the caller does not name any.
    pub const DEFAULT_SEARCH_FIELDS: &[&str] = &[
        "ip",
        "port",
        "protocol",
        "country",
        "country_name",
        "region",
        "city",
        "longitude",
        "latitude",
        "asn",
        "org",
        "host",
        "domain",
        "os",
        "server",
        "icp",
        "title",
        "jarm",
        "header",
        "banner",
        "cert",
        "base_protocol",
        "link",
        "cert.issuer.org",
        "cert.issuer.cn",
        "cert.subject.org",
        "cert.subject.cn",
        "tls.ja3s",
        "tls.version",
        "cert.sn",
        "cert.not_before",
        "cert.not_after",
        "cert.domain",
        "header_hash",
        "banner_hash",
        "banner_fid",
        "product",
        "product_category",
        "version",
        "lastupdatetime",
        "cname",
    ];

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SearchRequest {
        pub query: String,
        pub page: u32,
        pub size: u32,
        pub fields: Vec<String>,
        pub full: Option<bool>,
    }

    impl SearchRequest {
        pub fn new(query: impl Into<String>) -> Self {
            SearchRequest {
                query: query.into(),
                page: 1,
                size: 10,
                fields: Vec::new(),
                full: None,
            }
        }

        pub fn with_page(mut self, page: u32) -> Self {
            self.page = page.max(1);
            self
        }

        pub fn with_size(mut self, size: u32) -> Self {
            self.size = size.max(1);
            self
        }

        /// Requested field names, falling back to [`DEFAULT_SEARCH_FIELDS`].
        pub fn field_names(&self) -> Vec<&str> {
            if self.fields.is_empty() {
                DEFAULT_SEARCH_FIELDS.to_vec()
            } else {
                self.fields.iter().map(String::as_str).collect()
            }
        }
    }

    /// Base64 of the UTF-8 bytes, as `qbase64` expects.
    pub fn encode_query(query: &str) -> String {
        BASE64_STANDARD.encode(query.as_bytes())
    }

    fn endpoint(
        api_url: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Url, SearchError> {
        let base = api_url.trim().trim_end_matches('/');
        Url::parse_with_params(&format!("{base}/{path}"), params).map_err(|err| {
            SearchError::InvalidUrl {
                url: api_url.to_string(),
                reason: err.to_string(),
            }
        })
    }

    pub fn search_url(creds: &ApiCredentials, request: &SearchRequest) -> Result<Url, SearchError> {
        let mut params = vec![
            ("key", creds.api_key.clone()),
            ("qbase64", encode_query(&request.query)),
            ("fields", request.field_names().join(",")),
            ("page", request.page.to_string()),
            ("size", request.size.to_string()),
        ];
        if let Some(full) = request.full {
            params.push(("full", full.to_string()));
        }
        params.push(("r_type", "json".to_string()));
        endpoint(&creds.api_url, "search/all", &params)
    }

    pub fn account_url(creds: &ApiCredentials) -> Result<Url, SearchError> {
        endpoint(&creds.api_url, "info/my", &[("key", creds.api_key.clone())])
    }

    /// URL with the `key` parameter masked, for logs.
    pub fn redact(url: &Url) -> String {
        let mut redacted = url.clone();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if k == "key" { "***".to_string() } else { v.into_owned() };
                (k.into_owned(), v)
            })
            .collect();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
        redacted.to_string()
    }

    #[allow(async_fn_in_trait)]
    pub trait Searcher {
        async fn search(
            &self,
            creds: &ApiCredentials,
            request: &SearchRequest,
        ) -> Result<SearchResponse, SearchError>;
        async fn account_info(&self, creds: &ApiCredentials) -> Result<AccountInfo, SearchError>;
    }

    /// Account info for display; any failure degrades to an unknown account.
    pub async fn account_or_unknown<S: Searcher>(searcher: &S, creds: &ApiCredentials) -> AccountInfo {
        match searcher.account_info(creds).await {
            Ok(info) => info,
            Err(err) => {
                tracing::warn!(error = %err, "error fetching account info");
                AccountInfo::unknown("Error fetching data")
            }
        }
    }

    pub struct FofaSearcher {
        client: reqwest::Client,
    }

    impl FofaSearcher {
        pub fn new(timeout: Option<Duration>) -> Result<FofaSearcher, SearchError> {
            let mut builder = reqwest::ClientBuilder::new()
                .user_agent(concat!("fofax/", env!("CARGO_PKG_VERSION")))
                .default_headers({
                    let mut headers = reqwest::header::HeaderMap::new();
                    headers.insert(
                        reqwest::header::ACCEPT,
                        reqwest::header::HeaderValue::from_static("application/json"),
                    );
                    headers
                });
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            Ok(FofaSearcher {
                client: builder.build()?,
            })
        }

        async fn get(&self, url: Url) -> Result<String, SearchError> {
            let response = self.client.get(url).send().await?;

            match response.status() {
                reqwest::StatusCode::TOO_MANY_REQUESTS => Err(SearchError::RateLimited),
                reqwest::StatusCode::BAD_REQUEST => Err(SearchError::InvalidQuery),
                reqwest::StatusCode::NOT_FOUND => Err(SearchError::InvalidQuery),
                status if !status.is_success() => Err(SearchError::Status(status)),
                _ => Ok(response.text().await?),
            }
        }
    }

    impl Searcher for FofaSearcher {
        async fn search(
            &self,
            creds: &ApiCredentials,
            request: &SearchRequest,
        ) -> Result<SearchResponse, SearchError> {
            let url = search_url(creds, request)?;
            tracing::debug!(url = %redact(&url), "search request");

            let started = Instant::now();
            let text = self.get(url).await?;
            let response = fofa_response::decode_search_body(&text)?;
            tracing::debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                total = response.size,
                rows = response.results.len(),
                "search response"
            );
            Ok(response)
        }

        async fn account_info(&self, creds: &ApiCredentials) -> Result<AccountInfo, SearchError> {
            let url = account_url(creds)?;
            tracing::debug!(url = %redact(&url), "account request");
            let text = self.get(url).await?;
            fofa_response::decode_account_body(&text)
        }
    }

}
