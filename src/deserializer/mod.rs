pub mod fofa_response {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use crate::error::SearchError;

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(default)]
    pub struct SearchResponse {
        pub error: bool,
        pub consumed_fpoint: u64,
        pub required_fpoints: u64,
        pub tip: String,
        pub size: u64,
        pub page: u64,
        pub mode: String,
        pub query: String,
        pub results: Vec<RawRow>,
        pub errmsg: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(unused)]
    pub struct ErrorResponse {
        #[serde(default)]
        pub error: bool,
        #[serde(default)]
        pub errmsg: String,
    }

    /// One row of `results`. FOFA returns columns in requested-field order,
    /// a bare scalar when a single field was requested, and some mirrors
    /// answer with objects keyed by field name.
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(untagged)]
    pub enum RawRow {
        Columns(Vec<Value>),
        Record(serde_json::Map<String, Value>),
        Scalar(Value),
    }

    /// `/info/my` payload.
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AccountInfo {
        pub error: bool,
        pub email: String,
        pub username: String,
        pub category: String,
        pub fcoin: i64,
        pub fofa_point: i64,
        pub remain_free_point: i64,
        pub remain_api_query: i64,
        pub remain_api_data: i64,
        pub isvip: bool,
        pub vip_level: i64,
        pub is_verified: bool,
        pub avatar: String,
        pub message: String,
        pub errmsg: String,
        pub fofacli_ver: String,
        pub fofa_server: bool,
        pub expiration: String,
    }

    impl AccountInfo {
        /// Placeholder used when the account endpoint is unreachable.
        pub fn unknown(message: impl Into<String>) -> Self {
            AccountInfo {
                error: true,
                message: message.into(),
                ..Default::default()
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize)]
    pub struct ResultItem {
        pub id: String,
        pub ip: String,
        pub port: Option<u16>,
        pub protocol: String,
        pub host: String,
        pub domain: String,
        pub link: String,
        pub title: String,
        pub country: String,
        pub country_name: String,
        pub region: String,
        pub city: String,
        pub asn: String,
        pub org: String,
        pub server: String,
        pub os: String,
        pub products: Vec<String>,
        pub header: String,
        pub banner: String,
        pub cert_subject: String,
        pub cert_issuer: String,
        pub cert_not_after: String,
        pub last_update: String,
        pub extra: BTreeMap<String, String>,
    }

    impl ResultItem {
        /// Builds an item from a raw row, pairing columns with `fields`.
        /// Rows without a server id get `result-{index}`.
        pub fn from_row(row: &RawRow, fields: &[&str], index: usize) -> ResultItem {
            let mut values: BTreeMap<String, String> = match row {
                RawRow::Columns(cols) => fields
                    .iter()
                    .zip(cols)
                    .map(|(field, v)| (field.to_string(), value_text(v)))
                    .collect(),
                RawRow::Record(map) => map
                    .iter()
                    .map(|(k, v)| (k.clone(), value_text(v)))
                    .collect(),
                RawRow::Scalar(v) => fields
                    .first()
                    .map(|field| (field.to_string(), value_text(v)))
                    .into_iter()
                    .collect(),
            };

            let id = take(&mut values, "id");
            let port = take(&mut values, "port");
            let products = take(&mut values, "product");
            let subject = take(&mut values, "cert.subject.cn");
            let subject_org = take(&mut values, "cert.subject.org");
            let issuer = take(&mut values, "cert.issuer.cn");
            let issuer_org = take(&mut values, "cert.issuer.org");

            ResultItem {
                id: if id.is_empty() {
                    format!("result-{index}")
                } else {
                    id
                },
                ip: take(&mut values, "ip"),
                port: port.trim().parse().ok(),
                protocol: take(&mut values, "protocol"),
                host: take(&mut values, "host"),
                domain: take(&mut values, "domain"),
                link: take(&mut values, "link"),
                title: take(&mut values, "title"),
                country: take(&mut values, "country"),
                country_name: take(&mut values, "country_name"),
                region: take(&mut values, "region"),
                city: take(&mut values, "city"),
                asn: take(&mut values, "asn"),
                org: take(&mut values, "org"),
                server: take(&mut values, "server"),
                os: take(&mut values, "os"),
                products: products
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect(),
                header: take(&mut values, "header"),
                banner: take(&mut values, "banner"),
                cert_subject: first_non_empty(subject, subject_org),
                cert_issuer: first_non_empty(issuer, issuer_org),
                cert_not_after: take(&mut values, "cert.not_after"),
                last_update: take(&mut values, "lastupdatetime"),
                extra: values.into_iter().filter(|(_, v)| !v.is_empty()).collect(),
            }
        }

        /// `ip:port`, the identity used for list rendering.
        pub fn key(&self) -> String {
            match self.port {
                Some(port) => format!("{}:{}", self.ip, port),
                None => self.ip.clone(),
            }
        }

        /// Best clickable address for the item.
        pub fn url(&self) -> String {
            if !self.link.is_empty() {
                return self.link.clone();
            }
            if self.host.contains("://") {
                return self.host.clone();
            }
            let target = if self.host.is_empty() {
                self.key()
            } else {
                self.host.clone()
            };
            if self.protocol == "https" || self.port == Some(443) {
                format!("https://{target}")
            } else {
                format!("http://{target}")
            }
        }
    }

    fn take(values: &mut BTreeMap<String, String>, name: &str) -> String {
        values.remove(name).unwrap_or_default()
    }

    fn first_non_empty(a: String, b: String) -> String {
        if a.is_empty() {
            b
        } else {
            a
        }
    }

    fn value_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Parses a `/search/all` body. `error: true` is a failure regardless of
    /// the transport status.
    pub fn decode_search_body(text: &str) -> Result<SearchResponse, SearchError> {
        match serde_json::from_str::<SearchResponse>(text) {
            Ok(response) if response.error => Err(SearchError::Api(
                response
                    .errmsg
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "Unknown API error".to_string()),
            )),
            Ok(response) => Ok(response),
            Err(err) => match serde_json::from_str::<ErrorResponse>(text) {
                Ok(error_response) if error_response.error => {
                    Err(SearchError::Api(error_response.errmsg))
                }
                _ => Err(SearchError::Json(err)),
            },
        }
    }

    /// Parses an `/info/my` body. Error bodies carry their text in `errmsg`,
    /// which takes precedence over `message` when both are present.
    pub fn decode_account_body(text: &str) -> Result<AccountInfo, SearchError> {
        let mut info: AccountInfo = serde_json::from_str(text)?;
        if !info.errmsg.trim().is_empty() {
            info.message = std::mem::take(&mut info.errmsg);
        }
        Ok(info)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn error_flag_wins_over_payload() {
            let err = decode_search_body(r#"{"error":true,"errmsg":"invalid key"}"#).unwrap_err();
            assert!(matches!(err, SearchError::Api(ref m) if m == "invalid key"));
        }

        #[test]
        fn error_without_message_uses_fallback() {
            let err = decode_search_body(r#"{"error":true}"#).unwrap_err();
            assert_eq!(err.user_message(), "Unknown API error");
        }

        #[test]
        fn error_body_with_odd_shapes_still_reports_message() {
            let err =
                decode_search_body(r#"{"error":true,"errmsg":"bad","results":null}"#).unwrap_err();
            assert!(matches!(err, SearchError::Api(ref m) if m == "bad"));
        }

        #[test]
        fn missing_fields_default() {
            let response = decode_search_body(r#"{"size":3}"#).unwrap();
            assert_eq!(response.size, 3);
            assert!(response.results.is_empty());
            assert!(!response.error);
        }

        #[test]
        fn malformed_body_is_json_error() {
            let err = decode_search_body("<html>502</html>").unwrap_err();
            assert!(matches!(err, SearchError::Json(_)));
        }

        #[test]
        fn row_shapes_are_accepted() {
            let response = decode_search_body(
                r#"{"results":[["1.2.3.4","443"],"5.6.7.8",{"ip":"9.9.9.9","port":80}]}"#,
            )
            .unwrap();
            assert!(matches!(response.results[0], RawRow::Columns(_)));
            assert!(matches!(response.results[1], RawRow::Scalar(_)));
            assert!(matches!(response.results[2], RawRow::Record(_)));
        }

        #[test]
        fn columns_pair_with_fields() {
            let row = RawRow::Columns(vec![
                json!("1.2.3.4"),
                json!("443"),
                json!("https"),
                json!("nginx, openresty"),
                json!("Example"),
            ]);
            let item = ResultItem::from_row(&row, &["ip", "port", "protocol", "product", "title"], 3);
            assert_eq!(item.id, "result-3");
            assert_eq!(item.ip, "1.2.3.4");
            assert_eq!(item.port, Some(443));
            assert_eq!(item.products, vec!["nginx", "openresty"]);
            assert_eq!(item.title, "Example");
            assert_eq!(item.key(), "1.2.3.4:443");
            assert_eq!(item.url(), "https://1.2.3.4:443");
        }

        #[test]
        fn record_rows_keep_server_id_and_extras() {
            let row = RawRow::Record(
                json!({"id": "abc", "ip": "1.1.1.1", "port": 80, "jarm": "xyz", "icp": ""})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );
            let item = ResultItem::from_row(&row, &[], 0);
            assert_eq!(item.id, "abc");
            assert_eq!(item.port, Some(80));
            assert_eq!(item.extra.get("jarm").map(String::as_str), Some("xyz"));
            assert!(!item.extra.contains_key("icp"));
        }

        #[test]
        fn scalar_row_maps_to_first_field() {
            let item = ResultItem::from_row(&RawRow::Scalar(json!("example.com")), &["host"], 0);
            assert_eq!(item.host, "example.com");
            assert_eq!(item.url(), "http://example.com");
        }

        #[test]
        fn link_takes_precedence_for_url() {
            let item = ResultItem {
                link: "https://a.example".into(),
                host: "b.example".into(),
                ..Default::default()
            };
            assert_eq!(item.url(), "https://a.example");
        }

        #[test]
        fn account_message_accepts_errmsg() {
            let info = decode_account_body(r#"{"error":true,"errmsg":"[-700] Account Invalid"}"#)
                .unwrap();
            assert!(info.error);
            assert_eq!(info.message, "[-700] Account Invalid");
        }

        #[test]
        fn errmsg_wins_when_message_is_also_present() {
            let info = decode_account_body(
                r#"{"error":true,"errmsg":"[-700] Account Invalid","message":""}"#,
            )
            .unwrap();
            assert_eq!(info.message, "[-700] Account Invalid");

            let info = decode_account_body(r#"{"error":false,"message":"ok","username":"a"}"#)
                .unwrap();
            assert_eq!(info.message, "ok");
        }
    }
}
