//! Persisted API credentials.
//!
//! The store keeps the current [`ApiCredentials`] in a `watch` channel so
//! every consumer sees an update as soon as it is saved. Persistence is a
//! small JSON file written best-effort.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::watch;

use crate::error::SettingsError;
use crate::searcher::fofa_searcher::Searcher;

pub const DEFAULT_API_URL: &str = "https://fofa.xmint.cn/api/v1";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiCredentials {
    fn default() -> Self {
        ApiCredentials {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
        }
    }
}

impl ApiCredentials {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        ApiCredentials {
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Key with everything but the last four characters masked.
    pub fn masked_key(&self) -> String {
        let count = self.api_key.chars().count();
        if count <= 4 {
            return "*".repeat(count);
        }
        let tail: String = self.api_key.chars().skip(count - 4).collect();
        format!("{}{}", "*".repeat(count - 4), tail)
    }

    /// Copies non-empty values from `other` over `self`.
    fn overlay(&mut self, other: ApiCredentials) {
        if !other.api_url.trim().is_empty() {
            self.api_url = other.api_url;
        }
        if !other.api_key.trim().is_empty() {
            self.api_key = other.api_key;
        }
    }
}

pub struct CredentialStore {
    path: PathBuf,
    tx: watch::Sender<ApiCredentials>,
}

impl CredentialStore {
    /// Store backed by `<dir>/settings.json`. Holds defaults until
    /// [`CredentialStore::load`] runs.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let (tx, _rx) = watch::channel(ApiCredentials::default());
        CredentialStore {
            path: dir.as_ref().join(SETTINGS_FILE),
            tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> ApiCredentials {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ApiCredentials> {
        self.tx.subscribe()
    }

    /// Reads the settings file once. A missing or unreadable file keeps the
    /// defaults.
    pub async fn load(&self) -> ApiCredentials {
        match self.read_file().await {
            Ok(Some(stored)) => {
                tracing::debug!(path = %self.path.display(), "loaded API settings");
                self.tx.send_modify(|creds| creds.overlay(stored));
            }
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "no stored API settings");
            }
            Err(err) => {
                tracing::warn!(error = %err, "error reading API settings, using defaults");
            }
        }
        self.current()
    }

    async fn read_file(&self) -> Result<Option<ApiCredentials>, SettingsError> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(|source| SettingsError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Applies values for this process only, e.g. from flags or environment.
    pub fn apply_overrides(&self, api_url: Option<String>, api_key: Option<String>) {
        self.tx.send_modify(|creds| {
            creds.overlay(ApiCredentials::new(
                api_url.unwrap_or_default(),
                api_key.unwrap_or_default(),
            ))
        });
    }

    /// Publishes `creds` and writes them to disk. The in-memory value is
    /// updated even when the write fails.
    pub async fn save(&self, creds: ApiCredentials) -> Result<(), SettingsError> {
        self.tx.send_replace(creds.clone());
        if let Err(err) = self.write_file(&creds).await {
            tracing::warn!(error = %err, "error saving API settings");
            return Err(err);
        }
        tracing::info!(path = %self.path.display(), "saved API settings");
        Ok(())
    }

    async fn write_file(&self, creds: &ApiCredentials) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(creds)?;
        fs::write(&self.path, body).await.map_err(io_err)
    }

    pub async fn reset(&self) -> Result<(), SettingsError> {
        self.save(ApiCredentials::default()).await
    }

    /// Checks the candidate credentials against the account endpoint and
    /// saves them only when the service accepts the key.
    pub async fn validate_and_save<S: Searcher>(
        &self,
        searcher: &S,
        api_url: &str,
        api_key: &str,
    ) -> Result<ApiCredentials, SettingsError> {
        let api_url = if api_url.trim().is_empty() {
            DEFAULT_API_URL
        } else {
            api_url.trim()
        };
        let candidate = ApiCredentials::new(api_url, api_key.trim());

        let info = searcher.account_info(&candidate).await.map_err(|err| {
            tracing::debug!(error = %err, "credential validation request failed");
            SettingsError::Validation("Failed to reach the API, check the URL and key".to_string())
        })?;
        if info.error {
            let message = if info.message.trim().is_empty() {
                "API validation failed, check the settings".to_string()
            } else {
                info.message
            };
            return Err(SettingsError::Validation(message));
        }

        self.save(candidate.clone()).await?;
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserializer::fofa_response::{AccountInfo, SearchResponse};
    use crate::error::SearchError;
    use crate::searcher::fofa_searcher::SearchRequest;

    struct AccountOnly(Result<AccountInfo, ()>);

    impl Searcher for AccountOnly {
        async fn search(
            &self,
            _creds: &ApiCredentials,
            _request: &SearchRequest,
        ) -> Result<SearchResponse, SearchError> {
            Err(SearchError::InvalidQuery)
        }

        async fn account_info(&self, _creds: &ApiCredentials) -> Result<AccountInfo, SearchError> {
            self.0.clone().map_err(|_| SearchError::RateLimited)
        }
    }

    #[test]
    fn masked_key_keeps_tail() {
        let creds = ApiCredentials::new(DEFAULT_API_URL, "abcdef123456");
        assert_eq!(creds.masked_key(), "********3456");
        assert_eq!(ApiCredentials::default().masked_key(), "");
    }

    #[tokio::test]
    async fn defaults_before_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        assert_eq!(store.current(), ApiCredentials::default());
        assert_eq!(store.load().await, ApiCredentials::default());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested"));
        let creds = ApiCredentials::new("https://fofa.info/api/v1", "k3y");
        store.save(creds.clone()).await.unwrap();

        let reopened = CredentialStore::new(dir.path().join("nested"));
        assert_eq!(reopened.load().await, creds);
    }

    #[tokio::test]
    async fn empty_stored_values_keep_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"{"api_url":"","api_key":"abc"}"#)
            .unwrap();
        let store = CredentialStore::new(dir.path());
        let loaded = store.load().await;
        assert_eq!(loaded.api_url, DEFAULT_API_URL);
        assert_eq!(loaded.api_key, "abc");
    }

    #[tokio::test]
    async fn corrupt_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "not json").unwrap();
        let store = CredentialStore::new(dir.path());
        assert_eq!(store.load().await, ApiCredentials::default());
    }

    #[tokio::test]
    async fn save_notifies_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let mut rx = store.subscribe();
        store
            .save(ApiCredentials::new(DEFAULT_API_URL, "new"))
            .await
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().api_key, "new");
    }

    #[tokio::test]
    async fn overrides_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.apply_overrides(None, Some("from-env".into()));
        assert_eq!(store.current().api_key, "from-env");
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn rejected_key_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let searcher = AccountOnly(Ok(AccountInfo::unknown("[-700] Account Invalid")));
        let err = store
            .validate_and_save(&searcher, "", "bad")
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation(ref m) if m == "[-700] Account Invalid"));
        assert_eq!(store.current(), ApiCredentials::default());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn unreachable_api_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let err = store
            .validate_and_save(&AccountOnly(Err(())), DEFAULT_API_URL, "key")
            .await
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation(_)));
    }

    #[tokio::test]
    async fn accepted_key_is_saved_with_default_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let searcher = AccountOnly(Ok(AccountInfo::default()));
        let saved = store
            .validate_and_save(&searcher, "  ", " good ")
            .await
            .unwrap();
        assert_eq!(saved, ApiCredentials::new(DEFAULT_API_URL, "good"));
        assert_eq!(store.current(), saved);
        assert!(store.path().exists());
    }
}
