//! Document loader: fetch (or read) the `OpenAPI` document and parse it.
//!
//! A single attempt is made; callers decide whether to retry the whole load.

use crate::config::HashPolicy;
use crate::document::Document;
use crate::error::{LoadError, redact_url, sanitize_reqwest_error};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use url::Url;

/// Where the document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecLocation {
    Url(Url),
    File(PathBuf),
}

impl SpecLocation {
    /// Parse a spec location into a URL or a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the location is an invalid URL or invalid file URL.
    pub fn parse(location: &str) -> Result<Self, LoadError> {
        let invalid = |message: String| LoadError::InvalidLocation {
            location: location.to_string(),
            message,
        };

        if location.starts_with("http://") || location.starts_with("https://") {
            let mut url = Url::parse(location).map_err(|e| invalid(e.to_string()))?;
            url.set_fragment(None);
            Ok(SpecLocation::Url(url))
        } else if location.starts_with("file://") {
            let url = Url::parse(location).map_err(|e| invalid(e.to_string()))?;
            let path = url
                .to_file_path()
                .map_err(|()| invalid("cannot convert file URL to a path".to_string()))?;
            Ok(SpecLocation::File(path))
        } else if location.trim().is_empty() {
            Err(invalid("empty location".to_string()))
        } else {
            Ok(SpecLocation::File(PathBuf::from(location)))
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentLoader {
    client: Client,
    headers: Vec<(String, String)>,
    expected_hash: Option<String>,
    hash_policy: HashPolicy,
}

impl DocumentLoader {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            headers: Vec::new(),
            expected_hash: None,
            hash_policy: HashPolicy::Ignore,
        }
    }

    /// Headers sent with the spec fetch (URL locations only).
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Verify the document body against `sha256:<hex>`.
    #[must_use]
    pub fn with_expected_hash(mut self, expected: Option<String>, policy: HashPolicy) -> Self {
        self.expected_hash = expected;
        self.hash_policy = policy;
        self
    }

    /// Load and parse the document at `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] if the fetch fails, the server answers with a non-success status,
    /// the body cannot be read or parsed, or the hash check fails under [`HashPolicy::Fail`].
    pub async fn load(&self, location: &str) -> Result<Document, LoadError> {
        // URL locations are only ever logged or reported in redacted form.
        let (source, content) = match SpecLocation::parse(location)? {
            SpecLocation::Url(url) => (redact_url(&url), self.fetch(url).await?),
            SpecLocation::File(path) => {
                tracing::info!("Loading OpenAPI spec from {}", path.display());
                let content = tokio::fs::read_to_string(&path).await.map_err(|source| {
                    LoadError::ReadFile {
                        path: path.display().to_string(),
                        source,
                    }
                })?;
                (path.display().to_string(), content)
            }
        };
        let location = source.as_str();

        self.verify_hash(location, &content)?;

        let doc = Document::parse(location, &content)?;
        match doc.openapi_version() {
            Some(v) if v.starts_with("3.0") => {}
            Some(v) => tracing::warn!(
                version = %v,
                "OpenAPI spec at '{location}' is not 3.0.x; compiling anyway"
            ),
            None => tracing::warn!("OpenAPI spec at '{location}' has no 'openapi' version field"),
        }
        Ok(doc)
    }

    async fn fetch(&self, url: Url) -> Result<String, LoadError> {
        let display_url = redact_url(&url);
        tracing::info!("Fetching OpenAPI spec from {display_url}");

        let mut request = self.client.get(url);
        for (k, v) in &self.headers {
            request = request.header(k, v);
        }

        let resp = request.send().await.map_err(|e| LoadError::Fetch {
            url: display_url.clone(),
            message: sanitize_reqwest_error(&e),
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| LoadError::ReadBody {
            url: display_url.clone(),
            message: sanitize_reqwest_error(&e),
        })?;

        if !status.is_success() {
            return Err(LoadError::Status {
                url: display_url,
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    fn verify_hash(&self, location: &str, content: &str) -> Result<(), LoadError> {
        let Some(expected) = &self.expected_hash else {
            return Ok(());
        };
        let actual = content_hash(content);
        if actual == *expected {
            return Ok(());
        }
        match self.hash_policy {
            HashPolicy::Fail => Err(LoadError::HashMismatch {
                location: location.to_string(),
                expected: expected.clone(),
                actual,
            }),
            HashPolicy::Warn => {
                tracing::warn!(
                    "Spec hash mismatch for '{}'. Expected: {}, Got: {}",
                    location,
                    expected,
                    actual
                );
                Ok(())
            }
            HashPolicy::Ignore => Ok(()),
        }
    }
}

/// `sha256:<hex>` digest of a document body.
#[must_use]
pub fn content_hash(content: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(content.as_bytes())))
}
