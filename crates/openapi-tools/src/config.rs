use crate::error::{OpenApiToolsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_SPEC_PATH: &str = "/openapi.json";
pub const DEFAULT_API_KEY_HEADER: &str = "STATSIG-API-KEY";
pub const DEFAULT_API_VERSION_HEADER: &str = "STATSIG-API-VERSION";
pub const DEFAULT_API_VERSION: &str = "20240601";
pub const DEFAULT_INCLUSION_TAG: &str = "MCP";
pub const DEFAULT_WAREHOUSE_NATIVE_TAG: &str = "Warehouse Native";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for an OpenAPI-backed tool source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// Base URL every operation path is appended to (e.g. `https://host/console/v1`).
    pub base_url: String,

    /// Explicit spec location (URL or file path). Defaults to `{baseUrl}{specPath}`.
    #[serde(default)]
    pub spec_url: Option<String>,

    /// Spec path suffix used when `specUrl` is not set.
    #[serde(default = "default_spec_path")]
    pub spec_path: String,

    /// Optional spec hash (`sha256:<hex>`) for version detection.
    #[serde(default)]
    pub spec_hash: Option<String>,

    /// Hash policy: warn, fail, or ignore.
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,

    /// API key sent with every request (and the spec fetch).
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_api_version_header")]
    pub api_version_header: String,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Per-request timeout in seconds. `0` disables the timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Which operations get compiled, and how strictly.
    #[serde(default)]
    pub compile: CompileOptions,
}

fn default_spec_path() -> String {
    DEFAULT_SPEC_PATH.to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_api_version_header() -> String {
    DEFAULT_API_VERSION_HEADER.to_string()
}

impl ApiServerConfig {
    /// Config with every optional field at its default.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            spec_url: None,
            spec_path: default_spec_path(),
            spec_hash: None,
            spec_hash_policy: HashPolicy::default(),
            api_key: None,
            api_key_header: default_api_key_header(),
            api_version: default_api_version(),
            api_version_header: default_api_version_header(),
            headers: HashMap::new(),
            timeout_secs: None,
            compile: CompileOptions::default(),
        }
    }

    /// Where the `OpenAPI` document is fetched from.
    #[must_use]
    pub fn spec_location(&self) -> String {
        match &self.spec_url {
            Some(url) => url.clone(),
            None => format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.spec_path.trim_start_matches('/')
            ),
        }
    }

    /// Effective per-request timeout (`None` = disabled).
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        match self.timeout_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }

    /// Headers attached to every outbound request, in send order.
    #[must_use]
    pub fn request_headers(&self) -> Vec<(String, String)> {
        let mut out = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(key) = &self.api_key {
            out.push((self.api_key_header.clone(), key.clone()));
        }
        out.push((self.api_version_header.clone(), self.api_version.clone()));
        let mut extra: Vec<_> = self.headers.iter().collect();
        extra.sort();
        out.extend(extra.into_iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Validate the config before any network access.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute http(s) URL or a header name is empty.
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            OpenApiToolsError::Config(format!("Invalid baseUrl '{}': {e}", self.base_url))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(OpenApiToolsError::Config(format!(
                "Invalid baseUrl '{}': must be an absolute http(s) URL",
                self.base_url
            )));
        }
        if self.api_key_header.trim().is_empty() || self.api_version_header.trim().is_empty() {
            return Err(OpenApiToolsError::Config(
                "apiKeyHeader and apiVersionHeader must not be empty".to_string(),
            ));
        }
        if self.compile.include_only_tagged && self.compile.inclusion_tag.trim().is_empty() {
            return Err(OpenApiToolsError::Config(
                "includeOnlyTagged requires a non-empty inclusionTag".to_string(),
            ));
        }
        Ok(())
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail startup if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}

/// Compiler knobs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Only compile operations tagged with [`Self::inclusion_tag`].
    #[serde(default)]
    pub include_only_tagged: bool,

    #[serde(default = "default_inclusion_tag")]
    pub inclusion_tag: String,

    /// Tag marking an operation as warehouse-native.
    #[serde(default = "default_warehouse_native_tag")]
    pub warehouse_native_tag: String,

    #[serde(default)]
    pub warehouse_native: WarehouseNativeFilter,

    #[serde(default)]
    pub untyped_schemas: UntypedSchemaPolicy,
}

fn default_inclusion_tag() -> String {
    DEFAULT_INCLUSION_TAG.to_string()
}

fn default_warehouse_native_tag() -> String {
    DEFAULT_WAREHOUSE_NATIVE_TAG.to_string()
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            include_only_tagged: false,
            inclusion_tag: default_inclusion_tag(),
            warehouse_native_tag: default_warehouse_native_tag(),
            warehouse_native: WarehouseNativeFilter::default(),
            untyped_schemas: UntypedSchemaPolicy::default(),
        }
    }
}

/// Which operations to expose based on their warehouse-native classification.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseNativeFilter {
    #[default]
    All,
    /// Drop warehouse-native operations (cloud deployments).
    Exclude,
    /// Keep only warehouse-native operations.
    Only,
}

impl WarehouseNativeFilter {
    #[must_use]
    pub fn admits(self, warehouse_native: bool) -> bool {
        match self {
            WarehouseNativeFilter::All => true,
            WarehouseNativeFilter::Exclude => !warehouse_native,
            WarehouseNativeFilter::Only => warehouse_native,
        }
    }
}

/// What to do with a schema that has no `type`, `enum`, `allOf`, `oneOf` or `anyOf`.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UntypedSchemaPolicy {
    /// Accept any value.
    #[default]
    Permissive,
    /// Reject the schema (the owning operation is skipped).
    Strict,
}
