//! Error types for `statsig-openapi-tools`.
//!
//! Three failure families map onto the three pipeline stages: loading the document, resolving
//! and compiling its schemas, and dispatching calls. [`OpenApiToolsError`] wraps them for callers
//! that drive the whole pipeline.

use thiserror::Error;

/// The `OpenAPI` document could not be retrieved or parsed. Fatal to startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid OpenAPI spec location '{location}': {message}")]
    InvalidLocation { location: String, message: String },

    #[error("failed to fetch OpenAPI spec from '{url}': {message}")]
    Fetch { url: String, message: String },

    #[error("OpenAPI spec fetch from '{url}' returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("failed to read OpenAPI spec body from '{url}': {message}")]
    ReadBody { url: String, message: String },

    #[error("failed to read OpenAPI spec file '{path}': {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse OpenAPI spec from '{location}': {message}")]
    Parse { location: String, message: String },

    #[error("OpenAPI spec hash mismatch for '{location}'. Expected: {expected}, Got: {actual}")]
    HashMismatch {
        location: String,
        expected: String,
        actual: String,
    },
}

/// A schema or declaration could not be turned into a validator.
///
/// Raised per operation; the compiler skips the offending operation and keeps going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("unresolved $ref '{reference}'")]
    Unresolved { reference: String },

    #[error("cyclic $ref detected while resolving '{reference}'")]
    Cyclic { reference: String },

    #[error("external $ref '{reference}' is not supported (only local '#/...' pointers)")]
    External { reference: String },

    #[error("unsupported schema at {location}: {message}")]
    UnsupportedSchema { location: String, message: String },

    #[error("unsupported parameter '{name}': {message}")]
    UnsupportedParameter { name: String, message: String },

    #[error("parameter '{name}' appears in more than one location ({first} and {second})")]
    ParameterCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("malformed {what}: {message}")]
    Malformed { what: String, message: String },
}

/// A tool invocation failed. Always reported to the caller; never affects the registry.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("tool not found: {0}")]
    UnknownTool(String),

    #[error("method '{method}' is not available for tool '{tool}' (available: {available})")]
    UnknownMethod {
        tool: String,
        method: String,
        available: String,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("path parameter(s) {names} left unresolved in '{path}'")]
    UnresolvedPlaceholder { path: String, names: String },

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Upstream HTTP status, when the failure came from a non-success response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Main error type for the `OpenAPI` tooling.
#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    /// Configuration errors (invalid config, missing fields).
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Result type alias for `OpenAPI` tooling operations.
pub type Result<T> = std::result::Result<T, OpenApiToolsError>;

/// Render a `reqwest` error without leaking credentials or query strings from its URL.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

#[must_use]
pub fn redact_url(url: &url::Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}
