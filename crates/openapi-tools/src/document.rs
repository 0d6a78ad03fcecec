//! The loaded `OpenAPI` document and the declaration shapes read out of it.
//!
//! The document is kept as a raw JSON tree (key order preserved) rather than a fully typed
//! `openapiv3::OpenAPI`: a single malformed operation must not make the whole document
//! unloadable. Path items and operations are deserialized lazily by the compiler, one at a
//! time, so errors stay local to the operation that caused them.

use crate::error::LoadError;
use indexmap::IndexMap;
use openapiv3::ReferenceOr;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A parsed `OpenAPI` document. Immutable after load.
#[derive(Debug, Clone)]
pub struct Document {
    raw: Value,
}

impl Document {
    /// Parse document text. JSON is tried first, then YAML.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] if the text is neither JSON nor YAML, or if the root is not
    /// an object.
    pub fn parse(location: &str, content: &str) -> Result<Self, LoadError> {
        let raw: Value = match serde_json::from_str(content) {
            Ok(v) => v,
            Err(json_err) => serde_yaml::from_str(content).map_err(|yaml_err| LoadError::Parse {
                location: location.to_string(),
                message: format!("not valid JSON ({json_err}) or YAML ({yaml_err})"),
            })?,
        };
        Self::from_value(location, raw)
    }

    /// Wrap an already-parsed JSON tree.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] if the root is not a JSON object.
    pub fn from_value(location: &str, raw: Value) -> Result<Self, LoadError> {
        if !raw.is_object() {
            return Err(LoadError::Parse {
                location: location.to_string(),
                message: "document root must be an object".to_string(),
            });
        }
        Ok(Self { raw })
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// The `openapi` version string, if present.
    #[must_use]
    pub fn openapi_version(&self) -> Option<&str> {
        self.raw.get("openapi").and_then(Value::as_str)
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.raw
            .get("info")
            .and_then(|i| i.get("title"))
            .and_then(Value::as_str)
    }

    /// Path templates and their (unresolved) path items, in document order.
    pub fn paths(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.raw
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|paths| paths.iter().map(|(k, v)| (k.as_str(), v)))
    }
}

/// The eight HTTP verbs an `OpenAPI` path item can carry, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HttpVerb {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 8] = [
        HttpVerb::Get,
        HttpVerb::Put,
        HttpVerb::Post,
        HttpVerb::Delete,
        HttpVerb::Options,
        HttpVerb::Head,
        HttpVerb::Patch,
        HttpVerb::Trace,
    ];

    /// Lowercase name, as used for path item keys and the tool `method` selector.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Put => "put",
            HttpVerb::Post => "post",
            HttpVerb::Delete => "delete",
            HttpVerb::Options => "options",
            HttpVerb::Head => "head",
            HttpVerb::Patch => "patch",
            HttpVerb::Trace => "trace",
        }
    }

    #[must_use]
    pub fn method(self) -> reqwest::Method {
        match self {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Put => reqwest::Method::PUT,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Delete => reqwest::Method::DELETE,
            HttpVerb::Options => reqwest::Method::OPTIONS,
            HttpVerb::Head => reqwest::Method::HEAD,
            HttpVerb::Patch => reqwest::Method::PATCH,
            HttpVerb::Trace => reqwest::Method::TRACE,
        }
    }

    /// Verbs whose `application/json` argument is sent as the request body.
    #[must_use]
    pub fn carries_body(self) -> bool {
        matches!(self, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

impl FromStr for HttpVerb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        HttpVerb::ALL
            .into_iter()
            .find(|v| v.as_str() == lower)
            .ok_or_else(|| format!("unknown HTTP method '{s}'"))
    }
}

/// Where a parameter goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParamLocation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Header => "header",
            ParamLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path-level declarations shared by every operation on the path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItemDecl {
    #[serde(default)]
    pub parameters: Vec<ReferenceOr<ParameterDecl>>,
}

/// One verb on one path, as declared.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDecl {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<ReferenceOr<ParameterDecl>>,
    #[serde(default)]
    pub request_body: Option<ReferenceOr<RequestBodyDecl>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDecl {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub content: Option<IndexMap<String, MediaTypeDecl>>,
    /// Serialization style (`form`, `spaceDelimited`, ... for query parameters).
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub explode: Option<bool>,
    #[serde(default)]
    pub allow_reserved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestBodyDecl {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: IndexMap<String, MediaTypeDecl>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaTypeDecl {
    #[serde(default)]
    pub schema: Option<Value>,
}
