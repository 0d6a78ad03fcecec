//! Dispatcher: turns a tool call into one HTTP request against the upstream API.

use crate::compiler::{CompiledOperation, JSON_MEDIA_TYPE, QuerySerialization, path_placeholders};
use crate::config::ApiServerConfig;
use crate::document::ParamLocation;
use crate::error::{DispatchError, redact_url, sanitize_reqwest_error};
use crate::registry::{Registry, RegistryEntry};
use base64::Engine as _;
use mime::Mime;
use openapiv3::QueryStyle;
use reqwest::Client;
use serde_json::{Map, Value, json};
use std::time::Duration;
use url::Url;

/// Decoded upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Parsed JSON, or the base64 envelope for non-UTF-8 bodies.
    Json(Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QueryPair {
    key: String,
    value: String,
    allow_reserved: bool,
}

#[derive(Debug, Default)]
struct RequestParts {
    path: String,
    query_params: Vec<QueryPair>,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    base_url: String,
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(client: Client, config: &ApiServerConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            headers: config.request_headers(),
            timeout: config.request_timeout(),
        }
    }

    /// Invoke `tool_id` with `verb` (first declared verb when `None`) and `args`.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] for unknown tools or verbs, invalid arguments, unresolved path
    /// placeholders, transport failures and non-success responses.
    pub async fn invoke(
        &self,
        registry: &Registry,
        tool_id: &str,
        verb: Option<&str>,
        args: &Value,
    ) -> Result<DispatchResponse, DispatchError> {
        let entry = registry
            .get(tool_id)
            .ok_or_else(|| DispatchError::UnknownTool(tool_id.to_string()))?;
        let op = entry.select(verb)?;
        let bag = argument_bag(op, args)?;
        validate_arguments(entry, op, &bag)?;

        let parts = build_request_parts(op, &bag)?;
        let url = build_url(&self.base_url, &parts.path, &parts.query_params)?;
        tracing::debug!(
            "Dispatching {} {} for tool '{}'",
            op.verb,
            redact_url(&url),
            tool_id
        );

        let mut request = self.client.request(op.verb.method(), url);
        for (key, value) in self.headers.iter().chain(&parts.headers) {
            request = request.header(key, value);
        }
        if let Some(body) = &parts.body {
            request = request.json(body);
        }
        if let Some(t) = self.timeout {
            request = request.timeout(t);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::Transport(sanitize_reqwest_error(&e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DispatchError::Transport(sanitize_reqwest_error(&e)))?;

        if !status.is_success() {
            return Err(DispatchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(DispatchResponse {
            status: status.as_u16(),
            body: decode_body(&bytes, content_type.as_deref()),
            content_type,
        })
    }
}

/// The `<verb>` sub-object when present, otherwise the flat arguments minus `method`.
fn argument_bag(op: &CompiledOperation, args: &Value) -> Result<Map<String, Value>, DispatchError> {
    let flat = match args {
        Value::Null => return Ok(Map::new()),
        Value::Object(map) => map,
        other => {
            return Err(DispatchError::InvalidArguments(format!(
                "arguments must be an object, got {other}"
            )));
        }
    };

    match flat.get(op.verb.as_str()) {
        Some(Value::Object(scoped)) => Ok(scoped.clone()),
        Some(other) => Err(DispatchError::InvalidArguments(format!(
            "'{}' must be an object, got {other}",
            op.verb.as_str()
        ))),
        None => {
            let mut bag = flat.clone();
            bag.remove("method");
            Ok(bag)
        }
    }
}

fn validate_arguments(
    entry: &RegistryEntry,
    op: &CompiledOperation,
    bag: &Map<String, Value>,
) -> Result<(), DispatchError> {
    for (name, param) in &op.parameters {
        let validator = entry
            .merged_parameters
            .get(name)
            .unwrap_or(&param.validator);
        match bag.get(name) {
            None if param.required => {
                return Err(DispatchError::InvalidArguments(format!(
                    "missing required parameter '{name}'"
                )));
            }
            Some(Value::Null) if param.required && !validator.is_nullable() => {
                return Err(DispatchError::InvalidArguments(format!(
                    "missing required parameter '{name}'"
                )));
            }
            None | Some(Value::Null) => {}
            Some(value) => {
                validator.validate(value).map_err(|e| {
                    DispatchError::InvalidArguments(e.rooted_at(name).to_string())
                })?;
            }
        }
    }

    match &op.body {
        Some(body) => body
            .validate(bag.get(JSON_MEDIA_TYPE))
            .map_err(|e| DispatchError::InvalidArguments(e.to_string())),
        None => {
            if bag.contains_key(JSON_MEDIA_TYPE) {
                tracing::debug!(
                    "{} {} takes no JSON body; ignoring '{}' argument",
                    op.verb,
                    op.path,
                    JSON_MEDIA_TYPE
                );
            }
            Ok(())
        }
    }
}

fn build_request_parts(
    op: &CompiledOperation,
    bag: &Map<String, Value>,
) -> Result<RequestParts, DispatchError> {
    let mut parts = RequestParts {
        path: op.path.clone(),
        ..RequestParts::default()
    };
    let mut cookies: Vec<String> = Vec::new();

    for (name, param) in &op.parameters {
        let Some(value) = bag.get(name).filter(|v| !v.is_null()) else {
            continue;
        };
        match param.location {
            ParamLocation::Path => {
                let encoded = encode_component(&value_to_string(value), false);
                parts.path = parts.path.replace(&format!("{{{name}}}"), &encoded);
            }
            ParamLocation::Query => {
                let default_ser = QuerySerialization::default();
                let ser = param.query.as_ref().unwrap_or(&default_ser);
                parts
                    .query_params
                    .extend(serialize_query_param(name, value, ser));
            }
            ParamLocation::Header => {
                parts.headers.push((name.clone(), value_to_string(value)));
            }
            ParamLocation::Cookie => {
                cookies.push(format!(
                    "{}={}",
                    name,
                    encode_component(&value_to_string(value), false)
                ));
            }
        }
    }
    if !cookies.is_empty() {
        parts.headers.push(("Cookie".to_string(), cookies.join("; ")));
    }

    let leftover = path_placeholders(&parts.path);
    if !leftover.is_empty() {
        return Err(DispatchError::UnresolvedPlaceholder {
            path: op.path.clone(),
            names: leftover.join(", "),
        });
    }

    if op.verb.carries_body() && op.body.is_some() {
        parts.body = bag.get(JSON_MEDIA_TYPE).filter(|v| !v.is_null()).cloned();
    }

    if !parts.path.starts_with('/') {
        parts.path = format!("/{}", parts.path);
    }
    Ok(parts)
}

fn build_url(base_url: &str, path: &str, query_params: &[QueryPair]) -> Result<Url, DispatchError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    let mut url = Url::parse(&url).map_err(|e| DispatchError::InvalidUrl(e.to_string()))?;

    if !query_params.is_empty() {
        let query = query_params
            .iter()
            .map(|p| {
                format!(
                    "{}={}",
                    encode_component(&p.key, false),
                    encode_component(&p.value, p.allow_reserved)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    Ok(url)
}

fn serialize_query_param(name: &str, value: &Value, ser: &QuerySerialization) -> Vec<QueryPair> {
    let pair = |key: String, value: String| QueryPair {
        key,
        value,
        allow_reserved: ser.allow_reserved,
    };

    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Vec::new();
            }
            let items: Vec<String> = items.iter().map(value_to_string).collect();
            match (&ser.style, ser.explode) {
                (QueryStyle::Form, true) => items
                    .into_iter()
                    .map(|v| pair(name.to_string(), v))
                    .collect(),
                (QueryStyle::SpaceDelimited, _) => vec![pair(name.to_string(), items.join(" "))],
                (QueryStyle::PipeDelimited, _) => vec![pair(name.to_string(), items.join("|"))],
                (QueryStyle::Form | QueryStyle::DeepObject, _) => {
                    vec![pair(name.to_string(), items.join(","))]
                }
            }
        }
        Value::Object(map) => match (&ser.style, ser.explode) {
            (QueryStyle::DeepObject, _) => map
                .iter()
                .map(|(k, v)| pair(format!("{name}[{k}]"), value_to_string(v)))
                .collect(),
            (QueryStyle::Form, true) => map
                .iter()
                .map(|(k, v)| pair(k.clone(), value_to_string(v)))
                .collect(),
            (QueryStyle::Form, false) => {
                if map.is_empty() {
                    return Vec::new();
                }
                let flat: Vec<String> = map
                    .iter()
                    .flat_map(|(k, v)| [k.clone(), value_to_string(v)])
                    .collect();
                vec![pair(name.to_string(), flat.join(","))]
            }
            (QueryStyle::SpaceDelimited | QueryStyle::PipeDelimited, _) => {
                vec![pair(name.to_string(), Value::Object(map.clone()).to_string())]
            }
        },
        _ => vec![pair(name.to_string(), value_to_string(value))],
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set. With `allow_reserved`, the
/// reserved characters that do not split query pairs are kept as-is.
fn encode_component(s: &str, allow_reserved: bool) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) || (allow_reserved && is_reserved_but_safe_in_pairs(b)) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

// '&', '=' and '#' stay encoded.
fn is_reserved_but_safe_in_pairs(b: u8) -> bool {
    matches!(
        b,
        b':' | b'/' | b'?' | b'[' | b']' | b'@' | b'!' | b'$' | b'\'' | b'(' | b')' | b'*' | b'+'
            | b',' | b';'
    )
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(m) = content_type.and_then(|ct| ct.parse::<Mime>().ok()) else {
        return false;
    };
    m.essence_str() == JSON_MEDIA_TYPE || m.suffix().is_some_and(|s| s.as_str() == "json")
}

fn decode_body(bytes: &[u8], content_type: Option<&str>) -> ResponseBody {
    let Ok(text) = std::str::from_utf8(bytes) else {
        return ResponseBody::Json(json!({
            "encoding": "base64",
            "mimeType": content_type,
            "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        }));
    };
    if is_json_content_type(content_type)
        && let Ok(value) = serde_json::from_str::<Value>(text)
    {
        return ResponseBody::Json(value);
    }
    ResponseBody::Text(text.to_string())
}
