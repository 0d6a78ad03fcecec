//! `OpenAPI` tool source runtime.
//!
//! Loads the document once, compiles it, registers one tool per path and serves MCP
//! `tools/list` and `tools/call` from the resulting immutable registry.

use crate::compiler::{SkippedOperation, compile};
use crate::config::ApiServerConfig;
use crate::dispatch::{DispatchResponse, Dispatcher, ResponseBody};
use crate::document::Document;
use crate::error::{DispatchError, Result};
use crate::loader::DocumentLoader;
use crate::registry::Registry;
use reqwest::Client;
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use serde_json::Value;
use std::sync::Arc;

/// `OpenAPI` tool source that exposes the upstream API's paths as MCP tools.
///
/// Cheap to clone; all clones share one registry.
#[derive(Debug, Clone)]
pub struct OpenApiToolSource {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    title: Option<String>,
    registry: Registry,
    skipped: Vec<SkippedOperation>,
    dispatcher: Dispatcher,
}

impl OpenApiToolSource {
    /// Load, compile and register the API described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the document cannot be loaded. Operations
    /// that fail to compile are skipped, not reported as errors.
    pub async fn build(config: &ApiServerConfig) -> Result<Self> {
        Self::build_with_client(config, Client::new()).await
    }

    /// Like [`Self::build`], with a caller-provided HTTP client.
    ///
    /// # Errors
    ///
    /// See [`Self::build`].
    pub async fn build_with_client(config: &ApiServerConfig, client: Client) -> Result<Self> {
        config.validate()?;

        let location = config.spec_location();
        let doc = DocumentLoader::new(client.clone())
            .with_headers(config.request_headers())
            .with_expected_hash(config.spec_hash.clone(), config.spec_hash_policy)
            .load(&location)
            .await?;

        Ok(Self::from_document(config, &doc, client))
    }

    /// Compile and register an already-loaded document.
    #[must_use]
    pub fn from_document(config: &ApiServerConfig, doc: &Document, client: Client) -> Self {
        let output = compile(doc, &config.compile);
        let skipped = output.skipped.clone();
        let registry = Registry::register(output);
        tracing::info!(
            "Registered {} tools from '{}'",
            registry.len(),
            doc.title().unwrap_or("untitled API")
        );

        Self {
            inner: Arc::new(Inner {
                title: doc.title().map(str::to_string),
                registry,
                skipped,
                dispatcher: Dispatcher::new(client, config),
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Operations left out because they failed to compile.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedOperation] {
        &self.inner.skipped
    }

    /// The `info.title` of the loaded document.
    #[must_use]
    pub fn spec_title(&self) -> Option<&str> {
        self.inner.title.as_deref()
    }

    /// List the MCP `Tool`s exposed by this source.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.inner
            .registry
            .entries()
            .iter()
            .map(|e| {
                let schema_obj = e
                    .input_schema
                    .as_object()
                    .cloned()
                    .unwrap_or_else(JsonObject::new);
                let mut tool = Tool::new(e.id.clone(), e.description.clone(), Arc::new(schema_obj));
                tool.annotations = Some(e.annotations.clone());
                tool
            })
            .collect()
    }

    /// Dispatch one call without MCP rendering.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::invoke`].
    pub async fn invoke(
        &self,
        tool_id: &str,
        verb: Option<&str>,
        args: &Value,
    ) -> std::result::Result<DispatchResponse, DispatchError> {
        self.inner
            .dispatcher
            .invoke(&self.inner.registry, tool_id, verb, args)
            .await
    }

    /// Execute a tool call. The verb comes from the `method` argument.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the tool name or method is unknown
    /// - the arguments fail validation
    /// - the outbound HTTP request fails (transport or non-2xx response)
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult> {
        let verb = match arguments.get("method") {
            None | Some(Value::Null) => None,
            Some(Value::String(m)) => Some(m.as_str()),
            Some(other) => {
                return Err(DispatchError::InvalidArguments(format!(
                    "'method' must be a string, got {other}"
                ))
                .into());
            }
        };

        let resp = self.invoke(name, verb, &arguments).await?;
        Ok(render_response(resp.body))
    }
}

fn render_response(body: ResponseBody) -> CallToolResult {
    match body {
        ResponseBody::Json(Value::Object(obj)) => {
            let structured = Value::Object(obj);
            let text =
                serde_json::to_string(&structured).unwrap_or_else(|_| structured.to_string());
            CallToolResult {
                content: vec![Content::text(text)],
                structured_content: Some(structured),
                is_error: Some(false),
                meta: None,
            }
        }
        ResponseBody::Json(other) => CallToolResult::success(vec![Content::text(other.to_string())]),
        ResponseBody::Text(text) => CallToolResult::success(vec![Content::text(text)]),
    }
}
