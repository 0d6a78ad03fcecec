//! Operation registry: one invocable tool per compiled path.
//!
//! The registry is built once from a [`CompileOutput`] and never mutated afterwards.

use crate::compiler::{CompileOutput, CompiledOperation, JSON_MEDIA_TYPE};
use crate::document::HttpVerb;
use crate::error::DispatchError;
use crate::semantics::annotations_for_verbs;
use crate::validator::Validator;
use indexmap::IndexMap;
use regex::Regex;
use rmcp::model::ToolAnnotations;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Maximum tool identifier length, suffix included.
pub const MAX_IDENTIFIER_LEN: usize = 64;

static NON_IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid identifier regex"));

/// Base identifier for a path template: every character outside `[A-Za-z0-9]` becomes `_`.
#[must_use]
pub fn tool_identifier(path: &str) -> String {
    let mut id = NON_IDENTIFIER_RE.replace_all(path, "_").into_owned();
    id.truncate(MAX_IDENTIFIER_LEN);
    id
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub id: String,
    pub path: String,
    /// Verb → operation, in declaration order. Never empty.
    pub operations: IndexMap<HttpVerb, CompiledOperation>,
    /// Parameter name → union of its validators across all verbs.
    pub merged_parameters: IndexMap<String, Validator>,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
}

impl RegistryEntry {
    pub fn verbs(&self) -> impl Iterator<Item = HttpVerb> + '_ {
        self.operations.keys().copied()
    }

    #[must_use]
    pub fn default_verb(&self) -> Option<HttpVerb> {
        self.verbs().next()
    }

    /// Pick the operation for `requested` (case-insensitive), or the first declared verb.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownMethod`] if the verb is not declared on this path.
    pub fn select(
        &self,
        requested: Option<&str>,
    ) -> Result<&CompiledOperation, DispatchError> {
        let unknown = |method: &str| DispatchError::UnknownMethod {
            tool: self.id.clone(),
            method: method.to_string(),
            available: self
                .verbs()
                .map(HttpVerb::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        };

        let verb = match requested {
            Some(m) => m.parse::<HttpVerb>().map_err(|_| unknown(m))?,
            None => self.default_verb().ok_or_else(|| unknown(""))?,
        };
        self.operations
            .get(&verb)
            .ok_or_else(|| unknown(verb.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build the registry from compiled paths, in document order.
    #[must_use]
    pub fn register(output: CompileOutput) -> Self {
        let mut registry = Registry::default();
        for (path, operations) in output.paths {
            if operations.is_empty() {
                continue;
            }
            let id = registry.reserve_identifier(&path);
            let entry = build_entry(id, path, operations);
            registry.index.insert(entry.id.clone(), registry.entries.len());
            registry.entries.push(entry);
        }
        registry
    }

    fn reserve_identifier(&self, path: &str) -> String {
        let base = tool_identifier(path);
        if !self.index.contains_key(&base) {
            return base;
        }

        let mut n = self.entries.len();
        loop {
            let suffix = format!("_{n}");
            let keep = MAX_IDENTIFIER_LEN.saturating_sub(suffix.len()).min(base.len());
            let candidate = format!("{}{suffix}", &base[..keep]);
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_entry(
    id: String,
    path: String,
    operations: IndexMap<HttpVerb, CompiledOperation>,
) -> RegistryEntry {
    let mut variants: IndexMap<String, Vec<Validator>> = IndexMap::new();
    for op in operations.values() {
        for (name, param) in &op.parameters {
            variants
                .entry(name.clone())
                .or_default()
                .push(param.validator.clone());
        }
    }
    let merged_parameters = variants
        .into_iter()
        .map(|(name, vs)| (name, Validator::union(vs)))
        .collect();

    let verbs: Vec<HttpVerb> = operations.keys().copied().collect();
    let description = aggregate_description(&path, &operations);
    let input_schema = input_schema(&operations);
    let title = match operations.values().next() {
        Some(op) if operations.len() == 1 => op.summary.clone(),
        _ => None,
    };

    RegistryEntry {
        id,
        path,
        merged_parameters,
        description,
        input_schema,
        annotations: annotations_for_verbs(&verbs, title),
        operations,
    }
}

fn aggregate_description(path: &str, operations: &IndexMap<HttpVerb, CompiledOperation>) -> String {
    if operations.len() == 1
        && let Some(op) = operations.values().next()
    {
        return op.summary_line();
    }

    let mut out = format!("Operations on {path}:");
    for (verb, op) in operations {
        out.push_str(&format!("\n- {verb}: {}", op.summary_line()));
    }
    out
}

fn input_schema(operations: &IndexMap<HttpVerb, CompiledOperation>) -> Value {
    let verbs: Vec<&str> = operations.keys().map(|v| v.as_str()).collect();

    let mut properties = Map::new();
    properties.insert(
        "method".to_string(),
        json!({
            "type": "string",
            "enum": verbs,
            "default": verbs.first(),
            "description": "HTTP method to invoke"
        }),
    );
    for (verb, op) in operations {
        properties.insert(verb.as_str().to_string(), verb_schema(op));
    }

    json!({
        "type": "object",
        "properties": properties
    })
}

fn verb_schema(op: &CompiledOperation) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();

    for (name, param) in &op.parameters {
        properties.insert(name.clone(), param.validator.to_json_schema());
        if param.required {
            required.push(name.clone());
        }
    }
    if let Some(body) = &op.body {
        let mut schema = body.validator.to_json_schema();
        if let (Some(desc), Some(obj)) = (&body.description, schema.as_object_mut()) {
            obj.entry("description")
                .or_insert_with(|| Value::String(desc.clone()));
        }
        properties.insert(JSON_MEDIA_TYPE.to_string(), schema);
        if body.required {
            required.push(JSON_MEDIA_TYPE.to_string());
        }
    }

    let mut schema = json!({
        "type": "object",
        "description": op.summary_line(),
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}
