//! Schema resolver & compiler: `Document` → per-path, per-verb `CompiledOperation`s.
//!
//! Compilation is a pure pass over the document. Failures are isolated per operation: an
//! operation that cannot be compiled is logged, recorded in [`CompileOutput::skipped`] and left
//! out, while every other operation is still compiled.

use crate::config::{CompileOptions, UntypedSchemaPolicy};
use crate::document::{
    Document, HttpVerb, OperationDecl, ParamLocation, ParameterDecl, PathItemDecl,
    RequestBodyDecl,
};
use crate::error::ResolutionError;
use crate::resolver::ComponentRegistry;
use crate::schema::{PrimitiveType, SchemaKind, SchemaNode};
use crate::validator::{PropertyValidator, ValidationError, Validator, ValidatorKind};
use indexmap::IndexMap;
use mime::Mime;
use openapiv3::QueryStyle;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// The only request-body media type that is compiled.
pub const JSON_MEDIA_TYPE: &str = "application/json";

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid placeholder regex"));

/// Names of the `{name}` placeholders in a path template, in order.
#[must_use]
pub fn path_placeholders(path: &str) -> Vec<String> {
    PLACEHOLDER_RE
        .captures_iter(path)
        .map(|c| c[1].to_string())
        .collect()
}

#[derive(Debug, Clone)]
pub struct QuerySerialization {
    pub style: QueryStyle,
    pub explode: bool,
    pub allow_reserved: bool,
}

impl Default for QuerySerialization {
    fn default() -> Self {
        Self {
            style: QueryStyle::Form,
            explode: true,
            allow_reserved: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledParameter {
    pub name: String,
    pub location: ParamLocation,
    pub required: bool,
    pub validator: Validator,
    /// Set for query parameters only.
    pub query: Option<QuerySerialization>,
}

impl CompiledParameter {
    /// Validate an argument. `null` on an optional parameter counts as absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required value is missing or the value is invalid.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        check_optional(&self.validator, self.required, &self.name, value)
    }
}

#[derive(Debug, Clone)]
pub struct CompiledBody {
    pub required: bool,
    pub description: Option<String>,
    pub validator: Validator,
}

impl CompiledBody {
    /// Validate a request body. A non-required body may be absent.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a required body is missing or the body is invalid.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        check_optional(&self.validator, self.required, JSON_MEDIA_TYPE, value)
    }
}

fn check_optional(
    validator: &Validator,
    required: bool,
    name: &str,
    value: Option<&Value>,
) -> Result<(), ValidationError> {
    match value {
        None => {
            if required {
                Err(ValidationError {
                    path: name.to_string(),
                    message: "missing required value".to_string(),
                })
            } else {
                Ok(())
            }
        }
        Some(Value::Null) if !required && !validator.is_nullable() => Ok(()),
        Some(v) => validator.validate(v).map_err(|e| e.rooted_at(name)),
    }
}

/// `$ref`-free form of one verb on one path.
#[derive(Debug, Clone)]
pub struct CompiledOperation {
    pub verb: HttpVerb,
    pub path: String,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub parameters: IndexMap<String, CompiledParameter>,
    pub body: Option<CompiledBody>,
    /// Names of the parameters located in the path.
    pub path_params: Vec<String>,
    pub warehouse_native: bool,
}

impl CompiledOperation {
    /// One-line human description: summary, else description, else `Calls VERB /path`.
    #[must_use]
    pub fn summary_line(&self) -> String {
        self.summary
            .as_deref()
            .or(self.description.as_deref())
            .map(|s| s.lines().next().unwrap_or_default().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Calls {} {}", self.verb, self.path))
    }
}

#[derive(Debug, Clone)]
pub struct SkippedOperation {
    pub path: String,
    /// `None` when the whole path item was unusable.
    pub verb: Option<HttpVerb>,
    pub error: ResolutionError,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Path template → verb → compiled operation, in document order.
    pub paths: IndexMap<String, IndexMap<HttpVerb, CompiledOperation>>,
    pub skipped: Vec<SkippedOperation>,
}

impl CompileOutput {
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(IndexMap::len).sum()
    }
}

/// Compile every operation in `doc`.
#[must_use]
pub fn compile(doc: &Document, options: &CompileOptions) -> CompileOutput {
    let registry = ComponentRegistry::new(doc);
    let schemas = SchemaCompiler {
        registry,
        policy: options.untyped_schemas,
    };
    let mut out = CompileOutput::default();

    for (path, raw_item) in doc.paths() {
        let item_value = match resolve_path_item(registry, raw_item) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Skipping path '{}': {}", path, e);
                out.skipped.push(SkippedOperation {
                    path: path.to_string(),
                    verb: None,
                    error: e,
                });
                continue;
            }
        };
        let path_item = match PathItemDecl::deserialize(item_value) {
            Ok(p) => p,
            Err(e) => {
                let error = ResolutionError::Malformed {
                    what: format!("path item '{path}'"),
                    message: e.to_string(),
                };
                tracing::warn!("Skipping path '{}': {}", path, error);
                out.skipped.push(SkippedOperation {
                    path: path.to_string(),
                    verb: None,
                    error,
                });
                continue;
            }
        };

        let mut compiled: IndexMap<HttpVerb, CompiledOperation> = IndexMap::new();
        for verb in HttpVerb::ALL {
            let Some(op_value) = item_value.get(verb.as_str()) else {
                continue;
            };

            let result = OperationDecl::deserialize(op_value)
                .map_err(|e| ResolutionError::Malformed {
                    what: format!("operation {verb} {path}"),
                    message: e.to_string(),
                })
                .and_then(|op| {
                    if !is_selected(&op, options) {
                        return Ok(None);
                    }
                    let input = OperationInput {
                        path,
                        verb,
                        path_item: &path_item,
                        operation: &op,
                    };
                    compile_operation(&schemas, &input, options).map(Some)
                });

            match result {
                Ok(Some(op)) => {
                    compiled.insert(verb, op);
                }
                Ok(None) => {
                    tracing::debug!("Filtered out {} {} by tag selection", verb, path);
                }
                Err(e) => {
                    tracing::warn!("Skipping {} {}: {}", verb, path, e);
                    out.skipped.push(SkippedOperation {
                        path: path.to_string(),
                        verb: Some(verb),
                        error: e,
                    });
                }
            }
        }

        if !compiled.is_empty() {
            out.paths.insert(path.to_string(), compiled);
        }
    }

    tracing::info!(
        "Compiled {} operations across {} paths ({} skipped)",
        out.operation_count(),
        out.paths.len(),
        out.skipped.len()
    );
    out
}

fn resolve_path_item<'a>(
    registry: ComponentRegistry<'a>,
    raw: &'a Value,
) -> Result<&'a Value, ResolutionError> {
    let mut seen: Vec<&str> = Vec::new();
    let mut cur = raw;
    while let Some(reference) = cur.get("$ref").and_then(Value::as_str) {
        if seen.contains(&reference) {
            return Err(ResolutionError::Cyclic {
                reference: reference.to_string(),
            });
        }
        seen.push(reference);
        cur = registry.lookup(reference)?;
    }
    Ok(cur)
}

fn is_warehouse_native(op: &OperationDecl, options: &CompileOptions) -> bool {
    op.tags
        .iter()
        .any(|t| t.eq_ignore_ascii_case(&options.warehouse_native_tag))
}

fn is_selected(op: &OperationDecl, options: &CompileOptions) -> bool {
    if options.include_only_tagged && !op.tags.iter().any(|t| *t == options.inclusion_tag) {
        return false;
    }
    options
        .warehouse_native
        .admits(is_warehouse_native(op, options))
}

struct OperationInput<'a> {
    path: &'a str,
    verb: HttpVerb,
    path_item: &'a PathItemDecl,
    operation: &'a OperationDecl,
}

fn compile_operation(
    schemas: &SchemaCompiler<'_>,
    input: &OperationInput<'_>,
    options: &CompileOptions,
) -> Result<CompiledOperation, ResolutionError> {
    let OperationInput {
        path,
        verb,
        path_item,
        operation,
    } = *input;

    let merged = merge_parameters(
        schemas.registry,
        &path_item.parameters,
        &operation.parameters,
    )?;

    let mut parameters: IndexMap<String, CompiledParameter> = IndexMap::new();
    for decl in merged {
        let param = compile_parameter(schemas, &decl, verb, path)?;
        parameters.insert(param.name.clone(), param);
    }

    let body = match &operation.request_body {
        Some(_) if !verb.carries_body() => {
            tracing::debug!("{} {}: ignoring request body on a verb that sends none", verb, path);
            None
        }
        Some(body_ref) => {
            let body: RequestBodyDecl = schemas.registry.resolve(body_ref, "request body")?;
            compile_body(schemas, &body, verb, path)?
        }
        None => None,
    };

    let path_params: Vec<String> = parameters
        .values()
        .filter(|p| p.location == ParamLocation::Path)
        .map(|p| p.name.clone())
        .collect();

    for placeholder in path_placeholders(path) {
        if !path_params.contains(&placeholder) {
            tracing::warn!(
                "{} {} has placeholder '{{{}}}' without a matching path parameter",
                verb,
                path,
                placeholder
            );
        }
    }

    Ok(CompiledOperation {
        verb,
        path: path.to_string(),
        operation_id: operation.operation_id.clone(),
        summary: operation.summary.clone(),
        description: operation.description.clone(),
        tags: operation.tags.clone(),
        parameters,
        body,
        path_params,
        warehouse_native: is_warehouse_native(operation, options),
    })
}

/// Merge path-level and operation-level parameters, keyed by name. An operation-level
/// declaration replaces the path-level one in place, whatever its location. Within one level, a
/// name declared in two locations is a collision.
fn merge_parameters(
    registry: ComponentRegistry<'_>,
    path_item_params: &[openapiv3::ReferenceOr<ParameterDecl>],
    operation_params: &[openapiv3::ReferenceOr<ParameterDecl>],
) -> Result<Vec<ParameterDecl>, ResolutionError> {
    let mut merged: IndexMap<String, ParameterDecl> = IndexMap::new();
    for level in [path_item_params, operation_params] {
        let mut declared: HashMap<String, ParamLocation> = HashMap::new();
        for p in level {
            let decl: ParameterDecl = registry.resolve(p, "parameter")?;
            if let Some(&first) = declared.get(&decl.name)
                && first != decl.location
            {
                return Err(ResolutionError::ParameterCollision {
                    name: decl.name.clone(),
                    first: first.to_string(),
                    second: decl.location.to_string(),
                });
            }
            declared.insert(decl.name.clone(), decl.location);
            merged.insert(decl.name.clone(), decl);
        }
    }
    Ok(merged.into_values().collect())
}

fn compile_parameter(
    schemas: &SchemaCompiler<'_>,
    decl: &ParameterDecl,
    verb: HttpVerb,
    path: &str,
) -> Result<CompiledParameter, ResolutionError> {
    let location = format!("{verb} {path} parameter '{}'", decl.name);

    let schema_value = decl.schema.as_ref().or_else(|| {
        decl.content
            .as_ref()
            .and_then(|c| json_media(c).and_then(|m| m.schema.as_ref()))
    });
    let node = match schema_value {
        Some(v) => SchemaNode::parse(v, &location)?,
        None => SchemaNode::new(SchemaKind::Untyped { declared: None }),
    };
    let validator = schemas
        .compile(&node, &location)?
        .described(decl.description.clone());

    let unsupported = |message: &str| ResolutionError::UnsupportedParameter {
        name: decl.name.clone(),
        message: message.to_string(),
    };
    match validator.kind() {
        ValidatorKind::Null => return Err(unsupported("null-typed parameters are not supported")),
        ValidatorKind::Object(_) | ValidatorKind::Array(_)
            if decl.location != ParamLocation::Query =>
        {
            return Err(unsupported(&format!(
                "structured {} parameters are not supported",
                decl.location
            )));
        }
        _ => {}
    }

    let query = (decl.location == ParamLocation::Query).then(|| query_serialization(decl));

    Ok(CompiledParameter {
        name: decl.name.clone(),
        location: decl.location,
        // Path parameters are always required.
        required: decl.required || decl.location == ParamLocation::Path,
        validator,
        query,
    })
}

fn query_serialization(decl: &ParameterDecl) -> QuerySerialization {
    let style = match decl.style.as_deref() {
        None | Some("form") => QueryStyle::Form,
        Some("spaceDelimited") => QueryStyle::SpaceDelimited,
        Some("pipeDelimited") => QueryStyle::PipeDelimited,
        Some("deepObject") => QueryStyle::DeepObject,
        Some(other) => {
            tracing::warn!(
                "Unknown query style '{}' for parameter '{}'; using form",
                other,
                decl.name
            );
            QueryStyle::Form
        }
    };
    let explode = decl
        .explode
        .unwrap_or(matches!(style, QueryStyle::Form | QueryStyle::DeepObject));
    QuerySerialization {
        style,
        explode,
        allow_reserved: decl.allow_reserved,
    }
}

fn json_media<M>(content: &IndexMap<String, M>) -> Option<&M> {
    content.iter().find_map(|(media_type, m)| {
        let parsed: Mime = media_type.parse().ok()?;
        (parsed.essence_str() == JSON_MEDIA_TYPE).then_some(m)
    })
}

fn compile_body(
    schemas: &SchemaCompiler<'_>,
    body: &RequestBodyDecl,
    verb: HttpVerb,
    path: &str,
) -> Result<Option<CompiledBody>, ResolutionError> {
    let Some(media) = json_media(&body.content) else {
        if !body.content.is_empty() {
            tracing::debug!(
                "{} {}: dropping request body without {} content",
                verb,
                path,
                JSON_MEDIA_TYPE
            );
        }
        return Ok(None);
    };

    let location = format!("{verb} {path} request body");
    let validator = match &media.schema {
        Some(v) => schemas.compile(&SchemaNode::parse(v, &location)?, &location)?,
        None => Validator::any(),
    };

    Ok(Some(CompiledBody {
        required: body.required,
        description: body.description.clone(),
        validator,
    }))
}

/// Converts resolved schema nodes into validators, expanding references as it goes.
struct SchemaCompiler<'a> {
    registry: ComponentRegistry<'a>,
    policy: UntypedSchemaPolicy,
}

impl SchemaCompiler<'_> {
    fn compile(&self, node: &SchemaNode, location: &str) -> Result<Validator, ResolutionError> {
        let mut in_progress: Vec<String> = Vec::new();
        self.compile_in(node, location, &mut in_progress)
    }

    fn compile_in(
        &self,
        node: &SchemaNode,
        location: &str,
        in_progress: &mut Vec<String>,
    ) -> Result<Validator, ResolutionError> {
        let kind = match &node.kind {
            SchemaKind::Reference(reference) => {
                let (terminal, chain) = self.registry.resolve_schema(reference, in_progress)?;
                let depth = chain.len();
                in_progress.extend(chain);
                let result = self.compile_in(&terminal, reference, in_progress);
                in_progress.truncate(in_progress.len() - depth);
                // Siblings of `$ref` carry no meaning.
                return result;
            }
            SchemaKind::Enum(values) => ValidatorKind::Literal(values.clone()),
            SchemaKind::AllOf(members) => {
                ValidatorKind::AllOf(self.compile_members(members, location, "allOf", in_progress)?)
            }
            SchemaKind::OneOf(members) => {
                ValidatorKind::AnyOf(self.compile_members(members, location, "oneOf", in_progress)?)
            }
            SchemaKind::AnyOf(members) => {
                ValidatorKind::AnyOf(self.compile_members(members, location, "anyOf", in_progress)?)
            }
            SchemaKind::Primitive(PrimitiveType::String) => ValidatorKind::String,
            SchemaKind::Primitive(PrimitiveType::Number | PrimitiveType::Integer) => {
                ValidatorKind::Number
            }
            SchemaKind::Primitive(PrimitiveType::Boolean) => ValidatorKind::Boolean,
            SchemaKind::Array(items) => {
                let item = match items {
                    Some(item) => {
                        self.compile_in(item, &format!("{location}/items"), in_progress)?
                    }
                    None => Validator::any(),
                };
                ValidatorKind::Array(Box::new(item))
            }
            SchemaKind::Object {
                properties,
                required,
            } => {
                let mut props: IndexMap<String, PropertyValidator> = IndexMap::new();
                for (name, prop) in properties {
                    let validator = self.compile_in(
                        prop,
                        &format!("{location}/properties/{name}"),
                        in_progress,
                    )?;
                    props.insert(
                        name.clone(),
                        PropertyValidator {
                            validator,
                            required: required.contains(name),
                        },
                    );
                }
                for name in required {
                    props
                        .entry(name.clone())
                        .or_insert_with(|| PropertyValidator {
                            validator: Validator::any(),
                            required: true,
                        });
                }
                ValidatorKind::Object(props)
            }
            SchemaKind::Null => ValidatorKind::Null,
            SchemaKind::Untyped { declared } => match self.policy {
                UntypedSchemaPolicy::Permissive => ValidatorKind::Any,
                UntypedSchemaPolicy::Strict => {
                    let message = match declared {
                        Some(t) => format!("unrecognized type '{t}'"),
                        None => "schema has no type, enum, allOf, oneOf or anyOf".to_string(),
                    };
                    return Err(ResolutionError::UnsupportedSchema {
                        location: location.to_string(),
                        message,
                    });
                }
            },
        };

        Ok(Validator::new(kind)
            .nullable(node.nullable)
            .described(node.description.clone()))
    }

    fn compile_members(
        &self,
        members: &[SchemaNode],
        location: &str,
        keyword: &str,
        in_progress: &mut Vec<String>,
    ) -> Result<Vec<Validator>, ResolutionError> {
        members
            .iter()
            .enumerate()
            .map(|(i, m)| self.compile_in(m, &format!("{location}/{keyword}/{i}"), in_progress))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile_yaml(yaml: &str) -> CompileOutput {
        compile_yaml_with(yaml, &CompileOptions::default())
    }

    fn compile_yaml_with(yaml: &str, options: &CompileOptions) -> CompileOutput {
        let doc = Document::parse("inline", yaml).unwrap();
        compile(&doc, options)
    }

    fn op<'a>(out: &'a CompileOutput, path: &str, verb: HttpVerb) -> &'a CompiledOperation {
        out.paths
            .get(path)
            .and_then(|ops| ops.get(&verb))
            .unwrap_or_else(|| panic!("missing {verb} {path}; skipped: {:?}", out.skipped))
    }

    #[test]
    fn empty_document_compiles_to_nothing() {
        let out = compile_yaml("openapi: 3.0.0\ninfo: {title: t, version: '1'}\npaths: {}\n");
        assert!(out.paths.is_empty());
        assert!(out.skipped.is_empty());

        let out = compile_yaml("openapi: 3.0.0\n");
        assert!(out.paths.is_empty());
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn compiles_path_parameters_and_flags() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /gates/{id}:
    get:
      summary: Read a gate
      tags: [Gates, Warehouse Native]
      parameters:
        - name: id
          in: path
          required: true
          schema: { type: string }
",
        );
        let get = op(&out, "/gates/{id}", HttpVerb::Get);
        assert_eq!(get.path_params, vec!["id".to_string()]);
        assert!(get.warehouse_native);
        assert!(get.body.is_none());
        assert_eq!(get.summary_line(), "Read a gate");

        let id = &get.parameters["id"];
        assert!(id.validate(Some(&json!("abc"))).is_ok());
        assert!(id.validate(Some(&json!(1))).is_err());
        assert!(id.validate(None).is_err());
    }

    #[test]
    fn required_and_optional_parameters() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /gates:
    get:
      parameters:
        - { name: limit, in: query, required: true, schema: { type: integer } }
        - { name: page, in: query, schema: { type: number } }
",
        );
        let get = op(&out, "/gates", HttpVerb::Get);
        let limit = &get.parameters["limit"];
        assert!(limit.validate(Some(&json!(10))).is_ok());
        // Integers and numbers are not distinguished.
        assert!(limit.validate(Some(&json!(10.5))).is_ok());
        assert!(limit.validate(Some(&json!("10"))).is_err());
        assert!(limit.validate(None).is_err());

        let page = &get.parameters["page"];
        assert!(page.validate(None).is_ok());
        assert!(page.validate(Some(&Value::Null)).is_ok());
        assert!(page.query.is_some());
    }

    #[test]
    fn ref_chains_equal_inlining() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
components:
  parameters:
    Limit: { $ref: '#/components/parameters/LimitImpl' }
    LimitImpl:
      name: limit
      in: query
      schema: { $ref: '#/components/schemas/L1' }
  schemas:
    L1: { $ref: '#/components/schemas/L2' }
    L2: { $ref: '#/components/schemas/L3' }
    L3: { type: integer }
paths:
  /a:
    get:
      parameters:
        - $ref: '#/components/parameters/Limit'
  /b:
    get:
      parameters:
        - { name: limit, in: query, schema: { type: integer } }
",
        );
        let a = &op(&out, "/a", HttpVerb::Get).parameters["limit"];
        let b = &op(&out, "/b", HttpVerb::Get).parameters["limit"];
        assert_eq!(a.validator, b.validator);
        assert_eq!(a.required, b.required);
    }

    #[test]
    fn one_of_string_integer() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /x:
    get:
      parameters:
        - name: v
          in: query
          required: true
          schema:
            oneOf: [ { type: string }, { type: integer } ]
",
        );
        let v = &op(&out, "/x", HttpVerb::Get).parameters["v"];
        assert!(v.validate(Some(&json!("x"))).is_ok());
        assert!(v.validate(Some(&json!(7))).is_ok());
        assert!(v.validate(Some(&json!(true))).is_err());
    }

    #[test]
    fn operation_level_parameter_wins() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /users:
    parameters:
      - { name: q, in: query, required: false, schema: { type: string } }
    get:
      parameters:
        - { name: q, in: query, required: true, schema: { type: number } }
    post: {}
",
        );
        let get_q = &op(&out, "/users", HttpVerb::Get).parameters["q"];
        assert!(get_q.required);
        assert!(get_q.validate(Some(&json!(1))).is_ok());
        assert!(get_q.validate(Some(&json!("s"))).is_err());

        let post_q = &op(&out, "/users", HttpVerb::Post).parameters["q"];
        assert!(!post_q.required);
        assert!(post_q.validate(Some(&json!("s"))).is_ok());
    }

    #[test]
    fn operation_level_parameter_replaces_path_level_across_locations() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /users:
    parameters:
      - { name: x, in: query, schema: { type: string } }
      - { name: page, in: query, schema: { type: number } }
    get:
      parameters:
        - { name: x, in: header, required: true, schema: { type: string } }
",
        );
        assert!(out.skipped.is_empty());
        let get = op(&out, "/users", HttpVerb::Get);
        let names: Vec<&str> = get.parameters.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["x", "page"]);
        assert_eq!(get.parameters["x"].location, ParamLocation::Header);
        assert!(get.parameters["x"].required);
        assert!(get.parameters["x"].query.is_none());
    }

    #[test]
    fn same_name_in_two_locations_is_a_collision() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /users/{id}:
    get:
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
        - { name: id, in: header, schema: { type: string } }
    delete:
      parameters:
        - { name: id, in: path, required: true, schema: { type: string } }
",
        );
        assert!(out.paths["/users/{id}"].contains_key(&HttpVerb::Delete));
        assert!(!out.paths["/users/{id}"].contains_key(&HttpVerb::Get));
        assert!(matches!(
            out.skipped[0].error,
            ResolutionError::ParameterCollision { .. }
        ));
    }

    #[test]
    fn failures_are_isolated_per_operation() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
components:
  schemas:
    Node:
      type: object
      properties:
        child: { $ref: '#/components/schemas/Node' }
paths:
  /broken:
    get:
      parameters:
        - name: x
          in: query
          schema: { $ref: '#/components/schemas/Missing' }
    post:
      requestBody:
        content:
          application/json:
            schema: { $ref: '#/components/schemas/Node' }
    put:
      parameters:
        - { name: t, in: query, schema: { type: [string, 'null'] } }
  /fine:
    get: {}
",
        );
        assert!(!out.paths.contains_key("/broken"));
        assert!(out.paths.contains_key("/fine"));
        assert_eq!(out.skipped.len(), 3);

        let by_verb = |v: HttpVerb| {
            &out.skipped
                .iter()
                .find(|s| s.verb == Some(v))
                .unwrap()
                .error
        };
        assert_eq!(
            by_verb(HttpVerb::Get),
            &ResolutionError::Unresolved {
                reference: "#/components/schemas/Missing".to_string()
            }
        );
        assert!(matches!(
            by_verb(HttpVerb::Post),
            ResolutionError::Cyclic { .. }
        ));
        assert!(matches!(
            by_verb(HttpVerb::Put),
            ResolutionError::UnsupportedSchema { .. }
        ));
    }

    #[test]
    fn untyped_schema_policy() {
        let yaml = r"
openapi: 3.0.0
paths:
  /x:
    get:
      parameters:
        - { name: anything, in: query, schema: { description: free-form } }
";
        let permissive = compile_yaml(yaml);
        let p = &op(&permissive, "/x", HttpVerb::Get).parameters["anything"];
        assert!(p.validate(Some(&json!(true))).is_ok());
        assert!(p.validate(Some(&json!("x"))).is_ok());

        let strict = compile_yaml_with(
            yaml,
            &CompileOptions {
                untyped_schemas: UntypedSchemaPolicy::Strict,
                ..CompileOptions::default()
            },
        );
        assert!(strict.paths.is_empty());
        assert!(matches!(
            strict.skipped[0].error,
            ResolutionError::UnsupportedSchema { .. }
        ));
    }

    #[test]
    fn parameter_shape_rules() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /q:
    get:
      parameters:
        - name: filter
          in: query
          style: deepObject
          schema: { type: object, properties: { status: { type: string } } }
  /p/{obj}:
    get:
      parameters:
        - { name: obj, in: path, required: true, schema: { type: object } }
  /n:
    get:
      parameters:
        - { name: nothing, in: query, schema: { type: 'null' } }
",
        );
        let filter = &op(&out, "/q", HttpVerb::Get).parameters["filter"];
        assert!(matches!(
            filter.query,
            Some(QuerySerialization {
                style: QueryStyle::DeepObject,
                explode: true,
                allow_reserved: false,
            })
        ));
        assert!(!out.paths.contains_key("/p/{obj}"));
        assert!(!out.paths.contains_key("/n"));
        assert!(
            out.skipped
                .iter()
                .all(|s| matches!(s.error, ResolutionError::UnsupportedParameter { .. }))
        );
    }

    #[test]
    fn request_body_json_only_and_optional() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
components:
  requestBodies:
    GateBody:
      required: true
      content:
        application/json; charset=utf-8:
          schema: { $ref: '#/components/schemas/Gate' }
  schemas:
    Gate:
      type: object
      required: [name]
      properties:
        name: { type: string }
        enabled: { type: boolean, nullable: true }
paths:
  /gates:
    post:
      requestBody: { $ref: '#/components/requestBodies/GateBody' }
    put:
      requestBody:
        content:
          application/json:
            schema: { type: object }
  /upload:
    post:
      requestBody:
        content:
          multipart/form-data:
            schema: { type: object }
",
        );
        let post = op(&out, "/gates", HttpVerb::Post);
        let body = post.body.as_ref().unwrap();
        assert!(body.required);
        assert!(body.validate(Some(&json!({"name": "g", "enabled": null}))).is_ok());
        assert!(body.validate(Some(&json!({"enabled": true}))).is_err());
        assert!(body.validate(None).is_err());

        let put_body = op(&out, "/gates", HttpVerb::Put).body.as_ref().unwrap();
        assert!(put_body.validate(None).is_ok());

        assert!(op(&out, "/upload", HttpVerb::Post).body.is_none());
    }

    #[test]
    fn body_is_only_compiled_for_verbs_that_send_one() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /gates/{id}:
    parameters:
      - { name: id, in: path, required: true, schema: { type: string } }
    delete:
      requestBody:
        required: true
        content:
          application/json:
            schema: { type: object, required: [reason], properties: { reason: { type: string } } }
    patch:
      requestBody:
        required: true
        content:
          application/json:
            schema: { type: object }
",
        );
        assert!(out.skipped.is_empty());
        assert!(op(&out, "/gates/{id}", HttpVerb::Delete).body.is_none());
        assert!(op(&out, "/gates/{id}", HttpVerb::Patch).body.is_some());
    }

    #[test]
    fn all_of_is_a_conjunction() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
paths:
  /x:
    post:
      requestBody:
        required: true
        content:
          application/json:
            schema:
              allOf:
                - { type: object, required: [a], properties: { a: { type: string } } }
                - { type: object, required: [b], properties: { b: { type: number } } }
",
        );
        let body = op(&out, "/x", HttpVerb::Post).body.as_ref().unwrap();
        assert!(body.validate(Some(&json!({"a": "x", "b": 1}))).is_ok());
        assert!(body.validate(Some(&json!({"a": "x"}))).is_err());
    }

    #[test]
    fn tag_and_warehouse_filters() {
        let yaml = r"
openapi: 3.0.0
paths:
  /a:
    get: { tags: [MCP] }
    post: { tags: [Other] }
  /b:
    get: { tags: [MCP, Warehouse Native] }
";
        let tagged = compile_yaml_with(
            yaml,
            &CompileOptions {
                include_only_tagged: true,
                ..CompileOptions::default()
            },
        );
        assert_eq!(tagged.operation_count(), 2);
        assert!(!tagged.paths["/a"].contains_key(&HttpVerb::Post));
        assert!(tagged.skipped.is_empty());

        let cloud = compile_yaml_with(
            yaml,
            &CompileOptions {
                warehouse_native: crate::config::WarehouseNativeFilter::Exclude,
                ..CompileOptions::default()
            },
        );
        assert!(!cloud.paths.contains_key("/b"));
        assert_eq!(cloud.operation_count(), 2);
    }

    #[test]
    fn path_item_ref_is_followed() {
        let out = compile_yaml(
            r"
openapi: 3.0.0
components:
  pathItems:
    Health:
      get: { summary: Health }
paths:
  /health:
    $ref: '#/components/pathItems/Health'
",
        );
        assert_eq!(op(&out, "/health", HttpVerb::Get).summary_line(), "Health");
    }

    #[test]
    fn placeholders_are_extracted_in_order() {
        assert_eq!(
            path_placeholders("/a/{x}/b/{y}"),
            vec!["x".to_string(), "y".to_string()]
        );
        assert!(path_placeholders("/plain").is_empty());
    }
}
