//! `SchemaNode`: a closed model of the `OpenAPI` 3.0 schema object.
//!
//! A raw schema object may carry any combination of `$ref`, `enum`, `allOf`, `oneOf`, `anyOf`
//! and `type`. Exactly one of them decides the node's variant, by fixed precedence:
//!
//! `$ref` > `enum` (non-empty) > `allOf` > `oneOf` > `anyOf` > `type` > untyped
//!
//! `nullable` and `description` are modifiers carried by every variant. Sibling keywords of a
//! `$ref` are ignored, as `OpenAPI` 3.0 prescribes.

use crate::error::ResolutionError;
use indexmap::IndexMap;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub nullable: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKind {
    /// Local JSON pointer into the document, resolved before use.
    Reference(String),
    /// Literal set (at least one value).
    Enum(Vec<Value>),
    AllOf(Vec<SchemaNode>),
    OneOf(Vec<SchemaNode>),
    AnyOf(Vec<SchemaNode>),
    Primitive(PrimitiveType),
    /// `None` when `items` is absent (any element accepted).
    Array(Option<Box<SchemaNode>>),
    Object {
        properties: IndexMap<String, SchemaNode>,
        required: Vec<String>,
    },
    /// `type: null`. Not valid `OpenAPI` 3.0 but seen in the wild.
    Null,
    /// No recognizable type. `declared` holds an unknown `type` string, if one was given.
    Untyped { declared: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Number,
    Integer,
    Boolean,
}

impl SchemaNode {
    #[must_use]
    pub fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            description: None,
        }
    }

    /// Parse a raw schema object. `location` is used in error messages only.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::UnsupportedSchema`] for constructs outside the model: non-object
    /// schemas, `type` given as an array, non-string `$ref`, non-array combinators.
    pub fn parse(value: &Value, location: &str) -> Result<Self, ResolutionError> {
        let Some(obj) = value.as_object() else {
            return Err(unsupported(location, "schema must be an object"));
        };

        if let Some(reference) = obj.get("$ref") {
            let Some(reference) = reference.as_str() else {
                return Err(unsupported(location, "$ref must be a string"));
            };
            return Ok(SchemaNode::new(SchemaKind::Reference(reference.to_string())));
        }

        let kind = parse_kind(obj, location)?;
        let nullable = obj
            .get("nullable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(SchemaNode {
            kind,
            nullable,
            description,
        })
    }
}

fn parse_kind(obj: &Map<String, Value>, location: &str) -> Result<SchemaKind, ResolutionError> {
    if let Some(values) = obj.get("enum") {
        let Some(values) = values.as_array() else {
            return Err(unsupported(location, "enum must be an array"));
        };
        if !values.is_empty() {
            return Ok(SchemaKind::Enum(values.clone()));
        }
    }

    let combinators: [(&str, fn(Vec<SchemaNode>) -> SchemaKind); 3] = [
        ("allOf", SchemaKind::AllOf),
        ("oneOf", SchemaKind::OneOf),
        ("anyOf", SchemaKind::AnyOf),
    ];
    for (keyword, make) in combinators {
        if let Some(members) = obj.get(keyword) {
            let Some(members) = members.as_array() else {
                return Err(unsupported(location, &format!("{keyword} must be an array")));
            };
            if members.is_empty() {
                continue;
            }
            let nodes = members
                .iter()
                .enumerate()
                .map(|(i, m)| SchemaNode::parse(m, &format!("{location}/{keyword}/{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(make(nodes));
        }
    }

    match obj.get("type") {
        None => Ok(SchemaKind::Untyped { declared: None }),
        Some(Value::String(t)) => parse_typed(t, obj, location),
        Some(Value::Array(_)) => Err(unsupported(location, "array of types is not supported")),
        Some(other) => Err(unsupported(
            location,
            &format!("type must be a string, got {other}"),
        )),
    }
}

fn parse_typed(
    type_name: &str,
    obj: &Map<String, Value>,
    location: &str,
) -> Result<SchemaKind, ResolutionError> {
    let kind = match type_name {
        "string" => SchemaKind::Primitive(PrimitiveType::String),
        "number" => SchemaKind::Primitive(PrimitiveType::Number),
        "integer" => SchemaKind::Primitive(PrimitiveType::Integer),
        "boolean" => SchemaKind::Primitive(PrimitiveType::Boolean),
        "null" => SchemaKind::Null,
        "array" => {
            let items = match obj.get("items") {
                Some(items) => Some(Box::new(SchemaNode::parse(
                    items,
                    &format!("{location}/items"),
                )?)),
                None => None,
            };
            SchemaKind::Array(items)
        }
        "object" => {
            let mut properties = IndexMap::new();
            if let Some(props) = obj.get("properties") {
                let Some(props) = props.as_object() else {
                    return Err(unsupported(location, "properties must be an object"));
                };
                for (name, prop) in props {
                    let node = SchemaNode::parse(prop, &format!("{location}/properties/{name}"))?;
                    properties.insert(name.clone(), node);
                }
            }
            let required = match obj.get("required") {
                None => Vec::new(),
                Some(Value::Array(names)) => names
                    .iter()
                    .map(|n| {
                        n.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| unsupported(location, "required must list strings"))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                Some(_) => return Err(unsupported(location, "required must be an array")),
            };
            SchemaKind::Object {
                properties,
                required,
            }
        }
        other => SchemaKind::Untyped {
            declared: Some(other.to_string()),
        },
    };
    Ok(kind)
}

fn unsupported(location: &str, message: &str) -> ResolutionError {
    ResolutionError::UnsupportedSchema {
        location: location.to_string(),
        message: message.to_string(),
    }
}
