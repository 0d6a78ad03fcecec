//! Closed-form validator tree compiled from resolved schemas.
//!
//! A `Validator` both checks argument values at dispatch time and renders itself back to JSON
//! Schema for the tool's advertised input schema. It never contains references.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Validator {
    kind: ValidatorKind,
    nullable: bool,
    description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidatorKind {
    /// Accepts anything.
    Any,
    String,
    /// Any JSON number; integers are not distinguished.
    Number,
    Boolean,
    Null,
    Literal(Vec<Value>),
    Array(Box<Validator>),
    /// Keyed validator. Undeclared properties are accepted.
    Object(IndexMap<String, PropertyValidator>),
    /// Every member must accept the value.
    AllOf(Vec<Validator>),
    /// At least one member must accept the value; the first match wins.
    AnyOf(Vec<Validator>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValidator {
    pub validator: Validator,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// JSON-path-like location of the offending value (`$` is the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Replace the `$` root with a named argument, e.g. `$.ids[1]` → `filter.ids[1]`.
    #[must_use]
    pub fn rooted_at(self, name: &str) -> Self {
        Self {
            path: self.path.replacen('$', name, 1),
            message: self.message,
        }
    }
}

impl Validator {
    #[must_use]
    pub fn new(kind: ValidatorKind) -> Self {
        Self {
            kind,
            nullable: false,
            description: None,
        }
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new(ValidatorKind::Any)
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = self.nullable || nullable;
        self
    }

    #[must_use]
    pub fn described(mut self, description: Option<String>) -> Self {
        if description.is_some() {
            self.description = description;
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> &ValidatorKind {
        &self.kind
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Union of alternative validators: a value valid under any one of them is accepted.
    ///
    /// Identical alternatives collapse; a single distinct alternative is returned as-is.
    #[must_use]
    pub fn union(variants: Vec<Validator>) -> Validator {
        let mut distinct: Vec<Validator> = Vec::with_capacity(variants.len());
        for v in variants {
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }
        match distinct.len() {
            0 => Validator::any(),
            1 => distinct.remove(0),
            _ => Validator::new(ValidatorKind::AnyOf(distinct)),
        }
    }

    /// Check `value` against this validator.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        self.check(value, "$")
    }

    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), ValidationError> {
        if value.is_null() && self.nullable {
            return Ok(());
        }

        let fail = |message: String| {
            Err(ValidationError {
                path: path.to_string(),
                message,
            })
        };

        match &self.kind {
            ValidatorKind::Any => Ok(()),
            ValidatorKind::String if value.is_string() => Ok(()),
            ValidatorKind::Number if value.is_number() => Ok(()),
            ValidatorKind::Boolean if value.is_boolean() => Ok(()),
            ValidatorKind::Null if value.is_null() => Ok(()),
            ValidatorKind::String
            | ValidatorKind::Number
            | ValidatorKind::Boolean
            | ValidatorKind::Null => fail(format!(
                "expected {}, got {}",
                self.label(),
                json_kind(value)
            )),
            ValidatorKind::Literal(values) => {
                if values.contains(value) {
                    Ok(())
                } else {
                    fail(format!("expected {}, got {value}", self.label()))
                }
            }
            ValidatorKind::Array(item) => {
                let Some(items) = value.as_array() else {
                    return fail(format!("expected array, got {}", json_kind(value)));
                };
                for (i, v) in items.iter().enumerate() {
                    item.check(v, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            ValidatorKind::Object(properties) => {
                let Some(obj) = value.as_object() else {
                    return fail(format!("expected object, got {}", json_kind(value)));
                };
                for (name, prop) in properties {
                    let prop_path = format!("{path}.{name}");
                    match obj.get(name) {
                        Some(v) => prop.validator.check(v, &prop_path)?,
                        None if prop.required => {
                            return Err(ValidationError {
                                path: prop_path,
                                message: "missing required property".to_string(),
                            });
                        }
                        None => {}
                    }
                }
                Ok(())
            }
            ValidatorKind::AllOf(members) => {
                for m in members {
                    m.check(value, path)?;
                }
                Ok(())
            }
            ValidatorKind::AnyOf(members) => {
                if members.iter().any(|m| m.check(value, path).is_ok()) {
                    Ok(())
                } else {
                    fail(format!("expected {}, got {}", self.label(), json_kind(value)))
                }
            }
        }
    }

    /// Short human-readable type label, used in error messages.
    #[must_use]
    pub fn label(&self) -> String {
        let base = match &self.kind {
            ValidatorKind::Any => "any value".to_string(),
            ValidatorKind::String => "string".to_string(),
            ValidatorKind::Number => "number".to_string(),
            ValidatorKind::Boolean => "boolean".to_string(),
            ValidatorKind::Null => "null".to_string(),
            ValidatorKind::Literal(values) => {
                let rendered: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("one of [{}]", rendered.join(", "))
            }
            ValidatorKind::Array(item) => format!("array of {}", item.label()),
            ValidatorKind::Object(_) => "object".to_string(),
            ValidatorKind::AllOf(members) => {
                let labels: Vec<String> = members.iter().map(Validator::label).collect();
                labels.join(" & ")
            }
            ValidatorKind::AnyOf(members) => {
                let labels: Vec<String> = members.iter().map(Validator::label).collect();
                labels.join(" | ")
            }
        };
        if self.nullable {
            format!("{base} or null")
        } else {
            base
        }
    }

    /// Render as a JSON Schema fragment.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            ValidatorKind::Any => json!({}),
            ValidatorKind::String => json!({"type": "string"}),
            ValidatorKind::Number => json!({"type": "number"}),
            ValidatorKind::Boolean => json!({"type": "boolean"}),
            ValidatorKind::Null => json!({"type": "null"}),
            ValidatorKind::Literal(values) => json!({"enum": values}),
            ValidatorKind::Array(item) => json!({"type": "array", "items": item.to_json_schema()}),
            ValidatorKind::Object(properties) => {
                let mut props = serde_json::Map::new();
                let mut required: Vec<&str> = Vec::new();
                for (name, prop) in properties {
                    props.insert(name.clone(), prop.validator.to_json_schema());
                    if prop.required {
                        required.push(name);
                    }
                }
                let mut out = json!({"type": "object", "properties": props});
                if !required.is_empty() {
                    out["required"] = json!(required);
                }
                out
            }
            ValidatorKind::AllOf(members) => {
                json!({"allOf": members.iter().map(Validator::to_json_schema).collect::<Vec<_>>()})
            }
            ValidatorKind::AnyOf(members) => {
                json!({"anyOf": members.iter().map(Validator::to_json_schema).collect::<Vec<_>>()})
            }
        };

        if self.nullable {
            schema = make_nullable(schema, &self.kind);
        }
        if let Some(desc) = &self.description
            && let Some(obj) = schema.as_object_mut()
        {
            obj.insert("description".to_string(), Value::String(desc.clone()));
        }
        schema
    }
}

fn make_nullable(mut schema: Value, kind: &ValidatorKind) -> Value {
    match kind {
        ValidatorKind::Any | ValidatorKind::Null => schema,
        ValidatorKind::String
        | ValidatorKind::Number
        | ValidatorKind::Boolean
        | ValidatorKind::Array(_)
        | ValidatorKind::Object(_) => {
            if let Some(t) = schema.get("type").cloned() {
                schema["type"] = json!([t, "null"]);
            }
            schema
        }
        ValidatorKind::Literal(_) => {
            if let Some(values) = schema.get_mut("enum").and_then(Value::as_array_mut)
                && !values.contains(&Value::Null)
            {
                values.push(Value::Null);
            }
            schema
        }
        ValidatorKind::AllOf(_) | ValidatorKind::AnyOf(_) => {
            json!({"anyOf": [schema, {"type": "null"}]})
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
