//! `$ref` resolution against the document's component registry.
//!
//! Only local references (`#/...` JSON pointers) are supported; the document is fetched once
//! and nothing else is loaded. A reference that points at another reference is followed until
//! a terminal value is reached. Revisiting a pointer along the way is a cycle.

use crate::document::Document;
use crate::error::ResolutionError;
use crate::schema::{SchemaKind, SchemaNode};
use openapiv3::ReferenceOr;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct ComponentRegistry<'a> {
    root: &'a Value,
}

impl<'a> ComponentRegistry<'a> {
    #[must_use]
    pub fn new(doc: &'a Document) -> Self {
        Self { root: doc.raw() }
    }

    /// Look up the raw value a single `$ref` points at (no chain following).
    ///
    /// # Errors
    ///
    /// Returns an error for external references, malformed fragments, or missing targets.
    pub fn lookup(&self, reference: &str) -> Result<&'a Value, ResolutionError> {
        let pointer = local_pointer(reference)?;
        if pointer.is_empty() {
            return Ok(self.root);
        }
        self.root
            .pointer(pointer)
            .ok_or_else(|| ResolutionError::Unresolved {
                reference: reference.to_string(),
            })
    }

    /// Resolve a `ReferenceOr<T>` (parameter, request body, ...) to its item, following chains.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unresolved, external, cyclic, or its target does not
    /// deserialize as `T`.
    pub fn resolve<T>(&self, item: &ReferenceOr<T>, what: &str) -> Result<T, ResolutionError>
    where
        T: Clone + DeserializeOwned,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut cur: ReferenceOr<T> = item.clone();

        loop {
            match cur {
                ReferenceOr::Item(item) => return Ok(item),
                ReferenceOr::Reference { reference } => {
                    if !seen.insert(reference.clone()) {
                        return Err(ResolutionError::Cyclic { reference });
                    }
                    let value = self.lookup(&reference)?;
                    cur = serde_json::from_value(value.clone()).map_err(|e| {
                        ResolutionError::Malformed {
                            what: format!("{what} at '{reference}'"),
                            message: e.to_string(),
                        }
                    })?;
                }
            }
        }
    }

    /// Follow a schema `$ref` chain to its terminal (non-reference) node.
    ///
    /// `in_progress` holds the references currently being expanded higher up the schema tree;
    /// reaching one of them again means the schema is recursive.
    ///
    /// # Errors
    ///
    /// Returns an error if a reference is unresolved, external, cyclic, or its target is not a
    /// supported schema.
    pub fn resolve_schema(
        &self,
        reference: &str,
        in_progress: &[String],
    ) -> Result<(SchemaNode, Vec<String>), ResolutionError> {
        let mut chain: Vec<String> = Vec::new();
        let mut reference = reference.to_string();

        loop {
            if in_progress.contains(&reference) || chain.contains(&reference) {
                return Err(ResolutionError::Cyclic { reference });
            }
            let value = self.lookup(&reference)?;
            let node = SchemaNode::parse(value, &reference)?;
            chain.push(reference);
            match node.kind {
                SchemaKind::Reference(next) => reference = next,
                _ => return Ok((node, chain)),
            }
        }
    }
}

fn local_pointer(reference: &str) -> Result<&str, ResolutionError> {
    let Some(fragment) = reference.strip_prefix('#') else {
        return Err(ResolutionError::External {
            reference: reference.to_string(),
        });
    };
    if !fragment.is_empty() && !fragment.starts_with('/') {
        return Err(ResolutionError::Malformed {
            what: "$ref".to_string(),
            message: format!("expected a JSON pointer starting with '/': {reference}"),
        });
    }
    Ok(fragment)
}
