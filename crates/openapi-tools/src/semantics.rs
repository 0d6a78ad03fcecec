//! MCP tool annotations derived from RFC 9110 method semantics.
//!
//! A tool covers every verb of one path, so the hints are aggregated across its verbs: it is
//! read-only only if every verb is safe, destructive if any verb is, and idempotent only if
//! every verb is.

use crate::document::HttpVerb;
use rmcp::model::ToolAnnotations;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VerbSemantics {
    read_only: bool,
    destructive: bool,
    /// `None` when the method makes no promise (PATCH).
    idempotent: Option<bool>,
}

fn verb_semantics(verb: HttpVerb) -> VerbSemantics {
    match verb {
        HttpVerb::Get | HttpVerb::Head | HttpVerb::Options | HttpVerb::Trace => VerbSemantics {
            read_only: true,
            destructive: false,
            idempotent: Some(true),
        },
        HttpVerb::Post => VerbSemantics {
            read_only: false,
            destructive: false,
            idempotent: Some(false),
        },
        HttpVerb::Put | HttpVerb::Delete => VerbSemantics {
            read_only: false,
            destructive: true,
            idempotent: Some(true),
        },
        HttpVerb::Patch => VerbSemantics {
            read_only: false,
            destructive: true,
            idempotent: None,
        },
    }
}

/// Annotations for a tool exposing `verbs`.
///
/// `openWorldHint` is always `true`: every call reaches the upstream API.
#[must_use]
pub fn annotations_for_verbs(verbs: &[HttpVerb], title: Option<String>) -> ToolAnnotations {
    let open_world_hint = Some(true);
    if verbs.is_empty() {
        return ToolAnnotations {
            title,
            read_only_hint: None,
            destructive_hint: None,
            idempotent_hint: None,
            open_world_hint,
        };
    }

    let all: Vec<VerbSemantics> = verbs.iter().copied().map(verb_semantics).collect();
    let idempotent_hint = if all.iter().any(|s| s.idempotent == Some(false)) {
        Some(false)
    } else if all.iter().all(|s| s.idempotent == Some(true)) {
        Some(true)
    } else {
        None
    };

    ToolAnnotations {
        title,
        read_only_hint: Some(all.iter().all(|s| s.read_only)),
        destructive_hint: Some(all.iter().any(|s| s.destructive)),
        idempotent_hint,
        open_world_hint,
    }
}
