//! `OpenAPI` → MCP operation compiler for the Statsig console API.
//!
//! The pipeline runs once at startup and flows one way:
//!
//! 1. [`loader`] fetches the `OpenAPI` document ([`document::Document`]).
//! 2. [`compiler`] resolves `$ref`s and compiles every path/verb into a
//!    [`compiler::CompiledOperation`] with runtime [`validator::Validator`]s.
//! 3. [`registry`] merges the verbs of each path into one uniquely named tool, and
//!    [`dispatch`] turns tool calls into HTTP requests.
//!
//! [`runtime::OpenApiToolSource`] wires the three together and speaks MCP types.

pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod schema;
pub mod semantics;
pub mod validator;

pub use config::ApiServerConfig;
pub use error::{OpenApiToolsError, Result};
pub use runtime::OpenApiToolSource;
