//! # Tableward Core
//!
//! Domain types, traits, and error definitions for the Tableward query
//! mediation layer. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The policy model, the request/response contract, and the tool boundary
//! are defined here; enforcement, execution, and shaping live in their
//! respective crates and depend inward on this one.

pub mod error;
pub mod policy;
pub mod request;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{
    ConfigurationError, Error, ExecutionError, PolicyViolation, Result, ShapingError, ToolError,
};
pub use policy::{ALL_COLUMNS, Operation, PolicyConfig, PolicyMode, TablePolicy};
pub use request::{
    ColumnDescriptor, DEFAULT_LIMIT, InferredType, NO_LIMIT, QueryRequest, QueryResult, Row,
};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSpec};
