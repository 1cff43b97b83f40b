//! Remote tooling API boundary for sf-trace.
//!
//! This crate defines the contract between the trace engine and the remote
//! org it manipulates. It provides:
//!
//! - **Record types** for the `User`, `DebugLevel` and `TraceFlag` sObjects
//! - **[`Select`]**, a structured query that renders escaped SOQL text
//! - **[`ToolingApi`]**, the async trait every org connection implements
//! - **[`InMemoryOrg`]**, an in-process org used by tests and dry runs
//! - **[`ApiError`]** for transport and remote failures
//!
//! Use `Arc<dyn ToolingApi>` as the handle type.

pub mod error;
pub mod soql;
pub mod traits;
pub mod types;

pub use error::ApiError;
pub use soql::{escape_markup, Select, SoqlError};
pub use traits::ToolingApi;
pub use types::*;

mod memory;
pub use memory::{InMemoryOrg, WriteOp};
