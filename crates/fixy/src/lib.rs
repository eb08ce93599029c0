//! Declarative fixtures for tests, materialized as persisted records.
//!
//! fixy reads YAML or JSON documents describing named object instances,
//! resolves each entry to a Rust type, builds the instances in reference
//! order and commits them through a pluggable [`Persister`].
//!
//! # Quick Start
//!
//! Describe the data (`tests/fixtures/clinic.yaml`):
//!
//! ```yaml
//! $type: Owner
//! ann:
//!   name: Ann
//!   age: "30"
//! rex: !Pet
//!   name: Rex
//!   owner: !ref ann
//! ```
//!
//! Derive [`Fixture`](derive@Fixture) for the types and load:
//!
//! ```ignore
//! use std::sync::Arc;
//! use fixy::prelude::*;
//!
//! #[derive(Debug, Default, Fixture)]
//! #[fixture(type_name = "clinic::Owner")]
//! struct Owner {
//!     #[fixture(id)]
//!     id: Option<i64>,
//!     name: String,
//!     age: u32,
//! }
//!
//! #[derive(Debug, Default, Fixture)]
//! #[fixture(type_name = "clinic::Pet")]
//! struct Pet {
//!     name: String,
//!     owner: Option<Arc<Owner>>,
//! }
//!
//! let mut fixy = FixyBuilder::new(MemoryStore::new())
//!     .with_default_namespace("clinic")
//!     .with_document_root("tests/fixtures")
//!     .build()?;
//!
//! let result = fixy.load(&["clinic"])?;
//! assert_eq!(result.entry_names(), vec!["ann", "rex"]);
//! ```
//!
//! # Architecture
//!
//! - [`document`] - Parsed documents, entries and field values; parsing and discovery
//! - [`types`] - Type descriptors, the type registry and the per-load resolver
//! - [`binding`] - Field population and value coercion
//! - [`graph`] - Reference graph and construction order
//! - [`engine`] - The load orchestrator
//! - [`persist`] - The persister boundary and the in-memory store
//! - [`config`], [`builder`], [`facade`] - Configuration and the [`Fixy`] facade
//!
//! # Features
//!
//! - `macros` - `#[derive(Fixture)]` (enabled by default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Generated code refers to `::fixy` paths, including inside this crate.
extern crate self as fixy;

pub mod binding;
pub mod builder;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod facade;
pub mod graph;
pub mod persist;
pub mod prelude;
pub mod types;

// Re-export commonly used types at crate root
pub use builder::FixyBuilder;
pub use config::{AccessMode, FixyConfig};
pub use engine::{FixtureEngine, LoadResult};
pub use error::{FixyError, FixyResult};
pub use facade::Fixy;
pub use persist::{CommitStrategy, MemoryStore, PersistedInstance, Persister};
pub use types::Fixture;

#[doc(hidden)]
pub use inventory;

// Re-export derive macro when available
#[cfg(feature = "macros")]
pub use fixy_macros::Fixture;
