//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use fixy::prelude::*;
//! ```

// Error types
pub use crate::error::{FixyError, FixyResult, LoadStage};

// Configuration
pub use crate::builder::FixyBuilder;
pub use crate::config::{AccessMode, FixyConfig};
pub use crate::facade::Fixy;

// Documents
pub use crate::document::{DocumentSource, FieldValue, FixtureDocument, FixtureEntry, Scalar};

// Types and loading
pub use crate::engine::{FixtureEngine, LoadResult};
pub use crate::types::{Fixture, TypeDescriptor, TypeLoader, TypeRegistry};

// Persistence
pub use crate::persist::{
	CommitStrategy, ConstructedInstance, EntityStore, MemoryStore, PersistedInstance, Persister,
	StorePersister,
};

// Re-export the Fixture derive macro when available
#[cfg(feature = "macros")]
pub use fixy_macros::Fixture;
