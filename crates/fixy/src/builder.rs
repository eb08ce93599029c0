//! Builder for [`Fixy`].

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{AccessMode, FixyConfig};
use crate::engine::FixtureEngine;
use crate::error::FixyResult;
use crate::facade::Fixy;
use crate::persist::{CommitStrategy, EntityStore, StorePersister};
use crate::types::{Fixture, TypeLoader, TypeRegistry};

/// Accumulates load settings for a backing store, then builds a [`Fixy`].
///
/// Settings are collected into one [`FixyConfig`] that is validated by
/// [`build`](Self::build) and never changes afterwards.
///
/// # Example
///
/// ```
/// use fixy::builder::FixyBuilder;
/// use fixy::persist::{CommitStrategy, MemoryStore};
///
/// let fixy = FixyBuilder::new(MemoryStore::new())
/// 	.with_default_namespace("app::models")
/// 	.merge_entities()
/// 	.use_field_access()
/// 	.with_document_root("tests/fixtures")
/// 	.build()
/// 	.unwrap();
///
/// assert_eq!(fixy.persister().strategy(), CommitStrategy::Merge);
/// ```
pub struct FixyBuilder<S> {
	store: S,
	config: FixyConfig,
	registry: TypeRegistry,
	loader: Option<Arc<dyn TypeLoader>>,
}

impl<S: EntityStore> FixyBuilder<S> {
	/// Creates a builder over `store` with the default configuration and
	/// every `#[derive(Fixture)]` type in the binary.
	pub fn new(store: S) -> Self {
		Self {
			store,
			config: FixyConfig::new(),
			registry: TypeRegistry::discover(),
			loader: None,
		}
	}

	/// Sets the namespace used for unqualified type names.
	pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
		self.config.default_namespace = Some(namespace.into());
		self
	}

	/// Commits instances by merge instead of insert.
	pub fn merge_entities(mut self) -> Self {
		self.config.commit_strategy = CommitStrategy::Merge;
		self
	}

	/// Binds fields directly, which allows fields without a mutator.
	pub fn use_field_access(mut self) -> Self {
		self.config.access_mode = AccessMode::Field;
		self
	}

	/// Sets a custom type loader, consulted before the type registry.
	pub fn with_type_loader<L: TypeLoader + 'static>(mut self, loader: L) -> Self {
		self.loader = Some(Arc::new(loader));
		self
	}

	/// Sets the directory document names are resolved under.
	pub fn with_document_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.config.document_root = Some(root.into());
		self
	}

	/// Replaces the whole configuration, e.g. one read with
	/// [`FixyConfig::from_file`].
	pub fn with_config(mut self, config: FixyConfig) -> Self {
		self.config = config;
		self
	}

	/// Registers a type not submitted through `#[derive(Fixture)]`.
	pub fn register<T: Fixture>(mut self) -> Self {
		self.registry.register::<T>();
		self
	}

	/// Validates the configuration and builds the [`Fixy`].
	pub fn build(self) -> FixyResult<Fixy<StorePersister<S>>> {
		self.config.validate()?;

		let persister = StorePersister::new(self.store, self.config.commit_strategy);
		let engine = FixtureEngine::from_parts(self.config, self.registry, self.loader);
		Ok(Fixy::new(engine, persister))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FixyError;
	use crate::persist::MemoryStore;
	use rstest::rstest;
	use std::path::Path;

	#[rstest]
	fn test_defaults() {
		let fixy = FixyBuilder::new(MemoryStore::new()).build().unwrap();

		assert_eq!(fixy.config(), &FixyConfig::new());
		assert_eq!(fixy.persister().strategy(), CommitStrategy::Insert);
	}

	#[rstest]
	fn test_settings_reach_config() {
		let fixy = FixyBuilder::new(MemoryStore::new())
			.with_default_namespace("app::models")
			.merge_entities()
			.use_field_access()
			.with_document_root("fixtures")
			.build()
			.unwrap();

		let config = fixy.config();
		assert_eq!(config.default_namespace.as_deref(), Some("app::models"));
		assert_eq!(config.commit_strategy, CommitStrategy::Merge);
		assert_eq!(config.access_mode, AccessMode::Field);
		assert_eq!(config.document_root(), Path::new("fixtures"));
		assert_eq!(fixy.source().root(), Path::new("fixtures"));
	}

	#[rstest]
	fn test_invalid_namespace_rejected() {
		let result = FixyBuilder::new(MemoryStore::new())
			.with_default_namespace("app::::models")
			.build();

		assert!(matches!(result, Err(FixyError::Config(_))));
	}

	#[rstest]
	fn test_with_config_replaces_settings() {
		let config = FixyConfig::from_toml_str(r#"commit_strategy = "merge""#).unwrap();

		let fixy = FixyBuilder::new(MemoryStore::new())
			.use_field_access()
			.with_config(config)
			.build()
			.unwrap();

		assert_eq!(fixy.persister().strategy(), CommitStrategy::Merge);
		assert_eq!(fixy.config().access_mode, AccessMode::Property);
	}
}
