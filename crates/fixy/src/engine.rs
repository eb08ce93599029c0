//! The load orchestrator.
//!
//! [`FixtureEngine::load`] runs one load as a single linear pass:
//!
//! 1. register every entry name across all documents, rejecting duplicates
//! 2. record references and compute the construction order
//! 3. resolve the type of every entry
//! 4. in construction order: bind fields (references replaced by the
//!    persisted target), then commit through the [`Persister`]
//!
//! Steps 1 to 3 have no side effects, so validation and type errors never
//! leave anything behind in the backing store.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::binding::{BindValue, FieldBinder};
use crate::config::FixyConfig;
use crate::document::{FixtureDocument, FixtureEntry};
use crate::error::{FixyError, FixyResult};
use crate::graph::ReferenceGraph;
use crate::persist::{ConstructedInstance, PersistedInstance, Persister};
use crate::types::{Fixture, TypeDescriptor, TypeLoader, TypeRegistry, TypeResolver};

/// Persisted instances of one load, in construction order.
#[derive(Debug, Clone, Default)]
pub struct LoadResult {
	instances: Vec<PersistedInstance>,
	index: HashMap<String, usize>,
}

impl LoadResult {
	fn push(&mut self, instance: PersistedInstance) {
		self.index
			.insert(instance.entry().to_string(), self.instances.len());
		self.instances.push(instance);
	}

	/// Returns the number of persisted instances.
	pub fn len(&self) -> usize {
		self.instances.len()
	}

	/// Returns true if nothing was persisted.
	pub fn is_empty(&self) -> bool {
		self.instances.is_empty()
	}

	/// Iterates over instances in construction order.
	pub fn iter(&self) -> impl Iterator<Item = &PersistedInstance> {
		self.instances.iter()
	}

	/// Returns the instance persisted for `entry`.
	pub fn get(&self, entry: &str) -> Option<&PersistedInstance> {
		self.index.get(entry).map(|&idx| &self.instances[idx])
	}

	/// Returns the instance persisted for `entry` as `T`.
	pub fn instance<T: Fixture>(&self, entry: &str) -> Option<Arc<T>> {
		self.get(entry)?.downcast::<T>()
	}

	/// Returns entry names in construction order.
	pub fn entry_names(&self) -> Vec<&str> {
		self.instances.iter().map(PersistedInstance::entry).collect()
	}

	/// Returns the position of `entry` in the construction order.
	pub fn position(&self, entry: &str) -> Option<usize> {
		self.index.get(entry).copied()
	}

	/// Consumes the result, returning the instances in construction order.
	pub fn into_instances(self) -> Vec<PersistedInstance> {
		self.instances
	}
}

impl IntoIterator for LoadResult {
	type Item = PersistedInstance;
	type IntoIter = std::vec::IntoIter<PersistedInstance>;

	fn into_iter(self) -> Self::IntoIter {
		self.instances.into_iter()
	}
}

impl<'a> IntoIterator for &'a LoadResult {
	type Item = &'a PersistedInstance;
	type IntoIter = std::slice::Iter<'a, PersistedInstance>;

	fn into_iter(self) -> Self::IntoIter {
		self.instances.iter()
	}
}

/// Drives fixture loads with one fixed configuration.
///
/// The engine holds no per-load state: the type cache lives in the
/// [`TypeResolver`] created by each [`load`](Self::load) call.
///
/// # Example
///
/// ```
/// use fixy::config::FixyConfig;
/// use fixy::document::{FixtureDocument, FixtureEntry};
/// use fixy::engine::FixtureEngine;
/// use fixy::persist::{CommitStrategy, MemoryStore, StorePersister};
/// use fixy::types::{Fixture, TypeDescriptor, TypeRegistry};
///
/// #[derive(Default)]
/// struct Owner {
///     name: String,
/// }
///
/// impl Fixture for Owner {
///     fn descriptor() -> TypeDescriptor {
///         TypeDescriptor::builder::<Owner>("app::Owner")
///             .property("name", |o: &mut Owner, v: String| o.name = v)
///             .build()
///     }
/// }
///
/// let mut registry = TypeRegistry::new();
/// registry.register::<Owner>();
/// let engine = FixtureEngine::new(FixyConfig::new()).with_registry(registry);
///
/// let document = FixtureDocument::from_entries(vec![
///     FixtureEntry::new("ann").with_type("app::Owner").with_field("name", "Ann"),
/// ]);
/// let mut persister = StorePersister::new(MemoryStore::new(), CommitStrategy::Insert);
///
/// let result = engine.load(&[document], &mut persister).unwrap();
/// assert_eq!(result.instance::<Owner>("ann").unwrap().name, "Ann");
/// ```
pub struct FixtureEngine {
	config: FixyConfig,
	registry: TypeRegistry,
	loader: Option<Arc<dyn TypeLoader>>,
}

impl FixtureEngine {
	/// Creates an engine over every `#[derive(Fixture)]` type in the binary.
	pub fn new(config: FixyConfig) -> Self {
		Self {
			config,
			registry: TypeRegistry::discover(),
			loader: None,
		}
	}

	pub(crate) fn from_parts(
		config: FixyConfig,
		registry: TypeRegistry,
		loader: Option<Arc<dyn TypeLoader>>,
	) -> Self {
		Self {
			config,
			registry,
			loader,
		}
	}

	/// Replaces the ambient type registry.
	pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
		self.registry = registry;
		self
	}

	/// Sets the custom type loader, consulted before the registry.
	pub fn with_type_loader(mut self, loader: Arc<dyn TypeLoader>) -> Self {
		self.loader = Some(loader);
		self
	}

	/// Registers an additional type.
	pub fn register<T: Fixture>(&mut self) -> &mut Self {
		self.registry.register::<T>();
		self
	}

	/// Returns the configuration.
	pub fn config(&self) -> &FixyConfig {
		&self.config
	}

	/// Returns the ambient type registry.
	pub fn registry(&self) -> &TypeRegistry {
		&self.registry
	}

	/// Loads `documents` and commits every entry through `persister`.
	///
	/// The engine opens no transaction. Binding and persistence errors stop
	/// the load after earlier entries were committed; run the load inside a
	/// transaction when all-or-nothing behavior is needed.
	///
	/// # Errors
	///
	/// The first failure aborts the load. See [`FixyError::stage`] for which
	/// failures are raised before any commit.
	pub fn load<P>(&self, documents: &[FixtureDocument], persister: &mut P) -> FixyResult<LoadResult>
	where
		P: Persister + ?Sized,
	{
		let entries: Vec<&FixtureEntry> = documents.iter().flat_map(|doc| doc.iter()).collect();
		tracing::info!(
			documents = documents.len(),
			entries = entries.len(),
			strategy = %self.config.commit_strategy,
			access_mode = %self.config.access_mode,
			"Loading fixtures"
		);

		let graph = build_graph(documents)?;
		let order = graph.construction_indices()?;
		let descriptors = self.resolve_types(&entries)?;

		let binder = FieldBinder::new(self.config.access_mode);
		let mut result = LoadResult::default();

		for idx in order {
			let entry = entries[idx];
			let descriptor = &descriptors[idx];

			let fields = bind_values(entry, &result)?;
			let object = binder
				.construct(descriptor, &fields)
				.map_err(|source| FixyError::FieldBinding {
					entry: entry.name.clone(),
					type_name: descriptor.name().to_string(),
					source,
				})?;

			let instance = ConstructedInstance::new(entry.name.clone(), Arc::clone(descriptor), object);
			let persisted = persister
				.commit(instance)
				.map_err(|source| FixyError::Persist {
					entry: entry.name.clone(),
					source,
				})?;

			tracing::debug!(
				entry = %entry.name,
				type_name = descriptor.name(),
				key = ?persisted.key(),
				"Committed fixture"
			);
			result.push(persisted);
		}

		tracing::info!(count = result.len(), "Loaded fixtures");
		Ok(result)
	}

	/// Resolves every entry's type, in encounter order, before any commit.
	fn resolve_types(&self, entries: &[&FixtureEntry]) -> FixyResult<Vec<Arc<TypeDescriptor>>> {
		let mut resolver = TypeResolver::new(&self.registry)
			.with_namespace(self.config.default_namespace.as_deref())
			.with_loader(self.loader.as_deref());

		entries
			.iter()
			.map(|entry| resolver.resolve_entry(entry))
			.collect()
	}
}

impl fmt::Debug for FixtureEngine {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FixtureEngine")
			.field("config", &self.config)
			.field("types", &self.registry.len())
			.field("loader", &self.loader.is_some())
			.finish()
	}
}

/// Registers every entry, then every reference.
///
/// Names are registered first so a reference may point at an entry declared
/// later, in the same or another document.
fn build_graph(documents: &[FixtureDocument]) -> FixyResult<ReferenceGraph> {
	let mut graph = ReferenceGraph::new();
	let mut origin: HashMap<&str, String> = HashMap::new();

	for document in documents {
		for entry in document {
			if graph.add_entry(&entry.name).is_none() {
				return Err(FixyError::DuplicateEntryName {
					name: entry.name.clone(),
					first: origin
						.get(entry.name.as_str())
						.cloned()
						.unwrap_or_default(),
					second: document.label(),
				});
			}
			origin.insert(entry.name.as_str(), document.label());
		}
	}

	for entry in documents.iter().flat_map(|doc| doc.iter()) {
		for (field, target) in entry.references() {
			graph.add_reference(&entry.name, &field, target)?;
		}
	}

	Ok(graph)
}

/// Replaces every reference in `entry` with its persisted target.
fn bind_values(entry: &FixtureEntry, loaded: &LoadResult) -> FixyResult<IndexMap<String, BindValue>> {
	let lookup = |name: &str| loaded.get(name).cloned();

	let mut fields = IndexMap::with_capacity(entry.fields.len());
	for (name, value) in &entry.fields {
		let value = BindValue::resolve(value, &lookup).map_err(|target| FixyError::UnknownReference {
			entry: entry.name.clone(),
			field: name.clone(),
			target: target.to_string(),
		})?;
		fields.insert(name.clone(), value);
	}
	Ok(fields)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::binding::FromFixture;
	use crate::config::AccessMode;
	use crate::document::FieldValue;
	use crate::error::{CoercionError, LoadStage, PersistError};
	use crate::persist::{CommitStrategy, MemoryStore, StorePersister};
	use rstest::{fixture, rstest};

	#[derive(Debug, Default)]
	struct Owner {
		id: Option<i64>,
		name: String,
	}

	impl Fixture for Owner {
		fn descriptor() -> TypeDescriptor {
			TypeDescriptor::builder::<Owner>("clinic::Owner")
				.primary_key("id", |o| &o.id, |o| &mut o.id)
				.property("name", |o: &mut Owner, v: String| o.name = v)
				.field("name", |o| &mut o.name)
				.build()
		}
	}

	impl FromFixture for Owner {
		fn from_fixture(value: &BindValue, binder: &FieldBinder) -> Result<Self, CoercionError> {
			binder.bind_nested::<Self>(value)
		}
	}

	#[derive(Debug, Default)]
	struct Pet {
		name: String,
		owner: Option<Arc<Owner>>,
		owner_id: i64,
	}

	impl Fixture for Pet {
		fn descriptor() -> TypeDescriptor {
			TypeDescriptor::builder::<Pet>("clinic::Pet")
				.property("name", |p: &mut Pet, v: String| p.name = v)
				.property("owner", |p: &mut Pet, v: Option<Arc<Owner>>| p.owner = v)
				.property("owner_id", |p: &mut Pet, v: i64| p.owner_id = v)
				.build()
		}
	}

	#[fixture]
	fn engine() -> FixtureEngine {
		let mut registry = TypeRegistry::new();
		registry.register::<Owner>().register::<Pet>();
		FixtureEngine::new(FixyConfig {
			default_namespace: Some("clinic".to_string()),
			..FixyConfig::new()
		})
		.with_registry(registry)
	}

	fn persister() -> StorePersister<MemoryStore> {
		StorePersister::new(MemoryStore::new(), CommitStrategy::Insert)
	}

	#[rstest]
	fn test_reference_resolved_to_persisted_instance(engine: FixtureEngine) {
		// Arrange
		let document = FixtureDocument::from_entries(vec![
			FixtureEntry::new("rex")
				.with_type("Pet")
				.with_field("name", "Rex")
				.with_field("owner", FieldValue::reference("ann"))
				.with_field("owner_id", FieldValue::reference("ann")),
			FixtureEntry::new("ann").with_type("Owner").with_field("name", "Ann"),
		]);
		let mut persister = persister();

		// Act
		let result = engine.load(&[document], &mut persister).unwrap();

		// Assert
		assert_eq!(result.entry_names(), vec!["ann", "rex"]);
		let rex = result.instance::<Pet>("rex").unwrap();
		let ann = result.instance::<Owner>("ann").unwrap();
		assert!(Arc::ptr_eq(rex.owner.as_ref().unwrap(), &ann));
		assert_eq!(ann.id, Some(1));
		assert_eq!(rex.owner_id, 1);
	}

	#[rstest]
	fn test_duplicate_across_documents_commits_nothing(engine: FixtureEngine) {
		let first = FixtureDocument::from_entries(vec![FixtureEntry::new("ann").with_type("Owner")])
			.with_path("owners.yaml");
		let second = FixtureDocument::from_entries(vec![FixtureEntry::new("ann").with_type("Owner")])
			.with_path("more.yaml");
		let mut persister = persister();

		let error = engine.load(&[first, second], &mut persister).unwrap_err();

		assert!(matches!(
			error,
			FixyError::DuplicateEntryName { ref first, ref second, .. }
				if first == "owners.yaml" && second == "more.yaml"
		));
		assert!(persister.store().is_empty());
	}

	#[rstest]
	fn test_type_errors_raised_before_any_commit(engine: FixtureEngine) {
		let document = FixtureDocument::from_entries(vec![
			FixtureEntry::new("ann").with_type("Owner"),
			FixtureEntry::new("ghost").with_type("Ghost"),
		]);
		let mut persister = persister();

		let error = engine.load(&[document], &mut persister).unwrap_err();

		assert_eq!(error.stage(), LoadStage::TypeResolution);
		assert_eq!(error.entries(), vec!["ghost"]);
		assert!(persister.store().is_empty());
	}

	#[rstest]
	fn test_binding_error_stops_mid_load(engine: FixtureEngine) {
		let document = FixtureDocument::from_entries(vec![
			FixtureEntry::new("ann").with_type("Owner").with_field("name", "Ann"),
			FixtureEntry::new("rex").with_type("Pet").with_field("colour", "brown"),
		]);
		let mut persister = persister();

		let error = engine.load(&[document], &mut persister).unwrap_err();

		assert!(matches!(
			error,
			FixyError::FieldBinding { ref entry, ref type_name, .. }
				if entry == "rex" && type_name == "clinic::Pet"
		));
		assert_eq!(persister.store().len(), 1);
	}

	#[rstest]
	fn test_property_mode_rejects_storage_only_field() {
		let mut registry = TypeRegistry::new();
		registry.register_descriptor(
			TypeDescriptor::builder::<Owner>("clinic::Owner")
				.field("name", |o| &mut o.name)
				.build(),
		);
		let document = FixtureDocument::from_entries(vec![
			FixtureEntry::new("ann").with_type("clinic::Owner").with_field("name", "Ann"),
		]);

		let property = FixtureEngine::new(FixyConfig::new()).with_registry(registry.clone());
		let field = FixtureEngine::new(FixyConfig {
			access_mode: AccessMode::Field,
			..FixyConfig::new()
		})
		.with_registry(registry);

		let error = property
			.load(std::slice::from_ref(&document), &mut persister())
			.unwrap_err();
		assert_eq!(error.stage(), LoadStage::Binding);
		assert!(field.load(&[document], &mut persister()).is_ok());
	}

	#[rstest]
	fn test_custom_loader_consulted_first(engine: FixtureEngine) {
		let loader = |name: &str| {
			(name == "clinic::Stray").then(|| Arc::new(Owner::descriptor()))
		};
		let engine = engine.with_type_loader(Arc::new(loader));
		let document = FixtureDocument::from_entries(vec![
			FixtureEntry::new("tom").with_type("Stray").with_field("name", "Tom"),
		]);

		let result = engine.load(&[document], &mut persister()).unwrap();

		assert_eq!(result.instance::<Owner>("tom").unwrap().name, "Tom");
	}

	struct FailingPersister;

	impl Persister for FailingPersister {
		fn commit(&mut self, _instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
			Err(PersistError::Store("read-only".to_string()))
		}
	}

	#[rstest]
	fn test_persist_error_names_entry(engine: FixtureEngine) {
		let document = FixtureDocument::from_entries(vec![FixtureEntry::new("ann").with_type("Owner")]);
		let mut persister: Box<dyn Persister> = Box::new(FailingPersister);

		let error = engine.load(&[document], persister.as_mut()).unwrap_err();

		assert_eq!(error.stage(), LoadStage::Persistence);
		assert_eq!(error.entries(), vec!["ann"]);
	}

	#[rstest]
	fn test_empty_load(engine: FixtureEngine) {
		let result = engine.load(&[], &mut persister()).unwrap();
		assert!(result.is_empty());
	}
}
