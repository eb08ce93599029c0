//! Mapping declared type names to registered types.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{Fixture, FixtureRegistration, TypeDescriptor};
use crate::document::FixtureEntry;
use crate::error::{FixyError, FixyResult};

/// A custom type-loading mechanism, consulted before the ambient registry.
///
/// Any `Fn(&str) -> Option<Arc<TypeDescriptor>>` closure is a loader.
pub trait TypeLoader: Send + Sync {
	/// Returns the descriptor registered under the qualified `name`.
	fn load_type(&self, name: &str) -> Option<Arc<TypeDescriptor>>;
}

impl<F> TypeLoader for F
where
	F: Fn(&str) -> Option<Arc<TypeDescriptor>> + Send + Sync,
{
	fn load_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
		self(name)
	}
}

/// Registry of fixture types keyed by qualified name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
	types: HashMap<String, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry holding every `#[derive(Fixture)]` type linked into
	/// the binary.
	pub fn discover() -> Self {
		let mut registry = Self::new();
		for registration in inventory::iter::<FixtureRegistration> {
			registry.register_descriptor((registration.descriptor)());
		}
		tracing::debug!(count = registry.len(), "Discovered fixture types");
		registry
	}

	/// Registers `T` under its descriptor name.
	pub fn register<T: Fixture>(&mut self) -> &mut Self {
		self.register_descriptor(T::descriptor())
	}

	/// Registers a descriptor. A later registration under the same name
	/// replaces the earlier one.
	pub fn register_descriptor(&mut self, descriptor: TypeDescriptor) -> &mut Self {
		let name = descriptor.name().to_string();
		if let Some(previous) = self.types.insert(name.clone(), Arc::new(descriptor)) {
			tracing::warn!(
				type_name = %name,
				previous = previous.rust_type(),
				"Fixture type registered twice; keeping the latest registration"
			);
		}
		self
	}

	/// Looks up a type by qualified name.
	pub fn get(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
		self.types.get(name).cloned()
	}

	/// Returns true if `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.types.contains_key(name)
	}

	/// Returns the registered names, sorted.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}

	/// Returns the number of registered types.
	pub fn len(&self) -> usize {
		self.types.len()
	}

	/// Returns true if no type is registered.
	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}
}

impl TypeLoader for TypeRegistry {
	fn load_type(&self, name: &str) -> Option<Arc<TypeDescriptor>> {
		self.get(name)
	}
}

/// Resolves entry type names for one load.
///
/// Unqualified names are prefixed with the default namespace; names
/// containing `::` are used verbatim. The custom loader, when present, is
/// asked first. Resolved types are cached for the lifetime of the resolver
/// only, so a new load with another namespace never sees stale entries.
pub struct TypeResolver<'a> {
	namespace: Option<&'a str>,
	loader: Option<&'a dyn TypeLoader>,
	registry: &'a TypeRegistry,
	cache: HashMap<String, Arc<TypeDescriptor>>,
}

impl<'a> TypeResolver<'a> {
	/// Creates a resolver over the ambient registry.
	pub fn new(registry: &'a TypeRegistry) -> Self {
		Self {
			namespace: None,
			loader: None,
			registry,
			cache: HashMap::new(),
		}
	}

	/// Sets the default namespace.
	pub fn with_namespace(mut self, namespace: Option<&'a str>) -> Self {
		self.namespace = namespace.map(|ns| ns.trim_end_matches("::"));
		self
	}

	/// Sets the custom loader.
	pub fn with_loader(mut self, loader: Option<&'a dyn TypeLoader>) -> Self {
		self.loader = loader;
		self
	}

	/// Returns the qualified form of `name`.
	///
	/// # Example
	///
	/// ```
	/// # use fixy::types::{TypeRegistry, TypeResolver};
	/// let registry = TypeRegistry::new();
	/// let resolver = TypeResolver::new(&registry).with_namespace(Some("app::models"));
	/// assert_eq!(resolver.qualify("Owner"), "app::models::Owner");
	/// assert_eq!(resolver.qualify("billing::Invoice"), "billing::Invoice");
	/// ```
	pub fn qualify(&self, name: &str) -> String {
		let name = name.trim_start_matches("::");
		match self.namespace {
			Some(ns) if !name.contains("::") => format!("{}::{}", ns, name),
			_ => name.to_string(),
		}
	}

	/// Resolves a declared type name.
	pub fn resolve(&mut self, name: &str) -> Option<Arc<TypeDescriptor>> {
		let qualified = self.qualify(name);
		if let Some(descriptor) = self.cache.get(&qualified) {
			return Some(Arc::clone(descriptor));
		}

		let descriptor = self
			.loader
			.and_then(|loader| loader.load_type(&qualified))
			.or_else(|| self.registry.get(&qualified))?;

		tracing::debug!(
			type_name = %qualified,
			rust_type = descriptor.rust_type(),
			"Resolved fixture type"
		);
		self.cache.insert(qualified, Arc::clone(&descriptor));
		Some(descriptor)
	}

	/// Resolves the type of an entry.
	pub fn resolve_entry(&mut self, entry: &FixtureEntry) -> FixyResult<Arc<TypeDescriptor>> {
		let Some(declared) = entry.type_name.as_deref() else {
			return Err(FixyError::TypeResolution {
				entry: entry.name.clone(),
				type_name: None,
				reason: "the entry declares no type and none could be inferred".to_string(),
			});
		};

		self.resolve(declared)
			.ok_or_else(|| FixyError::TypeResolution {
				entry: entry.name.clone(),
				type_name: Some(declared.to_string()),
				reason: format!("no fixture type is registered as `{}`", self.qualify(declared)),
			})
	}

	/// Returns the number of types resolved so far.
	pub fn cached(&self) -> usize {
		self.cache.len()
	}
}

impl fmt::Debug for TypeResolver<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeResolver")
			.field("namespace", &self.namespace)
			.field("loader", &self.loader.is_some())
			.field("cached", &self.cache.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::{fixture, rstest};
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Default)]
	struct Clinic {
		name: String,
	}

	#[derive(Default)]
	struct Ward;

	fn clinic(name: &str) -> TypeDescriptor {
		TypeDescriptor::builder::<Clinic>(name)
			.field("name", |c| &mut c.name)
			.build()
	}

	#[fixture]
	fn registry() -> TypeRegistry {
		let mut registry = TypeRegistry::new();
		registry.register_descriptor(clinic("care::Clinic"));
		registry
	}

	#[rstest]
	fn test_resolve_with_namespace(registry: TypeRegistry) {
		let mut resolver = TypeResolver::new(&registry).with_namespace(Some("care::"));

		let descriptor = resolver.resolve("Clinic").unwrap();
		assert_eq!(descriptor.name(), "care::Clinic");
		assert!(resolver.resolve("care::Clinic").is_some());
		assert_eq!(resolver.cached(), 1);
	}

	#[rstest]
	fn test_unqualified_without_namespace_is_verbatim(registry: TypeRegistry) {
		let mut resolver = TypeResolver::new(&registry);
		assert!(resolver.resolve("Clinic").is_none());
		assert_eq!(resolver.qualify("Clinic"), "Clinic");
	}

	#[rstest]
	fn test_loader_is_consulted_first(registry: TypeRegistry) {
		// Arrange
		let calls = AtomicUsize::new(0);
		let loader = |name: &str| {
			calls.fetch_add(1, Ordering::SeqCst);
			(name == "care::Clinic").then(|| Arc::new(TypeDescriptor::builder::<Ward>(name).build()))
		};
		let mut resolver = TypeResolver::new(&registry)
			.with_namespace(Some("care"))
			.with_loader(Some(&loader));

		// Act
		let first = resolver.resolve("Clinic").unwrap();
		let second = resolver.resolve("Clinic").unwrap();

		// Assert
		assert_eq!(first.rust_type(), std::any::type_name::<Ward>());
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[rstest]
	fn test_loader_falls_back_to_registry(registry: TypeRegistry) {
		let loader = |_: &str| -> Option<Arc<TypeDescriptor>> { None };
		let mut resolver = TypeResolver::new(&registry).with_loader(Some(&loader));

		let descriptor = resolver.resolve("care::Clinic").unwrap();
		assert_eq!(descriptor.rust_type(), std::any::type_name::<Clinic>());
	}

	#[rstest]
	fn test_resolve_entry_errors(registry: TypeRegistry) {
		let mut resolver = TypeResolver::new(&registry).with_namespace(Some("care"));

		let untyped = FixtureEntry::new("a");
		assert!(matches!(
			resolver.resolve_entry(&untyped),
			Err(FixyError::TypeResolution { type_name: None, .. })
		));

		let unknown = FixtureEntry::new("b").with_type("Hospital");
		let error = resolver.resolve_entry(&unknown).unwrap_err();
		assert!(error.to_string().contains("care::Hospital"));
		assert_eq!(error.entries(), vec!["b"]);
	}

	#[rstest]
	fn test_register_replaces_duplicate(mut registry: TypeRegistry) {
		registry.register_descriptor(clinic("care::Clinic"));
		registry.register_descriptor(clinic("care::Annex"));

		assert_eq!(registry.len(), 2);
		assert_eq!(registry.names(), vec!["care::Annex", "care::Clinic"]);
	}
}
