//! The persistence boundary.
//!
//! The engine hands every fully-populated [`ConstructedInstance`] to a
//! [`Persister`], in construction order, and gets a [`PersistedInstance`]
//! back. [`StorePersister`] adapts any [`EntityStore`] to this contract by
//! applying one load-wide [`CommitStrategy`].

pub mod memory;

pub use memory::{MemoryStore, MemoryTransaction, StoreOperation};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::document::Scalar;
use crate::error::{CoercionError, PersistError};
use crate::types::{AnyObject, TypeDescriptor};

/// How every instance of a load is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStrategy {
	/// Every instance is new; the store assigns identity.
	#[default]
	Insert,
	/// Instances may already exist; the store updates a record matched by
	/// primary or natural key and inserts otherwise.
	Merge,
}

impl fmt::Display for CommitStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Insert => write!(f, "insert"),
			Self::Merge => write!(f, "merge"),
		}
	}
}

/// A fully-populated instance awaiting commit.
pub struct ConstructedInstance {
	entry: String,
	descriptor: Arc<TypeDescriptor>,
	object: AnyObject,
}

impl ConstructedInstance {
	/// Wraps a constructed object.
	pub fn new(entry: impl Into<String>, descriptor: Arc<TypeDescriptor>, object: AnyObject) -> Self {
		Self {
			entry: entry.into(),
			descriptor,
			object,
		}
	}

	/// Name of the entry this instance was built from.
	pub fn entry(&self) -> &str {
		&self.entry
	}

	/// Qualified type name.
	pub fn type_name(&self) -> &str {
		self.descriptor.name()
	}

	/// Descriptor of the instance's type.
	pub fn descriptor(&self) -> &TypeDescriptor {
		&self.descriptor
	}

	/// Current primary key, if the type has one and it is set.
	pub fn key(&self) -> Option<Scalar> {
		self.descriptor.key_of(self.object.as_ref())
	}

	/// Writes a key into the instance's primary-key field.
	///
	/// Returns `false` when the type declares no primary key.
	pub fn set_key(&mut self, key: &Scalar) -> Result<bool, CoercionError> {
		self.descriptor.set_key(self.object.as_mut(), key)
	}

	/// Current natural key, if the type declares one and every part is set.
	pub fn natural_key(&self) -> Option<Vec<Scalar>> {
		self.descriptor.natural_key_of(self.object.as_ref())
	}

	/// Borrows the instance as `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.object.downcast_ref::<T>()
	}

	/// Borrows the type-erased instance.
	pub fn object(&self) -> &(dyn Any + Send + Sync) {
		self.object.as_ref()
	}

	/// Finishes the commit: freezes the instance under the store's `key`.
	pub fn into_persisted(self, key: Option<Scalar>) -> PersistedInstance {
		PersistedInstance {
			entry: self.entry,
			type_name: self.descriptor.name().to_string(),
			key,
			object: Arc::from(self.object),
		}
	}
}

impl fmt::Debug for ConstructedInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConstructedInstance")
			.field("entry", &self.entry)
			.field("type_name", &self.type_name())
			.field("key", &self.key())
			.finish()
	}
}

/// A committed instance.
///
/// Cheap to clone: the object is shared, and the same `Arc` is what
/// referencing entries receive in their `Arc<T>` fields.
#[derive(Clone)]
pub struct PersistedInstance {
	entry: String,
	type_name: String,
	key: Option<Scalar>,
	object: Arc<dyn Any + Send + Sync>,
}

impl PersistedInstance {
	/// Creates a persisted instance.
	pub fn new(
		entry: impl Into<String>,
		type_name: impl Into<String>,
		key: Option<Scalar>,
		object: Arc<dyn Any + Send + Sync>,
	) -> Self {
		Self {
			entry: entry.into(),
			type_name: type_name.into(),
			key,
			object,
		}
	}

	/// Entry name.
	pub fn entry(&self) -> &str {
		&self.entry
	}

	/// Qualified type name.
	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	/// Store-assigned identity.
	pub fn key(&self) -> Option<&Scalar> {
		self.key.as_ref()
	}

	/// Returns the shared instance as `T`.
	pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		Arc::clone(&self.object).downcast::<T>().ok()
	}

	/// Borrows the instance as `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.object.downcast_ref::<T>()
	}

	/// Returns true if the instance is a `T`.
	pub fn is<T: Any>(&self) -> bool {
		self.object.is::<T>()
	}

	/// The shared type-erased instance.
	pub fn object(&self) -> &Arc<dyn Any + Send + Sync> {
		&self.object
	}
}

impl fmt::Debug for PersistedInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PersistedInstance")
			.field("entry", &self.entry)
			.field("type_name", &self.type_name)
			.field("key", &self.key)
			.finish()
	}
}

/// Commits constructed instances.
///
/// Called once per entry, in construction order, inside whatever
/// transaction the caller opened.
pub trait Persister {
	/// Commits one instance.
	fn commit(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError>;
}

impl<P: Persister + ?Sized> Persister for &mut P {
	fn commit(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		(**self).commit(instance)
	}
}

impl<P: Persister + ?Sized> Persister for Box<P> {
	fn commit(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		(**self).commit(instance)
	}
}

/// A backing store with insert and merge operations.
pub trait EntityStore {
	/// Stores `instance` as a new record.
	fn insert(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError>;

	/// Updates the record matching `instance`, or inserts it.
	fn merge(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError>;
}

/// [`Persister`] over an [`EntityStore`] with a fixed commit strategy.
#[derive(Debug, Clone)]
pub struct StorePersister<S> {
	store: S,
	strategy: CommitStrategy,
}

impl<S: EntityStore> StorePersister<S> {
	/// Creates a persister committing with `strategy`.
	pub fn new(store: S, strategy: CommitStrategy) -> Self {
		Self { store, strategy }
	}

	/// Returns the commit strategy.
	pub fn strategy(&self) -> CommitStrategy {
		self.strategy
	}

	/// Returns the backing store.
	pub fn store(&self) -> &S {
		&self.store
	}

	/// Returns the backing store mutably.
	pub fn store_mut(&mut self) -> &mut S {
		&mut self.store
	}

	/// Consumes the persister, returning the store.
	pub fn into_store(self) -> S {
		self.store
	}
}

impl<S: EntityStore> Persister for StorePersister<S> {
	fn commit(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		match self.strategy {
			CommitStrategy::Insert => self.store.insert(instance),
			CommitStrategy::Merge => self.store.merge(instance),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[derive(Debug, Default)]
	struct Room {
		number: Option<i64>,
		label: String,
	}

	fn room(label: &str) -> ConstructedInstance {
		let descriptor = Arc::new(
			TypeDescriptor::builder::<Room>("hotel::Room")
				.primary_key("number", |r| &r.number, |r| &mut r.number)
				.build(),
		);
		let object: AnyObject = Box::new(Room {
			number: None,
			label: label.to_string(),
		});
		ConstructedInstance::new(label, descriptor, object)
	}

	/// Records which operation each commit used.
	#[derive(Default)]
	struct RecordingStore {
		calls: Vec<&'static str>,
	}

	impl EntityStore for RecordingStore {
		fn insert(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
			self.calls.push("insert");
			Ok(instance.into_persisted(None))
		}

		fn merge(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
			self.calls.push("merge");
			Ok(instance.into_persisted(None))
		}
	}

	#[rstest]
	#[case(CommitStrategy::Insert, "insert")]
	#[case(CommitStrategy::Merge, "merge")]
	fn test_store_persister_dispatch(#[case] strategy: CommitStrategy, #[case] expected: &str) {
		let mut persister = StorePersister::new(RecordingStore::default(), strategy);

		persister.commit(room("101")).unwrap();
		persister.commit(room("102")).unwrap();

		assert_eq!(persister.store().calls, vec![expected, expected]);
	}

	#[rstest]
	fn test_constructed_instance_keys() {
		let mut instance = room("201");
		assert_eq!(instance.key(), None);

		assert!(instance.set_key(&Scalar::Int(201)).unwrap());
		assert_eq!(instance.key(), Some(Scalar::Int(201)));
		assert_eq!(instance.downcast_ref::<Room>().unwrap().number, Some(201));
	}

	#[rstest]
	fn test_persisted_instance_shares_object() {
		let persisted = room("301").into_persisted(Some(Scalar::Int(1)));

		let a = persisted.downcast::<Room>().unwrap();
		let b = persisted.clone().downcast::<Room>().unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(a.label, "301");
		assert_eq!(persisted.type_name(), "hotel::Room");
		assert!(persisted.is::<Room>());
		assert!(persisted.downcast::<String>().is_none());
	}

	#[rstest]
	fn test_commit_strategy_display_and_serde() {
		assert_eq!(CommitStrategy::default(), CommitStrategy::Insert);
		assert_eq!(CommitStrategy::Merge.to_string(), "merge");
		let parsed: CommitStrategy = serde_json::from_str("\"merge\"").unwrap();
		assert_eq!(parsed, CommitStrategy::Merge);
	}

	fn commit_all<P: Persister>(mut persister: P, labels: &[&str]) {
		for label in labels {
			persister.commit(room(label)).unwrap();
		}
	}

	#[rstest]
	fn test_persister_through_mut_ref() {
		let mut inner = StorePersister::new(RecordingStore::default(), CommitStrategy::Insert);

		commit_all(&mut inner, &["401", "402"]);
		let mut boxed: Box<dyn Persister> = Box::new(StorePersister::new(
			RecordingStore::default(),
			CommitStrategy::Merge,
		));
		commit_all(&mut boxed, &["403"]);

		assert_eq!(inner.store().calls, vec!["insert", "insert"]);
	}
}
