//! In-memory entity store.
//!
//! Records are kept in one table per qualified type name. Keys are
//! assigned per table starting at 1 and written back into the instance's
//! primary-key field. An integer key of `0`, an empty string or an unset
//! `Option` counts as unassigned.
//!
//! ## Example
//!
//! ```
//! use fixy::persist::{CommitStrategy, MemoryStore, StorePersister};
//!
//! let store = MemoryStore::new();
//! let persister = StorePersister::new(store.clone(), CommitStrategy::Merge);
//!
//! let result = store.atomic(|store| {
//! 	assert!(store.is_empty());
//! 	Err::<(), _>("abort")
//! });
//! assert!(result.is_err());
//! assert_eq!(persister.store().len(), 0);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{ConstructedInstance, EntityStore, PersistedInstance};
use crate::document::Scalar;
use crate::error::PersistError;
use crate::types::Fixture;

/// One write recorded by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
	/// A new record was stored.
	Inserted {
		/// Qualified type name.
		type_name: String,
		/// Entry the record was built from.
		entry: String,
		/// Record key.
		key: Scalar,
	},
	/// An existing record was replaced by a merge.
	Updated {
		/// Qualified type name.
		type_name: String,
		/// Entry the record was built from.
		entry: String,
		/// Record key.
		key: Scalar,
	},
}

impl StoreOperation {
	/// Entry the record was built from.
	pub fn entry(&self) -> &str {
		match self {
			Self::Inserted { entry, .. } | Self::Updated { entry, .. } => entry,
		}
	}

	/// Qualified type name.
	pub fn type_name(&self) -> &str {
		match self {
			Self::Inserted { type_name, .. } | Self::Updated { type_name, .. } => type_name,
		}
	}

	/// Record key.
	pub fn key(&self) -> &Scalar {
		match self {
			Self::Inserted { key, .. } | Self::Updated { key, .. } => key,
		}
	}

	/// Returns true for inserts.
	pub fn is_insert(&self) -> bool {
		matches!(self, Self::Inserted { .. })
	}
}

#[derive(Clone)]
struct Row {
	key: Scalar,
	entry: String,
	natural_key: Option<Vec<Scalar>>,
	object: Arc<dyn Any + Send + Sync>,
}

#[derive(Clone)]
struct Table {
	rows: IndexMap<String, Row>,
	next_id: i64,
}

impl Default for Table {
	fn default() -> Self {
		Self {
			rows: IndexMap::new(),
			next_id: 1,
		}
	}
}

impl Table {
	fn allocate(&mut self) -> Scalar {
		let id = self.next_id;
		self.next_id += 1;
		Scalar::Int(id)
	}

	fn observe(&mut self, key: &Scalar) {
		if let Scalar::Int(id) = key
			&& *id >= self.next_id
		{
			self.next_id = id.saturating_add(1);
		}
	}

	fn find_natural(&self, natural_key: &[Scalar]) -> Option<String> {
		self.rows
			.iter()
			.find(|(_, row)| row.natural_key.as_deref() == Some(natural_key))
			.map(|(id, _)| id.clone())
	}
}

#[derive(Clone, Default)]
struct State {
	tables: IndexMap<String, Table>,
	log: Vec<StoreOperation>,
}

fn key_id(key: &Scalar) -> String {
	key.to_string()
}

fn is_unassigned(key: &Scalar) -> bool {
	match key {
		Scalar::Null | Scalar::Int(0) => true,
		Scalar::String(s) => s.is_empty(),
		_ => false,
	}
}

/// Writes `key` back into the instance. Returns false for types without a
/// primary key, whose row key stays internal to the store.
fn assign_key(instance: &mut ConstructedInstance, key: &Scalar) -> Result<bool, PersistError> {
	instance
		.set_key(key)
		.map_err(|source| PersistError::KeyAssignment {
			type_name: instance.type_name().to_string(),
			key: key.to_string(),
			source,
		})
}

impl State {
	fn insert(&mut self, mut instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		let type_name = instance.type_name().to_string();
		let table = self.tables.entry(type_name.clone()).or_default();

		let (key, visible) = match instance.key().filter(|key| !is_unassigned(key)) {
			Some(key) => {
				if table.rows.contains_key(&key_id(&key)) {
					return Err(PersistError::DuplicateKey {
						type_name,
						key: key.to_string(),
					});
				}
				table.observe(&key);
				(key, true)
			}
			None => {
				let key = table.allocate();
				let visible = assign_key(&mut instance, &key)?;
				(key, visible)
			}
		};

		let entry = instance.entry().to_string();
		let natural_key = instance.natural_key();
		let persisted = instance.into_persisted(visible.then(|| key.clone()));
		table.rows.insert(
			key_id(&key),
			Row {
				key: key.clone(),
				entry: entry.clone(),
				natural_key,
				object: Arc::clone(persisted.object()),
			},
		);
		self.log.push(StoreOperation::Inserted {
			type_name,
			entry,
			key,
		});
		Ok(persisted)
	}

	fn merge(&mut self, mut instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		let type_name = instance.type_name().to_string();
		let existing = self.tables.get(&type_name).and_then(|table| {
			instance
				.key()
				.filter(|key| !is_unassigned(key))
				.map(|key| key_id(&key))
				.filter(|id| table.rows.contains_key(id))
				.or_else(|| {
					instance
						.natural_key()
						.and_then(|natural_key| table.find_natural(&natural_key))
				})
		});

		let Some(id) = existing else {
			return self.insert(instance);
		};
		let Some(row) = self
			.tables
			.get_mut(&type_name)
			.and_then(|table| table.rows.get_mut(&id))
		else {
			return self.insert(instance);
		};

		let key = row.key.clone();
		let visible = assign_key(&mut instance, &key)?;
		let entry = instance.entry().to_string();
		row.natural_key = instance.natural_key();
		row.entry = entry.clone();
		let persisted = instance.into_persisted(visible.then(|| key.clone()));
		row.object = Arc::clone(persisted.object());

		self.log.push(StoreOperation::Updated {
			type_name,
			entry,
			key,
		});
		Ok(persisted)
	}
}

/// In-memory [`EntityStore`].
///
/// Clones share the same data, so a test can keep a handle while the
/// loader owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
	state: Arc<RwLock<State>>,
}

impl MemoryStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the number of records of `type_name`.
	pub fn count(&self, type_name: &str) -> usize {
		self.state
			.read()
			.tables
			.get(type_name)
			.map_or(0, |table| table.rows.len())
	}

	/// Returns the number of records of `T`.
	pub fn count_of<T: Fixture>(&self) -> usize {
		self.count(T::descriptor().name())
	}

	/// Returns the total number of records.
	pub fn len(&self) -> usize {
		self.state
			.read()
			.tables
			.values()
			.map(|table| table.rows.len())
			.sum()
	}

	/// Returns true if the store holds no records.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Looks up a record by key.
	pub fn get<T: Any + Send + Sync>(&self, type_name: &str, key: impl Into<Scalar>) -> Option<Arc<T>> {
		let key = key.into();
		let state = self.state.read();
		let row = state.tables.get(type_name)?.rows.get(&key_id(&key))?;
		Arc::clone(&row.object).downcast::<T>().ok()
	}

	/// Returns every record of `type_name` as `T`, in insertion order.
	pub fn all<T: Any + Send + Sync>(&self, type_name: &str) -> Vec<Arc<T>> {
		let state = self.state.read();
		state
			.tables
			.get(type_name)
			.map(|table| {
				table
					.rows
					.values()
					.filter_map(|row| Arc::clone(&row.object).downcast::<T>().ok())
					.collect()
			})
			.unwrap_or_default()
	}

	/// Returns every record of `T`, in insertion order.
	pub fn all_of<T: Fixture>(&self) -> Vec<Arc<T>> {
		self.all(T::descriptor().name())
	}

	/// Returns the entry names behind the records of `type_name`.
	pub fn entries(&self, type_name: &str) -> Vec<String> {
		let state = self.state.read();
		state
			.tables
			.get(type_name)
			.map(|table| table.rows.values().map(|row| row.entry.clone()).collect())
			.unwrap_or_default()
	}

	/// Returns the names of all tables, in creation order.
	pub fn type_names(&self) -> Vec<String> {
		self.state.read().tables.keys().cloned().collect()
	}

	/// Returns every write so far, in order.
	pub fn operations(&self) -> Vec<StoreOperation> {
		self.state.read().log.clone()
	}

	/// Removes all records and the operation log.
	pub fn clear(&self) {
		*self.state.write() = State::default();
	}

	/// Starts a transaction. Dropping it without [`MemoryTransaction::commit`]
	/// restores the store to its state at this point.
	pub fn begin(&self) -> MemoryTransaction {
		MemoryTransaction {
			store: self.clone(),
			snapshot: Some(self.state.read().clone()),
		}
	}

	/// Runs `f` in a transaction: committed on `Ok`, rolled back on `Err`.
	pub fn atomic<T, E, F>(&self, f: F) -> Result<T, E>
	where
		F: FnOnce(&MemoryStore) -> Result<T, E>,
	{
		let tx = self.begin();
		match f(self) {
			Ok(value) => {
				tx.commit();
				Ok(value)
			}
			Err(error) => {
				tx.rollback();
				Err(error)
			}
		}
	}
}

impl fmt::Debug for MemoryStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		let mut tables = f.debug_map();
		for (name, table) in &state.tables {
			tables.entry(name, &table.rows.len());
		}
		tables.finish()
	}
}

impl EntityStore for MemoryStore {
	fn insert(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		self.state.write().insert(instance)
	}

	fn merge(&mut self, instance: ConstructedInstance) -> Result<PersistedInstance, PersistError> {
		self.state.write().merge(instance)
	}
}

/// Snapshot transaction over a [`MemoryStore`].
pub struct MemoryTransaction {
	store: MemoryStore,
	snapshot: Option<State>,
}

impl MemoryTransaction {
	/// Keeps every write made since the transaction began.
	pub fn commit(mut self) {
		self.snapshot = None;
		tracing::debug!("Memory store transaction committed");
	}

	/// Discards every write made since the transaction began.
	pub fn rollback(mut self) {
		self.restore();
	}

	fn restore(&mut self) {
		if let Some(snapshot) = self.snapshot.take() {
			*self.store.state.write() = snapshot;
			tracing::debug!("Memory store transaction rolled back");
		}
	}
}

impl Drop for MemoryTransaction {
	fn drop(&mut self) {
		self.restore();
	}
}

impl fmt::Debug for MemoryTransaction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MemoryTransaction")
			.field("active", &self.snapshot.is_some())
			.finish()
	}
}
