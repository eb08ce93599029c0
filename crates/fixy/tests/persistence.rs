//! Commit strategies and transactional use of the memory store.

mod helpers;

use fixy::error::{FixyError, PersistError};
use fixy::persist::{MemoryStore, StoreOperation};
use fixy::{Fixture, FixyResult, LoadResult};
use helpers::documents::{FixtureDir, fixture_dir, store};
use helpers::models::{Owner, Pet};
use rstest::rstest;

const CLINIC: &str = r#"
ann: !Owner { name: Ann, age: 30, email: ann@example.com }
bob: !Owner { name: Bob, age: 41, email: bob@example.com }
rex: !Pet { id: 7, name: Rex, owner: !ref ann }
"#;

#[rstest]
fn test_merge_is_idempotent(fixture_dir: FixtureDir, store: MemoryStore) {
	// Arrange
	fixture_dir.write("clinic.yaml", CLINIC);
	let mut fixy = fixture_dir
		.builder(store.clone())
		.merge_entities()
		.build()
		.unwrap();

	// Act
	fixy.load(&["clinic"]).unwrap();
	let second = fixy.load(&["clinic"]).unwrap();

	// Assert
	assert_eq!(store.count_of::<Owner>(), 2);
	assert_eq!(store.count_of::<Pet>(), 1);
	let updates = store
		.operations()
		.iter()
		.filter(|op| matches!(op, StoreOperation::Updated { .. }))
		.count();
	assert_eq!(updates, 3);
	// Second-load instances carry the identity of the existing records
	assert_eq!(second.instance::<Owner>("ann").unwrap().id, Some(1));
	assert_eq!(second.instance::<Pet>("rex").unwrap().id, Some(7));
}

#[rstest]
fn test_insert_duplicates_records(fixture_dir: FixtureDir, store: MemoryStore) {
	// Arrange
	fixture_dir.write(
		"owners.yaml",
		"ann: !Owner { name: Ann, email: ann@example.com }\n",
	);
	let mut fixy = fixture_dir.fixy(&store);

	// Act
	let first = fixy.load(&["owners"]).unwrap();
	let second = fixy.load(&["owners"]).unwrap();

	// Assert
	assert_eq!(store.count_of::<Owner>(), 2);
	assert_eq!(first.instance::<Owner>("ann").unwrap().id, Some(1));
	assert_eq!(second.instance::<Owner>("ann").unwrap().id, Some(2));
	assert!(store.operations().iter().all(StoreOperation::is_insert));
}

#[rstest]
fn test_insert_rejects_explicit_duplicate_key(fixture_dir: FixtureDir, store: MemoryStore) {
	// Arrange
	fixture_dir.write("clinic.yaml", CLINIC);
	let mut fixy = fixture_dir.fixy(&store);
	fixy.load(&["clinic"]).unwrap();

	// Act
	let error = fixy.load(&["clinic"]).unwrap_err();

	// Assert: owners are inserted again, the pet with its fixed id is not
	match error {
		FixyError::Persist { entry, source } => {
			assert_eq!(entry, "rex");
			assert!(matches!(source, PersistError::DuplicateKey { ref key, .. } if key == "7"));
		}
		other => panic!("expected Persist, got {other:?}"),
	}
	assert_eq!(store.count_of::<Owner>(), 4);
}

#[rstest]
fn test_atomic_load_rolls_back_on_failure(fixture_dir: FixtureDir, store: MemoryStore) {
	// Arrange: the pet fails to bind after both owners are committed
	fixture_dir.write(
		"clinic.yaml",
		r#"
ann: !Owner { name: Ann, email: ann@example.com }
bob: !Owner { name: Bob, email: bob@example.com }
rex: !Pet { name: Rex, birth_date: someday }
"#,
	);
	let mut fixy = fixture_dir.fixy(&store);

	// Act
	let result: FixyResult<LoadResult> = store.atomic(|_| fixy.load(&["clinic"]));

	// Assert
	assert!(matches!(result, Err(FixyError::FieldBinding { .. })));
	assert!(store.is_empty());
	assert!(store.operations().is_empty());
}

#[rstest]
fn test_atomic_load_commits_on_success(fixture_dir: FixtureDir, store: MemoryStore) {
	fixture_dir.write("clinic.yaml", CLINIC);
	let mut fixy = fixture_dir.fixy(&store);

	let loaded = store.atomic(|_| fixy.load(&["clinic"])).unwrap();

	assert_eq!(loaded.len(), 3);
	assert_eq!(store.len(), 3);
	let rex = store.get::<Pet>(Pet::descriptor().name(), 7i64).unwrap();
	assert_eq!(rex.owner.as_ref().unwrap().name, "Ann");
}

#[rstest]
fn test_persisted_instances_are_the_stored_objects(fixture_dir: FixtureDir, store: MemoryStore) {
	fixture_dir.write("clinic.yaml", CLINIC);
	let mut fixy = fixture_dir.fixy(&store);

	let result = fixy.load(&["clinic"]).unwrap();

	let stored = store.all_of::<Owner>();
	let loaded: Vec<_> = ["ann", "bob"]
		.iter()
		.map(|name| result.instance::<Owner>(name).unwrap())
		.collect();
	assert_eq!(stored.len(), 2);
	for (stored, loaded) in stored.iter().zip(&loaded) {
		assert!(std::sync::Arc::ptr_eq(stored, loaded));
	}
	assert_eq!(result.get("rex").unwrap().key().unwrap().to_string(), "7");
}
