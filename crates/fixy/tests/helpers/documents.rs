//! Temporary fixture directories.

use std::fs;
use std::path::{Path, PathBuf};

use fixy::persist::{MemoryStore, StorePersister};
use fixy::{Fixy, FixyBuilder};
use rstest::fixture;
use tempfile::TempDir;

/// A temporary document root that is removed on drop.
pub struct FixtureDir {
	dir: TempDir,
}

impl FixtureDir {
	/// Creates an empty document root.
	pub fn new() -> Self {
		Self {
			dir: TempDir::new().unwrap(),
		}
	}

	/// Returns the root path.
	pub fn path(&self) -> &Path {
		self.dir.path()
	}

	/// Writes `content` to `name` under the root, creating parent directories.
	pub fn write(&self, name: &str, content: &str) -> PathBuf {
		let path = self.dir.path().join(name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(&path, content).unwrap();
		path
	}

	/// Starts a builder over `store` rooted at this directory, with the
	/// `clinic` namespace.
	pub fn builder(&self, store: MemoryStore) -> FixyBuilder<MemoryStore> {
		FixyBuilder::new(store)
			.with_default_namespace("clinic")
			.with_document_root(self.path())
	}

	/// Builds an insert-mode loader over `store`.
	pub fn fixy(&self, store: &MemoryStore) -> Fixy<StorePersister<MemoryStore>> {
		self.builder(store.clone()).build().unwrap()
	}
}

impl Default for FixtureDir {
	fn default() -> Self {
		Self::new()
	}
}

#[fixture]
pub fn fixture_dir() -> FixtureDir {
	super::init_tracing();
	FixtureDir::new()
}

#[fixture]
pub fn store() -> MemoryStore {
	MemoryStore::new()
}
