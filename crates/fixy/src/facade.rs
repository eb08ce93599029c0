//! The configured loader facade.

use std::path::Path;

use crate::config::FixyConfig;
use crate::document::{DocumentSource, FixtureDocument};
use crate::engine::{FixtureEngine, LoadResult};
use crate::error::FixyResult;
use crate::persist::{EntityStore, Persister, StorePersister};

/// A fixture engine bound to a document source and a persister.
///
/// Usually obtained from [`FixyBuilder`](crate::builder::FixyBuilder).
///
/// # Example
///
/// ```no_run
/// use fixy::prelude::*;
///
/// let mut fixy = FixyBuilder::new(MemoryStore::new())
/// 	.with_document_root("tests/fixtures")
/// 	.build()?;
///
/// let result = fixy.load(&["owners", "pets"])?;
/// println!("loaded {} fixtures", result.len());
/// # Ok::<(), fixy::FixyError>(())
/// ```
#[derive(Debug)]
pub struct Fixy<P> {
	engine: FixtureEngine,
	source: DocumentSource,
	persister: P,
}

impl<P: Persister> Fixy<P> {
	/// Creates a facade. Documents are resolved under the engine's
	/// configured document root.
	pub fn new(engine: FixtureEngine, persister: P) -> Self {
		let source = DocumentSource::new(engine.config().document_root());
		Self {
			engine,
			source,
			persister,
		}
	}

	/// Loads the named documents, with their imports, in one load.
	pub fn load<S: AsRef<str>>(&mut self, names: &[S]) -> FixyResult<LoadResult> {
		let documents = self.source.load(names)?;
		self.load_documents(&documents)
	}

	/// Loads already-parsed documents.
	pub fn load_documents(&mut self, documents: &[FixtureDocument]) -> FixyResult<LoadResult> {
		self.engine.load(documents, &mut self.persister)
	}

	/// Loads every document beneath `dir`, relative to the document root.
	pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> FixyResult<LoadResult> {
		let documents = self.source.load_dir(dir)?;
		self.load_documents(&documents)
	}

	/// Returns the configuration.
	pub fn config(&self) -> &FixyConfig {
		self.engine.config()
	}

	/// Returns the engine.
	pub fn engine(&self) -> &FixtureEngine {
		&self.engine
	}

	/// Returns the document source.
	pub fn source(&self) -> &DocumentSource {
		&self.source
	}

	/// Returns the persister.
	pub fn persister(&self) -> &P {
		&self.persister
	}

	/// Returns the persister mutably.
	pub fn persister_mut(&mut self) -> &mut P {
		&mut self.persister
	}

	/// Consumes the facade, returning the persister.
	pub fn into_persister(self) -> P {
		self.persister
	}
}

impl<S: EntityStore> Fixy<StorePersister<S>> {
	/// Returns the backing store.
	pub fn store(&self) -> &S {
		self.persister.store()
	}
}
