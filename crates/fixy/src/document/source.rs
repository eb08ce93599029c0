//! Locating fixture documents on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{DocumentFormat, DocumentParser, FixtureDocument};
use crate::error::{FixyError, FixyResult};

/// Document source rooted at a directory.
///
/// Names are resolved under the root. Imports declared with `$import` are
/// resolved under the same root and loaded before the importing document.
/// Each file is loaded at most once per call, so diamond and circular
/// imports never duplicate entries.
#[derive(Debug, Clone)]
pub struct DocumentSource {
	root: PathBuf,
}

impl DocumentSource {
	/// Create a new DocumentSource
	///
	/// # Example
	///
	/// ```rust,no_run
	/// use fixy::document::DocumentSource;
	/// let source = DocumentSource::new("./tests/fixtures");
	/// let documents = source.load(&["owners", "pets.yaml"]).unwrap();
	/// ```
	pub fn new<P: AsRef<Path>>(root: P) -> Self {
		Self {
			root: root.as_ref().to_path_buf(),
		}
	}

	/// Returns the root directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Resolves a document name to an existing file under the root.
	///
	/// A name without an extension tries `.yaml`, `.yml` and `.json` in
	/// that order.
	pub fn resolve(&self, name: &str) -> FixyResult<PathBuf> {
		let candidate = self.root.join(name);

		if candidate.extension().is_some() {
			if DocumentFormat::from_path(&candidate).is_none() {
				return Err(FixyError::UnsupportedExtension(
					candidate
						.extension()
						.and_then(|e| e.to_str())
						.unwrap_or_default()
						.to_string(),
				));
			}
			if candidate.is_file() {
				return Ok(candidate);
			}
		} else {
			for ext in DocumentFormat::SEARCH_EXTENSIONS {
				let path = candidate.with_extension(ext);
				if path.is_file() {
					return Ok(path);
				}
			}
		}

		Err(FixyError::DocumentNotFound(name.to_string()))
	}

	/// Loads the named documents and everything they import.
	///
	/// The returned sequence is the encounter order of the load: each
	/// document's imports precede it.
	pub fn load<S: AsRef<str>>(&self, names: &[S]) -> FixyResult<Vec<FixtureDocument>> {
		let paths = names
			.iter()
			.map(|name| self.resolve(name.as_ref()))
			.collect::<FixyResult<Vec<_>>>()?;
		self.load_paths(&paths)
	}

	/// Loads every fixture document under `dir` (relative to the root),
	/// in path order, together with their imports.
	pub fn load_dir(&self, dir: impl AsRef<Path>) -> FixyResult<Vec<FixtureDocument>> {
		let paths = self.discover(dir)?;
		self.load_paths(&paths)
	}

	/// Returns every fixture document under `dir` (relative to the root),
	/// sorted by path.
	pub fn discover(&self, dir: impl AsRef<Path>) -> FixyResult<Vec<PathBuf>> {
		let dir = self.root.join(dir);
		if !dir.is_dir() {
			return Err(FixyError::DocumentNotFound(dir.display().to_string()));
		}

		let mut paths = Vec::new();
		for entry in walkdir::WalkDir::new(&dir).follow_links(true) {
			let entry = entry.map_err(|e| {
				FixyError::Io(std::io::Error::other(format!(
					"Failed to walk {}: {}",
					dir.display(),
					e
				)))
			})?;
			let path = entry.path();
			if !entry.file_type().is_file() {
				continue;
			}
			if DocumentFormat::from_path(path).is_none() {
				tracing::debug!(path = %path.display(), "Skipping non-fixture file");
				continue;
			}
			paths.push(path.to_path_buf());
		}
		paths.sort();

		tracing::debug!(
			dir = %dir.display(),
			count = paths.len(),
			"Discovered fixture documents"
		);
		Ok(paths)
	}

	/// Loads the given files and their imports, depth-first.
	pub fn load_paths(&self, paths: &[PathBuf]) -> FixyResult<Vec<FixtureDocument>> {
		let parser = DocumentParser::new();
		let mut seen = HashSet::new();
		let mut documents = Vec::new();

		for path in paths {
			self.visit(&parser, path, &mut seen, &mut documents)?;
		}
		Ok(documents)
	}

	fn visit(
		&self,
		parser: &DocumentParser,
		path: &Path,
		seen: &mut HashSet<PathBuf>,
		documents: &mut Vec<FixtureDocument>,
	) -> FixyResult<()> {
		let canonical = path.canonicalize().map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				FixyError::DocumentNotFound(path.display().to_string())
			} else {
				FixyError::Io(e)
			}
		})?;
		// Marked before descending so an import cycle terminates.
		if !seen.insert(canonical) {
			tracing::debug!(path = %path.display(), "Document already loaded");
			return Ok(());
		}

		let document = parser.parse_file(path)?;
		for import in &document.imports {
			let imported = self.resolve(import)?;
			tracing::debug!(
				importer = %path.display(),
				path = %imported.display(),
				"Loading imported document"
			);
			self.visit(parser, &imported, seen, documents)?;
		}

		tracing::debug!(
			path = %path.display(),
			entries = document.len(),
			"Loaded fixture document"
		);
		documents.push(document);
		Ok(())
	}
}
