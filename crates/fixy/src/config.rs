//! Load configuration.
//!
//! [`FixyConfig`] is assembled once (by [`FixyBuilder`](crate::builder::FixyBuilder)
//! or from a TOML file) and never mutated after a load begins.
//!
//! ```toml
//! default_namespace = "app::models"
//! commit_strategy = "merge"
//! access_mode = "field"
//! document_root = "tests/fixtures"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FixyError, FixyResult};
use crate::persist::CommitStrategy;

/// How instance fields are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
	/// Bind through the type's mutators. Fields without one cannot be bound.
	#[default]
	Property,
	/// Assign the underlying storage directly, bypassing mutators.
	Field,
}

impl fmt::Display for AccessMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Property => write!(f, "property"),
			Self::Field => write!(f, "field"),
		}
	}
}

/// Immutable configuration of a fixture load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixyConfig {
	/// Namespace prefixed to unqualified type names.
	pub default_namespace: Option<String>,

	/// Insert or merge, applied to every instance of a load.
	pub commit_strategy: CommitStrategy,

	/// Property or direct-field binding.
	pub access_mode: AccessMode,

	/// Directory document names are resolved under.
	pub document_root: Option<PathBuf>,
}

impl FixyConfig {
	/// Creates the default configuration: insert mode, property access,
	/// no namespace, documents resolved under the current directory.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a configuration from TOML text.
	///
	/// # Example
	///
	/// ```
	/// # use fixy::config::{AccessMode, FixyConfig};
	/// let config = FixyConfig::from_toml_str(r#"access_mode = "field""#).unwrap();
	/// assert_eq!(config.access_mode, AccessMode::Field);
	/// ```
	pub fn from_toml_str(content: &str) -> FixyResult<Self> {
		let config: Self =
			toml::from_str(content).map_err(|e| FixyError::Config(e.message().to_string()))?;
		config.validate()?;
		Ok(config)
	}

	/// Reads a configuration from a TOML file.
	///
	/// A relative `document_root` is interpreted relative to the file's directory.
	pub fn from_file(path: &Path) -> FixyResult<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| {
			FixyError::Config(format!("cannot read {}: {}", path.display(), e))
		})?;
		let mut config = Self::from_toml_str(&content)?;
		if let Some(root) = &config.document_root
			&& root.is_relative()
			&& let Some(parent) = path.parent()
		{
			config.document_root = Some(parent.join(root));
		}
		Ok(config)
	}

	/// Returns the directory documents are resolved under.
	pub fn document_root(&self) -> &Path {
		self.document_root
			.as_deref()
			.unwrap_or_else(|| Path::new("."))
	}

	/// Checks settings that the type system cannot.
	pub fn validate(&self) -> FixyResult<()> {
		if let Some(namespace) = &self.default_namespace {
			let trimmed = namespace.trim_end_matches("::");
			if trimmed.is_empty() || trimmed.split("::").any(|segment| segment.is_empty()) {
				return Err(FixyError::Config(format!(
					"default namespace '{}' is not a valid path",
					namespace
				)));
			}
		}
		Ok(())
	}
}
