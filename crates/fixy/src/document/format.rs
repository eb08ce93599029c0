//! Supported fixture document formats.

use std::path::Path;

/// Supported fixture file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DocumentFormat {
	/// YAML format (default).
	#[default]
	Yaml,

	/// JSON format.
	Json,
}

impl DocumentFormat {
	/// Extensions tried, in order, for a document name without one.
	pub const SEARCH_EXTENSIONS: [&'static str; 3] = ["yaml", "yml", "json"];

	/// Determines the document format from a file extension.
	///
	/// # Example
	///
	/// ```
	/// # use fixy::document::DocumentFormat;
	/// assert_eq!(DocumentFormat::from_extension("json"), Some(DocumentFormat::Json));
	/// assert_eq!(DocumentFormat::from_extension("yaml"), Some(DocumentFormat::Yaml));
	/// assert_eq!(DocumentFormat::from_extension("yml"), Some(DocumentFormat::Yaml));
	/// assert_eq!(DocumentFormat::from_extension("xml"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the document format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}

	/// Returns the default file extension for this format.
	pub fn extension(&self) -> &'static str {
		match self {
			Self::Yaml => "yaml",
			Self::Json => "json",
		}
	}
}

impl std::fmt::Display for DocumentFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Yaml => write!(f, "YAML"),
			Self::Json => write!(f, "JSON"),
		}
	}
}
