//! In-memory representation of parsed fixture documents.
//!
//! A [`FixtureDocument`] is an ordered sequence of named [`FixtureEntry`]s.
//! Entry fields hold [`FieldValue`]s, which may point at other entries through
//! [`FieldValue::Reference`].

pub mod format;
pub mod parser;
pub mod source;

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

pub use format::DocumentFormat;
pub use parser::DocumentParser;
pub use source::DocumentSource;

/// A primitive document value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
	/// Explicit null.
	Null,
	/// Boolean.
	Bool(bool),
	/// Signed integer.
	Int(i64),
	/// Floating point number.
	Float(f64),
	/// Text.
	String(String),
}

impl Scalar {
	/// Short description of the scalar kind, used in error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Int(_) => "integer",
			Self::Float(_) => "float",
			Self::String(_) => "string",
		}
	}

	/// Returns true for [`Scalar::Null`].
	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}
}

impl fmt::Display for Scalar {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => write!(f, "null"),
			Self::Bool(b) => write!(f, "{}", b),
			Self::Int(i) => write!(f, "{}", i),
			Self::Float(x) => write!(f, "{}", x),
			Self::String(s) => write!(f, "{}", s),
		}
	}
}

impl From<&str> for Scalar {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for Scalar {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<i64> for Scalar {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<bool> for Scalar {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Scalar {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

/// A field value as written in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	/// A primitive value.
	Scalar(Scalar),
	/// An ordered list.
	Sequence(Vec<FieldValue>),
	/// A nested field set, bound as an embedded value object.
	Mapping(IndexMap<String, FieldValue>),
	/// The name of another entry, resolved to its instance before binding.
	Reference(String),
}

impl FieldValue {
	/// Creates a reference to the named entry.
	pub fn reference(target: impl Into<String>) -> Self {
		Self::Reference(target.into())
	}

	/// Visits every reference in this value with its field path.
	///
	/// `path` is the path of this value; sequence elements are suffixed with
	/// `[i]`, nested fields with `.name`.
	pub fn visit_references<'a>(&'a self, path: &str, visit: &mut impl FnMut(String, &'a str)) {
		match self {
			Self::Reference(target) => visit(path.to_string(), target),
			Self::Sequence(items) => {
				for (idx, item) in items.iter().enumerate() {
					item.visit_references(&format!("{}[{}]", path, idx), visit);
				}
			}
			Self::Mapping(fields) => {
				for (name, value) in fields {
					value.visit_references(&format!("{}.{}", path, name), visit);
				}
			}
			Self::Scalar(_) => {}
		}
	}
}

impl From<Scalar> for FieldValue {
	fn from(value: Scalar) -> Self {
		Self::Scalar(value)
	}
}

macro_rules! field_value_from_scalar {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for FieldValue {
				fn from(value: $ty) -> Self {
					Self::Scalar(Scalar::from(value))
				}
			}
		)*
	};
}

field_value_from_scalar!(&str, String, i64, bool, f64);

/// One named record within a document.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureEntry {
	/// Entry name, unique across a whole load.
	pub name: String,

	/// Declared type name, qualified or simple.
	pub type_name: Option<String>,

	/// Field values in document order.
	pub fields: IndexMap<String, FieldValue>,
}

impl FixtureEntry {
	/// Creates an entry without a declared type.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			type_name: None,
			fields: IndexMap::new(),
		}
	}

	/// Sets the declared type name.
	pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
		self.type_name = Some(type_name.into());
		self
	}

	/// Adds a field value.
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}

	/// Returns `(field path, target)` for every reference held by this entry,
	/// in field order.
	pub fn references(&self) -> Vec<(String, &str)> {
		let mut refs = Vec::new();
		for (name, value) in &self.fields {
			value.visit_references(name, &mut |path, target| refs.push((path, target)));
		}
		refs
	}
}

/// One parsed source document.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureDocument {
	/// Originating path, or `None` for documents parsed from memory.
	pub path: Option<PathBuf>,

	/// Documents named by `$import`, in declaration order.
	pub imports: Vec<String>,

	/// Entries in document order.
	pub entries: Vec<FixtureEntry>,
}

impl FixtureDocument {
	/// Creates an empty in-memory document.
	pub fn new() -> Self {
		Self {
			path: None,
			imports: Vec::new(),
			entries: Vec::new(),
		}
	}

	/// Creates a document from entries.
	pub fn from_entries(entries: Vec<FixtureEntry>) -> Self {
		Self {
			entries,
			..Self::new()
		}
	}

	/// Sets the originating path.
	pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
		self.path = Some(path.as_ref().to_path_buf());
		self
	}

	/// Adds an entry.
	pub fn push(&mut self, entry: FixtureEntry) {
		self.entries.push(entry);
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true if there are no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Returns a label for diagnostics: the path, or `<memory>`.
	pub fn label(&self) -> String {
		self.path
			.as_ref()
			.map(|p| p.display().to_string())
			.unwrap_or_else(|| "<memory>".to_string())
	}

	/// Returns an iterator over the entries.
	pub fn iter(&self) -> impl Iterator<Item = &FixtureEntry> {
		self.entries.iter()
	}
}

impl Default for FixtureDocument {
	fn default() -> Self {
		Self::new()
	}
}

impl<'a> IntoIterator for &'a FixtureDocument {
	type Item = &'a FixtureEntry;
	type IntoIter = std::slice::Iter<'a, FixtureEntry>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_entry_builder() {
		let entry = FixtureEntry::new("ann")
			.with_type("Owner")
			.with_field("name", "Ann")
			.with_field("age", 30i64);

		assert_eq!(entry.name, "ann");
		assert_eq!(entry.type_name.as_deref(), Some("Owner"));
		assert_eq!(entry.fields["name"], FieldValue::Scalar(Scalar::from("Ann")));
		assert_eq!(entry.fields["age"], FieldValue::Scalar(Scalar::Int(30)));
	}

	#[rstest]
	fn test_references_are_collected_with_paths() {
		let mut address = IndexMap::new();
		address.insert("landlord".to_string(), FieldValue::reference("bob"));

		let entry = FixtureEntry::new("rex")
			.with_field("owner", FieldValue::reference("ann"))
			.with_field(
				"friends",
				FieldValue::Sequence(vec![
					FieldValue::reference("fido"),
					FieldValue::from("not a ref"),
				]),
			)
			.with_field("home", FieldValue::Mapping(address));

		let refs = entry.references();
		assert_eq!(
			refs,
			vec![
				("owner".to_string(), "ann"),
				("friends[0]".to_string(), "fido"),
				("home.landlord".to_string(), "bob"),
			]
		);
	}

	#[rstest]
	fn test_document_label() {
		let doc = FixtureDocument::new();
		assert_eq!(doc.label(), "<memory>");

		let doc = FixtureDocument::new().with_path("fixtures/owners.yaml");
		assert_eq!(doc.label(), "fixtures/owners.yaml");
	}

	#[rstest]
	fn test_scalar_display_and_kind() {
		assert_eq!(Scalar::Int(3).to_string(), "3");
		assert_eq!(Scalar::Null.kind(), "null");
		assert_eq!(Scalar::from("x").kind(), "string");
	}
}
