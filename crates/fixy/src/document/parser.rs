//! Fixture document parsing.
//!
//! YAML and JSON text is first read into a format-neutral node tree, then
//! normalized into a [`FixtureDocument`]:
//!
//! ```yaml
//! $import: owners.yaml
//!
//! rex: !Pet
//!   name: Rex
//!   owner: !ref ann
//!   born: 2019-04-01
//! ```
//!
//! The JSON spelling of the same document uses `$type` and `$ref` keys:
//!
//! ```json
//! {
//!   "$import": "owners.yaml",
//!   "rex": { "$type": "Pet", "name": "Rex", "owner": { "$ref": "ann" } }
//! }
//! ```

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};

use super::{DocumentFormat, FieldValue, FixtureDocument, FixtureEntry, Scalar};
use crate::error::{FixyError, FixyResult};

const REF_TAG: &str = "ref";
const TYPE_KEY: &str = "$type";
const REF_KEY: &str = "$ref";
const IMPORT_KEY: &str = "$import";

/// Format-neutral parse tree shared by the YAML and JSON front ends.
#[derive(Debug)]
enum Node {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Seq(Vec<Node>),
	Map(Vec<(String, Node)>),
	Tagged(String, Box<Node>),
}

impl Node {
	fn kind(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Int(_) => "integer",
			Self::Float(_) => "float",
			Self::String(_) => "string",
			Self::Seq(_) => "sequence",
			Self::Map(_) => "mapping",
			Self::Tagged(..) => "tagged value",
		}
	}
}

// Mappings are read as pair lists, so a repeated key survives parsing and
// reaches the load's duplicate-name check instead of being merged away.
impl<'de> Deserialize<'de> for Node {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(NodeVisitor)
	}
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
	type Value = Node;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a fixture document value")
	}

	fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
		Ok(Node::Null)
	}

	fn visit_none<E: de::Error>(self) -> Result<Node, E> {
		Ok(Node::Null)
	}

	fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
		Node::deserialize(deserializer)
	}

	fn visit_bool<E: de::Error>(self, value: bool) -> Result<Node, E> {
		Ok(Node::Bool(value))
	}

	fn visit_i64<E: de::Error>(self, value: i64) -> Result<Node, E> {
		Ok(Node::Int(value))
	}

	// Integers above `i64::MAX` keep their decimal text so they still
	// coerce to wide unsigned fields.
	fn visit_u64<E: de::Error>(self, value: u64) -> Result<Node, E> {
		Ok(match i64::try_from(value) {
			Ok(i) => Node::Int(i),
			Err(_) => Node::String(value.to_string()),
		})
	}

	fn visit_f64<E: de::Error>(self, value: f64) -> Result<Node, E> {
		Ok(Node::Float(value))
	}

	fn visit_str<E: de::Error>(self, value: &str) -> Result<Node, E> {
		Ok(Node::String(value.to_string()))
	}

	fn visit_string<E: de::Error>(self, value: String) -> Result<Node, E> {
		Ok(Node::String(value))
	}

	fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
		let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
		while let Some(item) = seq.next_element()? {
			items.push(item);
		}
		Ok(Node::Seq(items))
	}

	fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
		let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
		while let Some(MapKey(key)) = map.next_key()? {
			pairs.push((key, map.next_value()?));
		}
		Ok(Node::Map(pairs))
	}

	// YAML tags (`!Owner`, `!ref`) arrive as single-variant enums.
	fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Node, A::Error> {
		let (tag, variant): (String, _) = data.variant()?;
		let value = variant.newtype_variant::<Node>()?;
		Ok(Node::Tagged(
			tag.trim_start_matches('!').to_string(),
			Box::new(value),
		))
	}
}

/// A mapping key. YAML allows any scalar as a key; it is kept as text.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		deserializer.deserialize_any(MapKeyVisitor).map(MapKey)
	}
}

struct MapKeyVisitor;

impl<'de> Visitor<'de> for MapKeyVisitor {
	type Value = String;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a scalar mapping key")
	}

	fn visit_bool<E: de::Error>(self, value: bool) -> Result<String, E> {
		Ok(value.to_string())
	}

	fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
		Ok(value.to_string())
	}

	fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
		Ok(value.to_string())
	}

	fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
		Ok(value.to_string())
	}

	fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
		Ok(value.to_string())
	}

	fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
		Ok(value)
	}
}

fn document_error(label: &str, message: impl Into<String>) -> FixyError {
	FixyError::Document {
		path: label.to_string(),
		message: message.into(),
	}
}

fn duplicate_field(label: &str, entry: &str, field: &str) -> FixyError {
	document_error(label, format!("field `{}` of entry `{}` is declared twice", field, entry))
}

/// Converts a file stem such as `pet_owner` into a simple type name (`PetOwner`).
///
/// # Example
///
/// ```
/// # use fixy::document::parser::infer_type_name;
/// assert_eq!(infer_type_name("pet_owner").as_deref(), Some("PetOwner"));
/// assert_eq!(infer_type_name("owner").as_deref(), Some("Owner"));
/// assert_eq!(infer_type_name("__").as_deref(), None);
/// ```
pub fn infer_type_name(stem: &str) -> Option<String> {
	let name: String = stem
		.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
		.filter(|part| !part.is_empty())
		.map(|part| {
			let mut chars = part.chars();
			match chars.next() {
				Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
				None => String::new(),
			}
		})
		.collect();
	if name.is_empty() { None } else { Some(name) }
}

/// Parser for fixture documents.
#[derive(Debug, Default)]
pub struct DocumentParser;

impl DocumentParser {
	/// Creates a new document parser.
	pub fn new() -> Self {
		Self
	}

	/// Parses a fixture document from the given path.
	///
	/// The format is detected from the file extension. Entries without a
	/// declared type take the document's `$type` directive, or else the
	/// type name inferred from the file stem.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The file cannot be read
	/// - The file extension is not recognized
	/// - The file content is not a valid fixture document
	pub fn parse_file(&self, path: &Path) -> FixyResult<FixtureDocument> {
		let format = DocumentFormat::from_path(path).ok_or_else(|| {
			FixyError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;

		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				FixyError::DocumentNotFound(path.display().to_string())
			} else {
				FixyError::Io(e)
			}
		})?;

		let label = path.display().to_string();
		let inferred = path
			.file_stem()
			.and_then(|s| s.to_str())
			.and_then(infer_type_name);
		let mut document = self.parse_labeled(&content, format, &label, inferred)?;
		document.path = Some(path.to_path_buf());
		Ok(document)
	}

	/// Parses a fixture document from a string.
	///
	/// No type name can be inferred for in-memory documents; entries need a
	/// declared type or a `$type` directive.
	pub fn parse_str(&self, content: &str, format: DocumentFormat) -> FixyResult<FixtureDocument> {
		self.parse_labeled(content, format, "<memory>", None)
	}

	fn parse_labeled(
		&self,
		content: &str,
		format: DocumentFormat,
		label: &str,
		inferred_type: Option<String>,
	) -> FixyResult<FixtureDocument> {
		let root = match format {
			DocumentFormat::Json => serde_json::from_str::<Node>(content)?,
			DocumentFormat::Yaml => serde_yaml::from_str::<Node>(content)?,
		};

		let mut document = FixtureDocument::new();
		let mut default_type = None;

		match root {
			Node::Null => {}
			Node::Map(pairs) => {
				self.parse_top_level(pairs, label, &mut document, &mut default_type)?;
			}
			Node::Seq(items) => {
				for (idx, item) in items.into_iter().enumerate() {
					match item {
						Node::Map(pairs) => {
							self.parse_top_level(pairs, label, &mut document, &mut default_type)?
						}
						other => {
							return Err(document_error(
								label,
								format!("item {} must be a mapping, found {}", idx, other.kind()),
							));
						}
					}
				}
			}
			other => {
				return Err(document_error(
					label,
					format!("expected a mapping or sequence, found {}", other.kind()),
				));
			}
		}

		let fallback = default_type.or(inferred_type);
		if let Some(fallback) = fallback {
			for entry in document.entries.iter_mut() {
				if entry.type_name.is_none() {
					entry.type_name = Some(fallback.clone());
				}
			}
		}

		Ok(document)
	}

	fn parse_top_level(
		&self,
		pairs: Vec<(String, Node)>,
		label: &str,
		document: &mut FixtureDocument,
		default_type: &mut Option<String>,
	) -> FixyResult<()> {
		for (key, node) in pairs {
			match key.as_str() {
				IMPORT_KEY => document.imports.extend(self.parse_imports(node, label)?),
				TYPE_KEY => match node {
					Node::String(type_name) => *default_type = Some(type_name),
					other => {
						return Err(document_error(
							label,
							format!("`$type` must be a string, found {}", other.kind()),
						));
					}
				},
				directive if directive.starts_with('$') => {
					return Err(document_error(
						label,
						format!("unknown directive `{}`", directive),
					));
				}
				_ => document.push(self.parse_entry(key, node, label)?),
			}
		}
		Ok(())
	}

	fn parse_imports(&self, node: Node, label: &str) -> FixyResult<Vec<String>> {
		match node {
			Node::String(name) => Ok(vec![name]),
			Node::Seq(items) => items
				.into_iter()
				.map(|item| match item {
					Node::String(name) => Ok(name),
					other => Err(document_error(
						label,
						format!("`$import` entries must be strings, found {}", other.kind()),
					)),
				})
				.collect(),
			other => Err(document_error(
				label,
				format!(
					"`$import` must be a string or a list of strings, found {}",
					other.kind()
				),
			)),
		}
	}

	fn parse_entry(&self, name: String, node: Node, label: &str) -> FixyResult<FixtureEntry> {
		let (tag, body) = match node {
			Node::Tagged(tag, _) if tag == REF_TAG => {
				return Err(document_error(
					label,
					format!("entry `{}` cannot itself be a reference", name),
				));
			}
			Node::Tagged(tag, body) => (Some(tag), *body),
			other => (None, other),
		};

		let mut entry = FixtureEntry::new(name);
		entry.type_name = tag;

		match body {
			Node::Null => {}
			Node::Map(pairs) => {
				for (key, value) in pairs {
					if key == TYPE_KEY {
						match value {
							// A tag wins over an inline `$type`.
							Node::String(type_name) if entry.type_name.is_none() => {
								entry.type_name = Some(type_name);
							}
							Node::String(_) => {}
							other => {
								return Err(document_error(
									label,
									format!(
										"`$type` of entry `{}` must be a string, found {}",
										entry.name,
										other.kind()
									),
								));
							}
						}
						continue;
					}
					let value = self.parse_value(value, label, &entry.name)?;
					if entry.fields.contains_key(&key) {
						return Err(duplicate_field(label, &entry.name, &key));
					}
					entry.fields.insert(key, value);
				}
			}
			other => {
				return Err(document_error(
					label,
					format!(
						"entry `{}` must be a mapping, found {}",
						entry.name,
						other.kind()
					),
				));
			}
		}

		Ok(entry)
	}

	fn parse_value(&self, node: Node, label: &str, entry: &str) -> FixyResult<FieldValue> {
		Ok(match node {
			Node::Null => FieldValue::Scalar(Scalar::Null),
			Node::Bool(b) => FieldValue::Scalar(Scalar::Bool(b)),
			Node::Int(i) => FieldValue::Scalar(Scalar::Int(i)),
			Node::Float(f) => FieldValue::Scalar(Scalar::Float(f)),
			Node::String(s) => FieldValue::Scalar(Scalar::String(s)),
			Node::Seq(items) => FieldValue::Sequence(
				items
					.into_iter()
					.map(|item| self.parse_value(item, label, entry))
					.collect::<FixyResult<_>>()?,
			),
			Node::Tagged(tag, inner) if tag == REF_TAG => match *inner {
				Node::String(target) => FieldValue::Reference(target),
				other => {
					return Err(document_error(
						label,
						format!(
							"`!ref` in entry `{}` must name an entry, found {}",
							entry,
							other.kind()
						),
					));
				}
			},
			Node::Tagged(tag, inner) => {
				tracing::warn!(
					document = label,
					entry = entry,
					tag = %tag,
					"Ignoring tag on nested value; the field type decides the nested type"
				);
				self.parse_value(*inner, label, entry)?
			}
			Node::Map(mut pairs) => {
				if pairs.len() == 1 && pairs[0].0 == REF_KEY {
					return match pairs.pop() {
						Some((_, Node::String(target))) => Ok(FieldValue::Reference(target)),
						other => Err(document_error(
							label,
							format!(
								"`$ref` in entry `{}` must name an entry, found {}",
								entry,
								other.map(|(_, node)| node.kind()).unwrap_or("nothing")
							),
						)),
					};
				}

				let mut fields = IndexMap::with_capacity(pairs.len());
				for (key, value) in pairs {
					if key == TYPE_KEY {
						tracing::warn!(
							document = label,
							entry = entry,
							"Ignoring `$type` on nested value; the field type decides the nested type"
						);
						continue;
					}
					if key == REF_KEY {
						return Err(document_error(
							label,
							format!(
								"`$ref` in entry `{}` must be the only key of its mapping",
								entry
							),
						));
					}
					if fields.contains_key(&key) {
						return Err(duplicate_field(label, entry, &key));
					}
					fields.insert(key, self.parse_value(value, label, entry)?);
				}
				FieldValue::Mapping(fields)
			}
		})
	}
}
