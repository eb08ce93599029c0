//! Error types for fixture loading.
//!
//! Every failure is load-fatal. [`FixyError`] carries the offending entry
//! name(s) and reports the [`LoadStage`] it was raised in, so a caller can tell
//! a doomed load (nothing persisted) from one that stopped mid-way.

use std::fmt;

use thiserror::Error;

use crate::config::AccessMode;

/// Stage of a load in which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
	/// Locating, reading and parsing documents.
	Discovery,
	/// Name uniqueness, reference and cycle checks. Nothing has been persisted.
	Validation,
	/// Mapping declared type names to registered types. Nothing has been persisted.
	TypeResolution,
	/// Constructing and populating an instance.
	Binding,
	/// Committing an instance to the backing store.
	Persistence,
}

impl LoadStage {
	/// Returns true if no side effect can have happened before this stage.
	pub fn is_side_effect_free(&self) -> bool {
		matches!(
			self,
			Self::Discovery | Self::Validation | Self::TypeResolution
		)
	}
}

impl fmt::Display for LoadStage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Discovery => write!(f, "discovery"),
			Self::Validation => write!(f, "validation"),
			Self::TypeResolution => write!(f, "type resolution"),
			Self::Binding => write!(f, "binding"),
			Self::Persistence => write!(f, "persistence"),
		}
	}
}

/// Errors that can occur while loading fixtures.
#[derive(Debug, Error)]
pub enum FixyError {
	/// Two entries share a name, possibly across documents.
	#[error("Duplicate entry name `{name}` (first defined in {first}, again in {second})")]
	DuplicateEntryName {
		/// The duplicated entry name.
		name: String,
		/// Document of the first definition.
		first: String,
		/// Document of the second definition.
		second: String,
	},

	/// No registered type matches the entry's declared type.
	#[error("Cannot resolve type for entry `{entry}`: {reason}")]
	TypeResolution {
		/// Entry whose type could not be resolved.
		entry: String,
		/// Declared or inferred type name, if any.
		type_name: Option<String>,
		/// Why resolution failed.
		reason: String,
	},

	/// A field could not be bound on a constructed instance.
	#[error("Cannot bind entry `{entry}` as {type_name}: {source}")]
	FieldBinding {
		/// Entry being bound.
		entry: String,
		/// Qualified type of the entry.
		type_name: String,
		/// Underlying binding failure.
		#[source]
		source: BindingError,
	},

	/// A reference names an entry that does not exist in the load.
	#[error("Entry `{entry}` references unknown entry `{target}` in field `{field}`")]
	UnknownReference {
		/// Entry holding the reference.
		entry: String,
		/// Field path holding the reference.
		field: String,
		/// Referenced entry name.
		target: String,
	},

	/// Entries reference each other in a cycle.
	#[error("Cyclic reference between entries: {}", .entries.join(" -> "))]
	CyclicReference {
		/// Participating entries, in cycle order, the first repeated at the end.
		entries: Vec<String>,
	},

	/// The persister rejected an instance.
	#[error("Cannot persist entry `{entry}`: {source}")]
	Persist {
		/// Entry being persisted.
		entry: String,
		/// Underlying persistence failure.
		#[source]
		source: PersistError,
	},

	/// A document could not be parsed into fixture entries.
	#[error("Invalid document {path}: {message}")]
	Document {
		/// Document path or label.
		path: String,
		/// What is wrong with it.
		message: String,
	},

	/// A named document does not exist under the document root.
	#[error("Fixture document not found: {0}")]
	DocumentNotFound(String),

	/// The document extension is not a supported format.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// Invalid configuration.
	#[error("Configuration error: {0}")]
	Config(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// YAML deserialization error.
	#[error("YAML error: {0}")]
	Yaml(#[from] serde_yaml::Error),
}

impl FixyError {
	/// Returns the stage of the load in which this error was raised.
	pub fn stage(&self) -> LoadStage {
		match self {
			Self::DuplicateEntryName { .. }
			| Self::UnknownReference { .. }
			| Self::CyclicReference { .. } => LoadStage::Validation,
			Self::TypeResolution { .. } => LoadStage::TypeResolution,
			Self::FieldBinding { .. } => LoadStage::Binding,
			Self::Persist { .. } => LoadStage::Persistence,
			Self::Document { .. }
			| Self::DocumentNotFound(_)
			| Self::UnsupportedExtension(_)
			| Self::Config(_)
			| Self::Io(_)
			| Self::Json(_)
			| Self::Yaml(_) => LoadStage::Discovery,
		}
	}

	/// Returns the entry names this error is about.
	pub fn entries(&self) -> Vec<&str> {
		match self {
			Self::DuplicateEntryName { name, .. } => vec![name.as_str()],
			Self::TypeResolution { entry, .. }
			| Self::FieldBinding { entry, .. }
			| Self::Persist { entry, .. } => vec![entry.as_str()],
			Self::UnknownReference { entry, target, .. } => vec![entry.as_str(), target.as_str()],
			Self::CyclicReference { entries } => {
				let mut names: Vec<&str> = entries.iter().map(String::as_str).collect();
				// The cycle repeats its first entry at the end.
				if names.len() > 1 && names.first() == names.last() {
					names.pop();
				}
				names
			}
			_ => Vec::new(),
		}
	}
}

/// Result type alias for fixture operations.
pub type FixyResult<T> = Result<T, FixyError>;

/// Errors raised while populating an instance from entry fields.
#[derive(Debug, Error)]
pub enum BindingError {
	/// The data names a field the type does not have.
	#[error("field `{field}` does not exist on {type_name}")]
	UnknownField {
		/// Qualified type name.
		type_name: String,
		/// Field name from the document.
		field: String,
	},

	/// The field exists but cannot be reached in the configured access mode.
	#[error("field `{field}` on {type_name} is not reachable in {mode} access mode")]
	Inaccessible {
		/// Qualified type name.
		type_name: String,
		/// Field name.
		field: String,
		/// Configured access mode.
		mode: AccessMode,
	},

	/// The value could not be converted to the field's type.
	#[error("field `{field}`: {source}")]
	Coercion {
		/// Field name.
		field: String,
		/// Conversion failure.
		#[source]
		source: CoercionError,
	},

	/// The constructed object is not of the descriptor's type.
	#[error("instance is not a {type_name}")]
	TypeMismatch {
		/// Qualified type name expected by the descriptor.
		type_name: String,
	},
}

impl BindingError {
	/// Returns the field this error is about, if any.
	pub fn field(&self) -> Option<&str> {
		match self {
			Self::UnknownField { field, .. }
			| Self::Inaccessible { field, .. }
			| Self::Coercion { field, .. } => Some(field.as_str()),
			Self::TypeMismatch { .. } => None,
		}
	}
}

/// Errors raised while converting a document value to a Rust value.
#[derive(Debug, Error)]
pub enum CoercionError {
	/// The value has the wrong shape (e.g. a sequence for a string field).
	#[error("expected {expected}, found {found}")]
	Mismatch {
		/// Expected type label.
		expected: &'static str,
		/// Description of the value found.
		found: String,
	},

	/// Text could not be parsed into the target type.
	#[error("cannot parse {value:?} as {expected}: {reason}")]
	Parse {
		/// Expected type label.
		expected: &'static str,
		/// Offending text.
		value: String,
		/// Parser message.
		reason: String,
	},

	/// A number does not fit the target type.
	#[error("value {value} is out of range for {expected}")]
	OutOfRange {
		/// Expected type label.
		expected: &'static str,
		/// Offending value.
		value: String,
	},

	/// A referenced instance is of another type than the field expects.
	#[error("reference to `{entry}` ({actual}) cannot be assigned to {expected}")]
	ReferenceType {
		/// Referenced entry name.
		entry: String,
		/// Qualified type of the referenced instance.
		actual: String,
		/// Expected type label.
		expected: &'static str,
	},

	/// The field's mutator refused the value.
	#[error("value rejected: {reason}")]
	Rejected {
		/// Message returned by the mutator.
		reason: String,
	},

	/// Binding a nested value object failed.
	#[error("in nested {type_name}: {source}")]
	Nested {
		/// Qualified type of the nested value.
		type_name: String,
		/// Nested binding failure.
		#[source]
		source: Box<BindingError>,
	},
}

/// Errors raised by a [`Persister`](crate::persist::Persister) or backing store.
#[derive(Debug, Error)]
pub enum PersistError {
	/// An insert collided with an existing primary key.
	#[error("{type_name} with key {key} already exists")]
	DuplicateKey {
		/// Qualified type name.
		type_name: String,
		/// Colliding key.
		key: String,
	},

	/// The store could not write an assigned key back into the instance.
	#[error("cannot assign key {key} to {type_name}: {source}")]
	KeyAssignment {
		/// Qualified type name.
		type_name: String,
		/// Key the store tried to assign.
		key: String,
		/// Conversion failure.
		#[source]
		source: CoercionError,
	},

	/// Backend-specific failure.
	#[error("store error: {0}")]
	Store(String),

	/// Failure from an external backend.
	#[error(transparent)]
	Backend(#[from] Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_duplicate_entry_name_error() {
		let error = FixyError::DuplicateEntryName {
			name: "ann".to_string(),
			first: "owners.yaml".to_string(),
			second: "pets.yaml".to_string(),
		};
		assert_eq!(
			error.to_string(),
			"Duplicate entry name `ann` (first defined in owners.yaml, again in pets.yaml)"
		);
		assert_eq!(error.stage(), LoadStage::Validation);
		assert_eq!(error.entries(), vec!["ann"]);
	}

	#[rstest]
	fn test_cyclic_reference_error_lists_participants() {
		let error = FixyError::CyclicReference {
			entries: vec!["a".to_string(), "b".to_string(), "a".to_string()],
		};
		assert_eq!(error.to_string(), "Cyclic reference between entries: a -> b -> a");
		assert_eq!(error.entries(), vec!["a", "b"]);
	}

	#[rstest]
	fn test_field_binding_error_chain() {
		let error = FixyError::FieldBinding {
			entry: "ann".to_string(),
			type_name: "app::Owner".to_string(),
			source: BindingError::Coercion {
				field: "age".to_string(),
				source: CoercionError::Parse {
					expected: "i32",
					value: "thirty".to_string(),
					reason: "invalid digit found in string".to_string(),
				},
			},
		};
		assert_eq!(error.stage(), LoadStage::Binding);
		assert!(!error.stage().is_side_effect_free());
		assert!(error.to_string().contains("field `age`"));
	}

	#[rstest]
	#[case(LoadStage::Discovery, true)]
	#[case(LoadStage::Validation, true)]
	#[case(LoadStage::TypeResolution, true)]
	#[case(LoadStage::Binding, false)]
	#[case(LoadStage::Persistence, false)]
	fn test_stage_side_effects(#[case] stage: LoadStage, #[case] expected: bool) {
		assert_eq!(stage.is_side_effect_free(), expected);
	}

	#[rstest]
	fn test_io_error_from() {
		let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
		let error: FixyError = io_error.into();
		assert!(matches!(error, FixyError::Io(_)));
		assert_eq!(error.stage(), LoadStage::Discovery);
	}
}
