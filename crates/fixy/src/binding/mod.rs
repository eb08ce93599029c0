//! Populating constructed instances from entry fields.
//!
//! Document values are first turned into [`BindValue`]s, with every
//! reference replaced by the persisted instance it names. A [`FieldBinder`]
//! then constructs the instance and assigns each field through the path
//! selected by the [`AccessMode`]: the field's mutator in property mode, its
//! storage in field mode.

pub mod convert;

pub use convert::{FromFixture, KeyValue};

use std::any::Any;

use indexmap::IndexMap;

use crate::config::AccessMode;
use crate::document::{FieldValue, Scalar};
use crate::error::{BindingError, CoercionError};
use crate::persist::PersistedInstance;
use crate::types::{AnyObject, Fixture, TypeDescriptor};

/// A field value ready to be bound: references are already resolved.
#[derive(Debug, Clone)]
pub enum BindValue {
	/// A primitive value.
	Scalar(Scalar),
	/// An ordered list.
	Sequence(Vec<BindValue>),
	/// A nested field set.
	Mapping(IndexMap<String, BindValue>),
	/// The persisted instance of a referenced entry.
	Instance(PersistedInstance),
}

impl BindValue {
	/// Substitutes every reference in `value` through `lookup`.
	///
	/// Returns the first target `lookup` cannot supply as the error.
	pub fn resolve<'v, F>(value: &'v FieldValue, lookup: &F) -> Result<Self, &'v str>
	where
		F: Fn(&str) -> Option<PersistedInstance>,
	{
		Ok(match value {
			FieldValue::Scalar(scalar) => Self::Scalar(scalar.clone()),
			FieldValue::Sequence(items) => Self::Sequence(
				items
					.iter()
					.map(|item| Self::resolve(item, lookup))
					.collect::<Result<_, _>>()?,
			),
			FieldValue::Mapping(fields) => Self::Mapping(
				fields
					.iter()
					.map(|(name, value)| Ok::<_, &'v str>((name.clone(), Self::resolve(value, lookup)?)))
					.collect::<Result<_, _>>()?,
			),
			FieldValue::Reference(target) => {
				Self::Instance(lookup(target).ok_or(target.as_str())?)
			}
		})
	}

	/// Describes the value for error messages.
	pub fn describe(&self) -> String {
		match self {
			Self::Scalar(Scalar::Null) => "null".to_string(),
			Self::Scalar(scalar) => format!("{} `{}`", scalar.kind(), scalar),
			Self::Sequence(_) => "sequence".to_string(),
			Self::Mapping(_) => "mapping".to_string(),
			Self::Instance(instance) => format!("reference to `{}`", instance.entry()),
		}
	}
}

impl From<Scalar> for BindValue {
	fn from(value: Scalar) -> Self {
		Self::Scalar(value)
	}
}

impl From<&str> for BindValue {
	fn from(value: &str) -> Self {
		Self::Scalar(Scalar::from(value))
	}
}

impl From<i64> for BindValue {
	fn from(value: i64) -> Self {
		Self::Scalar(Scalar::Int(value))
	}
}

impl From<PersistedInstance> for BindValue {
	fn from(value: PersistedInstance) -> Self {
		Self::Instance(value)
	}
}

/// Constructs instances and assigns their fields.
///
/// The access mode is fixed for the binder's lifetime.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldBinder {
	mode: AccessMode,
}

impl FieldBinder {
	/// Creates a binder for the given access mode.
	pub fn new(mode: AccessMode) -> Self {
		Self { mode }
	}

	/// Returns the access mode.
	pub fn mode(&self) -> AccessMode {
		self.mode
	}

	/// Constructs a default instance of `descriptor` and binds `fields` into it.
	pub fn construct(
		&self,
		descriptor: &TypeDescriptor,
		fields: &IndexMap<String, BindValue>,
	) -> Result<AnyObject, BindingError> {
		let mut object = descriptor.construct();
		self.populate(descriptor, object.as_mut(), fields)?;
		Ok(object)
	}

	/// Binds `fields` into an existing instance, in field order.
	///
	/// # Errors
	///
	/// - [`BindingError::UnknownField`] if the type has no such field
	/// - [`BindingError::Inaccessible`] if the access mode cannot reach it
	/// - [`BindingError::Coercion`] if the value does not convert
	pub fn populate(
		&self,
		descriptor: &TypeDescriptor,
		object: &mut (dyn Any + Send + Sync),
		fields: &IndexMap<String, BindValue>,
	) -> Result<(), BindingError> {
		if !descriptor.is_instance(object) {
			return Err(BindingError::TypeMismatch {
				type_name: descriptor.name().to_string(),
			});
		}

		for (name, value) in fields {
			let field = descriptor
				.field(name)
				.ok_or_else(|| BindingError::UnknownField {
					type_name: descriptor.name().to_string(),
					field: name.clone(),
				})?;
			let bind = field
				.binding(self.mode)
				.ok_or_else(|| BindingError::Inaccessible {
					type_name: descriptor.name().to_string(),
					field: name.clone(),
					mode: self.mode,
				})?;
			bind(&mut *object, value, self).map_err(|source| BindingError::Coercion {
				field: name.clone(),
				source,
			})?;
		}
		Ok(())
	}

	/// Builds a nested value object of type `T` from a mapping.
	///
	/// This is what `#[derive(Fixture)]` uses to implement [`FromFixture`].
	pub fn bind_nested<T: Fixture>(&self, value: &BindValue) -> Result<T, CoercionError> {
		match value {
			BindValue::Mapping(fields) => {
				let descriptor = T::descriptor();
				let mut object = T::default();
				self.populate(&descriptor, &mut object, fields)
					.map_err(|source| CoercionError::Nested {
						type_name: descriptor.name().to_string(),
						source: Box::new(source),
					})?;
				Ok(object)
			}
			BindValue::Instance(instance) => Err(CoercionError::ReferenceType {
				entry: instance.entry().to_string(),
				actual: instance.type_name().to_string(),
				expected: std::any::type_name::<T>(),
			}),
			other => Err(CoercionError::Mismatch {
				expected: std::any::type_name::<T>(),
				found: other.describe(),
			}),
		}
	}
}
