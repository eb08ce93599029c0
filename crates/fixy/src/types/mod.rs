//! Runtime descriptions of fixture types.
//!
//! A [`TypeDescriptor`] is what the loader knows about a Rust type: how to
//! construct it, which fields can be bound and through which access path,
//! and how to read and write its keys. Descriptors are produced by
//! `#[derive(Fixture)]` or assembled by hand with [`TypeDescriptor::builder`].
//!
//! ```
//! use fixy::types::TypeDescriptor;
//!
//! #[derive(Default)]
//! struct Owner {
//! 	id: Option<i64>,
//! 	name: String,
//! 	created: String,
//! }
//!
//! impl Owner {
//! 	fn rename(&mut self, name: String) {
//! 		self.name = name;
//! 	}
//! }
//!
//! let descriptor = TypeDescriptor::builder::<Owner>("app::Owner")
//! 	.primary_key("id", |o| &o.id, |o| &mut o.id)
//! 	.property("name", Owner::rename)
//! 	.field("name", |o| &mut o.name)
//! 	.field("created", |o| &mut o.created)
//! 	.build();
//!
//! assert_eq!(descriptor.simple_name(), "Owner");
//! assert!(descriptor.field("created").is_some_and(|f| !f.has_property()));
//! ```

pub mod resolver;

pub use resolver::{TypeLoader, TypeRegistry, TypeResolver};

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;

use crate::binding::{BindValue, FieldBinder, FromFixture, KeyValue};
use crate::config::AccessMode;
use crate::document::Scalar;
use crate::error::CoercionError;

/// A constructed, type-erased instance.
pub type AnyObject = Box<dyn Any + Send + Sync>;

type BindFn = Box<
	dyn Fn(&mut (dyn Any + Send + Sync), &BindValue, &FieldBinder) -> Result<(), CoercionError>
		+ Send
		+ Sync,
>;
type KeyGetFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Scalar> + Send + Sync>;
type KeySetFn =
	Box<dyn Fn(&mut (dyn Any + Send + Sync), &Scalar) -> Result<(), CoercionError> + Send + Sync>;

/// A type the loader can construct from fixture entries.
///
/// Usually implemented through `#[derive(Fixture)]`.
pub trait Fixture: Default + Any + Send + Sync {
	/// Returns the descriptor of this type.
	fn descriptor() -> TypeDescriptor;
}

/// Return types accepted from a property mutator.
///
/// A mutator returning `()` always succeeds. One returning
/// `Result<(), E>` can refuse a value; the error's message fails the
/// binding of that field.
pub trait SetterOutput {
	/// Converts the mutator's return value.
	fn into_setter_result(self) -> Result<(), CoercionError>;
}

impl SetterOutput for () {
	fn into_setter_result(self) -> Result<(), CoercionError> {
		Ok(())
	}
}

impl<E: fmt::Display> SetterOutput for Result<(), E> {
	fn into_setter_result(self) -> Result<(), CoercionError> {
		self.map_err(|error| CoercionError::Rejected {
			reason: error.to_string(),
		})
	}
}

/// Compile-time registration of a fixture type.
///
/// `#[derive(Fixture)]` submits one of these per type; they are collected
/// by [`TypeRegistry::discover`].
pub struct FixtureRegistration {
	/// Produces the descriptor of the registered type.
	pub descriptor: fn() -> TypeDescriptor,
}

impl FixtureRegistration {
	/// Creates a registration from a descriptor constructor.
	pub const fn new(descriptor: fn() -> TypeDescriptor) -> Self {
		Self { descriptor }
	}
}

inventory::collect!(FixtureRegistration);

/// One bindable field of a [`TypeDescriptor`].
pub struct FieldDescriptor {
	name: String,
	expected: &'static str,
	property: Option<BindFn>,
	direct: Option<BindFn>,
}

impl FieldDescriptor {
	fn new(name: &str, expected: &'static str) -> Self {
		Self {
			name: name.to_string(),
			expected,
			property: None,
			direct: None,
		}
	}

	/// Field name as written in documents.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Rust type of the field.
	pub fn expected(&self) -> &'static str {
		self.expected
	}

	/// Returns true if the field has a mutator.
	pub fn has_property(&self) -> bool {
		self.property.is_some()
	}

	/// Returns true if the field's storage can be assigned directly.
	pub fn has_direct(&self) -> bool {
		self.direct.is_some()
	}

	/// Returns true if the field can be bound in the given mode.
	pub fn is_accessible(&self, mode: AccessMode) -> bool {
		self.binding(mode).is_some()
	}

	pub(crate) fn binding(&self, mode: AccessMode) -> Option<&BindFn> {
		match mode {
			AccessMode::Property => self.property.as_ref(),
			AccessMode::Field => self.direct.as_ref(),
		}
	}
}

impl fmt::Debug for FieldDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldDescriptor")
			.field("name", &self.name)
			.field("expected", &self.expected)
			.field("property", &self.property.is_some())
			.field("direct", &self.direct.is_some())
			.finish()
	}
}

struct KeyAccessor {
	field: String,
	get: KeyGetFn,
	set: Option<KeySetFn>,
}

/// Resolved fixture type: constructor, bindable fields and key accessors.
pub struct TypeDescriptor {
	name: String,
	type_id: TypeId,
	rust_type: &'static str,
	construct: fn() -> AnyObject,
	fields: IndexMap<String, FieldDescriptor>,
	primary_key: Option<KeyAccessor>,
	natural_key: Vec<KeyAccessor>,
}

fn construct_default<T: Default + Any + Send + Sync>() -> AnyObject {
	Box::new(T::default())
}

fn downcast_target<T: Any>(
	object: &mut (dyn Any + Send + Sync),
) -> Result<&mut T, CoercionError> {
	object
		.downcast_mut::<T>()
		.ok_or_else(|| CoercionError::Mismatch {
			expected: std::any::type_name::<T>(),
			found: "an instance of another type".to_string(),
		})
}

fn bind_fn<F>(f: F) -> BindFn
where
	F: Fn(&mut (dyn Any + Send + Sync), &BindValue, &FieldBinder) -> Result<(), CoercionError>
		+ Send
		+ Sync
		+ 'static,
{
	Box::new(f)
}

impl TypeDescriptor {
	/// Starts a descriptor for `T` registered under `name`.
	pub fn builder<T: Default + Any + Send + Sync>(
		name: impl Into<String>,
	) -> TypeDescriptorBuilder<T> {
		TypeDescriptorBuilder {
			descriptor: Self {
				name: name.into().trim_start_matches("::").to_string(),
				type_id: TypeId::of::<T>(),
				rust_type: std::any::type_name::<T>(),
				construct: construct_default::<T>,
				fields: IndexMap::new(),
				primary_key: None,
				natural_key: Vec::new(),
			},
			_marker: PhantomData,
		}
	}

	/// Qualified type name, e.g. `app::models::Owner`.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Last path segment of the qualified name.
	pub fn simple_name(&self) -> &str {
		self.name.rsplit("::").next().unwrap_or(&self.name)
	}

	/// Name of the Rust type backing this descriptor.
	pub fn rust_type(&self) -> &'static str {
		self.rust_type
	}

	/// Returns true if `object` is an instance of the described type.
	pub fn is_instance(&self, object: &(dyn Any + Send + Sync)) -> bool {
		Any::type_id(object) == self.type_id
	}

	/// Creates a default instance.
	pub fn construct(&self) -> AnyObject {
		(self.construct)()
	}

	/// Looks up a field by document name.
	pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
		self.fields.get(name)
	}

	/// Returns the bindable fields in declaration order.
	pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
		self.fields.values()
	}

	/// Name of the primary-key field, if the type has one.
	pub fn primary_key_field(&self) -> Option<&str> {
		self.primary_key.as_ref().map(|k| k.field.as_str())
	}

	/// Reads the primary key of `object`. `None` when the type has no key,
	/// the key is unset, or `object` is of another type.
	pub fn key_of(&self, object: &(dyn Any + Send + Sync)) -> Option<Scalar> {
		self.primary_key.as_ref().and_then(|k| (k.get)(object))
	}

	/// Writes a store-assigned primary key into `object`.
	pub fn set_key(
		&self,
		object: &mut (dyn Any + Send + Sync),
		key: &Scalar,
	) -> Result<bool, CoercionError> {
		match self.primary_key.as_ref().and_then(|k| k.set.as_ref()) {
			Some(set) => set(object, key).map(|()| true),
			None => Ok(false),
		}
	}

	/// Names of the natural-key fields.
	pub fn natural_key_fields(&self) -> Vec<&str> {
		self.natural_key.iter().map(|k| k.field.as_str()).collect()
	}

	/// Reads the natural key of `object`. `None` when the type declares no
	/// natural key or any component is unset.
	pub fn natural_key_of(&self, object: &(dyn Any + Send + Sync)) -> Option<Vec<Scalar>> {
		if self.natural_key.is_empty() {
			return None;
		}
		self.natural_key.iter().map(|k| (k.get)(object)).collect()
	}
}

impl fmt::Debug for TypeDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeDescriptor")
			.field("name", &self.name)
			.field("rust_type", &self.rust_type)
			.field("fields", &self.fields.values().collect::<Vec<_>>())
			.field("primary_key", &self.primary_key_field())
			.field("natural_key", &self.natural_key_fields())
			.finish()
	}
}

/// Builder for [`TypeDescriptor`].
pub struct TypeDescriptorBuilder<T> {
	descriptor: TypeDescriptor,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Default + Any + Send + Sync> TypeDescriptorBuilder<T> {
	fn field_entry<V>(&mut self, name: &str) -> &mut FieldDescriptor {
		self.descriptor
			.fields
			.entry(name.to_string())
			.or_insert_with(|| FieldDescriptor::new(name, std::any::type_name::<V>()))
	}

	/// Binds `name` through a mutator. Used in property access mode.
	///
	/// The mutator may return `()` or a `Result<(), E>`; see [`SetterOutput`].
	pub fn property<V, F, R>(mut self, name: &str, setter: F) -> Self
	where
		V: FromFixture + 'static,
		F: Fn(&mut T, V) -> R + Send + Sync + 'static,
		R: SetterOutput,
	{
		self.field_entry::<V>(name).property = Some(bind_fn(move |object, value, binder| {
			let target = downcast_target::<T>(object)?;
			setter(target, V::from_fixture(value, binder)?).into_setter_result()
		}));
		self
	}

	/// Binds `name` by assigning the field's storage. Used in field access mode.
	pub fn field<V>(mut self, name: &str, accessor: fn(&mut T) -> &mut V) -> Self
	where
		V: FromFixture + 'static,
	{
		self.field_entry::<V>(name).direct = Some(bind_fn(move |object, value, binder| {
			let target = downcast_target::<T>(object)?;
			*accessor(target) = V::from_fixture(value, binder)?;
			Ok(())
		}));
		self
	}

	/// Declares the primary key. The store writes assigned keys back
	/// through `set`.
	pub fn primary_key<V>(
		mut self,
		name: &str,
		get: fn(&T) -> &V,
		set: fn(&mut T) -> &mut V,
	) -> Self
	where
		V: KeyValue + 'static,
	{
		self.descriptor.primary_key = Some(KeyAccessor {
			field: name.to_string(),
			get: Box::new(move |object| {
				object
					.downcast_ref::<T>()
					.and_then(|target| get(target).to_key())
			}),
			set: Some(Box::new(move |object, key| {
				let target = downcast_target::<T>(object)?;
				*set(target) = V::from_key(key)?;
				Ok(())
			})),
		});
		self
	}

	/// Adds a natural-key component. Merge commits match existing records
	/// on the full natural key when the primary key is unset.
	pub fn natural_key<V>(mut self, name: &str, get: fn(&T) -> &V) -> Self
	where
		V: KeyValue + 'static,
	{
		self.descriptor.natural_key.push(KeyAccessor {
			field: name.to_string(),
			get: Box::new(move |object| {
				object
					.downcast_ref::<T>()
					.and_then(|target| get(target).to_key())
			}),
			set: None,
		});
		self
	}

	/// Finishes the descriptor.
	pub fn build(self) -> TypeDescriptor {
		self.descriptor
	}
}
