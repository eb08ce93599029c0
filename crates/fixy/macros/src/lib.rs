//! Procedural macros for fixy.
//!
//! This crate provides the `#[derive(Fixture)]` macro, which makes a struct
//! loadable from fixture documents.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod crate_paths;
mod fixture_derive;

/// Derives `Fixture` (and `FromFixture`) for a struct with named fields.
///
/// Every field gets a direct-storage binding, used in field access mode.
/// Every field not marked `readonly` also gets a mutator, used in property
/// access mode. The type is submitted to the registry that
/// `TypeRegistry::discover` reads.
///
/// The struct must implement `Default`.
///
/// # Attributes
///
/// Arguments may be split over several `#[fixture(...)]` attributes on the
/// same item; each argument may appear once in total.
///
/// ## Struct-level attributes
///
/// - `#[fixture(type_name = "app::Owner")]` - Qualified name documents refer
///   to. Defaults to `module_path!()` followed by the struct name.
///
/// ## Field-level attributes
///
/// - `#[fixture(rename = "name")]` - Name used in documents
/// - `#[fixture(skip)]` - Not bindable
/// - `#[fixture(readonly)]` - No mutator; bindable in field access mode only
/// - `#[fixture(setter = "method")]` - Mutator method called with the value.
///   It may return `()` or `Result<(), E: Display>`; an `Err` fails the entry.
/// - `#[fixture(id)]` - Primary key; stores write assigned keys back into it
/// - `#[fixture(natural_key)]` - Part of the key merge commits match on
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use fixy::Fixture;
///
/// #[derive(Debug, Default, Fixture)]
/// #[fixture(type_name = "clinic::Owner")]
/// pub struct Owner {
///     #[fixture(id)]
///     pub id: Option<i64>,
///
///     #[fixture(natural_key)]
///     pub email: String,
///
///     #[fixture(readonly)]
///     pub created: chrono::NaiveDate,
/// }
///
/// #[derive(Debug, Default, Fixture)]
/// #[fixture(type_name = "clinic::Pet")]
/// pub struct Pet {
///     pub name: String,
///     pub owner: Option<Arc<Owner>>,
/// }
/// ```
#[proc_macro_derive(Fixture, attributes(fixture))]
pub fn derive_fixture(input: TokenStream) -> TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	crate_paths::get_fixy_crate()
		.and_then(|fixy| fixture_derive::derive_fixture_impl(input, &fixy))
		.unwrap_or_else(|err| err.to_compile_error())
		.into()
}
