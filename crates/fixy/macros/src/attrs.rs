//! Attribute parsing for `#[fixture(...)]`.

//!
//! An item may carry several `#[fixture(...)]` attributes; their arguments
//! are merged as if written in one, so a repeated argument is an error
//! wherever it appears.

use proc_macro2::Span;
use syn::{
	Attribute, Error, Ident, Lit, LitStr, Result, Token,
	parse::{Parse, ParseStream},
	punctuated::Punctuated,
};

type FixtureArgs = Punctuated<FixtureAttr, Token![,]>;

/// Collects the arguments of every `#[fixture(...)]` in `attrs`, in order.
fn fixture_args(attrs: &[Attribute]) -> Result<(Vec<FixtureAttr>, Span)> {
	let mut args = Vec::new();
	let mut span = Span::call_site();
	for (idx, attr) in attrs.iter().filter(|a| a.path().is_ident("fixture")).enumerate() {
		if idx == 0 {
			span = attr.bracket_token.span.join();
		}
		args.extend(attr.parse_args_with(FixtureArgs::parse_terminated)?);
	}
	Ok((args, span))
}

/// Parsed struct-level attributes.
#[derive(Debug, Clone, Default)]
pub(crate) struct TypeAttrs {
	/// Qualified name the type is registered under
	pub(crate) type_name: Option<LitStr>,
}

impl TypeAttrs {
	/// Parses the `#[fixture(...)]` attributes of a struct.
	pub(crate) fn from_attributes(attrs: &[Attribute]) -> Result<Self> {
		let (args, _) = fixture_args(attrs)?;
		Self::from_args(args)
	}

	fn from_args(attrs: impl IntoIterator<Item = FixtureAttr>) -> Result<Self> {
		let mut result = Self::default();

		for attr in attrs {
			match attr {
				FixtureAttr::NameValue { name, value } if name == "type_name" => {
					if result.type_name.is_some() {
						return Err(Error::new(name.span(), "duplicate `type_name` attribute"));
					}
					let name_str = lit_str(&name, value)?;
					if name_str.value().trim_matches(':').is_empty() {
						return Err(Error::new(name_str.span(), "`type_name` must not be empty"));
					}
					result.type_name = Some(name_str);
				}
				FixtureAttr::Flag(name) | FixtureAttr::NameValue { name, .. } => {
					return Err(Error::new(
						name.span(),
						format!("unknown struct attribute `{}`", name),
					));
				}
			}
		}

		Ok(result)
	}
}

impl Parse for TypeAttrs {
	fn parse(input: ParseStream) -> Result<Self> {
		Self::from_args(FixtureArgs::parse_terminated(input)?)
	}
}

/// Parsed field-level attributes.
#[derive(Debug, Clone, Default)]
pub(crate) struct FieldAttrs {
	/// Name used in documents instead of the Rust field name
	pub(crate) rename: Option<String>,
	/// Field is not bindable at all
	pub(crate) skip: bool,
	/// Field has no mutator; only field access mode can bind it
	pub(crate) readonly: bool,
	/// Method used as the mutator in property access mode
	pub(crate) setter: Option<Ident>,
	/// Field is the primary key
	pub(crate) id: bool,
	/// Field is part of the natural key
	pub(crate) natural_key: bool,
}

impl FieldAttrs {
	/// Parses the `#[fixture(...)]` attributes of a field.
	pub(crate) fn from_attributes(attrs: &[Attribute]) -> Result<Self> {
		let (args, span) = fixture_args(attrs)?;
		Self::from_args(args, span)
	}

	fn from_args(attrs: impl IntoIterator<Item = FixtureAttr>, span: Span) -> Result<Self> {
		let mut result = Self::default();

		for attr in attrs {
			match attr {
				FixtureAttr::Flag(name) => {
					let flag = match name.to_string().as_str() {
						"skip" => &mut result.skip,
						"readonly" => &mut result.readonly,
						"id" => &mut result.id,
						"natural_key" => &mut result.natural_key,
						_ => {
							return Err(Error::new(
								name.span(),
								format!("unknown flag attribute `{}`", name),
							));
						}
					};
					if *flag {
						return Err(Error::new(
							name.span(),
							format!("duplicate `{}` attribute", name),
						));
					}
					*flag = true;
				}
				FixtureAttr::NameValue { name, value } => match name.to_string().as_str() {
					"rename" => {
						if result.rename.is_some() {
							return Err(Error::new(name.span(), "duplicate `rename` attribute"));
						}
						result.rename = Some(lit_str(&name, value)?.value());
					}
					"setter" => {
						if result.setter.is_some() {
							return Err(Error::new(name.span(), "duplicate `setter` attribute"));
						}
						let method = lit_str(&name, value)?;
						result.setter = Some(method.parse()?);
					}
					_ => {
						return Err(Error::new(
							name.span(),
							format!("unknown attribute `{}`", name),
						));
					}
				},
			}
		}

		if result.skip && (result.id || result.natural_key || result.setter.is_some()) {
			return Err(Error::new(
				span,
				"`skip` cannot be combined with `id`, `natural_key` or `setter`",
			));
		}
		if result.readonly && result.setter.is_some() {
			return Err(Error::new(
				span,
				"`readonly` fields have no mutator; remove `setter`",
			));
		}

		Ok(result)
	}
}

impl Parse for FieldAttrs {
	fn parse(input: ParseStream) -> Result<Self> {
		let span = input.span();
		Self::from_args(FixtureArgs::parse_terminated(input)?, span)
	}
}

/// Single attribute: either a flag or a name-value pair.
enum FixtureAttr {
	/// Flag attribute (e.g., `skip`, `id`)
	Flag(Ident),
	/// Name-value attribute (e.g., `rename = "fullName"`)
	NameValue { name: Ident, value: Lit },
}

impl Parse for FixtureAttr {
	fn parse(input: ParseStream) -> Result<Self> {
		let name: Ident = input.parse()?;

		if input.peek(Token![=]) {
			let _eq: Token![=] = input.parse()?;
			let value: Lit = input.parse()?;
			Ok(FixtureAttr::NameValue { name, value })
		} else {
			Ok(FixtureAttr::Flag(name))
		}
	}
}

fn lit_str(name: &Ident, lit: Lit) -> Result<LitStr> {
	match lit {
		Lit::Str(s) => Ok(s),
		other => Err(Error::new(
			other.span(),
			format!("`{}` expects a string literal", name),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use syn::{Data, DeriveInput, parse_quote};

	fn first_field_attrs(input: DeriveInput) -> Vec<Attribute> {
		match input.data {
			Data::Struct(data) => data.fields.into_iter().next().unwrap().attrs,
			_ => panic!("expected a struct"),
		}
	}

	#[test]
	fn test_parse_flags() {
		let attrs: FieldAttrs = parse_quote!(id, natural_key);
		assert!(attrs.id);
		assert!(attrs.natural_key);
		assert!(!attrs.skip);
	}

	#[test]
	fn test_parse_name_values() {
		let attrs: FieldAttrs = parse_quote!(rename = "fullName", setter = "set_full_name");
		assert_eq!(attrs.rename.as_deref(), Some("fullName"));
		assert_eq!(attrs.setter.unwrap().to_string(), "set_full_name");
	}

	#[test]
	fn test_duplicate_flag_rejected() {
		let result = syn::parse_str::<FieldAttrs>("readonly, readonly");
		assert!(result.is_err());
	}

	#[test]
	fn test_unknown_attribute_rejected() {
		assert!(syn::parse_str::<FieldAttrs>("primary").is_err());
		assert!(syn::parse_str::<FieldAttrs>("column = \"x\"").is_err());
	}

	#[test]
	fn test_readonly_with_setter_rejected() {
		assert!(syn::parse_str::<FieldAttrs>("readonly, setter = \"set_x\"").is_err());
	}

	#[test]
	fn test_split_attributes_are_merged() {
		let input: DeriveInput = parse_quote! {
			struct Ticket {
				#[fixture(id)]
				#[fixture(natural_key, rename = "ref")]
				#[serde(skip)]
				code: i64,
			}
		};

		let attrs = FieldAttrs::from_attributes(&first_field_attrs(input)).unwrap();

		assert!(attrs.id);
		assert!(attrs.natural_key);
		assert_eq!(attrs.rename.as_deref(), Some("ref"));
	}

	#[test]
	fn test_repeat_across_attributes_rejected() {
		let input: DeriveInput = parse_quote! {
			struct Ticket {
				#[fixture(rename = "a")]
				#[fixture(rename = "b")]
				code: i64,
			}
		};

		let error = FieldAttrs::from_attributes(&first_field_attrs(input)).unwrap_err();

		assert!(error.to_string().contains("duplicate `rename`"));
	}

	#[test]
	fn test_conflict_across_attributes_rejected() {
		let input: DeriveInput = parse_quote! {
			struct Ticket {
				#[fixture(skip)]
				#[fixture(id)]
				code: i64,
			}
		};

		assert!(FieldAttrs::from_attributes(&first_field_attrs(input)).is_err());
	}

	#[test]
	fn test_type_name_across_attributes() {
		let input: DeriveInput = parse_quote! {
			#[fixture(type_name = "app::Owner")]
			#[fixture(type_name = "app::Other")]
			struct Owner;
		};

		assert!(TypeAttrs::from_attributes(&input.attrs).is_err());
	}

	#[test]
	fn test_type_name() {
		let attrs: TypeAttrs = parse_quote!(type_name = "app::Owner");
		assert_eq!(attrs.type_name.unwrap().value(), "app::Owner");
		assert!(syn::parse_str::<TypeAttrs>("type_name = 3").is_err());
		assert!(syn::parse_str::<TypeAttrs>("skip").is_err());
	}
}
