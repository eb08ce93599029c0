//! Implementation of `#[derive(Fixture)]`.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr};

use crate::attrs::{FieldAttrs, TypeAttrs};

/// Generates the `Fixture` and `FromFixture` impls and the registry
/// submission for a struct with named fields.
///
/// `fixy` is the path of the runtime crate as seen from the deriving crate.
pub(crate) fn derive_fixture_impl(input: DeriveInput, fixy: &TokenStream) -> syn::Result<TokenStream> {
	let ident = &input.ident;

	if !input.generics.params.is_empty() {
		return Err(syn::Error::new_spanned(
			&input.generics,
			"#[derive(Fixture)] does not support generic types",
		));
	}

	let fields = match &input.data {
		Data::Struct(data) => match &data.fields {
			Fields::Named(fields) => &fields.named,
			_ => {
				return Err(syn::Error::new_spanned(
					&input,
					"#[derive(Fixture)] only supports structs with named fields",
				));
			}
		},
		_ => {
			return Err(syn::Error::new_spanned(
				&input,
				"#[derive(Fixture)] only supports structs",
			));
		}
	};

	let type_attrs = TypeAttrs::from_attributes(&input.attrs)?;
	let type_name = match &type_attrs.type_name {
		Some(name) => quote!(#name),
		None => {
			let simple = LitStr::new(&ident.to_string(), ident.span());
			quote!(concat!(module_path!(), "::", #simple))
		}
	};

	let mut bindings = Vec::new();
	let mut primary_key: Option<TokenStream> = None;

	for field in fields {
		let Some(field_ident) = field.ident.as_ref() else {
			continue;
		};
		let ty = &field.ty;

		let attrs = FieldAttrs::from_attributes(&field.attrs)?;
		if attrs.skip {
			continue;
		}

		let raw = field_ident.to_string();
		let name = attrs
			.rename
			.clone()
			.unwrap_or_else(|| raw.trim_start_matches("r#").to_string());
		let name = LitStr::new(&name, field_ident.span());

		bindings.push(quote! {
			.field::<#ty>(#name, |object| &mut object.#field_ident)
		});

		if !attrs.readonly {
			// A setter may return `()` or `Result<(), E>`; an `Err` fails the binding.
			let assign = match &attrs.setter {
				Some(setter) => quote!(object.#setter(value)),
				None => quote!(object.#field_ident = value),
			};
			bindings.push(quote! {
				.property(#name, |object: &mut Self, value: #ty| #assign)
			});
		}

		if attrs.id {
			if primary_key.is_some() {
				return Err(syn::Error::new_spanned(
					field,
					"only one field can be marked #[fixture(id)]",
				));
			}
			primary_key = Some(quote! {
				.primary_key::<#ty>(
					#name,
					|object| &object.#field_ident,
					|object| &mut object.#field_ident,
				)
			});
		}

		if attrs.natural_key {
			bindings.push(quote! {
				.natural_key::<#ty>(#name, |object| &object.#field_ident)
			});
		}
	}

	Ok(quote! {
		#[automatically_derived]
		impl #fixy::types::Fixture for #ident {
			fn descriptor() -> #fixy::types::TypeDescriptor {
				#fixy::types::TypeDescriptor::builder::<Self>(#type_name)
					#(#bindings)*
					#primary_key
					.build()
			}
		}

		#[automatically_derived]
		impl #fixy::binding::FromFixture for #ident {
			fn from_fixture(
				value: &#fixy::binding::BindValue,
				binder: &#fixy::binding::FieldBinder,
			) -> ::core::result::Result<Self, #fixy::error::CoercionError> {
				binder.bind_nested::<Self>(value)
			}
		}

		#fixy::inventory::submit! {
			#fixy::types::FixtureRegistration::new(
				<#ident as #fixy::types::Fixture>::descriptor
			)
		}
	})
}
