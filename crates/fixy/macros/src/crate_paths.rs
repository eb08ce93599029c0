//! Helper functions for dynamic crate path resolution using proc_macro_crate

use proc_macro2::TokenStream;
use quote::quote;

/// Resolves the path to the fixy crate dynamically.
///
/// This supports renamed dependencies (`my_fixy = { package = "fixy" }`).
/// Returns an error if the crate cannot be found in Cargo.toml.
pub(crate) fn get_fixy_crate() -> syn::Result<TokenStream> {
	use proc_macro_crate::{FoundCrate, crate_name};

	match crate_name("fixy") {
		Ok(FoundCrate::Itself) => Ok(quote!(::fixy)),
		Ok(FoundCrate::Name(name)) => {
			let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
			Ok(quote!(::#ident))
		}
		Err(e) => Err(syn::Error::new(
			proc_macro2::Span::call_site(),
			format!(
				"failed to resolve `fixy` crate: {}. Ensure it is listed in Cargo.toml dependencies.",
				e
			),
		)),
	}
}
