use darling::{ast, FromDeriveInput, FromField};
use proc_macro2::TokenTree;
use quote::{format_ident, quote, ToTokens};
use syn::Meta;

#[derive(Debug, FromDeriveInput)]
#[darling(supports(struct_named), forward_attrs)]
struct ModelInputReceiver {
	ident: syn::Ident,

	generics: syn::Generics,

	data: ast::Data<(), ModelFieldReceiver>,

	attrs: Vec<syn::Attribute>,
}

#[derive(Debug, FromField)]
#[darling(forward_attrs)]
struct ModelFieldReceiver {
	ident: Option<syn::Ident>,

	ty: syn::Type,
	vis: syn::Visibility,

	attrs: Vec<syn::Attribute>,
}

/// Whether the field is never read from client input.
fn is_output_only(attrs: &[syn::Attribute]) -> bool {
	attrs.iter().any(|attr| {
		let Meta::List(ref list) = attr.meta else {
			return false;
		};

		list.path.is_ident("serde")
			&& list.tokens.to_token_stream().into_iter().any(|token| {
				matches!(token, TokenTree::Ident(ref ident) if ident == "skip_deserializing" || ident == "skip")
			})
	})
}

pub fn from_input(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = syn::parse_macro_input!(input as syn::DeriveInput);
	let receiver = match ModelInputReceiver::from_derive_input(&input) {
		Ok(x) => x,
		Err(e) => return e.write_errors().into(),
	};

	let ident = &receiver.ident;
	let vis = &input.vis;
	let generics = &receiver.generics;
	let create_ident = format_ident!("Create{}Input", ident);

	// Doc comments describe the model, not its input.
	let attrs = receiver
		.attrs
		.iter()
		.filter(|attr| !attr.path().is_ident("doc"));

	let Some(fields) = receiver.data.as_ref().take_struct() else {
		return syn::Error::new_spanned(ident, "#[model] only supports structs with named fields")
			.into_compile_error()
			.into();
	};

	let create_fields = fields
		.iter()
		.filter(|field| !is_output_only(&field.attrs))
		.filter_map(|field| {
			let ident = field.ident.as_ref()?;
			let ty = &field.ty;
			let attrs = &field.attrs;
			let vis = &field.vis;

			Some(quote! {
				#(#attrs)*
				#vis #ident: #ty,
			})
		});

	let doc = format!("Input for creating a new [`{ident}`].");

	quote! {
		#input

		#[doc = #doc]
		#(#attrs)*
		#vis struct #create_ident #generics {
			#(
				#create_fields
			)*
		}
	}
	.into()
}
