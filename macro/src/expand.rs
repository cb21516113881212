use parsing::SidComponents;
use proc_macro2::TokenStream;
use quote::quote;
use syn::LitStr;

pub fn sid_impl(input: &LitStr) -> Result<TokenStream, syn::Error> {
    let components: SidComponents = input
        .value()
        .parse()
        .map_err(|e| syn::Error::new_spanned(input, e))?;
    let bytes = components.to_binary();
    let bytes = bytes.as_slice();
    Ok(quote! {
        [#(#bytes),*]
    })
}
