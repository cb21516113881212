#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Not an issue in a macro crate"
)]
//! Procedural macro turning a SID string literal into its binary form at compile time.
mod expand;
use expand::sid_impl;
use proc_macro::TokenStream;

use syn::{LitStr, parse_macro_input};

/// Expands `sid!("S-1-5-32-546")` to the binary SID as a `[u8; N]` array.
///
/// Malformed literals are reported as compile errors on the literal.
#[proc_macro]
pub fn sid(input: TokenStream) -> TokenStream {
    let lit = parse_macro_input!(input as LitStr);
    match sid_impl(&lit) {
        Ok(token_stream) => token_stream,
        Err(err) => err.to_compile_error(),
    }
    .into()
}
