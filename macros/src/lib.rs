//! Atributos auxiliares para `stencil-runtime`.
//!
//! El único atributo que se exporta es [`macro@template_constructor`], el
//! cual marca constructores de tipos base cuyo reenvío debe generar el
//! compilador de plantillas. El atributo no altera el ítem anotado; su
//! presencia es lo que el compilador busca al resolver el tipo base.

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::{parse_macro_input, spanned::Spanned, ImplItemFn};

/// Marca un constructor de tipo base.
///
/// Solo puede aplicarse a funciones asociadas sin receptor `self`. El
/// compilador genera, por cada función marcada, un constructor público
/// con la misma firma en la plantilla que hereda del tipo.
#[proc_macro_attribute]
pub fn template_constructor(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        let attr = proc_macro2::TokenStream::from(attr);
        return syn::Error::new(attr.span(), "`template_constructor` takes no arguments")
            .to_compile_error()
            .into();
    }

    let function = parse_macro_input!(item as ImplItemFn);
    if let Some(receiver) = function.sig.receiver() {
        return syn::Error::new(
            receiver.span(),
            "template constructors must be associated functions without `self`",
        )
        .to_compile_error()
        .into();
    }

    function.into_token_stream().into()
}
