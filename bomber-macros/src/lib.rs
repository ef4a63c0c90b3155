use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::{FnArg, Ident, ItemFn, LitStr};

/// Turn an async workload step into a constructor for a named `Scenario`.
///
/// The function may take a single `StepContext` argument or none, and must return either a
/// `Response` or a `Result<(), E>`. The scenario is named after the function unless a name is
/// given as a string literal.
///
/// # Example
/// ```ignore
/// use bomber::prelude::*;
///
/// #[scenario]
/// async fn get_bars(ctx: StepContext) -> Response {
///     ...
/// }
///
/// #[scenario("bars over http")]
/// async fn get_bars_static() -> Result<(), reqwest::Error> {
///     ...
/// }
///
/// let spec = get_bars().with_profile(LoadProfile::keep_constant(50, Duration::from_secs(120)));
/// ```
#[proc_macro_attribute]
pub fn scenario(attr: TokenStream, item: TokenStream) -> TokenStream {
    scenario_internal(attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn scenario_internal(attr: TokenStream2, item: TokenStream2) -> syn::Result<TokenStream2> {
    let input = syn::parse2::<ItemFn>(item)?;

    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            sig.fn_token,
            "#[scenario] must be applied to an async fn",
        ));
    }

    let scen_name = if attr.is_empty() {
        LitStr::new(&sig.ident.to_string(), sig.ident.span())
    } else {
        syn::parse2::<LitStr>(attr)?
    };

    let takes_ctx = match sig.inputs.len() {
        0 => false,
        1 if matches!(sig.inputs.first(), Some(FnArg::Typed(_))) => true,
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.inputs,
                "#[scenario] functions take either no arguments or a single StepContext",
            ))
        }
    };

    let step_name = Ident::new(&format!("__bomber_{}", sig.ident), Span::call_site());
    let mut step_sig = sig.clone();
    step_sig.ident = step_name.clone();

    let mut scen_sig = sig.clone();
    scen_sig.asyncness = None;
    scen_sig.inputs.clear();
    scen_sig.output = syn::parse_quote! { -> ::bomber::scenario::Scenario };

    let call = if takes_ctx {
        quote! { #step_name(ctx).await }
    } else {
        quote! { #step_name().await }
    };

    Ok(quote! {
        #(#attrs)* #vis #scen_sig {
            ::bomber::scenario::Scenario::new(#scen_name, |ctx: ::bomber::StepContext| async move {
                let _ = &ctx;
                ::bomber::Response::from(#call)
            })
        }

        #[doc(hidden)]
        #vis #step_sig #block
    })
}
