use proc_macro::TokenStream;
use quote::quote;
use syn::{FnArg, ItemFn, Pat, ReturnType, parse_macro_input};

/// Log the arguments and the result of a syscall entry point.
///
/// Every named argument except the calling thread context `td` is printed with `{:?}`,
/// once on entry and again on return (so in/out payloads show their filled state).
/// Successful calls are logged at `debug`, failed ones at `info`.
/// The annotated function must return a `Result`.
#[proc_macro_attribute]
pub fn syscall_trace(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut function = parse_macro_input!(item as ItemFn);
    let signature = &function.sig;
    let fn_name = &signature.ident;
    let ret_ty = match &signature.output {
        ReturnType::Type(_, ty) => quote! { #ty },
        ReturnType::Default => quote! { () },
    };
    let arg_names: Vec<_> = signature
        .inputs
        .iter()
        .filter_map(|arg| {
            // only named arguments like `x: i32`, skip `self` and destructuring patterns
            let FnArg::Typed(pat_type) = arg else {
                return None;
            };
            let Pat::Ident(pat_ident) = &*pat_type.pat else {
                return None;
            };
            if pat_ident.ident == "td" {
                // the calling thread context
                return None;
            }
            Some(pat_ident.ident.clone())
        })
        .collect();

    let arg_list_pattern = arg_names
        .iter()
        .map(|name| format!("{} = {{:?}}", name))
        .collect::<Vec<_>>()
        .join(", ");
    let format_pattern_in = format!("[syscall] <= {}({})", fn_name, arg_list_pattern);
    let format_pattern_out = format!("[syscall] => {}({}) = {{:?}}", fn_name, arg_list_pattern);

    let fn_body = &function.block;
    function.block = syn::parse2(quote! {{
        ::log::debug!(#format_pattern_in #(, #arg_names)*);

        let __result: #ret_ty = (|| -> #ret_ty { #fn_body })();

        match __result {
            Ok(_) => ::log::debug!(#format_pattern_out #(, #arg_names)*, __result),
            Err(_) => ::log::info!(#format_pattern_out #(, #arg_names)*, __result),
        }
        __result
    }})
    .unwrap();
    quote! {
        #function
    }
    .into()
}
