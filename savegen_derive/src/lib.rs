use proc_macro::TokenStream;
use syn::{ItemMod, parse_macro_input};

/// Synthesizes `register_save_object` for every type of an inline module that
/// has `#[save]` members.
///
/// ```ignore
/// #[savegen_derive::save_module(runtime = crate::save_system)]
/// mod game {
///     pub struct Ship {
///         #[save]
///         position: (f32, f32),
///     }
///
///     impl crate::save_system::Behaviour for Ship {
///         fn awake(this: &Rc<RefCell<Self>>) {
///             Self::register_save_object(this);
///         }
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn save_module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemMod);
    match savegen::host::expand_save_module(attr.into(), input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Persistence marker. Only meaningful inside a `#[save_module]` module, which
/// consumes it before this macro would run.
#[proc_macro_attribute]
pub fn save(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut output: TokenStream = syn::Error::new(
        proc_macro2::Span::call_site(),
        "#[save] must be used inside a #[save_module] module",
    )
    .to_compile_error()
    .into();
    output.extend(item);
    output
}
