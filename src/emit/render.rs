use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use serde::Serialize;

use crate::core::config::{GeneratorConfig, REGISTRATION_METHOD};
use crate::core::error::{Result, SaveGenError};

use super::{Accessor, BindCall, Binding, Mutator, OwnerKey, SynthesizedProcedure};

/// A rendered procedure meant to be `include!`d in the type's declaring module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSource {
    /// `game/actors/Player.save.g.rs`
    pub hint_name: String,
    pub contents: String,
}

/// Renders procedures as inherent `impl` blocks against a persistence runtime.
///
/// The runtime is expected to expose `get_entry_context(owner)`, an entry
/// context whose `bind*` methods take it by value and return it for chaining,
/// and a `Value` alias for `Box<dyn Any>`.
#[derive(Debug, Clone)]
pub struct RustRenderer {
    runtime: syn::Path,
}

fn ident(text: &str) -> Result<syn::Ident> {
    syn::parse_str::<syn::Ident>(text)
        .map_err(|_| SaveGenError::InvalidIdentifier(text.to_string()))
}

fn value_type(text: &str) -> Result<syn::Type> {
    syn::parse_str::<syn::Type>(text).map_err(|_| SaveGenError::InvalidType(text.to_string()))
}

impl RustRenderer {
    pub fn new(runtime_path: &str) -> Result<Self> {
        let runtime = syn::parse_str::<syn::Path>(runtime_path)
            .map_err(|_| SaveGenError::InvalidPath(runtime_path.to_string()))?;
        Ok(Self { runtime })
    }

    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        Self::new(&config.runtime_path)
    }

    pub fn runtime(&self) -> &syn::Path {
        &self.runtime
    }

    /// `impl Type { pub fn register_save_object(this: &Rc<RefCell<Self>>) { .. } }`
    pub fn render(&self, procedure: &SynthesizedProcedure) -> Result<TokenStream2> {
        let runtime = &self.runtime;
        let type_ident = ident(&procedure.type_name)?;
        let registration = format_ident!("{}", REGISTRATION_METHOD);

        let owner = match &procedure.owner {
            OwnerKey::Identity {
                capability,
                accessor,
            } => {
                let capability = self.capability(capability)?;
                let accessor = ident(accessor)?;
                quote! {
                    let owner = #capability::#accessor(&*::std::cell::RefCell::borrow(this));
                }
            }
            OwnerKey::Instance => quote! { let owner = this; },
        };

        let calls = procedure
            .calls
            .iter()
            .map(|call| self.render_call(call))
            .collect::<Result<Vec<_>>>()?;

        Ok(quote! {
            impl #type_ident {
                pub fn #registration(this: &::std::rc::Rc<::std::cell::RefCell<Self>>) {
                    #owner
                    #runtime::get_entry_context(owner)
                        #(#calls)*;
                }
            }
        })
    }

    pub fn render_source(&self, procedure: &SynthesizedProcedure) -> Result<GeneratedSource> {
        let tokens = self.render(procedure)?;
        let mut path: Vec<&str> = procedure.namespace.iter().map(String::as_str).collect();
        let file_name = format!("{}.save.g.rs", procedure.type_name);
        path.push(&file_name);

        Ok(GeneratedSource {
            hint_name: path.join("/"),
            contents: format!("// @generated by savegen\n{tokens}\n"),
        })
    }

    // A bare capability name lives in the runtime; a qualified one is used as written.
    fn capability(&self, capability: &str) -> Result<TokenStream2> {
        let path = syn::parse_str::<syn::Path>(capability)
            .map_err(|_| SaveGenError::InvalidPath(capability.to_string()))?;
        if path.leading_colon.is_none() && path.segments.len() == 1 {
            let runtime = &self.runtime;
            Ok(quote! { #runtime::#path })
        } else {
            Ok(path.to_token_stream())
        }
    }

    fn render_call(&self, call: &BindCall) -> Result<TokenStream2> {
        let id = &call.id;
        let method = format_ident!("{}", call.method_name());
        let args = match &call.binding {
            Binding::Both(getter, setter) => {
                let getter = self.render_getter(getter)?;
                let setter = self.render_setter(setter)?;
                quote! { #getter, #setter }
            }
            Binding::Getter(getter) => self.render_getter(getter)?,
            Binding::Setter(setter) => self.render_setter(setter)?,
        };
        Ok(quote! { .#method(#id, #args) })
    }

    fn render_getter(&self, accessor: &Accessor) -> Result<TokenStream2> {
        let runtime = &self.runtime;
        let read = match accessor {
            Accessor::Read { symbol } => {
                let member = ident(symbol)?;
                quote! { ::std::cell::RefCell::borrow(&this).#member.clone() }
            }
            Accessor::Call { symbol } => {
                let member = ident(symbol)?;
                quote! { ::std::cell::RefCell::borrow(&this).#member() }
            }
            Accessor::ReadAssociated { symbol } => {
                let member = ident(symbol)?;
                return Ok(quote! {
                    || -> ::std::option::Option<#runtime::Value> {
                        ::std::option::Option::Some(::std::boxed::Box::new(Self::#member))
                    }
                });
            }
            Accessor::CallAssociated { symbol } => {
                let member = ident(symbol)?;
                return Ok(quote! {
                    || -> ::std::option::Option<#runtime::Value> {
                        ::std::option::Option::Some(::std::boxed::Box::new(Self::#member()))
                    }
                });
            }
        };

        Ok(quote! {
            {
                let handle = ::std::rc::Rc::downgrade(this);
                move || -> ::std::option::Option<#runtime::Value> {
                    let this = handle.upgrade()?;
                    let value = #read;
                    ::std::option::Option::Some(::std::boxed::Box::new(value))
                }
            }
        })
    }

    fn render_setter(&self, mutator: &Mutator) -> Result<TokenStream2> {
        let runtime = &self.runtime;
        let ty = value_type(mutator.value_type())?;
        let write = match mutator {
            Mutator::Assign { symbol, .. } => {
                let member = ident(symbol)?;
                quote! { ::std::cell::RefCell::borrow_mut(&this).#member = *value; }
            }
            Mutator::Call { symbol, .. } => {
                let member = ident(symbol)?;
                quote! { ::std::cell::RefCell::borrow_mut(&this).#member(*value); }
            }
            Mutator::CallAssociated { symbol, .. } => {
                let member = ident(symbol)?;
                return Ok(quote! {
                    |value: #runtime::Value| -> bool {
                        match value.downcast::<#ty>() {
                            ::std::result::Result::Ok(value) => {
                                Self::#member(*value);
                                true
                            }
                            ::std::result::Result::Err(_) => false,
                        }
                    }
                });
            }
        };

        Ok(quote! {
            {
                let handle = ::std::rc::Rc::downgrade(this);
                move |value: #runtime::Value| -> bool {
                    let ::std::option::Option::Some(this) = handle.upgrade() else {
                        return false;
                    };
                    match value.downcast::<#ty>() {
                        ::std::result::Result::Ok(value) => {
                            #write
                            true
                        }
                        ::std::result::Result::Err(_) => false,
                    }
                }
            }
        })
    }
}
