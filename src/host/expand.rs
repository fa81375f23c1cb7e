use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{ToTokens, quote};
use syn::{Ident, Item, ItemMod};
use tracing::{Level, event, info_span};

use crate::core::config::GeneratorConfig;
use crate::generator::Generator;

use super::syn_source::SynSource;

/// Reads `#[save_module(...)]` options into a configuration.
///
/// Supported: `runtime = path`, `identifiable = Trait`, `identity = method`,
/// `lifecycle = Trait`, `hook = method`, `marker = attribute`.
pub fn parse_save_module_args(attr: TokenStream2) -> syn::Result<GeneratorConfig> {
    use syn::parse::Parser;

    let mut config = GeneratorConfig::new();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("runtime") {
            let path: syn::Path = meta.value()?.parse()?;
            config.runtime_path = path.to_token_stream().to_string();
            return Ok(());
        }

        let target = if meta.path.is_ident("identifiable") {
            &mut config.identifiable_capability
        } else if meta.path.is_ident("identity") {
            &mut config.identity_accessor
        } else if meta.path.is_ident("lifecycle") {
            &mut config.lifecycle_base
        } else if meta.path.is_ident("hook") {
            &mut config.lifecycle_hook
        } else if meta.path.is_ident("marker") {
            &mut config.marker_attribute
        } else {
            return Err(meta.error(
                "Unsupported #[save_module(...)] option. Supported: runtime, identifiable, identity, lifecycle, hook, marker",
            ));
        };
        let ident: Ident = meta.value()?.parse()?;
        *target = ident.to_string();
        Ok(())
    });

    parser.parse2(attr)?;
    config
        .validate()
        .map_err(|err| syn::Error::new(Span::call_site(), err.to_string()))?;
    Ok(config)
}

fn items_at<'a>(items: &'a mut Vec<Item>, path: &[String]) -> Option<&'a mut Vec<Item>> {
    let Some((head, rest)) = path.split_first() else {
        return Some(items);
    };
    items.iter_mut().find_map(|item| match item {
        Item::Mod(ItemMod {
            ident,
            content: Some((_, nested)),
            ..
        }) if ident == head => items_at(nested, rest),
        _ => None,
    })
}

/// Expands an inline module: strips markers, reports error diagnostics as
/// compile errors and appends each synthesized registration procedure next to
/// its type.
pub fn expand_save_module(attr: TokenStream2, mut item_mod: ItemMod) -> syn::Result<TokenStream2> {
    let config = parse_save_module_args(attr)?;
    let span = info_span!("savegen.expand", module = %item_mod.ident);
    let _guard = span.enter();

    let source = SynSource::from_module(&mut item_mod, &config)?;
    let generator =
        Generator::new(config).map_err(|err| syn::Error::new(Span::call_site(), err.to_string()))?;
    let output = generator.run(&source.model);

    let mut errors: Option<syn::Error> = None;
    for diagnostic in output.diagnostics.iter().filter(|diagnostic| diagnostic.is_error()) {
        let error = syn::Error::new(
            source.span_of(&diagnostic.location),
            format!("{}: {}", diagnostic.id, diagnostic.message),
        );
        match errors.as_mut() {
            Some(combined) => combined.combine(error),
            None => errors = Some(error),
        }
    }

    if let Some((_, items)) = item_mod.content.as_mut() {
        for generated in &output.generated {
            let procedure = &generated.procedure;
            let tokens = generator
                .renderer()
                .render(procedure)
                .map_err(|err| syn::Error::new(Span::call_site(), err.to_string()))?;
            let item: Item = syn::parse2(tokens)?;
            let nested = procedure.namespace.get(1..).unwrap_or_default();
            if let Some(target) = items_at(items, nested) {
                target.push(item);
            }
        }
    }

    event!(
        Level::DEBUG,
        generated = output.generated.len(),
        errors = output.diagnostics.iter().filter(|diagnostic| diagnostic.is_error()).count(),
        "module expanded"
    );

    let errors = errors.map(|error| error.to_compile_error());
    Ok(quote! {
        #item_mod
        #errors
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand(attr: TokenStream2, item_mod: ItemMod) -> String {
        expand_save_module(attr, item_mod).unwrap().to_string()
    }

    #[test]
    fn test_parse_args() {
        let config = parse_save_module_args(quote! {
            runtime = crate::persistence, identifiable = Keyed, hook = start
        })
        .unwrap();
        assert_eq!(config.runtime_path, "crate :: persistence");
        assert_eq!(config.identifiable_capability, "Keyed");
        assert_eq!(config.lifecycle_hook, "start");
        assert_eq!(config.lifecycle_base, "Behaviour");

        assert!(parse_save_module_args(quote! { colour = red }).is_err());
        assert!(parse_save_module_args(quote! { hook = register_save_object }).is_err());
    }

    #[test]
    fn test_expands_registration_next_to_type() {
        let expanded = expand(
            TokenStream2::new(),
            parse_quote! {
                mod game {
                    pub struct Ship {
                        #[save]
                        position: (f32, f32),
                    }

                    impl save_system::Behaviour for Ship {
                        fn awake(this: &Rc<RefCell<Self>>) {
                            Self::register_save_object(this);
                        }
                    }

                    mod fleet {
                        pub struct Tug { #[save] fuel: f32 }
                        impl Behaviour for Tug {}
                    }
                }
            },
        );

        assert!(expanded.contains("impl Ship"));
        assert!(expanded.contains("impl Tug"));
        assert!(expanded.contains("pub fn register_save_object"));
        assert!(expanded.contains("\"position\""));
        assert!(!expanded.contains("compile_error"));
        assert!(!expanded.contains("# [save]"));
    }

    #[test]
    fn test_errors_become_compile_errors() {
        let expanded = expand(
            TokenStream2::new(),
            parse_quote! {
                mod game {
                    pub struct Crate { #[save] loot: u32 }
                    pub struct Point(#[save] f32);
                }
            },
        );

        assert!(expanded.contains("compile_error"));
        assert!(expanded.contains("SAVE003"));
        assert!(expanded.contains("SAVE002"));
        assert!(!expanded.contains("register_save_object"));
    }

    #[test]
    fn test_method_shape_error_keeps_other_members() {
        let expanded = expand(
            TokenStream2::new(),
            parse_quote! {
                mod game {
                    pub struct Ship { #[save] hp: i32 }
                    impl Ship {
                        #[save]
                        fn reset(&mut self) {}
                    }
                    impl Identifiable for Ship {
                        fn guid(&self) -> u64 { 7 }
                    }
                }
            },
        );

        assert!(expanded.contains("SAVE004"));
        assert!(expanded.contains("\"hp\""));
        assert!(!expanded.contains("\"reset\""));
    }

    #[test]
    fn test_items_at() {
        let mut item_mod: ItemMod = parse_quote! {
            mod a { mod b { struct C; } }
        };
        let (_, items) = item_mod.content.as_mut().unwrap();
        assert!(items_at(items, &["b".to_string()]).is_some());
        assert!(items_at(items, &["z".to_string()]).is_none());
        assert_eq!(items_at(items, &[]).map(|items| items.len()), Some(1));
    }
}
