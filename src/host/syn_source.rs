//! Declaration snapshots of inline Rust modules.
//!
//! Named structs are the class-like types here: inherent `impl` blocks can
//! always extend them, so they are treated as partial. Trait impls found in the
//! module become the base list of their self type.

use std::collections::HashMap;

use proc_macro2::Span;
use quote::ToTokens;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};
use syn::{
    Fields, FnArg, ImplItem, Item, ItemImpl, ItemMod, ItemStruct, LitStr, ReturnType, TraitItem,
    Type, TypePath,
};

use crate::core::config::GeneratorConfig;
use crate::diagnostics::Location;
use crate::model::{
    Marker, MemberDeclaration, MemberKind, Parameter, PersistenceMode, SourceModel, Statement,
    TypeDeclaration, TypeKind, TypeRef,
};

/// A module's declarations together with the spans diagnostics point at.
#[derive(Debug, Clone)]
pub struct SynSource {
    pub model: SourceModel,
    spans: HashMap<Location, Span>,
}

impl SynSource {
    /// Reads `item_mod` and strips every persistence marker from it.
    pub fn from_module(item_mod: &mut ItemMod, config: &GeneratorConfig) -> syn::Result<Self> {
        let mut source = Self {
            model: SourceModel::default(),
            spans: HashMap::new(),
        };
        let namespace = vec![item_mod.ident.unraw().to_string()];
        let Some((_, items)) = item_mod.content.as_mut() else {
            return Err(syn::Error::new(
                item_mod.span(),
                "#[save_module] requires an inline module",
            ));
        };

        source.read_declarations(items, &namespace, config)?;
        source.read_impls(items, &namespace, config)?;
        Ok(source)
    }

    /// Span of a diagnostic location, falling back to its type.
    pub fn span_of(&self, location: &Location) -> Span {
        self.spans
            .get(location)
            .or_else(|| self.spans.get(&Location::of_type(location.type_path.clone())))
            .copied()
            .unwrap_or_else(Span::call_site)
    }

    fn push_type(&mut self, ty: TypeDeclaration, span: Span) {
        self.spans.insert(ty.location(), span);
        self.model.types.push(ty);
    }

    fn push_member(&mut self, type_path: &str, member: MemberDeclaration, span: Span) -> bool {
        let Some(position) = self.model.position(type_path) else {
            return false;
        };
        let ty = &mut self.model.types[position];
        self.spans.insert(ty.member_location(&member), span);
        ty.members.push(member);
        true
    }

    fn read_declarations(
        &mut self,
        items: &mut [Item],
        namespace: &[String],
        config: &GeneratorConfig,
    ) -> syn::Result<()> {
        for item in items.iter_mut() {
            match item {
                Item::Struct(item_struct) => self.read_struct(item_struct, namespace, config)?,
                Item::Enum(item_enum) => {
                    let mut ty = declared(&item_enum.ident, TypeKind::Enum, namespace);
                    for variant in &mut item_enum.variants {
                        if let Some(marker) = extract_save_marker(&mut variant.attrs, config)? {
                            let name = variant.ident.unraw().to_string();
                            let member = MemberDeclaration::field(&name, "Self").marked(marker);
                            self.spans.insert(ty.member_location(&member), variant.ident.span());
                            ty.members.push(member);
                        }
                    }
                    self.push_type(ty, item_enum.ident.span());
                }
                Item::Union(item_union) => {
                    let mut ty = declared(&item_union.ident, TypeKind::Union, namespace);
                    for field in &mut item_union.fields.named {
                        let marker = extract_save_marker(&mut field.attrs, config)?;
                        if let Some(ident) = &field.ident {
                            let member = field_member(ident, &field.ty, marker);
                            self.spans.insert(ty.member_location(&member), ident.span());
                            ty.members.push(member);
                        }
                    }
                    self.push_type(ty, item_union.ident.span());
                }
                Item::Trait(item_trait) => {
                    let mut ty = declared(&item_trait.ident, TypeKind::Interface, namespace);
                    for trait_item in &mut item_trait.items {
                        let member = match trait_item {
                            TraitItem::Fn(method) => {
                                let marker = extract_save_marker(&mut method.attrs, config)?;
                                method_member(&method.sig, None, marker)
                            }
                            TraitItem::Const(constant) => {
                                let marker = extract_save_marker(&mut constant.attrs, config)?;
                                const_member(&constant.ident, &constant.ty, marker)
                            }
                            _ => continue,
                        };
                        self.spans.insert(ty.member_location(&member), trait_item.span());
                        ty.members.push(member);
                    }
                    self.push_type(ty, item_trait.ident.span());
                }
                Item::Mod(nested) => {
                    if let Some((_, nested_items)) = nested.content.as_mut() {
                        let mut nested_namespace = namespace.to_vec();
                        nested_namespace.push(nested.ident.unraw().to_string());
                        self.read_declarations(nested_items, &nested_namespace, config)?;
                    }
                }
                Item::Fn(func) => reject_marker(&mut func.attrs, config)?,
                Item::Const(constant) => reject_marker(&mut constant.attrs, config)?,
                Item::Static(item_static) => reject_marker(&mut item_static.attrs, config)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn read_struct(
        &mut self,
        item_struct: &mut ItemStruct,
        namespace: &[String],
        config: &GeneratorConfig,
    ) -> syn::Result<()> {
        let kind = match item_struct.fields {
            Fields::Named(_) => TypeKind::Class,
            Fields::Unnamed(_) | Fields::Unit => TypeKind::Struct,
        };
        let mut ty = declared(&item_struct.ident, kind, namespace).partial();
        for attr in &item_struct.attrs {
            ty.attributes.push(path_text(attr.path()));
        }

        for (index, field) in item_struct.fields.iter_mut().enumerate() {
            let marker = extract_save_marker(&mut field.attrs, config)?;
            let member = match &field.ident {
                Some(ident) => field_member(ident, &field.ty, marker),
                None => MemberDeclaration {
                    name: index.to_string(),
                    symbol: index.to_string(),
                    kind: MemberKind::Field {
                        ty: type_ref(&field.ty),
                        is_read_only: false,
                        is_const: false,
                    },
                    marker,
                    is_static: false,
                },
            };
            self.spans.insert(ty.member_location(&member), field.span());
            ty.members.push(member);
        }

        if !item_struct.generics.params.is_empty() && ty.has_marked_members() {
            return Err(syn::Error::new(
                item_struct.generics.span(),
                "#[save] is not supported on generic types",
            ));
        }
        self.push_type(ty, item_struct.ident.span());
        Ok(())
    }

    fn read_impls(
        &mut self,
        items: &mut [Item],
        namespace: &[String],
        config: &GeneratorConfig,
    ) -> syn::Result<()> {
        for item in items.iter_mut() {
            match item {
                Item::Impl(item_impl) => self.read_impl(item_impl, namespace, config)?,
                Item::Mod(nested) => {
                    if let Some((_, nested_items)) = nested.content.as_mut() {
                        let mut nested_namespace = namespace.to_vec();
                        nested_namespace.push(nested.ident.unraw().to_string());
                        self.read_impls(nested_items, &nested_namespace, config)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_impl(
        &mut self,
        item_impl: &mut ItemImpl,
        namespace: &[String],
        config: &GeneratorConfig,
    ) -> syn::Result<()> {
        let self_ident = match extract_impl_self_type_ident(&item_impl.self_ty) {
            Ok(ident) => ident,
            Err(err) if impl_has_marker(item_impl, config) => return Err(err),
            Err(_) => return Ok(()),
        };
        let type_path = qualified(namespace, &self_ident.unraw().to_string());
        let known = self.model.position(&type_path).is_some();

        if let Some((_, trait_path, _)) = &item_impl.trait_ {
            if let Some(position) = self.model.position(&type_path) {
                let base = path_text(trait_path);
                let ty = &mut self.model.types[position];
                if !ty.bases.contains(&base) {
                    ty.bases.push(base);
                }
            }
        }

        let generic = !item_impl.generics.params.is_empty();
        for impl_item in &mut item_impl.items {
            let (member, span) = match impl_item {
                ImplItem::Fn(method) => {
                    let marker = extract_save_marker(&mut method.attrs, config)?;
                    let body = collect_statements(&method.block);
                    (method_member(&method.sig, Some(body), marker), method.sig.ident.span())
                }
                ImplItem::Const(constant) => {
                    let marker = extract_save_marker(&mut constant.attrs, config)?;
                    (const_member(&constant.ident, &constant.ty, marker), constant.ident.span())
                }
                _ => continue,
            };

            if member.is_marked() && (generic || !known) {
                let message = if generic {
                    "#[save] is not supported on generic impls"
                } else {
                    "#[save] requires the impl's self type to be declared in the same module"
                };
                return Err(syn::Error::new(span, message));
            }
            self.push_member(&type_path, member, span);
        }
        Ok(())
    }
}

fn impl_has_marker(item_impl: &ItemImpl, config: &GeneratorConfig) -> bool {
    item_impl.items.iter().any(|impl_item| {
        let attrs = match impl_item {
            ImplItem::Fn(method) => &method.attrs,
            ImplItem::Const(constant) => &constant.attrs,
            _ => return false,
        };
        attrs
            .iter()
            .any(|attr| path_ends_with_ident(attr.path(), &config.marker_attribute))
    })
}

fn declared(ident: &syn::Ident, kind: TypeKind, namespace: &[String]) -> TypeDeclaration {
    let namespace: Vec<&str> = namespace.iter().map(String::as_str).collect();
    TypeDeclaration::new(&ident.unraw().to_string(), kind).in_namespace(&namespace)
}

fn qualified(namespace: &[String], name: &str) -> String {
    let mut segments = namespace.to_vec();
    segments.push(name.to_string());
    segments.join("::")
}

fn path_text(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| segment.ident.unraw().to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn type_ref(ty: &Type) -> TypeRef {
    let text = ty.to_token_stream().to_string();
    match ty {
        Type::Infer(_) | Type::ImplTrait(_) | Type::Macro(_) | Type::Verbatim(_) => {
            TypeRef::Unresolved(text)
        }
        _ => TypeRef::Named(text),
    }
}

fn field_member(ident: &syn::Ident, ty: &Type, marker: Option<Marker>) -> MemberDeclaration {
    MemberDeclaration {
        name: ident.unraw().to_string(),
        symbol: ident.to_string(),
        kind: MemberKind::Field {
            ty: type_ref(ty),
            is_read_only: false,
            is_const: false,
        },
        marker,
        is_static: false,
    }
}

fn const_member(ident: &syn::Ident, ty: &Type, marker: Option<Marker>) -> MemberDeclaration {
    MemberDeclaration {
        name: ident.unraw().to_string(),
        symbol: ident.to_string(),
        kind: MemberKind::Field {
            ty: type_ref(ty),
            is_read_only: true,
            is_const: true,
        },
        marker,
        is_static: true,
    }
}

// Method names are snake_case in Rust; identifiers are derived from their PascalCase form.
fn method_member(
    sig: &syn::Signature,
    body: Option<Vec<Statement>>,
    marker: Option<Marker>,
) -> MemberDeclaration {
    let has_receiver = sig.inputs.iter().any(|input| matches!(input, FnArg::Receiver(_)));
    let parameters = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            FnArg::Typed(pat_type) => Some(Parameter {
                name: pat_type.pat.to_token_stream().to_string(),
                ty: type_ref(&pat_type.ty),
            }),
            FnArg::Receiver(_) => None,
        })
        .collect();
    let return_type = match &sig.output {
        ReturnType::Default => None,
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Tuple(tuple) if tuple.elems.is_empty() => None,
            ty => Some(type_ref(ty)),
        },
    };

    MemberDeclaration {
        name: to_pascal_case(&sig.ident.unraw().to_string()),
        symbol: sig.ident.to_string(),
        kind: MemberKind::Method {
            return_type,
            parameters,
            body: body.unwrap_or_default(),
        },
        marker,
        is_static: !has_receiver,
    }
}

#[derive(Default)]
struct InvocationCollector {
    invocations: Vec<String>,
}

impl<'ast> Visit<'ast> for InvocationCollector {
    fn visit_expr_call(&mut self, call: &'ast syn::ExprCall) {
        if let syn::Expr::Path(path) = call.func.as_ref() {
            if let Some(segment) = path.path.segments.last() {
                self.invocations.push(segment.ident.unraw().to_string());
            }
        }
        visit::visit_expr_call(self, call);
    }

    fn visit_expr_method_call(&mut self, call: &'ast syn::ExprMethodCall) {
        self.invocations.push(call.method.unraw().to_string());
        visit::visit_expr_method_call(self, call);
    }
}

fn collect_statements(block: &syn::Block) -> Vec<Statement> {
    block
        .stmts
        .iter()
        .map(|stmt| {
            let mut collector = InvocationCollector::default();
            collector.visit_stmt(stmt);
            Statement {
                text: stmt.to_token_stream().to_string(),
                invocations: collector.invocations,
            }
        })
        .collect()
}

fn to_pascal_case(value: &str) -> String {
    let mut out = String::new();
    for chunk in value.split('_').filter(|part| !part.is_empty()) {
        let mut chars = chunk.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        value.to_string()
    } else {
        out
    }
}

fn path_ends_with_ident(path: &syn::Path, ident: &str) -> bool {
    path.segments
        .last()
        .map(|segment| segment.ident == ident)
        .unwrap_or(false)
}

fn extract_impl_self_type_ident(self_ty: &Type) -> syn::Result<syn::Ident> {
    let Type::Path(TypePath { qself: None, path }) = self_ty else {
        return Err(syn::Error::new(
            self_ty.span(),
            "#[save_module] requires impls of concrete named types",
        ));
    };

    let Some(segment) = path.segments.last() else {
        return Err(syn::Error::new(
            self_ty.span(),
            "Unable to extract impl self type identifier",
        ));
    };

    Ok(segment.ident.clone())
}

fn parse_save_attr_tokens(attr: proc_macro2::TokenStream) -> syn::Result<Marker> {
    use syn::parse::Parser;

    let mut marker = Marker::new();
    let parser = syn::meta::parser(|meta| {
        if meta.path.is_ident("id") || meta.path.is_ident("identifier") {
            let value = meta.value()?;
            let lit: LitStr = value.parse()?;
            if lit.value().trim().is_empty() {
                return Err(syn::Error::new(lit.span(), "#[save] identifier cannot be empty"));
            }
            marker.identifier = Some(lit.value());
            return Ok(());
        }

        if meta.path.is_ident("persistent") {
            marker.mode = PersistenceMode::Persistent;
            return Ok(());
        }

        Err(meta.error("Unsupported #[save(...)] option. Supported: id = \"...\", persistent"))
    });

    parser.parse2(attr)?;
    Ok(marker)
}

/// Removes the persistence marker from `attrs` and returns its settings.
pub fn extract_save_marker(
    attrs: &mut Vec<syn::Attribute>,
    config: &GeneratorConfig,
) -> syn::Result<Option<Marker>> {
    let mut found: Option<Marker> = None;
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if !path_ends_with_ident(attr.path(), &config.marker_attribute) {
            kept.push(attr);
            continue;
        }

        let tokens = match &attr.meta {
            syn::Meta::Path(_) => proc_macro2::TokenStream::new(),
            syn::Meta::List(list) => list.tokens.clone(),
            syn::Meta::NameValue(_) => {
                return Err(syn::Error::new(
                    attr.span(),
                    "Expected #[save] or #[save(...)]",
                ));
            }
        };
        let parsed = parse_save_attr_tokens(tokens)?;
        if found.is_some() {
            return Err(syn::Error::new(attr.span(), "Duplicate #[save] marker"));
        }
        found = Some(parsed);
    }

    *attrs = kept;
    Ok(found)
}

fn reject_marker(attrs: &mut Vec<syn::Attribute>, config: &GeneratorConfig) -> syn::Result<()> {
    let span = attrs
        .iter()
        .find(|attr| path_ends_with_ident(attr.path(), &config.marker_attribute))
        .map(|attr| attr.span());
    match span {
        Some(span) => Err(syn::Error::new(
            span,
            "#[save] must be placed on a field, method or associated const of a type",
        )),
        None => Ok(()),
    }
}
