//! Reenvío de constructores del tipo base.
//!
//! Una plantilla con `@inherits` obtiene un constructor por cada
//! constructor marcado con `#[template_constructor]` en su tipo base.
//! El constructor reenviado recibe los mismos parámetros, construye la
//! base y la envuelve con `from_base`. Los argumentos genéricos del tipo
//! base, o sus valores por omisión, se sustituyen en los tipos de los
//! parámetros.
//!
//! La búsqueda de constructores se delega en un [`BaseTypeResolver`].
//! [`AmbientResolver`] analiza con `syn` las unidades de código ambiente:
//! las unidades adicionales de [`GlobalOptions`] y, si corresponde, los
//! tipos base del runtime.

use std::collections::HashMap;

use quote::ToTokens;
use syn::{
    visit_mut::{self, VisitMut},
    Expr, FnArg, GenericArgument, GenericParam, ImplItem, Item, Lit, Meta, Pat, PathArguments,
    ReturnType, Type, Visibility,
};

use crate::{
    ir::{Constructor, DocumentNode, Member, Parameter},
    options::{CodeUnit, GlobalOptions},
};

/// Tipos base que el runtime define.
const RUNTIME_BASES: &str = include_str!("../runtime/src/base.rs");

/// Nombre del atributo que marca constructores reenviables.
const MARKER: &str = "template_constructor";

/// Descripción de un tipo base.
#[derive(Clone, Debug)]
pub struct BaseType {
    /// Parámetros genéricos del tipo, con su valor por omisión.
    pub parameters: Vec<(String, Option<Type>)>,
    pub constructors: Vec<BaseConstructor>,
}

/// Un constructor de un tipo base.
#[derive(Clone, Debug)]
pub struct BaseConstructor {
    pub name: String,
    pub parameters: Vec<(String, Type)>,
    pub docs: Vec<String>,

    /// Indica si lleva `#[template_constructor]`.
    pub marked: bool,

    /// Argumentos del tipo en el encabezado del bloque `impl`, por posición.
    pub bindings: Vec<Binding>,
}

/// Argumento del tipo en el encabezado de un bloque `impl`.
#[derive(Clone, Debug)]
pub enum Binding {
    /// Un parámetro genérico del bloque, como `M` en `impl<M> X<M>`.
    Parameter(String),

    /// Un tipo concreto, como `String` en `impl X<String>`.
    Concrete(Type),
}

/// Fuente de información sobre tipos base.
pub trait BaseTypeResolver {
    /// Busca un tipo por el último segmento de su ruta.
    fn resolve(&self, name: &str) -> Option<BaseType>;
}

/// Resolución a partir de las unidades de código ambiente.
pub struct AmbientResolver {
    files: Vec<syn::File>,
}

impl AmbientResolver {
    pub fn new(options: &GlobalOptions) -> Self {
        let runtime = options.embed_runtime.then(|| CodeUnit {
            name: String::from("stencil_runtime::base"),
            text: String::from(RUNTIME_BASES),
        });

        let files = runtime
            .iter()
            .chain(&options.additional_units)
            .filter_map(|unit| match syn::parse_file(&unit.text) {
                Ok(file) => Some(file),
                Err(error) => {
                    log::warn!("Ignoring unparsable code unit `{}`: {}", unit.name, error);
                    None
                }
            })
            .collect();

        AmbientResolver { files }
    }
}

impl BaseTypeResolver for AmbientResolver {
    fn resolve(&self, name: &str) -> Option<BaseType> {
        let mut items = Vec::new();
        for file in &self.files {
            collect_items(&file.items, &mut items);
        }

        let parameters = items.iter().find_map(|item| match item {
            Item::Struct(item) if item.ident == name => Some(type_parameters(&item.generics)),
            Item::Enum(item) if item.ident == name => Some(type_parameters(&item.generics)),
            _ => None,
        })?;

        let constructors = items
            .iter()
            .filter_map(|item| match item {
                Item::Impl(block) if block.trait_.is_none() => Some(block),
                _ => None,
            })
            .filter_map(|block| {
                let bindings = impl_bindings(block, name)?;
                Some(constructors(block, name, bindings))
            })
            .flatten()
            .collect();

        Some(BaseType {
            parameters,
            constructors,
        })
    }
}

/// Ítems de nivel superior y de módulos en línea.
fn collect_items<'a>(items: &'a [Item], output: &mut Vec<&'a Item>) {
    for item in items {
        if let Item::Mod(module) = item {
            if let Some((_, content)) = &module.content {
                collect_items(content, output);
            }
        }

        output.push(item);
    }
}

fn type_parameters(generics: &syn::Generics) -> Vec<(String, Option<Type>)> {
    generics
        .params
        .iter()
        .filter_map(|parameter| match parameter {
            GenericParam::Type(parameter) => {
                Some((parameter.ident.to_string(), parameter.default.clone()))
            }

            _ => None,
        })
        .collect()
}

/// Argumentos del tipo en `impl<..> Name<..>`, o `None` si el bloque
/// corresponde a otro tipo.
fn impl_bindings(block: &syn::ItemImpl, name: &str) -> Option<Vec<Binding>> {
    let path = match &*block.self_ty {
        Type::Path(path) if path.qself.is_none() => &path.path,
        _ => return None,
    };

    let last = path.segments.last()?;
    if last.ident != name {
        return None;
    }

    let generic_names = type_parameters(&block.generics);
    let arguments = match &last.arguments {
        PathArguments::AngleBracketed(arguments) => arguments
            .args
            .iter()
            .filter_map(|argument| match argument {
                GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .map(|ty| match single_ident(ty) {
                Some(ident) if generic_names.iter().any(|(name, _)| *name == ident) => {
                    Binding::Parameter(ident)
                }

                _ => Binding::Concrete(ty.clone()),
            })
            .collect(),

        _ => Vec::new(),
    };

    Some(arguments)
}

/// Funciones asociadas públicas que retornan el propio tipo.
fn constructors(block: &syn::ItemImpl, name: &str, bindings: Vec<Binding>) -> Vec<BaseConstructor> {
    block
        .items
        .iter()
        .filter_map(|item| match item {
            ImplItem::Fn(function) => Some(function),
            _ => None,
        })
        .filter(|function| {
            matches!(function.vis, Visibility::Public(_))
                && function.sig.receiver().is_none()
                && function.sig.generics.params.is_empty()
                && returns_self(&function.sig.output, name)
        })
        .map(|function| {
            let parameters = function
                .sig
                .inputs
                .iter()
                .enumerate()
                .filter_map(|(index, input)| match input {
                    FnArg::Typed(typed) => {
                        let name = match &*typed.pat {
                            Pat::Ident(pat) => pat.ident.to_string(),
                            _ => format!("arg{}", index),
                        };

                        Some((name, (*typed.ty).clone()))
                    }

                    FnArg::Receiver(_) => None,
                })
                .collect();

            let marked = function.attrs.iter().any(|attribute| {
                attribute
                    .path()
                    .segments
                    .last()
                    .map_or(false, |segment| segment.ident == MARKER)
            });

            BaseConstructor {
                name: function.sig.ident.to_string(),
                parameters,
                docs: doc_lines(&function.attrs),
                marked,
                bindings: bindings.clone(),
            }
        })
        .collect()
}

fn returns_self(output: &ReturnType, name: &str) -> bool {
    match output {
        ReturnType::Type(_, ty) => match &**ty {
            Type::Path(path) => path
                .path
                .segments
                .last()
                .map_or(false, |segment| segment.ident == "Self" || segment.ident == name),

            _ => false,
        },

        ReturnType::Default => false,
    }
}

fn doc_lines(attributes: &[syn::Attribute]) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|attribute| match &attribute.meta {
            Meta::NameValue(meta) if meta.path.is_ident("doc") => match &meta.value {
                Expr::Lit(expr) => match &expr.lit {
                    Lit::Str(doc) => Some(doc.value().trim().to_owned()),
                    _ => None,
                },

                _ => None,
            },

            _ => None,
        })
        .collect()
}

fn single_ident(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.get_ident().map(ToString::to_string),
        _ => None,
    }
}

fn tokens<T: ToTokens>(item: &T) -> String {
    item.to_token_stream().to_string()
}

/// Reemplaza parámetros genéricos por tipos concretos.
struct Substitute<'a>(&'a HashMap<String, Type>);

impl VisitMut for Substitute<'_> {
    fn visit_type_mut(&mut self, ty: &mut Type) {
        if let Some(replacement) = single_ident(ty).and_then(|ident| self.0.get(&ident)) {
            *ty = replacement.clone();
            return;
        }

        visit_mut::visit_type_mut(self, ty);
    }
}

/// Calcula los constructores reenviados de una plantilla.
///
/// Sin `@inherits` no hay reenvío. Un tipo base que no se puede
/// resolver omite el reenvío sin producir diagnósticos.
pub fn forward(document: &DocumentNode, resolver: &dyn BaseTypeResolver) -> Vec<Member> {
    let base = match &document.class.base {
        Some(base) => base.val(),
        None => return Vec::new(),
    };

    let path = match syn::parse_str::<Type>(base) {
        Ok(Type::Path(path)) if path.qself.is_none() => path.path,
        _ => {
            log::debug!("{}: base `{}` is not a type path", document.source, base);
            return Vec::new();
        }
    };

    let last = match path.segments.last() {
        Some(last) => last,
        None => return Vec::new(),
    };

    let name = last.ident.to_string();
    let base_type = match resolver.resolve(&name) {
        Some(base_type) => base_type,
        None => {
            log::debug!("{}: base type `{}` not found, no constructors forwarded", document.source, name);
            return Vec::new();
        }
    };

    let explicit: Vec<Type> = match &last.arguments {
        PathArguments::AngleBracketed(arguments) => arguments
            .args
            .iter()
            .filter_map(|argument| match argument {
                GenericArgument::Type(ty) => Some(ty.clone()),
                _ => None,
            })
            .collect(),

        _ => Vec::new(),
    };

    // Argumentos ausentes toman el valor por omisión del tipo
    let mut arguments = Vec::new();
    for (index, (parameter, default)) in base_type.parameters.iter().enumerate() {
        match explicit.get(index).or(default.as_ref()) {
            Some(argument) => arguments.push((parameter.clone(), argument.clone())),
            None => {
                log::debug!("{}: `{}` requires argument `{}`", document.source, name, parameter);
                return Vec::new();
            }
        }
    }

    base_type
        .constructors
        .iter()
        .filter(|constructor| constructor.marked && constructor.name != "from_base")
        .filter_map(|constructor| {
            let substitutions = bind(&constructor.bindings, &arguments)?;
            let parameters = constructor
                .parameters
                .iter()
                .map(|(name, ty)| {
                    let mut ty = ty.clone();
                    Substitute(&substitutions).visit_type_mut(&mut ty);

                    Parameter {
                        name: name.clone(),
                        ty: tokens(&ty),
                    }
                })
                .collect();

            log::trace!("{}: forwarding `{}::{}`", document.source, name, constructor.name);
            Some(Member::Constructor(Constructor {
                name: constructor.name.clone(),
                parameters,
                base: base.clone(),
                docs: constructor.docs.clone(),
            }))
        })
        .collect()
}

/// Liga los parámetros de un bloque `impl` a los argumentos efectivos.
///
/// Retorna `None` si el bloque exige tipos concretos distintos.
fn bind(bindings: &[Binding], arguments: &[(String, Type)]) -> Option<HashMap<String, Type>> {
    let mut substitutions = HashMap::new();
    for (index, (_, argument)) in arguments.iter().enumerate() {
        match bindings.get(index) {
            Some(Binding::Parameter(parameter)) => {
                substitutions.insert(parameter.clone(), argument.clone());
            }

            Some(Binding::Concrete(ty)) if tokens(ty) != tokens(argument) => return None,
            _ => (),
        }
    }

    Some(substitutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::ClassDeclaration,
        source::{Located, Location, Source},
    };

    fn document(base: Option<&str>) -> DocumentNode {
        let mut class = ClassDeclaration::new(String::from("Page"));
        class.base = base.map(|base| {
            let source = Source::new("Page.stencil", format!("@inherits {}", base));
            Located::at(base.to_owned(), Location::whole(&source))
        });

        DocumentNode {
            source: String::from("Page.stencil"),
            namespace: String::from("templates"),
            uses: Vec::new(),
            class,
            diagnostics: Vec::new(),
        }
    }

    fn forwarded(options: &GlobalOptions, base: Option<&str>) -> Vec<Constructor> {
        forward(&document(base), &AmbientResolver::new(options))
            .into_iter()
            .filter_map(|member| match member {
                Member::Constructor(constructor) => Some(constructor),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn runtime_bases_are_forwarded() {
        let options = GlobalOptions::default();
        let constructors = forwarded(&options, Some("HtmlTemplate<Vec<u8>>"));

        assert_eq!(constructors.len(), 1);
        assert_eq!(constructors[0].name, "new");
        assert_eq!(constructors[0].base, "HtmlTemplate<Vec<u8>>");
        assert_eq!(constructors[0].parameters[0].name, "model");
        assert_eq!(constructors[0].parameters[0].ty, "Vec < u8 >");
        assert!(!constructors[0].docs.is_empty());
    }

    #[test]
    fn resolved_bases_describe_themselves() {
        let resolver = AmbientResolver::new(&GlobalOptions::default());
        let base = resolver.resolve("HtmlTemplate").unwrap();

        assert_eq!(base.parameters.len(), 1);
        assert!(base.constructors.iter().any(|constructor| constructor.marked));

        let debug = format!("{:?}", base);
        assert!(debug.contains("name: \"new\""));
        assert!(debug.contains("Parameter(\"M\")"));
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let constructors = forwarded(&GlobalOptions::default(), Some("PlainTextTemplate"));
        assert_eq!(constructors[0].parameters[0].ty, "()");
    }

    #[test]
    fn nothing_without_inherits_or_resolution() {
        let options = GlobalOptions::default();
        assert!(forwarded(&options, None).is_empty());
        assert!(forwarded(&options, Some("Unknown<u8>")).is_empty());

        let detached = GlobalOptions {
            embed_runtime: false,
            ..GlobalOptions::default()
        };

        assert!(forwarded(&detached, Some("HtmlTemplate<u8>")).is_empty());
    }

    #[test]
    fn only_marked_and_applicable_constructors() {
        let unit = CodeUnit {
            name: String::from("bases"),
            text: String::from(
                r#"
                pub struct Base<T> { value: T }

                impl<T> Base<T> {
                    /// Con valor.
                    #[stencil_runtime::template_constructor]
                    pub fn with(value: T, extra: Option<&'static T>) -> Self { Base { value } }

                    pub fn unmarked(value: T) -> Self { Base { value } }

                    #[template_constructor]
                    pub fn method(&self) -> Self { unimplemented!() }
                }

                impl Base<String> {
                    #[template_constructor]
                    pub fn text(value: &str) -> Base<String> { Base { value: value.into() } }
                }
                "#,
            ),
        };

        let options = GlobalOptions {
            additional_units: vec![unit],
            ..GlobalOptions::default()
        };

        let names = |base| -> Vec<String> {
            forwarded(&options, Some(base))
                .into_iter()
                .map(|constructor| constructor.name)
                .collect()
        };

        assert_eq!(names("Base<u32>"), vec!["with"]);
        assert_eq!(names("crate::bases::Base<String>"), vec!["with", "text"]);

        let with = &forwarded(&options, Some("Base<u32>"))[0];
        assert_eq!(with.parameters[1].ty, "Option < & 'static u32 >");
        assert_eq!(with.docs, vec!["Con valor."]);
    }
}
