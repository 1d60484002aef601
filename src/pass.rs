//! Construcción de la representación intermedia.
//!
//! Un documento se construye aplicando [`PIPELINE`], una secuencia
//! ordenada de pases con nombre. Cada pase declara las directivas que
//! lee y los pases que deben precederle; [`validate_pipeline`] verifica
//! que el orden respete esas dependencias y que toda directiva leída
//! exista en la tabla.
//!
//! Antes de los pases se aplica la política de uso de cada directiva.
//! Una directiva de ocurrencia única que se repite dentro de un mismo
//! archivo produce un diagnóstico en la segunda ocurrencia, la cual
//! se ignora. Las directivas con diagnósticos propios también se
//! ignoran. Las importaciones se consideran antes que el archivo, por
//! lo que en directivas donde "la última gana" el archivo tiene
//! precedencia.

use std::collections::HashSet;

use thiserror::Error;

use crate::{
    directive::{self, DirectiveTable, TokenKind, Usage},
    error::{CompileError, Diagnostic},
    ir::{
        ClassDeclaration, ClassModifiers, DocumentNode, Member, MethodModifiers, TypeParameter,
        DEFAULT_NAMESPACE,
    },
    lower::lower,
    options::{sanitize_identifier, Accessibility, GlobalOptions, InputFile},
    parse::{namespace_segments, DirectiveBody, DirectiveNode, SyntaxTree},
    source::{Located, Location},
};

/// Error de configuración de la secuencia de pases.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Pass `{0}` appears more than once")]
    Duplicate(&'static str),

    #[error("Pass `{pass}` must run after `{dependency}`, which does not precede it")]
    OutOfOrder {
        pass: &'static str,
        dependency: &'static str,
    },

    #[error("Pass `{pass}` reads `{directive}`, which is not a registered directive")]
    UnknownDirective {
        pass: &'static str,
        directive: &'static str,
    },
}

/// Un pase de construcción.
pub struct Pass {
    pub name: &'static str,

    /// Directivas que consulta el pase.
    pub reads: &'static [&'static str],

    /// Pases que deben ejecutarse antes.
    pub after: &'static [&'static str],

    run: fn(&mut PassContext<'_>),
}

/// Secuencia de pases, en orden de ejecución.
pub const PIPELINE: &[Pass] = &[
    Pass {
        name: "reject-model",
        reads: &[directive::MODEL],
        after: &[],
        run: reject_model,
    },
    Pass {
        name: "reject-tag-helpers",
        reads: &[
            directive::ADD_TAG_HELPER,
            directive::REMOVE_TAG_HELPER,
            directive::TAG_HELPER_PREFIX,
        ],
        after: &[],
        run: reject_tag_helpers,
    },
    Pass {
        name: "namespace",
        reads: &[directive::NAMESPACE],
        after: &[],
        run: namespace,
    },
    Pass {
        name: "use",
        reads: &[directive::USE],
        after: &["namespace"],
        run: use_items,
    },
    Pass {
        name: "inherits",
        reads: &[directive::INHERITS],
        after: &[],
        run: inherits,
    },
    Pass {
        name: "typeparam",
        reads: &[directive::TYPEPARAM],
        after: &[],
        run: typeparam,
    },
    Pass {
        name: "functions",
        reads: &[directive::FUNCTIONS],
        after: &[],
        run: functions,
    },
    Pass {
        name: "class-configuration",
        reads: &[],
        after: &["inherits", "typeparam", "functions"],
        run: class_configuration,
    },
    Pass {
        name: "body",
        reads: &[directive::SECTION],
        after: &["class-configuration"],
        run: body,
    },
];

/// Verifica que cada pase aparezca una vez, después de sus dependencias,
/// y que solo lea directivas registradas en `table`.
pub fn validate_pipeline(pipeline: &[Pass], table: &DirectiveTable) -> Result<(), PipelineError> {
    let mut seen = HashSet::new();
    for pass in pipeline {
        if let Some(directive) = pass.reads.iter().copied().find(|name| table.get(name).is_none()) {
            return Err(PipelineError::UnknownDirective {
                pass: pass.name,
                directive,
            });
        }

        if let Some(dependency) = pass.after.iter().copied().find(|name| !seen.contains(name)) {
            return Err(PipelineError::OutOfOrder {
                pass: pass.name,
                dependency,
            });
        }

        if !seen.insert(pass.name) {
            return Err(PipelineError::Duplicate(pass.name));
        }
    }

    Ok(())
}

/// Construye el documento de una plantilla.
///
/// `imports` debe estar ordenado de la importación más externa a la más
/// interna.
pub fn build(
    file: &InputFile,
    options: &GlobalOptions,
    table: &DirectiveTable,
    imports: &[SyntaxTree],
    tree: &SyntaxTree,
) -> DocumentNode {
    debug_assert_eq!(validate_pipeline(PIPELINE, table), Ok(()));

    let mut cx = PassContext::new(file, options, table, imports, tree);
    for pass in PIPELINE {
        log::trace!("{}: running pass `{}` (reads {:?})", file.path, pass.name, pass.reads);
        (pass.run)(&mut cx);
    }

    cx.document
}

/// Una ocurrencia efectiva de una directiva.
struct Occurrence<'a> {
    location: &'a Location,
    node: &'a DirectiveNode,
}

impl Occurrence<'_> {
    fn token(&self, kind: TokenKind) -> Option<&str> {
        self.node.token(kind).map(|token| token.val().text.as_str())
    }
}

/// Estado compartido por los pases.
struct PassContext<'a> {
    file: &'a InputFile,
    options: &'a GlobalOptions,
    tree: &'a SyntaxTree,
    occurrences: Vec<Occurrence<'a>>,
    document: DocumentNode,
}

impl<'a> PassContext<'a> {
    fn new(
        file: &'a InputFile,
        options: &'a GlobalOptions,
        table: &DirectiveTable,
        imports: &'a [SyntaxTree],
        tree: &'a SyntaxTree,
    ) -> Self {
        let mut diagnostics = Vec::new();
        let mut occurrences = Vec::new();

        for source in imports.iter().chain(std::iter::once(tree)) {
            diagnostics.extend(source.all_diagnostics());

            let mut seen = HashSet::new();
            for (location, node) in source.directives() {
                if node.has_diagnostics() {
                    continue;
                }

                let usage = table.get(node.keyword).map(|directive| directive.usage);
                if usage == Some(Usage::FileScopedSinglyOccurring) && !seen.insert(node.keyword) {
                    let error = CompileError::DuplicateDirective(node.keyword);
                    diagnostics.push(Diagnostic::error(error, Some(location.clone())));
                    continue;
                }

                occurrences.push(Occurrence { location, node });
            }
        }

        let document = DocumentNode {
            source: file.path.clone(),
            namespace: String::from(DEFAULT_NAMESPACE),
            uses: Vec::new(),
            class: ClassDeclaration::new(file.class_name()),
            diagnostics,
        };

        PassContext {
            file,
            options,
            tree,
            occurrences,
            document,
        }
    }

    fn occurrences(&self, keyword: &str) -> impl Iterator<Item = &Occurrence<'a>> {
        let keyword = keyword.to_owned();
        self.occurrences
            .iter()
            .filter(move |occurrence| occurrence.node.keyword == keyword)
    }

    fn error(&mut self, error: CompileError, location: &Location) {
        self.document
            .diagnostics
            .push(Diagnostic::error(error, Some(location.clone())));
    }
}

fn reject_model(cx: &mut PassContext<'_>) {
    let found: Vec<_> = cx
        .occurrences(directive::MODEL)
        .map(|occurrence| {
            let model = occurrence.token(TokenKind::Type).unwrap_or_default().to_owned();
            (CompileError::ModelDirective(model), occurrence.location)
        })
        .collect();

    for (error, location) in found {
        cx.error(error, location);
    }
}

fn reject_tag_helpers(cx: &mut PassContext<'_>) {
    let keywords = [
        directive::ADD_TAG_HELPER,
        directive::REMOVE_TAG_HELPER,
        directive::TAG_HELPER_PREFIX,
    ];

    let found: Vec<_> = cx
        .occurrences
        .iter()
        .filter(|occurrence| keywords.contains(&occurrence.node.keyword))
        .map(|occurrence| {
            let error = CompileError::TagHelpers(occurrence.node.keyword);
            (error, occurrence.location)
        })
        .collect();

    for (error, location) in found {
        cx.error(error, location);
    }
}

/// La última declaración gana; después la sugerencia y por último
/// [`DEFAULT_NAMESPACE`].
fn namespace(cx: &mut PassContext<'_>) {
    let declared = cx
        .occurrences(directive::NAMESPACE)
        .last()
        .and_then(|occurrence| occurrence.token(TokenKind::Namespace))
        .map(str::to_owned);

    let namespace = declared
        .or_else(|| cx.file.namespace_hint.clone())
        .map(|namespace| {
            namespace_segments(&namespace)
                .filter(|segment| !segment.is_empty())
                .map(sanitize_identifier)
                .collect::<Vec<_>>()
                .join(".")
        })
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or_else(|| String::from(DEFAULT_NAMESPACE));

    log::debug!("{}: namespace `{}`", cx.file.path, namespace);
    cx.document.namespace = namespace;
}

fn use_items(cx: &mut PassContext<'_>) {
    let mut uses = Vec::new();
    let mut errors = Vec::new();

    for occurrence in cx.occurrences(directive::USE) {
        let item = occurrence.token(TokenKind::Text).unwrap_or_default();
        match syn::parse_str::<syn::UseTree>(item) {
            Ok(_) => uses.push(Located::at(item.to_owned(), occurrence.location.clone())),
            Err(_) => {
                let error = CompileError::MalformedDirective {
                    directive: directive::USE,
                    reason: format!("`{}` is not a valid use tree", item),
                };

                errors.push((error, occurrence.location));
            }
        }
    }

    for (error, location) in errors {
        cx.error(error, location);
    }

    cx.document.uses = uses;
}

fn inherits(cx: &mut PassContext<'_>) {
    let base = cx.occurrences(directive::INHERITS).last().and_then(|occurrence| {
        let base = occurrence.token(TokenKind::Type)?;
        Some(Located::at(base.to_owned(), occurrence.location.clone()))
    });

    if let Some(base) = &base {
        log::debug!("{}: inherits `{}`", cx.file.path, base.val());
    }

    cx.document.class.base = base;
}

fn typeparam(cx: &mut PassContext<'_>) {
    let mut parameters: Vec<TypeParameter> = Vec::new();
    let mut errors = Vec::new();

    for occurrence in cx.occurrences(directive::TYPEPARAM) {
        let name = occurrence.token(TokenKind::Member).unwrap_or_default();
        if parameters.iter().any(|parameter| parameter.name == name) {
            let error = CompileError::DuplicateTypeParameter(name.to_owned());
            errors.push((error, occurrence.location));
            continue;
        }

        parameters.push(TypeParameter {
            name: name.to_owned(),
            constraint: occurrence.token(TokenKind::Constraint).map(str::to_owned),
        });
    }

    for (error, location) in errors {
        cx.error(error, location);
    }

    cx.document.class.type_parameters.extend(parameters);
}

fn functions(cx: &mut PassContext<'_>) {
    let members: Vec<_> = cx
        .occurrences(directive::FUNCTIONS)
        .filter_map(|occurrence| match &occurrence.node.body {
            Some(DirectiveBody::Code(code)) => Some(Member::Functions(code.clone())),
            _ => None,
        })
        .collect();

    cx.document.class.members.extend(members);
}

/// Nombre, visibilidad y modificadores de la clase.
///
/// El nombre siempre proviene del archivo, nunca de una directiva.
fn class_configuration(cx: &mut PassContext<'_>) {
    let accessibility = cx
        .file
        .accessibility
        .or(cx.options.default_accessibility)
        .unwrap_or(Accessibility::Internal);

    let visibility = match accessibility {
        Accessibility::Public => ClassModifiers::PUBLIC,
        Accessibility::Internal => ClassModifiers::INTERNAL,
    };

    let class = &mut cx.document.class;
    class.name = cx.file.class_name();
    class.modifiers = visibility | ClassModifiers::PARTIAL;
    class.execute.modifiers = MethodModifiers::OVERRIDE | MethodModifiers::ASYNC;
}

fn body(cx: &mut PassContext<'_>) {
    cx.document.class.execute.body = lower(cx.tree.nodes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parse::parse, source::Source};

    fn document(file: InputFile, imports: &[&str], text: &str) -> DocumentNode {
        let table = DirectiveTable::standard();
        let imports: Vec<_> = imports
            .iter()
            .map(|text| parse(&Source::new("_imports.stencil", *text), &table))
            .collect();

        let tree = parse(&Source::new(file.path.clone(), text), &table);
        build(&file, &GlobalOptions::default(), &table, &imports, &tree)
    }

    fn codes(document: &DocumentNode) -> Vec<&'static str> {
        document.diagnostics.iter().map(Diagnostic::code).collect()
    }

    #[test]
    fn pipeline_is_ordered() {
        let table = DirectiveTable::standard();
        assert_eq!(validate_pipeline(PIPELINE, &table), Ok(()));

        let reversed = [
            Pass {
                name: "b",
                reads: &[],
                after: &["a"],
                run: body,
            },
            Pass {
                name: "a",
                reads: &[],
                after: &[],
                run: body,
            },
        ];

        assert_eq!(
            validate_pipeline(&reversed, &table),
            Err(PipelineError::OutOfOrder {
                pass: "b",
                dependency: "a"
            })
        );

        let unknown = [Pass {
            name: "layout",
            reads: &["layout"],
            after: &[],
            run: body,
        }];

        assert_eq!(
            validate_pipeline(&unknown, &table),
            Err(PipelineError::UnknownDirective {
                pass: "layout",
                directive: "layout"
            })
        );
    }

    #[test]
    fn namespace_resolution() {
        let hinted = InputFile::new("views/Index.stencil").with_root_namespace("app");
        assert_eq!(document(hinted.clone(), &[], "").namespace, "app.views");
        assert_eq!(document(InputFile::new("Index.stencil"), &[], "").namespace, DEFAULT_NAMESPACE);

        let imported = document(hinted.clone(), &["@namespace site.shared\n"], "<p>hi</p>");
        assert_eq!(imported.namespace, "site.shared");

        let declared = document(hinted, &["@namespace site.shared\n"], "@namespace site::pages\n");
        assert_eq!(declared.namespace, "site.pages");
    }

    #[test]
    fn file_directives_override_imports() {
        let doc = document(
            InputFile::new("Page.stencil"),
            &["@use crate::models::*\n@inherits PlainTextTemplate\n"],
            "@use std::fmt::Write\n@inherits HtmlTemplate<String>\n",
        );

        let uses: Vec<_> = doc.uses.iter().map(|item| item.val().as_str()).collect();
        assert_eq!(uses, vec!["crate::models::*", "std::fmt::Write"]);
        assert_eq!(doc.class.base_type(), "HtmlTemplate<String>");
        assert!(doc.diagnostics.is_empty());
    }

    #[test]
    fn duplicate_singly_occurring_directive() {
        let doc = document(
            InputFile::new("Page.stencil"),
            &[],
            "@inherits HtmlTemplate<u8>\n@inherits PlainTextTemplate\n",
        );

        assert_eq!(codes(&doc), vec!["STC1003"]);
        assert_eq!(doc.class.base_type(), "HtmlTemplate<u8>");
    }

    #[test]
    fn rejected_directives() {
        let doc = document(
            InputFile::new("Page.stencil"),
            &[],
            "@model User\n@addTagHelper *, Foo\n@tagHelperPrefix th:\n",
        );

        assert_eq!(codes(&doc), vec!["STC1001", "STC1002", "STC1002"]);
    }

    #[test]
    fn type_parameters() {
        let doc = document(
            InputFile::new("List.stencil"),
            &[],
            "@typeparam T where T: Display\n@typeparam U\n@typeparam T\n",
        );

        assert_eq!(codes(&doc), vec!["STC1006"]);
        assert_eq!(doc.class.generics(), "<T, U>");
        assert_eq!(doc.class.where_clause(), " where T: Display");
    }

    #[test]
    fn class_configuration_from_file() {
        let file = InputFile::new("my-page.stencil").with_accessibility(Accessibility::Public);
        let doc = document(file, &[], "@functions { fn f() {} }\n<p>@x</p>");

        assert_eq!(doc.class.name, "my_page");
        assert_eq!(doc.class.modifiers, ClassModifiers::PUBLIC | ClassModifiers::PARTIAL);
        assert_eq!(
            doc.class.execute.modifiers,
            MethodModifiers::OVERRIDE | MethodModifiers::ASYNC
        );

        assert_eq!(doc.class.members.len(), 1);
        assert_eq!(doc.class.execute.body.len(), 3);

        let internal = document(InputFile::new("a.stencil"), &[], "");
        assert!(internal.class.modifiers.contains(ClassModifiers::INTERNAL));
    }

    #[test]
    fn malformed_use_items() {
        let doc = document(InputFile::new("a.stencil"), &[], "@use crate::{\n");
        assert_eq!(codes(&doc), vec!["STC1004"]);
        assert!(doc.uses.is_empty());
    }
}
