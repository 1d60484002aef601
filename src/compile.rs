//! Orquestación de la compilación.
//!
//! [`Compiler`] transforma solicitudes [`TemplateSource`] en unidades de
//! código Rust. Cada archivo atraviesa análisis sintáctico, los pases de
//! [`crate::pass`], reenvío de constructores y generación de código.
//!
//! # Aislamiento
//! La generación de cada archivo corre de forma aislada. Un pánico o
//! error interno se convierte en un único diagnóstico STC9999 ubicado
//! en el archivo, el cual no produce unidad y no afecta a los demás.
//!
//! # Caché
//! Los resultados se guardan por solicitud: ruta, opciones del archivo,
//! texto e importaciones. Recompilar una solicitud idéntica no repite
//! trabajo. Cambiar las opciones globales descarta la caché.

use std::{
    any::Any,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

use anyhow::Context;

use crate::{
    codegen,
    directive::DirectiveTable,
    error::{CompileError, Diagnostic, Diagnostics},
    forward::{self, AmbientResolver, BaseTypeResolver},
    options::{Edition, GlobalOptions, InputFile, TemplateSource},
    parse::parse,
    pass,
    source::{Location, Source},
};

/// Una unidad de código generado.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledUnit {
    /// Nombre de la forma `{namespace}.{Clase}.g.rs`.
    pub name: String,
    pub text: String,
}

/// Resultado de compilar una plantilla.
#[derive(Clone, Debug)]
pub struct FileOutput {
    pub file: InputFile,
    pub unit: Option<CompiledUnit>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resultado de compilar un conjunto de plantillas.
#[derive(Clone, Debug, Default)]
pub struct CompileOutput {
    pub units: Vec<CompiledUnit>,
    pub diagnostics: Diagnostics,
}

/// Compilador de plantillas con caché.
pub struct Compiler {
    options: GlobalOptions,
    table: DirectiveTable,
    resolver: Box<dyn BaseTypeResolver>,
    cache: HashMap<TemplateSource, Rc<FileOutput>>,
}

impl Compiler {
    pub fn new(options: GlobalOptions) -> Self {
        let resolver = Box::new(AmbientResolver::new(&options));
        Compiler::with_resolver(options, resolver)
    }

    /// Construye un compilador con un resolutor de tipos base propio.
    pub fn with_resolver(options: GlobalOptions, resolver: Box<dyn BaseTypeResolver>) -> Self {
        Compiler {
            options,
            table: DirectiveTable::standard(),
            resolver,
            cache: HashMap::new(),
        }
    }

    pub fn options(&self) -> &GlobalOptions {
        &self.options
    }

    /// Reemplaza las opciones globales, descartando la caché si cambian.
    pub fn set_options(&mut self, options: GlobalOptions) {
        if options != self.options {
            log::debug!("Global options changed, discarding {} cached results", self.cache.len());

            self.cache.clear();
            self.resolver = Box::new(AmbientResolver::new(&options));
            self.options = options;
        }
    }

    /// Cantidad de resultados en caché.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Compila un conjunto de plantillas.
    ///
    /// Con una edición inferior a [`Edition::FLOOR`] no se genera
    /// ninguna unidad.
    pub fn compile(&mut self, sources: &[TemplateSource]) -> CompileOutput {
        let mut output = CompileOutput::default();
        if self.options.edition < Edition::FLOOR {
            let error = CompileError::EditionTooOld(self.options.edition);
            output.diagnostics.push(Diagnostic::error(error, None));
            return output;
        }

        for source in sources {
            let result = self.compile_file(source);
            output.diagnostics.extend(result.diagnostics.iter().cloned());
            output.units.extend(result.unit.clone());
        }

        output
    }

    /// Compila una plantilla, reutilizando un resultado previo idéntico.
    pub fn compile_file(&mut self, source: &TemplateSource) -> Rc<FileOutput> {
        if let Some(cached) = self.cache.get(source) {
            log::trace!("{}: reusing cached result", source.file.path);
            return Rc::clone(cached);
        }

        log::debug!("{}: compiling", source.file.path);

        let text = Source::new(source.file.path.clone(), source.text.clone());
        let generated = panic::catch_unwind(AssertUnwindSafe(|| {
            generate(source, &text, &self.options, &self.table, self.resolver.as_ref())
        }));

        let result = match generated {
            Ok(Ok((unit, diagnostics))) => FileOutput {
                file: source.file.clone(),
                unit: Some(unit),
                diagnostics,
            },

            Ok(Err(error)) => internal(source, &text, format!("{:#}", error)),
            Err(payload) => internal(source, &text, panic_message(payload)),
        };

        let result = Rc::new(result);
        self.cache.insert(source.clone(), Rc::clone(&result));

        result
    }
}

fn generate(
    source: &TemplateSource,
    text: &Rc<Source>,
    options: &GlobalOptions,
    table: &DirectiveTable,
    resolver: &dyn BaseTypeResolver,
) -> anyhow::Result<(CompiledUnit, Vec<Diagnostic>)> {
    let imports: Vec<_> = source
        .imports
        .iter()
        .map(|import| parse(&Source::new(import.path.clone(), import.text.clone()), table))
        .collect();

    let tree = parse(text, table);
    let document = pass::build(&source.file, options, table, &imports, &tree);
    let extra = forward::forward(&document, resolver);

    let unit = codegen::emit_unit(&document, &extra)
        .with_context(|| format!("Failed to emit `{}`", source.file.path))?;

    let unit = CompiledUnit {
        name: document.unit_name(),
        text: unit,
    };

    log::debug!(
        "{}: generated `{}` with {} diagnostics",
        source.file.path,
        unit.name,
        document.diagnostics.len()
    );

    Ok((unit, document.diagnostics))
}

fn internal(source: &TemplateSource, text: &Rc<Source>, message: String) -> FileOutput {
    log::error!("{}: internal error: {}", source.file.path, message);

    let error = CompileError::Internal {
        file: source.file.path.clone(),
        message,
    };

    FileOutput {
        file: source.file.clone(),
        unit: None,
        diagnostics: vec![Diagnostic::error(error, Some(Location::whole(text)))],
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => String::from(*message),
            Err(_) => String::from("unknown panic"),
        },
    }
}
