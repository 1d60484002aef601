//! Entradas y configuración del compilador.
//!
//! Todas las estructuras de este módulo tienen igualdad estructural,
//! lo cual permite detectar recompilaciones sin cambios. Ver
//! [`crate::compile::Compiler`].

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use thiserror::Error;

use crate::lex::{is_ident_continue, is_ident_start};

/// Error al interpretar una opción.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("Unknown accessibility `{0}`, expected `public` or `internal`")]
    Accessibility(String),

    #[error("Unknown edition `{0}`, expected 2015, 2018 or 2021")]
    Edition(String),
}

/// Visibilidad de la plantilla generada.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Accessibility {
    /// `pub`
    Public,

    /// `pub(crate)`
    Internal,
}

impl Display for Accessibility {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Accessibility::Public => "public",
            Accessibility::Internal => "internal",
        })
    }
}

impl FromStr for Accessibility {
    type Err = OptionError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "public" | "pub" => Ok(Accessibility::Public),
            "internal" | "crate" => Ok(Accessibility::Internal),
            _ => Err(OptionError::Accessibility(string.to_owned())),
        }
    }
}

/// Edición de Rust del crate que consume el código generado.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Edition {
    E2015,
    E2018,
    E2021,
}

impl Edition {
    /// Edición mínima capaz de compilar el código generado.
    pub const FLOOR: Edition = Edition::E2018;
}

impl Default for Edition {
    fn default() -> Self {
        Edition::E2021
    }
}

impl Display for Edition {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Edition::E2015 => "2015",
            Edition::E2018 => "2018",
            Edition::E2021 => "2021",
        })
    }
}

impl FromStr for Edition {
    type Err = OptionError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string {
            "2015" => Ok(Edition::E2015),
            "2018" => Ok(Edition::E2018),
            "2021" => Ok(Edition::E2021),
            _ => Err(OptionError::Edition(string.to_owned())),
        }
    }
}

/// Una unidad de código Rust siempre visible para el compilador.
///
/// Se usa exclusivamente para resolver constructores de tipos base.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CodeUnit {
    pub name: String,
    pub text: String,
}

/// Configuración global del compilador.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlobalOptions {
    pub edition: Edition,

    /// Considera los tipos base del runtime al reenviar constructores.
    pub embed_runtime: bool,

    /// Visibilidad por omisión de las plantillas.
    pub default_accessibility: Option<Accessibility>,

    pub additional_units: Vec<CodeUnit>,
}

impl Default for GlobalOptions {
    fn default() -> Self {
        GlobalOptions {
            edition: Edition::default(),
            embed_runtime: true,
            default_accessibility: None,
            additional_units: Vec::new(),
        }
    }
}

/// Identidad de una plantilla.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputFile {
    /// Ruta relativa, con `/` como separador.
    pub path: String,

    /// Espacio de nombres sugerido por quien invoca al compilador.
    pub namespace_hint: Option<String>,

    /// Visibilidad específica para este archivo.
    pub accessibility: Option<Accessibility>,
}

impl InputFile {
    pub fn new<P: Into<String>>(path: P) -> Self {
        InputFile {
            path: path.into().replace('\\', "/"),
            namespace_hint: None,
            accessibility: None,
        }
    }

    /// Sugiere el espacio de nombres a partir de un nombre raíz y los
    /// directorios de la ruta.
    pub fn with_root_namespace(mut self, root: &str) -> Self {
        self.namespace_hint = Some(compute_namespace(root, &self.path));
        self
    }

    pub fn with_namespace_hint<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace_hint = Some(namespace.into());
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = Some(accessibility);
        self
    }

    /// Nombre de archivo sin directorios ni extensión.
    pub fn stem(&self) -> &str {
        let name = self.path.rsplit('/').next().unwrap_or(&self.path);
        match name.find('.') {
            Some(0) | None => name,
            Some(dot) => &name[..dot],
        }
    }

    /// Nombre de la estructura generada.
    ///
    /// Se deriva del nombre de archivo; todo carácter que no puede
    /// formar parte de un identificador se reemplaza por `_`.
    pub fn class_name(&self) -> String {
        sanitize_identifier(self.stem())
    }
}

/// Una plantilla de importación de algún directorio ancestro.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImportSource {
    pub path: String,
    pub text: String,
}

/// Una solicitud de compilación.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplateSource {
    pub file: InputFile,
    pub text: String,

    /// Importaciones, de la más externa a la más interna.
    pub imports: Vec<ImportSource>,
}

impl TemplateSource {
    pub fn new<T: Into<String>>(file: InputFile, text: T) -> Self {
        TemplateSource {
            file,
            text: text.into(),
            imports: Vec::new(),
        }
    }

    pub fn with_import<P: Into<String>, T: Into<String>>(mut self, path: P, text: T) -> Self {
        self.imports.push(ImportSource {
            path: path.into(),
            text: text.into(),
        });

        self
    }
}

/// Convierte un texto arbitrario en un identificador válido.
pub fn sanitize_identifier(name: &str) -> String {
    let mut identifier: String = name
        .chars()
        .map(|c| if is_ident_continue(c) { c } else { '_' })
        .collect();

    match identifier.chars().next() {
        Some(c) if is_ident_start(c) => (),
        _ => identifier.insert(0, '_'),
    }

    if syn::parse_str::<syn::Ident>(&identifier).is_err() {
        // Palabra reservada
        identifier.push('_');
    }

    identifier
}

/// Calcula un espacio de nombres a partir de una raíz y una ruta.
///
/// Cada directorio de la ruta contribuye un segmento saneado:
/// `("app", "views/home-page/Index.stencil")` produce `app.views.home_page`.
pub fn compute_namespace(root: &str, path: &str) -> String {
    let path = path.replace('\\', "/");
    let directories = path.split('/').rev().skip(1).collect::<Vec<_>>();

    std::iter::once(root)
        .filter(|root| !root.is_empty())
        .map(str::to_owned)
        .chain(
            directories
                .into_iter()
                .rev()
                .filter(|segment| !segment.is_empty() && *segment != ".")
                .map(sanitize_identifier),
        )
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_names_are_sanitized() {
        assert_eq!(InputFile::new("views/Index.stencil").class_name(), "Index");
        assert_eq!(InputFile::new("my-page.html.stencil").class_name(), "my_page");
        assert_eq!(InputFile::new("3col.stencil").class_name(), "_3col");
        assert_eq!(InputFile::new("_Layout.stencil").class_name(), "_Layout");
        assert_eq!(InputFile::new("match.stencil").class_name(), "match_");
    }

    #[test]
    fn namespaces_follow_directories() {
        assert_eq!(compute_namespace("app", "views/home-page/Index.stencil"), "app.views.home_page");
        assert_eq!(compute_namespace("", "Index.stencil"), "");
        assert_eq!(compute_namespace("app", "Index.stencil"), "app");
    }

    #[test]
    fn structural_equality() {
        let a = InputFile::new("a\\b.stencil").with_accessibility(Accessibility::Public);
        let b = InputFile::new("a/b.stencil").with_accessibility(Accessibility::Public);

        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_namespace_hint("x"));
        assert!(Edition::E2015 < Edition::FLOOR);
        assert_eq!("crate".parse::<Accessibility>(), Ok(Accessibility::Internal));
    }
}
