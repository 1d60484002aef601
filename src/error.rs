//! Diagnósticos de compilación.
//!
//! Ningún error de una plantilla detiene al compilador. Cada problema
//! se registra como un [`Diagnostic`] con un código estable, una
//! severidad, un mensaje y, cuando es posible, una ubicación. Los
//! diagnósticos se adjuntan al nodo más pequeño que los contiene y las
//! fases posteriores continúan.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::{options::Edition, source::{Located, Location}};

/// Severidad de un diagnóstico.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Hidden,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Hidden => "hidden",
        })
    }
}

/// Causa de un diagnóstico.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Edition {0} is not supported, generated templates require edition 2018 or later")]
    EditionTooOld(Edition),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("The `model` directive is not supported (found `{0}`), use `@inherits HtmlTemplate<{0}>` instead")]
    ModelDirective(String),

    #[error("Tag helpers are not supported (found `@{0}`)")]
    TagHelpers(&'static str),

    #[error("The `{0}` directive may only appear once per file")]
    DuplicateDirective(&'static str),

    #[error("Malformed `{directive}` directive: {reason}")]
    MalformedDirective {
        directive: &'static str,
        reason: String,
    },

    #[error("The `{0}` directive is only allowed at the top level of a template")]
    NestedDirective(&'static str),

    #[error("Type parameter `{0}` is declared more than once")]
    DuplicateTypeParameter(String),

    #[error("Internal error while generating `{file}`: {message}")]
    Internal { file: String, message: String },
}

impl CompileError {
    /// Código estable del diagnóstico.
    pub fn code(&self) -> &'static str {
        use CompileError::*;

        match self {
            EditionTooOld(_) => "STC0001",
            Syntax(_) => "STC1000",
            ModelDirective(_) => "STC1001",
            TagHelpers(_) => "STC1002",
            DuplicateDirective(_) => "STC1003",
            MalformedDirective { .. } => "STC1004",
            NestedDirective(_) => "STC1005",
            DuplicateTypeParameter(_) => "STC1006",
            Internal { .. } => "STC9999",
        }
    }
}

/// Un diagnóstico emitido por el compilador.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    code: &'static str,
    severity: Severity,
    message: String,
    location: Option<Location>,
}

impl Diagnostic {
    /// Construye un diagnóstico de error.
    pub fn error(error: CompileError, location: Option<Location>) -> Self {
        Diagnostic {
            code: error.code(),
            severity: Severity::Error,
            message: error.to_string(),
            location,
        }
    }

    /// Cambia la severidad.
    pub fn severity(self, severity: Severity) -> Self {
        Diagnostic { severity, ..self }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn level(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Ubicación, ausente para fallos a nivel de archivo.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<Located<CompileError>> for Diagnostic {
    fn from(error: Located<CompileError>) -> Self {
        let (location, error) = error.split();
        Diagnostic::error(error, Some(location))
    }
}

impl Display for Diagnostic {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(fmt, "{}[{}]: {}", self.severity, self.code, self.message)?;

        let location = match &self.location {
            Some(location) => location,
            None => return Ok(()),
        };

        writeln!(fmt, " --> {}", location)?;

        let (start, end) = (location.start(), location.end());
        let digits = end.line.to_string().chars().count();
        writeln!(fmt, "{:digits$} |", "", digits = digits)?;

        location.source().with_line(start.line, |line| {
            writeln!(fmt, "{:>digits$} | {}", start.line, line, digits = digits)
        })?;

        // Solo se subraya la primera línea del rango
        let last = if end.line == start.line {
            end.column.max(start.column + 1)
        } else {
            start.column + 1
        };

        let skip = (start.column - 1) as usize;
        let highlight = (last - start.column) as usize;

        writeln!(
            fmt,
            "{:digits$} | {:skip$}{:^<highlight$}",
            "",
            "",
            "",
            digits = digits,
            skip = skip,
            highlight = highlight
        )
    }
}

/// Colección de diagnósticos de una o más plantillas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Indica si al menos un diagnóstico es un error.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    /// Cantidad de diagnósticos de error.
    pub fn error_count(&self) -> usize {
        self.0.iter().filter(|diagnostic| diagnostic.is_error()).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Diagnostics(iter.into_iter().collect())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diagnostic in &self.0 {
            if diagnostic.level() != Severity::Hidden {
                writeln!(fmt, "{}", diagnostic)?;
            }
        }

        match self.error_count() {
            0 => Ok(()),
            1 => writeln!(fmt, "Compilation failed with 1 error"),
            count => writeln!(fmt, "Compilation failed with {} errors", count),
        }
    }
}
