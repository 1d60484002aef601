//! Tabla de directivas.
//!
//! Una directiva es una instrucción declarativa dentro de una plantilla,
//! de la forma `@palabra tokens...`. Cada directiva define una gramática
//! de tokens, un tipo de cuerpo y una política de uso. La tabla por
//! omisión registra las directivas en el mismo orden en que corren sus
//! pases; ver [`crate::pass`].

use std::fmt::{self, Display};

use thiserror::Error;

/// Error al registrar directivas.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveTableError {
    #[error("Directive `{0}` is already registered")]
    Duplicate(&'static str),
}

/// Forma del cuerpo de una directiva.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// Solo tokens, hasta el final de la línea.
    SingleLine,

    /// Tokens seguidos de un bloque de código Rust `{ ... }`.
    CodeBlock,

    /// Tokens seguidos de un bloque de markup `{ ... }`.
    MarkupBlock,
}

/// Política de ocurrencias.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Usage {
    /// Sin restricciones.
    Unrestricted,

    /// A lo sumo una vez por archivo; ocurrencias adicionales son un error.
    FileScopedSinglyOccurring,

    /// Cualquier cantidad de veces por archivo.
    FileScopedMultipleOccurring,
}

/// Clase de token en la gramática de una directiva.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Un tipo Rust, como `HtmlTemplate<Vec<u8>>`.
    Type,

    /// Un identificador.
    Member,

    /// Segmentos separados por `.` o `::`.
    Namespace,

    /// Una cadena entre comillas dobles.
    String,

    /// `true` o `false`.
    Boolean,

    /// Un atributo Rust `#[...]`.
    Attribute,

    /// Una cláusula `where ...` que abarca el resto de la línea.
    Constraint,

    /// Texto arbitrario que abarca el resto de la línea.
    Text,
}

impl Display for TokenKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(match self {
            TokenKind::Type => "a type",
            TokenKind::Member => "an identifier",
            TokenKind::Namespace => "a namespace",
            TokenKind::String => "a string literal",
            TokenKind::Boolean => "`true` or `false`",
            TokenKind::Attribute => "an attribute",
            TokenKind::Constraint => "a `where` clause",
            TokenKind::Text => "text",
        })
    }
}

/// Un token esperado por una directiva.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenSpec {
    pub kind: TokenKind,
    pub optional: bool,
}

impl TokenSpec {
    pub const fn required(kind: TokenKind) -> Self {
        TokenSpec {
            kind,
            optional: false,
        }
    }

    pub const fn optional(kind: TokenKind) -> Self {
        TokenSpec {
            kind,
            optional: true,
        }
    }
}

/// Descriptor de una directiva.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Directive {
    pub keyword: &'static str,
    pub kind: DirectiveKind,
    pub tokens: Vec<TokenSpec>,
    pub usage: Usage,
}

impl Directive {
    pub fn new(keyword: &'static str, kind: DirectiveKind, usage: Usage) -> Self {
        Directive {
            keyword,
            kind,
            tokens: Vec::new(),
            usage,
        }
    }

    /// Agrega un token a la gramática.
    pub fn token(mut self, token: TokenSpec) -> Self {
        self.tokens.push(token);
        self
    }
}

pub const MODEL: &str = "model";
pub const ADD_TAG_HELPER: &str = "addTagHelper";
pub const REMOVE_TAG_HELPER: &str = "removeTagHelper";
pub const TAG_HELPER_PREFIX: &str = "tagHelperPrefix";
pub const NAMESPACE: &str = "namespace";
pub const USE: &str = "use";
pub const INHERITS: &str = "inherits";
pub const TYPEPARAM: &str = "typeparam";
pub const FUNCTIONS: &str = "functions";
pub const SECTION: &str = "section";

/// Conjunto ordenado de directivas con palabras clave únicas.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DirectiveTable {
    directives: Vec<Directive>,
}

impl DirectiveTable {
    /// Tabla vacía.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una directiva, rechazando palabras clave repetidas.
    pub fn register(&mut self, directive: Directive) -> Result<(), DirectiveTableError> {
        if self.get(directive.keyword).is_some() {
            return Err(DirectiveTableError::Duplicate(directive.keyword));
        }

        self.directives.push(directive);
        Ok(())
    }

    /// Busca una directiva. Las palabras clave distinguen mayúsculas.
    pub fn get(&self, keyword: &str) -> Option<&Directive> {
        self.directives
            .iter()
            .find(|directive| directive.keyword == keyword)
    }

    /// Directivas en orden de registro.
    pub fn iter(&self) -> impl Iterator<Item = &Directive> {
        self.directives.iter()
    }

    /// Tabla con las directivas que reconoce el compilador.
    pub fn standard() -> Self {
        use {DirectiveKind::*, TokenKind::*, Usage::*};

        let directives = vec![
            Directive::new(MODEL, SingleLine, FileScopedSinglyOccurring)
                .token(TokenSpec::required(Type)),
            Directive::new(ADD_TAG_HELPER, SingleLine, Unrestricted)
                .token(TokenSpec::required(Text)),
            Directive::new(REMOVE_TAG_HELPER, SingleLine, Unrestricted)
                .token(TokenSpec::required(Text)),
            Directive::new(TAG_HELPER_PREFIX, SingleLine, FileScopedSinglyOccurring)
                .token(TokenSpec::required(Text)),
            Directive::new(NAMESPACE, SingleLine, FileScopedSinglyOccurring)
                .token(TokenSpec::required(Namespace)),
            Directive::new(USE, SingleLine, Unrestricted).token(TokenSpec::required(Text)),
            Directive::new(INHERITS, SingleLine, FileScopedSinglyOccurring)
                .token(TokenSpec::required(Type)),
            Directive::new(TYPEPARAM, SingleLine, FileScopedMultipleOccurring)
                .token(TokenSpec::required(Member))
                .token(TokenSpec::optional(Constraint)),
            Directive::new(FUNCTIONS, CodeBlock, FileScopedMultipleOccurring),
            Directive::new(SECTION, MarkupBlock, Unrestricted).token(TokenSpec::required(Member)),
        ];

        let mut table = DirectiveTable::new();
        for directive in directives {
            // Las palabras clave de la tabla estándar son distintas entre sí
            if let Err(error) = table.register(directive) {
                log::error!("{}", error);
            }
        }

        table
    }
}
