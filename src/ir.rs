//! Representación intermedia.
//!
//! Un [`DocumentNode`] describe por completo la estructura que el
//! generador de código debe emitir para una plantilla: espacio de
//! nombres, ítems `use` y una declaración de clase con su método de
//! ejecución. Los pases de [`crate::pass`] construyen este documento a
//! partir del árbol sintáctico.

use bitflags::bitflags;

use crate::{error::Diagnostic, source::Located};

/// Espacio de nombres de último recurso.
pub const DEFAULT_NAMESPACE: &str = "templates";

/// Tipo base de una plantilla sin `@inherits`.
pub const DEFAULT_BASE: &str = "HtmlTemplate";

bitflags! {
    /// Modificadores de una declaración de clase.
    pub struct ClassModifiers: u8 {
        const PUBLIC = 1 << 0;
        const INTERNAL = 1 << 1;
        const PARTIAL = 1 << 2;
    }
}

bitflags! {
    /// Modificadores del método de ejecución.
    pub struct MethodModifiers: u8 {
        const PROTECTED = 1 << 0;
        const OVERRIDE = 1 << 1;
        const ASYNC = 1 << 2;
    }
}

impl ClassModifiers {
    /// Visibilidad Rust correspondiente.
    pub fn visibility(&self) -> &'static str {
        if self.contains(ClassModifiers::PUBLIC) {
            "pub"
        } else {
            "pub(crate)"
        }
    }
}

/// Documento de una plantilla.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentNode {
    /// Ruta de la plantilla de origen.
    pub source: String,

    /// Segmentos separados por `.`.
    pub namespace: String,

    pub uses: Vec<Located<String>>,
    pub class: ClassDeclaration,
    pub diagnostics: Vec<Diagnostic>,
}

impl DocumentNode {
    pub fn namespace_segments(&self) -> impl Iterator<Item = &str> {
        self.namespace.split('.').filter(|segment| !segment.is_empty())
    }

    /// Nombre de la unidad de compilación.
    pub fn unit_name(&self) -> String {
        format!("{}.{}.g.rs", self.namespace, self.class.name)
    }
}

/// Declaración de la estructura generada.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassDeclaration {
    pub name: String,

    /// Tipo base explícito, si existe `@inherits`.
    pub base: Option<Located<String>>,

    pub modifiers: ClassModifiers,
    pub type_parameters: Vec<TypeParameter>,
    pub members: Vec<Member>,
    pub execute: ExecuteMethod,
}

impl ClassDeclaration {
    pub fn new(name: String) -> Self {
        ClassDeclaration {
            name,
            base: None,
            modifiers: ClassModifiers::empty(),
            type_parameters: Vec::new(),
            members: Vec::new(),
            execute: ExecuteMethod {
                modifiers: MethodModifiers::empty(),
                body: Vec::new(),
            },
        }
    }

    /// Tipo base efectivo.
    pub fn base_type(&self) -> &str {
        self.base
            .as_ref()
            .map_or(DEFAULT_BASE, |base| base.val().as_str())
    }

    /// Parámetros genéricos, como `<T, U>`, o una cadena vacía.
    pub fn generics(&self) -> String {
        if self.type_parameters.is_empty() {
            return String::new();
        }

        let names: Vec<_> = self
            .type_parameters
            .iter()
            .map(|parameter| parameter.name.as_str())
            .collect();

        format!("<{}>", names.join(", "))
    }

    /// Cláusula `where` combinada, o una cadena vacía.
    pub fn where_clause(&self) -> String {
        let predicates: Vec<_> = self
            .type_parameters
            .iter()
            .filter_map(|parameter| parameter.constraint.as_deref())
            .map(|constraint| constraint.trim_start_matches("where").trim())
            .filter(|predicate| !predicate.is_empty())
            .collect();

        if predicates.is_empty() {
            String::new()
        } else {
            format!(" where {}", predicates.join(", "))
        }
    }
}

/// Parámetro genérico declarado con `@typeparam`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParameter {
    pub name: String,

    /// Cláusula `where` completa.
    pub constraint: Option<String>,
}

/// Miembro adicional de la estructura.
#[derive(Clone, Debug, PartialEq)]
pub enum Member {
    /// Contenido de un bloque `@functions`.
    Functions(Located<String>),

    /// Constructor reenviado desde el tipo base.
    Constructor(Constructor),
}

/// Constructor que construye la base mediante un constructor marcado.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constructor {
    pub name: String,
    pub parameters: Vec<Parameter>,

    /// Ruta del tipo base, con argumentos genéricos.
    pub base: String,

    /// Líneas de documentación copiadas del constructor original.
    pub docs: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: String,
}

/// Método de ejecución de la plantilla.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecuteMethod {
    pub modifiers: MethodModifiers,
    pub body: Vec<Located<Statement>>,
}

/// Una instrucción del cuerpo de ejecución.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Texto que se escribe sin codificar.
    WriteLiteral(String),

    /// Expresión cuyo valor se escribe según el tipo de contenido.
    WriteExpression(String),

    /// Sentencias Rust copiadas tal cual.
    Code(String),

    /// Control de flujo; cada rama conserva su encabezado Rust.
    Block(Vec<BlockBranch>),

    Match {
        scrutinee: String,
        arms: Vec<MatchArm>,
    },

    BeginAttribute {
        name: String,
        prefix: String,
        suffix: String,
        count: usize,
    },

    AttributeValue {
        prefix: String,
        value: AttributeValue,
    },

    EndAttribute,

    DefineSection {
        name: String,
        body: Vec<Located<Statement>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockBranch {
    pub header: String,
    pub body: Vec<Located<Statement>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub pattern: String,
    pub body: Vec<Located<Statement>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Literal(String),
    Expression(String),
}
