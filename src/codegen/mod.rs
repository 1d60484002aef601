//! Generación de código Rust.
//!
//! A partir de un [`DocumentNode`] se produce una unidad de compilación
//! que define la plantilla como una estructura con un campo `base`, un
//! bloque `impl` con los miembros declarados y una implementación de
//! `Template` cuyo cuerpo traduce cada [`Statement`] a llamadas sobre el
//! contexto de ejecución `cx`.
//!
//! La salida usa `\n` como fin de línea y cuatro espacios por nivel de
//! indentación. El código generado espera que `stencil_runtime` esté
//! disponible como dependencia del crate que lo incluye.

use std::fmt::{self, Write};

use crate::ir::{
    AttributeValue, ClassDeclaration, Constructor, DocumentNode, Member, Statement, DEFAULT_BASE,
};
use crate::source::Located;

/// Comentario que separa los constructores reenviados.
pub const FORWARDED_MARKER: &str = "// forwarded template constructors";

const INDENT: &str = "    ";

/// Emite la unidad principal de un documento.
pub fn emit(document: &DocumentNode) -> Result<String, fmt::Error> {
    let mut emitter = Emitter::default();
    emitter.document(document)?;
    Ok(emitter.output)
}

/// Emite una unidad con miembros adicionales.
///
/// Sin miembros adicionales el resultado es idéntico al de [`emit`].
pub fn emit_unit(document: &DocumentNode, extra: &[Member]) -> Result<String, fmt::Error> {
    let mut emitter = Emitter::default();
    emitter.document(document)?;

    if !extra.is_empty() {
        emitter.forwarded(document, extra)?;
    }

    Ok(emitter.output)
}

#[derive(Default)]
struct Emitter {
    output: String,
    level: usize,
}

impl Emitter {
    fn indent(&mut self) -> fmt::Result {
        for _ in 0..self.level {
            self.output.write_str(INDENT)?;
        }

        Ok(())
    }

    fn blank(&mut self) -> fmt::Result {
        self.output.write_char('\n')
    }

    /// Emite líneas a un nivel más de indentación.
    fn nested<F>(&mut self, body: F) -> fmt::Result
    where
        F: FnOnce(&mut Self) -> fmt::Result,
    {
        self.level += 1;
        let result = body(self);
        self.level -= 1;

        result
    }

    fn document(&mut self, document: &DocumentNode) -> fmt::Result {
        emit!(self, "// <auto-generated/>")?;
        emit!(self, "// Compiled by stencil from `{}`. Do not edit.", document.source)?;
        emit!(self)?;

        let segments: Vec<_> = document.namespace_segments().collect();
        for segment in &segments {
            emit!(self, "pub mod {} {{", segment)?;
            self.level += 1;
        }

        emit!(self, "#[allow(unused_imports)]")?;
        emit!(self, "pub(crate) use stencil_runtime::prelude::*;")?;
        for item in &document.uses {
            emit!(self, "#[allow(unused_imports)]")?;
            emit!(self, "pub(crate) use {};", item.val())?;
        }

        emit!(self)?;
        self.class(document)?;

        for _ in &segments {
            self.level -= 1;
            emit!(self, "}}")?;
        }

        Ok(())
    }

    fn class(&mut self, document: &DocumentNode) -> fmt::Result {
        let class = &document.class;
        let header = Header::new(class);
        let base = class.base_type();
        let visibility = class.modifiers.visibility();

        emit!(self, "/// Template compiled from `{}`.", document.source)?;
        emit!(self, "#[allow(dead_code, non_camel_case_types, non_snake_case)]")?;
        emit!(self, "{} struct {}{}{} {{", visibility, class.name, header.generics, header.bounds)?;
        self.nested(|this| {
            emit!(this, "base: {},", base)?;
            if let Some(marker) = &header.marker {
                emit!(this, "_marker: ::std::marker::PhantomData<{}>,", marker)?;
            }

            Ok(())
        })?;
        emit!(self, "}}")?;
        emit!(self)?;

        emit!(self, "impl{} {{", header.inherent(class))?;
        self.nested(|this| {
            emit!(this, "/// Builds the template around an existing base.")?;
            emit!(this, "{} fn from_base(base: {}) -> Self {{", visibility, base)?;
            this.nested(|this| {
                let marker = match header.marker {
                    Some(_) => ", _marker: ::std::marker::PhantomData",
                    None => "",
                };

                emit!(this, "{} {{ base{} }}", class.name, marker)
            })?;
            emit!(this, "}}")?;

            for member in &class.members {
                emit!(this)?;
                this.member(member, visibility)?;
            }

            Ok(())
        })?;
        emit!(self, "}}")?;
        emit!(self)?;

        emit!(self, "impl{} {{", header.implementation(class, "::std::ops::Deref"))?;
        self.nested(|this| {
            emit!(this, "type Target = {};", base)?;
            emit!(this)?;
            emit!(this, "fn deref(&self) -> &Self::Target {{")?;
            this.nested(|this| emit!(this, "&self.base"))?;
            emit!(this, "}}")
        })?;
        emit!(self, "}}")?;
        emit!(self)?;

        emit!(self, "impl{} {{", header.implementation(class, "::std::ops::DerefMut"))?;
        self.nested(|this| {
            emit!(this, "fn deref_mut(&mut self) -> &mut Self::Target {{")?;
            this.nested(|this| emit!(this, "&mut self.base"))?;
            emit!(this, "}}")
        })?;
        emit!(self, "}}")?;
        emit!(self)?;

        if is_default_base(base) {
            emit!(self, "impl{} {{", header.implementation(class, "::std::default::Default"))?;
            self.nested(|this| {
                emit!(this, "fn default() -> Self {{")?;
                this.nested(|this| emit!(this, "Self::from_base(::std::default::Default::default())"))?;
                emit!(this, "}}")
            })?;
            emit!(self, "}}")?;
            emit!(self)?;
        }

        emit!(self, "impl{} {{", header.implementation(class, "ToValue"))?;
        self.nested(|this| {
            emit!(this, "fn to_value(&self) -> Value<'_> {{")?;
            this.nested(|this| emit!(this, "Value::Template(self)"))?;
            emit!(this, "}}")
        })?;
        emit!(self, "}}")?;
        emit!(self)?;

        emit!(self, "impl{} {{", header.implementation(class, "Template"))?;
        self.nested(|this| {
            emit!(this, "fn content_kind(&self) -> ContentKind {{")?;
            this.nested(|this| emit!(this, "TemplateBase::content_kind(&self.base)"))?;
            emit!(this, "}}")?;
            emit!(this)?;

            emit!(this, "#[allow(unused_braces, unused_parens, unused_mut, unused_variables, unreachable_code)]")?;
            emit!(this, "fn execute<'s: 'c, 'c>(")?;
            this.nested(|this| {
                emit!(this, "&'s self,")?;
                emit!(this, "cx: &'c mut Context<'s>,")
            })?;
            emit!(this, ") -> LocalBoxFuture<'c, Result<(), RenderError>> {{")?;
            this.nested(|this| {
                emit!(this, "async move {{")?;
                this.nested(|this| {
                    this.statements(&class.execute.body)?;
                    emit!(this, "Ok::<(), RenderError>(())")
                })?;
                emit!(this, "}}")?;
                emit!(this, ".boxed_local()")
            })?;
            emit!(this, "}}")
        })?;
        emit!(self, "}}")
    }

    fn member(&mut self, member: &Member, visibility: &str) -> fmt::Result {
        match member {
            Member::Functions(code) => self.code(code.val()),
            Member::Constructor(constructor) => self.constructor(constructor, visibility),
        }
    }

    fn constructor(&mut self, constructor: &Constructor, visibility: &str) -> fmt::Result {
        for line in &constructor.docs {
            emit!(self, "/// {}", line)?;
        }

        let parameters: Vec<_> = constructor
            .parameters
            .iter()
            .map(|parameter| format!("{}: {}", parameter.name, parameter.ty))
            .collect();

        let arguments: Vec<_> = constructor
            .parameters
            .iter()
            .map(|parameter| parameter.name.as_str())
            .collect();

        emit!(
            self,
            "{} fn {}({}) -> Self {{",
            visibility,
            constructor.name,
            parameters.join(", ")
        )?;

        self.nested(|this| {
            emit!(
                this,
                "Self::from_base(<{}>::{}({}))",
                constructor.base,
                constructor.name,
                arguments.join(", ")
            )
        })?;

        emit!(self, "}}")
    }

    /// Constructores reenviados, en un bloque aparte al final de la unidad.
    fn forwarded(&mut self, document: &DocumentNode, extra: &[Member]) -> fmt::Result {
        let class = &document.class;
        let header = Header::new(class);
        let path: Vec<_> = document.namespace_segments().collect();

        emit!(self)?;
        emit!(self, "{}", FORWARDED_MARKER)?;
        emit!(self, "const _: () = {{")?;
        self.nested(|this| {
            emit!(this, "#[allow(unused_imports)]")?;
            emit!(this, "use self::{}::*;", path.join("::"))?;
            emit!(this)?;

            emit!(this, "impl{} {{", header.inherent(class))?;
            this.nested(|this| {
                for (index, member) in extra.iter().enumerate() {
                    if index > 0 {
                        emit!(this)?;
                    }

                    this.member(member, class.modifiers.visibility())?;
                }

                Ok(())
            })?;
            emit!(this, "}}")
        })?;
        emit!(self, "}};")
    }

    fn statements(&mut self, body: &[Located<Statement>]) -> fmt::Result {
        for statement in body {
            self.statement(statement.val())?;
        }

        Ok(())
    }

    fn statement(&mut self, statement: &Statement) -> fmt::Result {
        match statement {
            Statement::WriteLiteral(text) => emit!(self, "cx.write_literal({:?});", text),

            Statement::WriteExpression(expression) => {
                emit!(self, "{{")?;
                self.nested(|this| {
                    emit!(this, "let __value = ({});", expression)?;
                    emit!(this, "cx.write(&__value).await?;")
                })?;
                emit!(self, "}}")
            }

            Statement::Code(code) => self.code(code),

            Statement::Block(branches) => {
                for (index, branch) in branches.iter().enumerate() {
                    if index == 0 {
                        emit!(self, "{} {{", branch.header)?;
                    } else {
                        emit!(self, "}} {} {{", branch.header)?;
                    }

                    self.nested(|this| this.statements(&branch.body))?;
                }

                emit!(self, "}}")
            }

            Statement::Match { scrutinee, arms } => {
                emit!(self, "match {} {{", scrutinee)?;
                self.nested(|this| {
                    for arm in arms {
                        emit!(this, "{} => {{", arm.pattern)?;
                        this.nested(|this| this.statements(&arm.body))?;
                        emit!(this, "}}")?;
                    }

                    Ok(())
                })?;
                emit!(self, "}}")
            }

            Statement::BeginAttribute {
                name,
                prefix,
                suffix,
                count,
            } => emit!(
                self,
                "cx.begin_write_attribute({:?}, {:?}, {:?}, {})?;",
                name,
                prefix,
                suffix,
                count
            ),

            Statement::AttributeValue { prefix, value } => match value {
                AttributeValue::Literal(text) => emit!(
                    self,
                    "cx.write_attribute_value({:?}, {:?}, true).await?;",
                    prefix,
                    text
                ),

                AttributeValue::Expression(expression) => {
                    emit!(self, "{{")?;
                    self.nested(|this| {
                        emit!(this, "let __value = ({});", expression)?;
                        emit!(this, "cx.write_attribute_value({:?}, &__value, false).await?;", prefix)
                    })?;
                    emit!(self, "}}")
                }
            },

            Statement::EndAttribute => emit!(self, "cx.end_write_attribute()?;"),

            Statement::DefineSection { name, body } => {
                emit!(self, "cx.define_section({:?}, move |mut cx: Writer| {{", name)?;
                self.nested(|this| {
                    emit!(this, "async move {{")?;
                    this.nested(|this| {
                        this.statements(body)?;
                        emit!(this, "Ok::<_, RenderError>(cx)")
                    })?;
                    emit!(this, "}}")?;
                    emit!(this, ".boxed_local()")
                })?;
                emit!(self, "}})?;")
            }
        }
    }

    /// Copia código Rust, eliminando su margen común.
    fn code(&mut self, code: &str) -> fmt::Result {
        let lines: Vec<_> = code.lines().collect();
        let first = match lines.iter().position(|line| !line.trim().is_empty()) {
            Some(first) => first,
            None => return Ok(()),
        };

        let last = lines
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .unwrap_or(first);

        let lines = &lines[first..=last];
        let margin = lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.len() - line.trim_start().len())
            .min()
            .unwrap_or(0);

        for line in lines {
            if line.trim().is_empty() {
                emit!(self)?;
            } else {
                let line = line.get(margin..).unwrap_or_else(|| line.trim_start());
                emit!(self, "{}", line.trim_end())?;
            }
        }

        Ok(())
    }
}

/// Fragmentos genéricos compartidos por los encabezados de la clase.
struct Header {
    generics: String,
    bounds: String,
    marker: Option<String>,
}

impl Header {
    fn new(class: &ClassDeclaration) -> Self {
        let marker = match class.type_parameters.len() {
            0 => None,
            _ => {
                let names: Vec<_> = class
                    .type_parameters
                    .iter()
                    .map(|parameter| format!("{},", parameter.name))
                    .collect();

                Some(format!("fn() -> ({})", names.join(" ")))
            }
        };

        Header {
            generics: class.generics(),
            bounds: class.where_clause(),
            marker,
        }
    }

    fn inherent(&self, class: &ClassDeclaration) -> String {
        format!("{} {}{}{}", self.generics, class.name, self.generics, self.bounds)
    }

    fn implementation(&self, class: &ClassDeclaration, name: &str) -> String {
        format!(
            "{} {} for {}{}{}",
            self.generics, name, class.name, self.generics, self.bounds
        )
    }
}

/// Determina si la base es la base por omisión, con cualquier argumento.
fn is_default_base(base: &str) -> bool {
    let path = base.split('<').next().unwrap_or(base).trim();
    path.rsplit("::").next() == Some(DEFAULT_BASE)
}
