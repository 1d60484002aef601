//! Escritura de salida y máquina de estados de atributos.
//!
//! Un [`Writer`] acumula la salida de una ejecución (el cuerpo de una
//! plantilla o el de una sección). El tipo de contenido determina si
//! los valores dinámicos se codifican ([`ContentKind::Html`]) o se
//! escriben tal cual ([`ContentKind::Text`]). El texto literal de la
//! plantilla nunca se codifica.
//!
//! # Atributos condicionales
//! Un atributo cuyo valor contiene expresiones se escribe en tres fases:
//! [`Writer::begin_write_attribute()`], una o más invocaciones de
//! [`Writer::write_attribute_value()`] y finalmente
//! [`Writer::end_write_attribute()`]. Si el atributo tiene exactamente
//! una parte y esta evalúa a `false` o a un valor nulo, el atributo
//! completo se omite. Si evalúa a `true`, el valor es el propio nombre
//! del atributo. Atributos de varias partes nunca se omiten; solo se
//! saltan las partes nulas junto con su prefijo.

use std::fmt::Write;

use crate::{
    cancel::CancellationToken,
    encode::{encode_html_into, HtmlEncoder},
    error::RenderError,
    render,
    value::{ToValue, Value},
};

/// Tipo de contenido que produce una plantilla.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// Los valores dinámicos se codifican como HTML.
    Html,

    /// Los valores dinámicos se escriben sin alteraciones.
    Text,
}

impl Default for ContentKind {
    fn default() -> Self {
        ContentKind::Html
    }
}

/// Estado transitorio de un atributo en escritura.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AttributeInfo {
    pub name: &'static str,
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub value_count: usize,
    pub suppressed: bool,
}

/// Estados de la máquina de atributos.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AttributeState {
    Idle,
    InAttribute(AttributeInfo),
}

impl Default for AttributeState {
    fn default() -> Self {
        AttributeState::Idle
    }
}

/// Búfer de salida de una ejecución.
#[derive(Debug)]
pub struct Writer {
    output: String,
    kind: ContentKind,
    token: CancellationToken,
    attribute: AttributeState,
}

impl Writer {
    pub fn new(kind: ContentKind, token: CancellationToken) -> Self {
        Writer {
            output: String::new(),
            kind,
            token,
            attribute: AttributeState::Idle,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Señal de cancelación de la ejecución en curso.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Salida acumulada hasta el momento.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Toma ownership de la salida acumulada.
    pub fn into_output(self) -> String {
        self.output
    }

    pub(crate) fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Escribe texto literal, sin codificar.
    pub fn write_literal(&mut self, text: &str) {
        self.output.push_str(text);
    }

    /// Escribe un valor dinámico.
    pub async fn write<V: ToValue + ?Sized>(&mut self, value: &V) -> Result<(), RenderError> {
        self.write_value(value.to_value()).await
    }

    /// Inicia la escritura de un atributo condicional.
    ///
    /// `prefix` incluye el espacio previo al nombre, el nombre, el `=` y
    /// la comilla de apertura. Si se espera exactamente una parte, el
    /// prefijo se pospone hasta conocer el valor.
    pub fn begin_write_attribute(
        &mut self,
        name: &'static str,
        prefix: &'static str,
        suffix: &'static str,
        value_count: usize,
    ) -> Result<(), RenderError> {
        if let AttributeState::InAttribute(_) = self.attribute {
            return Err(RenderError::AttributeState(
                "attribute started while another is being written",
            ));
        }

        if value_count != 1 {
            self.output.push_str(prefix);
        }

        self.attribute = AttributeState::InAttribute(AttributeInfo {
            name,
            prefix,
            suffix,
            value_count,
            suppressed: false,
        });

        Ok(())
    }

    /// Escribe una parte del valor del atributo en curso.
    ///
    /// `literal` indica que la parte es texto fijo de la plantilla y no
    /// debe codificarse.
    pub async fn write_attribute_value<V: ToValue + ?Sized>(
        &mut self,
        prefix: &str,
        value: &V,
        literal: bool,
    ) -> Result<(), RenderError> {
        let info = match &mut self.attribute {
            AttributeState::InAttribute(info) => info,
            AttributeState::Idle => {
                return Err(RenderError::AttributeState(
                    "attribute value written outside of an attribute",
                ))
            }
        };

        if info.suppressed {
            return Ok(());
        }

        let mut value = value.to_value();
        if info.value_count == 1 {
            if prefix.is_empty() {
                match value {
                    Value::Null | Value::Bool(false) => {
                        info.suppressed = true;
                        return Ok(());
                    }

                    Value::Bool(true) => value = Value::Text(info.name),
                    _ => (),
                }
            }

            let attribute_prefix = info.prefix;
            self.output.push_str(attribute_prefix);
        }

        if value.is_null() {
            return Ok(());
        }

        self.output.push_str(prefix);
        match value {
            Value::Text(text) if literal => {
                self.output.push_str(text);
                Ok(())
            }

            value => self.write_value(value).await,
        }
    }

    /// Concluye el atributo en curso.
    pub fn end_write_attribute(&mut self) -> Result<(), RenderError> {
        match std::mem::take(&mut self.attribute) {
            AttributeState::InAttribute(info) => {
                if !info.suppressed {
                    self.output.push_str(info.suffix);
                }

                Ok(())
            }

            AttributeState::Idle => Err(RenderError::AttributeState(
                "attribute ended without being started",
            )),
        }
    }

    async fn write_value(&mut self, value: Value<'_>) -> Result<(), RenderError> {
        let encode = self.kind == ContentKind::Html;
        match value {
            Value::Null => (),
            Value::Bool(true) => self.output.push_str("true"),
            Value::Bool(false) => self.output.push_str("false"),
            Value::Encoded(text) => self.output.push_str(text),

            Value::Text(text) if encode => encode_html_into(&mut self.output, text),
            Value::Text(text) => self.output.push_str(text),

            Value::Display(value) if encode => write!(HtmlEncoder(&mut self.output), "{}", value)?,
            Value::Display(value) => write!(self.output, "{}", value)?,

            Value::Template(template) => {
                let nested = render::render_nested(template, self.token.clone()).await?;
                self.output.push_str(&nested);
            }
        }

        Ok(())
    }
}
