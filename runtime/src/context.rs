//! Ámbito de ejecución.
//!
//! Cada ejecución de una plantilla (la página, cada layout de la cadena
//! y cada plantilla anidada) ocurre dentro de su propio [`Context`]. El
//! contexto es propiedad exclusiva de quien lo crea y se entrega al
//! cuerpo generado por referencia mutable, por lo que no existe estado
//! compartido entre renders concurrentes ni algo que restaurar al salir.
//!
//! Al concluir el cuerpo, el contexto se consume en un
//! [`ExecutionResult`], el cual contiene la salida del cuerpo, las
//! secciones definidas y el layout pendiente. Si existe un layout, este
//! resultado se convierte en la entrada del layout.

use std::{
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
};

use futures::future::LocalBoxFuture;
use unicase::UniCase;

use crate::{
    cancel::CancellationToken,
    encode::Encoded,
    error::RenderError,
    writer::{ContentKind, Writer},
    Template,
};

/// Cuerpo diferido de una sección.
///
/// Recibe un escritor nuevo, escribe en él y lo retorna al concluir.
pub type SectionBody<'t> =
    Box<dyn FnOnce(Writer) -> LocalBoxFuture<'t, Result<Writer, RenderError>> + 't>;

/// Destino externo de salida.
pub type Sink<'t> = &'t mut (dyn fmt::Write + 't);

/// Lo que un layout puede consultar de la ejecución que envuelve.
pub trait LayoutInput {
    /// Salida del cuerpo envuelto.
    fn body(&self) -> &str;

    fn is_section_defined(&self, name: &str) -> bool;

    /// Ejecuta una sección, a lo sumo una vez.
    ///
    /// Una sección no definida produce `Ok(None)`.
    fn render_section<'a>(
        &'a mut self,
        name: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<String>, RenderError>>;
}

/// Ámbito de una ejecución.
///
/// Se desreferencia hacia el [`Writer`] del cuerpo, así que el código
/// generado escribe directamente sobre el contexto.
pub struct Context<'t> {
    writer: Writer,
    sections: HashMap<UniCase<String>, SectionBody<'t>>,
    layout: Option<Box<dyn Template + 't>>,
    input: Option<Box<dyn LayoutInput + 't>>,
    sink: Option<Sink<'t>>,
    flushed: bool,
}

impl<'t> Context<'t> {
    pub(crate) fn new(kind: ContentKind, token: CancellationToken) -> Self {
        Context {
            writer: Writer::new(kind, token),
            sections: HashMap::new(),
            layout: None,
            input: None,
            sink: None,
            flushed: false,
        }
    }

    pub(crate) fn with_sink(mut self, sink: Sink<'t>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub(crate) fn with_input(mut self, input: Box<dyn LayoutInput + 't>) -> Self {
        self.input = Some(input);
        self
    }

    /// Define una sección con nombre.
    ///
    /// Los nombres no distinguen mayúsculas de minúsculas y no pueden
    /// repetirse dentro de una misma ejecución.
    ///
    /// El cuerpo recibe únicamente un [`Writer`] propio, que comparte la
    /// señal de cancelación de la ejecución. Desde una sección no es
    /// posible establecer un layout ni definir otras secciones, y el
    /// cierre no puede tomar prestadas variables locales del cuerpo que
    /// la define: solo lo que viva tanto como la plantilla (`'t`).
    pub fn define_section<F>(&mut self, name: &str, body: F) -> Result<(), RenderError>
    where
        F: FnOnce(Writer) -> LocalBoxFuture<'t, Result<Writer, RenderError>> + 't,
    {
        let key = UniCase::new(name.to_owned());
        if self.sections.contains_key(&key) {
            return Err(RenderError::SectionRedefined(name.to_owned()));
        }

        log::trace!("defining section `{}`", name);
        self.sections.insert(key, Box::new(body));
        Ok(())
    }

    /// Establece el layout que envolverá a esta ejecución.
    ///
    /// Un layout posterior reemplaza a uno anterior.
    pub fn set_layout<L: Template + 't>(&mut self, layout: L) -> Result<(), RenderError> {
        if self.flushed {
            return Err(RenderError::LayoutAfterFlush);
        }

        self.layout = Some(Box::new(layout));
        Ok(())
    }

    /// Salida del cuerpo envuelto por este layout.
    pub fn render_body(&self) -> Result<Encoded, RenderError> {
        let input = self
            .input
            .as_ref()
            .ok_or(RenderError::NotInLayout("render_body"))?;

        Ok(Encoded::new(input.body()))
    }

    /// Ejecuta una sección de la plantilla envuelta.
    ///
    /// Una sección requerida que no fue definida es un error. Una
    /// sección opcional no definida produce contenido vacío.
    pub async fn render_section(
        &mut self,
        name: &str,
        required: bool,
    ) -> Result<Encoded, RenderError> {
        self.writer.cancellation_token().check()?;
        let input = self
            .input
            .as_mut()
            .ok_or(RenderError::NotInLayout("render_section"))?;

        match input.render_section(name).await? {
            Some(content) => Ok(Encoded::new(content)),
            None if required => Err(RenderError::SectionNotDefined(name.to_owned())),
            None => Ok(Encoded::default()),
        }
    }

    pub fn is_section_defined(&self, name: &str) -> Result<bool, RenderError> {
        let input = self
            .input
            .as_ref()
            .ok_or(RenderError::NotInLayout("is_section_defined"))?;

        Ok(input.is_section_defined(name))
    }

    /// Vacía la salida acumulada hacia el destino externo.
    ///
    /// No tiene efecto cuando no existe destino externo, como al
    /// renderizar hacia un `String` o dentro de una plantilla anidada.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if self.layout.is_some() {
            return Err(RenderError::FlushWithLayout);
        }

        if let Some(sink) = self.sink.as_mut() {
            let output = self.writer.take_output();
            sink.write_str(&output)?;
            self.flushed = true;
        }

        Ok(())
    }

    pub(crate) fn into_result(self) -> ExecutionResult<'t> {
        let Context {
            writer,
            sections,
            layout,
            ..
        } = self;

        let kind = writer.kind();
        let token = writer.cancellation_token().clone();
        ExecutionResult {
            body: writer.into_output(),
            sections: sections
                .into_iter()
                .map(|(name, body)| (name, SectionSlot::Pending(body)))
                .collect(),
            layout,
            kind,
            token,
        }
    }
}

impl Deref for Context<'_> {
    type Target = Writer;

    fn deref(&self) -> &Writer {
        &self.writer
    }
}

impl DerefMut for Context<'_> {
    fn deref_mut(&mut self) -> &mut Writer {
        &mut self.writer
    }
}

enum SectionSlot<'t> {
    Pending(SectionBody<'t>),
    Rendered,
}

/// Resultado de una ejecución concluida.
pub struct ExecutionResult<'t> {
    body: String,
    sections: HashMap<UniCase<String>, SectionSlot<'t>>,
    layout: Option<Box<dyn Template + 't>>,
    kind: ContentKind,
    token: CancellationToken,
}

impl<'t> ExecutionResult<'t> {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Layout pendiente, si alguno.
    pub(crate) fn take_layout(&mut self) -> Option<Box<dyn Template + 't>> {
        self.layout.take()
    }
}

impl LayoutInput for ExecutionResult<'_> {
    fn body(&self) -> &str {
        &self.body
    }

    fn is_section_defined(&self, name: &str) -> bool {
        self.sections.contains_key(&UniCase::new(name.to_owned()))
    }

    fn render_section<'a>(
        &'a mut self,
        name: &'a str,
    ) -> LocalBoxFuture<'a, Result<Option<String>, RenderError>> {
        Box::pin(async move {
            let slot = match self.sections.get_mut(&UniCase::new(name.to_owned())) {
                Some(slot) => slot,
                None => return Ok(None),
            };

            let body = match std::mem::replace(slot, SectionSlot::Rendered) {
                SectionSlot::Pending(body) => body,
                SectionSlot::Rendered => {
                    return Err(RenderError::SectionAlreadyRendered(name.to_owned()))
                }
            };

            self.token.check()?;
            log::trace!("rendering section `{}`", name);

            let writer = Writer::new(self.kind, self.token.clone());
            let writer = body(writer).await?;
            Ok(Some(writer.into_output()))
        })
    }
}
