use thiserror::Error;

use crate::cancel::CancellationToken;

/// Error durante la ejecución de una plantilla.
///
/// Todo error aborta únicamente la llamada de render en curso. Salida
/// que ya se haya vaciado hacia un destino externo no se retracta.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RenderError {
    /// Se solicitó cancelación; incluye la señal que la originó.
    #[error("The operation was canceled")]
    Cancelled(CancellationToken),

    #[error("Section `{0}` is already defined")]
    SectionRedefined(String),

    #[error("Section `{0}` is not defined")]
    SectionNotDefined(String),

    #[error("Section `{0}` has already been rendered")]
    SectionAlreadyRendered(String),

    /// Se invocó una operación de layout fuera de un layout.
    #[error("`{0}` can only be used from a layout")]
    NotInLayout(&'static str),

    /// La cadena de layouts no termina; probablemente existe un ciclo.
    #[error("Layout chain exceeds {0} levels")]
    LayoutDepthExceeded(usize),

    #[error("This template requires a model, but none was provided")]
    ModelRequired,

    #[error("Cannot flush the output of a template that has a layout")]
    FlushWithLayout,

    #[error("Cannot set a layout after output has been flushed")]
    LayoutAfterFlush,

    /// Uso incorrecto de la máquina de estados de atributos.
    #[error("Attribute writer misuse: {0}")]
    AttributeState(&'static str),

    /// Un render síncrono suspendió en un hilo que conduce un runtime.
    #[error("Synchronous render suspended inside an async runtime, use the async entry points instead")]
    SuspendedInRuntime,

    #[error("Failed to write to the output sink")]
    Sink(#[from] std::fmt::Error),

    /// Error arbitrario originado en código de usuario.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Indica si el error corresponde a una cancelación.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled(_))
    }

    /// Obtiene la señal de cancelación que originó el error, si aplica.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        match self {
            RenderError::Cancelled(token) => Some(token),
            _ => None,
        }
    }
}
