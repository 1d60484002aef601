//! Puntos de entrada de render.
//!
//! Un render ejecuta el cuerpo de la plantilla dentro de un [`Context`]
//! nuevo y luego recorre la cadena de layouts hacia arriba: el
//! resultado de cada ejecución se vuelve la entrada del layout que esa
//! misma ejecución estableció, hasta llegar a una ejecución sin layout.
//! La cadena se limita a [`MAX_LAYOUT_DEPTH`] saltos.
//!
//! Las variantes síncronas sondean el futuro una vez. Si la ejecución
//! no suspende, concluye ahí mismo; de lo contrario el hilo invocador
//! se bloquea hasta que el futuro concluya. El futuro no es `Send`, así
//! que la continuación no puede trasladarse a otro hilo: si el hilo
//! invocador ya conduce un runtime de `tokio`, bloquearlo impediría que
//! el futuro avance, por lo que en ese caso el render falla con
//! [`RenderError::SuspendedInRuntime`].

use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

use futures::{
    executor::block_on,
    future::LocalBoxFuture,
    task::noop_waker_ref,
    FutureExt,
};
use tokio::runtime::Handle;

use crate::{
    cancel::CancellationToken,
    context::{Context, ExecutionResult},
    error::RenderError,
    Template,
};

/// Límite de saltos en una cadena de layouts.
pub const MAX_LAYOUT_DEPTH: usize = 32;

/// Ejecuta el cuerpo de una plantilla y retorna el resultado sin
/// componer con layouts.
pub async fn execute<'t, T>(
    template: &'t T,
    mut cx: Context<'t>,
) -> Result<ExecutionResult<'t>, RenderError>
where
    T: Template + ?Sized,
{
    cx.cancellation_token().check()?;
    template.execute(&mut cx).await?;
    Ok(cx.into_result())
}

/// Compone un resultado con su cadena de layouts.
fn compose(
    mut result: ExecutionResult<'_>,
    depth: usize,
) -> LocalBoxFuture<'_, Result<String, RenderError>> {
    async move {
        let layout = match result.take_layout() {
            Some(layout) => layout,
            None => return Ok(result.into_body()),
        };

        if depth >= MAX_LAYOUT_DEPTH {
            return Err(RenderError::LayoutDepthExceeded(MAX_LAYOUT_DEPTH));
        }

        let token = result.cancellation_token().clone();
        token.check()?;

        log::debug!("composing layout at depth {}", depth + 1);
        let cx = Context::new(layout.content_kind(), token).with_input(Box::new(result));
        let next = execute(&*layout, cx).await?;
        compose(next, depth + 1).await
    }
    .boxed_local()
}

/// Renderiza una plantilla anidada dentro de otra ejecución.
pub(crate) fn render_nested<'t>(
    template: &'t dyn Template,
    token: CancellationToken,
) -> LocalBoxFuture<'t, Result<String, RenderError>> {
    async move {
        let cx = Context::new(template.content_kind(), token);
        let result = execute(template, cx).await?;
        compose(result, 0).await
    }
    .boxed_local()
}

async fn render_string<T>(template: &T, token: CancellationToken) -> Result<String, RenderError>
where
    T: Template + ?Sized,
{
    token.check()?;

    let cx = Context::new(template.content_kind(), token);
    let result = execute(template, cx).await?;
    compose(result, 0).await
}

async fn render_sink<T, W>(
    template: &T,
    sink: &mut W,
    token: CancellationToken,
) -> Result<(), RenderError>
where
    T: Template + ?Sized,
    W: fmt::Write,
{
    token.check()?;

    let output = {
        let cx = Context::new(template.content_kind(), token).with_sink(&mut *sink);
        let result = execute(template, cx).await?;
        compose(result, 0).await?
    };

    sink.write_str(&output)?;
    Ok(())
}

/// Conduce un futuro hasta su conclusión desde código síncrono.
fn run_sync<F, T>(future: F) -> Result<T, RenderError>
where
    F: Future<Output = Result<T, RenderError>>,
{
    let mut future = Box::pin(future);
    let mut task = TaskContext::from_waker(noop_waker_ref());

    match Pin::as_mut(&mut future).poll(&mut task) {
        Poll::Ready(output) => output,
        Poll::Pending if Handle::try_current().is_ok() => {
            log::warn!("synchronous render suspended inside an async runtime");
            Err(RenderError::SuspendedInRuntime)
        }

        Poll::Pending => {
            log::trace!("render suspended, blocking until completion");
            block_on(future)
        }
    }
}

/// Puntos de entrada de render para toda plantilla.
///
/// Las variantes síncronas no deben invocarse desde una tarea de un
/// runtime asíncrono: si la plantilla suspende, retornan
/// [`RenderError::SuspendedInRuntime`] en vez de bloquear el hilo. Ahí
/// corresponde usar [`Render::render_async`] o
/// [`Render::render_to_async`].
pub trait Render: Template {
    /// Renderiza hacia un `String`.
    fn render(&self) -> Result<String, RenderError> {
        self.render_with(CancellationToken::new())
    }

    /// Renderiza hacia un `String`, observando una señal de cancelación.
    fn render_with(&self, token: CancellationToken) -> Result<String, RenderError> {
        run_sync(render_string(self, token))
    }

    /// Renderiza hacia un destino externo.
    fn render_to<W: fmt::Write>(
        &self,
        sink: &mut W,
        token: CancellationToken,
    ) -> Result<(), RenderError> {
        run_sync(render_sink(self, sink, token))
    }

    fn render_async(&self, token: CancellationToken) -> LocalBoxFuture<'_, Result<String, RenderError>> {
        render_string(self, token).boxed_local()
    }

    fn render_to_async<'a, W: fmt::Write>(
        &'a self,
        sink: &'a mut W,
        token: CancellationToken,
    ) -> LocalBoxFuture<'a, Result<(), RenderError>> {
        render_sink(self, sink, token).boxed_local()
    }
}

impl<T: Template + ?Sized> Render for T {}
