//! Biblioteca de soporte para plantillas compiladas por `stencil`.
//!
//! # Propósito
//! El compilador traduce cada plantilla a un tipo Rust que implementa
//! [`Template`]. Esta biblioteca implementa todo lo que el código
//! generado necesita en tiempo de ejecución: escritura de literales y
//! expresiones con codificación HTML, la máquina de estados de
//! atributos condicionales, secciones, cadenas de layouts y los puntos
//! de entrada de render, síncronos y asíncronos.
//!
//! # Ejecución
//! Una ejecución nunca comparte estado mutable con otra. Cada render
//! crea un [`Context`] propio que se entrega al cuerpo generado por
//! referencia mutable; una misma instancia de plantilla puede por lo
//! tanto renderizarse varias veces, incluso de forma intercalada.
//!
//! # Cancelación
//! La cancelación es cooperativa. Se revisa una [`CancellationToken`] al
//! iniciar el render, antes de cada salto de layout y antes de ejecutar
//! cada sección. Una cancelación siempre se reporta como
//! [`RenderError::Cancelled`], junto a la señal que la originó.
//!
//! # Uso desde Rust
//! El código generado importa [`prelude`]. Una plantilla escrita a mano
//! es simplemente un tipo que implementa [`Template`]:
//!
//! ```
//! use stencil_runtime::prelude::*;
//!
//! struct Hello(&'static str);
//!
//! impl Template for Hello {
//!     fn execute<'s: 'c, 'c>(
//!         &'s self,
//!         cx: &'c mut Context<'s>,
//!     ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
//!         async move {
//!             cx.write_literal("<p>");
//!             cx.write(self.0).await?;
//!             cx.write_literal("</p>");
//!             Ok::<(), RenderError>(())
//!         }
//!         .boxed_local()
//!     }
//! }
//!
//! assert_eq!(Hello("<b>").render().unwrap(), "<p>&lt;b&gt;</p>");
//! ```

use std::{rc::Rc, sync::Arc};

use futures::future::LocalBoxFuture;

mod base;
mod cancel;
mod context;
mod encode;
mod error;
mod render;
mod value;
mod writer;

pub use crate::{
    base::{HtmlTemplate, PlainTextTemplate, TemplateBase},
    cancel::CancellationToken,
    context::{Context, ExecutionResult, LayoutInput, SectionBody, Sink},
    encode::{encode_html, encode_html_into, raw, Encoded, HtmlEncoder},
    error::RenderError,
    render::{execute, Render, MAX_LAYOUT_DEPTH},
    value::{display, partial, ToValue, Value},
    writer::{ContentKind, Writer},
};

pub use futures;
pub use stencil_macros::template_constructor;

/// Una plantilla ejecutable.
///
/// El compilador implementa este trait para cada plantilla. El cuerpo
/// escribe sobre el contexto recibido y puede definir secciones o
/// establecer un layout.
pub trait Template {
    /// Tipo de contenido que produce la plantilla.
    fn content_kind(&self) -> ContentKind {
        ContentKind::Html
    }

    /// Ejecuta el cuerpo de la plantilla.
    fn execute<'s: 'c, 'c>(
        &'s self,
        cx: &'c mut Context<'s>,
    ) -> LocalBoxFuture<'c, Result<(), RenderError>>;
}

macro_rules! forward_template {
    ($($type:ty),*) => {
        $(
            impl<T: Template + ?Sized> Template for $type {
                fn content_kind(&self) -> ContentKind {
                    (**self).content_kind()
                }

                fn execute<'s: 'c, 'c>(
                    &'s self,
                    cx: &'c mut Context<'s>,
                ) -> LocalBoxFuture<'c, Result<(), RenderError>> {
                    (**self).execute(cx)
                }
            }
        )*
    };
}

forward_template!(&T, Box<T>, Rc<T>, Arc<T>);

/// Todo lo que el código generado necesita.
pub mod prelude {
    pub use crate::{
        display, partial, raw, CancellationToken, ContentKind, Context, Encoded, HtmlTemplate,
        PlainTextTemplate, Render, RenderError, Template, TemplateBase, ToValue, Value, Writer,
    };

    pub use futures::future::{FutureExt, LocalBoxFuture};
    pub use stencil_macros::template_constructor;
}
