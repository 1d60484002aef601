//! Tipos base de las plantillas generadas.
//!
//! Toda plantilla generada contiene un valor de su tipo base y se
//! desreferencia hacia él. El tipo base decide el tipo de contenido y
//! puede exponer constructores marcados con
//! [`template_constructor`](crate::template_constructor), los cuales el
//! compilador reenvía a la plantilla cuando esta usa `@inherits`.

use crate::{error::RenderError, template_constructor, writer::ContentKind};

/// Comportamiento que toda base de plantilla ofrece.
pub trait TemplateBase {
    fn content_kind(&self) -> ContentKind;
}

/// Base de plantillas HTML. Es la base por omisión.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTemplate<M = ()> {
    model: Option<M>,
}

impl<M> HtmlTemplate<M> {
    /// Construye la base con un modelo.
    #[template_constructor]
    pub fn new(model: M) -> Self {
        HtmlTemplate { model: Some(model) }
    }

    /// Obtiene el modelo, el cual es requerido.
    pub fn model(&self) -> Result<&M, RenderError> {
        self.model.as_ref().ok_or(RenderError::ModelRequired)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

impl<M> Default for HtmlTemplate<M> {
    fn default() -> Self {
        HtmlTemplate { model: None }
    }
}

impl<M> TemplateBase for HtmlTemplate<M> {
    fn content_kind(&self) -> ContentKind {
        ContentKind::Html
    }
}

/// Base de plantillas de texto plano, cuyas expresiones no se codifican.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainTextTemplate<M = ()> {
    model: Option<M>,
}

impl<M> PlainTextTemplate<M> {
    #[template_constructor]
    pub fn new(model: M) -> Self {
        PlainTextTemplate { model: Some(model) }
    }

    pub fn model(&self) -> Result<&M, RenderError> {
        self.model.as_ref().ok_or(RenderError::ModelRequired)
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

impl<M> Default for PlainTextTemplate<M> {
    fn default() -> Self {
        PlainTextTemplate { model: None }
    }
}

impl<M> TemplateBase for PlainTextTemplate<M> {
    fn content_kind(&self) -> ContentKind {
        ContentKind::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_required() {
        let empty = HtmlTemplate::<String>::default();
        assert!(matches!(empty.model(), Err(RenderError::ModelRequired)));

        let full = PlainTextTemplate::new(7);
        assert_eq!(full.model().ok(), Some(&7));
        assert_eq!(full.content_kind(), ContentKind::Text);
    }
}
