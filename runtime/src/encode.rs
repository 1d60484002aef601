//! Codificación HTML de valores dinámicos.
//!
//! Existe un único conjunto canónico de caracteres a reemplazar:
//!
//! | Carácter | Entidad  |
//! |----------|----------|
//! | `&`      | `&amp;`  |
//! | `<`      | `&lt;`   |
//! | `>`      | `&gt;`   |
//! | `"`      | `&quot;` |
//! | `'`      | `&#x27;` |
//!
//! Todo otro carácter se preserva sin cambios. La codificación no es
//! idempotente sobre texto crudo: codificar dos veces `&` produce
//! `&amp;amp;`. Para contenido que ya es seguro existe [`Encoded`], el
//! cual se escribe tal cual y nunca se vuelve a codificar.

use std::{
    borrow::Cow,
    fmt::{self, Display, Write},
};

/// Obtiene la entidad que reemplaza a un carácter, si alguna.
fn entity(c: char) -> Option<&'static str> {
    match c {
        '&' => Some("&amp;"),
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#x27;"),
        _ => None,
    }
}

/// Codifica `text` al final de `output`.
pub fn encode_html_into(output: &mut String, text: &str) {
    let mut last = 0;
    for (index, c) in text.char_indices() {
        if let Some(entity) = entity(c) {
            output.push_str(&text[last..index]);
            output.push_str(entity);
            last = index + c.len_utf8();
        }
    }

    output.push_str(&text[last..]);
}

/// Codifica un texto, evitando copias si no hay nada que reemplazar.
pub fn encode_html(text: &str) -> Cow<'_, str> {
    if text.chars().any(|c| entity(c).is_some()) {
        let mut output = String::with_capacity(text.len() + 16);
        encode_html_into(&mut output, text);
        Cow::Owned(output)
    } else {
        Cow::Borrowed(text)
    }
}

/// Adaptador de [`fmt::Write`] que codifica todo lo que recibe.
///
/// Permite codificar la salida de una implementación de [`Display`]
/// sin construir primero una cadena intermedia.
pub struct HtmlEncoder<'a>(pub &'a mut String);

impl Write for HtmlEncoder<'_> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        encode_html_into(self.0, text);
        Ok(())
    }
}

/// Contenido ya codificado.
///
/// Los escritores lo emiten sin alteraciones, sin importar el tipo de
/// contenido de la plantilla.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Encoded(String);

impl Encoded {
    /// Envuelve contenido que se sabe seguro.
    pub fn new<S: Into<String>>(content: S) -> Self {
        Encoded(content.into())
    }

    /// Codifica texto crudo y marca el resultado como seguro.
    pub fn encode(text: &str) -> Self {
        Encoded(encode_html(text).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for Encoded {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for Encoded {
    fn from(content: String) -> Self {
        Encoded(content)
    }
}

/// Marca un texto como ya codificado.
pub fn raw<S: Into<String>>(content: S) -> Encoded {
    Encoded::new(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_set() {
        assert_eq!(
            encode_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn other_characters_unchanged() {
        let text = "ñandú ☃ \t\n plain";
        assert!(matches!(encode_html(text), Cow::Borrowed(_)));
        assert_eq!(encode_html(text), text);
    }

    #[test]
    fn raw_text_is_not_idempotent() {
        let once = encode_html("a & b");
        let twice = encode_html(&once).into_owned();

        assert_eq!(once, "a &amp; b");
        assert_eq!(twice, "a &amp;amp; b");
    }

    #[test]
    fn display_through_encoder() {
        let mut output = String::new();
        write!(HtmlEncoder(&mut output), "{}<{}", 1, "b").unwrap();
        assert_eq!(output, "1&lt;b");
    }
}
