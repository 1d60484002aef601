//! Textos de origen y ubicaciones dentro de ellos.
//!
//! Todo nodo que el compilador construye recuerda de qué parte de la
//! plantilla proviene, de modo que un diagnóstico pueda señalar el
//! fragmento exacto que lo causó. Una [`Location`] es un rango de bytes
//! sobre un [`Source`] compartido; la conversión a línea y columna se
//! difiere hasta que un diagnóstico se muestra.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Range,
    rc::Rc,
};

/// Columnas que avanza un tabulador.
const TAB_WIDTH: u32 = 4;

/// Un valor junto al fragmento de origen que lo produjo.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<T> {
    location: Location,
    value: T,
}

impl<T> Located<T> {
    pub fn at(value: T, location: Location) -> Self {
        Located { location, value }
    }

    pub fn val(&self) -> &T {
        &self.value
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    /// Separa la ubicación del valor.
    pub fn split(self) -> (Location, T) {
        (self.location, self.value)
    }

    /// Reemplaza el valor, conservando la ubicación.
    pub fn map<U>(self, map: impl FnOnce(T) -> U) -> Located<U> {
        Located::at(map(self.value), self.location)
    }
}

/// Texto de una plantilla junto a su nombre de origen.
pub struct Source {
    name: String,
    text: String,
    line_starts: Vec<usize>,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Rc<Self> {
        let text = text.into();

        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(index, _)| index + 1));

        Rc::new(Source {
            name: name.into(),
            text,
            line_starts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Invoca a `callback` con el contenido de una línea, si existe.
    pub fn with_line<F>(&self, line: u32, callback: F) -> fmt::Result
    where
        F: FnOnce(&str) -> fmt::Result,
    {
        self.line(line).map_or(Ok(()), callback)
    }

    fn line(&self, line: u32) -> Option<&str> {
        let index = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(index)?;
        let end = match self.line_starts.get(index + 1) {
            Some(&next) => next,
            None => self.text.len(),
        };

        Some(self.text[start..end].trim_end_matches(&['\n', '\r'][..]))
    }

    /// Línea y columna de un desplazamiento; los tabuladores avanzan
    /// hasta la siguiente columna múltiplo de [`TAB_WIDTH`].
    fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let index = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);

        let column = self.text[self.line_starts[index]..offset]
            .chars()
            .fold(1, |column, c| match c {
                '\t' => 1 + ((column - 1) / TAB_WIDTH + 1) * TAB_WIDTH,
                _ => column + 1,
            });

        Position {
            line: index as u32 + 1,
            column,
        }
    }
}

impl Debug for Source {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "Source({:?})", self.name)
    }
}

/// Rango de bytes dentro de un origen.
#[derive(Clone)]
pub struct Location {
    source: Rc<Source>,
    range: Range<usize>,
}

impl Location {
    pub fn new(source: &Rc<Source>, range: Range<usize>) -> Self {
        Location {
            source: Rc::clone(source),
            range,
        }
    }

    /// Ubicación que abarca un origen completo.
    pub fn whole(source: &Rc<Source>) -> Self {
        Location::new(source, 0..source.text.len())
    }

    /// Desde el inicio de `from` hasta el final de `to`, que debe
    /// pertenecer al mismo origen.
    pub fn span(from: Location, to: &Location) -> Self {
        Location {
            range: from.range.start..to.range.end,
            source: from.source,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Fragmento de la plantilla que abarca la ubicación.
    pub fn text(&self) -> &str {
        &self.source.text[self.range.clone()]
    }

    pub fn start(&self) -> Position {
        self.source.position(self.range.start)
    }

    /// Posición inmediatamente posterior al rango.
    pub fn end(&self) -> Position {
        self.source.position(self.range.end)
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && Rc::ptr_eq(&self.source, &other.source)
    }
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        let (start, end) = (self.start(), self.end());
        if self.range.len() > 1 && start.line == end.line {
            let last = end.column.saturating_sub(1).max(1);
            write!(
                formatter,
                "{}:[{}-{}:{}]",
                self.source.name, start, end.line, last
            )
        } else {
            write!(formatter, "{}:{}", self.source.name, start)
        }
    }
}

impl Debug for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, formatter)
    }
}

/// Línea y columna, ambas a partir de 1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Display for Position {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_lines_and_tabs() {
        let source = Source::new("a.stencil", "ab\n\tcd\n");

        let at_c = Location::new(&source, 4..5);
        assert_eq!(at_c.start(), Position { line: 2, column: 5 });
        assert_eq!(at_c.text(), "c");
        assert_eq!(at_c.to_string(), "a.stencil:2:5");

        let first = Location::new(&source, 0..2);
        assert_eq!(first.to_string(), "a.stencil:[1:1-1:2]");

        let end = Location::new(&source, 7..7);
        assert_eq!(end.start(), Position { line: 3, column: 1 });
    }

    #[test]
    fn lines_are_trimmed() {
        let source = Source::new("b", "one\r\ntwo");
        let mut seen = Vec::new();

        for line in 1..=3 {
            source
                .with_line(line, |text| {
                    seen.push(text.to_owned());
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(seen, vec!["one", "two"]);
    }

    #[test]
    fn spans_join_ranges() {
        let source = Source::new("c", "hello world");
        let hello = Location::new(&source, 0..5);
        let world = Location::new(&source, 6..11);

        let both = Location::span(hello, &world);
        assert_eq!(both.text(), "hello world");
        assert_eq!(both, Location::whole(&source));
    }
}
