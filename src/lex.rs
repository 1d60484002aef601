//! Análisis léxico de código Rust embebido.
//!
//! # Propósito
//! Las plantillas mezclan markup con fragmentos de código Rust: bloques
//! `@{ ... }`, expresiones explícitas `@( ... )`, encabezados de control
//! de flujo como `@if cond {` y patrones de `@match`. El parser de
//! plantillas necesita saber dónde termina cada fragmento sin entender
//! Rust. Este módulo resuelve exactamente eso: recorre código a partir
//! de una posición y se detiene en la primera frontera que corresponda
//! a un [`Stop`], con los delimitadores `()[]{}` balanceados.
//!
//! # Literales y comentarios
//! Delimitadores dentro de literales de cadena, cadenas crudas,
//! literales de carácter y comentarios no cuentan. Un apóstrofe puede
//! iniciar un literal de carácter (`'a'`, `'\n'`) o un lifetime (`'a`);
//! se distinguen por lookahead.
//!
//! # Errores
//! El scanner no se recupera: ante un delimitador desbalanceado o un
//! literal sin terminar reporta un único [`LexerError`] con la posición
//! del problema, y el parser decide cómo continuar.

use std::ops::Range;

use thiserror::Error;

/// Error de escaneo.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexerError {
    /// Se alcanzó el final del texto antes de la frontera esperada.
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(Stop),

    /// Un delimitador de cierre no corresponde con el de apertura.
    #[error("Mismatched delimiter, expected {expected:?} but found {found:?}")]
    Mismatched { expected: char, found: char },

    /// Delimitador de cierre sin apertura.
    #[error("Unexpected closing delimiter {0:?}")]
    Unopened(char),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("Unterminated block comment")]
    UnterminatedComment,
}

/// Frontera en la que se detiene el scanner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stop {
    /// Un delimitador de cierre sin pareja, ya sea `)`, `]` o `}`.
    Close(char),

    /// Una `{` a profundidad cero, como en `if cond {`.
    OpenBrace,

    /// Un `=>` a profundidad cero, como en `pat =>`.
    FatArrow,
}

impl std::fmt::Display for Stop {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stop::Close(c) => write!(fmt, "`{}`", c),
            Stop::OpenBrace => fmt.write_str("`{`"),
            Stop::FatArrow => fmt.write_str("`=>`"),
        }
    }
}

/// Un error junto al desplazamiento en bytes donde ocurrió.
pub type Failure = (usize, LexerError);

/// Máquina de estados del scanner.
///
/// La salida del scanner, así como su siguiente estado, se define a
/// partir de su estado actual y del siguiente carácter.
pub struct Scanner<'a> {
    text: &'a str,
    offset: usize,
    state: State,
    delimiters: Vec<char>,
}

/// Posibles estados del scanner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// Código ordinario.
    Code,

    /// Dentro de `"..."`.
    Str,

    /// Se encontró `\` dentro de una cadena o carácter.
    Escape(Quoted),

    /// Dentro de `r#"..."#`, con la cantidad de `#`.
    RawStr(usize),

    /// Dentro de `'x'`.
    Char,

    /// Comentario de línea.
    LineComment,

    /// Comentario de bloque, con su nivel de anidamiento.
    BlockComment(usize),
}

/// Literal al que regresa un escape.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Quoted {
    Str,
    Char,
}

impl<'a> Scanner<'a> {
    /// Crea un scanner sobre `text` a partir de `offset`.
    pub fn new(text: &'a str, offset: usize) -> Self {
        Scanner {
            text,
            offset,
            state: State::Code,
            delimiters: Vec::new(),
        }
    }

    /// Avanza hasta la frontera indicada.
    ///
    /// Retorna el rango de código recorrido, sin incluir la frontera.
    /// El scanner queda posicionado justo después de la frontera.
    pub fn scan(mut self, stop: Stop) -> Result<(Range<usize>, usize), Failure> {
        use State::*;

        let start = self.offset;
        loop {
            let rest = &self.text[self.offset..];
            let mut chars = rest.chars();

            let next_char = chars.next();
            let lookahead = chars.next();

            let here = self.offset;
            let mut step = next_char.map_or(0, char::len_utf8);

            // Switch table principal
            match (self.state, next_char) {
                (Code, None) => return Err((here, LexerError::UnexpectedEof(stop))),
                (Str | Escape(_) | RawStr(_) | Char, None) => {
                    return Err((here, LexerError::UnterminatedString))
                }

                (BlockComment(_), None) => return Err((here, LexerError::UnterminatedComment)),
                (LineComment, None) => self.state = Code,

                // Fronteras a profundidad cero
                (Code, Some(c)) if self.delimiters.is_empty() && Stop::Close(c) == stop => {
                    return Ok((start..here, here + 1))
                }

                (Code, Some('{')) if self.delimiters.is_empty() && stop == Stop::OpenBrace => {
                    return Ok((start..here, here + 1))
                }

                (Code, Some('=')) if self.delimiters.is_empty() && stop == Stop::FatArrow => {
                    if lookahead == Some('>') {
                        return Ok((start..here, here + 2));
                    }
                }

                // Delimitadores
                (Code, Some(open @ ('(' | '[' | '{'))) => self.delimiters.push(closing(open)),
                (Code, Some(close @ (')' | ']' | '}'))) => match self.delimiters.pop() {
                    Some(expected) if expected == close => (),
                    Some(expected) => {
                        return Err((here, LexerError::Mismatched { expected, found: close }))
                    }

                    None => return Err((here, LexerError::Unopened(close))),
                },

                // Comentarios
                (Code, Some('/')) if lookahead == Some('/') => {
                    self.state = LineComment;
                    step = 2;
                }

                (Code, Some('/')) if lookahead == Some('*') => {
                    self.state = BlockComment(1);
                    step = 2;
                }

                (LineComment, Some('\n')) => self.state = Code,
                (LineComment, Some(_)) => (),

                (BlockComment(depth), Some('*')) if lookahead == Some('/') => {
                    self.state = if depth == 1 { Code } else { BlockComment(depth - 1) };
                    step = 2;
                }

                (BlockComment(depth), Some('/')) if lookahead == Some('*') => {
                    self.state = BlockComment(depth + 1);
                    step = 2;
                }

                (BlockComment(_), Some(_)) => (),

                // Cadenas crudas: r"..", r#".."#, br".."
                (Code, Some(c @ ('r' | 'b'))) if !self.follows_word(here) => {
                    if let Some((hashes, length)) = raw_string_start(rest, c) {
                        self.state = RawStr(hashes);
                        step = length;
                    }
                }

                (RawStr(hashes), Some('"')) => {
                    let closes = rest[1..]
                        .chars()
                        .take(hashes)
                        .filter(|&c| c == '#')
                        .count()
                        == hashes;

                    if closes {
                        self.state = Code;
                        step = 1 + hashes;
                    }
                }

                (RawStr(_), Some(_)) => (),

                // Cadenas y caracteres
                (Code, Some('"')) => self.state = Str,
                (Str, Some('"')) => self.state = Code,
                (Str, Some('\\')) => self.state = Escape(Quoted::Str),
                (Str, Some(_)) => (),

                (Code, Some('\'')) if is_char_literal(rest) => self.state = Char,
                (Char, Some('\'')) => self.state = Code,
                (Char, Some('\\')) => self.state = Escape(Quoted::Char),
                (Char, Some(_)) => (),

                (Escape(Quoted::Str), Some(_)) => self.state = Str,
                (Escape(Quoted::Char), Some(_)) => self.state = Char,

                (Code, Some(_)) => (),
            }

            self.offset += step;
        }
    }

    /// Determina si la posición continúa un identificador.
    fn follows_word(&self, offset: usize) -> bool {
        self.text[..offset]
            .chars()
            .next_back()
            .map_or(false, is_ident_continue)
    }
}

/// Escanea desde `offset` hasta la frontera indicada.
pub fn scan(text: &str, offset: usize, stop: Stop) -> Result<(Range<usize>, usize), Failure> {
    Scanner::new(text, offset).scan(stop)
}

/// Delimitador que cierra a uno de apertura.
fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Determina si un apóstrofe inicia un literal de carácter.
///
/// `'a'` y `'\n'` son literales; `'a` seguido de otra cosa es un lifetime.
fn is_char_literal(rest: &str) -> bool {
    let mut chars = rest.chars().skip(1);
    match (chars.next(), chars.next()) {
        (Some('\\'), _) => true,
        (Some(_), Some('\'')) => true,
        _ => false,
    }
}

/// Reconoce el inicio de una cadena cruda.
///
/// Retorna la cantidad de `#` y la longitud del prefijo, comillas incluidas.
fn raw_string_start(rest: &str, first: char) -> Option<(usize, usize)> {
    let after = match first {
        'b' => rest.strip_prefix("br")?,
        _ => rest.strip_prefix('r')?,
    };

    let hashes = after.chars().take_while(|&c| c == '#').count();
    if after[hashes..].starts_with('"') {
        Some((hashes, rest.len() - after.len() + hashes + 1))
    } else {
        None
    }
}

/// Caracteres que pueden iniciar un identificador.
pub fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

/// Caracteres que pueden continuar un identificador.
pub fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Longitud en bytes del identificador al inicio de `text`.
pub fn identifier_length(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if is_ident_start(c) => (),
        _ => return 0,
    }

    chars
        .find(|&(_, c)| !is_ident_continue(c))
        .map_or(text.len(), |(index, _)| index)
}
