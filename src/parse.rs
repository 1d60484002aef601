//! Análisis sintáctico de plantillas.
//!
//! El parser recorre el texto de una plantilla y construye un
//! [`SyntaxTree`] que distingue markup literal, expresiones, bloques de
//! código, control de flujo, atributos condicionales y directivas. El
//! código Rust embebido no se interpreta; [`crate::lex`] solamente
//! determina dónde termina.
//!
//! # Recuperación
//! Ninguna entrada hace fallar al parser. Los problemas se registran
//! como diagnósticos, ya sea en el árbol o en el nodo de directiva
//! correspondiente, y el análisis continúa. Un constructo sin terminar
//! se extiende hasta el final del archivo.

use std::{mem, ops::Range, rc::Rc};

use crate::{
    directive::{Directive, DirectiveKind, DirectiveTable, TokenKind},
    error::{CompileError, Diagnostic, Severity},
    lex::{self, identifier_length, is_ident_continue, is_ident_start, LexerError, Stop},
    source::{Located, Location, Source},
};

/// Árbol sintáctico de una plantilla.
#[derive(Debug)]
pub struct SyntaxTree {
    source: Rc<Source>,
    nodes: Vec<Located<Node>>,
    diagnostics: Vec<Diagnostic>,
}

impl SyntaxTree {
    pub fn source(&self) -> &Rc<Source> {
        &self.source
    }

    pub fn nodes(&self) -> &[Located<Node>] {
        &self.nodes
    }

    /// Diagnósticos que no pertenecen a un nodo de directiva.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Directivas de nivel superior, en orden de aparición.
    pub fn directives(&self) -> impl Iterator<Item = (&Location, &DirectiveNode)> {
        self.nodes.iter().filter_map(|node| match node.val() {
            Node::Directive(directive) => Some((node.location(), directive)),
            _ => None,
        })
    }

    /// Todos los diagnósticos del árbol, incluidos los de cada directiva.
    pub fn all_diagnostics(&self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics.clone();
        collect_diagnostics(&self.nodes, &mut diagnostics);
        diagnostics
    }
}

fn collect_diagnostics(nodes: &[Located<Node>], output: &mut Vec<Diagnostic>) {
    for node in nodes {
        match node.val() {
            Node::Directive(directive) => {
                output.extend(directive.diagnostics.iter().cloned());
                if let Some(DirectiveBody::Markup(body)) = &directive.body {
                    collect_diagnostics(body, output);
                }
            }

            Node::Control(branches) => {
                for branch in branches {
                    collect_diagnostics(&branch.body, output);
                }
            }

            Node::Match { arms, .. } => {
                for arm in arms {
                    collect_diagnostics(&arm.body, output);
                }
            }

            _ => (),
        }
    }
}

/// Un nodo del árbol sintáctico.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Texto literal, con escapes `@@` ya resueltos.
    Markup(String),

    /// `@* ... *@`
    Comment,

    /// Expresión implícita (`@a.b(c)`) o explícita (`@(a + b)`).
    Expression(String),

    /// `@{ ... }`
    Code(String),

    /// `@if`, `@for` o `@while`, junto a sus ramas `else`.
    Control(Vec<Branch>),

    /// `@match`, con cuerpos de markup en cada brazo.
    Match { scrutinee: String, arms: Vec<Arm> },

    /// Atributo de etiqueta cuyo valor contiene expresiones.
    Attribute(AttributeNode),

    Directive(DirectiveNode),
}

/// Rama de control de flujo.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    /// Encabezado Rust completo, como `else if x > 1`.
    pub header: String,
    pub body: Vec<Located<Node>>,
}

/// Brazo de un `@match`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arm {
    /// Patrón, incluyendo su guarda si existe.
    pub pattern: String,
    pub body: Vec<Located<Node>>,
}

/// Atributo condicional.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeNode {
    pub name: String,

    /// Espacio previo, nombre, `=` y comilla de apertura.
    pub prefix: String,

    /// Comilla de cierre.
    pub suffix: String,

    pub values: Vec<Located<AttributeValue>>,
}

/// Parte del valor de un atributo condicional.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    pub prefix: String,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Literal(String),
    Expression(String),
}

/// Ocurrencia de una directiva.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveNode {
    pub keyword: &'static str,
    pub tokens: Vec<Located<DirectiveToken>>,
    pub body: Option<DirectiveBody>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DirectiveNode {
    /// Texto del primer token de la clase indicada.
    pub fn token(&self, kind: TokenKind) -> Option<&Located<DirectiveToken>> {
        self.tokens.iter().find(|token| token.val().kind == kind)
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveToken {
    pub kind: TokenKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveBody {
    Code(Located<String>),
    Markup(Vec<Located<Node>>),
}

/// Construye el árbol sintáctico de una plantilla.
pub fn parse(source: &Rc<Source>, table: &DirectiveTable) -> SyntaxTree {
    let mut parser = Parser {
        source,
        text: source.text(),
        offset: 0,
        table,
        diagnostics: Vec::new(),
    };

    let nodes = parser.nodes(Scope::TopLevel);
    SyntaxTree {
        source: Rc::clone(source),
        nodes,
        diagnostics: parser.diagnostics,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scope {
    TopLevel,

    /// Cuerpo entre llaves; termina en la `}` sin pareja.
    Nested,
}

struct Parser<'a> {
    source: &'a Rc<Source>,
    text: &'a str,
    offset: usize,
    table: &'a DirectiveTable,
    diagnostics: Vec<Diagnostic>,
}

/// Acumulador de nodos que agrupa markup contiguo.
#[derive(Default)]
struct Sequence {
    nodes: Vec<Located<Node>>,
    markup: String,
    start: usize,
    end: usize,
}

impl Sequence {
    fn literal(&mut self, text: &str, at: usize) {
        if self.markup.is_empty() {
            self.start = at;
        }

        self.markup.push_str(text);
        self.end = at + text.len();
    }

    fn push(&mut self, source: &Rc<Source>, node: Node, range: Range<usize>) {
        self.flush(source);
        self.nodes.push(Located::at(node, Location::new(source, range)));
    }

    /// Descarta espacios horizontales al final del markup pendiente.
    fn trim_blanks(&mut self) {
        let length = self.markup.trim_end_matches(&[' ', '\t'][..]).len();
        self.markup.truncate(length);
    }

    fn flush(&mut self, source: &Rc<Source>) {
        if !self.markup.is_empty() {
            let markup = mem::take(&mut self.markup);
            let location = Location::new(source, self.start..self.end.max(self.start));
            self.nodes.push(Located::at(Node::Markup(markup), location));
        }
    }

    fn finish(mut self, source: &Rc<Source>) -> Vec<Located<Node>> {
        self.flush(source);
        self.nodes
    }
}

/// Una pieza de una etiqueta reconocida.
enum Piece {
    Markup(String, usize),
    Attribute(AttributeNode, Range<usize>),
}

/// Resultado de recorrer el valor entre comillas de un atributo.
struct AttributeScan {
    parts: Vec<Located<AttributeValue>>,
    literal: String,
    end: usize,
}

impl<'a> Parser<'a> {
    fn nodes(&mut self, scope: Scope) -> Vec<Located<Node>> {
        let mut sequence = Sequence::default();
        let mut depth = 0usize;

        while let Some(c) = self.peek() {
            let at = self.offset;
            match c {
                '@' => self.transition(&mut sequence, scope),

                '<' => match self.tag(at) {
                    Some((pieces, end)) => {
                        for piece in pieces {
                            match piece {
                                Piece::Markup(text, start) => sequence.literal(&text, start),
                                Piece::Attribute(node, range) => {
                                    sequence.push(self.source, Node::Attribute(node), range)
                                }
                            }
                        }

                        self.offset = end;
                    }

                    None => {
                        sequence.literal("<", at);
                        self.offset += 1;
                    }
                },

                // Llaves literales dentro de un cuerpo deben estar balanceadas
                '{' if scope == Scope::Nested => {
                    depth += 1;
                    sequence.literal("{", at);
                    self.offset += 1;
                }

                '}' if scope == Scope::Nested => {
                    if depth == 0 {
                        break;
                    }

                    depth -= 1;
                    sequence.literal("}", at);
                    self.offset += 1;
                }

                c => {
                    let length = c.len_utf8();
                    sequence.literal(&self.text[at..at + length], at);
                    self.offset += length;
                }
            }
        }

        sequence.finish(self.source)
    }

    /// Procesa lo que sigue a un `@`.
    fn transition(&mut self, sequence: &mut Sequence, scope: Scope) {
        let at = self.offset;
        match self.text[at + 1..].chars().next() {
            Some('@') => {
                sequence.literal("@", at);
                self.offset = at + 2;
            }

            // Direcciones de correo
            Some(c) if c.is_alphanumeric() && self.follows_alphanumeric(at) => {
                sequence.literal("@", at);
                self.offset = at + 1;
            }

            Some('*') => self.comment(sequence, at),
            Some('(') => self.explicit(sequence, at),
            Some('{') => self.code_block(sequence, at),
            Some(c) if is_ident_start(c) => self.word(sequence, at, scope),

            _ => {
                let error = CompileError::Syntax(String::from(
                    "expected an expression, a code block or a directive after `@`",
                ));

                let location = self.location(at..at + 1);
                self.diagnostics
                    .push(Diagnostic::error(error, Some(location)).severity(Severity::Warning));

                sequence.literal("@", at);
                self.offset = at + 1;
            }
        }
    }

    fn comment(&mut self, sequence: &mut Sequence, at: usize) {
        let body = at + 2;
        let end = match self.text[body..].find("*@") {
            Some(index) => body + index + 2,
            None => {
                let end = self.text.len();
                self.syntax_error("unterminated comment, expected `*@`", at..end);
                end
            }
        };

        sequence.push(self.source, Node::Comment, at..end);
        self.offset = end;
    }

    fn explicit(&mut self, sequence: &mut Sequence, at: usize) {
        if let Some((code, end)) = self.code(at + 2, Stop::Close(')')) {
            let expression = self.text[code].trim().to_owned();
            sequence.push(self.source, Node::Expression(expression), at..end);
            self.offset = end;
        }
    }

    fn code_block(&mut self, sequence: &mut Sequence, at: usize) {
        let line_only = self.is_line_start(at);
        if let Some((code, end)) = self.code(at + 2, Stop::Close('}')) {
            if line_only {
                sequence.trim_blanks();
            }

            let code = self.text[code].to_owned();
            sequence.push(self.source, Node::Code(code), at..end);

            self.offset = end;
            if line_only {
                self.skip_line_end();
            }
        }
    }

    /// Palabra clave de control de flujo, directiva o expresión implícita.
    fn word(&mut self, sequence: &mut Sequence, at: usize, scope: Scope) {
        let text = self.text;
        let table = self.table;

        let start = at + 1;
        let end = start + identifier_length(&text[start..]);
        let after = text[end..].chars().next();

        match &text[start..end] {
            "if" | "for" | "while" => self.control(sequence, at),
            "match" => self.match_block(sequence, at),

            word => match table.get(word) {
                Some(directive) if directive_boundary(directive, after) => {
                    self.directive(sequence, at, directive, scope)
                }

                _ => self.implicit(sequence, at),
            },
        }
    }

    fn implicit(&mut self, sequence: &mut Sequence, at: usize) {
        match self.implicit_end(at + 1) {
            Ok(end) => {
                let expression = self.text[at + 1..end].to_owned();
                sequence.push(self.source, Node::Expression(expression), at..end);
                self.offset = end;
            }

            Err(failure) => self.recover(failure),
        }
    }

    /// Determina el final de una expresión implícita.
    ///
    /// Una expresión implícita es un identificador seguido de cualquier
    /// cantidad de `::ident`, `.ident`, `(...)`, `[...]` o `!(...)`.
    fn implicit_end(&self, start: usize) -> Result<usize, lex::Failure> {
        let text = self.text;
        let mut end = start + identifier_length(&text[start..]);

        loop {
            let rest = &text[end..];
            if let Some(after) = rest.strip_prefix("::") {
                match identifier_length(after) {
                    0 => break,
                    length => end += 2 + length,
                }
            } else if let Some(after) = rest.strip_prefix('.') {
                match identifier_length(after) {
                    0 => break,
                    length => end += 1 + length,
                }
            } else if rest.starts_with('(') {
                end = lex::scan(text, end + 1, Stop::Close(')'))?.1;
            } else if rest.starts_with('[') {
                end = lex::scan(text, end + 1, Stop::Close(']'))?.1;
            } else if rest.starts_with("!(") {
                end = lex::scan(text, end + 2, Stop::Close(')'))?.1;
            } else {
                break;
            }
        }

        Ok(end)
    }

    /// `@if`, `@for` y `@while`.
    fn control(&mut self, sequence: &mut Sequence, at: usize) {
        let is_if = self.text[at + 1..].starts_with("if");

        let mut branches = Vec::new();
        let mut header_start = at + 1;
        loop {
            let (header, body_start) = match self.code(header_start, Stop::OpenBrace) {
                Some(found) => found,
                None => return,
            };

            let header = self.text[header].trim().to_owned();
            self.offset = body_start;

            let body = self.nodes(Scope::Nested);
            let closed = self.close_block(at);
            branches.push(Branch { header, body });

            if !closed || !is_if {
                break;
            }

            let rest = &self.text[self.offset..];
            let trimmed = rest.trim_start();
            if !starts_with_word(trimmed, "else") {
                break;
            }

            header_start = self.offset + (rest.len() - trimmed.len());
        }

        sequence.push(self.source, Node::Control(branches), at..self.offset);
    }

    fn match_block(&mut self, sequence: &mut Sequence, at: usize) {
        let text = self.text;
        let (scrutinee, mut cursor) = match self.code(at + 1 + "match".len(), Stop::OpenBrace) {
            Some((range, after)) => (text[range].trim().to_owned(), after),
            None => return,
        };

        let mut arms = Vec::new();
        loop {
            cursor = skip_while(text, cursor, |c| c.is_whitespace() || c == ',');
            match text[cursor..].chars().next() {
                None => {
                    self.syntax_error("unterminated `match`, expected `}`", at..text.len());
                    self.offset = text.len();
                    break;
                }

                Some('}') => {
                    self.offset = cursor + 1;
                    break;
                }

                Some(_) => (),
            }

            let (pattern, after_arrow) = match self.code(cursor, Stop::FatArrow) {
                Some((range, after)) => (text[range].trim().to_owned(), after),
                None => return,
            };

            let body_start = skip_while(text, after_arrow, char::is_whitespace);
            if !text[body_start..].starts_with('{') {
                self.syntax_error(
                    "`match` arms in templates must have a `{ ... }` body",
                    after_arrow..body_start + 1,
                );

                self.offset = match lex::scan(text, body_start, Stop::Close('}')) {
                    Ok((_, after)) => after,
                    Err(_) => text.len(),
                };

                break;
            }

            self.offset = body_start + 1;
            let body = self.nodes(Scope::Nested);
            let closed = self.close_block(at);

            arms.push(Arm { pattern, body });
            if !closed {
                break;
            }

            cursor = self.offset;
        }

        sequence.push(self.source, Node::Match { scrutinee, arms }, at..self.offset);
    }

    fn directive(
        &mut self,
        sequence: &mut Sequence,
        at: usize,
        directive: &'a Directive,
        scope: Scope,
    ) {
        let text = self.text;
        let line_only = self.is_line_start(at);

        let keyword_end = at + 1 + directive.keyword.len();
        let line_end = text[keyword_end..]
            .find('\n')
            .map_or(text.len(), |index| keyword_end + index);

        let region_end = match directive.kind {
            DirectiveKind::SingleLine => line_end,
            _ => text[keyword_end..line_end]
                .find('{')
                .map_or(line_end, |index| keyword_end + index),
        };

        let mut diagnostics = Vec::new();
        let tokens = self.directive_tokens(directive, keyword_end..region_end, &mut diagnostics);

        let mut end = region_end;
        let body = match directive.kind {
            DirectiveKind::SingleLine => None,

            kind => {
                let open = skip_while(text, region_end, char::is_whitespace);
                if !text[open..].starts_with('{') {
                    diagnostics.push(self.malformed(directive, "expected `{`", at..open));
                    None
                } else if kind == DirectiveKind::CodeBlock {
                    match self.code(open + 1, Stop::Close('}')) {
                        Some((code, after)) => {
                            end = after;
                            let location = self.location(code.clone());
                            Some(DirectiveBody::Code(Located::at(text[code].to_owned(), location)))
                        }

                        None => {
                            end = self.offset;
                            None
                        }
                    }
                } else {
                    self.offset = open + 1;
                    let body = self.nodes(Scope::Nested);

                    self.close_block(at);
                    end = self.offset;
                    Some(DirectiveBody::Markup(body))
                }
            }
        };

        if scope == Scope::Nested {
            let error = CompileError::NestedDirective(directive.keyword);
            diagnostics.push(Diagnostic::error(error, Some(self.location(at..end))));
        }

        if line_only {
            sequence.trim_blanks();
        }

        let node = DirectiveNode {
            keyword: directive.keyword,
            tokens,
            body,
            diagnostics,
        };

        sequence.push(self.source, Node::Directive(node), at..end);
        self.offset = end;

        if line_only || directive.kind == DirectiveKind::SingleLine {
            self.skip_line_end();
        }
    }

    /// Interpreta los tokens de una directiva según su gramática.
    fn directive_tokens(
        &self,
        directive: &Directive,
        region: Range<usize>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<Located<DirectiveToken>> {
        let text = self.text;
        let mut tokens = Vec::new();
        let mut cursor = region.start;

        for spec in &directive.tokens {
            cursor = skip_while(&text[..region.end], cursor, char::is_whitespace);
            let rest = text[cursor..region.end].trim_end();

            let length = match token_length(spec.kind, rest) {
                Ok(Some(length)) => length,
                Ok(None) if spec.optional => continue,
                Ok(None) => {
                    let reason = format!("expected {}", spec.kind);
                    diagnostics.push(self.malformed(directive, reason, region.clone()));
                    break;
                }

                Err(reason) => {
                    diagnostics.push(self.malformed(directive, reason, cursor..region.end));
                    break;
                }
            };

            let token = DirectiveToken {
                kind: spec.kind,
                text: token_value(spec.kind, &rest[..length]),
            };

            tokens.push(Located::at(token, self.location(cursor..cursor + length)));
            cursor += length;
        }

        let leftover = text[cursor.min(region.end)..region.end].trim();
        if diagnostics.is_empty() && !leftover.is_empty() {
            let reason = format!("unexpected `{}`", leftover);
            diagnostics.push(self.malformed(directive, reason, cursor..region.end));
        }

        tokens
    }

    /// Intenta reconocer una etiqueta de apertura en `at`.
    ///
    /// Solo se reconocen etiquetas para detectar atributos condicionales.
    /// Ante cualquier forma inesperada se retorna `None` y el `<` se
    /// trata como texto.
    fn tag(&self, at: usize) -> Option<(Vec<Piece>, usize)> {
        let text = self.text;
        let name_start = at + 1;
        if !text[name_start..]
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_alphabetic())
        {
            return None;
        }

        let name_end = skip_while(text, name_start, |c| {
            !(c.is_whitespace() || c == '>' || c == '/')
        });

        let mut pieces = Vec::new();
        let mut markup = text[at..name_end].to_owned();
        let mut markup_start = at;
        let mut cursor = name_end;

        loop {
            let space_start = cursor;
            cursor = skip_while(text, cursor, char::is_whitespace);

            let rest = &text[cursor..];
            if rest.starts_with('>') || rest.starts_with("/>") {
                let close = if rest.starts_with('>') { 1 } else { 2 };
                markup.push_str(&text[space_start..cursor + close]);
                cursor += close;
                break;
            }

            match rest.chars().next()? {
                '@' | '"' | '\'' | '=' | '<' | '{' | '}' => return None,
                _ => (),
            }

            let name_end = skip_while(text, cursor, |c| {
                !(c.is_whitespace() || matches!(c, '=' | '>' | '/' | '"' | '\'' | '<' | '@'))
            });

            let name = &text[cursor..name_end];
            let equals = skip_while(text, name_end, char::is_whitespace);
            if !text[equals..].starts_with('=') {
                // Atributo sin valor
                markup.push_str(&text[space_start..name_end]);
                cursor = name_end;
                continue;
            }

            let value_start = skip_while(text, equals + 1, char::is_whitespace);
            let quote = match text[value_start..].chars().next()? {
                quote @ ('"' | '\'') => quote,
                _ => {
                    let value_end = skip_while(text, value_start, |c| {
                        !(c.is_whitespace() || c == '>')
                    });

                    markup.push_str(&text[space_start..value_end]);
                    cursor = value_end;
                    continue;
                }
            };

            let scan = self.attribute_value(value_start + 1, quote)?;
            let end = scan.end + quote.len_utf8();
            let prefix = &text[space_start..value_start + 1];

            if scan.parts.is_empty() {
                markup.push_str(prefix);
                markup.push_str(&scan.literal);
                markup.push(quote);
            } else {
                if !markup.is_empty() {
                    pieces.push(Piece::Markup(mem::take(&mut markup), markup_start));
                }

                let node = AttributeNode {
                    name: name.to_owned(),
                    prefix: prefix.to_owned(),
                    suffix: quote.to_string(),
                    values: scan.parts,
                };

                pieces.push(Piece::Attribute(node, space_start..end));
                markup_start = end;
            }

            cursor = end;
        }

        if !markup.is_empty() {
            pieces.push(Piece::Markup(markup, markup_start));
        }

        Some((pieces, cursor))
    }

    /// Recorre el valor de un atributo hasta la comilla de cierre.
    ///
    /// Los tramos literales máximos se vuelven partes literales sin
    /// prefijo, excepto un tramo de solo espacios que precede a una
    /// expresión, el cual se vuelve el prefijo de esta.
    fn attribute_value(&self, from: usize, quote: char) -> Option<AttributeScan> {
        let text = self.text;
        let mut parts = Vec::new();
        let mut pending = String::new();
        let mut pending_start = from;
        let mut cursor = from;

        loop {
            let c = text[cursor..].chars().next()?;
            if c == quote {
                break;
            }

            if c != '@' {
                pending.push(c);
                cursor += c.len_utf8();
                continue;
            }

            let dynamic = match text[cursor + 1..].chars().next() {
                Some('@') => {
                    pending.push('@');
                    cursor += 2;
                    continue;
                }

                Some(next) if next.is_alphanumeric() && self.follows_alphanumeric(cursor) => None,

                Some('(') => {
                    let (code, after) = lex::scan(text, cursor + 2, Stop::Close(')')).ok()?;
                    Some((text[code].trim().to_owned(), after))
                }

                Some(next) if is_ident_start(next) => {
                    let end = self.implicit_end(cursor + 1).ok()?;
                    Some((text[cursor + 1..end].to_owned(), end))
                }

                _ => None,
            };

            let (expression, after) = match dynamic {
                Some(dynamic) => dynamic,
                None => {
                    pending.push('@');
                    cursor += 1;
                    continue;
                }
            };

            let blank = !pending.is_empty() && pending.chars().all(char::is_whitespace);
            let prefix = if blank {
                mem::take(&mut pending)
            } else {
                if !pending.is_empty() {
                    let literal = AttributeValue {
                        prefix: String::new(),
                        kind: ValueKind::Literal(mem::take(&mut pending)),
                    };

                    parts.push(Located::at(literal, self.location(pending_start..cursor)));
                }

                String::new()
            };

            let value = AttributeValue {
                prefix,
                kind: ValueKind::Expression(expression),
            };

            let start = if blank { pending_start } else { cursor };
            parts.push(Located::at(value, self.location(start..after)));

            cursor = after;
            pending_start = after;
        }

        let literal = if parts.is_empty() {
            pending
        } else {
            if !pending.is_empty() {
                let literal = AttributeValue {
                    prefix: String::new(),
                    kind: ValueKind::Literal(pending),
                };

                parts.push(Located::at(literal, self.location(pending_start..cursor)));
            }

            String::new()
        };

        Some(AttributeScan {
            parts,
            literal,
            end: cursor,
        })
    }

    /// Consume la `}` que cierra un cuerpo.
    fn close_block(&mut self, at: usize) -> bool {
        if self.peek() == Some('}') {
            self.offset += 1;
            true
        } else {
            self.syntax_error("unterminated block, expected `}`", at..self.text.len());
            self.offset = self.text.len();
            false
        }
    }

    /// Escanea código Rust, registrando un diagnóstico si falla.
    fn code(&mut self, from: usize, stop: Stop) -> Option<(Range<usize>, usize)> {
        match lex::scan(self.text, from, stop) {
            Ok(found) => Some(found),
            Err(failure) => {
                self.recover(failure);
                None
            }
        }
    }

    fn recover(&mut self, (offset, error): lex::Failure) {
        let resume = match error {
            LexerError::Mismatched { .. } | LexerError::Unopened(_) => offset + 1,
            _ => self.text.len(),
        };

        let end = (offset + 1).min(self.text.len());
        self.diagnostics.push(Diagnostic::error(
            CompileError::Syntax(error.to_string()),
            Some(self.location(offset..end.max(offset))),
        ));

        self.offset = resume;
    }

    fn syntax_error<S: Into<String>>(&mut self, message: S, range: Range<usize>) {
        let location = self.location(range);
        self.diagnostics.push(Diagnostic::error(
            CompileError::Syntax(message.into()),
            Some(location),
        ));
    }

    fn malformed<S: Into<String>>(
        &self,
        directive: &Directive,
        reason: S,
        range: Range<usize>,
    ) -> Diagnostic {
        let error = CompileError::MalformedDirective {
            directive: directive.keyword,
            reason: reason.into(),
        };

        Diagnostic::error(error, Some(self.location(range)))
    }

    /// Consume el resto de la línea si solo contiene espacios.
    fn skip_line_end(&mut self) {
        let rest = &self.text[self.offset..];
        let line = rest.find('\n').map_or(rest, |index| &rest[..=index]);
        if line.trim().is_empty() {
            self.offset += line.len();
        }
    }

    /// Determina si solo hay espacios entre el inicio de la línea y `at`.
    fn is_line_start(&self, at: usize) -> bool {
        self.text[..at]
            .chars()
            .rev()
            .take_while(|&c| c != '\n')
            .all(|c| c == ' ' || c == '\t')
    }

    fn follows_alphanumeric(&self, at: usize) -> bool {
        self.text[..at]
            .chars()
            .next_back()
            .map_or(false, char::is_alphanumeric)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.offset..].chars().next()
    }

    fn location(&self, range: Range<usize>) -> Location {
        Location::new(self.source, range)
    }
}

/// Determina si una palabra clave de directiva termina donde debe.
fn directive_boundary(directive: &Directive, after: Option<char>) -> bool {
    match after {
        None => true,
        Some(c) if c.is_whitespace() => true,
        Some('{') => directive.kind != DirectiveKind::SingleLine,
        Some(_) => false,
    }
}

/// Avanza mientras se cumpla el predicado.
fn skip_while<P: Fn(char) -> bool>(text: &str, from: usize, predicate: P) -> usize {
    text[from..]
        .char_indices()
        .find(|&(_, c)| !predicate(c))
        .map_or(text.len(), |(index, _)| from + index)
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.strip_prefix(word)
        .map_or(false, |rest| !rest.chars().next().map_or(false, is_ident_continue))
}

/// Longitud del token de una directiva al inicio de `rest`.
///
/// `Ok(None)` indica que el token no está presente.
fn token_length(kind: TokenKind, rest: &str) -> Result<Option<usize>, String> {
    if rest.is_empty() {
        return Ok(None);
    }

    let length = match kind {
        TokenKind::Text => rest.len(),

        // Un tipo siempre abarca el resto de la línea
        TokenKind::Type => {
            syn::parse_str::<syn::Type>(rest)
                .map_err(|_| format!("`{}` is not a valid type", rest))?;

            rest.len()
        }

        TokenKind::Constraint => {
            if !starts_with_word(rest, "where") {
                return Ok(None);
            }

            rest.len()
        }

        TokenKind::Member => match identifier_length(rest) {
            0 => return Err(format!("expected an identifier, found `{}`", rest)),
            length => length,
        },

        TokenKind::Namespace => {
            let length = rest
                .char_indices()
                .find(|&(_, c)| !(is_ident_continue(c) || c == '.' || c == ':'))
                .map_or(rest.len(), |(index, _)| index);

            let valid = !rest[..length].is_empty()
                && namespace_segments(&rest[..length])
                    .all(|segment| !segment.is_empty() && identifier_length(segment) == segment.len());

            if !valid {
                return Err(format!("`{}` is not a valid namespace", &rest[..length]));
            }

            length
        }

        TokenKind::String => {
            if !rest.starts_with('"') {
                return Err(String::from("expected a string literal"));
            }

            let mut escaped = false;
            let close = rest[1..].char_indices().find(|&(_, c)| {
                let found = c == '"' && !escaped;
                escaped = c == '\\' && !escaped;
                found
            });

            match close {
                Some((index, _)) => index + 2,
                None => return Err(String::from("unterminated string literal")),
            }
        }

        TokenKind::Boolean => match &rest[..identifier_length(rest)] {
            "true" => 4,
            "false" => 5,
            _ => return Err(String::from("expected `true` or `false`")),
        },

        TokenKind::Attribute => {
            if !rest.starts_with("#[") {
                return Err(String::from("expected an attribute `#[...]`"));
            }

            lex::scan(rest, 2, Stop::Close(']'))
                .map_err(|(_, error)| error.to_string())?
                .1
        }
    };

    Ok(Some(length))
}

/// Texto normalizado de un token.
fn token_value(kind: TokenKind, raw: &str) -> String {
    match kind {
        TokenKind::String => raw[1..raw.len() - 1].to_owned(),
        TokenKind::Text => raw.trim_end_matches(';').trim().to_owned(),
        TokenKind::Namespace => namespace_segments(raw).collect::<Vec<_>>().join("."),
        _ => raw.trim().to_owned(),
    }
}

/// Segmentos de un espacio de nombres, separado por `.` o `::`.
pub fn namespace_segments(namespace: &str) -> impl Iterator<Item = &str> {
    namespace.split("::").flat_map(|part| part.split('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(text: &str) -> SyntaxTree {
        let source = Source::new("test.stencil", text);
        parse(&source, &DirectiveTable::standard())
    }

    fn shapes(text: &str) -> Vec<Node> {
        let tree = tree(text);
        assert!(tree.all_diagnostics().is_empty(), "{:?}", tree.all_diagnostics());
        tree.nodes().iter().map(|node| node.val().clone()).collect()
    }

    fn markup(text: &str) -> Node {
        Node::Markup(text.to_owned())
    }

    fn expression(text: &str) -> Node {
        Node::Expression(text.to_owned())
    }

    #[test]
    fn escapes_and_email() {
        assert_eq!(
            shapes("mail me@example.com, @@handle"),
            vec![markup("mail me@example.com, @handle")]
        );
    }

    #[test]
    fn implicit_expressions() {
        assert_eq!(
            shapes("Hi @user.name! @items[0].len() @format!(\"{}\", x).@a::b"),
            vec![
                markup("Hi "),
                expression("user.name"),
                markup("! "),
                expression("items[0].len()"),
                markup(" "),
                expression("format!(\"{}\", x)"),
                markup("."),
                expression("a::b"),
            ]
        );
    }

    #[test]
    fn explicit_and_code() {
        assert_eq!(
            shapes("<b>@(a + b)</b>\n@{\n    let x = \"}\";\n}\nend@* note *@"),
            vec![
                markup("<b>"),
                expression("a + b"),
                markup("</b>\n"),
                Node::Code(String::from("\n    let x = \"}\";\n")),
                markup("end"),
                Node::Comment,
            ]
        );
    }

    #[test]
    fn control_flow_branches() {
        let nodes = shapes("@if a > 1 { <i>{x}</i> } else if b { B } else { C }!");
        let branches = match &nodes[0] {
            Node::Control(branches) => branches,
            other => panic!("unexpected node: {:?}", other),
        };

        let headers: Vec<_> = branches.iter().map(|branch| branch.header.as_str()).collect();
        assert_eq!(headers, vec!["if a > 1", "else if b", "else"]);

        let first: Vec<_> = branches[0].body.iter().map(|node| node.val().clone()).collect();
        assert_eq!(first, vec![markup(" <i>{x}</i> ")]);
        assert_eq!(nodes[1], markup("!"));
    }

    #[test]
    fn loops_and_match() {
        let nodes = shapes("@for x in xs {@x,}@match v { Some(y) if y > 0 => { +@y } _ => {none} }");
        assert!(matches!(&nodes[0], Node::Control(branches) if branches[0].header == "for x in xs"));

        match &nodes[1] {
            Node::Match { scrutinee, arms } => {
                assert_eq!(scrutinee, "v");
                assert_eq!(arms[0].pattern, "Some(y) if y > 0");
                assert_eq!(arms[1].pattern, "_");
                assert_eq!(arms[1].body[0].val(), &markup("none"));
            }

            other => panic!("unexpected node: {:?}", other),
        }
    }

    #[test]
    fn conditional_attributes_split() {
        let nodes = shapes("<p class=\"a @v b\" id='x'>");
        assert_eq!(nodes[0], markup("<p"));

        let attribute = match &nodes[1] {
            Node::Attribute(attribute) => attribute,
            other => panic!("unexpected node: {:?}", other),
        };

        assert_eq!(attribute.name, "class");
        assert_eq!(attribute.prefix, " class=\"");
        assert_eq!(attribute.suffix, "\"");

        let values: Vec<_> = attribute.values.iter().map(|value| value.val().clone()).collect();
        assert_eq!(
            values,
            vec![
                AttributeValue {
                    prefix: String::new(),
                    kind: ValueKind::Literal(String::from("a ")),
                },
                AttributeValue {
                    prefix: String::new(),
                    kind: ValueKind::Expression(String::from("v")),
                },
                AttributeValue {
                    prefix: String::new(),
                    kind: ValueKind::Literal(String::from(" b")),
                },
            ]
        );

        assert_eq!(nodes[2], markup(" id='x'>"));
    }

    #[test]
    fn whitespace_prefixes_dynamic_values() {
        let nodes = shapes("<a href=\"@url\" title=\" @(t)\" data-x=\"mailto:a@b.c\">");
        let prefixes: Vec<_> = nodes
            .iter()
            .filter_map(|node| match node {
                Node::Attribute(attribute) => Some(attribute.values[0].val().prefix.clone()),
                _ => None,
            })
            .collect();

        assert_eq!(prefixes, vec!["", " "]);
        assert_eq!(nodes.last(), Some(&markup(" data-x=\"mailto:a@b.c\">")));
    }

    #[test]
    fn directives_and_tokens() {
        let tree = tree("@inherits HtmlTemplate<Vec<u8>>\n@typeparam T where T: Clone\n<p>");
        assert!(tree.all_diagnostics().is_empty());

        let directives: Vec<_> = tree.directives().map(|(_, directive)| directive).collect();
        assert_eq!(directives[0].keyword, "inherits");
        assert_eq!(directives[0].tokens[0].val().text, "HtmlTemplate<Vec<u8>>");
        assert_eq!(directives[1].tokens[0].val().text, "T");
        assert_eq!(directives[1].tokens[1].val().text, "where T: Clone");

        // Las líneas de directivas no dejan rastro en el markup
        assert_eq!(tree.nodes().last().map(|node| node.val()), Some(&markup("<p>")));
    }

    #[test]
    fn sections_and_functions() {
        let tree = tree("@section Scripts {\n<script>@x</script>\n}\n@functions {\n    fn f(&self) {}\n}\n");
        let directives: Vec<_> = tree.directives().map(|(_, directive)| directive).collect();

        assert!(matches!(&directives[0].body, Some(DirectiveBody::Markup(body)) if body.len() == 3));
        assert!(matches!(
            &directives[1].body,
            Some(DirectiveBody::Code(code)) if code.val().trim() == "fn f(&self) {}"
        ));
        assert_eq!(tree.nodes().len(), 2);
    }

    #[test]
    fn nested_directives_are_rejected() {
        let tree = tree("@if x {\n@section s { a }\n}");
        let codes: Vec<_> = tree.all_diagnostics().iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec!["STC1005"]);
    }

    #[test]
    fn malformed_directives() {
        let tree = tree("@namespace a..b\n@typeparam\n@inherits Vec<\n");
        let codes: Vec<_> = tree.all_diagnostics().iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec!["STC1004", "STC1004", "STC1004"]);
    }

    #[test]
    fn unterminated_constructs_do_not_panic() {
        for text in ["@(a + (b", "@{ let x = 1;", "@if x { <p>", "@* open", "@match x { a => b }", "<a href=\"@x"] {
            let tree = tree(text);
            assert!(!tree.all_diagnostics().is_empty() || text.starts_with("<a"), "{}", text);
        }
    }

    #[test]
    fn directive_keywords_as_expressions() {
        assert_eq!(shapes("@section.title"), vec![expression("section.title")]);
    }
}
