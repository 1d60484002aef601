//! Reducción del árbol sintáctico a instrucciones.
//!
//! La reducción conserva el orden de los nodos. Tramos de markup
//! adyacentes se fusionan en una sola escritura literal; los comentarios
//! desaparecen sin interrumpir la fusión.

use crate::{
    directive,
    ir::{AttributeValue, BlockBranch, MatchArm, Statement},
    parse::{DirectiveBody, Node, ValueKind},
    source::{Located, Location},
};

/// Reduce los nodos de nivel superior de una plantilla.
pub fn lower(nodes: &[Located<Node>]) -> Vec<Located<Statement>> {
    let mut output = Vec::new();
    lower_into(nodes, true, &mut output);
    output
}

fn lower_into(nodes: &[Located<Node>], top_level: bool, output: &mut Vec<Located<Statement>>) {
    for node in nodes {
        let location = node.location();
        match node.val() {
            Node::Markup(text) => literal(output, text, location),
            Node::Comment => (),

            Node::Expression(expression) => {
                push(output, Statement::WriteExpression(expression.clone()), location)
            }

            Node::Code(code) => push(output, Statement::Code(code.clone()), location),

            Node::Control(branches) => {
                let branches = branches
                    .iter()
                    .map(|branch| BlockBranch {
                        header: branch.header.clone(),
                        body: lower_nested(&branch.body),
                    })
                    .collect();

                push(output, Statement::Block(branches), location);
            }

            Node::Match { scrutinee, arms } => {
                let arms = arms
                    .iter()
                    .map(|arm| MatchArm {
                        pattern: arm.pattern.clone(),
                        body: lower_nested(&arm.body),
                    })
                    .collect();

                let scrutinee = scrutinee.clone();
                push(output, Statement::Match { scrutinee, arms }, location);
            }

            Node::Attribute(attribute) => {
                let begin = Statement::BeginAttribute {
                    name: attribute.name.clone(),
                    prefix: attribute.prefix.clone(),
                    suffix: attribute.suffix.clone(),
                    count: attribute.values.len(),
                };

                push(output, begin, location);
                for value in &attribute.values {
                    let part = value.val();
                    let statement = Statement::AttributeValue {
                        prefix: part.prefix.clone(),
                        value: match &part.kind {
                            ValueKind::Literal(text) => AttributeValue::Literal(text.clone()),
                            ValueKind::Expression(code) => AttributeValue::Expression(code.clone()),
                        },
                    };

                    push(output, statement, value.location());
                }

                push(output, Statement::EndAttribute, location);
            }

            // Las demás directivas ya fueron consumidas por sus pases
            Node::Directive(node) if top_level && node.keyword == directive::SECTION => {
                if node.has_diagnostics() {
                    continue;
                }

                let (name, body) = match (node.tokens.first(), &node.body) {
                    (Some(name), Some(DirectiveBody::Markup(body))) => (name, body),
                    _ => continue,
                };

                let section = Statement::DefineSection {
                    name: name.val().text.clone(),
                    body: lower_nested(body),
                };

                push(output, section, location);
            }

            Node::Directive(_) => (),
        }
    }
}

fn lower_nested(nodes: &[Located<Node>]) -> Vec<Located<Statement>> {
    let mut output = Vec::new();
    lower_into(nodes, false, &mut output);
    output
}

fn push(output: &mut Vec<Located<Statement>>, statement: Statement, location: &Location) {
    output.push(Located::at(statement, location.clone()));
}

/// Agrega texto literal, fusionándolo con una escritura previa.
fn literal(output: &mut Vec<Located<Statement>>, text: &str, location: &Location) {
    match output.pop().map(Located::split) {
        Some((previous, Statement::WriteLiteral(mut merged))) => {
            merged.push_str(text);

            let location = Location::span(previous, location);
            output.push(Located::at(Statement::WriteLiteral(merged), location));
        }

        other => {
            if let Some((previous, statement)) = other {
                output.push(Located::at(statement, previous));
            }

            push(output, Statement::WriteLiteral(text.to_owned()), location);
        }
    }
}
