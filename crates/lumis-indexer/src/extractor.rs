//! Unit extraction: definitions and their raw call targets

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use tree_sitter::Node;

use crate::languages::{Grammar, MEMBER_FIELDS, NameSource, SyntaxProfile};
use crate::parser_pool::{ParseRequest, ParserPool};

/// Name given to definitions without a readable name node.
pub const ANONYMOUS: &str = "anonymous";

/// One callable definition as it appears in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedUnit {
    pub name: String,
    /// Exact text of the definition's byte range.
    pub source_text: String,
    /// Trailing identifiers of every call inside the definition, nested
    /// definitions included.
    pub calls: BTreeSet<String>,
}

/// Turns file contents into units using the parser pool.
#[derive(Clone)]
pub struct UnitExtractor {
    pool: ParserPool,
}

impl UnitExtractor {
    pub fn new(pool: ParserPool) -> Self {
        Self { pool }
    }

    /// Parse `content` and collect every definition in document order.
    pub async fn extract(&self, grammar: Grammar, content: &[u8]) -> Result<Vec<ExtractedUnit>> {
        let request = ParseRequest {
            grammar,
            content: decode(content),
        };
        let parsed = self
            .pool
            .parse(request)
            .await
            .with_context(|| format!("parsing {} source", grammar.name()))?;
        Ok(collect_units(
            parsed.tree.root_node(),
            parsed.content.as_bytes(),
            grammar.profile(),
        ))
    }

    pub fn extract_blocking(&self, grammar: Grammar, content: &[u8]) -> Result<Vec<ExtractedUnit>> {
        let request = ParseRequest {
            grammar,
            content: decode(content),
        };
        let parsed = self
            .pool
            .parse_blocking(request)
            .with_context(|| format!("parsing {} source", grammar.name()))?;
        Ok(collect_units(
            parsed.tree.root_node(),
            parsed.content.as_bytes(),
            grammar.profile(),
        ))
    }
}

fn decode(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("Source is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(content).into_owned()
        }
    }
}

/// Walk the whole tree with an explicit stack. Nested definitions are
/// emitted as units of their own.
pub fn collect_units(root: Node<'_>, source: &[u8], profile: &SyntaxProfile) -> Vec<ExtractedUnit> {
    let mut units = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if profile.is_definition(node.kind()) {
            units.push(ExtractedUnit {
                name: definition_name(node, source, profile.name),
                source_text: text_of(node, source).to_string(),
                calls: collect_calls(node, source, profile),
            });
        }
        push_children_reversed(node, &mut stack);
    }

    units
}

fn collect_calls(definition: Node<'_>, source: &[u8], profile: &SyntaxProfile) -> BTreeSet<String> {
    let mut calls = BTreeSet::new();
    let mut stack = vec![definition];

    while let Some(node) = stack.pop() {
        if let Some(site) = profile.call_site(node.kind()) {
            if let Some(callee) = node.child_by_field_name(site.callee_field) {
                if let Some(target) = trailing_identifier(callee, source) {
                    calls.insert(target);
                }
            }
        }
        push_children_reversed(node, &mut stack);
    }

    calls
}

fn push_children_reversed<'t>(node: Node<'t>, stack: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
    stack.extend(children.into_iter().rev());
}

fn definition_name(node: Node<'_>, source: &[u8], name: NameSource) -> String {
    let name_node = match name {
        NameSource::Field(field) => node.child_by_field_name(field),
        NameSource::Declarator => declarator_name(node),
    };
    name_node
        .map(|n| text_of(n, source).trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string())
}

/// Descend `declarator` fields, then `name` of a qualified identifier.
fn declarator_name(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.child_by_field_name("declarator")?;
    loop {
        if let Some(inner) = current.child_by_field_name("declarator") {
            current = inner;
        } else if current.kind() == "qualified_identifier" {
            current = current.child_by_field_name("name")?;
        } else {
            return Some(current);
        }
    }
}

/// The trailing identifier of a callee expression: `a.b.c` gives `c`,
/// `pkg::f` gives `f`, `obj->m` gives `m`.
fn trailing_identifier(callee: Node<'_>, source: &[u8]) -> Option<String> {
    let mut current = callee;
    loop {
        let next = MEMBER_FIELDS
            .iter()
            .find_map(|field| current.child_by_field_name(field))
            .or_else(|| {
                // Generic and template wrappers keep the callee in `function`.
                matches!(current.kind(), "generic_function" | "template_function")
                    .then(|| current.child_by_field_name("function"))
                    .flatten()
            });
        match next {
            Some(inner) => current = inner,
            None => break,
        }
    }

    let text = text_of(current, source);
    let tail = text
        .rsplit(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .find(|segment| segment.chars().next().is_some_and(|c| !c.is_ascii_digit()))?;
    Some(tail.to_string())
}

fn text_of<'s>(node: Node<'_>, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}
