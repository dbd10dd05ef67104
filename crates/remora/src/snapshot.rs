//! Snapshot loading.
//!
//! A snapshot is the XML serialization of a rendered page subtree, as
//! produced by the capturing side (which also stamps `data-bbox` /
//! `data-display` / `data-visibility` onto the elements it measured).
//! Serializers targeting XML escape markup but commonly leave named HTML
//! entities (`&nbsp;`, `&hellip;`, …) in place, which a strict XML parser
//! rejects; those are resolved to their characters before parsing. Bare
//! ampersands and unknown entities degrade to literal text instead of
//! failing the whole load.

use crate::dom::{Document, DocumentBuilder, NodeId};
use crate::error::{Error, Result};

/// Parses a snapshot string into a [`Document`].
pub fn parse(input: &str) -> Result<Document> {
    let cleaned = resolve_html_entities(input);
    let xml = roxmltree::Document::parse(&cleaned).map_err(|e| Error::Snapshot {
        message: e.to_string(),
    })?;

    let mut builder = DocumentBuilder::new();
    let root = build_element(&mut builder, None, xml.root_element());
    Ok(builder.finish(root))
}

fn build_element(
    builder: &mut DocumentBuilder,
    parent: Option<NodeId>,
    node: roxmltree::Node<'_, '_>,
) -> NodeId {
    let attrs = node
        .attributes()
        .map(|a| (a.name().to_ascii_lowercase(), a.value().to_string()))
        .collect();
    let id = builder.element(parent, node.tag_name().name(), attrs);
    for child in node.children() {
        if child.is_element() {
            build_element(builder, Some(id), child);
        } else if child.is_text() {
            if let Some(text) = child.text() {
                builder.text(id, text);
            }
        }
        // Comments and processing instructions are dropped.
    }
    id
}

const MAX_ENTITY_NAME: usize = 32;

fn is_xml_entity(name: &str) -> bool {
    matches!(name, "lt" | "gt" | "amp" | "quot" | "apos") || name.starts_with('#')
}

/// Replaces named HTML entities (outside the XML five) with their
/// characters so the XML parser accepts them. Unknown names and bare `&`
/// become literal ampersand text.
fn resolve_html_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match entity_end(tail) {
            Some(end) => {
                let name = &tail[1..end];
                if is_xml_entity(name) {
                    out.push_str(&tail[..=end]);
                } else {
                    let entity = &tail[..=end];
                    let resolved = htmlize::unescape(entity);
                    if resolved != entity {
                        out.push_str(&resolved);
                    } else {
                        out.push_str("&amp;");
                        out.push_str(name);
                        out.push(';');
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str("&amp;");
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Byte index of the terminating `;` of an entity starting at `&`, if the
/// run in between looks like an entity name.
fn entity_end(tail: &str) -> Option<usize> {
    let bytes = tail.as_bytes();
    for (i, &b) in bytes.iter().enumerate().skip(1).take(MAX_ENTITY_NAME) {
        match b {
            b';' => return if i > 1 { Some(i) } else { None },
            b'#' if i == 1 => {}
            _ if b.is_ascii_alphanumeric() => {}
            _ => return None,
        }
    }
    None
}
