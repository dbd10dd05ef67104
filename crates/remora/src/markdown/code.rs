//! Preformatted blocks: diagram dispatch and fenced code fallback.

use super::{Fragment, Renderer};
use crate::dom::{Document, NodeId};
use crate::{detect, diagrams, lang};

impl Renderer<'_> {
    pub(super) fn handle_pre(&self, id: NodeId) -> Fragment {
        let svg = self.doc.first_match(id, |d, n| {
            d.tag(n) == Some("svg")
                && d.id_attr(n).is_some_and(|i| i.starts_with("mermaid-"))
        });

        let mut mermaid = svg.and_then(|svg| reconstruct_diagram(self.doc, svg));

        // A still-embedded Mermaid source block beats a raw fence.
        if mermaid.is_none() {
            let embedded = self.doc.first_match(id, |d, n| {
                d.tag(n) == Some("code")
                    && (d.has_class(n, "language-mermaid")
                        || d.has_class(n, "mermaid")
                        || d.attr(n, "data-lang") == Some("mermaid"))
            });
            if let Some(code) = embedded {
                let source = self.doc.text_content(code);
                let source = source.trim();
                if !source.is_empty() {
                    mermaid = Some(format!("```mermaid\n{source}\n```"));
                }
            }
        }

        if let Some(mermaid) = mermaid {
            // The leading newline separates the fence from inline text.
            return Fragment::Block(format!("\n{mermaid}"));
        }

        let code_el = self.doc.first_match(id, |d, n| d.tag(n) == Some("code"));
        let (text, mut language) = match code_el {
            Some(code) => (
                self.doc.text_content(code),
                language_class(self.doc, code),
            ),
            None => (self.doc.text_content(id), None),
        };
        if language.is_none() {
            language = language_class(self.doc, id);
        }
        let language = match language {
            Some(language) => language,
            None if self.options.detect_languages && !text.trim().is_empty() => {
                lang::detect(&text).to_string()
            }
            None => String::new(),
        };
        Fragment::Block(format!("```{language}\n{}\n```", text.trim()))
    }
}

fn language_class(doc: &Document, id: NodeId) -> Option<String> {
    doc.classes(id)
        .iter()
        .find_map(|c| c.strip_prefix("language-"))
        .map(str::to_string)
}

/// Staged reconstruction: the declared kind is authoritative even when
/// its reconstructor yields nothing for dataset hints to try; only then
/// do structural probes run.
pub(crate) fn reconstruct_diagram(doc: &Document, svg: NodeId) -> Option<String> {
    if let Some(kind) = detect::declared_kind(doc, svg) {
        if let Some(out) = diagrams::reconstruct(doc, svg, kind) {
            return Some(out);
        }
    }
    if let Some(kind) = detect::dataset_kind(doc, svg) {
        if let Some(out) = diagrams::reconstruct(doc, svg, kind) {
            return Some(out);
        }
    }
    if let Some(kind) = detect::structural_kind(doc, svg) {
        return diagrams::reconstruct(doc, svg, kind);
    }
    None
}

#[cfg(test)]
mod tests {
    use crate::snapshot;
    use crate::{ConvertOptions, markdown};

    fn render(input: &str) -> String {
        let doc = snapshot::parse(input).unwrap();
        markdown::convert_fragment(&doc, doc.root(), &ConvertOptions::default())
    }

    #[test]
    fn plain_code_blocks_use_the_language_class() {
        let out = render(
            r#"<body><pre><code class="language-toml">[package]
name = "x"</code></pre></body>"#,
        );
        assert_eq!(out, "```toml\n[package]\nname = \"x\"\n```\n\n");
    }

    #[test]
    fn language_is_detected_when_unlabelled() {
        let out = render("<body><pre><code>fn main() {\n    println!(\"hi\");\n}</code></pre></body>");
        assert!(out.starts_with("```rust\n"));
    }

    #[test]
    fn embedded_mermaid_source_is_refenced() {
        let out = render(
            r#"<body><pre><svg id="mermaid-1"><rect width="1" height="1"/></svg><code class="language-mermaid">graph LR
A --> B</code></pre></body>"#,
        );
        assert_eq!(out, "\n```mermaid\ngraph LR\nA --> B\n```\n\n");
    }

    #[test]
    fn unrecognizable_svg_falls_back_to_a_raw_fence() {
        let out = render(
            r#"<body><pre><svg id="mermaid-9"><text>just shapes</text></svg></pre></body>"#,
        );
        assert_eq!(out, "```\njust shapes\n```\n\n");
    }

    #[test]
    fn pre_without_code_uses_its_own_text() {
        let out = render("<body><pre>  raw text body  </pre></body>");
        assert_eq!(out, "```\nraw text body\n```\n\n");
    }
}
