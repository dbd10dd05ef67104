//! Hyperlink and image rendering, including the source-citation pattern
//! used by documentation pages: hrefs ending in `#L<start>[-L<end>]` get
//! their display text rebuilt as `<filename> L<start>[-L<end>]`, with an
//! optional `Sources: […]` wrapper preserved.

use super::{Fragment, Renderer};
use crate::dom::NodeId;
use regex::Regex;
use std::sync::OnceLock;

fn line_fragment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#L(\d+)(?:-L(\d+))?$").expect("valid regex"))
}

fn sources_wrapper_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Sources:\s+\[(.*)\]$").expect("valid regex"))
}

fn filename_hint_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w/\.-]+(?:\.\w+)?").expect("valid regex"))
}

fn is_navigable(href: &str) -> bool {
    href.starts_with("http")
        || href.starts_with('/')
        || href.starts_with('#')
        || href.starts_with("mailto:")
}

impl Renderer<'_> {
    pub(super) fn handle_anchor(&self, id: NodeId, depth: usize) -> Fragment {
        let href = self.doc.attr(id, "href").unwrap_or("");
        let initial = self.render_children(id, depth + 1);
        let mut text = initial.trim().to_string();

        if text.is_empty() {
            if let Some(img) = self.doc.first_match(id, |d, n| d.tag(n) == Some("img")) {
                text = self
                    .doc
                    .attr(img, "alt")
                    .filter(|a| !a.is_empty())
                    .unwrap_or("image")
                    .to_string();
            }
        }

        // Anything not laid out strictly inline becomes its own block.
        let block = self.doc.computed_display(id) != "inline";
        if !href.is_empty() && is_navigable(href) {
            let display = citation_text(href, &initial).unwrap_or(text);
            let display = if display.trim().is_empty() {
                href.to_string()
            } else {
                display.trim().to_string()
            };
            let link = format!("[{display}]({href})");
            if block {
                Fragment::Block(link)
            } else {
                Fragment::Inline(link)
            }
        } else {
            let text = if text.is_empty() { href.to_string() } else { text };
            if block && !text.trim().is_empty() {
                Fragment::Block(text)
            } else {
                Fragment::Inline(text)
            }
        }
    }

    pub(super) fn handle_image(&self, id: NodeId) -> Fragment {
        // Images inside links are the link's problem.
        if self
            .doc
            .parent(id)
            .and_then(|p| self.doc.closest(p, |d, n| d.tag(n) == Some("a")))
            .is_some()
        {
            return Fragment::Empty;
        }
        match self.doc.attr(id, "src").filter(|s| !s.is_empty()) {
            Some(src) => {
                let alt = self.doc.attr(id, "alt").unwrap_or("");
                Fragment::Block(format!("![{alt}]({src})"))
            }
            None => Fragment::Empty,
        }
    }
}

/// Rebuilds the display text for a source-citation link, or `None` when
/// the href carries no line fragment.
fn citation_text(href: &str, initial_text: &str) -> Option<String> {
    let caps = line_fragment_regex().captures(href)?;
    let start_line = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let end_line = caps.get(2).map(|m| m.as_str());

    let path_part = &href[..href.find('#').unwrap_or(href.len())];
    let filename_from_path = path_part
        .rsplit('/')
        .next()
        .filter(|f| !f.is_empty())
        .unwrap_or("link");

    let trimmed = initial_text.trim();
    let is_sources = trimmed.starts_with("Sources: [") && trimmed.ends_with(']');
    let text_to_parse = if is_sources {
        sources_wrapper_regex()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .unwrap_or(trimmed)
    } else {
        trimmed
    };

    // The text's own filename hint wins when it actually appears in the
    // href path.
    let mut display_filename = filename_from_path;
    if let Some(hint) = filename_hint_regex().find(text_to_parse) {
        if !hint.as_str().is_empty() && path_part.contains(hint.as_str()) {
            display_filename = hint.as_str();
        }
    }

    let line_ref = match end_line {
        Some(end) if end != start_line => format!("L{start_line}-L{end}"),
        _ => format!("L{start_line}"),
    };
    let constructed = format!("{display_filename} {line_ref}");
    Some(if is_sources {
        format!("Sources: [{constructed}]")
    } else {
        constructed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot;
    use crate::{ConvertOptions, markdown};

    fn render(input: &str) -> String {
        let doc = snapshot::parse(input).unwrap();
        markdown::convert_fragment(&doc, doc.root(), &ConvertOptions::default())
    }

    #[test]
    fn plain_links_render_inline() {
        let out = render(r#"<body><p>see <a href="https://e.com/d">docs</a>.</p></body>"#);
        assert_eq!(out, "see [docs](https://e.com/d).\n\n");
    }

    #[test]
    fn empty_link_text_falls_back_to_image_alt_then_href() {
        let out = render(r#"<body><p><a href="/x"><img src="i.png" alt="pic"/></a></p></body>"#);
        assert_eq!(out, "[pic](/x)\n\n");
        let out = render(r#"<body><p><a href="/y"></a></p></body>"#);
        assert_eq!(out, "[/y](/y)\n\n");
    }

    #[test]
    fn non_navigable_links_render_as_text() {
        let out = render(r#"<body><p><a href="javascript:void(0)">click</a></p></body>"#);
        assert_eq!(out, "click\n\n");
    }

    #[test]
    fn citation_text_rebuilds_line_references() {
        assert_eq!(
            citation_text("https://g.com/r/src/main.rs#L10-L20", "src/main.rs garbage"),
            Some("src/main.rs L10-L20".to_string())
        );
        assert_eq!(
            citation_text("https://g.com/r/src/main.rs#L10-L10", "whatever"),
            Some("main.rs L10".to_string())
        );
        assert_eq!(citation_text("https://g.com/r/file.rs", "t"), None);
    }

    #[test]
    fn sources_wrapper_is_preserved() {
        assert_eq!(
            citation_text(
                "https://g.com/r/lib/convert.py#L5",
                "Sources: [lib/convert.py 5]"
            ),
            Some("Sources: [lib/convert.py L5]".to_string())
        );
    }

    #[test]
    fn images_outside_links_render_with_alt_and_src() {
        let out = render(r#"<body><img src="a.png" alt="Alt"/></body>"#);
        assert_eq!(out, "![Alt](a.png)\n\n");
        assert_eq!(render(r#"<body><img alt="x"/></body>"#), "");
    }
}
