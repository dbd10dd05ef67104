//! Table rendering: header inference, pipe escaping, newline folding.

use super::{Fragment, Renderer, newline_run_regex};
use crate::dom::NodeId;

impl Renderer<'_> {
    pub(super) fn handle_table(&self, id: NodeId, depth: usize) -> Fragment {
        // Header candidates: a tr sitting first directly under the
        // table, then the rows of any direct thead.
        let mut header_rows: Vec<NodeId> = Vec::new();
        if let Some(first) = self.doc.element_children(id).next() {
            if self.doc.tag(first) == Some("tr") {
                header_rows.push(first);
            }
        }
        for child in self.doc.element_children(id) {
            if self.doc.tag(child) == Some("thead") {
                header_rows.extend(
                    self.doc
                        .element_children(child)
                        .filter(|&r| self.doc.tag(r) == Some("tr")),
                );
            }
        }

        let body_rows: Vec<NodeId> = self
            .doc
            .element_children(id)
            .filter(|&c| self.doc.tag(c) == Some("tbody"))
            .flat_map(|tbody| {
                self.doc
                    .element_children(tbody)
                    .filter(|&r| self.doc.tag(r) == Some("tr"))
                    .collect::<Vec<_>>()
            })
            .collect();

        // Every tr in the table, the fallback when sections are absent.
        let all_rows: Vec<NodeId> = self.doc.select(id, |d, n| d.tag(n) == Some("tr"));

        let header_rows = if header_rows.is_empty() && !all_rows.is_empty() {
            vec![all_rows[0]]
        } else {
            header_rows
        };

        let mut out = String::new();
        if let Some(&header) = header_rows.first() {
            let mut line = String::from("|");
            let mut separator = String::from("|");
            for cell in self.cells(header) {
                let text = self.render_children(cell, depth + 1);
                line.push_str(&format!(" {} |", escape_pipes(text.trim())));
                separator.push_str(" --- |");
            }
            out.push_str(&format!("{line}\n{separator}\n"));
        }

        let body_rows = if body_rows.is_empty() {
            let minimum = if header_rows.is_empty() { 0 } else { 1 };
            if all_rows.len() > minimum {
                if header_rows.is_empty() {
                    all_rows.clone()
                } else {
                    all_rows[1..].to_vec()
                }
            } else {
                body_rows
            }
        } else {
            body_rows
        };

        for row in body_rows {
            if header_rows.contains(&row) {
                continue;
            }
            let mut line = String::from("|");
            for cell in self.cells(row) {
                let text = self.render_children(cell, depth + 1);
                let folded = newline_run_regex()
                    .replace_all(&escape_pipes(text.trim()), " <br> ")
                    .into_owned();
                line.push_str(&format!(" {folded} |"));
            }
            out.push_str(&line);
            out.push('\n');
        }

        if out.is_empty() {
            Fragment::Empty
        } else {
            Fragment::Block(out.trim_end().to_string())
        }
    }

    fn cells(&self, row: NodeId) -> Vec<NodeId> {
        self.doc
            .element_children(row)
            .filter(|&c| matches!(self.doc.tag(c), Some("td") | Some("th")))
            .collect()
    }
}

fn escape_pipes(text: &str) -> String {
    text.replace('|', "\\|")
}
