//! Diagram kind detection for rendered SVG subtrees.
//!
//! Detection runs in three stages with strictly decreasing authority:
//! the declared `aria-roledescription` / `class` descriptor, then
//! `data-*` hints, then structural probes over the subtree. The caller
//! tries each stage in turn and falls back to the next only when the
//! previous stage either matched nothing or its reconstructor produced
//! nothing.

use crate::dom::{Document, NodeId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Flowchart,
    Class,
    Sequence,
    State,
}

impl DiagramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagramKind::Flowchart => "flowchart",
            DiagramKind::Class => "class",
            DiagramKind::Sequence => "sequence",
            DiagramKind::State => "state",
        }
    }
}

impl std::fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind named by the rendering itself (`aria-roledescription`, then the
/// root `class` attribute). The branch order is significant and mirrors
/// the order the heuristics were tuned in: flowchart wins over class,
/// which wins over sequence, which wins over state.
pub fn declared_kind(doc: &Document, svg: NodeId) -> Option<DiagramKind> {
    let role = doc.attr(svg, "aria-roledescription").unwrap_or("");
    if !role.is_empty() {
        if role.contains("flowchart") {
            return Some(DiagramKind::Flowchart);
        }
        if role.contains("class") {
            return Some(DiagramKind::Class);
        }
        if role.contains("sequence") {
            return Some(DiagramKind::Sequence);
        }
        if role.contains("stateDiagram") {
            return Some(DiagramKind::State);
        }
    }

    let class = doc.attr(svg, "class").unwrap_or("");
    if !class.is_empty() {
        if class.contains("flowchart") {
            return Some(DiagramKind::Flowchart);
        }
        if class.contains("classDiagram") || class.contains("class") {
            return Some(DiagramKind::Class);
        }
        if class.contains("sequenceDiagram") || class.contains("sequence") {
            return Some(DiagramKind::Sequence);
        }
        if class.contains("statediagram") || class.contains("stateDiagram") {
            return Some(DiagramKind::State);
        }
    }
    None
}

fn dataset_hint(doc: &Document, svg: NodeId) -> Option<String> {
    ["data-diagram-type", "data-graph-type", "data-chart-type", "data-mermaid"]
        .iter()
        .find_map(|name| doc.attr(svg, name))
        .map(str::to_ascii_lowercase)
}

/// Kind hinted by `data-*` attributes on the SVG root.
pub fn dataset_kind(doc: &Document, svg: NodeId) -> Option<DiagramKind> {
    let hint = dataset_hint(doc, svg)?;
    if hint.contains("flow") {
        Some(DiagramKind::Flowchart)
    } else if hint.contains("class") {
        Some(DiagramKind::Class)
    } else if hint.contains("sequence") {
        Some(DiagramKind::Sequence)
    } else if hint.contains("state") {
        Some(DiagramKind::State)
    } else {
        None
    }
}

type ProbeFn = fn(&Document, NodeId) -> bool;

/// Structural probes, last resort. The order is significant: sequence
/// markers are the most specific, while edge labels (the flowchart probe)
/// also occur in class and state renderings.
const STRUCTURAL_PROBES: &[(DiagramKind, ProbeFn)] = &[
    (DiagramKind::Sequence, probe_sequence),
    (DiagramKind::Class, probe_class),
    (DiagramKind::Flowchart, probe_flowchart),
    (DiagramKind::State, probe_state),
];

pub fn structural_kind(doc: &Document, svg: NodeId) -> Option<DiagramKind> {
    for (kind, probe) in STRUCTURAL_PROBES {
        if probe(doc, svg) {
            tracing::debug!(kind = %kind, "structural diagram probe matched");
            return Some(*kind);
        }
    }
    None
}

/// Full detection cascade: declared descriptor, dataset hints, structure.
pub fn detect_kind(doc: &Document, svg: NodeId) -> Option<DiagramKind> {
    declared_kind(doc, svg)
        .or_else(|| dataset_kind(doc, svg))
        .or_else(|| structural_kind(doc, svg))
}

fn probe_sequence(doc: &Document, svg: NodeId) -> bool {
    doc.first_match(svg, |d, n| {
        let tag = d.tag(n).unwrap_or("");
        ((tag == "line" || tag == "path")
            && (d.has_class(n, "messageLine0") || d.has_class(n, "messageLine1")))
            || (tag == "text" && d.has_class(n, "actor-box"))
            || d.has_class(n, "actor")
    })
    .is_some()
}

fn probe_class(doc: &Document, svg: NodeId) -> bool {
    doc.first_match(svg, |d, n| {
        let tag = d.tag(n).unwrap_or("");
        (tag == "g"
            && d.has_classes(n, &["node", "default"])
            && d.id_attr(n).is_some_and(|i| i.starts_with("classId-")))
            || (tag == "g" && d.has_class(n, "classGroup"))
    })
    .is_some()
}

fn probe_flowchart(doc: &Document, svg: NodeId) -> bool {
    doc.first_match(svg, |d, n| {
        let tag = d.tag(n).unwrap_or("");
        (tag == "g" && d.has_class(n, "cluster"))
            || (tag == "path" && d.has_class(n, "flowchart-link"))
            || d.has_class(n, "edgeLabel")
    })
    .is_some()
}

fn probe_state(doc: &Document, svg: NodeId) -> bool {
    let structural = doc
        .first_match(svg, |d, n| {
            d.tag(n) == Some("g")
                && (d.has_class(n, "transition") || d.has_class(n, "stateGroup"))
        })
        .is_some();
    if structural {
        return true;
    }
    combined_descriptor(doc, svg).contains("state")
}

/// Lowercased concatenation of every descriptor source, used by the state
/// probe as a final hint.
fn combined_descriptor(doc: &Document, svg: NodeId) -> String {
    let role = doc.attr(svg, "aria-roledescription").unwrap_or("");
    let class = doc.attr(svg, "class").unwrap_or("");
    let dataset = dataset_hint(doc, svg).unwrap_or_default();
    format!("{role} {class} {dataset}").to_ascii_lowercase()
}
