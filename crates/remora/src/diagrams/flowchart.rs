//! Flowchart reconstruction.
//!
//! Nodes and clusters are collected with their serialized bounding boxes,
//! a containment forest is inferred (smallest enclosing cluster wins),
//! and link paths are resolved back to node identifiers by splitting the
//! edge id token. Each edge is owned by the lowest common ancestor
//! cluster of its endpoints, so nested subgraphs render their own edges.

use crate::dom::{Document, NodeId};
use crate::geom::{self, Point, Rect};
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::OnceLock;

/// Maximum distance between an edge's midpoint and a label centroid for
/// the label to attach to the edge.
pub(crate) const LABEL_RADIUS: f64 = 75.0;

const ROOT: &str = "root";

#[derive(Debug)]
struct FlowNode {
    mermaid_id: String,
    text: String,
    bbox: Rect,
}

#[derive(Debug)]
struct Cluster {
    title: String,
    bbox: Rect,
}

#[derive(Debug)]
struct EdgeLabel {
    text: String,
    center: Point,
}

#[derive(Debug)]
struct Edge {
    text: String,
    owner: String,
}

fn node_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+$").expect("valid regex"))
}

fn edge_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(L_|FL_)").expect("valid regex"))
}

pub fn reconstruct(doc: &Document, svg: NodeId) -> Option<String> {
    let mut nodes: IndexMap<String, FlowNode> = IndexMap::new();
    for g in doc.select(svg, |d, n| d.tag(n) == Some("g") && d.has_class(n, "node")) {
        let Some(svg_id) = doc.id_attr(g).filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(bbox) = doc.bounding_box(g) else {
            continue;
        };
        if bbox.width() <= 0.0 && bbox.height() <= 0.0 {
            continue;
        }
        let mermaid_id = {
            let stripped = svg_id.strip_prefix("flowchart-").unwrap_or(svg_id);
            node_suffix_regex().replace(stripped, "").into_owned()
        };
        nodes.insert(
            svg_id.to_string(),
            FlowNode {
                mermaid_id,
                text: node_label_text(doc, g),
                bbox,
            },
        );
    }

    let mut clusters: IndexMap<String, Cluster> = IndexMap::new();
    for g in doc.select(svg, |d, n| d.tag(n) == Some("g") && d.has_class(n, "cluster")) {
        let Some(svg_id) = doc.id_attr(g).filter(|s| !s.is_empty()) else {
            continue;
        };
        let title = doc
            .first_match(g, |d, n| {
                d.has_class(n, "cluster-label") || d.has_class(n, "label")
            })
            .map(|l| doc.text_content(l).trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| svg_id.to_string());
        let bbox = doc
            .first_match(g, |d, n| d.tag(n) == Some("rect"))
            .and_then(|r| doc.bounding_box(r))
            .or_else(|| doc.bounding_box(g));
        let Some(bbox) = bbox else {
            continue;
        };
        if bbox.width() <= 0.0 && bbox.height() <= 0.0 {
            continue;
        }
        clusters.insert(svg_id.to_string(), Cluster { title, bbox });
    }

    if nodes.is_empty() && clusters.is_empty() {
        return None;
    }

    // Containment forest: every shape's parent is the smallest-area
    // cluster that fully contains its box.
    let mut parent_of: FxHashMap<String, String> = FxHashMap::default();
    let all_shapes: Vec<(&String, Rect)> = nodes
        .iter()
        .map(|(id, n)| (id, n.bbox))
        .chain(clusters.iter().map(|(id, c)| (id, c.bbox)))
        .collect();
    for (child_id, child_box) in &all_shapes {
        let mut best: Option<(&String, f64)> = None;
        for (cluster_id, cluster) in &clusters {
            if cluster_id == *child_id {
                continue;
            }
            let b = &cluster.bbox;
            let contains = child_box.min_x() >= b.min_x()
                && child_box.max_x() <= b.max_x()
                && child_box.min_y() >= b.min_y()
                && child_box.max_y() <= b.max_y();
            if !contains {
                continue;
            }
            let area = b.width() * b.height();
            if best.is_none_or(|(_, best_area)| area < best_area) {
                best = Some((cluster_id, area));
            }
        }
        if let Some((parent_id, _)) = best {
            parent_of.insert((*child_id).clone(), parent_id.clone());
        }
    }

    let labels: Vec<EdgeLabel> = doc
        .select(svg, |d, n| d.tag(n) == Some("g") && d.has_class(n, "edgeLabel"))
        .into_iter()
        .filter_map(|g| {
            let text = doc.text_content(g).trim().to_string();
            if text.is_empty() {
                return None;
            }
            let center = doc.bounding_box(g).map(|b| b.center()).or_else(|| {
                doc.translate(g).map(|(x, y)| geom::point(x, y))
            })?;
            Some(EdgeLabel { text, center })
        })
        .collect();

    let known_ids: FxHashSet<&str> = nodes.values().map(|n| n.mermaid_id.as_str()).collect();
    let mut edges: Vec<Edge> = Vec::new();
    for path in doc.select(svg, |d, n| {
        d.tag(n) == Some("path") && d.has_class(n, "flowchart-link")
    }) {
        let Some(path_id) = doc.id_attr(path) else {
            continue;
        };
        let Some((source, target)) = split_edge_id(path_id, &known_ids) else {
            tracing::warn!(edge = path_id, "could not resolve flowchart edge endpoints");
            continue;
        };

        let label = doc
            .attr(path, "d")
            .and_then(|d| geom::polyline_midpoint(&geom::parse_path_points(d)))
            .and_then(|mid| closest_label(&labels, mid));
        let label_part = label.map(|l| format!("|\"{l}\"|")).unwrap_or_default();

        let source_id = node_svg_id(&nodes, &source);
        let target_id = node_svg_id(&nodes, &target);
        let owner = lowest_common_ancestor(&parent_of, source_id, target_id);
        edges.push(Edge {
            text: format!("{source} -->{label_part} {target}"),
            owner,
        });
    }

    // Render: flat node declarations, root edges, then nested subgraphs.
    let mut children_of: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for (child_id, _) in &all_shapes {
        if let Some(parent_id) = parent_of.get(*child_id) {
            children_of
                .entry(parent_id.as_str())
                .or_default()
                .push(child_id.as_str());
        }
    }
    let mut edges_of: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
    for edge in &edges {
        edges_of
            .entry(edge.owner.as_str())
            .or_default()
            .push(edge.text.as_str());
    }

    let mut out = String::from("flowchart TD\n\n");
    let mut declared: FxHashSet<&str> = FxHashSet::default();
    for node in nodes.values() {
        if declared.insert(node.mermaid_id.as_str()) {
            out.push_str(&format!("{}[\"{}\"]\n", node.mermaid_id, node.text));
        }
    }
    out.push('\n');
    for edge in edges_of.get(ROOT).into_iter().flatten() {
        out.push_str(edge);
        out.push('\n');
    }
    for cluster_id in clusters.keys() {
        if !parent_of.contains_key(cluster_id) {
            render_subgraph(
                &mut out,
                cluster_id,
                &nodes,
                &clusters,
                &children_of,
                &edges_of,
            );
        }
    }

    Some(super::fence(&out))
}

fn render_subgraph(
    out: &mut String,
    cluster_id: &str,
    nodes: &IndexMap<String, FlowNode>,
    clusters: &IndexMap<String, Cluster>,
    children_of: &FxHashMap<&str, Vec<&str>>,
    edges_of: &FxHashMap<&str, Vec<&str>>,
) {
    let Some(cluster) = clusters.get(cluster_id) else {
        return;
    };
    out.push_str(&format!("\nsubgraph {cluster_id} [\"{}\"]\n", cluster.title));
    let children = children_of.get(cluster_id).cloned().unwrap_or_default();
    for child in &children {
        if let Some(node) = nodes.get(*child) {
            out.push_str(&format!("    {}\n", node.mermaid_id));
        }
    }
    for edge in edges_of.get(cluster_id).into_iter().flatten() {
        out.push_str(&format!("    {edge}\n"));
    }
    for child in &children {
        if clusters.contains_key(*child) {
            render_subgraph(out, child, nodes, clusters, children_of, edges_of);
        }
    }
    out.push_str("end\n");
}

/// Resolves an edge id to a `(source, target)` pair of known node ids.
///
/// Two passes, first match wins in each: a character-position split of
/// the prefix-stripped token with its trailing numeric counter removed,
/// then an underscore-token split that always excludes the final token.
/// The second pass deliberately mirrors the tuned behavior even when no
/// counter was present; identifiers that are prefixes of one another
/// resolve to the earliest split.
fn split_edge_id(path_id: &str, known: &FxHashSet<&str>) -> Option<(String, String)> {
    let stripped = edge_prefix_regex().replace(path_id, "").into_owned();

    let mut parts: Vec<&str> = stripped.split('_').collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| is_all_digits(p)) {
        parts.pop();
    }
    let joined = parts.join("_");
    for (i, _) in joined.char_indices().skip(1) {
        let (a, b) = joined.split_at(i);
        if known.contains(a) && known.contains(b) {
            return Some((a.to_string(), b.to_string()));
        }
    }

    let parts: Vec<&str> = stripped.split('_').collect();
    if parts.len() > 2 {
        for i in 1..parts.len() {
            let source = parts[..i].join("_");
            let target = parts[i..parts.len() - 1].join("_");
            if known.contains(source.as_str()) && known.contains(target.as_str()) {
                return Some((source, target));
            }
        }
    }
    None
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Scored candidate search: nearest label centroid to the edge midpoint,
/// accepted only within [`LABEL_RADIUS`].
fn closest_label(labels: &[EdgeLabel], midpoint: Point) -> Option<String> {
    let mut best: Option<(&EdgeLabel, f64)> = None;
    for label in labels {
        let dist = geom::distance(label.center, midpoint);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((label, dist));
        }
    }
    match best {
        Some((label, dist)) if dist < LABEL_RADIUS => Some(label.text.clone()),
        _ => None,
    }
}

/// The svg id of the first node declaring `mermaid_id`.
fn node_svg_id<'a>(nodes: &'a IndexMap<String, FlowNode>, mermaid_id: &str) -> Option<&'a str> {
    nodes
        .iter()
        .find(|(_, n)| n.mermaid_id == mermaid_id)
        .map(|(id, _)| id.as_str())
}

/// Lowest common ancestor cluster of two shapes, `root` when none.
fn lowest_common_ancestor(
    parent_of: &FxHashMap<String, String>,
    source: Option<&str>,
    target: Option<&str>,
) -> String {
    let mut source_chain: Vec<&str> = Vec::new();
    let mut current = source.and_then(|s| parent_of.get(s));
    while let Some(ancestor) = current {
        source_chain.push(ancestor);
        current = parent_of.get(ancestor.as_str());
    }
    let mut candidate = target.and_then(|t| parent_of.get(t));
    while let Some(ancestor) = candidate {
        if source_chain.contains(&ancestor.as_str()) {
            return ancestor.clone();
        }
        candidate = parent_of.get(ancestor.as_str());
    }
    ROOT.to_string()
}

/// Cleaned node label: text runs joined, `<br>` elements kept as literal
/// break markers, double quotes entity-escaped.
fn node_label_text(doc: &Document, node: NodeId) -> String {
    let label_p = doc.first_match(node, |d, n| {
        d.tag(n) == Some("p")
            && d.closest(n, |d2, a| d2.tag(a) == Some("foreignobject")).is_some()
            && d.closest(n, |d2, a| d2.has_class(a, "label")).is_some()
    });
    if let Some(p) = label_p {
        let mut parts: Vec<String> = Vec::new();
        for child in doc.children(p) {
            if let Some(t) = doc.text(*child) {
                parts.push(t.to_string());
            } else if doc.tag(*child) == Some("br") {
                parts.push("<br>".to_string());
            } else if doc.is_element(*child) {
                parts.push(doc.text_content(*child));
            }
        }
        let text = parts.concat().trim().replace('"', "#quot;");
        if !text.is_empty() {
            return text;
        }
    }
    doc.first_match(node, |d, n| {
        d.has_class(n, "nodeLabel")
            || d.has_class(n, "label")
            || (matches!(d.tag(n), Some("span") | Some("div"))
                && d.closest(n, |d2, a| d2.tag(a) == Some("foreignobject")).is_some())
            || d.tag(n) == Some("text")
    })
    .map(|el| doc.text_content(el).trim().replace('"', "#quot;"))
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(ids: &[&'static str]) -> FxHashSet<&'static str> {
        ids.iter().copied().collect()
    }

    #[test]
    fn edge_id_token_split_drops_counter() {
        let k = known(&["A", "B"]);
        assert_eq!(
            split_edge_id("L_A_B_0", &k),
            Some(("A".to_string(), "B".to_string()))
        );
        assert_eq!(
            split_edge_id("FL_A_B_12", &k),
            Some(("A".to_string(), "B".to_string()))
        );
    }

    #[test]
    fn edge_id_character_split_handles_concatenated_ids() {
        let k = known(&["Start", "End"]);
        assert_eq!(
            split_edge_id("L_StartEnd_3", &k),
            Some(("Start".to_string(), "End".to_string()))
        );
    }

    #[test]
    fn edge_id_split_supports_underscored_identifiers() {
        let k = known(&["api_server", "db"]);
        assert_eq!(
            split_edge_id("L_api_server_db_0", &k),
            Some(("api_server".to_string(), "db".to_string()))
        );
    }

    #[test]
    fn edge_id_split_is_first_match_wins() {
        // "A" is a prefix of "A_B"; the earliest resolving split wins, so
        // the pair (A, B) is chosen even though A_B is also a known node.
        let k = known(&["A", "A_B", "B"]);
        assert_eq!(
            split_edge_id("L_A_B_0", &k),
            Some(("A".to_string(), "B".to_string()))
        );
    }

    #[test]
    fn edge_id_split_resolves_underscored_prefix_ids() {
        let k = known(&["A", "A_1", "B"]);
        assert_eq!(
            split_edge_id("L_A_1_B_0", &k),
            Some(("A_1".to_string(), "B".to_string()))
        );
    }

    #[test]
    fn unresolvable_edge_ids_are_dropped() {
        let k = known(&["A", "B"]);
        assert_eq!(split_edge_id("L_X_Y_0", &k), None);
        assert_eq!(split_edge_id("garbage", &k), None);
    }

    #[test]
    fn closest_label_applies_radius() {
        let labels = vec![
            EdgeLabel {
                text: "near".into(),
                center: geom::point(0.0, 0.0),
            },
            EdgeLabel {
                text: "far".into(),
                center: geom::point(500.0, 0.0),
            },
        ];
        assert_eq!(
            closest_label(&labels, geom::point(10.0, 0.0)),
            Some("near".to_string())
        );
        assert_eq!(closest_label(&labels, geom::point(200.0, 0.0)), None);
        assert_eq!(closest_label(&[], geom::point(0.0, 0.0)), None);
    }
}
