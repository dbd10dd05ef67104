//! Class diagram reconstruction.
//!
//! Classes are recovered from their structured ids and transforms, notes
//! from two shape families, and note-to-class connectors from dotted
//! relation paths whose endpoints are matched against notes and classes
//! by distance. Relationship kinds come from the marker attributes of the
//! relation paths; the classification is a pure function of
//! (marker-start, marker-end, dash flag).

use crate::dom::{Document, NodeId};
use crate::geom::{self, Point};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// A connector endpoint must sit within this distance of a note.
pub(crate) const NOTE_RADIUS: f64 = 50.0;
/// ... and within twice that of a class.
pub(crate) const CLASS_RADIUS: f64 = 100.0;
/// Notes with matching text closer than this collapse into one.
const NOTE_DEDUP_RADIUS: f64 = 10.0;
/// Fallback class extent when the bounding path yielded no size.
const DEFAULT_CLASS_EXTENT: f64 = 200.0;

#[derive(Debug, Default)]
struct ClassRecord {
    stereotype: String,
    members: Vec<String>,
    methods: Vec<String>,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Debug)]
struct Note {
    id: String,
    text: String,
    x: f64,
    y: f64,
}

#[derive(Debug)]
struct NoteTarget {
    class_name: String,
    score: f64,
}

fn class_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^classId-([^-]+(?:-[^-]+)*)-(\d+)$").expect("valid regex"))
}

fn bounds_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"M-([0-9.]+)\s+-([0-9.]+)").expect("valid regex"))
}

fn relation_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_\d+$").expect("valid regex"))
}

pub fn reconstruct(doc: &Document, svg: NodeId) -> Option<String> {
    let classes = collect_classes(doc, svg);
    let notes = collect_notes(doc, svg);
    let note_targets = match_note_connectors(doc, svg, &classes, &notes);

    let mut lines: Vec<String> = vec!["classDiagram".to_string()];

    for note in &notes {
        match note_targets.get(note.id.as_str()) {
            Some(target) => lines.push(format!(
                "    note for {} \"{}\"",
                target.class_name, note.text
            )),
            None => lines.push(format!("    note \"{}\"", note.text)),
        }
    }

    for (name, record) in &classes {
        lines.push(format!("    class {name} {{"));
        if !record.stereotype.is_empty() {
            lines.push(format!("        {}", record.stereotype));
        }
        for member in &record.members {
            lines.push(format!("        {member}"));
        }
        for method in &record.methods {
            lines.push(format!("        {method}"));
        }
        lines.push("    }".to_string());
    }

    let relation_paths = doc.select(svg, |d, n| {
        d.tag(n) == Some("path")
            && d.has_class(n, "relation")
            && d.id_attr(n).is_some_and(|i| i.starts_with("id_"))
    });
    let labels = relation_labels(doc, svg);
    for (index, path) in relation_paths.iter().enumerate() {
        let id = doc.id_attr(*path).unwrap_or("");
        let Some((from, to)) = split_relation_id(id, &classes) else {
            tracing::warn!(relation = id, "could not resolve class relation endpoints");
            continue;
        };

        let marker_start = doc.attr(*path, "marker-start").unwrap_or("");
        let marker_end = doc.attr(*path, "marker-end").unwrap_or("");
        let class_attr = doc.attr(*path, "class").unwrap_or("");
        let dashed = doc.has_class(*path, "dashed-line")
            || doc.has_class(*path, "dotted-line")
            || class_attr.contains("dashed")
            || class_attr.contains("dotted");

        let relation = relation_line(&from, &to, marker_start, marker_end, dashed);
        match labels.get(index).filter(|l| !l.is_empty()) {
            Some(label) => lines.push(format!("    {relation} : {label}")),
            None => lines.push(format!("    {relation}")),
        }
    }

    if lines.len() <= 1 && classes.is_empty() && notes.is_empty() {
        return None;
    }
    Some(super::fence(&lines.join("\n")))
}

fn collect_classes(doc: &Document, svg: NodeId) -> IndexMap<String, ClassRecord> {
    let mut classes: IndexMap<String, ClassRecord> = IndexMap::new();
    for node in doc.select(svg, |d, n| {
        d.tag(n) == Some("g")
            && d.has_classes(n, &["node", "default"])
            && d.id_attr(n).is_some_and(|i| i.starts_with("classId-"))
    }) {
        let svg_id = doc.id_attr(node).unwrap_or("");
        let Some(caps) = class_id_regex().captures(svg_id) else {
            continue;
        };
        let name = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();

        let (cx, cy) = doc.translate(node).unwrap_or((0.0, 0.0));
        let mut half_width = 0.0;
        let mut half_height = 0.0;
        let bounds_path = doc.first_match(node, |d, n| {
            d.tag(n) == Some("path")
                && d.attr(n, "d").is_some_and(|v| v.starts_with("M-"))
                && d.parent(n).is_some_and(|p| {
                    d.has_classes(p, &["basic", "label-container"])
                })
        });
        if let Some(caps) = bounds_path
            .and_then(|p| doc.attr(p, "d"))
            .and_then(|d| bounds_prefix_regex().captures(d))
        {
            half_width = caps[1].parse().unwrap_or(0.0);
            half_height = caps[2].parse().unwrap_or(0.0);
        }

        // Several shapes can share one class name; the first-seen geometry
        // wins, while text accumulates across shapes.
        let record = classes.entry(name).or_insert_with(|| ClassRecord {
            x: cx,
            y: cy,
            width: half_width * 2.0,
            height: half_height * 2.0,
            ..ClassRecord::default()
        });

        if let Some(stereotype) = group_paragraphs(doc, node, "annotation-group").into_iter().next()
        {
            record.stereotype = stereotype;
        }
        record
            .members
            .extend(group_paragraphs(doc, node, "members-group"));
        record
            .methods
            .extend(group_paragraphs(doc, node, "methods-group"));
    }
    classes
}

/// Non-empty paragraph texts inside the node's `<group>.text` label
/// container, in document order.
fn group_paragraphs(doc: &Document, node: NodeId, group_class: &str) -> Vec<String> {
    doc.select(node, |d, n| {
        matches!(d.tag(n), Some("p"))
            && d.closest(n, |d2, a| d2.has_classes(a, &[group_class, "text"]))
                .is_some()
    })
    .into_iter()
    .map(|p| doc.text_content(p).trim().to_string())
    .filter(|t| !t.is_empty())
    .collect()
}

fn collect_notes(doc: &Document, svg: NodeId) -> Vec<Note> {
    let mut notes: Vec<Note> = Vec::new();

    // Family (a): a rect.note / text.noteText pair inside one group.
    for g in doc.select(svg, |d, n| d.tag(n) == Some("g")) {
        let rect = doc.first_match(g, |d, n| d.tag(n) == Some("rect") && d.has_class(n, "note"));
        let text_el =
            doc.first_match(g, |d, n| d.tag(n) == Some("text") && d.has_class(n, "noteText"));
        let (Some(rect), Some(text_el)) = (rect, text_el) else {
            continue;
        };
        let text = doc.text_content(text_el).trim().to_string();
        let x = parse_attr(doc, rect, "x");
        let y = parse_attr(doc, rect, "y");
        if text.is_empty() || x.is_none() || y.is_none() {
            continue;
        }
        let id = doc
            .id_attr(g)
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("note_{}", notes.len()));
        notes.push(Note {
            id,
            text,
            x: x.unwrap_or(0.0),
            y: y.unwrap_or(0.0),
        });
    }

    // Family (b): note-flagged generic shapes (background fill or id).
    for g in doc.select(svg, |d, n| {
        d.tag(n) == Some("g")
            && (d.has_classes(n, &["node", "undefined"])
                || d.id_attr(n).is_some_and(|i| i.starts_with("note")))
    }) {
        let has_note_background = doc
            .first_match(g, |d, n| {
                d.tag(n) == Some("path")
                    && (d.attr(n, "fill") == Some("#fff5ad")
                        || d.attr(n, "style").is_some_and(|s| s.contains("#fff5ad")))
            })
            .is_some();
        let is_note_id = doc.id_attr(g).is_some_and(|i| i.contains("note"));
        if !has_note_background && !is_note_id {
            continue;
        }

        let mut text = doc
            .first_match(g, |d, n| {
                (matches!(d.tag(n), Some("p")) || d.has_class(n, "nodeLabel"))
                    && d.closest(n, |d2, a| d2.tag(a) == Some("foreignobject"))
                        .is_some()
            })
            .map(|el| doc.text_content(el).trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            text = doc
                .first_match(g, |d, n| matches!(d.tag(n), Some("text") | Some("tspan")))
                .map(|el| doc.text_content(el).trim().to_string())
                .unwrap_or_default();
        }
        if text.is_empty() {
            continue;
        }

        let (x, y) = doc.translate(g).unwrap_or((0.0, 0.0));
        let duplicate = notes.iter().any(|n| {
            n.text == text
                && (n.x - x).abs() < NOTE_DEDUP_RADIUS
                && (n.y - y).abs() < NOTE_DEDUP_RADIUS
        });
        if duplicate {
            continue;
        }
        let id = doc
            .id_attr(g)
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("note_{}", notes.len()));
        notes.push(Note { id, text, x, y });
    }

    notes
}

/// Matches note-connector paths to (note, class) pairs. The first path
/// point anchors the note, the last anchors the class; the
/// lowest-combined-distance assignment wins per note.
fn match_note_connectors(
    doc: &Document,
    svg: NodeId,
    classes: &IndexMap<String, ClassRecord>,
    notes: &[Note],
) -> IndexMap<String, NoteTarget> {
    let mut targets: IndexMap<String, NoteTarget> = IndexMap::new();
    if classes.is_empty() || notes.is_empty() {
        return targets;
    }

    let mut connectors = doc.select(svg, |d, n| {
        d.tag(n) == Some("path") && d.has_classes(n, &["relation", "edge-pattern-dotted"])
    });
    connectors.extend(doc.select(svg, |d, n| {
        d.tag(n) == Some("path") && d.id_attr(n).is_some_and(|i| i.starts_with("edgeNote"))
    }));
    connectors.extend(doc.select(svg, |d, n| {
        d.tag(n) == Some("path")
            && d.has_classes(n, &["edge-thickness-normal", "edge-pattern-dotted"])
    }));

    for path in connectors {
        let Some(d) = doc.attr(path, "d") else {
            continue;
        };
        let points = geom::parse_path_points(d);
        if points.len() < 2 {
            continue;
        }
        let start = points[0];
        let end = points[points.len() - 1];

        let Some((note, note_dist)) = closest_note(notes, start) else {
            continue;
        };
        let Some((class_name, class_dist)) = closest_class(classes, end) else {
            continue;
        };
        if note_dist >= NOTE_RADIUS || class_dist >= CLASS_RADIUS {
            continue;
        }

        let score = note_dist + class_dist;
        let entry = targets.get(note.id.as_str());
        if entry.is_none_or(|existing| score < existing.score) {
            targets.insert(
                note.id.clone(),
                NoteTarget {
                    class_name: class_name.to_string(),
                    score,
                },
            );
        }
    }
    targets
}

fn closest_note(notes: &[Note], p: Point) -> Option<(&Note, f64)> {
    let mut best: Option<(&Note, f64)> = None;
    for note in notes {
        let dist = geom::distance(geom::point(note.x, note.y), p);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((note, dist));
        }
    }
    best
}

/// Distance to a class is the smaller of the distance to its centre and
/// the distance to its box edge plus a quarter width; the latter keeps
/// wide classes from swallowing everything nearby.
fn closest_class<'a>(
    classes: &'a IndexMap<String, ClassRecord>,
    p: Point,
) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (name, class) in classes {
        let width = if class.width > 0.0 {
            class.width
        } else {
            DEFAULT_CLASS_EXTENT
        };
        let height = if class.height > 0.0 {
            class.height
        } else {
            DEFAULT_CLASS_EXTENT
        };
        let center = geom::point(class.x, class.y);
        let to_center = geom::distance(p, center);
        let bbox = geom::rect(class.x - width / 2.0, class.y - height / 2.0, width, height);
        let to_edge = geom::distance_point_to_box(p, &bbox);
        let dist = to_center.min(to_edge + width / 4.0);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((name.as_str(), dist));
        }
    }
    best
}

/// Relation label texts in document order; labels pair with relation
/// paths positionally, by index.
fn relation_labels(doc: &Document, svg: NodeId) -> Vec<String> {
    doc.select(svg, |d, n| {
        matches!(d.tag(n), Some("p"))
            && d.closest(n, |d2, a| d2.has_class(a, "edgeLabel")).is_some()
            && d.closest(n, |d2, a| d2.has_class(a, "edgeLabels")).is_some()
    })
    .into_iter()
    .map(|p| doc.text_content(p).trim().to_string())
    .collect()
}

/// Splits an `id_From_To_N` relation id into two known class names; every
/// underscore position is tried in turn and the first resolving split
/// wins.
fn split_relation_id(
    id: &str,
    classes: &IndexMap<String, ClassRecord>,
) -> Option<(String, String)> {
    let name_part = id.strip_prefix("id_")?;
    let name_part = relation_suffix_regex().replace(name_part, "");
    let parts: Vec<&str> = name_part.split('_').collect();
    for i in 1..parts.len() {
        let from = parts[..i].join("_");
        let to = parts[i..].join("_");
        if classes.contains_key(from.as_str()) && classes.contains_key(to.as_str()) {
            return Some((from, to));
        }
    }
    None
}

/// Relationship classification: a pure function of the marker attributes
/// and the dash flag. Start-side markers read against the arrow (the
/// target of the relationship sits at the path start).
pub(crate) fn relation_line(
    from: &str,
    to: &str,
    marker_start: &str,
    marker_end: &str,
    dashed: bool,
) -> String {
    let style = if dashed { ".." } else { "--" };

    if marker_start.contains("extensionStart") {
        return format!("{from} <|{style} {to}");
    }
    if marker_end.contains("extensionEnd") {
        return format!("{to} <|{style} {from}");
    }
    if marker_start.contains("lollipopStart") || marker_start.contains("implementStart") {
        return format!("{to} ..|> {from}");
    }
    if marker_end.contains("implementEnd")
        || marker_end.contains("lollipopEnd")
        || (marker_end.contains("interfaceEnd") && dashed)
    {
        return format!("{from} ..|> {to}");
    }
    if marker_start.contains("compositionStart") {
        return format!("{from} *{style} {to}");
    }
    if marker_end.contains("compositionEnd")
        || (marker_end.contains("diamondEnd") && marker_end.contains("filled"))
    {
        return format!("{to} *{style} {from}");
    }
    if marker_start.contains("aggregationStart") {
        return format!("{to} {style}o {from}");
    }
    if marker_end.contains("aggregationEnd")
        || (marker_end.contains("diamondEnd") && !marker_end.contains("filled"))
    {
        return format!("{from} o{style} {to}");
    }
    if marker_start.contains("dependencyStart") {
        return if dashed {
            format!("{to} <.. {from}")
        } else {
            format!("{to} <-- {from}")
        };
    }
    if marker_end.contains("dependencyEnd") {
        return if dashed {
            format!("{from} ..> {to}")
        } else {
            format!("{from} --> {to}")
        };
    }
    if marker_start.contains("arrowStart") || marker_start.contains("openStart") {
        return format!("{to} <{style} {from}");
    }
    if marker_end.contains("arrowEnd") || marker_end.contains("openEnd") {
        return format!("{from} {style}> {to}");
    }
    // Markerless paths and anything unrecognized render as a plain link.
    format!("{from} {style} {to}")
}

fn parse_attr(doc: &Document, id: NodeId, name: &str) -> Option<f64> {
    doc.attr(id, name)?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_line_is_deterministic_over_markers() {
        // Inheritance, both orientations.
        assert_eq!(
            relation_line("Foo", "Bar", "url(#extensionStart)", "", false),
            "Foo <|-- Bar"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#extensionEnd)", false),
            "Bar <|-- Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#extensionEnd)", true),
            "Bar <|.. Foo"
        );
        // Realization.
        assert_eq!(
            relation_line("Foo", "Bar", "url(#lollipopStart)", "", false),
            "Bar ..|> Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#implementEnd)", true),
            "Foo ..|> Bar"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#interfaceEnd)", true),
            "Foo ..|> Bar"
        );
        // Composition and aggregation.
        assert_eq!(
            relation_line("Foo", "Bar", "url(#compositionStart)", "", false),
            "Foo *-- Bar"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#compositionEnd)", false),
            "Bar *-- Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#diamondEnd-filled)", false),
            "Bar *-- Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "url(#aggregationStart)", "", false),
            "Bar --o Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#aggregationEnd)", false),
            "Foo o-- Bar"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#diamondEnd)", false),
            "Foo o-- Bar"
        );
        // Dependency and association.
        assert_eq!(
            relation_line("Foo", "Bar", "url(#dependencyStart)", "", true),
            "Bar <.. Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#dependencyEnd)", false),
            "Foo --> Bar"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "url(#arrowStart)", "", false),
            "Bar <-- Foo"
        );
        assert_eq!(
            relation_line("Foo", "Bar", "", "url(#openEnd)", true),
            "Foo ..> Bar"
        );
        // Plain links.
        assert_eq!(relation_line("Foo", "Bar", "", "", false), "Foo -- Bar");
        assert_eq!(relation_line("Foo", "Bar", "", "", true), "Foo .. Bar");
    }

    #[test]
    fn split_relation_id_tries_every_underscore() {
        let mut classes: IndexMap<String, ClassRecord> = IndexMap::new();
        classes.insert("Http_Client".into(), ClassRecord::default());
        classes.insert("Server".into(), ClassRecord::default());
        assert_eq!(
            split_relation_id("id_Http_Client_Server_3", &classes),
            Some(("Http_Client".to_string(), "Server".to_string()))
        );
        assert_eq!(split_relation_id("id_Nope_Server_0", &classes), None);
        assert_eq!(split_relation_id("unprefixed", &classes), None);
    }

    #[test]
    fn closest_class_uses_the_edge_heuristic() {
        let mut classes: IndexMap<String, ClassRecord> = IndexMap::new();
        classes.insert(
            "Wide".into(),
            ClassRecord {
                x: 0.0,
                y: 0.0,
                width: 400.0,
                height: 40.0,
                ..ClassRecord::default()
            },
        );
        classes.insert(
            "Small".into(),
            ClassRecord {
                x: 300.0,
                y: 0.0,
                width: 40.0,
                height: 40.0,
                ..ClassRecord::default()
            },
        );
        // A point just right of the small class: its centre is far closer
        // than the wide class's centre-or-edge score.
        let (name, _) = closest_class(&classes, geom::point(330.0, 0.0)).unwrap();
        assert_eq!(name, "Small");
    }
}
