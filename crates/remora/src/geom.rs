//! Geometry primitives shared by the diagram reconstructors.
//!
//! Rendered shapes come with three kinds of geometry: serialized bounding
//! boxes, `translate(..)` transforms and raw path data. Everything here is
//! tolerant by construction: malformed input yields a short (or empty)
//! point list, never an error, and callers treat fewer than two points as
//! "no usable path".

use regex::Regex;
use std::sync::OnceLock;

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Rect = euclid::Rect<f64, Unit>;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    euclid::rect(x, y, w, h)
}

fn path_command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z][^A-Za-z]*").expect("valid regex"))
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d*\.?\d+").expect("valid regex"))
}

fn move_command_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"M\s*([^,\s]+)[,\s]+([^,\s]+)").expect("valid regex"))
}

/// Tokenizes SVG path data into the ordered anchor points of the path.
///
/// Only move, line, cubic and quadratic commands contribute points, and
/// curves contribute their *end* point only: control points never matter
/// for nearest-shape matching. Unrecognized commands are skipped.
pub fn parse_path_points(d: &str) -> Vec<Point> {
    let mut points = Vec::new();
    for cmd in path_command_regex().find_iter(d) {
        let cmd = cmd.as_str();
        let op = cmd.as_bytes()[0].to_ascii_uppercase();
        let coords: Vec<f64> = number_regex()
            .find_iter(&cmd[1..])
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        match op {
            b'M' => {
                if coords.len() >= 2 {
                    points.push(point(coords[0], coords[1]));
                }
            }
            b'L' => {
                for pair in coords.chunks_exact(2) {
                    points.push(point(pair[0], pair[1]));
                }
            }
            b'C' => {
                for seg in coords.chunks(6) {
                    if seg.len() == 6 {
                        points.push(point(seg[4], seg[5]));
                    }
                }
            }
            b'Q' => {
                for seg in coords.chunks(4) {
                    if seg.len() == 4 {
                        points.push(point(seg[2], seg[3]));
                    }
                }
            }
            _ => {}
        }
    }
    points
}

/// First move command of a path, if any.
pub fn leading_move(d: &str) -> Option<Point> {
    let caps = move_command_regex().captures(d)?;
    let x: f64 = caps.get(1)?.as_str().parse().ok()?;
    let y: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(point(x, y))
}

/// Last coordinate pair of a path's data string.
///
/// Works on the final command segment so that trailing close/arc letters
/// do not confuse the scan.
pub fn trailing_point(d: &str) -> Option<Point> {
    let last_segment = d.split(|c: char| c.is_ascii_alphabetic()).next_back()?;
    let coords: Vec<f64> = last_segment
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if coords.len() < 2 {
        return None;
    }
    Some(point(coords[coords.len() - 2], coords[coords.len() - 1]))
}

pub fn distance(a: Point, b: Point) -> f64 {
    (a - b).length()
}

/// Euclidean distance from a point to the nearest edge of an axis-aligned
/// box; zero when the point lies inside.
pub fn distance_point_to_box(p: Point, b: &Rect) -> f64 {
    let dx = (b.min_x() - p.x).max(0.0).max(p.x - b.max_x());
    let dy = (b.min_y() - p.y).max(0.0).max(p.y - b.max_y());
    (dx * dx + dy * dy).sqrt()
}

/// Point halfway along a polyline, by arc length.
///
/// Returns `None` for degenerate polylines (fewer than two points or zero
/// total length), which callers treat as "no midpoint to match against".
pub fn polyline_midpoint(points: &[Point]) -> Option<Point> {
    if points.len() < 2 {
        return None;
    }
    let total: f64 = points.windows(2).map(|w| distance(w[0], w[1])).sum();
    if total <= 0.0 {
        return None;
    }
    let mut remaining = total / 2.0;
    for w in points.windows(2) {
        let len = distance(w[0], w[1]);
        if len >= remaining {
            let t = if len > 0.0 { remaining / len } else { 0.0 };
            return Some(w[0].lerp(w[1], t));
        }
        remaining -= len;
    }
    points.last().copied()
}
