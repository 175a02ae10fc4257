//! Anchor geometry, magnetic snapping and edge curves.

use crate::geometry::{Point, Rect};
use crate::model::{Anchor, Edge, EdgeEnd, LineType, Node};

const CONTROL_CAP: f32 = 60.0;
const CONTROL_BASE: f32 = 30.0;
const HIT_SEGMENTS: usize = 32;

pub fn anchor_point(node: &Node, anchor: Anchor) -> Point {
    let rect = node.rect();
    let center = rect.center();
    match anchor {
        Anchor::Top => Point::new(center.x, rect.y),
        Anchor::Right => Point::new(rect.right(), center.y),
        Anchor::Bottom => Point::new(center.x, rect.bottom()),
        Anchor::Left => Point::new(rect.x, center.y),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTarget {
    pub node_id: String,
    pub anchor: Anchor,
    pub point: Point,
    pub distance: f32,
}

/// Closest anchor within `radius` (inclusive) of `point`, skipping
/// `exclude`. Ties keep the first node in iteration order.
pub fn nearest_anchor<'a, I>(
    nodes: I,
    point: Point,
    radius: f32,
    exclude: Option<&str>,
) -> Option<AnchorTarget>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut best: Option<AnchorTarget> = None;
    for node in nodes {
        if exclude == Some(node.id.as_str()) {
            continue;
        }
        for anchor in Anchor::ALL {
            let at = anchor_point(node, anchor);
            let distance = at.distance(point);
            if distance > radius {
                continue;
            }
            if best.as_ref().is_none_or(|b| distance < b.distance) {
                best = Some(AnchorTarget {
                    node_id: node.id.clone(),
                    anchor,
                    point: at,
                    distance,
                });
            }
        }
    }
    best
}

/// Cubic Bézier from one anchor to another. Control points leave each anchor
/// along its outward normal, which keeps curves from doubling back into the
/// node whatever the side combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicPath {
    pub start: Point,
    pub c1: Point,
    pub c2: Point,
    pub end: Point,
}

impl CubicPath {
    pub fn between(start: Point, start_anchor: Anchor, end: Point, end_anchor: Anchor) -> Self {
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let reach = dx.abs().min(dy.abs()).min(CONTROL_CAP) + CONTROL_BASE;
        let (sx, sy) = start_anchor.normal();
        let (ex, ey) = end_anchor.normal();
        Self {
            start,
            c1: start.offset(sx * reach, sy * reach),
            c2: end.offset(ex * reach, ey * reach),
            end,
        }
    }

    pub fn for_edge(edge: &Edge, from: &Node, to: &Node) -> Self {
        Self::between(
            anchor_point(from, edge.from_anchor),
            edge.from_anchor,
            anchor_point(to, edge.to_anchor),
            edge.to_anchor,
        )
    }

    pub fn point_at(&self, t: f32) -> Point {
        let u = 1.0 - t;
        let a = u * u * u;
        let b = 3.0 * u * u * t;
        let c = 3.0 * u * t * t;
        let d = t * t * t;
        Point::new(
            a * self.start.x + b * self.c1.x + c * self.c2.x + d * self.end.x,
            a * self.start.y + b * self.c1.y + c * self.c2.y + d * self.end.y,
        )
    }

    /// `segments + 1` evenly spaced points in `t`.
    pub fn sample(&self, segments: usize) -> Vec<Point> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point_at(i as f32 / segments as f32))
            .collect()
    }

    pub fn to_svg_path(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            fmt(self.start.x),
            fmt(self.start.y),
            fmt(self.c1.x),
            fmt(self.c1.y),
            fmt(self.c2.x),
            fmt(self.c2.y),
            fmt(self.end.x),
            fmt(self.end.y)
        )
    }

    /// Approximate distance from `point` to the curve.
    pub fn distance_to(&self, point: Point) -> f32 {
        self.sample(HIT_SEGMENTS)
            .windows(2)
            .map(|w| segment_distance(point, w[0], w[1]))
            .fold(f32::INFINITY, f32::min)
    }

    /// Loose bounds covering the curve (its control hull).
    pub fn bounds(&self) -> Rect {
        let xs = [self.start.x, self.c1.x, self.c2.x, self.end.x];
        let ys = [self.start.y, self.c1.y, self.c2.y, self.end.y];
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Arrowhead triangles for `line_type`, each `[tip, left, right]`.
    pub fn arrowheads(&self, line_type: LineType, size: f32) -> Vec<[Point; 3]> {
        let mut heads = Vec::new();
        if line_type.arrow_end() {
            heads.push(arrowhead(self.end, direction(self.c2, self.end, self.start), size));
        }
        if line_type.arrow_start() {
            heads.push(arrowhead(self.start, direction(self.c1, self.start, self.end), size));
        }
        heads
    }
}

fn fmt(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

fn segment_distance(p: Point, a: Point, b: Point) -> f32 {
    let (vx, vy) = (b.x - a.x, b.y - a.y);
    let len2 = vx * vx + vy * vy;
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * vx + (p.y - a.y) * vy) / len2).clamp(0.0, 1.0);
    p.distance(Point::new(a.x + t * vx, a.y + t * vy))
}

/// Unit direction `from -> to`; falls back to `far -> to` when the control
/// point coincides with the endpoint.
fn direction(from: Point, to: Point, far: Point) -> (f32, f32) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len > f32::EPSILON {
        return (dx / len, dy / len);
    }
    let (dx, dy) = (to.x - far.x, to.y - far.y);
    let len = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
    (dx / len, dy / len)
}

fn arrowhead(tip: Point, (ux, uy): (f32, f32), size: f32) -> [Point; 3] {
    let base = tip.offset(-ux * size, -uy * size);
    let half = size * 0.5;
    [
        tip,
        base.offset(-uy * half, ux * half),
        base.offset(uy * half, -ux * half),
    ]
}

/// A connection being drawn out of an anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConnection {
    pub from_node: String,
    pub from_anchor: Anchor,
    pub pointer: Point,
    pub target: Option<AnchorTarget>,
}

impl PendingConnection {
    pub fn new(from_node: impl Into<String>, from_anchor: Anchor, pointer: Point) -> Self {
        Self {
            from_node: from_node.into(),
            from_anchor,
            pointer,
            target: None,
        }
    }

    pub fn update<'a, I>(&mut self, nodes: I, pointer: Point, radius: f32)
    where
        I: IntoIterator<Item = &'a Node>,
    {
        self.pointer = pointer;
        self.target = nearest_anchor(nodes, pointer, radius, Some(&self.from_node));
    }

    /// Preview segment: the source anchor to the snapped anchor, or to the raw
    /// pointer when nothing is in range.
    pub fn preview(&self, from: &Node) -> (Point, Point) {
        let start = anchor_point(from, self.from_anchor);
        let end = self.target.as_ref().map_or(self.pointer, |t| t.point);
        (start, end)
    }
}

/// Dragging one end of an existing edge to a new anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRebind {
    pub edge_id: String,
    pub end: EdgeEnd,
    /// Node at the other end; it cannot become this end's target.
    pub fixed_node: String,
    pub pointer: Point,
    pub target: Option<AnchorTarget>,
}

impl EndpointRebind {
    pub fn new(edge: &Edge, end: EdgeEnd, pointer: Point) -> Self {
        let (fixed, _) = edge.endpoint(end.opposite());
        Self {
            edge_id: edge.id.clone(),
            end,
            fixed_node: fixed.to_string(),
            pointer,
            target: None,
        }
    }

    pub fn update<'a, I>(&mut self, nodes: I, pointer: Point, radius: f32)
    where
        I: IntoIterator<Item = &'a Node>,
    {
        self.pointer = pointer;
        self.target = nearest_anchor(nodes, pointer, radius, Some(&self.fixed_node));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f32, y: f32) -> Node {
        Node::new(id, x, y, 100.0, 50.0)
    }

    #[test]
    fn anchor_points_sit_on_edge_midpoints() {
        let n = node("a", 10.0, 20.0);
        assert_eq!(anchor_point(&n, Anchor::Top), Point::new(60.0, 20.0));
        assert_eq!(anchor_point(&n, Anchor::Right), Point::new(110.0, 45.0));
        assert_eq!(anchor_point(&n, Anchor::Bottom), Point::new(60.0, 70.0));
        assert_eq!(anchor_point(&n, Anchor::Left), Point::new(10.0, 45.0));
    }

    #[test]
    fn snap_radius_is_inclusive() {
        let nodes = vec![node("b", 300.0, 0.0)];
        // Left anchor of b is at (300, 25).
        let inside = nearest_anchor(&nodes, Point::new(265.0, 25.0), 35.0, None);
        assert_eq!(inside.map(|t| t.anchor), Some(Anchor::Left));
        let outside = nearest_anchor(&nodes, Point::new(264.0, 25.0), 35.0, None);
        assert!(outside.is_none());
    }

    #[test]
    fn nearest_skips_excluded_node() {
        let nodes = vec![node("a", 0.0, 0.0), node("b", 110.0, 0.0)];
        let hit = nearest_anchor(&nodes, Point::new(104.0, 25.0), 35.0, Some("a")).unwrap();
        assert_eq!(hit.node_id, "b");
        assert_eq!(hit.anchor, Anchor::Left);
    }

    #[test]
    fn control_points_follow_normals() {
        let path = CubicPath::between(
            Point::new(0.0, 0.0),
            Anchor::Right,
            Point::new(200.0, 10.0),
            Anchor::Left,
        );
        // reach = min(200, 10, 60) + 30 = 40
        assert_eq!(path.c1, Point::new(40.0, 0.0));
        assert_eq!(path.c2, Point::new(160.0, 10.0));
        assert_eq!(path.to_svg_path(), "M 0 0 C 40 0, 160 10, 200 10");
    }

    #[test]
    fn distance_to_curve_hits_near_points() {
        let path = CubicPath::between(
            Point::new(0.0, 0.0),
            Anchor::Right,
            Point::new(200.0, 0.0),
            Anchor::Left,
        );
        assert!(path.distance_to(Point::new(100.0, 3.0)) < 6.0);
        assert!(path.distance_to(Point::new(100.0, 40.0)) > 6.0);
    }

    #[test]
    fn arrowheads_follow_line_type() {
        let path = CubicPath::between(
            Point::new(0.0, 0.0),
            Anchor::Right,
            Point::new(200.0, 0.0),
            Anchor::Left,
        );
        assert!(path.arrowheads(LineType::None, 10.0).is_empty());
        let heads = path.arrowheads(LineType::ArrowBoth, 10.0);
        assert_eq!(heads.len(), 2);
        assert_eq!(heads[0][0], Point::new(200.0, 0.0));
        assert!(heads[0][1].x < 200.0);
        assert_eq!(heads[1][0], Point::new(0.0, 0.0));
        assert!(heads[1][1].x > 0.0);
    }

    #[test]
    fn pending_connection_prefers_snapped_anchor() {
        let nodes = vec![node("a", 0.0, 0.0), node("b", 300.0, 0.0)];
        let mut pending = PendingConnection::new("a", Anchor::Right, Point::new(100.0, 25.0));
        pending.update(&nodes, Point::new(290.0, 30.0), 35.0);
        assert_eq!(pending.preview(&nodes[0]).1, Point::new(300.0, 25.0));
        pending.update(&nodes, Point::new(200.0, 200.0), 35.0);
        assert_eq!(pending.preview(&nodes[0]).1, Point::new(200.0, 200.0));
    }
}
