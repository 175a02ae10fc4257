use std::collections::{BTreeMap, HashMap};

use super::LayoutInput;
use crate::config::ForceLayoutConfig;
use crate::geometry::Point;

const GOLDEN_ANGLE: f32 = 2.399_963;
const SEED_STEP: f32 = 40.0;

/// Spiral seed for nodes that have never been placed.
fn seed(index: usize, center: Point) -> Point {
    let radius = SEED_STEP * ((index + 1) as f32).sqrt();
    let angle = index as f32 * GOLDEN_ANGLE;
    Point::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
}

/// Spring embedder: all pairs repel with `repulsion / d²`, connected pairs
/// attract with `attraction · d`. Velocities are damped and capped. Stops at
/// the iteration cap or once a step moves everything by less than
/// `settle_threshold` in total. Results are recentered on the configured
/// center and rounded.
pub fn force_layout(
    input: &LayoutInput<'_>,
    config: &ForceLayoutConfig,
) -> (BTreeMap<String, Point>, usize) {
    let center = Point::new(config.center_x, config.center_y);
    let n = input.nodes.len();
    let mut out = BTreeMap::new();
    match n {
        0 => return (out, 0),
        1 => {
            out.insert(input.nodes[0].id.clone(), center);
            return (out, 0);
        }
        _ => {}
    }

    let index: HashMap<&str, usize> = input
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();
    let mut pos: Vec<Point> = input
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            if node.x == 0.0 && node.y == 0.0 {
                seed(i, center)
            } else {
                node.position()
            }
        })
        .collect();
    let mut vel = vec![(0.0f32, 0.0f32); n];
    let springs: Vec<(usize, usize)> = input
        .edges
        .iter()
        .filter_map(|edge| Some((*index.get(edge.from.as_str())?, *index.get(edge.to.as_str())?)))
        .filter(|(a, b)| a != b)
        .collect();

    let mut iterations = 0;
    for _ in 0..config.iterations {
        iterations += 1;
        let mut force = vec![(0.0f32, 0.0f32); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let mut dx = pos[j].x - pos[i].x;
                let mut dy = pos[j].y - pos[i].y;
                if dx == 0.0 && dy == 0.0 {
                    // Coincident nodes: push apart along a per-pair direction.
                    let angle = (i * n + j) as f32 * GOLDEN_ANGLE;
                    dx = angle.cos();
                    dy = angle.sin();
                }
                let raw = (dx * dx + dy * dy).sqrt();
                let distance = raw.max(config.min_distance);
                let magnitude = config.repulsion / (distance * distance);
                let fx = dx / raw * magnitude;
                let fy = dy / raw * magnitude;
                force[i].0 -= fx;
                force[i].1 -= fy;
                force[j].0 += fx;
                force[j].1 += fy;
            }
        }

        for &(a, b) in &springs {
            let dx = pos[b].x - pos[a].x;
            let dy = pos[b].y - pos[a].y;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance < config.min_distance {
                continue;
            }
            let magnitude = distance * config.attraction;
            let fx = dx / distance * magnitude;
            let fy = dy / distance * magnitude;
            force[a].0 += fx;
            force[a].1 += fy;
            force[b].0 -= fx;
            force[b].1 -= fy;
        }

        let mut movement = 0.0;
        for i in 0..n {
            let (mut vx, mut vy) = (
                (vel[i].0 + force[i].0) * config.damping,
                (vel[i].1 + force[i].1) * config.damping,
            );
            let speed = (vx * vx + vy * vy).sqrt();
            if speed > config.max_velocity {
                vx = vx / speed * config.max_velocity;
                vy = vy / speed * config.max_velocity;
            }
            vel[i] = (vx, vy);
            pos[i] = pos[i].offset(vx, vy);
            movement += (vx * vx + vy * vy).sqrt();
        }
        if movement < config.settle_threshold {
            break;
        }
    }

    let cx = pos.iter().map(|p| p.x).sum::<f32>() / n as f32;
    let cy = pos.iter().map(|p| p.y).sum::<f32>() / n as f32;
    for (node, p) in input.nodes.iter().zip(&pos) {
        let x = (p.x + center.x - cx).round();
        let y = (p.y + center.y - cy).round();
        out.insert(node.id.clone(), Point::new(x, y));
    }
    (out, iterations)
}
