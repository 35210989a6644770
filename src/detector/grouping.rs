//! Merging of overlapping raw detections.
//!
//! Raw windows are partitioned into equivalence classes with a union-find
//! over a neighbor predicate, each class is averaged into one detection, and
//! detections enclosed by a larger, at-least-as-supported one are dropped.

use super::DetectionRect;

#[derive(Debug, Clone, Copy)]
struct Node {
    parent: Option<usize>,
    rank: u32,
}

fn find_root(nodes: &[Node], mut i: usize) -> usize {
    while let Some(parent) = nodes[i].parent {
        i = parent;
    }
    i
}

/// Point every node on the path from `i` directly at `root`
fn compress(nodes: &mut [Node], mut i: usize, root: usize) {
    while let Some(parent) = nodes[i].parent {
        if i == root {
            break;
        }
        nodes[i].parent = Some(root);
        i = parent;
    }
}

/// Partition `items` into the transitive closure of `is_neighbor`
///
/// Returns one label per item plus the number of classes. Labels are dense
/// and assigned in order of first appearance, so the result is deterministic
/// for a given input order.
pub fn array_group<T, F>(items: &[T], is_neighbor: F) -> (Vec<usize>, usize)
where
    F: Fn(&T, &T) -> bool,
{
    let n = items.len();
    let mut nodes = vec![
        Node {
            parent: None,
            rank: 0,
        };
        n
    ];

    for i in 0..n {
        let mut root = find_root(&nodes, i);
        for j in 0..n {
            if i == j || !is_neighbor(&items[i], &items[j]) {
                continue;
            }
            let other = find_root(&nodes, j);
            if other == root {
                continue;
            }
            // Union by rank
            if nodes[root].rank > nodes[other].rank {
                nodes[other].parent = Some(root);
            } else {
                nodes[root].parent = Some(other);
                if nodes[root].rank == nodes[other].rank {
                    nodes[other].rank += 1;
                }
                root = other;
            }
            compress(&mut nodes, j, root);
            compress(&mut nodes, i, root);
        }
    }

    let mut class_of_root: Vec<Option<usize>> = vec![None; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find_root(&nodes, i);
        let label = *class_of_root[root].get_or_insert_with(|| {
            classes += 1;
            classes - 1
        });
        labels.push(label);
    }
    (labels, classes)
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Two raw windows describe the same object
///
/// Centers must lie within a quarter of the smaller width and the widths
/// must agree within a factor of 1.5. The predicate is symmetric.
#[must_use]
pub fn is_neighbor(r1: &DetectionRect, r2: &DetectionRect) -> bool {
    let distance = round_half_up(r1.width.min(r2.width) * 0.25);
    let (c1x, c1y) = (r1.x + r1.width * 0.5, r1.y + r1.height * 0.5);
    let (c2x, c2y) = (r2.x + r2.width * 0.5, r2.y + r2.height * 0.5);
    (c1x - c2x).abs() <= distance
        && (c1y - c2y).abs() <= distance
        && r2.width <= round_half_up(r1.width * 1.5)
        && round_half_up(r2.width * 1.5) >= r1.width
}

/// `inner` lies inside `outer` up to a margin of a quarter of the outer width
fn is_enclosed(inner: &DetectionRect, outer: &DetectionRect) -> bool {
    let margin = round_half_up(outer.width * 0.25);
    inner.x >= outer.x - margin
        && inner.y >= outer.y - margin
        && inner.x + inner.width <= outer.x + outer.width + margin
        && inner.y + inner.height <= outer.y + outer.height + margin
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    count: usize,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    confidence: f64,
}

/// Merge raw detections into one rectangle per object
///
/// Clusters with fewer than `min_neighbors` members are discarded; with
/// `min_neighbors == 0` the raw list is returned untouched.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn group_rectangles(raw: &[DetectionRect], min_neighbors: usize) -> Vec<DetectionRect> {
    if min_neighbors == 0 {
        return raw.to_vec();
    }

    let (labels, classes) = array_group(raw, is_neighbor);
    let mut sums = vec![
        Accumulator {
            confidence: f64::NEG_INFINITY,
            ..Accumulator::default()
        };
        classes
    ];
    for (rect, &label) in raw.iter().zip(&labels) {
        let acc = &mut sums[label];
        acc.count += 1;
        acc.x += rect.x;
        acc.y += rect.y;
        acc.width += rect.width;
        acc.height += rect.height;
        acc.confidence = acc.confidence.max(rect.confidence);
    }

    let clusters: Vec<DetectionRect> = sums
        .iter()
        .filter(|acc| acc.count >= min_neighbors)
        .map(|acc| {
            let n = acc.count as f64;
            DetectionRect {
                x: acc.x / n,
                y: acc.y / n,
                width: acc.width / n,
                height: acc.height / n,
                confidence: acc.confidence,
                neighbors: acc.count,
            }
        })
        .collect();

    let merged: Vec<DetectionRect> = clusters
        .iter()
        .enumerate()
        .filter(|&(i, r1)| {
            !clusters.iter().enumerate().any(|(j, r2)| {
                i != j && r2.width > r1.width && r2.neighbors >= r1.neighbors && is_enclosed(r1, r2)
            })
        })
        .map(|(_, rect)| *rect)
        .collect();

    log::trace!(
        "Grouped {} raw detections into {} clusters, {} after enclosure filter",
        raw.len(),
        clusters.len(),
        merged.len()
    );
    merged
}
