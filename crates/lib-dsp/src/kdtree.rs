//! A small 2-D KD-tree for nearest-neighbor queries.
//!
//! The spatial-scan merger calibrates each incoming scan against the
//! phase already present on the composite grid, estimated from the k
//! nearest valid cells around the calibration point. Point sets are a
//! few hundred entries, so a compact median-split tree is plenty.

use crate::error::{DspError, DspResult};

#[derive(Clone, Debug)]
struct Node {
    point: [f64; 2],
    /// Index into the original point slice.
    index: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Balanced 2-D KD-tree over a fixed point set.
#[derive(Clone, Debug)]
pub struct KdTree2 {
    nodes: Vec<Node>,
    root: usize,
}

impl KdTree2 {
    /// Build a tree from `(x, y)` points. The returned neighbor indices
    /// refer to positions in this slice.
    pub fn build(points: &[[f64; 2]]) -> DspResult<Self> {
        if points.is_empty() {
            return Err(DspError::EmptyPointSet);
        }
        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut nodes = Vec::with_capacity(points.len());
        let root = build_recursive(points, &mut order, 0, &mut nodes);
        Ok(Self { nodes, root })
    }

    /// The `k` nearest points to `query`, as `(distance, index)` pairs
    /// ordered near to far. Returns fewer than `k` when the tree is
    /// smaller.
    pub fn nearest(&self, query: [f64; 2], k: usize) -> Vec<(f64, usize)> {
        let k = k.min(self.nodes.len()).max(1);
        let mut best: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.search(self.root, query, k, &mut best);
        for entry in best.iter_mut() {
            entry.0 = entry.0.sqrt();
        }
        best
    }

    /// Worst distance currently kept, squared.
    fn search(&self, node_id: usize, query: [f64; 2], k: usize, best: &mut Vec<(f64, usize)>) {
        let node = &self.nodes[node_id];

        let dx = query[0] - node.point[0];
        let dy = query[1] - node.point[1];
        let dist_sq = dx * dx + dy * dy;
        insert_candidate(best, k, dist_sq, node.index);

        let delta = query[node.axis] - node.point[node.axis];
        let (near, far) = if delta <= 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.search(child, query, k, best);
        }
        // Cross the splitting plane only if the hypersphere of current
        // candidates reaches it
        let worst = best.last().map(|&(d, _)| d).unwrap_or(f64::INFINITY);
        if let Some(child) = far {
            if best.len() < k || delta * delta < worst {
                self.search(child, query, k, best);
            }
        }
    }
}

fn build_recursive(
    points: &[[f64; 2]],
    order: &mut [usize],
    depth: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let axis = depth % 2;
    order.sort_by(|&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let median = order.len() / 2;
    let index = order[median];

    let node_id = nodes.len();
    nodes.push(Node {
        point: points[index],
        index,
        axis,
        left: None,
        right: None,
    });

    // Split the working slice around the median; the borrow ends before
    // either recursion starts
    let (left_ids, rest) = order.split_at_mut(median);
    let (_, right_ids) = rest.split_at_mut(1);

    if !left_ids.is_empty() {
        let child = build_recursive(points, left_ids, depth + 1, nodes);
        nodes[node_id].left = Some(child);
    }
    if !right_ids.is_empty() {
        let child = build_recursive(points, right_ids, depth + 1, nodes);
        nodes[node_id].right = Some(child);
    }
    node_id
}

/// Keep the candidate list sorted by distance, capped at `k`.
fn insert_candidate(best: &mut Vec<(f64, usize)>, k: usize, dist_sq: f64, index: usize) {
    let pos = best
        .binary_search_by(|&(d, _)| d.total_cmp(&dist_sq))
        .unwrap_or_else(|p| p);
    best.insert(pos, (dist_sq, index));
    if best.len() > k {
        best.pop();
    }
}
