//! Balanced k-d tree over 3D points
//!
//! Each node stores one median point. The split dimension is the one with the
//! largest variance among the points below the node. Left subtrees hold
//! coordinates `<=` the split value and right subtrees `>=`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::foundation::math::Point3;

#[derive(Debug, Clone)]
struct KdNode {
    index: usize,
    axis: usize,
    split: f64,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// Nearest-neighbour index over element centroids
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<Point3>,
    root: Option<Box<KdNode>>,
}

/// Best candidate found so far: squared distance and index
type Best = Option<(f64, usize)>;

fn better(d2: f64, index: usize, best: Best) -> bool {
    match best {
        None => true,
        Some((best_d2, best_index)) => d2 < best_d2 || (d2 == best_d2 && index < best_index),
    }
}

impl KdTree {
    /// Build a balanced tree; point `i` keeps index `i`
    pub fn build(points: &[Point3]) -> Self {
        let indices: Vec<usize> = (0..points.len()).collect();
        let root = build_node(points, indices);
        log::trace!("Built k-d tree over {} points", points.len());
        Self {
            points: points.to_vec(),
            root,
        }
    }

    /// Number of indexed points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point stored at `index`
    pub fn point(&self, index: usize) -> Option<&Point3> {
        self.points.get(index)
    }

    /// Index of the point closest to `query`; ties resolve to the smallest index
    pub fn nearest(&self, query: &Point3) -> Option<usize> {
        self.nearest_excluding(query, &BTreeSet::new())
    }

    /// Closest point whose index is not in `exclude`
    pub fn nearest_excluding(&self, query: &Point3, exclude: &BTreeSet<usize>) -> Option<usize> {
        let mut best: Best = None;
        if let Some(root) = &self.root {
            self.search(root, query, exclude, &mut best);
        }
        best.map(|(_, index)| index)
    }

    /// The `k` closest points sorted by distance, then index
    pub fn nearest_k(&self, query: &Point3, k: usize) -> Vec<usize> {
        let mut exclude = BTreeSet::new();
        let mut found = Vec::with_capacity(k.min(self.len()));
        while found.len() < k {
            let Some(index) = self.nearest_excluding(query, &exclude) else {
                break;
            };
            exclude.insert(index);
            found.push(index);
        }
        found
    }

    /// All points within distance `radius` of `query` (boundary included), ascending
    pub fn radius(&self, query: &Point3, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        if radius < 0.0 {
            return found;
        }
        let r2 = radius * radius;
        let mut stack: Vec<&KdNode> = self.root.as_deref().into_iter().collect();
        while let Some(node) = stack.pop() {
            if (self.points[node.index] - query).norm_squared() <= r2 {
                found.push(node.index);
            }
            let diff = query[node.axis] - node.split;
            if let Some(left) = node.left.as_deref() {
                if diff <= radius {
                    stack.push(left);
                }
            }
            if let Some(right) = node.right.as_deref() {
                if diff >= -radius {
                    stack.push(right);
                }
            }
        }
        found.sort_unstable();
        found
    }

    fn search(&self, node: &KdNode, query: &Point3, exclude: &BTreeSet<usize>, best: &mut Best) {
        if !exclude.contains(&node.index) {
            let d2 = (self.points[node.index] - query).norm_squared();
            if better(d2, node.index, *best) {
                *best = Some((d2, node.index));
            }
        }

        let diff = query[node.axis] - node.split;
        let (near, far) = if diff <= 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(near) = near {
            self.search(near, query, exclude, best);
        }
        if let Some(far) = far {
            // equal distance is still explored so ties can resolve by index
            if best.map_or(true, |(d2, _)| diff * diff <= d2) {
                self.search(far, query, exclude, best);
            }
        }
    }
}

fn build_node(points: &[Point3], mut indices: Vec<usize>) -> Option<Box<KdNode>> {
    if indices.is_empty() {
        return None;
    }
    let axis = widest_axis(points, &indices);
    let median = indices.len() / 2;
    // O(n) median partition per level
    indices.select_nth_unstable_by(median, |&a, &b| {
        points[a][axis]
            .partial_cmp(&points[b][axis])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    let right_indices = indices.split_off(median + 1);
    let index = indices.pop()?;

    Some(Box::new(KdNode {
        index,
        axis,
        split: points[index][axis],
        left: build_node(points, indices),
        right: build_node(points, right_indices),
    }))
}

/// Dimension with the largest variance among `indices`
fn widest_axis(points: &[Point3], indices: &[usize]) -> usize {
    let n = indices.len() as f64;
    let mut best_axis = 0;
    let mut best_variance = f64::NEG_INFINITY;
    for axis in 0..3 {
        let mean = indices.iter().map(|&i| points[i][axis]).sum::<f64>() / n;
        let variance = indices
            .iter()
            .map(|&i| (points[i][axis] - mean).powi(2))
            .sum::<f64>();
        if variance > best_variance {
            best_variance = variance;
            best_axis = axis;
        }
    }
    best_axis
}
