//! Bounding volume hierarchy
//!
//! A binary tree of [`BoundingVolume`] nodes over indexed elements. Nodes are
//! split at the median of the member centers along the direction of greatest
//! spread until a leaf holds at most `max_leaf_size` members. The tree is a
//! read-only snapshot; rebuild it when the element set changes.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::BvhConfig;
use crate::error::{ModelError, ModelResult};
use crate::foundation::collections::IndexPair;
use crate::foundation::math::{Point3, Vec3};
use crate::geometry::principal_axes;
use crate::spatial::{BoundingVolume, Ray, Segment, VolumeKind};

/// Children of a hierarchy node
#[derive(Debug, Clone)]
pub enum BvhNodeKind {
    /// Two child subtrees
    Internal(Box<BvhNode>, Box<BvhNode>),
    /// Indices of the elements stored in this leaf
    Leaf(Vec<usize>),
}

/// Single node in the hierarchy
#[derive(Debug, Clone)]
pub struct BvhNode {
    /// Volume enclosing every element below this node
    pub volume: BoundingVolume,

    /// Depth in the tree (0 = root)
    pub depth: u32,

    /// Children or leaf members
    pub kind: BvhNodeKind,
}

impl BvhNode {
    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, BvhNodeKind::Leaf(_))
    }

    fn leaf_count(&self) -> usize {
        match &self.kind {
            BvhNodeKind::Leaf(_) => 1,
            BvhNodeKind::Internal(left, right) => left.leaf_count() + right.leaf_count(),
        }
    }

    fn depth_below(&self) -> u32 {
        match &self.kind {
            BvhNodeKind::Leaf(_) => self.depth,
            BvhNodeKind::Internal(left, right) => left.depth_below().max(right.depth_below()),
        }
    }
}

/// Bounding volume hierarchy over element volumes
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    volumes: Vec<BoundingVolume>,
    config: BvhConfig,
}

impl Bvh {
    /// Build a hierarchy over one point set per element
    ///
    /// Element `i` of the result corresponds to `point_sets[i]`. An empty point
    /// set fails with a geometry error.
    pub fn build<P: AsRef<[Point3]>>(point_sets: &[P], config: &BvhConfig) -> ModelResult<Self> {
        config.validate()?;
        let volumes = point_sets
            .iter()
            .enumerate()
            .map(|(i, points)| {
                BoundingVolume::from_points(config.volume_kind, points.as_ref(), config.inflate)
                    .map_err(|e| ModelError::Geometry(format!("element {i}: {e}")))
            })
            .collect::<ModelResult<Vec<_>>>()?;
        Self::from_volumes(volumes, config)
    }

    /// Build a hierarchy over precomputed element volumes
    ///
    /// `config.inflate` is not applied again; node volumes take `config.volume_kind`.
    pub fn from_volumes(volumes: Vec<BoundingVolume>, config: &BvhConfig) -> ModelResult<Self> {
        config.validate()?;
        let root = if volumes.is_empty() {
            None
        } else {
            let indices: Vec<usize> = (0..volumes.len()).collect();
            Some(build_node(&volumes, indices, 0, config)?)
        };

        let bvh = Self {
            root,
            volumes,
            config: config.clone(),
        };
        log::debug!(
            "Built {:?} BVH over {} elements: {} leaves, depth {}",
            bvh.config.volume_kind,
            bvh.len(),
            bvh.leaf_count(),
            bvh.depth()
        );
        Ok(bvh)
    }

    /// Number of indexed elements
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// Check if the hierarchy indexes no elements
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Root node, `None` for an empty hierarchy
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Volume of element `index`
    pub fn volume(&self, index: usize) -> Option<&BoundingVolume> {
        self.volumes.get(index)
    }

    /// Settings the hierarchy was built with
    pub fn config(&self) -> &BvhConfig {
        &self.config
    }

    /// Number of leaf nodes
    pub fn leaf_count(&self) -> usize {
        self.root.as_ref().map_or(0, BvhNode::leaf_count)
    }

    /// Depth of the deepest leaf (0 for a single-leaf tree)
    pub fn depth(&self) -> u32 {
        self.root.as_ref().map_or(0, BvhNode::depth_below)
    }

    /// Unordered pairs of elements whose enclosing nodes overlap
    ///
    /// Descends both subtrees of every internal node together and skips node
    /// pairs with disjoint volumes. Never misses a pair of intersecting
    /// element volumes.
    pub fn find_candidate_pairs(&self) -> BTreeSet<IndexPair> {
        let mut pairs = BTreeSet::new();
        if let Some(root) = &self.root {
            self_pairs(root, &mut pairs);
        }
        log::trace!("BVH traversal produced {} candidate pairs", pairs.len());
        pairs
    }

    /// Elements whose volume intersects `volume`, ascending
    pub fn query_volume(&self, volume: &BoundingVolume) -> Vec<usize> {
        self.collect(|v| v.intersects(volume))
    }

    /// Elements whose volume is hit by the ray, ascending
    pub fn query_ray(&self, ray: &Ray) -> Vec<usize> {
        self.collect(|v| v.intersects_ray(ray))
    }

    /// Elements whose volume is hit by the segment, ascending
    pub fn query_segment(&self, segment: &Segment) -> Vec<usize> {
        self.collect(|v| v.intersects_segment(segment))
    }

    /// Nearest element volume hit by the ray and its entry parameter
    ///
    /// Equal distances resolve to the smaller element index.
    pub fn closest_ray_hit(&self, ray: &Ray) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            let Some(entry) = node.volume.ray_entry(ray) else {
                continue;
            };
            if best.map_or(false, |(_, t)| entry > t) {
                continue;
            }
            match &node.kind {
                BvhNodeKind::Internal(left, right) => {
                    stack.push(right);
                    stack.push(left);
                }
                BvhNodeKind::Leaf(members) => {
                    for &i in members {
                        if let Some(t) = self.volumes[i].ray_entry(ray) {
                            let closer = match best {
                                None => true,
                                Some((j, best_t)) => t < best_t || (t == best_t && i < j),
                            };
                            if closer {
                                best = Some((i, t));
                            }
                        }
                    }
                }
            }
        }
        best
    }

    fn collect<F: Fn(&BoundingVolume) -> bool>(&self, test: F) -> Vec<usize> {
        let mut hits = Vec::new();
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            if !test(&node.volume) {
                continue;
            }
            match &node.kind {
                BvhNodeKind::Internal(left, right) => {
                    stack.push(left);
                    stack.push(right);
                }
                BvhNodeKind::Leaf(members) => {
                    hits.extend(members.iter().copied().filter(|&i| test(&self.volumes[i])));
                }
            }
        }
        hits.sort_unstable();
        hits
    }
}

fn build_node(
    volumes: &[BoundingVolume],
    mut indices: Vec<usize>,
    depth: u32,
    config: &BvhConfig,
) -> ModelResult<BvhNode> {
    let members: Vec<BoundingVolume> = indices.iter().map(|&i| volumes[i]).collect();
    let volume = BoundingVolume::enclosing(config.volume_kind, &members)?;

    let depth_reached = config.max_depth.map_or(false, |max| depth >= max);
    if indices.len() <= config.max_leaf_size || indices.len() < 2 || depth_reached {
        return Ok(BvhNode {
            volume,
            depth,
            kind: BvhNodeKind::Leaf(indices),
        });
    }

    let centers: Vec<Point3> = members.iter().map(BoundingVolume::center).collect();
    let axis = split_axis(config.volume_kind, &centers);
    indices.sort_by(|&a, &b| {
        let pa = volumes[a].center().coords.dot(&axis);
        let pb = volumes[b].center().coords.dot(&axis);
        pa.partial_cmp(&pb).unwrap_or(Ordering::Equal).then(a.cmp(&b))
    });
    let right_indices = indices.split_off(indices.len() / 2);

    let left = build_node(volumes, indices, depth + 1, config)?;
    let right = build_node(volumes, right_indices, depth + 1, config)?;
    Ok(BvhNode {
        volume,
        depth,
        kind: BvhNodeKind::Internal(Box::new(left), Box::new(right)),
    })
}

/// Direction along which the member centers spread the most
fn split_axis(kind: VolumeKind, centers: &[Point3]) -> Vec3 {
    match kind {
        VolumeKind::Aabb => {
            let mut min = centers[0];
            let mut max = centers[0];
            for c in centers {
                min = min.inf(c);
                max = max.sup(c);
            }
            let spread = max - min;
            let mut axis = Vec3::zeros();
            axis[spread.imax()] = 1.0;
            axis
        }
        VolumeKind::Obb => principal_axes(centers).map_or_else(Vec3::x, |pca| pca.axes[0]),
    }
}

fn self_pairs(node: &BvhNode, out: &mut BTreeSet<IndexPair>) {
    match &node.kind {
        BvhNodeKind::Leaf(members) => {
            for (k, &a) in members.iter().enumerate() {
                for &b in &members[k + 1..] {
                    out.insert(IndexPair::new(a, b));
                }
            }
        }
        BvhNodeKind::Internal(left, right) => {
            self_pairs(left, out);
            self_pairs(right, out);
            cross_pairs(left, right, out);
        }
    }
}

fn cross_pairs(a: &BvhNode, b: &BvhNode, out: &mut BTreeSet<IndexPair>) {
    if !a.volume.intersects(&b.volume) {
        return;
    }
    match (&a.kind, &b.kind) {
        (BvhNodeKind::Leaf(xs), BvhNodeKind::Leaf(ys)) => {
            for &x in xs {
                for &y in ys {
                    out.insert(IndexPair::new(x, y));
                }
            }
        }
        (BvhNodeKind::Leaf(_), BvhNodeKind::Internal(left, right)) => {
            cross_pairs(a, left, out);
            cross_pairs(a, right, out);
        }
        (BvhNodeKind::Internal(left, right), _) => {
            cross_pairs(left, b, out);
            cross_pairs(right, b, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn cube(min: Point3, size: f64) -> Vec<Point3> {
        BoundingVolume::Aabb { min, max: min + Vec3::repeat(size) }.corners()
    }

    fn random_boxes(rng: &mut StdRng, count: usize) -> Vec<Vec<Point3>> {
        (0..count)
            .map(|_| {
                let min = Point3::new(rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0), rng.gen_range(0.0..20.0));
                cube(min, rng.gen_range(0.5..3.0))
            })
            .collect()
    }

    fn collect_leaf_members(node: &BvhNode, out: &mut Vec<usize>) {
        match &node.kind {
            BvhNodeKind::Leaf(members) => out.extend(members),
            BvhNodeKind::Internal(left, right) => {
                collect_leaf_members(left, out);
                collect_leaf_members(right, out);
            }
        }
    }

    #[test]
    fn test_leaves_partition_the_input() {
        let mut rng = StdRng::seed_from_u64(7);
        let boxes = random_boxes(&mut rng, 57);
        let config = BvhConfig {
            max_leaf_size: 3,
            ..BvhConfig::default()
        };
        let bvh = Bvh::build(&boxes, &config).unwrap();

        let mut members = Vec::new();
        collect_leaf_members(bvh.root().unwrap(), &mut members);
        members.sort_unstable();
        assert_eq!(members, (0..57).collect::<Vec<_>>());
        assert!(bvh.depth() <= 6);
    }

    #[test]
    fn test_node_volumes_contain_children() {
        fn check(node: &BvhNode, bvh: &Bvh) {
            let mut members = Vec::new();
            collect_leaf_members(node, &mut members);
            for i in members {
                for corner in bvh.volume(i).unwrap().corners() {
                    assert!(node.volume.contains_point(&corner));
                }
            }
            if let BvhNodeKind::Internal(left, right) = &node.kind {
                check(left, bvh);
                check(right, bvh);
            }
        }

        let mut rng = StdRng::seed_from_u64(11);
        let boxes = random_boxes(&mut rng, 30);
        for kind in [VolumeKind::Aabb, VolumeKind::Obb] {
            let config = BvhConfig {
                volume_kind: kind,
                ..BvhConfig::default()
            };
            let bvh = Bvh::build(&boxes, &config).unwrap();
            check(bvh.root().unwrap(), &bvh);
        }
    }

    #[test]
    fn test_candidates_superset_of_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let boxes = random_boxes(&mut rng, 80);
        for kind in [VolumeKind::Aabb, VolumeKind::Obb] {
            let config = BvhConfig {
                volume_kind: kind,
                max_leaf_size: 2,
                inflate: 0.1,
                ..BvhConfig::default()
            };
            let bvh = Bvh::build(&boxes, &config).unwrap();
            let candidates = bvh.find_candidate_pairs();

            for i in 0..boxes.len() {
                for j in (i + 1)..boxes.len() {
                    let (a, b) = (bvh.volume(i).unwrap(), bvh.volume(j).unwrap());
                    if a.intersects(b) {
                        assert!(candidates.contains(&IndexPair::new(i, j)), "missed pair ({i}, {j}) with {kind:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let mut rng = StdRng::seed_from_u64(3);
        let boxes = random_boxes(&mut rng, 64);
        let config = BvhConfig {
            max_depth: Some(2),
            ..BvhConfig::default()
        };
        let bvh = Bvh::build(&boxes, &config).unwrap();
        assert_eq!(bvh.depth(), 2);
        assert_eq!(bvh.leaf_count(), 4);
    }

    #[test]
    fn test_ray_queries() {
        let boxes = vec![
            cube(Point3::new(0.0, 0.0, 0.0), 1.0),
            cube(Point3::new(3.0, 0.0, 0.0), 1.0),
            cube(Point3::new(6.0, 0.0, 0.0), 1.0),
            cube(Point3::new(3.0, 5.0, 0.0), 1.0),
        ];
        let bvh = Bvh::build(&boxes, &BvhConfig::default()).unwrap();
        let ray = Ray::new(Point3::new(-1.0, 0.5, 0.5), Vec3::x());

        assert_eq!(bvh.query_ray(&ray), vec![0, 1, 2]);
        let (index, t) = bvh.closest_ray_hit(&ray).unwrap();
        assert_eq!(index, 0);
        assert_relative_eq!(t, 1.0);

        let segment = Segment::new(Point3::new(2.0, 0.5, 0.5), Point3::new(5.0, 0.5, 0.5));
        assert_eq!(bvh.query_segment(&segment), vec![1]);

        let probe = BoundingVolume::Aabb {
            min: Point3::new(3.5, 0.5, 0.0),
            max: Point3::new(3.6, 5.5, 0.1),
        };
        assert_eq!(bvh.query_volume(&probe), vec![1, 3]);
    }

    #[test]
    fn test_closest_hit_ties_prefer_smaller_index() {
        let boxes = vec![
            cube(Point3::new(2.0, 0.0, 0.0), 1.0),
            cube(Point3::new(2.0, 0.0, 0.0), 1.0),
        ];
        let bvh = Bvh::build(&boxes, &BvhConfig::default()).unwrap();
        let ray = Ray::new(Point3::new(0.0, 0.5, 0.5), Vec3::x());
        assert_eq!(bvh.closest_ray_hit(&ray).map(|(i, _)| i), Some(0));
    }

    #[test]
    fn test_empty_inputs() {
        let empty: Vec<Vec<Point3>> = Vec::new();
        let bvh = Bvh::build(&empty, &BvhConfig::default()).unwrap();
        assert!(bvh.is_empty());
        assert!(bvh.find_candidate_pairs().is_empty());

        let with_hole = vec![cube(Point3::origin(), 1.0), Vec::new()];
        assert!(matches!(
            Bvh::build(&with_hole, &BvhConfig::default()),
            Err(ModelError::Geometry(_))
        ));
    }
}
