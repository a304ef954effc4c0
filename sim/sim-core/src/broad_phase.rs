//! Broad-phase collision detection using an adaptive octree.
//!
//! The octree keeps every attached shape's world bounding box in a spatial
//! partition that persists across steps. Each step the world enumerates the
//! leaves and only tests shape pairs that share a leaf, which reduces the
//! O(n²) pair problem to the handful of shapes in each region.
//!
//! # Structure
//!
//! ```text
//!                    root (leaf until it fills up)
//!                     │
//!        ┌──────┬─────┴─┬───────┬── ... 8 children, each half the edge
//!        ▼      ▼       ▼       ▼
//!      leaf   leaf   internal  leaf     only leaves store shapes
//!                       │
//!                   8 children
//! ```
//!
//! - A leaf that already holds `max_shapes_per_node` shapes subdivides on the
//!   next insert, provided its largest edge exceeds `min_node_size`.
//! - A shape straddling a child boundary is stored in every child it overlaps.
//! - After a removal, a node whose children are all leaves and together hold
//!   no more than `max_shapes_per_node` entries collapses back into a leaf.
//!   The check runs on every ancestor of the removal.
//!
//! Pairs that overlap but never share a leaf are not reported. With
//! straddling shapes stored in every overlapped child this only happens for
//! boxes outside the root region.
//!
//! # Example
//!
//! ```
//! use sim_core::broad_phase::{Aabb, Octree};
//! use sim_types::{OctreeConfig, ShapeId};
//! use nalgebra::{Point3, Vector3};
//! use slotmap::SlotMap;
//!
//! let mut ids: SlotMap<ShapeId, ()> = SlotMap::with_key();
//! let mut tree = Octree::new(OctreeConfig::cube(100.0).max_shapes_per_node(2).min_node_size(1.0));
//!
//! let a = ids.insert(());
//! let b = ids.insert(());
//! let c = ids.insert(());
//! tree.insert(a, Aabb::from_center(Point3::new(-20.0, -20.0, -20.0), Vector3::repeat(1.0)));
//! tree.insert(b, Aabb::from_center(Point3::new(20.0, 20.0, 20.0), Vector3::repeat(1.0)));
//! tree.insert(c, Aabb::from_center(Point3::new(21.0, 20.0, 20.0), Vector3::repeat(1.0)));
//!
//! // Three shapes exceed the occupancy of two, so the root split.
//! assert!(!tree.is_collapsed());
//! assert_eq!(tree.candidate_pairs().len(), 1);
//!
//! tree.remove(c);
//! assert!(tree.is_collapsed());
//! ```

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use sim_types::{OctreeConfig, ShapeId};
use tracing::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::new(Point3::origin(), Point3::origin())
    }
}

impl Aabb {
    /// Create a new AABB from minimum and maximum corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Center point.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Full edge lengths.
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Half edge lengths.
    #[must_use]
    pub fn half_extents(&self) -> Vector3<f64> {
        self.size() * 0.5
    }

    /// Longest edge.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.size().max()
    }

    /// Check if this AABB overlaps with another AABB (touching counts).
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Check if a point lies inside (boundary included).
    #[must_use]
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }

    /// Smallest AABB containing both.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Clamp both corners into `bounds`.
    ///
    /// A box lying entirely outside becomes a flat box on the nearest face,
    /// which still overlaps the children along that face.
    #[must_use]
    pub fn clamped(&self, bounds: &Self) -> Self {
        let clamp = |p: &Point3<f64>| p.sup(&bounds.min).inf(&bounds.max);
        Self {
            min: clamp(&self.min),
            max: clamp(&self.max),
        }
    }

    /// Entry distance of a ray into this box (slab test).
    ///
    /// Returns `None` if the ray misses or the hit lies beyond `max_distance`.
    /// A ray starting inside reports 0.
    #[must_use]
    pub fn ray_entry(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_distance;
        for i in 0..3 {
            if direction[i].abs() < 1e-12 {
                if origin[i] < self.min[i] || origin[i] > self.max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / direction[i];
            let mut t0 = (self.min[i] - origin[i]) * inv;
            let mut t1 = (self.max[i] - origin[i]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// A shape's bounding box as stored in a leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeEntry {
    /// The stored shape.
    pub shape: ShapeId,
    /// Its world bounding box at insertion time.
    pub aabb: Aabb,
}

/// Shape counts and tree shape, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OctreeStats {
    /// Total nodes, leaves included.
    pub nodes: usize,
    /// Leaf nodes.
    pub leaves: usize,
    /// Deepest level (root is 0).
    pub depth: usize,
    /// Leaf entries, counting straddling shapes once per leaf.
    pub entries: usize,
}

#[derive(Debug, Clone)]
enum NodeState {
    Leaf(Vec<OctreeEntry>),
    Internal(Box<[OctreeNode; 8]>),
}

#[derive(Debug, Clone)]
struct OctreeNode {
    bounds: Aabb,
    child_bounds: [Aabb; 8],
    state: NodeState,
}

/// Child regions: quarter-offset centers, half the parent edge.
fn child_regions(bounds: &Aabb) -> [Aabb; 8] {
    let center = bounds.center();
    let quarter = bounds.size() * 0.25;
    std::array::from_fn(|i| {
        let sign = |bit: usize| if i & bit == 0 { -1.0 } else { 1.0 };
        let offset = Vector3::new(sign(1) * quarter.x, sign(2) * quarter.y, sign(4) * quarter.z);
        Aabb::from_center(center + offset, quarter)
    })
}

impl OctreeNode {
    fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            child_bounds: child_regions(&bounds),
            state: NodeState::Leaf(Vec::new()),
        }
    }

    fn insert(&mut self, entry: OctreeEntry, config: &OctreeConfig) {
        if let NodeState::Internal(children) = &mut self.state {
            let route = entry.aabb.clamped(&self.bounds);
            for child in children.iter_mut() {
                if child.bounds.overlaps(&route) {
                    child.insert(entry, config);
                }
            }
            return;
        }

        let should_split = match &mut self.state {
            NodeState::Leaf(entries) => {
                if let Some(existing) = entries.iter_mut().find(|e| e.shape == entry.shape) {
                    existing.aabb = entry.aabb;
                    return;
                }
                entries.len() >= config.max_shapes_per_node
                    && self.bounds.max_extent() > config.min_node_size
            }
            NodeState::Internal(_) => false,
        };

        if should_split {
            self.subdivide(config);
            self.insert(entry, config);
        } else if let NodeState::Leaf(entries) = &mut self.state {
            entries.push(entry);
        }
    }

    fn subdivide(&mut self, config: &OctreeConfig) {
        let children = Box::new(self.child_bounds.map(Self::new));
        let previous = std::mem::replace(&mut self.state, NodeState::Internal(children));
        if let NodeState::Leaf(entries) = previous {
            trace!(
                count = entries.len(),
                size = self.bounds.max_extent(),
                "octree node subdivided"
            );
            for entry in entries {
                self.insert(entry, config);
            }
        }
    }

    /// Remove `shape` from every leaf below. Returns whether anything was
    /// removed; ancestors use that to re-check for a merge.
    fn remove(&mut self, shape: ShapeId, config: &OctreeConfig) -> bool {
        let removed = match &mut self.state {
            NodeState::Leaf(entries) => {
                let before = entries.len();
                entries.retain(|e| e.shape != shape);
                return entries.len() != before;
            }
            NodeState::Internal(children) => children
                .iter_mut()
                .fold(false, |acc, child| child.remove(shape, config) | acc),
        };

        if removed {
            self.try_merge(config);
        }
        removed
    }

    /// Collapse the children into this node when they are all leaves and
    /// their entry counts sum to at most the occupancy limit.
    fn try_merge(&mut self, config: &OctreeConfig) -> bool {
        let merged = {
            let NodeState::Internal(children) = &self.state else {
                return false;
            };

            let mut total = 0;
            for child in children.iter() {
                match &child.state {
                    NodeState::Leaf(entries) => total += entries.len(),
                    NodeState::Internal(_) => return false,
                }
            }
            if total > config.max_shapes_per_node {
                return false;
            }

            let mut merged: Vec<OctreeEntry> = Vec::with_capacity(total);
            for child in children.iter() {
                if let NodeState::Leaf(entries) = &child.state {
                    for entry in entries {
                        if !merged.iter().any(|m| m.shape == entry.shape) {
                            merged.push(*entry);
                        }
                    }
                }
            }
            merged
        };

        trace!(
            count = merged.len(),
            size = self.bounds.max_extent(),
            "octree node collapsed"
        );
        self.state = NodeState::Leaf(merged);
        true
    }

    fn stats(&self, depth: usize, stats: &mut OctreeStats) {
        stats.nodes += 1;
        stats.depth = stats.depth.max(depth);
        match &self.state {
            NodeState::Leaf(entries) => {
                stats.leaves += 1;
                stats.entries += entries.len();
            }
            NodeState::Internal(children) => {
                for child in children.iter() {
                    child.stats(depth + 1, stats);
                }
            }
        }
    }
}

/// Depth-first walk over the leaves, child 0 first.
#[derive(Debug)]
pub struct Leaves<'a> {
    stack: Vec<&'a OctreeNode>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = (&'a Aabb, &'a [OctreeEntry]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match &node.state {
                NodeState::Leaf(entries) => return Some((&node.bounds, entries.as_slice())),
                NodeState::Internal(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}

/// Adaptive octree over shape bounding boxes.
#[derive(Debug, Clone)]
pub struct Octree {
    root: OctreeNode,
    config: OctreeConfig,
    index: HashMap<ShapeId, Aabb>,
}

impl Default for Octree {
    fn default() -> Self {
        Self::new(OctreeConfig::default())
    }
}

impl Octree {
    /// Create an empty tree covering `config.extent` around `config.center`.
    #[must_use]
    pub fn new(config: OctreeConfig) -> Self {
        let bounds = Aabb::from_center(config.center, config.extent * 0.5);
        Self {
            root: OctreeNode::new(bounds),
            config,
            index: HashMap::new(),
        }
    }

    /// The configuration this tree was built with.
    #[must_use]
    pub fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Root region.
    #[must_use]
    pub fn bounds(&self) -> &Aabb {
        &self.root.bounds
    }

    /// Number of distinct shapes stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the tree holds no shapes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `shape` is stored.
    #[must_use]
    pub fn contains(&self, shape: ShapeId) -> bool {
        self.index.contains_key(&shape)
    }

    /// Bounding box `shape` was last inserted with.
    #[must_use]
    pub fn aabb(&self, shape: ShapeId) -> Option<&Aabb> {
        self.index.get(&shape)
    }

    /// Whether the root is a leaf (no subdivision anywhere).
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        matches!(self.root.state, NodeState::Leaf(_))
    }

    /// Insert a shape. Inserting a stored shape again refreshes its box.
    pub fn insert(&mut self, shape: ShapeId, aabb: Aabb) {
        if self.index.contains_key(&shape) {
            self.update(shape, aabb);
            return;
        }
        self.index.insert(shape, aabb);
        self.root.insert(OctreeEntry { shape, aabb }, &self.config);
    }

    /// Remove a shape from every leaf. Returns false if it was not stored.
    pub fn remove(&mut self, shape: ShapeId) -> bool {
        if self.index.remove(&shape).is_none() {
            return false;
        }
        self.root.remove(shape, &self.config);
        true
    }

    /// Move a shape to a new box: remove, then insert.
    pub fn update(&mut self, shape: ShapeId, aabb: Aabb) {
        self.remove(shape);
        self.index.insert(shape, aabb);
        self.root.insert(OctreeEntry { shape, aabb }, &self.config);
    }

    /// Drop every shape and collapse to an empty root.
    pub fn clear(&mut self) {
        self.root = OctreeNode::new(self.root.bounds);
        self.index.clear();
    }

    /// Iterate over leaves with their regions and entries.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            stack: vec![&self.root],
        }
    }

    /// All distinct unordered pairs sharing a leaf, in traversal order.
    ///
    /// A pair sharing several leaves appears once per shared leaf.
    #[must_use]
    pub fn candidate_pairs(&self) -> Vec<(ShapeId, ShapeId)> {
        let mut pairs = Vec::new();
        for (_, entries) in self.leaves() {
            for (i, a) in entries.iter().enumerate() {
                for b in &entries[i + 1..] {
                    pairs.push((a.shape, b.shape));
                }
            }
        }
        pairs
    }

    /// Shapes whose stored box overlaps `aabb`, sorted and de-duplicated.
    #[must_use]
    pub fn query_aabb(&self, aabb: &Aabb) -> Vec<ShapeId> {
        let mut found: Vec<ShapeId> = self
            .leaves()
            .filter(|(bounds, _)| bounds.overlaps(&aabb.clamped(&self.root.bounds)))
            .flat_map(|(_, entries)| entries.iter())
            .filter(|e| e.aabb.overlaps(aabb))
            .map(|e| e.shape)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Shapes whose stored box is crossed by the ray, sorted and de-duplicated.
    #[must_use]
    pub fn query_ray(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Vec<ShapeId> {
        let mut found: Vec<ShapeId> = self
            .leaves()
            .flat_map(|(_, entries)| entries.iter())
            .filter(|e| e.aabb.ray_entry(origin, direction, max_distance).is_some())
            .map(|e| e.shape)
            .collect();
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Node, leaf and entry counts.
    #[must_use]
    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats::default();
        self.root.stats(0, &mut stats);
        stats
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::cast_precision_loss
)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn ids(n: usize) -> Vec<ShapeId> {
        let mut arena: SlotMap<ShapeId, ()> = SlotMap::with_key();
        (0..n).map(|_| arena.insert(())).collect()
    }

    fn cube_at(x: f64, y: f64, z: f64) -> Aabb {
        Aabb::from_center(Point3::new(x, y, z), Vector3::repeat(0.5))
    }

    fn small_tree(max: usize) -> Octree {
        Octree::new(OctreeConfig::cube(64.0).max_shapes_per_node(max).min_node_size(4.0))
    }

    #[test]
    fn test_aabb_overlaps() {
        let a = cube_at(0.0, 0.0, 0.0);
        let b = cube_at(0.9, 0.0, 0.0);
        let c = cube_at(1.0, 0.0, 0.0);
        let d = cube_at(1.1, 0.0, 0.0);
        assert!(a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(!a.overlaps(&d));
    }

    #[test]
    fn test_aabb_clamped_outside() {
        let bounds = Aabb::from_center(Point3::origin(), Vector3::repeat(10.0));
        let far = cube_at(50.0, 0.0, 0.0);
        let clamped = far.clamped(&bounds);
        assert_eq!(clamped.min.x, 10.0);
        assert_eq!(clamped.max.x, 10.0);
        assert!(clamped.overlaps(&bounds));
    }

    #[test]
    fn test_aabb_ray_entry() {
        let b = cube_at(5.0, 0.0, 0.0);
        let t = b.ray_entry(&Point3::origin(), &Vector3::x(), 100.0).unwrap();
        assert!((t - 4.5).abs() < 1e-12);
        assert!(b.ray_entry(&Point3::origin(), &Vector3::y(), 100.0).is_none());
        assert!(b.ray_entry(&Point3::origin(), &Vector3::x(), 4.0).is_none());
        assert_eq!(b.ray_entry(&Point3::new(5.0, 0.0, 0.0), &Vector3::x(), 1.0), Some(0.0));
    }

    #[test]
    fn test_child_regions_tile_parent() {
        let parent = Aabb::from_center(Point3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 8.0, 2.0));
        let children = child_regions(&parent);
        let mut union = children[0];
        for c in &children {
            assert_eq!(c.size(), parent.size() * 0.5);
            union = union.merged(c);
        }
        assert_eq!(union, parent);
    }

    #[test]
    fn test_leaf_fills_before_split() {
        let shapes = ids(3);
        let mut tree = small_tree(3);
        for (i, s) in shapes.iter().enumerate() {
            tree.insert(*s, cube_at(i as f64 * 10.0 - 10.0, 0.0, 0.0));
        }
        assert!(tree.is_collapsed());
        assert_eq!(tree.candidate_pairs().len(), 3);
    }

    #[test]
    fn test_split_separates_far_shapes() {
        let shapes = ids(4);
        let mut tree = small_tree(3);
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(20.0, 20.0, 20.0));
        tree.insert(shapes[2], cube_at(-20.0, 20.0, -20.0));
        tree.insert(shapes[3], cube_at(20.0, -20.0, 20.0));

        assert!(!tree.is_collapsed());
        assert!(tree.candidate_pairs().is_empty());
        assert_eq!(tree.stats().leaves, 8);
    }

    #[test]
    fn test_straddling_shape_in_multiple_leaves() {
        let shapes = ids(3);
        let mut tree = small_tree(2);
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(20.0, 20.0, 20.0));
        // Straddles the center, so every child gets it.
        tree.insert(shapes[2], cube_at(0.0, 0.0, 0.0));

        let stats = tree.stats();
        assert_eq!(stats.leaves, 8);
        assert_eq!(stats.entries, 10);
        assert_eq!(tree.len(), 3);

        let pairs = tree.candidate_pairs();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(a, b)| *a == shapes[2] || *b == shapes[2]));
    }

    #[test]
    fn test_min_node_size_stops_split() {
        let shapes = ids(10);
        let mut tree = Octree::new(OctreeConfig::cube(8.0).max_shapes_per_node(2).min_node_size(8.0));
        for s in &shapes {
            tree.insert(*s, cube_at(1.0, 1.0, 1.0));
        }
        assert!(tree.is_collapsed());
        assert_eq!(tree.stats().entries, 10);
    }

    #[test]
    fn test_zero_size_root_never_splits() {
        let shapes = ids(30);
        let mut tree = Octree::new(OctreeConfig::cube(0.0).max_shapes_per_node(1).min_node_size(1.0));
        for s in &shapes {
            tree.insert(*s, cube_at(3.0, 0.0, 0.0));
        }
        assert!(tree.is_collapsed());
        assert_eq!(tree.len(), 30);
    }

    #[test]
    fn test_out_of_bounds_shape_still_stored() {
        let shapes = ids(4);
        let mut tree = small_tree(1);
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(500.0, 500.0, 500.0));
        tree.insert(shapes[2], cube_at(501.0, 500.0, 500.0));

        assert_eq!(tree.len(), 3);
        let pairs = tree.candidate_pairs();
        assert!(pairs.contains(&(shapes[1], shapes[2])) || pairs.contains(&(shapes[2], shapes[1])));
        assert_eq!(tree.query_aabb(&cube_at(500.0, 500.0, 500.0)), {
            let mut v = vec![shapes[1], shapes[2]];
            v.sort_unstable();
            v
        });
    }

    #[test]
    fn test_merge_triggers_exactly_at_max() {
        let shapes = ids(4);
        let mut tree = small_tree(3);
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(20.0, 20.0, 20.0));
        tree.insert(shapes[2], cube_at(-20.0, 20.0, 20.0));
        tree.insert(shapes[3], cube_at(20.0, -20.0, 20.0));
        assert!(!tree.is_collapsed());

        // One entry in each of four children; one removal leaves exactly 3.
        tree.remove(shapes[3]);
        assert!(tree.is_collapsed());
        assert_eq!(tree.stats().entries, 3);
    }

    #[test]
    fn test_merge_sums_every_child() {
        let shapes = ids(5);
        let mut tree = small_tree(3);
        // Two shapes in child 0, two in child 7.
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(-22.0, -20.0, -20.0));
        tree.insert(shapes[2], cube_at(20.0, 20.0, 20.0));
        tree.insert(shapes[3], cube_at(22.0, 20.0, 20.0));
        tree.insert(shapes[4], cube_at(20.0, 22.0, 20.0));
        assert!(!tree.is_collapsed());

        // 2 + 2 = 4 > 3 after this removal; summing only the last child
        // would wrongly collapse here.
        tree.remove(shapes[4]);
        assert!(!tree.is_collapsed());

        tree.remove(shapes[3]);
        assert!(tree.is_collapsed());
    }

    #[test]
    fn test_update_moves_shape() {
        let shapes = ids(4);
        let mut tree = small_tree(2);
        tree.insert(shapes[0], cube_at(-20.0, -20.0, -20.0));
        tree.insert(shapes[1], cube_at(20.0, 20.0, 20.0));
        tree.insert(shapes[2], cube_at(20.0, 20.0, 21.0));
        assert_eq!(tree.candidate_pairs(), vec![(shapes[1], shapes[2])]);

        tree.update(shapes[2], cube_at(-20.0, -20.0, -21.0));
        let pairs = tree.candidate_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0] == (shapes[0], shapes[2]) || pairs[0] == (shapes[2], shapes[0]));
        assert_eq!(tree.aabb(shapes[2]).unwrap().center().z, -21.0);
    }

    #[test]
    fn test_insert_twice_is_update() {
        let shapes = ids(1);
        let mut tree = small_tree(2);
        tree.insert(shapes[0], cube_at(0.0, 0.0, 0.0));
        tree.insert(shapes[0], cube_at(5.0, 0.0, 0.0));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.stats().entries, 1);
        assert_eq!(tree.aabb(shapes[0]).unwrap().center().x, 5.0);
    }

    #[test]
    fn test_round_trip_collapses() {
        let shapes = ids(200);
        let mut tree = small_tree(4);
        for (i, s) in shapes.iter().enumerate() {
            let f = i as f64;
            tree.insert(*s, cube_at((f * 7.3) % 60.0 - 30.0, (f * 3.1) % 60.0 - 30.0, (f * 5.7) % 60.0 - 30.0));
        }
        assert!(tree.stats().depth > 0);

        for s in &shapes {
            assert!(tree.remove(*s));
        }
        assert!(tree.is_empty());
        assert!(tree.is_collapsed());
        assert_eq!(
            tree.stats(),
            OctreeStats {
                nodes: 1,
                leaves: 1,
                depth: 0,
                entries: 0
            }
        );
        assert!(!tree.remove(shapes[0]));
    }

    #[test]
    fn test_query_ray() {
        let shapes = ids(3);
        let mut tree = small_tree(8);
        tree.insert(shapes[0], cube_at(5.0, 0.0, 0.0));
        tree.insert(shapes[1], cube_at(10.0, 0.0, 0.0));
        tree.insert(shapes[2], cube_at(5.0, 5.0, 0.0));

        let hits = tree.query_ray(&Point3::origin(), &Vector3::x(), 100.0);
        assert_eq!(hits.len(), 2);
        assert!(!hits.contains(&shapes[2]));
    }
}
