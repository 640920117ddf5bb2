//! Bounding-volume hierarchy over a triangle stream.
//!
//! Triangles are keyed by centroid and radius (largest centroid-to-corner
//! distance); node boxes enclose those spheres. Nodes split at the median
//! centroid along the axis of greatest centroid variance, so the tree is
//! balanced and its depth is logarithmic in the triangle count.
//!
//! A built [`Bvh`] owns copies of the positions and triangles it indexes and
//! is immutable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::math::{Vec3, vec3};

/// Closest intersection of a segment with the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHit {
    /// Distance from the segment start to the hit point.
    pub distance: f32,
    /// Index into the triangle stream.
    pub triangle: u32,
}

#[derive(Debug, Clone, Copy)]
struct TriangleKey {
    centroid: [f32; 3],
    radius: f32,
}

impl TriangleKey {
    fn new(corners: [[f32; 3]; 3]) -> Self {
        let c = (vec3(corners[0]) + vec3(corners[1]) + vec3(corners[2])) / 3.0;
        let radius = corners
            .iter()
            .map(|p| (vec3(*p) - c).norm())
            .fold(0.0f32, f32::max);
        Self {
            centroid: [c.x, c.y, c.z],
            radius,
        }
    }

    fn bounds(&self) -> Aabb {
        Aabb::from_sphere(self.centroid, self.radius)
    }
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Leaf { start: u32, count: u32 },
    Interior { left: u32, right: u32 },
}

#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    kind: NodeKind,
}

/// Immutable triangle BVH.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    root: Option<u32>,
    /// Triangle ids in leaf order.
    order: Vec<u32>,
    triangles: Vec<[u32; 3]>,
    positions: Vec<[f32; 3]>,
}

impl Bvh {
    /// Build over `triangles`, indexing into `positions`.
    ///
    /// Triangles referencing positions out of range are skipped.
    pub fn build(positions: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>, leaf_size: usize) -> Self {
        crate::profile_function!();

        let leaf_size = leaf_size.max(1);
        let mut keys = Vec::with_capacity(triangles.len());
        let mut order = Vec::with_capacity(triangles.len());
        for (index, tri) in triangles.iter().enumerate() {
            let corners = tri.map(|i| positions.get(i as usize).copied());
            let [Some(a), Some(b), Some(c)] = corners else {
                log::warn!("Triangle {index} references a missing position; skipped");
                continue;
            };
            order.push(index as u32);
            keys.push(TriangleKey::new([a, b, c]));
        }

        let mut builder = Builder {
            nodes: Vec::with_capacity(2 * order.len() / leaf_size + 1),
            keys,
            order,
            leaf_size,
        };
        let root = if builder.order.is_empty() {
            None
        } else {
            let len = builder.order.len();
            Some(builder.build(0, len))
        };

        log::debug!(
            "Built BVH: {} triangles, {} nodes",
            builder.order.len(),
            builder.nodes.len()
        );

        Self {
            nodes: builder.nodes,
            root,
            order: builder.order,
            triangles,
            positions,
        }
    }

    /// Number of indexed triangles.
    pub fn triangle_count(&self) -> usize {
        self.order.len()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Bounds of the root node.
    pub fn bounds(&self) -> Aabb {
        self.root
            .map(|r| self.nodes[r as usize].bounds)
            .unwrap_or_default()
    }

    /// Closest hit of the segment `start → end`.
    pub fn intersect_segment(&self, start: [f32; 3], end: [f32; 3]) -> Option<RayHit> {
        let root = self.root?;
        let origin = vec3(start);
        let delta = vec3(end) - origin;
        let length = delta.norm();
        if length <= f32::EPSILON {
            return None;
        }
        let dir = delta / length;

        let mut best: Option<RayHit> = None;
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            let limit = best.map_or(length, |hit| hit.distance);
            if node.bounds.intersect_segment(&origin, &dir, limit).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Interior { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
                NodeKind::Leaf { start, count } => {
                    for &triangle in &self.order[start as usize..(start + count) as usize] {
                        let [a, b, c] = self.triangles[triangle as usize];
                        let corners = [
                            vec3(self.positions[a as usize]),
                            vec3(self.positions[b as usize]),
                            vec3(self.positions[c as usize]),
                        ];
                        if let Some(t) = intersect_triangle(&origin, &dir, &corners)
                            && t <= limit
                            && best.is_none_or(|hit| t < hit.distance)
                        {
                            best = Some(RayHit {
                                distance: t,
                                triangle,
                            });
                        }
                    }
                }
            }
        }
        best
    }
}

struct Builder {
    nodes: Vec<BvhNode>,
    keys: Vec<TriangleKey>,
    order: Vec<u32>,
    leaf_size: usize,
}

impl Builder {
    /// Build the subtree over `order[start..end]` and return its node index.
    fn build(&mut self, start: usize, end: usize) -> u32 {
        let bounds = self.keys[start..end]
            .iter()
            .fold(Aabb::EMPTY, |acc, key| acc.union(&key.bounds()));

        let span = end - start;
        if span <= self.leaf_size {
            return self.push(BvhNode {
                bounds,
                kind: NodeKind::Leaf {
                    start: start as u32,
                    count: span as u32,
                },
            });
        }

        let axis = self.choose_axis(start, end);
        let mid = start + span / 2;

        // Keep keys and order in lockstep while partitioning.
        let mut pairs: Vec<(TriangleKey, u32)> = self.keys[start..end]
            .iter()
            .copied()
            .zip(self.order[start..end].iter().copied())
            .collect();
        pairs.select_nth_unstable_by(span / 2, |a, b| centroid_compare(&a.0, &b.0, axis));
        for (offset, (key, triangle)) in pairs.into_iter().enumerate() {
            self.keys[start + offset] = key;
            self.order[start + offset] = triangle;
        }

        let left = self.build(start, mid);
        let right = self.build(mid, end);
        self.push(BvhNode {
            bounds,
            kind: NodeKind::Interior { left, right },
        })
    }

    fn push(&mut self, node: BvhNode) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Axis with the largest centroid variance.
    fn choose_axis(&self, start: usize, end: usize) -> usize {
        let mut sums = [0.0f32; 3];
        let mut sums_squared = [0.0f32; 3];
        for key in &self.keys[start..end] {
            for axis in 0..3 {
                sums[axis] += key.centroid[axis];
                sums_squared[axis] += key.centroid[axis].powi(2);
            }
        }

        let n = (end - start) as f32;
        let mut best_axis = 0;
        let mut best_variance = 0.0;
        for axis in 0..3 {
            let mean = sums[axis] / n;
            let variance = sums_squared[axis] / n - mean.powi(2);
            if variance > best_variance {
                best_variance = variance;
                best_axis = axis;
            }
        }
        best_axis
    }
}

fn centroid_compare(a: &TriangleKey, b: &TriangleKey, axis: usize) -> Ordering {
    a.centroid[axis].total_cmp(&b.centroid[axis])
}

/// Möller–Trumbore, two-sided. Returns the distance along `dir`.
fn intersect_triangle(origin: &Vec3, dir: &Vec3, corners: &[Vec3; 3]) -> Option<f32> {
    let edge1 = corners[1] - corners[0];
    let edge2 = corners[2] - corners[0];
    let p = dir.cross(&edge2);
    let det = edge1.dot(&p);
    if det.abs() < 1e-8 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - corners[0];
    let u = s.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(&edge1);
    let v = dir.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(&q) * inv_det;
    (t >= 0.0).then_some(t)
}
