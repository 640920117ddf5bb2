//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Axis-aligned bounding box.
///
/// An empty box has `min = +inf` and `max = -inf`, so expanding it by any
/// point yields a degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner.
    pub min: [f32; 3],
    /// Maximum corner.
    pub max: [f32; 3],
}

impl Aabb {
    /// An empty (inverted) box.
    pub const EMPTY: Self = Self {
        min: [f32::INFINITY; 3],
        max: [f32::NEG_INFINITY; 3],
    };

    /// Create a box from its corners.
    pub fn new(min: [f32; 3], max: [f32; 3]) -> Self {
        Self { min, max }
    }

    /// Tight box around a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.expand_point(*p);
        }
        aabb
    }

    /// Box around a sphere.
    pub fn from_sphere(center: [f32; 3], radius: f32) -> Self {
        Self {
            min: [center[0] - radius, center[1] - radius, center[2] - radius],
            max: [center[0] + radius, center[1] + radius, center[2] + radius],
        }
    }

    /// True if no point has been added.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// Grow the box to include a point.
    #[inline]
    pub fn expand_point(&mut self, p: [f32; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = out.min[axis].min(other.min[axis]);
            out.max[axis] = out.max[axis].max(other.max[axis]);
        }
        out
    }

    /// Center point.
    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    /// Edge lengths.
    pub fn extent(&self) -> [f32; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    /// Check whether the segment `origin + t * dir`, `t` in `[0, t_max]`, touches the box.
    ///
    /// Returns the parametric entry distance on a hit.
    pub fn intersect_segment(&self, origin: &Vec3, dir: &Vec3, t_max: f32) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let mut t0 = 0.0f32;
        let mut t1 = t_max;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d.abs() < f32::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut near = (self.min[axis] - o) * inv;
            let mut far = (self.max[axis] - o) * inv;
            if near > far {
                std::mem::swap(&mut near, &mut far);
            }
            t0 = t0.max(near);
            t1 = t1.min(far);
            if t0 > t1 {
                return None;
            }
        }
        Some(t0)
    }

    /// Approximate equality within `epsilon` on every corner component.
    pub fn approx_eq(&self, other: &Aabb, epsilon: f32) -> bool {
        (0..3).all(|axis| {
            (self.min[axis] - other.min[axis]).abs() <= epsilon
                && (self.max[axis] - other.max[axis]).abs() <= epsilon
        })
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box() {
        assert!(Aabb::EMPTY.is_empty());
        assert!(Aabb::default().is_empty());
    }

    #[test]
    fn expand_from_empty() {
        let mut aabb = Aabb::EMPTY;
        aabb.expand_point([1.0, -2.0, 3.0]);
        assert_eq!(aabb.min, [1.0, -2.0, 3.0]);
        assert_eq!(aabb.max, [1.0, -2.0, 3.0]);
        aabb.expand_point([-1.0, 0.0, 5.0]);
        assert_eq!(aabb.min, [-1.0, -2.0, 3.0]);
        assert_eq!(aabb.max, [1.0, 0.0, 5.0]);
    }

    #[test]
    fn union_and_center() {
        let a = Aabb::new([0.0; 3], [1.0; 3]);
        let b = Aabb::new([2.0; 3], [3.0; 3]);
        let u = a.union(&b);
        assert_eq!(u.min, [0.0; 3]);
        assert_eq!(u.max, [3.0; 3]);
        assert_eq!(u.center(), [1.5; 3]);
        assert_eq!(u.extent(), [3.0; 3]);
    }

    #[test]
    fn segment_hits_and_misses() {
        let aabb = Aabb::new([-1.0; 3], [1.0; 3]);
        let origin = Vec3::new(-5.0, 0.0, 0.0);
        let dir = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(aabb.intersect_segment(&origin, &dir, 10.0), Some(4.0));
        // Segment ends before reaching the box.
        assert_eq!(aabb.intersect_segment(&origin, &dir, 3.0), None);
        // Parallel and outside on another axis.
        let above = Vec3::new(-5.0, 2.0, 0.0);
        assert_eq!(aabb.intersect_segment(&above, &dir, 10.0), None);
    }

    #[test]
    fn sphere_box() {
        let aabb = Aabb::from_sphere([1.0, 2.0, 3.0], 0.5);
        assert_eq!(aabb.min, [0.5, 1.5, 2.5]);
        assert_eq!(aabb.max, [1.5, 2.5, 3.5]);
    }
}
