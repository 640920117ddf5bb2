//! Source vertex records.
//!
//! A [`Vertex`] carries every attribute a compiled mesh can hold. Optional
//! attributes are `None` or empty when absent, which is what attribute
//! discovery keys off.
//!
//! Equality and hashing compare float attributes bitwise, so two vertices are
//! interchangeable for deduplication only if every populated attribute is
//! bit-identical.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::math::MAT4_IDENTITY;

/// One bone influence on a vertex.
#[derive(Debug, Clone, Copy)]
pub struct BoneWeight {
    /// Index into the mesh bone name list.
    pub bone: u32,
    /// Influence weight (not necessarily normalized).
    pub weight: f32,
    /// Inverse-bind matrix of the bone, column-major.
    pub inverse_bind: [f32; 16],
}

impl BoneWeight {
    /// Create an influence with an identity inverse-bind matrix.
    pub fn new(bone: u32, weight: f32) -> Self {
        Self {
            bone,
            weight,
            inverse_bind: MAT4_IDENTITY,
        }
    }

    /// Set the inverse-bind matrix.
    pub fn with_inverse_bind(mut self, inverse_bind: [f32; 16]) -> Self {
        self.inverse_bind = inverse_bind;
        self
    }
}

impl PartialEq for BoneWeight {
    fn eq(&self, other: &Self) -> bool {
        self.bone == other.bone
            && self.weight.to_bits() == other.weight.to_bits()
            && bits_eq(&self.inverse_bind, &other.inverse_bind)
    }
}

impl Eq for BoneWeight {}

impl Hash for BoneWeight {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bone.hash(state);
        self.weight.to_bits().hash(state);
        hash_bits(&self.inverse_bind, state);
    }
}

/// Per-shape attribute deltas relative to the base vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlendshapeDelta {
    /// Position delta.
    pub position: [f32; 3],
    /// Normal delta.
    pub normal: [f32; 3],
    /// Tangent delta (xyz only).
    pub tangent: [f32; 3],
}

impl BlendshapeDelta {
    /// A delta that only moves the position.
    pub fn position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the normal delta.
    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = normal;
        self
    }

    /// Set the tangent delta.
    pub fn with_tangent(mut self, tangent: [f32; 3]) -> Self {
        self.tangent = tangent;
        self
    }

    /// True if no component is non-zero.
    pub fn is_zero(&self) -> bool {
        is_zero3(&self.position) && is_zero3(&self.normal) && is_zero3(&self.tangent)
    }
}

impl PartialEq for BlendshapeDelta {
    fn eq(&self, other: &Self) -> bool {
        bits_eq(&self.position, &other.position)
            && bits_eq(&self.normal, &other.normal)
            && bits_eq(&self.tangent, &other.tangent)
    }
}

impl Eq for BlendshapeDelta {}

impl Hash for BlendshapeDelta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_bits(&self.position, state);
        hash_bits(&self.normal, state);
        hash_bits(&self.tangent, state);
    }
}

/// A source vertex with all optional attributes.
#[derive(Debug, Clone, Default)]
pub struct Vertex {
    /// Position (required).
    pub position: [f32; 3],
    /// Normal, if present.
    pub normal: Option<[f32; 3]>,
    /// Tangent with handedness in `w`, if present.
    pub tangent: Option<[f32; 4]>,
    /// Color sets, in set order.
    pub colors: Vec<[f32; 4]>,
    /// Texture coordinate sets, in set order.
    pub tex_coords: Vec<[f32; 2]>,
    /// Bone influences. The same bone may appear more than once.
    pub bone_weights: Vec<BoneWeight>,
    /// Blendshape deltas keyed by shape index.
    pub blendshapes: BTreeMap<u32, BlendshapeDelta>,
}

impl Vertex {
    /// Create a vertex with only a position.
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Set the normal.
    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Set the tangent.
    pub fn with_tangent(mut self, tangent: [f32; 4]) -> Self {
        self.tangent = Some(tangent);
        self
    }

    /// Append a color set.
    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.colors.push(color);
        self
    }

    /// Append a texture coordinate set.
    pub fn with_tex_coord(mut self, uv: [f32; 2]) -> Self {
        self.tex_coords.push(uv);
        self
    }

    /// Append a bone influence.
    pub fn with_bone_weight(mut self, weight: BoneWeight) -> Self {
        self.bone_weights.push(weight);
        self
    }

    /// Set the delta for a blendshape.
    pub fn with_blendshape(mut self, shape: u32, delta: BlendshapeDelta) -> Self {
        self.blendshapes.insert(shape, delta);
        self
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        bits_eq(&self.position, &other.position)
            && opt_bits_eq(self.normal.as_ref(), other.normal.as_ref())
            && opt_bits_eq(self.tangent.as_ref(), other.tangent.as_ref())
            && self.colors.len() == other.colors.len()
            && self.colors.iter().zip(&other.colors).all(|(a, b)| bits_eq(a, b))
            && self.tex_coords.len() == other.tex_coords.len()
            && self
                .tex_coords
                .iter()
                .zip(&other.tex_coords)
                .all(|(a, b)| bits_eq(a, b))
            && self.bone_weights == other.bone_weights
            && self.blendshapes == other.blendshapes
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_bits(&self.position, state);
        self.normal.is_some().hash(state);
        if let Some(n) = &self.normal {
            hash_bits(n, state);
        }
        self.tangent.is_some().hash(state);
        if let Some(t) = &self.tangent {
            hash_bits(t, state);
        }
        self.colors.len().hash(state);
        for c in &self.colors {
            hash_bits(c, state);
        }
        self.tex_coords.len().hash(state);
        for uv in &self.tex_coords {
            hash_bits(uv, state);
        }
        self.bone_weights.hash(state);
        self.blendshapes.hash(state);
    }
}

/// A 3-component delta hashed bitwise, used as the delta pool record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delta3(pub [f32; 3]);

impl PartialEq for Delta3 {
    fn eq(&self, other: &Self) -> bool {
        bits_eq(&self.0, &other.0)
    }
}

impl Eq for Delta3 {}

impl Hash for Delta3 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_bits(&self.0, state);
    }
}

pub(crate) fn is_zero3(v: &[f32; 3]) -> bool {
    v.iter().all(|c| *c == 0.0)
}

fn bits_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

fn opt_bits_eq<const N: usize>(a: Option<&[f32; N]>, b: Option<&[f32; N]>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => bits_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn hash_bits<H: Hasher>(values: &[f32], state: &mut H) {
    for v in values {
        v.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equal_vertices_hash_equal() {
        let a = Vertex::new([1.0, 2.0, 3.0])
            .with_normal([0.0, 1.0, 0.0])
            .with_tex_coord([0.5, 0.5]);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn missing_attribute_differs() {
        let a = Vertex::new([1.0, 2.0, 3.0]).with_normal([0.0, 1.0, 0.0]);
        let b = Vertex::new([1.0, 2.0, 3.0]);
        assert_ne!(a, b);
    }

    #[test]
    fn extra_uv_set_differs() {
        let a = Vertex::new([0.0; 3]).with_tex_coord([0.0, 0.0]);
        let b = a.clone().with_tex_coord([0.0, 0.0]);
        assert_ne!(a, b);
    }

    #[test]
    fn blendshape_delta_participates_in_equality() {
        let a = Vertex::new([0.0; 3]);
        let b = a
            .clone()
            .with_blendshape(0, BlendshapeDelta::position([0.0, 1.0, 0.0]));
        assert_ne!(a, b);
    }

    #[test]
    fn zero_delta_detection() {
        assert!(BlendshapeDelta::default().is_zero());
        assert!(!BlendshapeDelta::default().with_tangent([0.0, 0.0, 1.0]).is_zero());
    }

    #[test]
    fn delta3_bitwise() {
        assert_eq!(Delta3([1.0, 2.0, 3.0]), Delta3([1.0, 2.0, 3.0]));
        assert_ne!(Delta3([0.0, 0.0, 0.0]), Delta3([-0.0, 0.0, 0.0]));
    }
}
