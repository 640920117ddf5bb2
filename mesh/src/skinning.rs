//! Skinning weight compilation.
//!
//! Builds the utilized-bones table (bones that carry weights and resolve to a
//! scene node, in source order) and packs per-vertex influences into one of
//! two GPU layouts:
//!
//! - [`SkinningLayout::Fixed4`]: `bone_indices` + `bone_weights`, four slots
//!   per vertex. Chosen when the policy forces it or no vertex has more than
//!   four influences. Extra influences are dropped by magnitude and the rest
//!   renormalized.
//! - [`SkinningLayout::Variable`]: `bone_offsets` + `bone_counts` per vertex
//!   into `bone_index_pool` / `bone_weight_pool`.
//!
//! Stored bone indices are `ordinal + 1`; 0 means "no bone".

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{AttributeBuffer, bindings};
use crate::config::{IndexStorage, SkinningPolicy};
use crate::error::MeshError;
use crate::vertex::Vertex;

/// Identifier of a node in the external scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Looks up scene nodes by bone name.
pub trait SkeletonResolver {
    /// All nodes named `bone`. Empty if the bone is unknown.
    fn resolve(&self, bone: &str) -> Vec<NodeId>;
}

impl<F> SkeletonResolver for F
where
    F: Fn(&str) -> Vec<NodeId>,
{
    fn resolve(&self, bone: &str) -> Vec<NodeId> {
        self(bone)
    }
}

/// Resolver for meshes compiled without a skeleton. Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSkeleton;

impl SkeletonResolver for NoSkeleton {
    fn resolve(&self, _bone: &str) -> Vec<NodeId> {
        Vec::new()
    }
}

/// Name → nodes map built from a scene hierarchy.
#[derive(Debug, Clone, Default)]
pub struct NodeCache {
    nodes: HashMap<String, Vec<NodeId>>,
}

impl NodeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under `name`. Names may repeat.
    pub fn insert(&mut self, name: impl Into<String>, node: NodeId) {
        self.nodes.entry(name.into()).or_default().push(node);
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with_node(mut self, name: impl Into<String>, node: NodeId) -> Self {
        self.insert(name, node);
        self
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<(String, NodeId)> for NodeCache {
    fn from_iter<I: IntoIterator<Item = (String, NodeId)>>(iter: I) -> Self {
        let mut cache = Self::new();
        for (name, node) in iter {
            cache.insert(name, node);
        }
        cache
    }
}

impl SkeletonResolver for NodeCache {
    fn resolve(&self, bone: &str) -> Vec<NodeId> {
        self.nodes.get(bone).cloned().unwrap_or_default()
    }
}

/// One row of the utilized-bones table. Its position is the GPU ordinal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizedBone {
    /// Bone name.
    pub name: String,
    /// Resolved scene node.
    pub node: NodeId,
    /// Inverse-bind matrix, column-major.
    pub inverse_bind: [f32; 16],
}

/// Skinning buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkinningLayout {
    /// Four index/weight slots per vertex.
    Fixed4,
    /// Per-vertex offset/count into shared pools.
    Variable,
}

/// Result of [`compile_skinning`].
#[derive(Debug, Clone, Default)]
pub struct CompiledSkinning {
    /// Utilized bones in ordinal order.
    pub bones: Vec<UtilizedBone>,
    /// Chosen layout; `None` when no buffers were emitted.
    pub layout: Option<SkinningLayout>,
    /// Emitted buffers.
    pub buffers: Vec<AttributeBuffer>,
}

/// (ordinal, weight) pairs of one vertex.
type Influences = Vec<(u32, f32)>;

/// Compile skinning data for `vertices`.
///
/// `bone_names[i]` names the bone referenced by `BoneWeight::bone == i`.
pub fn compile_skinning(
    vertices: &[Vertex],
    bone_names: &[String],
    resolver: &dyn SkeletonResolver,
    policy: SkinningPolicy,
    index_storage: IndexStorage,
) -> Result<CompiledSkinning, MeshError> {
    crate::profile_function!();

    if !policy.allow_skinning {
        return Ok(CompiledSkinning::default());
    }

    let (bones, ordinals) = utilized_bones(vertices, bone_names, resolver);
    if bones.is_empty() {
        log::debug!("No utilized bones; skinning buffers not emitted");
        return Ok(CompiledSkinning {
            bones,
            ..CompiledSkinning::default()
        });
    }

    let influences: Vec<Influences> = vertices
        .iter()
        .enumerate()
        .map(|(index, vertex)| merge_influences(index, vertex, &ordinals))
        .collect();

    let max_count = influences.iter().map(Vec::len).max().unwrap_or(0);
    let (unweighted, zero_weight) = weightless_counts(&influences);
    if unweighted > 0 {
        log::debug!("{unweighted} vertices have no bone weights");
    }
    if zero_weight > 0 {
        log::debug!("{zero_weight} vertices have only zero bone weights");
    }

    let (layout, buffers) = if policy.optimize_to_four || max_count <= 4 {
        (
            SkinningLayout::Fixed4,
            fixed_layout(influences, index_storage)?,
        )
    } else {
        (
            SkinningLayout::Variable,
            variable_layout(influences, index_storage)?,
        )
    };

    log::debug!(
        "Skinning: {} utilized bones, max {} influences, {:?} layout",
        bones.len(),
        max_count,
        layout
    );

    Ok(CompiledSkinning {
        bones,
        layout: Some(layout),
        buffers,
    })
}

/// Build the utilized-bones table and the bone index → ordinal map.
fn utilized_bones(
    vertices: &[Vertex],
    bone_names: &[String],
    resolver: &dyn SkeletonResolver,
) -> (Vec<UtilizedBone>, Vec<Option<u32>>) {
    let mut first_inverse_bind: Vec<Option<[f32; 16]>> = vec![None; bone_names.len()];
    for vertex in vertices {
        for weight in &vertex.bone_weights {
            match first_inverse_bind.get_mut(weight.bone as usize) {
                Some(slot) => {
                    slot.get_or_insert(weight.inverse_bind);
                }
                None => log::warn!(
                    "Bone weight references bone {} but the mesh has {} bones",
                    weight.bone,
                    bone_names.len()
                ),
            }
        }
    }

    let mut bones = Vec::new();
    let mut ordinals = vec![None; bone_names.len()];
    let mut by_name: HashMap<&str, u32> = HashMap::new();

    for (index, name) in bone_names.iter().enumerate() {
        let Some(inverse_bind) = first_inverse_bind[index] else {
            continue;
        };
        match by_name.entry(name.as_str()) {
            Entry::Occupied(entry) => ordinals[index] = Some(*entry.get()),
            Entry::Vacant(entry) => {
                let nodes = resolver.resolve(name);
                let Some(&node) = nodes.first() else {
                    log::warn!("Bone '{name}' not found in skeleton; its weights are ignored");
                    continue;
                };
                if nodes.len() > 1 {
                    log::warn!(
                        "Bone '{name}' matches {} nodes; using {:?}",
                        nodes.len(),
                        node
                    );
                }
                let ordinal = bones.len() as u32;
                entry.insert(ordinal);
                ordinals[index] = Some(ordinal);
                bones.push(UtilizedBone {
                    name: name.clone(),
                    node,
                    inverse_bind,
                });
            }
        }
    }

    (bones, ordinals)
}

/// Collapse a vertex's weights onto utilized ordinals, averaging duplicates.
fn merge_influences(index: usize, vertex: &Vertex, ordinals: &[Option<u32>]) -> Influences {
    // ordinal -> (sum, count, first weight, first inverse bind)
    let mut merged: Vec<(u32, f32, u32, f32, [f32; 16])> = Vec::new();
    let mut conflict = false;

    for weight in &vertex.bone_weights {
        let Some(ordinal) = ordinals.get(weight.bone as usize).copied().flatten() else {
            continue;
        };
        match merged.iter_mut().find(|entry| entry.0 == ordinal) {
            Some(entry) => {
                conflict |= entry.3.to_bits() != weight.weight.to_bits()
                    || entry.4 != weight.inverse_bind;
                entry.1 += weight.weight;
                entry.2 += 1;
            }
            None => merged.push((ordinal, weight.weight, 1, weight.weight, weight.inverse_bind)),
        }
    }

    if conflict {
        log::warn!("Vertex {index} has conflicting weights for the same bone; averaging");
    }

    merged
        .into_iter()
        .map(|(ordinal, sum, count, _, _)| (ordinal, sum / count as f32))
        .collect()
}

/// Scale weights to sum to one. Zero-sum input is left untouched.
/// Vertices with no influences, and vertices whose influences are all zero.
fn weightless_counts(influences: &[Influences]) -> (usize, usize) {
    influences.iter().fold((0, 0), |(empty, zero), inf| {
        if inf.is_empty() {
            (empty + 1, zero)
        } else if inf.iter().all(|(_, w)| *w == 0.0) {
            (empty, zero + 1)
        } else {
            (empty, zero)
        }
    })
}

fn normalize(influences: &mut [(u32, f32)]) {
    let sum: f32 = influences.iter().map(|(_, w)| w).sum();
    if sum != 0.0 {
        for (_, w) in influences.iter_mut() {
            *w /= sum;
        }
    }
}

fn fixed_layout(
    mut influences: Vec<Influences>,
    index_storage: IndexStorage,
) -> Result<Vec<AttributeBuffer>, MeshError> {
    let vertex_count = influences.len();
    let mut indices = vec![0u32; vertex_count * 4];
    let mut weights = vec![0.0f32; vertex_count * 4];

    let truncated = influences.iter().filter(|inf| inf.len() > 4).count();
    if truncated > 0 {
        log::debug!("{truncated} vertices have more than 4 influences; keeping the strongest 4");
    }

    indices
        .par_chunks_mut(4)
        .zip(weights.par_chunks_mut(4))
        .zip(influences.par_iter_mut())
        .for_each(|((index_slot, weight_slot), influence)| {
            influence.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
            influence.truncate(4);
            normalize(influence);
            for (i, (ordinal, weight)) in influence.iter().enumerate() {
                index_slot[i] = ordinal + 1;
                weight_slot[i] = *weight;
            }
        });

    Ok(vec![
        AttributeBuffer::from_indices(
            bindings::BONE_INDICES,
            index_storage.component_type(),
            4,
            &indices,
        )?,
        AttributeBuffer::from_f32(bindings::BONE_WEIGHTS, 4, weights)?,
    ])
}

fn variable_layout(
    mut influences: Vec<Influences>,
    index_storage: IndexStorage,
) -> Result<Vec<AttributeBuffer>, MeshError> {
    let counts: Vec<u32> = influences.iter().map(|inf| inf.len() as u32).collect();
    let mut offsets = Vec::with_capacity(counts.len());
    let mut total = 0u32;
    for count in &counts {
        offsets.push(total);
        total += count;
    }

    let mut index_pool = vec![0u32; total as usize];
    let mut weight_pool = vec![0.0f32; total as usize];

    let mut index_ranges = Vec::with_capacity(counts.len());
    let mut weight_ranges = Vec::with_capacity(counts.len());
    let mut index_rest = index_pool.as_mut_slice();
    let mut weight_rest = weight_pool.as_mut_slice();
    for &count in &counts {
        let (head, tail) = std::mem::take(&mut index_rest).split_at_mut(count as usize);
        index_ranges.push(head);
        index_rest = tail;
        let (head, tail) = std::mem::take(&mut weight_rest).split_at_mut(count as usize);
        weight_ranges.push(head);
        weight_rest = tail;
    }

    index_ranges
        .into_par_iter()
        .zip(weight_ranges.into_par_iter())
        .zip(influences.par_iter_mut())
        .for_each(|((index_slot, weight_slot), influence)| {
            normalize(influence);
            for (i, (ordinal, weight)) in influence.iter().enumerate() {
                index_slot[i] = ordinal + 1;
                weight_slot[i] = *weight;
            }
        });

    let storage = index_storage.component_type();
    Ok(vec![
        AttributeBuffer::from_indices(bindings::BONE_OFFSETS, storage, 1, &offsets)?,
        AttributeBuffer::from_indices(bindings::BONE_COUNTS, storage, 1, &counts)?,
        AttributeBuffer::from_indices(bindings::BONE_INDEX_POOL, storage, 1, &index_pool)?,
        AttributeBuffer::from_f32(bindings::BONE_WEIGHT_POOL, 1, weight_pool)?,
    ])
}
