//! Blendshape (morph target) delta compression.
//!
//! Every (vertex, shape) pair with a non-zero delta becomes one tuple
//! `(shape, position, normal, tangent)` of indices into a shared delta pool.
//! Pool entry 0 is the zero delta, so components that do not move cost
//! nothing. Tuples of one vertex are contiguous and in ascending shape order;
//! `blendshape_offsets` / `blendshape_counts` give each vertex its range.
//!
//! With delta remapping enabled, identical deltas collapse to one pool entry.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::buffer::{AttributeBuffer, bindings};
use crate::config::{BlendshapePolicy, IndexStorage};
use crate::error::MeshError;
use crate::remap::remap;
use crate::vertex::{Delta3, Vertex, is_zero3};

/// Shape-level description of compiled blendshape data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlendshapeSummary {
    /// Shape names by shape index.
    pub shape_names: Vec<String>,
    /// Number of `(vertex, shape)` tuples.
    pub tuple_count: usize,
    /// Number of pool entries, including the zero sentinel.
    pub pool_size: usize,
    /// Whether the pool was deduplicated.
    pub remapped: bool,
}

/// Result of [`compile_blendshapes`].
#[derive(Debug, Clone)]
pub struct CompiledBlendshapes {
    /// Summary stored with the mesh.
    pub summary: BlendshapeSummary,
    /// Emitted buffers.
    pub buffers: Vec<AttributeBuffer>,
}

/// Compile blendshape buffers.
///
/// Returns `None` when blendshapes are disabled or no vertex has a non-zero
/// delta.
pub fn compile_blendshapes(
    vertices: &[Vertex],
    shape_names: &[String],
    policy: BlendshapePolicy,
    index_storage: IndexStorage,
) -> Result<Option<CompiledBlendshapes>, MeshError> {
    crate::profile_function!();

    if !policy.enabled {
        return Ok(None);
    }

    let mut pool = vec![Delta3::default()];
    let mut tuples: Vec<[u32; 4]> = Vec::new();
    let mut offsets = Vec::with_capacity(vertices.len());
    let mut counts = Vec::with_capacity(vertices.len());

    for vertex in vertices {
        let start = tuples.len();
        for (&shape, delta) in &vertex.blendshapes {
            if delta.is_zero() {
                continue;
            }
            let position = pool_index(&delta.position, &mut pool);
            let normal = pool_index(&delta.normal, &mut pool);
            let tangent = pool_index(&delta.tangent, &mut pool);
            tuples.push([shape, position, normal, tangent]);
        }
        offsets.push(start as u32);
        counts.push((tuples.len() - start) as u32);
    }

    if tuples.is_empty() {
        log::debug!("No non-zero blendshape deltas; blendshape buffers not emitted");
        return Ok(None);
    }

    let raw_size = pool.len();
    if policy.remap_deltas {
        let remapped = remap(&pool, true);
        tuples.par_iter_mut().for_each(|tuple| {
            for component in &mut tuple[1..] {
                *component = remapped.canonical(*component as usize);
            }
        });
        pool = remapped.unique;
    }

    log::debug!(
        "Blendshapes: {} tuples, delta pool {} -> {}",
        tuples.len(),
        raw_size,
        pool.len()
    );

    let mut deltas = vec![0.0f32; pool.len() * 4];
    deltas
        .par_chunks_mut(4)
        .zip(pool.par_iter())
        .for_each(|(slot, delta)| slot[..3].copy_from_slice(&delta.0));

    let shape_count = tuples
        .iter()
        .map(|t| t[0] as usize + 1)
        .max()
        .unwrap_or(0)
        .max(shape_names.len());
    let mut names = shape_names.to_vec();
    names.resize_with(shape_count, String::new);

    let storage = index_storage.component_type();
    let flat: Vec<u32> = tuples.iter().flatten().copied().collect();
    let buffers = vec![
        AttributeBuffer::from_indices(bindings::BLENDSHAPE_OFFSETS, storage, 1, &offsets)?,
        AttributeBuffer::from_indices(bindings::BLENDSHAPE_COUNTS, storage, 1, &counts)?,
        AttributeBuffer::from_indices(bindings::BLENDSHAPE_INDICES, storage, 4, &flat)?,
        AttributeBuffer::from_f32(bindings::BLENDSHAPE_DELTAS, 4, deltas)?,
    ];

    Ok(Some(CompiledBlendshapes {
        summary: BlendshapeSummary {
            shape_names: names,
            tuple_count: tuples.len(),
            pool_size: pool.len(),
            remapped: policy.remap_deltas,
        },
        buffers,
    }))
}

/// Append a non-zero delta to the pool; zero maps to the sentinel.
fn pool_index(delta: &[f32; 3], pool: &mut Vec<Delta3>) -> u32 {
    if is_zero3(delta) {
        return 0;
    }
    pool.push(Delta3(*delta));
    (pool.len() - 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::BlendshapeDelta;

    fn buffer<'a>(out: &'a CompiledBlendshapes, name: &str) -> &'a AttributeBuffer {
        out.buffers.iter().find(|b| b.name() == name).unwrap()
    }

    fn compile(vertices: &[Vertex], remap_deltas: bool) -> Option<CompiledBlendshapes> {
        compile_blendshapes(
            vertices,
            &["smile".to_string(), "blink".to_string()],
            BlendshapePolicy {
                enabled: true,
                remap_deltas,
            },
            IndexStorage::Int,
        )
        .unwrap()
    }

    #[test]
    fn single_position_delta() {
        let vertices = vec![
            Vertex::new([0.0; 3]).with_blendshape(0, BlendshapeDelta::position([0.0, 1.0, 0.0])),
            Vertex::new([1.0; 3]),
        ];
        let out = compile(&vertices, true).unwrap();
        assert_eq!(out.summary.pool_size, 2);
        assert_eq!(out.summary.tuple_count, 1);
        assert_eq!(
            buffer(&out, bindings::BLENDSHAPE_INDICES).as_i32(),
            Some(&[0, 1, 0, 0][..])
        );
        assert_eq!(
            buffer(&out, bindings::BLENDSHAPE_DELTAS).as_f32(),
            Some(&[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0][..])
        );
        assert_eq!(
            buffer(&out, bindings::BLENDSHAPE_OFFSETS).as_i32(),
            Some(&[0, 1][..])
        );
        assert_eq!(
            buffer(&out, bindings::BLENDSHAPE_COUNTS).as_i32(),
            Some(&[1, 0][..])
        );
    }

    #[test]
    fn remap_collapses_shared_deltas() {
        let shared = BlendshapeDelta::position([0.5, 0.0, 0.0]).with_normal([0.5, 0.0, 0.0]);
        let vertices = vec![
            Vertex::new([0.0; 3]).with_blendshape(0, shared),
            Vertex::new([1.0; 3]).with_blendshape(1, shared),
        ];
        let raw = compile(&vertices, false).unwrap();
        let remapped = compile(&vertices, true).unwrap();
        assert_eq!(raw.summary.pool_size, 5);
        assert_eq!(remapped.summary.pool_size, 2);
        assert_eq!(
            buffer(&remapped, bindings::BLENDSHAPE_INDICES).as_i32(),
            Some(&[0, 1, 1, 0, 1, 1, 1, 0][..])
        );
    }

    #[test]
    fn zero_deltas_are_skipped() {
        let vertices = vec![Vertex::new([0.0; 3]).with_blendshape(0, BlendshapeDelta::default())];
        assert!(compile(&vertices, true).is_none());
    }

    #[test]
    fn disabled_policy() {
        let vertices = vec![
            Vertex::new([0.0; 3]).with_blendshape(0, BlendshapeDelta::position([1.0, 0.0, 0.0])),
        ];
        let out = compile_blendshapes(
            &vertices,
            &[],
            BlendshapePolicy {
                enabled: false,
                remap_deltas: true,
            },
            IndexStorage::Int,
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn shapes_sorted_and_decodable() {
        let base = [1.0, 2.0, 3.0];
        let vertices = vec![
            Vertex::new(base)
                .with_blendshape(1, BlendshapeDelta::position([0.0, 0.0, 1.0]))
                .with_blendshape(0, BlendshapeDelta::position([1.0, 0.0, 0.0])),
        ];
        let out = compile(&vertices, true).unwrap();
        let indices = buffer(&out, bindings::BLENDSHAPE_INDICES);
        let deltas = buffer(&out, bindings::BLENDSHAPE_DELTAS);
        assert_eq!(indices.index_at(0, 0), Some(0));
        assert_eq!(indices.index_at(1, 0), Some(1));

        let decode = |tuple: usize| {
            let slot = indices.index_at(tuple, 1).unwrap() as usize;
            let d = deltas.element_f32(slot).unwrap();
            [base[0] + d[0], base[1] + d[1], base[2] + d[2]]
        };
        assert_eq!(decode(0), [2.0, 2.0, 3.0]);
        assert_eq!(decode(1), [1.0, 2.0, 4.0]);
    }

    #[test]
    fn float_storage_and_unnamed_shapes() {
        let vertices = vec![
            Vertex::new([0.0; 3]).with_blendshape(3, BlendshapeDelta::position([1.0, 0.0, 0.0])),
        ];
        let out = compile_blendshapes(
            &vertices,
            &["a".to_string()],
            BlendshapePolicy::default(),
            IndexStorage::Float,
        )
        .unwrap()
        .unwrap();
        assert_eq!(out.summary.shape_names.len(), 4);
        assert_eq!(
            buffer(&out, bindings::BLENDSHAPE_INDICES).as_f32(),
            Some(&[3.0, 1.0, 0.0, 0.0][..])
        );
    }
}
