//! Persisted form of a compiled mesh.
//!
//! A [`MeshSnapshot`] holds everything needed to render and query a mesh
//! without recompiling it. Restoring validates buffer shapes and stream
//! indices; the canonical source vertices are not stored, so a restored mesh
//! cannot [`rebind_skeleton`](CompiledMesh::rebind_skeleton).
//!
//! [`encode`] / [`decode`] convert snapshots to bytes in RON or bincode,
//! each behind its own feature.

use serde::{Deserialize, Serialize};

use crate::blendshape::BlendshapeSummary;
use crate::bounds::Aabb;
use crate::buffer::{AttributeBuffer, BufferCollection, bindings};
use crate::compiler::{CompiledMesh, spatial_index};
use crate::config::CompilerConfig;
use crate::error::MeshError;
use crate::primitive::PrimitiveStreams;
use crate::skinning::{SkinningLayout, UtilizedBone};

/// Serializable compiled mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    /// Number of canonical vertices.
    pub vertex_count: usize,
    /// Index streams.
    pub streams: PrimitiveStreams,
    /// Bounds of the dominant stream.
    pub bounds: Aabb,
    /// Buffers in binding-name order.
    pub buffers: Vec<AttributeBuffer>,
    /// Source bone names.
    pub bone_names: Vec<String>,
    /// Utilized bones in ordinal order.
    pub bones: Vec<UtilizedBone>,
    /// Skinning layout, if any.
    pub skinning_layout: Option<SkinningLayout>,
    /// Blendshape summary, if any.
    pub blendshapes: Option<BlendshapeSummary>,
    /// Canonical → source vertex map.
    pub source_vertices: Vec<u32>,
    /// Compile configuration.
    pub config: CompilerConfig,
}

impl CompiledMesh {
    /// Capture the mesh as a snapshot.
    pub fn to_snapshot(&self) -> MeshSnapshot {
        MeshSnapshot {
            vertex_count: self.vertex_count,
            streams: self.streams.clone(),
            bounds: self.bounds,
            buffers: self.buffers.iter().cloned().collect(),
            bone_names: self.bone_names.clone(),
            bones: self.bones.clone(),
            skinning_layout: self.skinning_layout,
            blendshapes: self.blendshapes.clone(),
            source_vertices: self.source_vertices.clone(),
            config: self.config.clone(),
        }
    }

    /// Restore a mesh from a snapshot without recompiling.
    pub fn from_snapshot(snapshot: MeshSnapshot) -> Result<Self, MeshError> {
        let vertex_count = snapshot.vertex_count;

        let mut buffers = BufferCollection::new();
        for buffer in snapshot.buffers {
            buffers.add(buffer)?;
        }
        validate_buffers(&buffers, vertex_count)?;

        match snapshot.skinning_layout {
            Some(SkinningLayout::Fixed4) => {
                buffers.require(bindings::BONE_INDICES)?;
                buffers.require(bindings::BONE_WEIGHTS)?;
            }
            Some(SkinningLayout::Variable) => {
                buffers.require(bindings::BONE_OFFSETS)?;
                buffers.require(bindings::BONE_COUNTS)?;
                buffers.require(bindings::BONE_INDEX_POOL)?;
                buffers.require(bindings::BONE_WEIGHT_POOL)?;
            }
            None => {}
        }
        if snapshot.blendshapes.is_some() {
            buffers.require(bindings::BLENDSHAPE_OFFSETS)?;
            buffers.require(bindings::BLENDSHAPE_COUNTS)?;
            buffers.require(bindings::BLENDSHAPE_INDICES)?;
            buffers.require(bindings::BLENDSHAPE_DELTAS)?;
        }

        validate_streams(&snapshot.streams, vertex_count)?;
        if !snapshot.source_vertices.is_empty() && snapshot.source_vertices.len() != vertex_count {
            return Err(MeshError::AttributeCountMismatch {
                attribute: "source_vertices".to_string(),
                expected: vertex_count,
                found: snapshot.source_vertices.len(),
            });
        }

        let spatial = spatial_index(&buffers, &snapshot.streams, snapshot.config.bvh_leaf_size);
        log::debug!(
            "Restored mesh snapshot: {} vertices, {} buffers",
            vertex_count,
            buffers.len()
        );

        Ok(Self {
            vertex_count,
            streams: snapshot.streams,
            buffers,
            bounds: snapshot.bounds,
            bone_names: snapshot.bone_names,
            bones: snapshot.bones,
            skinning_layout: snapshot.skinning_layout,
            blendshapes: snapshot.blendshapes,
            source_vertices: snapshot.source_vertices,
            vertices: None,
            config: snapshot.config,
            spatial,
        })
    }
}

/// True for bindings holding exactly one element per vertex.
fn is_per_vertex(name: &str) -> bool {
    let numbered = |prefix: &str| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    };
    matches!(
        name,
        bindings::POSITION
            | bindings::NORMAL
            | bindings::TANGENT
            | bindings::BONE_INDICES
            | bindings::BONE_WEIGHTS
            | bindings::BONE_OFFSETS
            | bindings::BONE_COUNTS
            | bindings::BLENDSHAPE_OFFSETS
            | bindings::BLENDSHAPE_COUNTS
    ) || numbered(bindings::COLOR_PREFIX)
        || numbered(bindings::UV_PREFIX)
}

fn validate_buffers(buffers: &BufferCollection, vertex_count: usize) -> Result<(), MeshError> {
    let position = buffers.require(bindings::POSITION)?;
    if position.components() != 3 {
        return Err(MeshError::InvalidBuffer {
            name: bindings::POSITION.to_string(),
            message: format!("expected 3 components, found {}", position.components()),
        });
    }
    for buffer in buffers.iter() {
        buffer.validate()?;
        if is_per_vertex(buffer.name()) && buffer.element_count() != vertex_count {
            return Err(MeshError::InvalidBuffer {
                name: buffer.name().to_string(),
                message: format!(
                    "{} elements for {vertex_count} vertices",
                    buffer.element_count()
                ),
            });
        }
    }
    Ok(())
}

fn validate_streams(streams: &PrimitiveStreams, vertex_count: usize) -> Result<(), MeshError> {
    if streams.referenced_vertex_count() <= vertex_count {
        return Ok(());
    }
    // Out of range somewhere; find the stream for the error.
    let check = |context: &str, index: u32| {
        if index as usize >= vertex_count {
            Err(MeshError::IndexOutOfRange {
                context: context.to_string(),
                index,
                vertex_count,
            })
        } else {
            Ok(())
        }
    };
    for &i in streams.triangles.iter().flatten() {
        check("triangle stream", i)?;
    }
    for &i in streams.lines.iter().flatten() {
        check("line stream", i)?;
    }
    for &i in &streams.points {
        check("point stream", i)?;
    }
    Ok(())
}

/// Supported snapshot encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// RON, human-readable.
    #[cfg(feature = "serialize-ron")]
    Ron,
    /// Bincode, compact binary.
    #[cfg(feature = "serialize-bincode")]
    Bincode,
}

/// Encode a snapshot.
#[allow(unused_variables)]
pub fn encode(snapshot: &MeshSnapshot, format: Format) -> Result<Vec<u8>, MeshError> {
    match format {
        #[cfg(feature = "serialize-ron")]
        Format::Ron => ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())
            .map(String::into_bytes)
            .map_err(|e| MeshError::Format(e.to_string())),
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::serialize(snapshot).map_err(|e| MeshError::Format(e.to_string()))
        }
    }
}

/// Decode a snapshot.
#[allow(unused_variables)]
pub fn decode(bytes: &[u8], format: Format) -> Result<MeshSnapshot, MeshError> {
    match format {
        #[cfg(feature = "serialize-ron")]
        Format::Ron => {
            let text = std::str::from_utf8(bytes).map_err(|e| MeshError::Format(e.to_string()))?;
            ron::from_str(text).map_err(|e| MeshError::Format(e.to_string()))
        }
        #[cfg(feature = "serialize-bincode")]
        Format::Bincode => {
            bincode::deserialize(bytes).map_err(|e| MeshError::Format(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{MeshCompiler, MeshInput};
    use crate::primitive::Primitive;
    use crate::skinning::NoSkeleton;
    use crate::vertex::Vertex;

    fn compiled() -> CompiledMesh {
        let input = MeshInput::new(
            vec![
                Vertex::new([0.0, 0.0, 0.0]).with_tex_coord([0.0, 0.0]),
                Vertex::new([1.0, 0.0, 0.0]).with_tex_coord([1.0, 0.0]),
                Vertex::new([0.0, 1.0, 0.0]).with_tex_coord([0.0, 1.0]),
            ],
            vec![Primitive::Triangle([0, 1, 2])],
        );
        MeshCompiler::default().compile(&input, &NoSkeleton).unwrap()
    }

    #[test]
    fn snapshot_roundtrip() {
        let mesh = compiled();
        let snapshot = mesh.to_snapshot();
        let restored = CompiledMesh::from_snapshot(snapshot.clone()).unwrap();
        assert_eq!(restored.vertex_count(), 3);
        assert_eq!(restored.to_snapshot(), snapshot);
        assert!(restored.canonical_vertices().is_none());
        assert!(restored.spatial_index().wait_until_ready().is_some());
        assert!(
            restored
                .intersect_segment([0.2, 0.2, 1.0], [0.2, 0.2, -1.0])
                .is_some()
        );
    }

    #[test]
    fn restored_mesh_cannot_rebind() {
        let mut restored = CompiledMesh::from_snapshot(compiled().to_snapshot()).unwrap();
        assert!(matches!(
            restored.rebind_skeleton(&NoSkeleton),
            Err(MeshError::SourceVerticesUnavailable)
        ));
    }

    #[test]
    fn missing_position_rejected() {
        let mut snapshot = compiled().to_snapshot();
        snapshot.buffers.retain(|b| b.name() != bindings::POSITION);
        assert!(matches!(
            CompiledMesh::from_snapshot(snapshot),
            Err(MeshError::MissingBuffer(_))
        ));
    }

    #[test]
    fn short_attribute_rejected() {
        let mut snapshot = compiled().to_snapshot();
        snapshot.buffers.retain(|b| b.name() != "uv0");
        snapshot
            .buffers
            .push(AttributeBuffer::from_f32("uv0", 2, vec![0.0; 4]).unwrap());
        assert!(matches!(
            CompiledMesh::from_snapshot(snapshot),
            Err(MeshError::InvalidBuffer { .. })
        ));
    }

    #[test]
    fn out_of_range_stream_rejected() {
        let mut snapshot = compiled().to_snapshot();
        snapshot.streams.triangles.push([0, 1, 7]);
        assert!(matches!(
            CompiledMesh::from_snapshot(snapshot),
            Err(MeshError::IndexOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn duplicate_buffer_rejected() {
        let mut snapshot = compiled().to_snapshot();
        let copy = snapshot.buffers[0].clone();
        snapshot.buffers.push(copy);
        assert!(matches!(
            CompiledMesh::from_snapshot(snapshot),
            Err(MeshError::DuplicateBuffer(_))
        ));
    }

    #[test]
    fn per_vertex_names() {
        assert!(is_per_vertex("uv3"));
        assert!(is_per_vertex("color0"));
        assert!(!is_per_vertex("uv"));
        assert!(!is_per_vertex("blendshape_deltas"));
        assert!(!is_per_vertex("bone_index_pool"));
    }

    #[cfg(feature = "serialize-ron")]
    #[test]
    fn ron_roundtrip() {
        let snapshot = compiled().to_snapshot();
        let bytes = encode(&snapshot, Format::Ron).unwrap();
        assert_eq!(decode(&bytes, Format::Ron).unwrap(), snapshot);
    }

    #[cfg(feature = "serialize-bincode")]
    #[test]
    fn bincode_roundtrip() {
        let snapshot = compiled().to_snapshot();
        let bytes = encode(&snapshot, Format::Bincode).unwrap();
        assert_eq!(decode(&bytes, Format::Bincode).unwrap(), snapshot);
    }

    #[cfg(feature = "serialize-ron")]
    #[test]
    fn malformed_ron_is_format_error() {
        assert!(matches!(
            decode(b"not a snapshot", Format::Ron),
            Err(MeshError::Format(_))
        ));
    }
}
