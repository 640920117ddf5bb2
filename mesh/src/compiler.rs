//! Compilation entry point.
//!
//! [`MeshCompiler::compile`] runs the whole pipeline over a [`MeshInput`]:
//!
//! 1. classify primitives into streams and deduplicate vertices per stream
//! 2. discover and populate per-vertex attribute buffers
//! 3. compile skinning buffers against the skeleton
//! 4. compile blendshape buffers
//!
//! The resulting [`CompiledMesh`] owns the buffers, the streams and a lazily
//! built spatial index over its triangles.

use crate::blendshape::{BlendshapeSummary, compile_blendshapes};
use crate::bounds::Aabb;
use crate::buffer::{BufferCollection, bindings};
use crate::bvh::RayHit;
use crate::config::CompilerConfig;
use crate::error::MeshError;
use crate::population::AttributePopulationEngine;
use crate::primitive::{Primitive, PrimitiveStreams, PrimitiveType, classify};
use crate::skinning::{SkeletonResolver, SkinningLayout, UtilizedBone, compile_skinning};
use crate::spatial::SpatialIndex;
use crate::vertex::Vertex;

/// Source geometry for one mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshInput {
    /// Source vertices referenced by `primitives`.
    pub vertices: Vec<Vertex>,
    /// Primitives over `vertices`.
    pub primitives: Vec<Primitive>,
    /// Bone names; `BoneWeight::bone` indexes this list.
    pub bone_names: Vec<String>,
    /// Blendshape names; shape indices index this list.
    pub blendshape_names: Vec<String>,
}

impl MeshInput {
    /// Create an input from vertices and primitives.
    pub fn new(vertices: Vec<Vertex>, primitives: Vec<Primitive>) -> Self {
        Self {
            vertices,
            primitives,
            ..Self::default()
        }
    }

    /// A loose vertex list, compiled as points.
    pub fn from_vertices(vertices: Vec<Vertex>) -> Self {
        let points = Primitive::Points((0..vertices.len() as u32).collect());
        Self::new(vertices, vec![points])
    }

    /// Set the bone name list.
    pub fn with_bone_names(mut self, names: Vec<String>) -> Self {
        self.bone_names = names;
        self
    }

    /// Set the blendshape name list.
    pub fn with_blendshape_names(mut self, names: Vec<String>) -> Self {
        self.blendshape_names = names;
        self
    }
}

/// Compiles [`MeshInput`]s under a fixed [`CompilerConfig`].
#[derive(Debug, Clone, Default)]
pub struct MeshCompiler {
    config: CompilerConfig,
}

impl MeshCompiler {
    /// Create a compiler with the given policies.
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compile `input`, resolving bones through `resolver`.
    ///
    /// Indices in `input` must be valid; use
    /// [`ImportedMesh::into_input`](crate::ImportedMesh::into_input) to
    /// validate untrusted data.
    pub fn compile(
        &self,
        input: &MeshInput,
        resolver: &dyn SkeletonResolver,
    ) -> Result<CompiledMesh, MeshError> {
        crate::profile_function!();

        let classified = classify(&input.vertices, &input.primitives, self.config.deduplicate);

        let engine =
            AttributePopulationEngine::new(&classified.vertices, classified.dominant_vertices.clone());
        let (discovery, attributes) = engine.run();

        let mut buffers = BufferCollection::new();
        for buffer in attributes {
            buffers.add(buffer)?;
        }

        let skinning = compile_skinning(
            &classified.vertices,
            &input.bone_names,
            resolver,
            self.config.skinning,
            self.config.index_storage,
        )?;
        for buffer in skinning.buffers {
            buffers.add(buffer)?;
        }

        let blendshapes = compile_blendshapes(
            &classified.vertices,
            &input.blendshape_names,
            self.config.blendshapes,
            self.config.index_storage,
        )?;
        let blendshape_summary = match blendshapes {
            Some(compiled) => {
                for buffer in compiled.buffers {
                    buffers.add(buffer)?;
                }
                Some(compiled.summary)
            }
            None => None,
        };

        let vertex_count = classified.vertices.len();
        let dominant = classified.streams.dominant;
        log::info!(
            "Compiled mesh: {} -> {} vertices, {} buffers ({} bytes), dominant {:?} ({} indices)",
            input.vertices.len(),
            vertex_count,
            buffers.len(),
            buffers.total_bytes(),
            dominant,
            classified.streams.count(dominant) * dominant.indices_per_element()
        );

        let spatial = spatial_index(&buffers, &classified.streams, self.config.bvh_leaf_size);

        Ok(CompiledMesh {
            vertex_count,
            streams: classified.streams,
            buffers,
            bounds: discovery.bounds,
            bone_names: input.bone_names.clone(),
            bones: skinning.bones,
            skinning_layout: skinning.layout,
            blendshapes: blendshape_summary,
            source_vertices: classified.source_vertices,
            vertices: Some(classified.vertices),
            config: self.config.clone(),
            spatial,
        })
    }
}

/// Build the spatial index over the dominant triangle stream.
pub(crate) fn spatial_index(
    buffers: &BufferCollection,
    streams: &PrimitiveStreams,
    leaf_size: usize,
) -> SpatialIndex {
    let (positions, triangles) = spatial_source(buffers, streams);
    SpatialIndex::new(positions, triangles, leaf_size)
}

/// Current positions and the triangles a BVH should index.
fn spatial_source(
    buffers: &BufferCollection,
    streams: &PrimitiveStreams,
) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
    let positions: Vec<[f32; 3]> = buffers
        .get(bindings::POSITION)
        .and_then(|b| b.as_f32())
        .map(|data| {
            data.chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect()
        })
        .unwrap_or_default();
    let triangles = if streams.dominant == PrimitiveType::Triangles {
        streams.triangles.clone()
    } else {
        Vec::new()
    };
    (positions, triangles)
}

/// A compiled mesh: GPU-ready buffers plus derived structures.
#[derive(Debug)]
pub struct CompiledMesh {
    pub(crate) vertex_count: usize,
    pub(crate) streams: PrimitiveStreams,
    pub(crate) buffers: BufferCollection,
    pub(crate) bounds: Aabb,
    pub(crate) bone_names: Vec<String>,
    pub(crate) bones: Vec<UtilizedBone>,
    pub(crate) skinning_layout: Option<SkinningLayout>,
    pub(crate) blendshapes: Option<BlendshapeSummary>,
    pub(crate) source_vertices: Vec<u32>,
    pub(crate) vertices: Option<Vec<Vertex>>,
    pub(crate) config: CompilerConfig,
    pub(crate) spatial: SpatialIndex,
}

impl CompiledMesh {
    /// Number of canonical vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Index streams into the canonical vertices.
    pub fn streams(&self) -> &PrimitiveStreams {
        &self.streams
    }

    /// Stream with the most elements.
    pub fn dominant_type(&self) -> PrimitiveType {
        self.streams.dominant
    }

    /// Named GPU buffers.
    pub fn buffers(&self) -> &BufferCollection {
        &self.buffers
    }

    /// Mutable buffers, e.g. to subscribe listeners.
    pub fn buffers_mut(&mut self) -> &mut BufferCollection {
        &mut self.buffers
    }

    /// Bounds of the dominant stream's vertices.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Bone names of the source mesh.
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    /// Utilized bones in GPU ordinal order.
    pub fn bones(&self) -> &[UtilizedBone] {
        &self.bones
    }

    /// Skinning layout, if skinning buffers were emitted.
    pub fn skinning_layout(&self) -> Option<SkinningLayout> {
        self.skinning_layout
    }

    /// Blendshape summary, if blendshape buffers were emitted.
    pub fn blendshapes(&self) -> Option<&BlendshapeSummary> {
        self.blendshapes.as_ref()
    }

    /// Canonical index → source vertex index.
    pub fn source_vertices(&self) -> &[u32] {
        &self.source_vertices
    }

    /// Canonical vertices, if retained.
    ///
    /// `None` for meshes restored from a snapshot.
    pub fn canonical_vertices(&self) -> Option<&[Vertex]> {
        self.vertices.as_deref()
    }

    /// Configuration the mesh was compiled with.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The lazily built spatial index.
    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Closest triangle hit by the segment `start → end` in mesh space.
    ///
    /// Returns `None` while the spatial index is still building; the first
    /// call starts the build.
    pub fn intersect_segment(&self, start: [f32; 3], end: [f32; 3]) -> Option<RayHit> {
        self.spatial.intersect_segment(start, end)
    }

    /// Rebuild the spatial index from the current `position` buffer.
    ///
    /// Call after editing positions through [`buffers_mut`](Self::buffers_mut).
    /// Returns `false` if a build is already running; the edit is then
    /// picked up by the next call.
    pub fn rebuild_spatial_index(&self) -> bool {
        let (positions, triangles) = spatial_source(&self.buffers, &self.streams);
        self.spatial.rebuild_with(positions, triangles)
    }

    /// Recompile skinning against a changed skeleton.
    ///
    /// Buffers of the new layout replace the old ones; bindings the new layout
    /// no longer uses are removed. Listeners see each change.
    pub fn rebind_skeleton(&mut self, resolver: &dyn SkeletonResolver) -> Result<(), MeshError> {
        let vertices = self
            .vertices
            .as_deref()
            .ok_or(MeshError::SourceVerticesUnavailable)?;
        let skinning = compile_skinning(
            vertices,
            &self.bone_names,
            resolver,
            self.config.skinning,
            self.config.index_storage,
        )?;

        let emitted: Vec<String> = skinning
            .buffers
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        for buffer in skinning.buffers {
            self.buffers.insert(buffer);
        }
        for name in bindings::SKINNING {
            if !emitted.iter().any(|e| e == name) {
                self.buffers.remove(name);
            }
        }

        log::debug!(
            "Rebound skeleton: {} -> {} utilized bones",
            self.bones.len(),
            skinning.bones.len()
        );
        self.bones = skinning.bones;
        self.skinning_layout = skinning.layout;
        Ok(())
    }
}
