//! # RedLilium Mesh
//!
//! Mesh geometry compiler for RedLilium Engine.
//!
//! Turns loose vertices, typed primitives or imported scene meshes into
//! deduplicated, GPU-ready attribute buffers plus derived data: packed
//! skinning weights, pooled blendshape deltas and a lazily built BVH for
//! segment queries.
//!
//! ```
//! use redlilium_mesh::{CompilerConfig, ImportedMesh, MeshCompiler, NoSkeleton};
//!
//! let input = ImportedMesh::new(vec![
//!     [0.0, 0.0, 0.0],
//!     [1.0, 0.0, 0.0],
//!     [1.0, 1.0, 0.0],
//!     [0.0, 1.0, 0.0],
//! ])
//! .with_face(vec![0, 1, 2, 3])
//! .into_input()
//! .unwrap();
//!
//! let mesh = MeshCompiler::new(CompilerConfig::default())
//!     .compile(&input, &NoSkeleton)
//!     .unwrap();
//! assert_eq!(mesh.vertex_count(), 4);
//! assert_eq!(mesh.streams().triangles.len(), 2);
//! ```

pub mod blendshape;
pub mod bounds;
pub mod buffer;
pub mod bvh;
pub mod compiler;
pub mod config;
pub mod error;
pub mod import;
pub mod math;
pub mod population;
pub mod primitive;
pub mod profiling;
pub mod remap;
pub mod skinning;
pub mod snapshot;
pub mod spatial;
pub mod task;
pub mod vertex;

pub use blendshape::BlendshapeSummary;
pub use bounds::Aabb;
pub use buffer::{AttributeBuffer, BufferChange, BufferCollection, BufferListener, ComponentType};
pub use bvh::{Bvh, RayHit};
pub use compiler::{CompiledMesh, MeshCompiler, MeshInput};
pub use config::{BlendshapePolicy, CompilerConfig, IndexStorage, SkinningPolicy};
pub use error::MeshError;
pub use import::{ImportedBlendshape, ImportedBone, ImportedMesh};
pub use primitive::{Primitive, PrimitiveStreams, PrimitiveType};
pub use skinning::{NoSkeleton, NodeCache, NodeId, SkeletonResolver, SkinningLayout, UtilizedBone};
pub use snapshot::MeshSnapshot;
pub use spatial::{SpatialIndex, SpatialIndexState};
pub use vertex::{BlendshapeDelta, BoneWeight, Vertex};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
