//! Compiler policy configuration.
//!
//! Every policy decision the compiler makes (deduplication, skinning layout,
//! blendshape pooling, index component storage) is driven by an explicit
//! [`CompilerConfig`] passed to [`MeshCompiler`](crate::MeshCompiler).
//!
//! # Example
//!
//! ```
//! use redlilium_mesh::{CompilerConfig, IndexStorage};
//!
//! let config = CompilerConfig::new()
//!     .with_deduplicate(true)
//!     .with_optimize_to_four(true)
//!     .with_index_storage(IndexStorage::Float);
//! assert!(config.skinning.optimize_to_four);
//! ```

use serde::{Deserialize, Serialize};

use crate::buffer::ComponentType;

/// Component storage used for index, offset and count buffers.
///
/// Some renderers cannot read integer storage buffers; those get the same
/// values written as floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexStorage {
    /// 32-bit signed integer components.
    #[default]
    Int,
    /// 32-bit float components holding integral values.
    Float,
}

impl IndexStorage {
    /// The buffer component type matching this storage.
    pub fn component_type(self) -> ComponentType {
        match self {
            Self::Int => ComponentType::Int,
            Self::Float => ComponentType::Float,
        }
    }
}

/// Skinning policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinningPolicy {
    /// Emit skinning buffers at all.
    pub allow_skinning: bool,
    /// Force the fixed 4-slot layout, truncating vertices with more weights.
    ///
    /// Even when unset, the fixed layout is chosen if no vertex has more than
    /// four weights.
    pub optimize_to_four: bool,
}

impl Default for SkinningPolicy {
    fn default() -> Self {
        Self {
            allow_skinning: true,
            optimize_to_four: false,
        }
    }
}

/// Blendshape policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendshapePolicy {
    /// Emit blendshape buffers at all.
    pub enabled: bool,
    /// Collapse duplicate deltas in the shared pool.
    pub remap_deltas: bool,
}

impl Default for BlendshapePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            remap_deltas: true,
        }
    }
}

/// Configuration for [`MeshCompiler`](crate::MeshCompiler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Deduplicate attribute-equal vertices within each primitive stream.
    pub deduplicate: bool,
    /// Skinning policy.
    pub skinning: SkinningPolicy,
    /// Blendshape policy.
    pub blendshapes: BlendshapePolicy,
    /// Component storage for index/offset/count buffers.
    pub index_storage: IndexStorage,
    /// Maximum number of triangles stored in one BVH leaf.
    pub bvh_leaf_size: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            skinning: SkinningPolicy::default(),
            blendshapes: BlendshapePolicy::default(),
            index_storage: IndexStorage::Int,
            bvh_leaf_size: 4,
        }
    }
}

impl CompilerConfig {
    /// Create a configuration with default policies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable vertex deduplication.
    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Enable or disable skinning buffers.
    pub fn with_skinning(mut self, allow: bool) -> Self {
        self.skinning.allow_skinning = allow;
        self
    }

    /// Force the fixed 4-weight skinning layout.
    pub fn with_optimize_to_four(mut self, optimize: bool) -> Self {
        self.skinning.optimize_to_four = optimize;
        self
    }

    /// Enable or disable blendshape buffers.
    pub fn with_blendshapes(mut self, enabled: bool) -> Self {
        self.blendshapes.enabled = enabled;
        self
    }

    /// Enable or disable delta pool deduplication.
    pub fn with_remap_deltas(mut self, remap: bool) -> Self {
        self.blendshapes.remap_deltas = remap;
        self
    }

    /// Set the component storage for index/offset/count buffers.
    pub fn with_index_storage(mut self, storage: IndexStorage) -> Self {
        self.index_storage = storage;
        self
    }

    /// Set the maximum triangle count per BVH leaf (clamped to at least 1).
    pub fn with_bvh_leaf_size(mut self, leaf_size: usize) -> Self {
        self.bvh_leaf_size = leaf_size.max(1);
        self
    }
}
