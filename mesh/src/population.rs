//! Per-vertex attribute discovery and parallel buffer population.
//!
//! Population runs in two passes:
//!
//! 1. **Discovery**: one sequential pass over the canonical vertices that
//!    registers an [`AttributeWriter`] for every attribute kind present on at
//!    least one vertex, measures the maximum number of color and UV sets, and
//!    expands the running bounds of the dominant stream's vertices.
//! 2. **Population**: buffers are allocated for exactly the discovered
//!    attributes, then every writer runs over all vertices in parallel. Each
//!    destination slot belongs to one vertex, so writes never overlap.
//!
//! Vertices lacking an attribute that others have get zeros in that slot.

use std::ops::Range;

use rayon::prelude::*;

use crate::bounds::Aabb;
use crate::buffer::{AttributeBuffer, ComponentType, bindings};
use crate::vertex::Vertex;

/// Writes one attribute kind into its destination buffer(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeWriter {
    /// Position (always present).
    Position,
    /// Normal.
    Normal,
    /// Tangent.
    Tangent,
    /// Color sets; one buffer per set.
    Colors {
        /// Maximum number of sets on any vertex.
        sets: usize,
    },
    /// Texture coordinate sets; one buffer per set.
    TexCoords {
        /// Maximum number of sets on any vertex.
        sets: usize,
    },
}

impl AttributeWriter {
    /// Number of destination buffers.
    pub fn buffer_count(&self) -> usize {
        match self {
            Self::Colors { sets } | Self::TexCoords { sets } => *sets,
            _ => 1,
        }
    }

    /// Components per element.
    pub fn components(&self) -> u8 {
        match self {
            Self::Position | Self::Normal => 3,
            Self::Tangent | Self::Colors { .. } => 4,
            Self::TexCoords { .. } => 2,
        }
    }

    /// Binding name of destination buffer `set`.
    pub fn binding(&self, set: usize) -> String {
        match self {
            Self::Position => bindings::POSITION.to_string(),
            Self::Normal => bindings::NORMAL.to_string(),
            Self::Tangent => bindings::TANGENT.to_string(),
            Self::Colors { .. } => bindings::color(set),
            Self::TexCoords { .. } => bindings::uv(set),
        }
    }

    /// Write `vertex`'s attribute for destination buffer `set` into `slot`.
    ///
    /// `slot` is exactly [`components`](Self::components) long.
    pub fn write(&self, set: usize, slot: &mut [f32], vertex: &Vertex) {
        match self {
            Self::Position => slot.copy_from_slice(&vertex.position),
            Self::Normal => {
                if let Some(n) = &vertex.normal {
                    slot.copy_from_slice(n);
                }
            }
            Self::Tangent => {
                if let Some(t) = &vertex.tangent {
                    slot.copy_from_slice(t);
                }
            }
            Self::Colors { .. } => {
                if let Some(c) = vertex.colors.get(set) {
                    slot.copy_from_slice(c);
                }
            }
            Self::TexCoords { .. } => {
                if let Some(uv) = vertex.tex_coords.get(set) {
                    slot.copy_from_slice(uv);
                }
            }
        }
    }
}

/// Result of the discovery pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    /// Writers in registration order; position is always first.
    pub writers: Vec<AttributeWriter>,
    /// Running bounds over the dominant stream's vertices.
    pub bounds: Aabb,
    /// Number of vertices scanned.
    pub vertex_count: usize,
}

/// Two-pass attribute population over a canonical vertex list.
pub struct AttributePopulationEngine<'a> {
    vertices: &'a [Vertex],
    bounds_range: Range<usize>,
}

impl<'a> AttributePopulationEngine<'a> {
    /// Create an engine over `vertices`; bounds cover `bounds_range` only.
    pub fn new(vertices: &'a [Vertex], bounds_range: Range<usize>) -> Self {
        Self {
            vertices,
            bounds_range,
        }
    }

    /// Sequential discovery pass.
    pub fn discover(&self) -> Discovery {
        crate::profile_scope!("attribute_discovery");

        let mut has_normal = false;
        let mut has_tangent = false;
        let mut color_sets = 0usize;
        let mut uv_sets = 0usize;
        let mut bounds = Aabb::EMPTY;

        for (index, vertex) in self.vertices.iter().enumerate() {
            has_normal |= vertex.normal.is_some();
            has_tangent |= vertex.tangent.is_some();
            color_sets = color_sets.max(vertex.colors.len());
            uv_sets = uv_sets.max(vertex.tex_coords.len());
            if self.bounds_range.contains(&index) {
                bounds.expand_point(vertex.position);
            }
        }

        let mut writers = vec![AttributeWriter::Position];
        if has_normal {
            writers.push(AttributeWriter::Normal);
        }
        if has_tangent {
            writers.push(AttributeWriter::Tangent);
        }
        if color_sets > 0 {
            writers.push(AttributeWriter::Colors { sets: color_sets });
        }
        if uv_sets > 0 {
            writers.push(AttributeWriter::TexCoords { sets: uv_sets });
        }

        log::debug!(
            "Discovered attributes {:?} over {} vertices",
            writers,
            self.vertices.len()
        );

        Discovery {
            writers,
            bounds,
            vertex_count: self.vertices.len(),
        }
    }

    /// Allocate zeroed buffers for every discovered writer, in writer order.
    pub fn init_mesh_buffers(discovery: &Discovery) -> Vec<Vec<AttributeBuffer>> {
        discovery
            .writers
            .iter()
            .map(|writer| {
                (0..writer.buffer_count())
                    .map(|set| {
                        AttributeBuffer::zeroed(
                            writer.binding(set),
                            ComponentType::Float,
                            writer.components(),
                            discovery.vertex_count,
                        )
                    })
                    .collect()
            })
            .collect()
    }

    /// Run every writer over every vertex in parallel.
    pub fn populate(&self, discovery: &Discovery) -> Vec<AttributeBuffer> {
        crate::profile_scope!("attribute_population");

        let mut buffers = Self::init_mesh_buffers(discovery);
        for (writer, sets) in discovery.writers.iter().zip(buffers.iter_mut()) {
            let components = writer.components() as usize;
            for (set, buffer) in sets.iter_mut().enumerate() {
                let Some(data) = buffer.as_f32_mut() else {
                    continue;
                };
                data.par_chunks_mut(components)
                    .zip(self.vertices.par_iter())
                    .for_each(|(slot, vertex)| writer.write(set, slot, vertex));
            }
        }
        buffers.into_iter().flatten().collect()
    }

    /// Discover, then populate.
    pub fn run(&self) -> (Discovery, Vec<AttributeBuffer>) {
        let discovery = self.discover();
        let buffers = self.populate(&discovery);
        (discovery, buffers)
    }
}
