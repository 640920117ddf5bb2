//! Primitive classification into triangle, line and point streams.
//!
//! Every accepted primitive shape is expanded into discrete triangles, lines
//! or points. Each stream's corners are then deduplicated independently and
//! the per-stream unique vertices are concatenated (triangles, then lines,
//! then points) into the canonical vertex list.
//!
//! Polygons and fans are triangulated around their first vertex. This is only
//! correct for convex, roughly planar polygons; concave input is not detected.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::remap::remap;
use crate::vertex::Vertex;

/// An input primitive referencing source vertices by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    /// A single point.
    Point(u32),
    /// A list of independent points.
    Points(Vec<u32>),
    /// A single line segment.
    Line([u32; 2]),
    /// Connected line segments.
    LineStrip(Vec<u32>),
    /// Connected line segments closed back to the first vertex.
    LineLoop(Vec<u32>),
    /// A single triangle.
    Triangle([u32; 3]),
    /// Triangles sharing the first vertex.
    TriangleFan(Vec<u32>),
    /// Triangles sharing an edge with their predecessor.
    TriangleStrip(Vec<u32>),
    /// A convex polygon, fan-triangulated from its first vertex.
    Polygon(Vec<u32>),
    /// An imported face; its arity decides the kind (1 point, 2 line, 3 triangle, more polygon).
    Face(Vec<u32>),
}

/// The three topology streams, in tie-break priority order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum PrimitiveType {
    /// Triangle list.
    #[default]
    Triangles,
    /// Line list.
    Lines,
    /// Point list.
    Points,
}

impl PrimitiveType {
    /// Indices per element of this stream.
    pub fn indices_per_element(self) -> usize {
        match self {
            Self::Triangles => 3,
            Self::Lines => 2,
            Self::Points => 1,
        }
    }

    /// Pick the stream with the most elements; ties go to triangles, then lines.
    pub fn dominant(triangles: usize, lines: usize, points: usize) -> Self {
        let mut best = (Self::Triangles, triangles);
        for candidate in [(Self::Lines, lines), (Self::Points, points)] {
            if candidate.1 > best.1 {
                best = candidate;
            }
        }
        best.0
    }
}

/// Flat index streams into the canonical vertex list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveStreams {
    /// Triangle list.
    pub triangles: Vec<[u32; 3]>,
    /// Line list.
    pub lines: Vec<[u32; 2]>,
    /// Point list.
    pub points: Vec<u32>,
    /// Stream with the most elements.
    pub dominant: PrimitiveType,
}

impl PrimitiveStreams {
    /// Number of elements in a stream.
    pub fn count(&self, kind: PrimitiveType) -> usize {
        match kind {
            PrimitiveType::Triangles => self.triangles.len(),
            PrimitiveType::Lines => self.lines.len(),
            PrimitiveType::Points => self.points.len(),
        }
    }

    /// Flattened indices of a stream, e.g. for an index buffer upload.
    pub fn flat_indices(&self, kind: PrimitiveType) -> Vec<u32> {
        let mut flat = Vec::with_capacity(self.count(kind) * kind.indices_per_element());
        match kind {
            PrimitiveType::Triangles => flat.extend(self.triangles.iter().flatten()),
            PrimitiveType::Lines => flat.extend(self.lines.iter().flatten()),
            PrimitiveType::Points => flat.extend(&self.points),
        }
        flat
    }

    /// Largest referenced index plus one, or zero if all streams are empty.
    pub fn referenced_vertex_count(&self) -> usize {
        self.triangles
            .iter()
            .flatten()
            .chain(self.lines.iter().flatten())
            .chain(self.points.iter())
            .map(|&i| i as usize + 1)
            .max()
            .unwrap_or(0)
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone)]
pub struct Classified {
    /// Canonical vertices: triangle-stream uniques, then lines, then points.
    pub vertices: Vec<Vertex>,
    /// Canonical index → source vertex index it was first produced from.
    pub source_vertices: Vec<u32>,
    /// Index streams into `vertices`.
    pub streams: PrimitiveStreams,
    /// Range of `vertices` owned by the dominant stream.
    pub dominant_vertices: Range<usize>,
}

#[derive(Default)]
struct Expanded {
    triangles: Vec<u32>,
    lines: Vec<u32>,
    points: Vec<u32>,
}

impl Expanded {
    fn push(&mut self, primitive: &Primitive) {
        match primitive {
            Primitive::Point(i) => self.points.push(*i),
            Primitive::Points(list) => self.points.extend_from_slice(list),
            Primitive::Line(l) => self.lines.extend_from_slice(l),
            Primitive::LineStrip(list) => self.push_strip(list, false),
            Primitive::LineLoop(list) => self.push_strip(list, true),
            Primitive::Triangle(t) => self.triangles.extend_from_slice(t),
            Primitive::TriangleFan(list) | Primitive::Polygon(list) => self.push_fan(list),
            Primitive::TriangleStrip(list) => self.push_triangle_strip(list),
            Primitive::Face(list) => match list.len() {
                0 => log::warn!("Skipping face with no indices"),
                1 => self.points.push(list[0]),
                2 => self.lines.extend_from_slice(list),
                _ => self.push_fan(list),
            },
        }
    }

    fn push_strip(&mut self, list: &[u32], closed: bool) {
        if list.len() < 2 {
            log::debug!("Skipping degenerate line strip with {} vertices", list.len());
            return;
        }
        for pair in list.windows(2) {
            self.lines.extend_from_slice(pair);
        }
        if closed && list.len() > 2 {
            self.lines.push(list[list.len() - 1]);
            self.lines.push(list[0]);
        }
    }

    fn push_fan(&mut self, list: &[u32]) {
        if list.len() < 3 {
            log::debug!("Skipping degenerate fan with {} vertices", list.len());
            return;
        }
        let pivot = list[0];
        for pair in list[1..].windows(2) {
            self.triangles.extend_from_slice(&[pivot, pair[0], pair[1]]);
        }
    }

    fn push_triangle_strip(&mut self, list: &[u32]) {
        if list.len() < 3 {
            log::debug!("Skipping degenerate triangle strip with {} vertices", list.len());
            return;
        }
        for (i, w) in list.windows(3).enumerate() {
            if i % 2 == 0 {
                self.triangles.extend_from_slice(&[w[0], w[1], w[2]]);
            } else {
                self.triangles.extend_from_slice(&[w[1], w[0], w[2]]);
            }
        }
    }
}

/// Deduplicated corners of one stream, re-based into the canonical list.
struct StreamVertices {
    indices: Vec<u32>,
    range: Range<usize>,
}

fn compile_stream(
    corners: &[u32],
    source: &[Vertex],
    deduplicate: bool,
    vertices: &mut Vec<Vertex>,
    source_vertices: &mut Vec<u32>,
) -> StreamVertices {
    let records: Vec<&Vertex> = corners.iter().map(|&i| &source[i as usize]).collect();
    let remapped = remap(&records, deduplicate);

    let base = vertices.len();
    vertices.extend(remapped.unique.iter().map(|v| (*v).clone()));
    source_vertices.extend(
        remapped
            .implementation
            .iter()
            .map(|&corner| corners[corner as usize]),
    );

    StreamVertices {
        indices: remapped.remap.iter().map(|&c| base as u32 + c).collect(),
        range: base..vertices.len(),
    }
}

/// Expand, deduplicate and classify primitives.
///
/// Indices are assumed to be valid for `source`; callers reject malformed
/// input before compiling (see [`ImportedMesh`](crate::ImportedMesh)).
pub fn classify(source: &[Vertex], primitives: &[Primitive], deduplicate: bool) -> Classified {
    crate::profile_function!();

    let mut expanded = Expanded::default();
    for primitive in primitives {
        expanded.push(primitive);
    }

    let mut vertices = Vec::new();
    let mut source_vertices = Vec::new();

    let tris = compile_stream(
        &expanded.triangles,
        source,
        deduplicate,
        &mut vertices,
        &mut source_vertices,
    );
    let lines = compile_stream(
        &expanded.lines,
        source,
        deduplicate,
        &mut vertices,
        &mut source_vertices,
    );
    let points = compile_stream(
        &expanded.points,
        source,
        deduplicate,
        &mut vertices,
        &mut source_vertices,
    );

    let triangles: Vec<[u32; 3]> = tris
        .indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();
    let line_list: Vec<[u32; 2]> = lines
        .indices
        .chunks_exact(2)
        .map(|c| [c[0], c[1]])
        .collect();

    let dominant = PrimitiveType::dominant(triangles.len(), line_list.len(), points.indices.len());
    let dominant_vertices = match dominant {
        PrimitiveType::Triangles => tris.range,
        PrimitiveType::Lines => lines.range,
        PrimitiveType::Points => points.range,
    };

    log::debug!(
        "Classified {} primitives: {} triangles, {} lines, {} points, {} vertices (dominant {:?})",
        primitives.len(),
        triangles.len(),
        line_list.len(),
        points.indices.len(),
        vertices.len(),
        dominant
    );

    Classified {
        vertices,
        source_vertices,
        streams: PrimitiveStreams {
            triangles,
            lines: line_list,
            points: points.indices,
            dominant,
        },
        dominant_vertices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<Vertex> {
        (0..n).map(|i| Vertex::new([i as f32, 0.0, 0.0])).collect()
    }

    #[test]
    fn dominant_tie_break() {
        assert_eq!(PrimitiveType::dominant(0, 0, 0), PrimitiveType::Triangles);
        assert_eq!(PrimitiveType::dominant(2, 2, 2), PrimitiveType::Triangles);
        assert_eq!(PrimitiveType::dominant(1, 2, 2), PrimitiveType::Lines);
        assert_eq!(PrimitiveType::dominant(1, 2, 3), PrimitiveType::Points);
    }

    #[test]
    fn polygon_is_fan_triangulated() {
        let source = grid(5);
        let result = classify(&source, &[Primitive::Polygon(vec![0, 1, 2, 3, 4])], true);
        assert_eq!(result.streams.triangles, vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]]);
        assert_eq!(result.vertices.len(), 5);
    }

    #[test]
    fn face_arity_selects_stream() {
        let source = grid(6);
        let result = classify(
            &source,
            &[
                Primitive::Face(vec![0]),
                Primitive::Face(vec![1, 2]),
                Primitive::Face(vec![3, 4, 5]),
            ],
            true,
        );
        assert_eq!(result.streams.triangles.len(), 1);
        assert_eq!(result.streams.lines.len(), 1);
        assert_eq!(result.streams.points.len(), 1);
        // Triangle vertices come first, then lines, then points.
        assert_eq!(result.source_vertices, vec![3, 4, 5, 1, 2, 0]);
    }

    #[test]
    fn strips_expand() {
        let source = grid(4);
        let result = classify(
            &source,
            &[
                Primitive::LineLoop(vec![0, 1, 2]),
                Primitive::TriangleStrip(vec![0, 1, 2, 3]),
            ],
            true,
        );
        assert_eq!(result.streams.lines.len(), 3);
        assert_eq!(result.streams.triangles.len(), 2);
        let [a, b, c] = result.streams.triangles[1];
        // Second strip triangle flips winding: (1, 0, 2) → source (2, 1, 3).
        assert_eq!(
            [
                result.source_vertices[a as usize],
                result.source_vertices[b as usize],
                result.source_vertices[c as usize]
            ],
            [2, 1, 3]
        );
    }

    #[test]
    fn degenerate_strips_are_skipped() {
        let source = grid(2);
        let result = classify(
            &source,
            &[
                Primitive::LineStrip(vec![0]),
                Primitive::TriangleFan(vec![0, 1]),
                Primitive::Face(vec![]),
            ],
            true,
        );
        assert_eq!(result.vertices.len(), 0);
        assert_eq!(result.streams.dominant, PrimitiveType::Triangles);
    }

    #[test]
    fn streams_deduplicate_independently() {
        let source = grid(3);
        let result = classify(
            &source,
            &[Primitive::Triangle([0, 1, 2]), Primitive::Line([0, 1])],
            true,
        );
        // Shared source vertices are not shared across streams.
        assert_eq!(result.vertices.len(), 5);
        assert_eq!(result.streams.lines, vec![[3, 4]]);
        assert_eq!(result.dominant_vertices, 0..3);
    }

    #[test]
    fn dedup_disabled_keeps_every_corner() {
        let source = grid(3);
        let prims = [Primitive::Triangle([0, 1, 2]), Primitive::Triangle([0, 2, 1])];
        let result = classify(&source, &prims, false);
        assert_eq!(result.vertices.len(), 6);
        assert_eq!(result.streams.triangles, vec![[0, 1, 2], [3, 4, 5]]);
        assert_eq!(result.streams.referenced_vertex_count(), 6);
    }

    #[test]
    fn flat_indices() {
        let streams = PrimitiveStreams {
            triangles: vec![[0, 1, 2]],
            lines: vec![[3, 4]],
            points: vec![5],
            dominant: PrimitiveType::Triangles,
        };
        assert_eq!(streams.flat_indices(PrimitiveType::Triangles), vec![0, 1, 2]);
        assert_eq!(streams.flat_indices(PrimitiveType::Lines), vec![3, 4]);
        assert_eq!(streams.count(PrimitiveType::Points), 1);
        assert_eq!(PrimitiveType::Lines.indices_per_element(), 2);
    }
}
