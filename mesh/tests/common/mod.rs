//! Shared fixtures for mesh compiler integration tests.

#![allow(dead_code)]

use std::f32::consts::PI;

use redlilium_mesh::{Aabb, CompiledMesh, ImportedMesh, MeshInput, Primitive, Vertex, buffer::bindings};

/// Install a test logger once. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Geometry fixtures
// ============================================================================

/// UV sphere with normals and one UV set, indexed.
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> ImportedMesh {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();

    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let n = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            positions.push([n[0] * radius, n[1] * radius, n[2] * radius]);
            normals.push(n);
            uvs.push([segment as f32 / segments as f32, ring as f32 / rings as f32]);
        }
    }

    let mut mesh = ImportedMesh::new(positions)
        .with_normals(normals)
        .with_uv_set(uvs);
    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            mesh = mesh
                .with_face(vec![current, next, current + 1])
                .with_face(vec![current + 1, next, next + 1]);
        }
    }
    mesh
}

/// Expand an indexed input into a triangle soup: every corner gets its own
/// copy of the vertex.
pub fn triangle_soup(input: &MeshInput) -> MeshInput {
    let mut vertices = Vec::new();
    let mut primitives = Vec::new();
    for primitive in &input.primitives {
        let corners: Vec<u32> = match primitive {
            Primitive::Triangle(t) => t.to_vec(),
            Primitive::Face(f) if f.len() == 3 => f.clone(),
            other => panic!("triangle_soup only handles triangles, got {other:?}"),
        };
        let base = vertices.len() as u32;
        for corner in corners {
            vertices.push(input.vertices[corner as usize].clone());
        }
        primitives.push(Primitive::Triangle([base, base + 1, base + 2]));
    }
    MeshInput::new(vertices, primitives)
        .with_bone_names(input.bone_names.clone())
        .with_blendshape_names(input.blendshape_names.clone())
}

/// Four triangles fanned around a shared center, as a soup of 12 corners.
pub fn pinwheel_soup() -> MeshInput {
    let center = [0.0, 0.0, 0.0];
    let ring = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, -1.0, 0.0]];
    let mut vertices = Vec::new();
    let mut primitives = Vec::new();
    for i in 0..4 {
        let base = vertices.len() as u32;
        vertices.push(Vertex::new(center));
        vertices.push(Vertex::new(ring[i]));
        vertices.push(Vertex::new(ring[(i + 1) % 4]));
        primitives.push(Primitive::Triangle([base, base + 1, base + 2]));
    }
    MeshInput::new(vertices, primitives)
}

// ============================================================================
// Readback helpers
// ============================================================================

/// Positions of a compiled mesh, one entry per canonical vertex.
pub fn positions(mesh: &CompiledMesh) -> Vec<[f32; 3]> {
    mesh.buffers()
        .require(bindings::POSITION)
        .unwrap()
        .as_f32()
        .unwrap()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Triangles of a compiled mesh resolved to corner positions.
pub fn triangle_positions(mesh: &CompiledMesh) -> Vec<[[f32; 3]; 3]> {
    let positions = positions(mesh);
    mesh.streams()
        .triangles
        .iter()
        .map(|t| t.map(|i| positions[i as usize]))
        .collect()
}

/// Bounds recomputed by scanning every vertex the dominant stream references.
pub fn scanned_bounds(mesh: &CompiledMesh) -> Aabb {
    let positions = positions(mesh);
    let streams = mesh.streams();
    let indices = streams.flat_indices(streams.dominant);
    Aabb::from_points(indices.iter().map(|&i| &positions[i as usize]))
}
