use std::f32::consts::PI;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use redlilium_mesh::remap::remap;
use redlilium_mesh::{
    Bvh, CompilerConfig, ImportedBone, ImportedMesh, MeshCompiler, MeshInput, NoSkeleton,
    NodeCache, NodeId, Primitive,
};

fn sphere(segments: u32, rings: u32) -> ImportedMesh {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let n = [theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()];
            positions.push(n);
            normals.push(n);
        }
    }
    let mut mesh = ImportedMesh::new(positions).with_normals(normals);
    for ring in 0..rings {
        for segment in 0..segments {
            let a = ring * (segments + 1) + segment;
            let b = a + segments + 1;
            mesh = mesh
                .with_face(vec![a, b, a + 1])
                .with_face(vec![a + 1, b, b + 1]);
        }
    }
    mesh
}

fn soup(input: &MeshInput) -> MeshInput {
    let mut vertices = Vec::new();
    let mut primitives = Vec::new();
    for primitive in &input.primitives {
        if let Primitive::Face(corners) = primitive {
            let base = vertices.len() as u32;
            vertices.extend(corners.iter().map(|&i| input.vertices[i as usize].clone()));
            primitives.push(Primitive::Face((base..base + corners.len() as u32).collect()));
        }
    }
    MeshInput::new(vertices, primitives)
}

// ---------------------------------------------------------------------------
// Remapping
// ---------------------------------------------------------------------------

fn bench_remap_soup(c: &mut Criterion) {
    let input = soup(&sphere(64, 32).into_input().unwrap());
    c.bench_function("remap_sphere_soup_64x32", |b| {
        b.iter(|| remap(black_box(&input.vertices), true));
    });
}

// ---------------------------------------------------------------------------
// Full compile
// ---------------------------------------------------------------------------

fn bench_compile_sphere(c: &mut Criterion) {
    let input = sphere(64, 32).into_input().unwrap();
    let compiler = MeshCompiler::default();
    c.bench_function("compile_sphere_64x32", |b| {
        b.iter(|| compiler.compile(black_box(&input), &NoSkeleton).unwrap());
    });
}

fn bench_compile_soup(c: &mut Criterion) {
    let input = soup(&sphere(64, 32).into_input().unwrap());
    let compiler = MeshCompiler::default();
    c.bench_function("compile_sphere_soup_64x32", |b| {
        b.iter(|| compiler.compile(black_box(&input), &NoSkeleton).unwrap());
    });
}

fn bench_compile_skinned(c: &mut Criterion) {
    let base = sphere(64, 32);
    let count = base.positions.len() as u32;
    let mut mesh = base;
    let mut skeleton = NodeCache::new();
    for bone in 0..6u32 {
        let mut imported = ImportedBone::new(format!("bone{bone}"));
        for v in (bone..count).step_by(2) {
            imported = imported.with_weight(v, 1.0 + bone as f32);
        }
        mesh = mesh.with_bone(imported);
        skeleton.insert(format!("bone{bone}"), NodeId(bone));
    }
    let input = mesh.into_input().unwrap();

    let fixed = MeshCompiler::new(CompilerConfig::new().with_optimize_to_four(true));
    c.bench_function("compile_skinned_fixed4", |b| {
        b.iter(|| fixed.compile(black_box(&input), &skeleton).unwrap());
    });

    let variable = MeshCompiler::default();
    c.bench_function("compile_skinned_variable", |b| {
        b.iter(|| variable.compile(black_box(&input), &skeleton).unwrap());
    });
}

// ---------------------------------------------------------------------------
// BVH
// ---------------------------------------------------------------------------

fn bench_bvh_build(c: &mut Criterion) {
    let input = sphere(128, 64).into_input().unwrap();
    let mesh = MeshCompiler::default().compile(&input, &NoSkeleton).unwrap();
    let positions: Vec<[f32; 3]> = mesh
        .canonical_vertices()
        .unwrap_or_default()
        .iter()
        .map(|v| v.position)
        .collect();
    let triangles = mesh.streams().triangles.clone();
    c.bench_function("bvh_build_sphere_128x64", |b| {
        b.iter(|| Bvh::build(black_box(positions.clone()), black_box(triangles.clone()), 4));
    });
}

fn bench_bvh_query(c: &mut Criterion) {
    let input = sphere(128, 64).into_input().unwrap();
    let mesh = MeshCompiler::default().compile(&input, &NoSkeleton).unwrap();
    let bvh = mesh.spatial_index().wait_until_ready().unwrap();
    c.bench_function("bvh_segment_query", |b| {
        b.iter(|| bvh.intersect_segment(black_box([3.0, 0.1, 0.2]), black_box([-3.0, 0.1, 0.2])));
    });
}

criterion_group!(
    benches,
    bench_remap_soup,
    bench_compile_sphere,
    bench_compile_soup,
    bench_compile_skinned,
    bench_bvh_build,
    bench_bvh_query,
);
criterion_main!(benches);
