//! Import-side mesh description and validation.
//!
//! [`ImportedMesh`] mirrors what scene importers produce: structure-of-arrays
//! vertex attributes, faces of any arity, per-bone weight lists and
//! per-shape delta arrays. [`ImportedMesh::into_input`] checks every count
//! and index, then interleaves the arrays into [`Vertex`] records.
//!
//! Bones that share a name are merged into one entry of the bone name list.
//! If both touch the same vertex, that vertex ends up with duplicate entries
//! that the skinning compiler averages.

use std::collections::HashMap;

use crate::compiler::MeshInput;
use crate::error::MeshError;
use crate::math::MAT4_IDENTITY;
use crate::primitive::Primitive;
use crate::vertex::{BlendshapeDelta, BoneWeight, Vertex};

/// Weights of one bone as imported.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedBone {
    /// Bone name, matched against the skeleton.
    pub name: String,
    /// Inverse-bind matrix, column-major.
    pub inverse_bind: [f32; 16],
    /// `(vertex, weight)` pairs.
    pub weights: Vec<(u32, f32)>,
}

impl ImportedBone {
    /// Create a bone with an identity inverse-bind matrix and no weights.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inverse_bind: MAT4_IDENTITY,
            weights: Vec::new(),
        }
    }

    /// Set the inverse-bind matrix.
    pub fn with_inverse_bind(mut self, inverse_bind: [f32; 16]) -> Self {
        self.inverse_bind = inverse_bind;
        self
    }

    /// Add a weight for `vertex`.
    pub fn with_weight(mut self, vertex: u32, weight: f32) -> Self {
        self.weights.push((vertex, weight));
        self
    }
}

/// One morph target as imported. Empty arrays mean "no delta".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportedBlendshape {
    /// Shape name.
    pub name: String,
    /// Position deltas, one per vertex.
    pub positions: Vec<[f32; 3]>,
    /// Normal deltas, one per vertex.
    pub normals: Vec<[f32; 3]>,
    /// Tangent deltas, one per vertex.
    pub tangents: Vec<[f32; 3]>,
}

impl ImportedBlendshape {
    /// Create a shape with position deltas.
    pub fn new(name: impl Into<String>, positions: Vec<[f32; 3]>) -> Self {
        Self {
            name: name.into(),
            positions,
            ..Self::default()
        }
    }

    /// Set normal deltas.
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    /// Set tangent deltas.
    pub fn with_tangents(mut self, tangents: Vec<[f32; 3]>) -> Self {
        self.tangents = tangents;
        self
    }
}

/// A mesh as delivered by a scene importer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportedMesh {
    /// Vertex positions; defines the vertex count.
    pub positions: Vec<[f32; 3]>,
    /// Normals, if present.
    pub normals: Option<Vec<[f32; 3]>>,
    /// Tangents, if present.
    pub tangents: Option<Vec<[f32; 4]>>,
    /// Color sets.
    pub colors: Vec<Vec<[f32; 4]>>,
    /// Texture coordinate sets.
    pub tex_coords: Vec<Vec<[f32; 2]>>,
    /// Faces of any arity. No faces means a loose point list.
    pub faces: Vec<Vec<u32>>,
    /// Bone weight lists.
    pub bones: Vec<ImportedBone>,
    /// Morph targets.
    pub blendshapes: Vec<ImportedBlendshape>,
}

impl ImportedMesh {
    /// Create a mesh from positions.
    pub fn new(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    /// Set normals.
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Set tangents.
    pub fn with_tangents(mut self, tangents: Vec<[f32; 4]>) -> Self {
        self.tangents = Some(tangents);
        self
    }

    /// Append a color set.
    pub fn with_color_set(mut self, colors: Vec<[f32; 4]>) -> Self {
        self.colors.push(colors);
        self
    }

    /// Append a texture coordinate set.
    pub fn with_uv_set(mut self, uvs: Vec<[f32; 2]>) -> Self {
        self.tex_coords.push(uvs);
        self
    }

    /// Append a face.
    pub fn with_face(mut self, face: Vec<u32>) -> Self {
        self.faces.push(face);
        self
    }

    /// Append a bone.
    pub fn with_bone(mut self, bone: ImportedBone) -> Self {
        self.bones.push(bone);
        self
    }

    /// Append a morph target.
    pub fn with_blendshape(mut self, shape: ImportedBlendshape) -> Self {
        self.blendshapes.push(shape);
        self
    }

    /// Validate and convert to compiler input.
    pub fn into_input(self) -> Result<MeshInput, MeshError> {
        crate::profile_function!();

        let Self {
            positions,
            normals,
            tangents,
            colors,
            tex_coords,
            faces,
            bones,
            blendshapes,
        } = self;

        let n = positions.len();
        if let Some(normals) = &normals {
            check_count("normal", n, normals.len())?;
        }
        if let Some(tangents) = &tangents {
            check_count("tangent", n, tangents.len())?;
        }
        for (set, colors) in colors.iter().enumerate() {
            check_count(&format!("color{set}"), n, colors.len())?;
        }
        for (set, uvs) in tex_coords.iter().enumerate() {
            check_count(&format!("uv{set}"), n, uvs.len())?;
        }
        for shape in &blendshapes {
            for (kind, len) in [
                ("positions", shape.positions.len()),
                ("normals", shape.normals.len()),
                ("tangents", shape.tangents.len()),
            ] {
                if len != 0 {
                    check_count(&format!("blendshape '{}' {kind}", shape.name), n, len)?;
                }
            }
        }

        for (face, indices) in faces.iter().enumerate() {
            if indices.is_empty() {
                return Err(MeshError::EmptyFace { face });
            }
            for &index in indices {
                check_index(|| format!("face {face}"), index, n)?;
            }
        }

        let mut vertices: Vec<Vertex> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                let mut vertex = Vertex::new(position);
                vertex.normal = normals.as_ref().map(|v| v[i]);
                vertex.tangent = tangents.as_ref().map(|v| v[i]);
                vertex.colors = colors.iter().map(|set| set[i]).collect();
                vertex.tex_coords = tex_coords.iter().map(|set| set[i]).collect();
                vertex
            })
            .collect();

        let mut bone_names: Vec<String> = Vec::new();
        let mut bone_slots: HashMap<String, u32> = HashMap::new();
        for bone in &bones {
            let slot = match bone_slots.get(&bone.name) {
                Some(&slot) => {
                    log::debug!("Merging duplicate bone '{}'", bone.name);
                    slot
                }
                None => {
                    let slot = bone_names.len() as u32;
                    bone_slots.insert(bone.name.clone(), slot);
                    bone_names.push(bone.name.clone());
                    slot
                }
            };
            for &(vertex, weight) in &bone.weights {
                check_index(|| format!("bone '{}'", bone.name), vertex, n)?;
                vertices[vertex as usize]
                    .bone_weights
                    .push(BoneWeight::new(slot, weight).with_inverse_bind(bone.inverse_bind));
            }
        }

        for (shape, target) in blendshapes.iter().enumerate() {
            for (i, vertex) in vertices.iter_mut().enumerate() {
                let delta = BlendshapeDelta {
                    position: target.positions.get(i).copied().unwrap_or_default(),
                    normal: target.normals.get(i).copied().unwrap_or_default(),
                    tangent: target.tangents.get(i).copied().unwrap_or_default(),
                };
                if !delta.is_zero() {
                    vertex.blendshapes.insert(shape as u32, delta);
                }
            }
        }

        log::debug!(
            "Imported mesh: {} vertices, {} faces, {} bones, {} blendshapes",
            n,
            faces.len(),
            bone_names.len(),
            blendshapes.len()
        );

        let input = if faces.is_empty() {
            MeshInput::from_vertices(vertices)
        } else {
            MeshInput::new(vertices, faces.into_iter().map(Primitive::Face).collect())
        };
        Ok(input
            .with_bone_names(bone_names)
            .with_blendshape_names(blendshapes.into_iter().map(|s| s.name).collect()))
    }
}

fn check_count(attribute: &str, expected: usize, found: usize) -> Result<(), MeshError> {
    if expected == found {
        Ok(())
    } else {
        Err(MeshError::AttributeCountMismatch {
            attribute: attribute.to_string(),
            expected,
            found,
        })
    }
}

fn check_index(
    context: impl FnOnce() -> String,
    index: u32,
    vertex_count: usize,
) -> Result<(), MeshError> {
    if (index as usize) < vertex_count {
        Ok(())
    } else {
        Err(MeshError::IndexOutOfRange {
            context: context(),
            index,
            vertex_count,
        })
    }
}
