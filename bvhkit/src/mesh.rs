use glam::Vec3;

use crate::{Boundable, BoundingBox, BuildError};

/// Indexed triangle mesh, as handed over by the scene layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    faces: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn new(
        vertices: Vec<Vec3>,
        faces: Vec<[u32; 3]>,
    ) -> Result<Self, BuildError> {
        let vertex_count = vertices.len();

        for (face_idx, face) in faces.iter().enumerate() {
            if let Some(vertex_idx) =
                face.iter().find(|&&idx| (idx as usize) >= vertex_count)
            {
                return Err(BuildError::InvalidMesh(format!(
                    "face {face_idx} refers to vertex {vertex_idx}, but the \
                     mesh has only {vertex_count} vertices"
                )));
            }
        }

        Ok(Self { vertices, faces })
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Returns all faces as standalone triangles; the n-th triangle
    /// corresponds to the n-th face.
    pub fn triangles(&self) -> Vec<MeshTriangle> {
        self.faces
            .iter()
            .map(|face| MeshTriangle {
                positions: face.map(|idx| self.vertices[idx as usize]),
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshTriangle {
    positions: [Vec3; 3],
}

impl MeshTriangle {
    pub fn new(positions: [Vec3; 3]) -> Self {
        Self { positions }
    }

    pub fn positions(&self) -> [Vec3; 3] {
        self.positions
    }
}

impl Boundable for MeshTriangle {
    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.positions)
    }

    fn center(&self) -> Vec3 {
        self.positions.iter().sum::<Vec3>() / 3.0
    }
}
