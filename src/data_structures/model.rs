//! Meshes, materials and the model tree.
//!
//! A [`Model`] owns its meshes and its sub-models directly, so the scene graph
//! is a tree by construction: dropping a model drops its whole subtree.

use crate::error::MeshError;

/// An RGBA colour with components in `[0, 1]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[f32; 4]> for Color {
    fn from(c: [f32; 4]) -> Self {
        Color::new(c[0], c[1], c[2], c[3])
    }
}

impl From<[f32; 3]> for Color {
    fn from(c: [f32; 3]) -> Self {
        Color::new(c[0], c[1], c[2], 1.0)
    }
}

/// Surface description of a mesh.
///
/// `shininess` lives in `[0, 1]` and is scaled onto the native specular
/// exponent range when the material is bound.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub shininess: f32,
    /// Path of the diffuse texture, used as the texture cache key.
    pub texture: Option<String>,
}

impl Material {
    /// Opaque white, no texture. Used for meshes without any material.
    pub fn opaque_white() -> Self {
        Self {
            name: "default".to_string(),
            ambient: Color::WHITE,
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            shininess: 0.0,
            texture: None,
        }
    }

    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture = Some(path.into());
        self
    }

    /// The texture key, if the material names a non-empty one.
    pub fn texture_key(&self) -> Option<&str> {
        self.texture.as_deref().filter(|path| !path.is_empty())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::opaque_white()
    }
}

/// Indexed triangle geometry with per-vertex normals and UV channels.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    tex_coords: Vec<Vec<[f32; 2]>>,
    indices: Vec<u16>,
    /// Only the first material is consulted when drawing.
    pub materials: Vec<Material>,
}

impl Mesh {
    /// Build a mesh, checking that the index buffer and every vertex
    /// attribute agree with the position count.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        tex_coords: Vec<Vec<[f32; 2]>>,
        indices: Vec<u16>,
        materials: Vec<Material>,
    ) -> Result<Self, MeshError> {
        let vertices = positions.len();
        if normals.len() != vertices {
            return Err(MeshError::AttributeLength {
                attribute: "normals",
                expected: vertices,
                actual: normals.len(),
            });
        }
        if let Some(channel) = tex_coords.iter().find(|c| c.len() != vertices) {
            return Err(MeshError::AttributeLength {
                attribute: "tex_coords",
                expected: vertices,
                actual: channel.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangles(indices.len()));
        }
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|(_, i)| **i as usize >= vertices)
        {
            return Err(MeshError::IndexOutOfBounds {
                position,
                index,
                vertices,
            });
        }
        if tex_coords.is_empty() && materials.iter().any(|m| m.texture_key().is_some()) {
            return Err(MeshError::MissingTexCoords);
        }

        Ok(Self {
            name: name.into(),
            positions,
            normals,
            tex_coords,
            indices,
            materials,
        })
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    /// The first UV channel, the only one the fixed-function path samples.
    pub fn tex_coords(&self) -> Option<&[[f32; 2]]> {
        self.tex_coords.first().map(Vec::as_slice)
    }

    pub fn tex_coord_channels(&self) -> usize {
        self.tex_coords.len()
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn material(&self) -> Option<&Material> {
        self.materials.first()
    }
}

/// A node of the scene graph.
#[derive(Clone, Debug, Default)]
pub struct Model {
    pub name: String,
    pub meshes: Vec<Mesh>,
    pub sub_models: Vec<Model>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_child(mut self, child: Model) -> Self {
        self.sub_models.push(child);
        self
    }

    pub fn add_mesh(&mut self, mesh: Mesh) {
        self.meshes.push(mesh);
    }

    pub fn add_child(&mut self, child: Model) {
        self.sub_models.push(child);
    }

    /// Number of meshes in this subtree.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len() + self.sub_models.iter().map(Model::mesh_count).sum::<usize>()
    }

    /// Height of the subtree; a leaf has depth 0.
    pub fn depth(&self) -> usize {
        self.sub_models
            .iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Meshes in pre-order: own meshes first, then each child subtree.
    pub fn meshes_pre_order(&self) -> Vec<&Mesh> {
        let mut out = Vec::with_capacity(self.mesh_count());
        self.collect_meshes(&mut out);
        out
    }

    fn collect_meshes<'a>(&'a self, out: &mut Vec<&'a Mesh>) {
        out.extend(self.meshes.iter());
        for child in &self.sub_models {
            child.collect_meshes(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(name: &str) -> Mesh {
        Mesh::new(
            name,
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![[0.0, 0.0, 1.0]; 3],
            vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
            vec![0, 1, 2],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_bounds_index() {
        let err = Mesh::new(
            "bad",
            vec![[0.0; 3]; 3],
            vec![[0.0; 3]; 3],
            vec![],
            vec![0, 1, 3],
            vec![],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshError::IndexOutOfBounds {
                position: 2,
                index: 3,
                vertices: 3
            }
        );
    }

    #[test]
    fn rejects_mismatched_normals() {
        let err = Mesh::new(
            "bad",
            vec![[0.0; 3]; 3],
            vec![[0.0; 3]; 2],
            vec![],
            vec![0, 1, 2],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            MeshError::AttributeLength {
                attribute: "normals",
                ..
            }
        ));
    }

    #[test]
    fn textured_material_requires_uvs() {
        let err = Mesh::new(
            "bad",
            vec![[0.0; 3]; 3],
            vec![[0.0; 3]; 3],
            vec![],
            vec![0, 1, 2],
            vec![Material::default().with_texture("brick.png")],
        )
        .unwrap_err();
        assert_eq!(err, MeshError::MissingTexCoords);

        // An empty texture name is the same as no texture.
        assert!(
            Mesh::new(
                "ok",
                vec![[0.0; 3]; 3],
                vec![[0.0; 3]; 3],
                vec![],
                vec![0, 1, 2],
                vec![Material::default().with_texture("")],
            )
            .is_ok()
        );
    }

    #[test]
    fn pre_order_and_depth() {
        let model = Model::new("root")
            .with_mesh(triangle("root"))
            .with_child(
                Model::new("a")
                    .with_mesh(triangle("a"))
                    .with_child(Model::new("a1").with_mesh(triangle("a1"))),
            )
            .with_child(Model::new("b").with_mesh(triangle("b")));

        let names: Vec<_> = model
            .meshes_pre_order()
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, ["root", "a", "a1", "b"]);
        assert_eq!(model.mesh_count(), 4);
        assert_eq!(model.depth(), 2);
        assert_eq!(Model::new("leaf").depth(), 0);
    }
}
