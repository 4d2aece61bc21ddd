//! Per-mesh draw state.
//!
//! [`DrawState`] is the small state object a mesh is drawn with: the
//! material colours and the texture to bind, if any. It is resolved from the
//! mesh and the texture cache first and only then applied to the device, so
//! what a mesh was drawn with is an explicit value rather than whatever the
//! previous mesh left behind.
//!
//! Texturing is opt-in per mesh. [`draw_mesh`] always disables it again after
//! the draw call, so a textured mesh can never leak its binding into the next
//! one.

use crate::{
    data_structures::{
        model::{Color, Material, Mesh},
        texture::TextureHandle,
    },
    device::{Capability, GraphicsDevice, MaterialParam, VertexArrays},
    resources::texture::TextureCache,
};

/// Factor mapping a `[0, 1]` material shininess onto the native exponent.
pub const SHININESS_SCALE: f32 = 128.0;

#[derive(Clone, Debug, PartialEq)]
pub struct DrawState {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    /// Native specular exponent. `None` leaves the device value untouched,
    /// which is what happens for meshes without a material.
    pub shininess: Option<f32>,
    pub texture: Option<TextureHandle>,
}

impl DrawState {
    /// Opaque white, untextured.
    pub fn unlit_white() -> Self {
        Self {
            ambient: Color::WHITE,
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            shininess: None,
            texture: None,
        }
    }

    pub fn from_material(material: &Material, cache: &TextureCache) -> Self {
        Self {
            ambient: material.ambient,
            diffuse: material.diffuse,
            specular: material.specular,
            shininess: Some(material.shininess * SHININESS_SCALE),
            texture: material.texture_key().and_then(|key| cache.get(key)),
        }
    }

    /// State for `mesh`: its first material, or opaque white without one.
    /// Additional materials are not consulted.
    pub fn for_mesh(mesh: &Mesh, cache: &TextureCache) -> Self {
        if mesh.materials.len() > 1 {
            log::trace!(
                "mesh {} has {} materials, using the first",
                mesh.name,
                mesh.materials.len()
            );
        }
        match mesh.material() {
            Some(material) => Self::from_material(material, cache),
            None => Self::unlit_white(),
        }
    }

    /// Emit the state changes on the device.
    pub fn apply<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        device.set_material_color(MaterialParam::Ambient, self.ambient);
        device.set_material_color(MaterialParam::Diffuse, self.diffuse);
        device.set_material_color(MaterialParam::Specular, self.specular);
        if let Some(shininess) = self.shininess {
            device.set_shininess(shininess);
        }
        if let Some(texture) = self.texture {
            device.enable(Capability::Texture2D);
            device.bind_texture(Some(texture));
        }
    }
}

/// Bind `mesh`'s state, submit its geometry as one indexed triangle list and
/// switch texturing off again. Returns the state the mesh was drawn with.
pub fn draw_mesh<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    cache: &TextureCache,
    mesh: &Mesh,
) -> DrawState {
    let state = DrawState::for_mesh(mesh, cache);
    state.apply(device);

    device.draw_elements(
        &mesh.name,
        VertexArrays {
            positions: mesh.positions(),
            normals: mesh.normals(),
            tex_coords: mesh.tex_coords(),
        },
        mesh.indices(),
    );

    device.disable(Capability::Texture2D);
    state
}
