use crate::{
    data_structures::model::{Color, Material, Mesh},
    error::{MeshError, ModelLoadError},
};

/// Convert an OBJ material. Missing colours fall back to the diffuse colour,
/// then to white; MTL `Ns` (0..=1000) is mapped onto `[0, 1]`.
pub fn to_material(m: &tobj::Material, texture_root: &std::path::Path) -> Material {
    let alpha = m.dissolve.unwrap_or(1.0);
    let with_alpha = |c: [f32; 3]| Color::new(c[0], c[1], c[2], alpha);
    let diffuse = m.diffuse.map(with_alpha).unwrap_or(Color::WHITE);
    Material {
        name: m.name.clone(),
        ambient: m.ambient.map(with_alpha).unwrap_or(diffuse),
        diffuse,
        specular: m.specular.map(with_alpha).unwrap_or(Color::BLACK),
        shininess: (m.shininess.unwrap_or(0.0) / 1000.0).clamp(0.0, 1.0),
        texture: m
            .diffuse_texture
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| texture_root.join(t).to_string_lossy().into_owned()),
    }
}

/// Build a [`Mesh`] from one OBJ object. Indices must already be single
/// indexed and triangulated.
pub fn to_mesh(model: &tobj::Model, materials: &[Material]) -> Result<Mesh, ModelLoadError> {
    let m = &model.mesh;
    let vertices = m.positions.len() / 3;
    if vertices > u16::MAX as usize + 1 {
        return Err(ModelLoadError::TooManyVertices {
            name: model.name.clone(),
            vertices,
        });
    }

    let positions = m
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect::<Vec<_>>();
    let normals = if m.normals.len() == m.positions.len() {
        m.normals
            .chunks_exact(3)
            .map(|n| [n[0], n[1], n[2]])
            .collect()
    } else {
        vec![[0.0, 0.0, 1.0]; vertices]
    };
    let tex_coords = if m.texcoords.len() / 2 == vertices && vertices > 0 {
        vec![m.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]).collect()]
    } else {
        Vec::new()
    };
    let indices = m.indices.iter().map(|&i| i as u16).collect();

    let mut material = m
        .material_id
        .and_then(|id| materials.get(id))
        .cloned()
        .into_iter()
        .collect::<Vec<_>>();
    if tex_coords.is_empty() {
        // Without UVs a texture cannot be sampled; keep the colours only.
        material.iter_mut().for_each(|mat| mat.texture = None);
    }

    Mesh::new(
        model.name.clone(),
        positions,
        normals,
        tex_coords,
        indices,
        material,
    )
    .map_err(|source: MeshError| ModelLoadError::Mesh {
        name: model.name.clone(),
        source,
    })
}
