//! Loading textures and models from external files.
//!
//! - `texture` holds the image decoders and the path-keyed texture cache
//! - `mesh` converts OBJ objects and materials into engine meshes

use std::path::Path;

use crate::{data_structures::model::Model, error::ModelLoadError};

pub mod mesh;
pub mod texture;

/// Load an OBJ file (plus its MTL library, if any) as a model tree: a root
/// without meshes, named after the file, with one child per OBJ object in
/// file order.
///
/// Objects that cannot be represented (too many vertices for 16-bit indices,
/// inconsistent attributes) are skipped with a warning. Texture paths in the
/// MTL file are made relative to the OBJ file's directory; the textures
/// themselves are not loaded here.
pub fn load_model_obj(path: impl AsRef<Path>) -> Result<Model, ModelLoadError> {
    let path = path.as_ref();
    let (models, obj_materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|source| ModelLoadError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let texture_root = path.parent().unwrap_or(Path::new(""));
    let materials = match obj_materials {
        Ok(materials) => materials
            .iter()
            .map(|m| mesh::to_material(m, texture_root))
            .collect::<Vec<_>>(),
        Err(e) => {
            log::warn!("{}: material library not loaded: {e}", path.display());
            Vec::new()
        }
    };

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut root = Model::new(name);
    for (idx, obj) in models.iter().enumerate() {
        match mesh::to_mesh(obj, &materials) {
            Ok(mesh) => root.add_child(Model::new(obj.name.clone()).with_mesh(mesh)),
            Err(e) => log::warn!(
                "object {idx} ({}) in {} skipped: {e}",
                obj.name,
                path.display()
            ),
        }
    }
    log::info!(
        "loaded {} with {} objects and {} materials",
        path.display(),
        root.sub_models.len(),
        materials.len()
    );
    Ok(root)
}
