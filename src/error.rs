//! Error types for texture loading, mesh construction and model import.
//!
//! Texture failures are never fatal for a frame: the caller gets one of these
//! values back and the affected mesh renders untextured. Context creation is
//! the only fatal path and uses `anyhow::Result` instead.

use std::path::PathBuf;

/// Why a texture could not be resolved or loaded.
#[derive(thiserror::Error, Debug)]
pub enum TextureError {
    /// Neither the literal path nor the `media/textures` fallback exists.
    #[error("texture not found: {path} (also tried {fallback})")]
    NotFound { path: String, fallback: PathBuf },
    #[error("unsupported texture format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// The pixel buffer could not be allocated.
    #[error("could not allocate {bytes} bytes for {path}")]
    AllocationFailure { path: PathBuf, bytes: usize },
    /// The renderer has not been initialized or was already cleaned up.
    #[error("renderer is not running, {path} was not loaded")]
    NotRunning { path: String },
    #[error("pixel buffer for {path} holds {actual} bytes, expected {expected}")]
    InvalidPixelData {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

impl TextureError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TextureError::NotFound { .. })
    }
}

/// Invalid mesh geometry.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MeshError {
    #[error("index {index} at position {position} is out of bounds for {vertices} vertices")]
    IndexOutOfBounds {
        position: usize,
        index: u16,
        vertices: usize,
    },
    #[error("{attribute} holds {actual} entries but there are {expected} vertices")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("index count {0} is not a multiple of 3")]
    NotTriangles(usize),
    #[error("a material references a texture but the mesh has no UV channel")]
    MissingTexCoords,
}

/// Failure while importing a model file.
#[derive(thiserror::Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to parse {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("mesh {name} has {vertices} vertices, more than 16-bit indices can address")]
    TooManyVertices { name: String, vertices: usize },
    #[error("mesh {name} is invalid: {source}")]
    Mesh {
        name: String,
        #[source]
        source: MeshError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_strings() {
        let e = TextureError::NotFound {
            path: "brick.png".into(),
            fallback: PathBuf::from("media/textures/brick.png"),
        };
        assert_eq!(
            e.to_string(),
            "texture not found: brick.png (also tried media/textures/brick.png)"
        );
        assert!(e.is_not_found());

        let e = TextureError::UnsupportedFormat(PathBuf::from("sky.tga"));
        assert_eq!(e.to_string(), "unsupported texture format: sky.tga");
        assert!(!e.is_not_found());

        let e = MeshError::NotTriangles(4);
        assert_eq!(e.to_string(), "index count 4 is not a multiple of 3");

        let e = MeshError::IndexOutOfBounds {
            position: 2,
            index: 9,
            vertices: 3,
        };
        assert_eq!(
            e.to_string(),
            "index 9 at position 2 is out of bounds for 3 vertices"
        );
    }
}
