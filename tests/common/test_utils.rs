#![allow(dead_code)]

use std::{
    cell::Cell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use fixed_ngin::{
    Material, Mesh, Model,
    cgmath::{Matrix4, Vector3},
    data_structures::texture::{DecodedImage, PixelLayout},
    error::TextureError,
    flow::FrameRateSink,
    pipeline::{Frustum, MatrixMode, Pipeline, ProjectionType, Viewport},
    resources::texture::ImageDecoder,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create an empty file (and its parents) at `relative` under `dir`.
pub fn touch(dir: &Path, relative: &str) -> PathBuf {
    let path = dir.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"").unwrap();
    path
}

/// Decoder that never reads the file and counts how often it is asked to.
#[derive(Clone)]
pub struct CountingDecoder {
    pub calls: Rc<Cell<usize>>,
    pub width: u32,
    pub height: u32,
    /// Bytes to drop from the end of every pixel buffer.
    pub truncate: usize,
}

impl CountingDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Rc::new(Cell::new(0)),
            width,
            height,
            truncate: 0,
        }
    }

    fn decode(&self, path: &Path, layout: PixelLayout) -> DecodedImage {
        self.calls.set(self.calls.get() + 1);
        let len = self.width as usize * self.height as usize * layout.channels() as usize;
        DecodedImage {
            path: path.to_path_buf(),
            width: self.width,
            height: self.height,
            layout,
            pixels: vec![128; len.saturating_sub(self.truncate)],
        }
    }
}

impl ImageDecoder for CountingDecoder {
    fn decode_png(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        Ok(self.decode(path, PixelLayout::Rgba8))
    }

    fn decode_jpeg(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        Ok(self.decode(path, PixelLayout::Rgb8))
    }
}

/// One triangle with a UV channel.
pub fn triangle(name: &str, materials: Vec<Material>) -> Mesh {
    Mesh::new(
        name,
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![[0.0, 0.0, 1.0]; 3],
        vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
        vec![0, 1, 2],
        materials,
    )
    .unwrap()
}

pub fn textured(name: &str, texture: &str) -> Mesh {
    triangle(name, vec![Material::opaque_white().with_texture(texture)])
}

/// A linear chain `depth` levels deep with one mesh per node.
pub fn chain(depth: usize) -> Model {
    let mut model = Model::new(format!("node{depth}")).with_mesh(triangle(&format!("mesh{depth}"), vec![]));
    for level in (0..depth).rev() {
        model = Model::new(format!("node{level}"))
            .with_mesh(triangle(&format!("mesh{level}"), vec![]))
            .with_child(model);
    }
    model
}

/// A pipeline with a fixed translation as its MODELVIEW matrix.
pub struct StaticPipeline {
    pub projection: ProjectionType,
    pub translation: Vector3<f32>,
}

impl StaticPipeline {
    pub fn perspective() -> Self {
        Self {
            projection: ProjectionType::Perspective,
            translation: Vector3::new(0.0, 0.0, -10.0),
        }
    }

    pub fn orthographic() -> Self {
        Self {
            projection: ProjectionType::Orthographic,
            ..Self::perspective()
        }
    }
}

impl Pipeline for StaticPipeline {
    fn viewport_info(&self) -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: 800.0,
            height: 600.0,
        }
    }

    fn frustum_info(&self) -> Frustum {
        Frustum {
            left: -1.0,
            right: 1.0,
            bottom: -0.75,
            top: 0.75,
            near: 1.0,
            far: 1000.0,
        }
    }

    fn projection_type(&self) -> ProjectionType {
        self.projection
    }

    fn matrix(&self, mode: MatrixMode) -> Matrix4<f32> {
        match mode {
            MatrixMode::ModelView => Matrix4::from_translation(self.translation),
            MatrixMode::Projection => self.frustum_info().to_matrix(self.projection),
        }
    }
}

#[derive(Default)]
pub struct CollectingSink {
    pub reports: Vec<u32>,
}

impl FrameRateSink for CollectingSink {
    fn report_frame_rate(&mut self, frames_per_second: u32) {
        self.reports.push(frames_per_second);
    }
}
