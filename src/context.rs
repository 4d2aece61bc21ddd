//! Renderer configuration.
//!
//! Everything the frame controller needs to know up front lives on
//! [`RendererConfig`]; change the fields before calling
//! [`FrameController::initialize`](crate::flow::FrameController::initialize).

use std::path::PathBuf;

use crate::data_structures::model::Color;

/// Surface format requested when binding the rendering context to a window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub color_bits: u8,
    pub depth_bits: u8,
    pub double_buffered: bool,
    pub hardware_accelerated: bool,
}

impl Default for PixelFormat {
    /// 32-bit colour, 32-bit depth, double buffered, hardware accelerated.
    fn default() -> Self {
        Self {
            color_bits: 32,
            depth_bits: 32,
            double_buffered: true,
            hardware_accelerated: true,
        }
    }
}

/// Diagnostic ground grid on the y = 0 plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GridConfig {
    /// Edge length of the square the grid covers.
    pub extent: f32,
    /// Number of cells per side.
    pub divisions: u32,
    pub color: Color,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            extent: 5000.0,
            divisions: 100,
            color: Color::BLACK,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub pixel_format: PixelFormat,
    pub clear_colour: Color,
    /// Global ambient light contribution.
    pub ambient_light: Color,
    /// Directory the texture cache falls back to, relative to `search_root`.
    pub texture_dir: PathBuf,
    /// Root for fallback texture lookups. `None` means the working directory.
    pub search_root: Option<PathBuf>,
    pub grid: GridConfig,
    /// Prefix of the frame-rate string shown in the window title.
    pub title: String,
    /// Add a white directional light attached to the camera.
    pub headlight: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            clear_colour: Color::new(0.3, 0.3, 0.3, 1.0),
            ambient_light: Color::WHITE,
            texture_dir: PathBuf::from("media").join("textures"),
            search_root: None,
            grid: GridConfig::default(),
            title: "fixed-ngin".to_string(),
            headlight: false,
        }
    }
}

impl RendererConfig {
    /// The directory fallback texture paths are rooted in.
    pub fn texture_fallback_dir(&self) -> PathBuf {
        let root = self
            .search_root
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        root.join(&self.texture_dir)
    }
}
