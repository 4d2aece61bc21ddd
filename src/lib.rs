//! fixed-ngin
//!
//! A small fixed-function rendering backend. It binds a rendering context to
//! a window, loads and caches 2D textures from disk (PNG/JPEG) and draws a
//! scene graph of hierarchical models whose meshes carry per-mesh materials
//! and textures. The interesting part is how a model tree is flattened into
//! an ordered stream of stateful device calls: transform pushes and pops,
//! texture binds and material colours, each correctly nested.
//!
//! High-level modules
//! - `context`: renderer configuration (pixel format, clear colour, grid)
//! - `data_structures`: meshes, materials, models, textures, scene traversal
//! - `device`: the fixed-function device trait, a wgpu backend and a recorder
//! - `error`: texture, mesh and model loading errors
//! - `flow`: the frame controller owning device and texture cache
//! - `pipeline`: the camera pipeline contract and a cgmath camera
//! - `pipelines`: wgpu render pipelines and the shader behind `WgpuDevice`
//! - `render`: per-mesh draw state
//! - `resources`: image decoding, the texture cache and OBJ loading
//!

pub mod context;
pub mod data_structures;
pub mod device;
pub mod error;
pub mod flow;
pub mod pipeline;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use context::{GridConfig, PixelFormat, RendererConfig};
pub use data_structures::model::{Color, Material, Mesh, Model};
pub use device::{GraphicsDevice, gpu::WgpuDevice, recording::RecordingDevice};
pub use flow::{FrameController, FrameRateSink, FrameStats, FrameTimer};
pub use pipeline::{CameraPipeline, Pipeline};
pub use cgmath;
pub use winit;
