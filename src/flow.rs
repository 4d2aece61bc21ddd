//! Frame lifecycle.
//!
//! [`FrameController`] owns the graphics device and the texture cache and is
//! the only entry point applications talk to. A session looks like this:
//!
//! 1. `initialize()` once, after the window exists
//! 2. per frame: `pre_update()`, any number of `draw_model()`/`draw_grid()`,
//!    then `post_update()` which blocks until the GPU is done and presents
//! 3. `cleanup()` once, which deletes every texture and then the context
//!
//! Everything runs on the thread that owns the device.

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::window::Window;

use crate::{
    context::RendererConfig,
    data_structures::{model::Model, scene_graph, texture::TextureHandle},
    device::{
        Capability, ClearMask, ClientArray, CullFace, GraphicsDevice, ShadeModel, TextureEnvMode,
    },
    error::TextureError,
    pipeline::{MatrixMode, Pipeline, ProjectionType},
    resources::texture::{BatchReport, ImageDecoder, TextureCache},
};

/// Timing of the frame that just ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameStats {
    pub frame_time: Duration,
    pub fps: u32,
}

/// Measures frame times and a frame rate averaged over one-second windows.
#[derive(Debug)]
pub struct FrameTimer {
    last_frame: Instant,
    window_start: Instant,
    frames_in_window: u32,
    fps: u32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            window_start: now,
            frames_in_window: 0,
            fps: 0,
        }
    }

    /// Mark the end of a frame.
    pub fn tick(&mut self) -> FrameStats {
        let now = Instant::now();
        let frame_time = now - self.last_frame;
        self.last_frame = now;
        self.frames_in_window += 1;

        let window = now - self.window_start;
        if window >= Duration::from_secs(1) {
            self.fps = (self.frames_in_window as f64 / window.as_secs_f64()).round() as u32;
            self.frames_in_window = 0;
            self.window_start = now;
        } else if self.fps == 0 && !frame_time.is_zero() {
            // No full window yet, estimate from the single frame.
            self.fps = (1.0 / frame_time.as_secs_f64()).round() as u32;
        }

        FrameStats {
            frame_time,
            fps: self.fps,
        }
    }
}

/// Where the frame rate is reported after every presented frame.
pub trait FrameRateSink {
    fn report_frame_rate(&mut self, frames_per_second: u32);
}

/// Sends the frame rate to the log at debug level.
#[derive(Debug, Default)]
pub struct LogSink;

impl FrameRateSink for LogSink {
    fn report_frame_rate(&mut self, frames_per_second: u32) {
        log::debug!("{frames_per_second}fps");
    }
}

/// Shows `"<prefix>: <fps>fps"` in the window title.
#[derive(Debug)]
pub struct WindowTitleSink {
    window: Arc<Window>,
    prefix: String,
    last: Option<u32>,
}

impl WindowTitleSink {
    pub fn new(window: Arc<Window>, prefix: impl Into<String>) -> Self {
        Self {
            window,
            prefix: prefix.into(),
            last: None,
        }
    }
}

impl FrameRateSink for WindowTitleSink {
    fn report_frame_rate(&mut self, frames_per_second: u32) {
        if self.last == Some(frames_per_second) {
            return;
        }
        self.last = Some(frames_per_second);
        self.window
            .set_title(&format!("{}: {}fps", self.prefix, frames_per_second));
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    CleanedUp,
}

#[derive(Debug)]
pub struct FrameController<D: GraphicsDevice> {
    device: D,
    textures: TextureCache,
    config: RendererConfig,
    lifecycle: Lifecycle,
}

impl<D: GraphicsDevice> FrameController<D> {
    pub fn new(device: D, config: RendererConfig) -> Self {
        let textures = TextureCache::new(config.texture_fallback_dir());
        Self {
            device,
            textures,
            config,
            lifecycle: Lifecycle::Created,
        }
    }

    /// Like [`new`](Self::new) with a custom image decoder.
    pub fn with_decoder(device: D, config: RendererConfig, decoder: Box<dyn ImageDecoder>) -> Self {
        let textures = TextureCache::with_decoder(config.texture_fallback_dir(), decoder);
        Self {
            device,
            textures,
            config,
            lifecycle: Lifecycle::Created,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Bind the context to the window surface and set up the fixed state
    /// every frame relies on. Errors here are fatal for the session.
    pub fn initialize(&mut self) -> anyhow::Result<()> {
        if self.lifecycle != Lifecycle::Created {
            anyhow::bail!("renderer already initialized ({:?})", self.lifecycle);
        }
        let d = &mut self.device;
        d.bind_surface(&self.config.pixel_format)?;
        d.hide_cursor();

        d.set_shade_model(ShadeModel::Smooth);
        d.enable(Capability::DepthTest);
        d.enable(Capability::CullFace);
        d.set_cull_face(CullFace::Back);
        d.set_clear_color(self.config.clear_colour);

        d.enable(Capability::ColorMaterial);
        d.enable(Capability::Lighting);
        d.set_light_model_ambient(self.config.ambient_light);
        d.set_texture_env(TextureEnvMode::Modulate);

        d.enable_client_array(ClientArray::Vertex);
        d.enable_client_array(ClientArray::Normal);
        d.enable_client_array(ClientArray::TexCoord);

        self.lifecycle = Lifecycle::Running;
        log::info!("renderer initialized");
        Ok(())
    }

    fn running(&self, op: &str) -> bool {
        let running = self.lifecycle == Lifecycle::Running;
        if !running {
            log::error!("{op} called while renderer is {:?}, skipping", self.lifecycle);
        }
        running
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.running("resize") {
            self.device.resize_surface(width, height);
        }
    }

    pub fn update_viewport(&mut self, pipeline: &dyn Pipeline) {
        if self.running("update_viewport") {
            self.device.set_viewport(pipeline.viewport_info());
        }
    }

    /// Load the pipeline's frustum into the PROJECTION stack.
    pub fn update_projection(&mut self, pipeline: &dyn Pipeline) {
        if !self.running("update_projection") {
            return;
        }
        let frustum = pipeline.frustum_info();
        self.device.set_matrix_mode(MatrixMode::Projection);
        self.device.load_identity();
        match pipeline.projection_type() {
            ProjectionType::Perspective => self.device.frustum(&frustum),
            ProjectionType::Orthographic => self.device.ortho(&frustum),
        }
        self.device.set_matrix_mode(MatrixMode::ModelView);
    }

    pub fn pre_update(&mut self) {
        if self.running("pre_update") {
            self.device.clear(ClearMask::COLOR_DEPTH);
        }
    }

    /// Block until the GPU has finished the frame, present it and report the
    /// frame rate. The blocking flush is the frame boundary.
    pub fn post_update(&mut self, stats: &FrameStats, sink: &mut dyn FrameRateSink) {
        if !self.running("post_update") {
            return;
        }
        self.device.finish();
        self.device.swap_buffers();
        sink.report_frame_rate(stats.fps);
    }

    pub fn draw_model(&mut self, model: &Model, pipeline: Option<&dyn Pipeline>) {
        if self.running("draw_model") {
            scene_graph::draw_model(&mut self.device, &self.textures, model, pipeline);
        }
    }

    pub fn draw_grid(&mut self, pipeline: Option<&dyn Pipeline>) {
        if self.running("draw_grid") {
            scene_graph::draw_grid(&mut self.device, pipeline, &self.config.grid);
        }
    }

    pub fn load_texture(&mut self, path: &str) -> Result<TextureHandle, TextureError> {
        if !self.running("load_texture") {
            return Err(TextureError::NotRunning {
                path: path.to_string(),
            });
        }
        self.textures.load(&mut self.device, path)
    }

    /// Outside the running state every path is reported as failed.
    pub fn load_textures<I, S>(&mut self, paths: I) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.running("load_textures") {
            let failed = paths
                .into_iter()
                .map(|path| {
                    let path = path.as_ref().to_string();
                    (path.clone(), TextureError::NotRunning { path })
                })
                .collect();
            return BatchReport {
                loaded: Vec::new(),
                failed,
            };
        }
        self.textures.load_batch(&mut self.device, paths)
    }

    /// Load every texture referenced by the first material of each mesh in
    /// the tree.
    pub fn load_model_textures(&mut self, model: &Model) -> BatchReport {
        let paths = model
            .meshes_pre_order()
            .into_iter()
            .filter_map(|mesh| mesh.material().and_then(|m| m.texture_key()))
            .map(str::to_string)
            .collect::<Vec<_>>();
        self.load_textures(paths)
    }

    /// Delete all textures, unbind, and destroy the context. Calling it again
    /// does nothing.
    pub fn cleanup(&mut self) {
        if self.lifecycle == Lifecycle::CleanedUp {
            log::warn!("cleanup called twice, ignoring");
            return;
        }
        self.textures.release_all(&mut self.device);
        self.device.bind_texture(None);
        self.device.destroy_context();
        self.lifecycle = Lifecycle::CleanedUp;
        log::info!("renderer cleaned up");
    }
}
