//! Fixed-function state machine emulated on wgpu.
//!
//! [`WgpuDevice`] keeps the whole classic state (capabilities, matrix stacks,
//! material colours, texture bindings) on the CPU. Every draw call snapshots
//! that state into a [`DrawUniforms`] record and appends its geometry to the
//! frame's vertex and index streams. Nothing touches the GPU until
//! [`finish`](GraphicsDevice::finish), which uploads the streams, encodes one
//! render pass and blocks until the queue is idle. `swap_buffers` then
//! presents the surface texture.
//!
//! The adapter is requested on the GL backend first and on the primary
//! backends if no GL adapter exists.

use std::{collections::HashMap, iter, mem, ops::Range, sync::Arc};

use cgmath::{Matrix, Matrix4, SquareMatrix};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    context::PixelFormat,
    data_structures::{
        model::Color,
        texture::{DecodedImage, FilterMode, PixelLayout, SamplerState, TextureHandle, WrapMode},
    },
    device::{
        Capability, ClearMask, ClientArray, CullFace, GraphicsDevice, MaterialParam, ShadeModel,
        TextureEnvMode, VertexArrays,
    },
    error::TextureError,
    pipeline::{Frustum, MatrixMode, ProjectionType, Viewport},
    pipelines::{
        self, DrawUniforms, FixedVertex, OPENGL_TO_WGPU_MATRIX, PipelineCache, PipelineKey,
    },
};

/// Deepest a matrix stack may grow, matching common driver limits.
const MAX_STACK_DEPTH: usize = 32;

/// CPU copy of the fixed-function server state.
#[derive(Debug)]
struct FixedState {
    capabilities: Vec<Capability>,
    matrix_mode: MatrixMode,
    modelview: Vec<Matrix4<f32>>,
    projection: Vec<Matrix4<f32>>,
    ambient: Color,
    diffuse: Color,
    specular: Color,
    shininess: f32,
    color: Color,
    scene_ambient: Color,
    texture_env: TextureEnvMode,
    cull_face: CullFace,
    clear_color: Color,
    viewport: Option<Viewport>,
    bound_texture: Option<TextureHandle>,
}

impl Default for FixedState {
    fn default() -> Self {
        Self {
            capabilities: Vec::new(),
            matrix_mode: MatrixMode::ModelView,
            modelview: vec![Matrix4::identity()],
            projection: vec![Matrix4::identity()],
            ambient: Color::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Color::new(0.8, 0.8, 0.8, 1.0),
            specular: Color::BLACK,
            shininess: 0.0,
            color: Color::WHITE,
            scene_ambient: Color::new(0.2, 0.2, 0.2, 1.0),
            texture_env: TextureEnvMode::Modulate,
            cull_face: CullFace::Back,
            clear_color: Color::BLACK,
            viewport: None,
            bound_texture: None,
        }
    }
}

impl FixedState {
    fn is_enabled(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn stack_mut(&mut self) -> &mut Vec<Matrix4<f32>> {
        match self.matrix_mode {
            MatrixMode::ModelView => &mut self.modelview,
            MatrixMode::Projection => &mut self.projection,
        }
    }

    /// The top of the current stack. Stacks are never empty.
    fn top_mut(&mut self) -> &mut Matrix4<f32> {
        let stack = self.stack_mut();
        let last = stack.len() - 1;
        &mut stack[last]
    }

    fn top(stack: &[Matrix4<f32>]) -> Matrix4<f32> {
        stack.last().copied().unwrap_or_else(Matrix4::identity)
    }

    fn pipeline_key(&self, lines: bool) -> PipelineKey {
        let cull = self.is_enabled(Capability::CullFace).then(|| match self.cull_face {
            CullFace::Front => wgpu::Face::Front,
            CullFace::Back => wgpu::Face::Back,
        });
        PipelineKey {
            lines,
            depth_test: self.is_enabled(Capability::DepthTest),
            cull,
        }
    }

    fn uniforms(&self, texturing: bool, headlight: bool) -> DrawUniforms {
        let modelview = Self::top(&self.modelview);
        let projection = OPENGL_TO_WGPU_MATRIX * Self::top(&self.projection);
        let normal_matrix = modelview
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(modelview);
        let replace = self.texture_env == TextureEnvMode::Replace;
        DrawUniforms {
            modelview: modelview.into(),
            projection: projection.into(),
            normal_matrix: normal_matrix.into(),
            ambient: self.ambient.to_array(),
            diffuse: self.diffuse.to_array(),
            specular: self.specular.to_array(),
            color: self.color.to_array(),
            scene_ambient: self.scene_ambient.to_array(),
            params: [self.shininess, 0.0, 0.0, 0.0],
            flags: [
                self.is_enabled(Capability::Lighting) as u32,
                texturing as u32,
                headlight as u32,
                replace as u32,
            ],
        }
    }
}

/// One draw of the frame being recorded.
#[derive(Debug)]
struct RecordedDraw {
    label: String,
    key: PipelineKey,
    texture: Option<TextureHandle>,
    base_vertex: i32,
    indices: Range<u32>,
    uniform: usize,
    viewport: Option<Viewport>,
}

#[derive(Debug, Default)]
struct FrameRecording {
    clear: Option<ClearMask>,
    vertices: Vec<FixedVertex>,
    indices: Vec<u16>,
    uniforms: Vec<DrawUniforms>,
    draws: Vec<RecordedDraw>,
}

impl FrameRecording {
    #[allow(clippy::too_many_arguments)]
    fn push(
        &mut self,
        label: &str,
        key: PipelineKey,
        texture: Option<TextureHandle>,
        uniforms: DrawUniforms,
        vertices: impl IntoIterator<Item = FixedVertex>,
        indices: &[u16],
        viewport: Option<Viewport>,
    ) {
        let base_vertex = self.vertices.len() as i32;
        self.vertices.extend(vertices);
        let first = self.indices.len() as u32;
        self.indices.extend_from_slice(indices);
        self.uniforms.push(uniforms);
        self.draws.push(RecordedDraw {
            label: label.to_string(),
            key,
            texture,
            base_vertex,
            indices: first..self.indices.len() as u32,
            uniform: self.uniforms.len() - 1,
            viewport,
        });
    }

    fn is_empty(&self) -> bool {
        self.clear.is_none() && self.draws.is_empty()
    }

    /// What to report when this frame is flushed with no surface bound.
    fn unbound_warning(&self) -> Option<String> {
        (!self.is_empty()).then(|| {
            format!(
                "no surface bound, frame with {} draws dropped",
                self.draws.len()
            )
        })
    }
}

#[derive(Debug)]
struct GpuImage {
    #[allow(unused)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// A generated texture name and whatever has been uploaded to it.
#[derive(Debug, Default)]
struct TextureSlot {
    image: Option<GpuImage>,
    sampler: SamplerState,
    bind_group: Option<wgpu::BindGroup>,
}

#[derive(Debug)]
struct SurfaceTarget {
    config: wgpu::SurfaceConfiguration,
    depth_format: wgpu::TextureFormat,
    depth_view: wgpu::TextureView,
    pipelines: PipelineCache,
}

pub struct WgpuDevice {
    window: Arc<Window>,
    surface: Option<wgpu::Surface<'static>>,
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Option<SurfaceTarget>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    white: wgpu::BindGroup,
    textures: HashMap<TextureHandle, TextureSlot>,
    next_texture: u32,
    state: FixedState,
    frame: FrameRecording,
    pending: Option<wgpu::SurfaceTexture>,
    headlight: bool,
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter.get_info().name)
            .field("textures", &self.textures.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl WgpuDevice {
    /// Create the instance, surface, adapter and device for `window`. The
    /// surface is configured later by
    /// [`bind_surface`](GraphicsDevice::bind_surface).
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let mut found = None;
        for backends in [wgpu::Backends::GL, wgpu::Backends::PRIMARY] {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends,
                ..Default::default()
            });
            let surface = instance.create_surface(window.clone())?;
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: Some(&surface),
                    force_fallback_adapter: false,
                })
                .await
                .ok();
            match adapter {
                Some(adapter) => {
                    found = Some((surface, adapter));
                    break;
                }
                None => log::warn!("no adapter on {backends:?}"),
            }
        }
        let Some((surface, adapter)) = found else {
            anyhow::bail!("no graphics adapter can present to this window");
        };
        let info = adapter.get_info();
        log::info!("using {} ({:?}, {:?})", info.name, info.backend, info.device_type);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("fixed-ngin device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
                ..Default::default()
            })
            .await?;

        let uniform_layout = pipelines::uniform_layout(&device);
        let texture_layout = pipelines::texture_layout(&device);
        let white = white_bind_group(&device, &queue, &texture_layout);

        Ok(Self {
            window,
            surface: Some(surface),
            adapter,
            device,
            queue,
            target: None,
            uniform_layout,
            texture_layout,
            white,
            textures: HashMap::new(),
            next_texture: 1,
            state: FixedState::default(),
            frame: FrameRecording::default(),
            pending: None,
            headlight: false,
        })
    }

    /// Light lit geometry with a white directional light looking down the
    /// view axis, in addition to the global ambient term.
    pub fn set_headlight(&mut self, enabled: bool) {
        self.headlight = enabled;
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn choose_color_format(
        caps: &wgpu::SurfaceCapabilities,
        color_bits: u8,
    ) -> anyhow::Result<wgpu::TextureFormat> {
        let wanted: &[wgpu::TextureFormat] = match color_bits {
            24 | 32 => &[
                wgpu::TextureFormat::Bgra8Unorm,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureFormat::Bgra8UnormSrgb,
                wgpu::TextureFormat::Rgba8UnormSrgb,
            ],
            64 => &[wgpu::TextureFormat::Rgba16Float],
            bits => anyhow::bail!("unsupported colour depth of {bits} bits"),
        };
        wanted
            .iter()
            .copied()
            .find(|format| caps.formats.contains(format))
            .ok_or_else(|| anyhow::anyhow!("surface has no {color_bits}-bit colour format"))
    }

    fn choose_depth_format(depth_bits: u8) -> anyhow::Result<wgpu::TextureFormat> {
        match depth_bits {
            32 => Ok(wgpu::TextureFormat::Depth32Float),
            24 => Ok(wgpu::TextureFormat::Depth24Plus),
            16 => Ok(wgpu::TextureFormat::Depth16Unorm),
            bits => anyhow::bail!("unsupported depth buffer of {bits} bits"),
        }
    }

    fn record_triangles(&mut self, label: &str, arrays: VertexArrays<'_>, indices: &[u16]) {
        let texture = self
            .state
            .bound_texture
            .filter(|_| self.state.is_enabled(Capability::Texture2D))
            .filter(|handle| {
                self.textures
                    .get(handle)
                    .is_some_and(|slot| slot.bind_group.is_some())
            });
        let texturing = texture.is_some() && arrays.tex_coords.is_some();
        let uniforms = self.state.uniforms(texturing, self.headlight);
        let key = self.state.pipeline_key(false);
        let vertices = arrays
            .positions
            .iter()
            .enumerate()
            .map(|(i, position)| FixedVertex {
                position: *position,
                normal: arrays.normals.get(i).copied().unwrap_or([0.0, 0.0, 1.0]),
                tex_coords: arrays
                    .tex_coords
                    .and_then(|uv| uv.get(i).copied())
                    .unwrap_or_default(),
            });
        self.frame.push(
            label,
            key,
            texture.filter(|_| texturing),
            uniforms,
            vertices,
            indices,
            self.state.viewport,
        );
    }

    /// Encode and submit everything recorded since the last flush. Returns
    /// the surface texture to present, if one was acquired.
    fn flush(&mut self) -> Option<wgpu::SurfaceTexture> {
        let frame = mem::take(&mut self.frame);
        let (Some(target), Some(surface)) = (self.target.as_mut(), self.surface.as_ref()) else {
            if let Some(message) = frame.unbound_warning() {
                log::warn!("{message}");
            }
            return None;
        };
        let acquired = surface.get_current_texture();
        let output = match acquired {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.device, &target.config);
                log::warn!("surface lost, frame dropped");
                return None;
            }
            Err(e) => {
                log::error!("Unable to render {e}");
                return None;
            }
        };

        for draw in &frame.draws {
            target.pipelines.prepare(&self.device, draw.key);
        }

        let uniform_size = mem::size_of::<DrawUniforms>();
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment as usize;
        let stride = uniform_size.div_ceil(alignment) * alignment;
        let uniform_bind_group = (!frame.uniforms.is_empty()).then(|| {
            let mut bytes = vec![0u8; stride * frame.uniforms.len()];
            for (i, uniforms) in frame.uniforms.iter().enumerate() {
                bytes[i * stride..i * stride + uniform_size]
                    .copy_from_slice(bytemuck::bytes_of(uniforms));
            }
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Draw Uniforms"),
                    contents: &bytes,
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(uniform_size as u64),
                    }),
                }],
                label: Some("draw_uniform_bind_group"),
            })
        });
        let geometry = (!frame.vertices.is_empty() && !frame.indices.is_empty()).then(|| {
            let vertices = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Frame Vertices"),
                    contents: bytemuck::cast_slice(&frame.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
            let indices = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Frame Indices"),
                    contents: bytemuck::cast_slice(&frame.indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
            (vertices, indices)
        });

        let clear = frame.clear.unwrap_or(ClearMask {
            color: false,
            depth: false,
        });
        let color_load = if clear.color {
            let c = self.state.clear_color;
            wgpu::LoadOp::Clear(wgpu::Color {
                r: c.r as f64,
                g: c.g as f64,
                b: c.b as f64,
                a: c.a as f64,
            })
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if clear.depth {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height) = (target.config.width as f32, target.config.height as f32);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Fixed Function Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let (Some(uniforms), Some((vertices, indices))) = (&uniform_bind_group, &geometry) {
                render_pass.set_vertex_buffer(0, vertices.slice(..));
                render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                for draw in &frame.draws {
                    let Some(pipeline) = target.pipelines.get(&draw.key) else {
                        continue;
                    };
                    render_pass.push_debug_group(&draw.label);
                    render_pass.set_pipeline(pipeline);
                    let (x, y, w, h) = clamp_viewport(draw.viewport, width, height);
                    render_pass.set_viewport(x, y, w, h, 0.0, 1.0);
                    render_pass.set_bind_group(0, uniforms, &[(draw.uniform * stride) as u32]);
                    let texture = draw
                        .texture
                        .and_then(|handle| self.textures.get(&handle))
                        .and_then(|slot| slot.bind_group.as_ref())
                        .unwrap_or(&self.white);
                    render_pass.set_bind_group(1, texture, &[]);
                    render_pass.draw_indexed(draw.indices.clone(), draw.base_vertex, 0..1);
                    render_pass.pop_debug_group();
                }
            }
        }

        self.queue.submit(iter::once(encoder.finish()));
        Some(output)
    }

    fn rebuild_bind_group(&mut self, texture: TextureHandle) {
        let Some(slot) = self.textures.get_mut(&texture) else {
            return;
        };
        let Some(image) = &slot.image else {
            return;
        };
        let sampler = create_sampler(&self.device, slot.sampler);
        slot.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
            label: Some("texture_bind_group"),
        }));
    }
}

impl GraphicsDevice for WgpuDevice {
    fn bind_surface(&mut self, format: &PixelFormat) -> anyhow::Result<()> {
        let Some(surface) = &self.surface else {
            anyhow::bail!("rendering context has been destroyed");
        };
        let info = self.adapter.get_info();
        if format.hardware_accelerated && info.device_type == wgpu::DeviceType::Cpu {
            anyhow::bail!("{} is a software adapter", info.name);
        }

        let caps = surface.get_capabilities(&self.adapter);
        let color_format = Self::choose_color_format(&caps, format.color_bits)?;
        let depth_format = Self::choose_depth_format(format.depth_bits)?;
        let (present_mode, latency) = if format.double_buffered {
            (wgpu::PresentMode::Fifo, 2)
        } else if caps.present_modes.contains(&wgpu::PresentMode::Immediate) {
            (wgpu::PresentMode::Immediate, 1)
        } else {
            (wgpu::PresentMode::Fifo, 1)
        };

        let size = self.window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: color_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: latency,
        };
        surface.configure(&self.device, &config);

        let depth_view =
            create_depth_view(&self.device, depth_format, [config.width, config.height]);
        let pipelines = PipelineCache::new(
            &self.device,
            &self.uniform_layout,
            &self.texture_layout,
            color_format,
            depth_format,
        );
        log::info!(
            "surface bound: {color_format:?}/{depth_format:?} {}x{} {present_mode:?}",
            config.width,
            config.height
        );
        self.target = Some(SurfaceTarget {
            config,
            depth_format,
            depth_view,
            pipelines,
        });
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let (Some(surface), Some(target)) = (&self.surface, &mut self.target) else {
            return;
        };
        self.pending = None;
        target.config.width = width;
        target.config.height = height;
        surface.configure(&self.device, &target.config);
        target.depth_view = create_depth_view(&self.device, target.depth_format, [width, height]);
    }

    fn hide_cursor(&mut self) {
        self.window.set_cursor_visible(false);
    }

    fn enable(&mut self, capability: Capability) {
        if !self.state.is_enabled(capability) {
            self.state.capabilities.push(capability);
        }
    }

    fn disable(&mut self, capability: Capability) {
        self.state.capabilities.retain(|c| *c != capability);
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        self.state.is_enabled(capability)
    }

    // Vertex, normal and texture coordinate arrays are always interleaved.
    fn enable_client_array(&mut self, _array: ClientArray) {}

    // Normals are interpolated per fragment in either model.
    fn set_shade_model(&mut self, _model: ShadeModel) {}

    fn set_cull_face(&mut self, face: CullFace) {
        self.state.cull_face = face;
    }

    fn set_clear_color(&mut self, color: Color) {
        self.state.clear_color = color;
    }

    fn set_light_model_ambient(&mut self, color: Color) {
        self.state.scene_ambient = color;
    }

    fn set_texture_env(&mut self, mode: TextureEnvMode) {
        self.state.texture_env = mode;
    }

    fn clear(&mut self, mask: ClearMask) {
        // A clear discards whatever was drawn before it in the frame.
        self.frame.draws.clear();
        self.frame.vertices.clear();
        self.frame.indices.clear();
        self.frame.uniforms.clear();
        let previous = self.frame.clear.unwrap_or(ClearMask {
            color: false,
            depth: false,
        });
        self.frame.clear = Some(ClearMask {
            color: previous.color || mask.color,
            depth: previous.depth || mask.depth,
        });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.state.viewport = Some(viewport);
    }

    fn set_matrix_mode(&mut self, mode: MatrixMode) {
        self.state.matrix_mode = mode;
    }

    fn push_matrix(&mut self) -> bool {
        let stack = self.state.stack_mut();
        if stack.len() >= MAX_STACK_DEPTH {
            log::error!("matrix stack overflow");
            return false;
        }
        let top = FixedState::top(stack);
        stack.push(top);
        true
    }

    fn pop_matrix(&mut self) {
        let stack = self.state.stack_mut();
        if stack.len() <= 1 {
            log::error!("matrix stack underflow");
            return;
        }
        stack.pop();
    }

    fn load_identity(&mut self) {
        *self.state.top_mut() = Matrix4::identity();
    }

    fn mult_matrix(&mut self, matrix: &[f32; 16]) {
        let m = from_column_major(matrix);
        let top = self.state.top_mut();
        *top = *top * m;
    }

    fn frustum(&mut self, frustum: &Frustum) {
        let top = self.state.top_mut();
        *top = *top * frustum.to_matrix(ProjectionType::Perspective);
    }

    fn ortho(&mut self, frustum: &Frustum) {
        let top = self.state.top_mut();
        *top = *top * frustum.to_matrix(ProjectionType::Orthographic);
    }

    fn set_material_color(&mut self, param: MaterialParam, color: Color) {
        match param {
            MaterialParam::Ambient => self.state.ambient = color,
            MaterialParam::Diffuse => self.state.diffuse = color,
            MaterialParam::Specular => self.state.specular = color,
        }
    }

    fn set_shininess(&mut self, shininess: f32) {
        self.state.shininess = shininess.clamp(0.0, 128.0);
    }

    fn set_color(&mut self, color: Color) {
        self.state.color = color;
    }

    fn gen_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, TextureSlot::default());
        handle
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.state.bound_texture = texture;
    }

    fn upload_mipmapped(
        &mut self,
        texture: TextureHandle,
        image: &DecodedImage,
    ) -> Result<(), TextureError> {
        let levels = mip_chain(image)?;
        let limit = self.device.limits().max_texture_dimension_2d;
        if image.width > limit || image.height > limit {
            return Err(TextureError::AllocationFailure {
                path: image.path.clone(),
                bytes: image.pixels.len(),
            });
        }

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: image.path.to_str(),
            size,
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (level, pixels) in levels.iter().enumerate() {
            let (width, height) = pixels.dimensions();
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &gpu_texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                },
                pixels.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.entry(texture).or_default().image = Some(GpuImage {
            texture: gpu_texture,
            view,
        });
        self.rebuild_bind_group(texture);
        Ok(())
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState) {
        if let Some(slot) = self.textures.get_mut(&texture) {
            slot.sampler = sampler;
            self.rebuild_bind_group(texture);
        }
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        if self.state.bound_texture == Some(texture) {
            self.state.bound_texture = None;
        }
    }

    fn draw_elements(&mut self, label: &str, arrays: VertexArrays<'_>, indices: &[u16]) {
        if indices.is_empty() {
            return;
        }
        self.record_triangles(label, arrays, indices);
    }

    fn draw_lines(&mut self, vertices: &[[f32; 3]]) {
        let uniforms = self.state.uniforms(false, self.headlight);
        let key = self.state.pipeline_key(true);
        // Pairs of vertices, chunked so local indices fit in u16.
        for chunk in vertices.chunks(u16::MAX as usize - 1) {
            let chunk = &chunk[..chunk.len() & !1];
            let indices = (0..chunk.len() as u16).collect::<Vec<_>>();
            self.frame.push(
                "lines",
                key,
                None,
                uniforms,
                chunk.iter().map(|p| FixedVertex {
                    position: *p,
                    normal: [0.0, 0.0, 1.0],
                    tex_coords: [0.0, 0.0],
                }),
                &indices,
                self.state.viewport,
            );
        }
    }

    fn finish(&mut self) {
        if self.pending.is_none() && !self.frame.is_empty() {
            self.pending = self.flush();
        }
        if let Err(e) = self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::error!("waiting for the GPU failed: {e}");
        }
    }

    fn swap_buffers(&mut self) {
        if self.pending.is_none() {
            self.pending = self.flush();
        }
        if let Some(output) = self.pending.take() {
            self.window.pre_present_notify();
            output.present();
        }
    }

    fn destroy_context(&mut self) {
        self.pending = None;
        self.frame = FrameRecording::default();
        self.textures.clear();
        self.target = None;
        self.surface = None;
        log::info!("rendering context destroyed");
    }
}

fn from_column_major(m: &[f32; 16]) -> Matrix4<f32> {
    Matrix4::from([
        [m[0], m[1], m[2], m[3]],
        [m[4], m[5], m[6], m[7]],
        [m[8], m[9], m[10], m[11]],
        [m[12], m[13], m[14], m[15]],
    ])
}

/// Map a bottom-left-origin viewport to wgpu's top-left origin, clipped to
/// the render target.
fn clamp_viewport(viewport: Option<Viewport>, width: f32, height: f32) -> (f32, f32, f32, f32) {
    let Some(v) = viewport else {
        return (0.0, 0.0, width, height);
    };
    let x = v.x.clamp(0.0, width);
    let top = (height - v.y - v.height).clamp(0.0, height);
    let w = v.width.min(width - x).max(1.0);
    let h = v.height.min(height - top).max(1.0);
    (x, top, w.min(width), h.min(height))
}

/// Level 0 and every smaller level down to 1x1, as RGBA8.
pub(crate) fn mip_chain(image: &DecodedImage) -> Result<Vec<image::RgbaImage>, TextureError> {
    let expected = image.expected_len().ok_or(TextureError::AllocationFailure {
        path: image.path.clone(),
        bytes: usize::MAX,
    })?;
    if expected != image.pixels.len() {
        return Err(TextureError::InvalidPixelData {
            path: image.path.clone(),
            expected,
            actual: image.pixels.len(),
        });
    }
    let invalid = || TextureError::InvalidPixelData {
        path: image.path.clone(),
        expected,
        actual: image.pixels.len(),
    };
    let base = match image.layout {
        PixelLayout::Rgba8 => {
            image::RgbaImage::from_raw(image.width, image.height, image.pixels.clone())
                .ok_or_else(invalid)?
        }
        PixelLayout::Rgb8 => {
            let rgb = image::RgbImage::from_raw(image.width, image.height, image.pixels.clone())
                .ok_or_else(invalid)?;
            image::DynamicImage::ImageRgb8(rgb).into_rgba8()
        }
    };

    let mut levels = Vec::with_capacity(image.mip_level_count() as usize);
    for level in 1..image.mip_level_count() {
        let width = (image.width >> level).max(1);
        let height = (image.height >> level).max(1);
        levels.push(image::imageops::resize(
            &base,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ));
    }
    levels.insert(0, base);
    Ok(levels)
}

fn create_depth_view(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    size: [u32; 2],
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_sampler(device: &wgpu::Device, sampler: SamplerState) -> wgpu::Sampler {
    let address = |wrap| match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    };
    let filter = |filter| match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture_sampler"),
        address_mode_u: address(sampler.wrap_s),
        address_mode_v: address(sampler.wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: filter(sampler.mag_filter),
        min_filter: filter(sampler.min_filter),
        mipmap_filter: sampler
            .mipmap_filter
            .map(filter)
            .unwrap_or(wgpu::FilterMode::Nearest),
        lod_min_clamp: 0.0,
        lod_max_clamp: if sampler.mipmap_filter.is_some() {
            32.0
        } else {
            0.0
        },
        ..Default::default()
    })
}

/// Bound when texturing is off so the texture group is always populated.
fn white_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    let size = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("white"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(device, SamplerState::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
        label: Some("white_bind_group"),
    })
}
