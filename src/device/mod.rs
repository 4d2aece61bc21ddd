//! The fixed-function graphics API the renderer drives.
//!
//! [`GraphicsDevice`] is a stateful command surface in the classic
//! fixed-function style: capabilities are toggled on and off, transforms live
//! on per-mode matrix stacks, colour-material state is set before geometry is
//! submitted, and textures are addressed through opaque names. Every call
//! mutates device state and runs to completion before the next one; nothing
//! here is meant to be shared between threads.
//!
//! Two implementations ship with the crate:
//!
//! - [`gpu::WgpuDevice`] emulates the state machine on top of wgpu and
//!   presents to a winit window.
//! - [`recording::RecordingDevice`] records every call and tracks the
//!   resulting state without touching a GPU.

pub mod gpu;
pub mod recording;

use crate::{
    context::PixelFormat,
    data_structures::{
        model::Color,
        texture::{DecodedImage, SamplerState, TextureHandle},
    },
    error::TextureError,
    pipeline::{Frustum, MatrixMode, Viewport},
};

/// Server-side state that can be switched on and off.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
    Lighting,
    ColorMaterial,
    Texture2D,
}

/// Vertex attribute arrays fed to indexed draws.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClientArray {
    Vertex,
    Normal,
    TexCoord,
}

/// Material property the current colour is routed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MaterialParam {
    Ambient,
    Diffuse,
    Specular,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadeModel {
    Flat,
    Smooth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CullFace {
    Front,
    Back,
}

/// How a bound texture combines with the lit fragment colour.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureEnvMode {
    Modulate,
    Replace,
}

/// Buffers cleared by [`GraphicsDevice::clear`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_DEPTH: ClearMask = ClearMask {
        color: true,
        depth: true,
    };
}

/// Client-side vertex data for one indexed draw.
#[derive(Copy, Clone, Debug)]
pub struct VertexArrays<'a> {
    pub positions: &'a [[f32; 3]],
    pub normals: &'a [[f32; 3]],
    pub tex_coords: Option<&'a [[f32; 2]]>,
}

pub trait GraphicsDevice {
    /// Bind the rendering context to its window surface with the requested
    /// pixel format. Failure leaves the device unusable.
    fn bind_surface(&mut self, format: &PixelFormat) -> anyhow::Result<()>;

    fn resize_surface(&mut self, width: u32, height: u32);

    fn hide_cursor(&mut self);

    fn enable(&mut self, capability: Capability);

    fn disable(&mut self, capability: Capability);

    fn is_enabled(&self, capability: Capability) -> bool;

    fn enable_client_array(&mut self, array: ClientArray);

    fn set_shade_model(&mut self, model: ShadeModel);

    fn set_cull_face(&mut self, face: CullFace);

    fn set_clear_color(&mut self, color: Color);

    /// Global ambient light applied to every lit fragment.
    fn set_light_model_ambient(&mut self, color: Color);

    fn set_texture_env(&mut self, mode: TextureEnvMode);

    fn clear(&mut self, mask: ClearMask);

    fn set_viewport(&mut self, viewport: Viewport);

    fn set_matrix_mode(&mut self, mode: MatrixMode);

    /// Duplicate the top of the current matrix stack. Returns `false` when
    /// the stack is full and nothing was pushed.
    fn push_matrix(&mut self) -> bool;

    fn pop_matrix(&mut self);

    fn load_identity(&mut self);

    /// Multiply the top of the current stack by a column-major matrix.
    fn mult_matrix(&mut self, matrix: &[f32; 16]);

    fn frustum(&mut self, frustum: &Frustum);

    fn ortho(&mut self, frustum: &Frustum);

    /// Route `color` into the given front-face material property.
    fn set_material_color(&mut self, param: MaterialParam, color: Color);

    /// Specular exponent, in the native `[0, 128]` range.
    fn set_shininess(&mut self, shininess: f32);

    /// Current colour, used for unlit geometry.
    fn set_color(&mut self, color: Color);

    fn gen_texture(&mut self) -> TextureHandle;

    /// Bind a texture for subsequent draws, `None` unbinds.
    fn bind_texture(&mut self, texture: Option<TextureHandle>);

    /// Upload `image` as level 0 and build the full mip chain from it.
    fn upload_mipmapped(
        &mut self,
        texture: TextureHandle,
        image: &DecodedImage,
    ) -> Result<(), TextureError>;

    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState);

    fn delete_texture(&mut self, texture: TextureHandle);

    /// Submit an indexed triangle list using the current state.
    fn draw_elements(&mut self, label: &str, arrays: VertexArrays<'_>, indices: &[u16]);

    /// Submit a line list using the current colour.
    fn draw_lines(&mut self, vertices: &[[f32; 3]]);

    /// Block until every submitted command has completed on the GPU.
    fn finish(&mut self);

    fn swap_buffers(&mut self);

    fn destroy_context(&mut self);
}
