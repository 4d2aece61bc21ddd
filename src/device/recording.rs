//! A headless device that records the command stream.
//!
//! [`RecordingDevice`] keeps the same state a fixed-function driver would
//! (capabilities, matrix stack depths, bound texture, live texture names) and
//! appends every call to a command log. Draw calls additionally capture the
//! state they were issued with, so ordering and state-leak properties can be
//! checked after the fact.

use std::collections::{HashMap, HashSet};

use crate::{
    context::PixelFormat,
    data_structures::{
        model::Color,
        texture::{DecodedImage, SamplerState, TextureHandle},
    },
    device::{
        Capability, ClearMask, ClientArray, CullFace, GraphicsDevice, MaterialParam, ShadeModel,
        TextureEnvMode, VertexArrays,
    },
    error::TextureError,
    pipeline::{Frustum, MatrixMode, Viewport},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BindSurface(PixelFormat),
    ResizeSurface(u32, u32),
    HideCursor,
    Enable(Capability),
    Disable(Capability),
    EnableClientArray(ClientArray),
    ShadeModel(ShadeModel),
    CullFace(CullFace),
    ClearColor(Color),
    LightModelAmbient(Color),
    TextureEnv(TextureEnvMode),
    Clear(ClearMask),
    Viewport(Viewport),
    MatrixMode(MatrixMode),
    PushMatrix,
    PopMatrix,
    LoadIdentity,
    MultMatrix([f32; 16]),
    Frustum(Frustum),
    Ortho(Frustum),
    MaterialColor(MaterialParam, Color),
    Shininess(f32),
    Color(Color),
    GenTexture(TextureHandle),
    BindTexture(Option<TextureHandle>),
    UploadMipmapped {
        texture: TextureHandle,
        width: u32,
        height: u32,
        channels: u8,
    },
    Sampler(TextureHandle, SamplerState),
    DeleteTexture(TextureHandle),
    DrawElements(DrawCall),
    DrawLines { vertices: usize, lighting: bool },
    Finish,
    SwapBuffers,
    DestroyContext,
}

/// A captured indexed draw and the state it saw.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub label: String,
    pub vertices: usize,
    pub indices: usize,
    pub has_tex_coords: bool,
    pub texturing: bool,
    pub bound_texture: Option<TextureHandle>,
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    pub shininess: f32,
    pub modelview_depth: usize,
}

#[derive(Debug)]
pub struct RecordingDevice {
    commands: Vec<Command>,
    enabled: HashSet<Capability>,
    matrix_mode: MatrixMode,
    stack_depths: HashMap<MatrixMode, usize>,
    stack_underflows: usize,
    stack_overflows: usize,
    max_stack_depth: Option<usize>,
    bound_texture: Option<TextureHandle>,
    live_textures: HashSet<TextureHandle>,
    next_texture: u32,
    material: HashMap<MaterialParam, Color>,
    shininess: f32,
    context_alive: bool,
    frames_presented: usize,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            enabled: HashSet::new(),
            matrix_mode: MatrixMode::ModelView,
            stack_depths: HashMap::new(),
            stack_underflows: 0,
            stack_overflows: 0,
            max_stack_depth: None,
            bound_texture: None,
            live_textures: HashSet::new(),
            next_texture: 1,
            material: HashMap::new(),
            shininess: 0.0,
            context_alive: true,
            frames_presented: 0,
        }
    }

    /// Limit every matrix stack to `max` pushes above its base matrix.
    /// Further pushes are refused and counted as overflows.
    pub fn with_max_stack_depth(mut self, max: usize) -> Self {
        self.max_stack_depth = Some(max);
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain the command log, keeping the tracked state.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_calls(&self) -> Vec<&DrawCall> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawElements(call) => Some(call),
                _ => None,
            })
            .collect()
    }

    /// Number of matrices pushed on top of the base matrix of `mode`.
    pub fn stack_depth(&self, mode: MatrixMode) -> usize {
        self.stack_depths.get(&mode).copied().unwrap_or(0)
    }

    pub fn stack_underflows(&self) -> usize {
        self.stack_underflows
    }

    pub fn stack_overflows(&self) -> usize {
        self.stack_overflows
    }

    pub fn bound_texture(&self) -> Option<TextureHandle> {
        self.bound_texture
    }

    pub fn live_textures(&self) -> usize {
        self.live_textures.len()
    }

    pub fn is_live(&self, texture: TextureHandle) -> bool {
        self.live_textures.contains(&texture)
    }

    pub fn context_alive(&self) -> bool {
        self.context_alive
    }

    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    fn material_color(&self, param: MaterialParam) -> Color {
        self.material.get(&param).copied().unwrap_or(Color::WHITE)
    }
}

impl GraphicsDevice for RecordingDevice {
    fn bind_surface(&mut self, format: &PixelFormat) -> anyhow::Result<()> {
        self.commands.push(Command::BindSurface(*format));
        Ok(())
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        self.commands.push(Command::ResizeSurface(width, height));
    }

    fn hide_cursor(&mut self) {
        self.commands.push(Command::HideCursor);
    }

    fn enable(&mut self, capability: Capability) {
        self.enabled.insert(capability);
        self.commands.push(Command::Enable(capability));
    }

    fn disable(&mut self, capability: Capability) {
        self.enabled.remove(&capability);
        self.commands.push(Command::Disable(capability));
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    fn enable_client_array(&mut self, array: ClientArray) {
        self.commands.push(Command::EnableClientArray(array));
    }

    fn set_shade_model(&mut self, model: ShadeModel) {
        self.commands.push(Command::ShadeModel(model));
    }

    fn set_cull_face(&mut self, face: CullFace) {
        self.commands.push(Command::CullFace(face));
    }

    fn set_clear_color(&mut self, color: Color) {
        self.commands.push(Command::ClearColor(color));
    }

    fn set_light_model_ambient(&mut self, color: Color) {
        self.commands.push(Command::LightModelAmbient(color));
    }

    fn set_texture_env(&mut self, mode: TextureEnvMode) {
        self.commands.push(Command::TextureEnv(mode));
    }

    fn clear(&mut self, mask: ClearMask) {
        self.commands.push(Command::Clear(mask));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::Viewport(viewport));
    }

    fn set_matrix_mode(&mut self, mode: MatrixMode) {
        self.matrix_mode = mode;
        self.commands.push(Command::MatrixMode(mode));
    }

    fn push_matrix(&mut self) -> bool {
        self.commands.push(Command::PushMatrix);
        let depth = self.stack_depths.entry(self.matrix_mode).or_insert(0);
        if self.max_stack_depth.is_some_and(|max| *depth >= max) {
            self.stack_overflows += 1;
            return false;
        }
        *depth += 1;
        true
    }

    fn pop_matrix(&mut self) {
        let depth = self.stack_depths.entry(self.matrix_mode).or_insert(0);
        if *depth == 0 {
            self.stack_underflows += 1;
        } else {
            *depth -= 1;
        }
        self.commands.push(Command::PopMatrix);
    }

    fn load_identity(&mut self) {
        self.commands.push(Command::LoadIdentity);
    }

    fn mult_matrix(&mut self, matrix: &[f32; 16]) {
        self.commands.push(Command::MultMatrix(*matrix));
    }

    fn frustum(&mut self, frustum: &Frustum) {
        self.commands.push(Command::Frustum(*frustum));
    }

    fn ortho(&mut self, frustum: &Frustum) {
        self.commands.push(Command::Ortho(*frustum));
    }

    fn set_material_color(&mut self, param: MaterialParam, color: Color) {
        self.material.insert(param, color);
        self.commands.push(Command::MaterialColor(param, color));
    }

    fn set_shininess(&mut self, shininess: f32) {
        self.shininess = shininess;
        self.commands.push(Command::Shininess(shininess));
    }

    fn set_color(&mut self, color: Color) {
        self.commands.push(Command::Color(color));
    }

    fn gen_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.live_textures.insert(handle);
        self.commands.push(Command::GenTexture(handle));
        handle
    }

    fn bind_texture(&mut self, texture: Option<TextureHandle>) {
        self.bound_texture = texture;
        self.commands.push(Command::BindTexture(texture));
    }

    fn upload_mipmapped(
        &mut self,
        texture: TextureHandle,
        image: &DecodedImage,
    ) -> Result<(), TextureError> {
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
        self.commands.push(Command::UploadMipmapped {
            texture,
            width: image.width,
            height: image.height,
            channels: image.layout.channels(),
        });
        Ok(())
    }

    fn set_sampler(&mut self, texture: TextureHandle, sampler: SamplerState) {
        self.commands.push(Command::Sampler(texture, sampler));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.live_textures.remove(&texture);
        if self.bound_texture == Some(texture) {
            self.bound_texture = None;
        }
        self.commands.push(Command::DeleteTexture(texture));
    }

    fn draw_elements(&mut self, label: &str, arrays: VertexArrays<'_>, indices: &[u16]) {
        let texturing = self.is_enabled(Capability::Texture2D);
        let call = DrawCall {
            label: label.to_string(),
            vertices: arrays.positions.len(),
            indices: indices.len(),
            has_tex_coords: arrays.tex_coords.is_some(),
            texturing,
            bound_texture: self.bound_texture.filter(|_| texturing),
            ambient: self.material_color(MaterialParam::Ambient),
            diffuse: self.material_color(MaterialParam::Diffuse),
            specular: self.material_color(MaterialParam::Specular),
            shininess: self.shininess,
            modelview_depth: self.stack_depth(MatrixMode::ModelView),
        };
        self.commands.push(Command::DrawElements(call));
    }

    fn draw_lines(&mut self, vertices: &[[f32; 3]]) {
        let lighting = self.is_enabled(Capability::Lighting);
        self.commands.push(Command::DrawLines {
            vertices: vertices.len(),
            lighting,
        });
    }

    fn finish(&mut self) {
        self.commands.push(Command::Finish);
    }

    fn swap_buffers(&mut self) {
        self.frames_presented += 1;
        self.commands.push(Command::SwapBuffers);
    }

    fn destroy_context(&mut self) {
        self.context_alive = false;
        self.commands.push(Command::DestroyContext);
    }
}
