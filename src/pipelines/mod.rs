//! wgpu render pipelines emulating the fixed-function draw path.
//!
//! There is a single shader (`fixed_function.wgsl`). What varies between
//! draws is the primitive topology, whether depth testing is on, and the
//! face culling mode; each combination gets its own pipeline, created on
//! first use and kept in a [`PipelineCache`].

use std::{collections::HashMap, mem};

use cgmath::Matrix4;

/// Converts a GL clip-space projection (`z` in `[-1, 1]`) to wgpu's `[0, 1]`.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Blending is never enabled; a material's alpha does not make it translucent.
pub const FIXED_BLEND: Option<wgpu::BlendState> = Some(wgpu::BlendState::REPLACE);

/// Interleaved vertex as consumed by the fixed-function shader.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FixedVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl FixedVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<FixedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Snapshot of the fixed-function state a single draw sees.
///
/// Layout matches `DrawUniforms` in the shader. The flags are
/// `[lighting, texturing, headlight, replace_env]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniforms {
    pub modelview: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub color: [f32; 4],
    pub scene_ambient: [f32; 4],
    /// `x` is the specular exponent, the rest is padding.
    pub params: [f32; 4],
    pub flags: [u32; 4],
}

/// What a pipeline is specialised on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub lines: bool,
    pub depth_test: bool,
    pub cull: Option<wgpu::Face>,
}

pub fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(mem::size_of::<DrawUniforms>() as u64),
            },
            count: None,
        }],
        label: Some("draw_uniform_layout"),
    })
}

pub fn texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
        label: Some("texture_bind_group_layout"),
    })
}

/// Lazily built pipelines for one surface colour/depth format pair.
#[derive(Debug)]
pub struct PipelineCache {
    layout: wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    depth_format: wgpu::TextureFormat,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn new(
        device: &wgpu::Device,
        uniform_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fixed Function Pipeline Layout"),
            bind_group_layouts: &[uniform_layout, texture_layout],
            push_constant_ranges: &[],
        });
        Self {
            layout,
            color_format,
            depth_format,
            pipelines: HashMap::new(),
        }
    }

    pub fn formats(&self) -> (wgpu::TextureFormat, wgpu::TextureFormat) {
        (self.color_format, self.depth_format)
    }

    /// Build the pipeline for `key` unless it already exists.
    pub fn prepare(&mut self, device: &wgpu::Device, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::debug!("creating pipeline {key:?}");
        let shader = wgpu::ShaderModuleDescriptor {
            label: Some("Fixed Function Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("fixed_function.wgsl").into()),
        };
        let pipeline = mk_render_pipeline(
            device,
            &self.layout,
            self.color_format,
            FIXED_BLEND,
            self.depth_format,
            key,
            &[FixedVertex::desc()],
            shader,
        );
        self.pipelines.insert(key, pipeline);
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

#[allow(clippy::too_many_arguments)]
pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: wgpu::TextureFormat,
    key: PipelineKey,
    vertex_layouts: &[wgpu::VertexBufferLayout],
    shader: wgpu::ShaderModuleDescriptor,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(shader);

    let topology = if key.lines {
        wgpu::PrimitiveTopology::LineList
    } else {
        wgpu::PrimitiveTopology::TriangleList
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Fixed Function Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if key.lines { None } else { key.cull },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        // The attachment is always present; a disabled depth test still has
        // to name its format but never rejects or writes.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_format,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniforms_are_sixteen_byte_aligned() {
        assert_eq!(mem::size_of::<DrawUniforms>() % 16, 0);
        assert_eq!(mem::size_of::<DrawUniforms>(), 3 * 64 + 7 * 16);
    }

    #[test]
    fn draws_overwrite_the_target() {
        let blend = FIXED_BLEND.unwrap();
        assert_eq!(blend.color, wgpu::BlendComponent::REPLACE);
        assert_eq!(blend.alpha, wgpu::BlendComponent::REPLACE);
    }

    #[test]
    fn vertex_stride_covers_all_attributes() {
        assert_eq!(FixedVertex::desc().array_stride, 32);
    }
}
