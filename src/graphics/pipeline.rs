//! Render pipelines and the screen-space camera uniform.

use std::borrow::Cow;

use glam::Mat4;
use wgpu::util::DeviceExt as _;

use super::geometry::Vertex;

/// Depth buffer format for the painter's-order depth test.
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth16Unorm;

/// Orthographic projection mapping pixel coordinates to clip space.
///
/// Origin in the top left corner, Y growing downwards, depth `0.0..=1.0`.
fn screen_projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_lh(0.0, width, height, 0.0, 0.0, 1.0)
}

/// Camera uniform bound to every draw.
pub(crate) struct Camera {
    /// Uniform buffer holding the projection matrix.
    buffer: wgpu::Buffer,
    /// Bind group at slot zero.
    pub(crate) bind_group: wgpu::BindGroup,
    /// Layout, needed once more for the pipeline layout.
    pub(crate) bind_group_layout: wgpu::BindGroupLayout,
}

impl Camera {
    /// Create the uniform for a drawable size.
    pub(crate) fn new(device: &wgpu::Device, width: f32, height: f32) -> Self {
        let matrix = screen_projection(width, height);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&matrix.to_cols_array()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Mat4>() as u64),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });

        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    /// Update the projection for a new drawable size.
    pub(crate) fn resize(&self, queue: &wgpu::Queue, width: f32, height: f32) {
        let matrix = screen_projection(width, height);

        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&matrix.to_cols_array()));
    }
}

/// The two render pipelines sharing one shader, plus the texture binding plumbing.
pub(crate) struct Pipelines {
    /// Pipeline for triangle strip draws.
    pub(crate) strip: wgpu::RenderPipeline,
    /// Pipeline for line list draws.
    pub(crate) lines: wgpu::RenderPipeline,
    /// Layout every texture bind group is created against.
    pub(crate) texture_layout: wgpu::BindGroupLayout,
    /// Shared linear-filtering clamping sampler.
    pub(crate) sampler: wgpu::Sampler,
}

impl Pipelines {
    /// Build both pipelines for a surface format.
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        camera: &Camera,
    ) -> Self {
        // Upload the shader to the GPU
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Geometry Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("shader.wgsl"))),
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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
        });

        // Linear filtering with clamped addressing
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Geometry Pipeline Layout"),
            bind_group_layouts: &[&camera.bind_group_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let strip = Self::build(
            device,
            &shader,
            &layout,
            surface_format,
            wgpu::PrimitiveTopology::TriangleStrip,
        );
        let lines = Self::build(
            device,
            &shader,
            &layout,
            surface_format,
            wgpu::PrimitiveTopology::LineList,
        );

        Self {
            strip,
            lines,
            texture_layout,
            sampler,
        }
    }

    /// Build a single pipeline for a primitive topology.
    fn build(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        surface_format: wgpu::TextureFormat,
        topology: wgpu::PrimitiveTopology,
    ) -> wgpu::RenderPipeline {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Geometry Pipeline"),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[Vertex::descriptor()],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Cw,
                // Irrelevant since we disable culling
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
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
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::screen_projection;

    /// Pixel coordinates map to clip space with the origin in the top left.
    #[test]
    fn projection_is_top_left_y_down() {
        let projection = screen_projection(800.0, 600.0);

        let top_left = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((top_left.x - -1.0).abs() < 1e-6);
        assert!((top_left.y - 1.0).abs() < 1e-6);

        let bottom_right = projection * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!((bottom_right.x - 1.0).abs() < 1e-6);
        assert!((bottom_right.y - -1.0).abs() < 1e-6);

        // Depth passes through the zero-to-one range unchanged
        let near = projection * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!((near.z - 0.0).abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
    }
}
