//! Vertex data and the shared grow-on-demand vertex buffer.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt as _;

/// Single vertex as it lives on the GPU.
///
/// Color is packed `0xAARRGGBB`, matching the clear color and the draw call color arguments.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Screen-space position in pixels, Z is the depth in `0.0..=1.0`.
    pub position: [f32; 3],
    /// Packed ARGB color multiplied with the texture sample.
    pub color: u32,
    /// Normalized texture coordinates.
    pub uv: [f32; 2],
}

impl Vertex {
    /// Vertex attributes as the shader reads them.
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset: 0,
            shader_location: 0,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Unorm8x4,
            offset: 12,
            shader_location: 1,
        },
        wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 16,
            shader_location: 2,
        },
    ];

    /// Construct a vertex.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, color: u32, u: f32, v: f32) -> Self {
        Self {
            position: [x, y, z],
            color,
            uv: [u, v],
        }
    }

    /// Memory layout passed to the render pipelines.
    pub(crate) const fn descriptor() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Vertices allocated for the initial buffer.
const INITIAL_VERTICES: u64 = 1024;

/// Shared vertex buffer all draw calls of a frame are staged into.
///
/// Released when the device is lost and recreated on reset.
pub(crate) struct GeometryBuffer {
    /// GPU buffer, grown when a frame needs more vertices.
    buffer: wgpu::Buffer,
}

impl GeometryBuffer {
    /// Create the buffer with the initial capacity.
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Buffer"),
            size: INITIAL_VERTICES * std::mem::size_of::<Vertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self { buffer }
    }

    /// Upload the staged vertices of a frame, growing the buffer when needed.
    pub(crate) fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        vertices: &[Vertex],
    ) {
        let bytes = bytemuck::cast_slice(vertices);

        if bytes.len() as u64 > self.buffer.size() {
            // More vertices than the buffer fits, recreate it at the bigger size
            self.buffer.destroy();
            self.buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Geometry Buffer"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        } else {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
    }

    /// Slice over the whole buffer for binding.
    pub(crate) fn slice(&self) -> wgpu::BufferSlice<'_> {
        self.buffer.slice(..)
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::Vertex;

    /// The shader-visible layout must stay position, color, uv.
    #[test]
    fn vertex_layout_is_interleaved() {
        assert_eq!(size_of::<Vertex>(), 24);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, color), 12);
        assert_eq!(offset_of!(Vertex, uv), 16);

        let descriptor = Vertex::descriptor();
        assert_eq!(descriptor.array_stride, 24);
        assert_eq!(descriptor.attributes.len(), 3);
    }

    /// Packed ARGB lands in memory as BGRA bytes, which the shader swizzles back.
    #[test]
    fn color_bytes_are_bgra_in_memory() {
        let vertex = Vertex::new(0.0, 0.0, 0.0, 0xFFAA_BBCC, 0.0, 0.0);
        let bytes = bytemuck::bytes_of(&vertex);

        assert_eq!(&bytes[12..16], &[0xCC, 0xBB, 0xAA, 0xFF]);
    }
}
