//! Types and helpers for drawing on the GPU.

pub(crate) mod device;
pub(crate) mod geometry;
pub(crate) mod pipeline;
pub(crate) mod renderer;
pub(crate) mod texture;

pub use geometry::Vertex;
pub use renderer::Renderer;
pub use texture::Texture;

/// Convert an `u32` color to a WGPU [`wgpu::Color`] taking in account sRGB.
fn u32_to_wgpu_color(argb: u32, srgb: bool) -> wgpu::Color {
    let a = ((argb & 0xFF00_0000) >> 24) as f64 / 255.0;
    let r = ((argb & 0x00FF_0000) >> 16) as f64 / 255.0;
    let g = ((argb & 0x0000_FF00) >> 8) as f64 / 255.0;
    let b = (argb & 0x0000_00FF) as f64 / 255.0;

    if srgb {
        // Convert to sRGB space
        wgpu::Color {
            a: a.powf(2.2),
            r: r.powf(2.2),
            g: g.powf(2.2),
            b: b.powf(2.2),
        }
    } else {
        wgpu::Color { a, r, g, b }
    }
}
