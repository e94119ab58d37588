//! Textures uploaded to the GPU, clamped to the device limits when needed.

use std::sync::Arc;

use super::pipeline::Pipelines;

/// Texture format used for all uploads.
///
/// We choose sRGB since most source images are created with this format and otherwise everything will be quite dark.
pub(crate) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Image living on the GPU.
///
/// Draw calls take the texture by reference, the underlying bind group is shared with the recorded frame.
/// When the source image exceeds the device texture limit it is downsampled on upload; the logical size keeps reporting the source dimensions so draw geometry is unaffected.
pub struct Texture {
    /// Binding shared with recorded draw commands.
    bind_group: Arc<wgpu::BindGroup>,
    /// Source image width in pixels.
    logical_width: u32,
    /// Source image height in pixels.
    logical_height: u32,
    /// Width as uploaded, smaller than logical when clamped.
    physical_width: u32,
    /// Height as uploaded.
    physical_height: u32,
}

impl Texture {
    /// Upload RGBA pixel data, downsampling when it exceeds the device limit.
    ///
    /// # Panics
    ///
    /// - When the pixel data doesn't match the dimensions.
    pub(crate) fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &Pipelines,
        max_dimension: u32,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        assert_eq!(
            pixels.len(),
            width as usize * height as usize * 4,
            "Pixel data doesn't match the image dimensions"
        );

        let physical_width = width.min(max_dimension);
        let physical_height = height.min(max_dimension);

        let resized;
        let upload_pixels = if physical_width == width && physical_height == height {
            pixels
        } else {
            log::warn!(
                "Image of {width}x{height} exceeds the device texture limit of {max_dimension}, downsampling to {physical_width}x{physical_height}"
            );

            resized = downsample(pixels, width, height, physical_width, physical_height);
            &resized
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Image Texture"),
            size: wgpu::Extent3d {
                width: physical_width,
                height: physical_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            upload_pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(physical_width * 4),
                rows_per_image: Some(physical_height),
            },
            wgpu::Extent3d {
                width: physical_width,
                height: physical_height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Image Texture Bind Group"),
            layout: &pipelines.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&pipelines.sampler),
                },
            ],
        });

        Self {
            bind_group: Arc::new(bind_group),
            logical_width: width,
            logical_height: height,
            physical_width,
            physical_height,
        }
    }

    /// Opaque white single pixel, bound for untextured draws.
    pub(crate) fn white(device: &wgpu::Device, queue: &wgpu::Queue, pipelines: &Pipelines) -> Self {
        Self::upload(device, queue, pipelines, 1, 1, 1, &[0xFF, 0xFF, 0xFF, 0xFF])
    }

    /// Width of the source image in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.logical_width
    }

    /// Height of the source image in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.logical_height
    }

    /// Whether the upload was downsampled to fit the device limit.
    #[inline]
    #[must_use]
    pub const fn is_scaled(&self) -> bool {
        self.logical_width != self.physical_width || self.logical_height != self.physical_height
    }

    /// Dimensions sub-rectangle coordinates are normalized against.
    ///
    /// A downsampled image fills its whole texture, so source coordinates normalize against the logical size.
    /// An unscaled image normalizes against the texture itself.
    pub(crate) fn uv_basis(&self) -> (f32, f32) {
        if self.is_scaled() {
            (self.logical_width as f32, self.logical_height as f32)
        } else {
            (self.physical_width as f32, self.physical_height as f32)
        }
    }

    /// Binding for recorded draw commands.
    pub(crate) fn bind_group(&self) -> &Arc<wgpu::BindGroup> {
        &self.bind_group
    }
}

/// Normalized UV corners for a sub-rectangle in source coordinates.
pub(crate) fn subrect_uvs(
    basis: (f32, f32),
    x: f32,
    y: f32,
    width: f32,
    height: f32,
) -> ([f32; 2], [f32; 2]) {
    let min = [x / basis.0, y / basis.1];
    let max = [(x + width) / basis.0, (y + height) / basis.1];

    (min, max)
}

/// Nearest-neighbor resample of tightly packed RGBA pixels.
fn downsample(
    pixels: &[u8],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> Vec<u8> {
    let mut resized = Vec::with_capacity(new_width as usize * new_height as usize * 4);

    for y in 0..new_height {
        let source_y = (y as u64 * height as u64 / new_height as u64) as usize;
        for x in 0..new_width {
            let source_x = (x as u64 * width as u64 / new_width as u64) as usize;
            let offset = (source_y * width as usize + source_x) * 4;
            resized.extend_from_slice(&pixels[offset..offset + 4]);
        }
    }

    resized
}

#[cfg(test)]
mod tests {
    use super::{downsample, subrect_uvs};

    /// A downsampled image normalizes sub-rectangles against its logical size.
    #[test]
    fn scaled_subrect_normalizes_against_logical_size() {
        // 256 pixel source clamped into a 128 pixel texture
        let basis = (256.0, 256.0);

        let (min, max) = subrect_uvs(basis, 0.0, 0.0, 64.0, 64.0);
        assert_eq!(min, [0.0, 0.0]);
        assert_eq!(max, [0.25, 0.25]);
    }

    /// An unscaled image normalizes against the texture dimensions.
    #[test]
    fn unscaled_subrect_normalizes_against_texture_size() {
        let basis = (128.0, 64.0);

        let (min, max) = subrect_uvs(basis, 32.0, 16.0, 64.0, 32.0);
        assert_eq!(min, [0.25, 0.25]);
        assert_eq!(max, [0.75, 0.75]);
    }

    /// Halving keeps every other pixel.
    #[test]
    fn downsample_picks_nearest_pixels() {
        // 2x2 image with distinct corner colors
        let pixels = [
            1, 1, 1, 1, 2, 2, 2, 2, //
            3, 3, 3, 3, 4, 4, 4, 4, //
        ];

        let resized = downsample(&pixels, 2, 2, 1, 1);
        assert_eq!(resized, vec![1, 1, 1, 1]);
    }
}
