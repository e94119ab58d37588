//! Frame renderer recording draw calls and replaying them in one render pass.

use std::{ops::Range, path::Path, sync::Arc};

use super::{
    device::{GraphicsDevice, SurfaceFrame},
    geometry::Vertex,
    pipeline::{Camera, Pipelines},
    texture::{subrect_uvs, Texture},
};

/// One recorded draw operation, replayed at the end of the scene bracket.
enum DrawCommand {
    /// Triangle strip over a vertex range with a bound texture.
    Strip {
        /// Staged vertex range.
        range: Range<u32>,
        /// Texture binding, the white pixel for flat draws.
        bind: Arc<wgpu::BindGroup>,
    },
    /// Line list over a vertex range, always flat colored.
    Lines {
        /// Staged vertex range.
        range: Range<u32>,
    },
    /// Scissor change in device pixels.
    Clip([u32; 4]),
}

/// Transient state of one open scene bracket.
struct FrameContext {
    /// Acquired surface texture, presented on `end_scene`.
    surface: SurfaceFrame,
    /// Vertices of all draw calls this frame, uploaded in one go.
    vertices: Vec<Vertex>,
    /// Draw calls in submission order.
    commands: Vec<DrawCommand>,
}

/// 2D renderer enforcing the begin/end scene contract.
///
/// Draw calls are recorded between [`begin_scene`](Self::begin_scene) and [`end_scene`](Self::end_scene), staged into the shared geometry buffer and replayed in a single render pass when the bracket closes.
/// Geometry uses screen pixel coordinates with the origin in the top left, depth runs front to back over `0.0..=1.0`.
pub struct Renderer {
    /// Device owning the surface and the lost-device cycle.
    pub(crate) device: GraphicsDevice,
    /// The two pipelines and the texture binding plumbing.
    pipelines: Pipelines,
    /// Screen-space projection uniform.
    camera: Camera,
    /// White single pixel bound for untextured draws.
    white: Texture,
    /// Packed ARGB color the frame is cleared with.
    clear_color: u32,
    /// Depth value the depth buffer is cleared with.
    clear_depth: f32,
    /// Active scissor rectangle, persists across frames until changed.
    clip: Option<[u32; 4]>,
    /// Open scene bracket, `None` outside of one.
    frame: Option<FrameContext>,
}

impl Renderer {
    /// Build the renderer on a created device.
    pub(crate) fn new(device: GraphicsDevice) -> Self {
        let (width, height) = device.drawable_size();
        let camera = Camera::new(&device.device, width as f32, height as f32);
        let pipelines = Pipelines::new(&device.device, device.config.format, &camera);
        let white = Texture::white(&device.device, &device.queue, &pipelines);

        Self {
            device,
            pipelines,
            camera,
            white,
            clear_color: 0xFF00_0000,
            clear_depth: 1.0,
            clip: None,
            frame: None,
        }
    }

    /// Open the scene bracket for a new frame.
    ///
    /// Returns `false` without clearing or touching any state while the device recovers from a loss; the caller skips the frame.
    ///
    /// # Panics
    ///
    /// - When the previous bracket was never closed.
    pub(crate) fn begin_scene(&mut self) -> bool {
        profiling::scope!("begin_scene");

        assert!(
            self.frame.is_none(),
            "Scene bracket opened twice without closing"
        );

        let Some(surface) = self.device.begin_frame() else {
            return false;
        };

        // The drawable size may have changed on a reset
        let (width, height) = self.device.drawable_size();
        self.camera
            .resize(&self.device.queue, width as f32, height as f32);

        let mut commands = Vec::new();
        if let Some(clip) = self.clip {
            // Scissor state persists across frames
            commands.push(DrawCommand::Clip(clip));
        }

        self.frame = Some(FrameContext {
            surface,
            vertices: Vec::new(),
            commands,
        });

        true
    }

    /// Close the scene bracket, replaying all recorded draws and presenting the frame.
    ///
    /// # Panics
    ///
    /// - When no matching [`begin_scene`](Self::begin_scene) succeeded.
    pub(crate) fn end_scene(&mut self) {
        profiling::scope!("end_scene");

        let Some(frame) = self.frame.take() else {
            panic!("Scene bracket closed without an open scene")
        };

        // Upload all staged vertices in one go
        let Some(geometry) = self.device.geometry.as_mut() else {
            panic!("Geometry buffer missing inside a scene bracket")
        };
        geometry.upload(&self.device.device, &self.device.queue, &frame.vertices);

        let Some(depth) = self.device.depth.as_ref() else {
            panic!("Depth target missing inside a scene bracket")
        };

        let clear = super::u32_to_wgpu_color(self.clear_color, self.device.config.format.is_srgb());
        let drawable = (self.device.config.width, self.device.config.height);

        let mut encoder = self
            .device
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Frame Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.surface.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.camera.bind_group, &[]);
            pass.set_vertex_buffer(0, geometry.slice());

            for command in &frame.commands {
                match command {
                    DrawCommand::Strip { range, bind } => {
                        pass.set_pipeline(&self.pipelines.strip);
                        pass.set_bind_group(1, bind.as_ref(), &[]);
                        pass.draw(range.clone(), 0..1);
                    }
                    DrawCommand::Lines { range } => {
                        pass.set_pipeline(&self.pipelines.lines);
                        pass.set_bind_group(1, self.white.bind_group().as_ref(), &[]);
                        pass.draw(range.clone(), 0..1);
                    }
                    DrawCommand::Clip(clip) => {
                        let [x, y, width, height] = clamp_clip(*clip, drawable);
                        pass.set_scissor_rect(x, y, width, height);
                    }
                }
            }
        }

        self.device.queue.submit(Some(encoder.finish()));
        frame.surface.texture.present();
    }

    /// Draw a textured quad centered at the origin, half extents from the image size.
    ///
    /// The color is multiplied with every texture sample, `0xFFFFFFFF` draws the image unmodified.
    pub fn draw_image(&mut self, texture: &Texture, color: u32, z: f32) {
        self.draw_image_subrect(
            texture,
            color,
            z,
            0.0,
            0.0,
            texture.width() as f32,
            texture.height() as f32,
        );
    }

    /// Draw a sub-rectangle of an image as a quad centered at the origin.
    ///
    /// The sub-rectangle is given in source image coordinates; for an image that was downsampled at upload the coordinates keep referring to the original size.
    pub fn draw_image_subrect(
        &mut self,
        texture: &Texture,
        color: u32,
        z: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) {
        let ([min_u, min_v], [max_u, max_v]) = subrect_uvs(texture.uv_basis(), x, y, width, height);

        let half_width = width / 2.0;
        let half_height = height / 2.0;
        let vertices = [
            Vertex::new(-half_width, -half_height, z, color, min_u, min_v),
            Vertex::new(half_width, -half_height, z, color, max_u, min_v),
            Vertex::new(-half_width, half_height, z, color, min_u, max_v),
            Vertex::new(half_width, half_height, z, color, max_u, max_v),
        ];

        let bind = Arc::clone(texture.bind_group());
        self.record_strip(bind, &vertices);
    }

    /// Draw a flat colored rectangle at an absolute position.
    pub fn draw_rect(&mut self, x: f32, y: f32, width: f32, height: f32, z: f32, color: u32) {
        let vertices = [
            Vertex::new(x, y, z, color, 0.0, 0.0),
            Vertex::new(x + width, y, z, color, 1.0, 0.0),
            Vertex::new(x, y + height, z, color, 0.0, 1.0),
            Vertex::new(x + width, y + height, z, color, 1.0, 1.0),
        ];

        let bind = Arc::clone(self.white.bind_group());
        self.record_strip(bind, &vertices);
    }

    /// Draw an externally built triangle strip with flat vertex colors.
    ///
    /// # Panics
    ///
    /// - When fewer than three vertices are passed.
    pub fn draw_tri_strip(&mut self, vertices: &[Vertex]) {
        assert!(
            vertices.len() >= 3,
            "Triangle strip needs at least three vertices"
        );

        let bind = Arc::clone(self.white.bind_group());
        self.record_strip(bind, vertices);
    }

    /// Draw a single flat colored line.
    pub fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: u32) {
        let Some(frame) = self.frame.as_mut() else {
            panic!("Draw call outside of a scene bracket")
        };

        let start = frame.vertices.len() as u32;
        frame
            .vertices
            .push(Vertex::new(x0, y0, 0.0, color, 0.0, 0.0));
        frame
            .vertices
            .push(Vertex::new(x1, y1, 0.0, color, 0.0, 0.0));
        frame.commands.push(DrawCommand::Lines {
            range: start..start + 2,
        });
    }

    /// Set the scissor rectangle in device pixels, staying active until changed.
    pub fn set_clip_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let clip = [x, y, width, height];
        self.clip = Some(clip);

        if let Some(frame) = self.frame.as_mut() {
            frame.commands.push(DrawCommand::Clip(clip));
        }
    }

    /// Set the packed ARGB color the frame is cleared with.
    pub fn set_clear_color(&mut self, color: u32) {
        self.clear_color = color;
    }

    /// Upload an RGBA image, downsampled when it exceeds the device texture limit.
    #[must_use]
    pub fn create_texture(&self, width: u32, height: u32, pixels: &[u8]) -> Texture {
        Texture::upload(
            &self.device.device,
            &self.device.queue,
            &self.pipelines,
            self.device.caps.max_texture_dimension,
            width,
            height,
            pixels,
        )
    }

    /// Current drawable size in pixels.
    #[must_use]
    pub const fn drawable_size(&self) -> (u32, u32) {
        self.device.drawable_size()
    }

    /// Append a plain text dump of the device capabilities to a file.
    ///
    /// # Errors
    ///
    /// - When the file can't be opened or written.
    pub fn dump_device_info(&self, path: &Path) -> miette::Result<()> {
        self.device.dump_info(path)
    }

    /// Stage a strip draw into the open bracket.
    ///
    /// # Panics
    ///
    /// - When no scene bracket is open.
    fn record_strip(&mut self, bind: Arc<wgpu::BindGroup>, vertices: &[Vertex]) {
        let Some(frame) = self.frame.as_mut() else {
            panic!("Draw call outside of a scene bracket")
        };

        let start = frame.vertices.len() as u32;
        frame.vertices.extend_from_slice(vertices);
        frame.commands.push(DrawCommand::Strip {
            range: start..start + vertices.len() as u32,
            bind,
        });
    }
}

/// Clamp a scissor rectangle to the drawable area.
fn clamp_clip(clip: [u32; 4], drawable: (u32, u32)) -> [u32; 4] {
    let [x, y, width, height] = clip;
    let x = x.min(drawable.0);
    let y = y.min(drawable.1);

    [x, y, width.min(drawable.0 - x), height.min(drawable.1 - y)]
}

#[cfg(test)]
mod tests {
    use super::clamp_clip;

    /// Scissor rectangles never exceed the drawable area.
    #[test]
    fn clip_is_clamped_to_drawable() {
        assert_eq!(clamp_clip([0, 0, 100, 100], (800, 600)), [0, 0, 100, 100]);
        assert_eq!(clamp_clip([700, 500, 200, 200], (800, 600)), [
            700, 500, 100, 100
        ]);
        assert_eq!(clamp_clip([900, 700, 10, 10], (800, 600)), [800, 600, 0, 0]);
    }
}
