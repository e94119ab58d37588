//! GPU device and surface handling, including the lost-device cycle.

use std::{io::Write as _, path::Path, sync::Arc};

use miette::{Context as _, IntoDiagnostic as _};
use winit::{monitor::MonitorHandle, window::Window};

use super::geometry::GeometryBuffer;
use crate::{config::Config, services::{DeviceResources, SettingsStore}};

/// How many frames may be in flight, triple buffered.
const FRAME_LATENCY: u32 = 3;

/// Single enumerated display mode of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DisplayMode {
    /// Horizontal resolution in pixels.
    pub(crate) width: u32,
    /// Vertical resolution in pixels.
    pub(crate) height: u32,
    /// Refresh rate in millihertz.
    pub(crate) refresh_millihertz: u32,
}

/// Pick the display mode for exclusive fullscreen.
///
/// Only modes matching the exact resolution qualify.
/// A mode at the requested refresh rate wins, otherwise the highest rate of the matching modes.
pub(crate) fn select_display_mode(
    modes: &[DisplayMode],
    width: u32,
    height: u32,
    refresh_rate: u32,
) -> Option<usize> {
    let requested_millihertz = refresh_rate * 1000;

    let mut best: Option<usize> = None;
    for (index, mode) in modes.iter().enumerate() {
        if mode.width != width || mode.height != height {
            continue;
        }

        if refresh_rate != 0 && mode.refresh_millihertz == requested_millihertz {
            return Some(index);
        }

        best = match best {
            Some(current)
                if modes[current].refresh_millihertz >= mode.refresh_millihertz =>
            {
                Some(current)
            }
            _ => Some(index),
        };
    }

    best
}

/// Negotiate an exclusive fullscreen mode with a monitor, failing when nothing matches.
pub(crate) fn negotiate_display_mode(
    monitor: &MonitorHandle,
    width: u32,
    height: u32,
    refresh_rate: u32,
) -> miette::Result<winit::monitor::VideoModeHandle> {
    let handles: Vec<_> = monitor.video_modes().collect();
    let modes: Vec<_> = handles
        .iter()
        .map(|handle| DisplayMode {
            width: handle.size().width,
            height: handle.size().height,
            refresh_millihertz: handle.refresh_rate_millihertz(),
        })
        .collect();

    let index = select_display_mode(&modes, width, height, refresh_rate).ok_or_else(|| {
        miette::miette!("Monitor exposes no display mode matching {width}x{height}")
    })?;

    Ok(handles[index].clone())
}

/// Recovery state of the render device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeviceStatus {
    /// Frames render normally.
    Ready,
    /// Surface is gone, resources are released.
    Lost,
    /// Waiting for the reset that rebuilds the surface and resources.
    NotReset,
}

/// Limits of the created device relevant to callers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DeviceCaps {
    /// Largest allowed texture edge in pixels.
    pub(crate) max_texture_dimension: u32,
}

/// Depth buffer matching the surface size.
pub(crate) struct DepthTarget {
    /// View bound as the depth attachment.
    pub(crate) view: wgpu::TextureView,
}

impl DepthTarget {
    /// Create a depth buffer for a drawable size.
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: super::pipeline::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

/// Acquired surface texture for one frame.
pub(crate) struct SurfaceFrame {
    /// Texture presented at the end of the frame.
    pub(crate) texture: wgpu::SurfaceTexture,
    /// Color attachment view.
    pub(crate) view: wgpu::TextureView,
}

/// GPU device bound to the window surface.
///
/// Owns the lost-device cycle: when the surface drops out, externally owned resources are released exactly once, one frame is skipped, then everything is rebuilt and the game is notified through the resize notification.
pub(crate) struct GraphicsDevice {
    /// Window the surface is created on.
    window: Arc<Window>,
    /// Surface, kept alive by the window `Arc`.
    surface: wgpu::Surface<'static>,
    /// Adapter, kept for the device info dump.
    adapter: wgpu::Adapter,
    /// Logical GPU device.
    pub(crate) device: wgpu::Device,
    /// Command queue.
    pub(crate) queue: wgpu::Queue,
    /// Active surface configuration.
    pub(crate) config: wgpu::SurfaceConfiguration,
    /// Recovery state.
    status: DeviceStatus,
    /// Device limits.
    pub(crate) caps: DeviceCaps,
    /// Shared vertex buffer, absent while the device is lost.
    pub(crate) geometry: Option<GeometryBuffer>,
    /// Depth buffer, absent while the device is lost.
    pub(crate) depth: Option<DepthTarget>,
    /// Owner of GPU resources living outside the renderer.
    resources: Box<dyn DeviceResources>,
    /// Settings persistence for the fullscreen flag.
    settings: Box<dyn SettingsStore>,
    /// Drawable size to report to the game after a reset.
    resize_notification: Option<(u32, u32)>,
    /// Resolution requested at startup, reused when toggling into fullscreen.
    requested_width: u32,
    /// See [`Self::requested_width`].
    requested_height: u32,
    /// Preferred fullscreen refresh rate in hertz, zero for the highest.
    requested_refresh_rate: u32,
}

impl GraphicsDevice {
    /// Set up the GPU and attach it to the window surface.
    pub(crate) async fn new(
        config: &Config,
        window: Arc<Window>,
        resources: Box<dyn DeviceResources>,
        settings: Box<dyn SettingsStore>,
    ) -> miette::Result<Self> {
        // Get a handle to our GPU
        let instance = wgpu::Instance::default();

        // Create a GPU surface on the window
        let surface = instance
            .create_surface(Arc::clone(&window))
            .into_diagnostic()
            .wrap_err("Error creating surface on window")?;

        // Request an adapter
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                // Ensure the strongest GPU is used
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                // Request an adapter which can render to our surface
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or_else(|| miette::miette!("Error getting GPU adapter for window"))?;

        // Create the logical device and command queue
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    // Use the resolution limits of the adapter
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .into_diagnostic()
            .wrap_err("Error getting logical GPU device for surface")?;

        // Prefer an sRGB surface format
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(wgpu::TextureFormat::is_srgb)
            .unwrap_or(capabilities.formats[0]);

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: present_mode(window.fullscreen().is_some()),
            desired_maximum_frame_latency: FRAME_LATENCY,
            alpha_mode: capabilities.alpha_modes[0],
            view_formats: Vec::new(),
        };
        surface.configure(&device, &surface_config);

        let caps = DeviceCaps {
            max_texture_dimension: device.limits().max_texture_dimension_2d,
        };
        log::debug!(
            "Created render device, max texture dimension {}",
            caps.max_texture_dimension
        );

        let geometry = Some(GeometryBuffer::new(&device));
        let depth = Some(DepthTarget::new(
            &device,
            surface_config.width,
            surface_config.height,
        ));

        Ok(Self {
            window,
            surface,
            adapter,
            device,
            queue,
            config: surface_config,
            status: DeviceStatus::Ready,
            caps,
            geometry,
            depth,
            resources,
            settings,
            resize_notification: None,
            requested_width: config.width,
            requested_height: config.height,
            requested_refresh_rate: config.refresh_rate,
        })
    }

    /// Acquire the surface texture for a new frame.
    ///
    /// Returns `None` while the lost-device cycle is in progress, the caller skips the frame and throttles.
    ///
    /// # Panics
    ///
    /// - When the GPU is out of memory.
    pub(crate) fn begin_frame(&mut self) -> Option<SurfaceFrame> {
        match self.status {
            DeviceStatus::Ready => (),
            DeviceStatus::Lost => {
                // Resources are released, move on to the reset on the next frame
                self.status = DeviceStatus::NotReset;

                return None;
            }
            DeviceStatus::NotReset => {
                self.reset();
                self.status = DeviceStatus::Ready;

                return None;
            }
        }

        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                Some(SurfaceFrame { texture, view })
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.release();
                self.status = DeviceStatus::Lost;

                None
            }
            Err(wgpu::SurfaceError::Timeout) => {
                // Transient, skip the frame without touching resources
                log::warn!("Timed out acquiring the surface texture");

                None
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                panic!("Out of GPU memory acquiring the surface texture")
            }
        }
    }

    /// Schedule a reset for the next frame, called on window resize.
    pub(crate) fn request_reset(&mut self) {
        if self.status == DeviceStatus::Ready {
            self.status = DeviceStatus::NotReset;
        }
    }

    /// Drawable size reported to the game after the last reset, taken once.
    pub(crate) fn take_resize_notification(&mut self) -> Option<(u32, u32)> {
        self.resize_notification.take()
    }

    /// Switch between exclusive fullscreen and windowed mode, returning the new fullscreen state.
    pub(crate) fn toggle_fullscreen(&mut self) -> bool {
        let fullscreen = if self.window.fullscreen().is_some() {
            log::info!("Leaving fullscreen");
            self.window.set_fullscreen(None);

            false
        } else {
            match self.exclusive_mode() {
                Some(mode) => {
                    log::info!("Entering exclusive fullscreen");
                    self.window
                        .set_fullscreen(Some(winit::window::Fullscreen::Exclusive(mode)));
                }
                None => {
                    log::warn!(
                        "No display mode matches {}x{}, falling back to borderless fullscreen",
                        self.requested_width,
                        self.requested_height
                    );
                    self.window
                        .set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
                }
            }

            true
        };

        // The present mode depends on the display state, reconfigure on the next frame
        self.status = DeviceStatus::NotReset;

        fullscreen
    }

    /// Current drawable size in pixels.
    pub(crate) const fn drawable_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Window the surface lives on.
    pub(crate) fn window(&self) -> &Window {
        &self.window
    }

    /// Append a plain text dump of the device capabilities to a file.
    ///
    /// One feature flag per line, followed by the relevant limits.
    pub(crate) fn dump_info(&self, path: &Path) -> miette::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Error opening device info file {path:?}"))?;

        let info = self.adapter.get_info();
        let features = self.adapter.features();
        let limits = self.device.limits();

        let mut write = || -> std::io::Result<()> {
            writeln!(file, "adapter = {}", info.name)?;
            writeln!(file, "backend = {:?}", info.backend)?;
            writeln!(file, "type = {:?}", info.device_type)?;
            writeln!(file, "driver = {} {}", info.driver, info.driver_info)?;

            for (name, flag) in wgpu::Features::all().iter_names() {
                writeln!(file, "{name} = {}", features.contains(flag))?;
            }

            writeln!(
                file,
                "max_texture_dimension_2d = {}",
                limits.max_texture_dimension_2d
            )?;
            writeln!(file, "max_bind_groups = {}", limits.max_bind_groups)?;
            writeln!(file, "max_buffer_size = {}", limits.max_buffer_size)?;
            writeln!(
                file,
                "max_vertex_attributes = {}",
                limits.max_vertex_attributes
            )
        };

        write()
            .into_diagnostic()
            .wrap_err("Error writing device info dump")
    }

    /// Release everything bound to the device, the first half of the lost cycle.
    fn release(&mut self) {
        log::warn!("Render device lost, releasing resources");

        self.geometry = None;
        self.depth = None;
        self.resources.release();
    }

    /// Rebuild the surface and all resources, the second half of the lost cycle.
    fn reset(&mut self) {
        let size = self.window.inner_size();
        self.config.width = size.width.max(1);
        self.config.height = size.height.max(1);
        self.config.present_mode = present_mode(self.window.fullscreen().is_some());
        self.surface.configure(&self.device, &self.config);

        self.geometry = Some(GeometryBuffer::new(&self.device));
        self.depth = Some(DepthTarget::new(
            &self.device,
            self.config.width,
            self.config.height,
        ));
        self.resources.recreate(&self.device, &self.queue);

        // Persist the display state so it survives a crash
        let fullscreen = self.window.fullscreen().is_some();
        self.settings
            .put_string("fullscreen", if fullscreen { "true" } else { "false" });

        self.resize_notification = Some((self.config.width, self.config.height));

        log::info!(
            "Render device reset to {}x{}",
            self.config.width,
            self.config.height
        );
    }

    /// Exclusive mode for the startup resolution on the current monitor.
    fn exclusive_mode(&self) -> Option<winit::monitor::VideoModeHandle> {
        let monitor = self.window.current_monitor()?;

        negotiate_display_mode(
            &monitor,
            self.requested_width,
            self.requested_height,
            self.requested_refresh_rate,
        )
        .ok()
    }
}

/// Present mode for a display state.
///
/// Fullscreen syncs to the display, windowed presents as fast as allowed.
const fn present_mode(fullscreen: bool) -> wgpu::PresentMode {
    if fullscreen {
        wgpu::PresentMode::AutoVsync
    } else {
        wgpu::PresentMode::AutoNoVsync
    }
}

#[cfg(test)]
mod tests {
    use super::{select_display_mode, DisplayMode};

    /// Shorthand for a mode entry.
    const fn mode(width: u32, height: u32, millihertz: u32) -> DisplayMode {
        DisplayMode {
            width,
            height,
            refresh_millihertz: millihertz,
        }
    }

    /// Only exact resolution matches qualify.
    #[test]
    fn no_matching_resolution_fails() {
        let modes = [mode(1920, 1080, 60_000), mode(1280, 720, 60_000)];

        assert_eq!(select_display_mode(&modes, 800, 600, 0), None);
        assert_eq!(select_display_mode(&[], 800, 600, 60), None);
    }

    /// The requested refresh rate wins over higher rates.
    #[test]
    fn requested_rate_is_preferred() {
        let modes = [
            mode(800, 600, 120_000),
            mode(800, 600, 60_000),
            mode(800, 600, 75_000),
        ];

        assert_eq!(select_display_mode(&modes, 800, 600, 75), Some(2));
    }

    /// Without a requested rate the highest rate of the matching modes wins.
    #[test]
    fn highest_rate_without_request() {
        let modes = [
            mode(800, 600, 60_000),
            mode(1920, 1080, 240_000),
            mode(800, 600, 120_000),
            mode(800, 600, 75_000),
        ];

        assert_eq!(select_display_mode(&modes, 800, 600, 0), Some(2));
    }

    /// An unavailable requested rate falls back to the highest matching rate.
    #[test]
    fn unavailable_rate_falls_back_to_highest() {
        let modes = [mode(800, 600, 60_000), mode(800, 600, 75_000)];

        assert_eq!(select_display_mode(&modes, 800, 600, 144), Some(1));
    }
}
