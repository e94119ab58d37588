//! Configuration for the window, the display mode and the frame loop.

use std::path::PathBuf;

/// Initial settings for the window and the frame loop.
///
/// There are two ways to initialize the config, either with [`Config::default()`] or with [`Config::new`], they are the same.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name in the title bar.
    ///
    /// Defaults to `"Plinth"`.
    pub title: String,
    /// Width of the drawable area in pixels.
    ///
    /// Defaults to `800`.
    pub width: u32,
    /// Height of the drawable area in pixels.
    ///
    /// Defaults to `600`.
    pub height: u32,
    /// Start in exclusive fullscreen.
    ///
    /// When set, a display mode matching the width and height is negotiated with the monitor.
    /// Startup fails when the monitor exposes no matching mode.
    ///
    /// Defaults to `false`.
    pub fullscreen: bool,
    /// Preferred refresh rate in hertz for exclusive fullscreen.
    ///
    /// When zero the highest rate of the matching display modes is used.
    ///
    /// Defaults to `0`.
    pub refresh_rate: u32,
    /// Upper bound for the frame rate.
    ///
    /// When an iteration of the frame loop finishes early the loop sleeps for the remainder of the frame duration.
    /// Zero disables pacing.
    ///
    /// Defaults to `60`.
    pub max_frame_rate: u32,
    /// Amount of keyboard driven virtual pointers, addressed as mouse index `1..`.
    ///
    /// Defaults to `0`.
    pub virtual_pointers: usize,
    /// Movement in pixels per frame for virtual pointers.
    ///
    /// Defaults to `2.0`.
    pub virtual_pointer_speed: f32,
    /// File to mirror all log output into, opened in append mode.
    ///
    /// Defaults to `None`, logging to the console only.
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: String::from("Plinth"),
            width: 800,
            height: 600,
            fullscreen: false,
            refresh_rate: 0,
            max_frame_rate: 60,
            virtual_pointers: 0,
            virtual_pointer_speed: 2.0,
            log_file: None,
        }
    }
}

impl Config {
    /// Same as [`Config::default()`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name in the title bar.
    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();

        self
    }

    /// Set the size of the drawable area in pixels.
    #[inline]
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;

        self
    }

    /// Start in exclusive fullscreen.
    #[inline]
    #[must_use]
    pub const fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;

        self
    }

    /// Set the preferred fullscreen refresh rate in hertz.
    #[inline]
    #[must_use]
    pub const fn with_refresh_rate(mut self, refresh_rate: u32) -> Self {
        self.refresh_rate = refresh_rate;

        self
    }

    /// Set the upper bound for the frame rate.
    #[inline]
    #[must_use]
    pub const fn with_max_frame_rate(mut self, max_frame_rate: u32) -> Self {
        self.max_frame_rate = max_frame_rate;

        self
    }

    /// Set the amount of keyboard driven virtual pointers.
    #[inline]
    #[must_use]
    pub const fn with_virtual_pointers(mut self, virtual_pointers: usize) -> Self {
        self.virtual_pointers = virtual_pointers;

        self
    }

    /// Set the movement speed for virtual pointers in pixels per frame.
    #[inline]
    #[must_use]
    pub const fn with_virtual_pointer_speed(mut self, virtual_pointer_speed: f32) -> Self {
        self.virtual_pointer_speed = virtual_pointer_speed;

        self
    }

    /// Mirror all log output into a file, opened in append mode.
    #[inline]
    #[must_use]
    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());

        self
    }
}
