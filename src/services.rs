//! Host provided seams for settings persistence and externally owned GPU resources.

use hashbrown::HashMap;

/// Persistent key/value settings owned by the host.
///
/// The renderer writes the `"fullscreen"` key (`"true"`/`"false"`) on every device reset so the last active display state survives a crash.
pub trait SettingsStore {
    /// Store a string value under a key, replacing any previous value.
    fn put_string(&mut self, key: &str, value: &str);

    /// Look up a previously stored value.
    fn get_string(&self, key: &str) -> Option<&str>;
}

/// Release/recreate signal for GPU resources owned outside the renderer.
///
/// When the render device is lost [`DeviceResources::release`] is called exactly once, and [`DeviceResources::recreate`] exactly once when the device comes back.
/// A plain window resize runs the recreate half only, implementations must tolerate a recreate without a preceding release.
pub trait DeviceResources {
    /// Drop everything created on the device.
    fn release(&mut self);

    /// Recreate everything on the restored device.
    fn recreate(&mut self, device: &wgpu::Device, queue: &wgpu::Queue);
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    /// Stored key/value pairs.
    values: HashMap<String, String>,
}

impl SettingsStore for MemorySettings {
    fn put_string(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_owned(), value.to_owned());
    }

    fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Resource owner with nothing to release.
#[derive(Debug, Default)]
pub struct NoDeviceResources;

impl DeviceResources for NoDeviceResources {
    fn release(&mut self) {}

    fn recreate(&mut self, _device: &wgpu::Device, _queue: &wgpu::Queue) {}
}

/// Host services handed to [`crate::Game::run`].
pub struct Services {
    /// Settings persistence.
    pub settings: Box<dyn SettingsStore>,
    /// Owner of GPU resources living outside the renderer.
    pub resources: Box<dyn DeviceResources>,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            settings: Box::new(MemorySettings::default()),
            resources: Box::new(NoDeviceResources),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemorySettings, SettingsStore};

    #[test]
    fn memory_settings_replace_previous_value() {
        let mut settings = MemorySettings::default();

        settings.put_string("fullscreen", "true");
        settings.put_string("fullscreen", "false");

        assert_eq!(settings.get_string("fullscreen"), Some("false"));
        assert_eq!(settings.get_string("missing"), None);
    }
}
