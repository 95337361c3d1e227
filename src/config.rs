/// Upload thread count used when the configured value is 0.
pub const DEFAULT_UPLOAD_THREADS: u32 = 2;
/// Upper bound for the configured upload thread count.
pub const MAX_UPLOAD_THREADS: u32 = 4;

/// Scalar settings consumed once when a [`VulkanDevice`](crate::VulkanDevice) is built.
///
/// Changing a config after construction has no effect on an existing device; the
/// device has to be rebuilt for new values to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Index into the ranked list of compatible devices. Anything out of range
    /// (including negative values) selects the top-ranked device.
    pub device_index: i64,
    upload_threads: u32,
    /// Request the Khronos validation layer in release builds.
    pub debug_layer: bool,
    /// Log a backtrace after every reported validation error.
    pub debug_callstack: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            upload_threads: DEFAULT_UPLOAD_THREADS,
            debug_layer: false,
            debug_callstack: true,
        }
    }
}

impl DeviceConfig {
    pub fn new(device_index: i64, upload_threads: i64, debug_layer: bool) -> Self {
        Self::default()
            .with_device_index(device_index)
            .with_upload_threads(upload_threads)
            .with_debug_layer(debug_layer)
    }

    pub fn with_device_index(mut self, device_index: i64) -> Self {
        self.device_index = device_index;
        self
    }

    /// Sets the number of background upload threads, clamped to `[0, 4]`.
    pub fn with_upload_threads(mut self, upload_threads: i64) -> Self {
        self.upload_threads = upload_threads.clamp(0, MAX_UPLOAD_THREADS as i64) as u32;
        self
    }

    pub fn with_debug_layer(mut self, debug_layer: bool) -> Self {
        self.debug_layer = debug_layer;
        self
    }

    pub fn with_debug_callstack(mut self, debug_callstack: bool) -> Self {
        self.debug_callstack = debug_callstack;
        self
    }

    /// The stored (clamped) upload thread count. May be 0.
    pub fn upload_threads(&self) -> u32 {
        self.upload_threads
    }

    /// Upload queues to ask for, with 0 meaning "use the default".
    pub fn effective_upload_threads(&self) -> u32 {
        match self.upload_threads {
            0 => DEFAULT_UPLOAD_THREADS,
            threads => threads,
        }
    }

    /// Resolves `device_index` against a ranked list of `len` candidates.
    pub fn selected_index(&self, len: usize) -> usize {
        clamp_device_index(self.device_index, len)
    }
}

/// Out-of-range and negative indices fall back to the first candidate.
pub fn clamp_device_index(index: i64, len: usize) -> usize {
    match usize::try_from(index) {
        Ok(index) if index < len => index,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_threads_are_clamped() {
        assert_eq!(DeviceConfig::default().with_upload_threads(9).upload_threads(), 4);
        assert_eq!(DeviceConfig::default().with_upload_threads(-3).upload_threads(), 0);
        assert_eq!(DeviceConfig::default().with_upload_threads(3).upload_threads(), 3);
    }

    #[test]
    fn zero_upload_threads_uses_default() {
        let config = DeviceConfig::default().with_upload_threads(0);
        assert_eq!(config.effective_upload_threads(), DEFAULT_UPLOAD_THREADS);
        let config = DeviceConfig::default().with_upload_threads(1);
        assert_eq!(config.effective_upload_threads(), 1);
    }

    #[test]
    fn device_index_clamps_to_first() {
        assert_eq!(clamp_device_index(0, 3), 0);
        assert_eq!(clamp_device_index(2, 3), 2);
        assert_eq!(clamp_device_index(3, 3), 0);
        assert_eq!(clamp_device_index(100, 3), 0);
        assert_eq!(clamp_device_index(-1, 3), 0);
        assert_eq!(DeviceConfig::new(7, 2, false).selected_index(2), 0);
    }
}
