use std::sync::Arc;

use ash::{
    vk::{MemoryPropertyFlags, Queue},
    Entry,
};
use tracing::{debug, info};

use crate::{
    vulkan::{
        extensions_registry::{DebugUtilsGuard, DEBUG_UTILS},
        AllocatorGuard, AppIdentity, DeviceSelection, DeviceSelector, DiagnosticsSink,
        InstanceGuard, LogicalDeviceGuard, PhysicalDeviceManager, PlatformWindow, QueueHandles,
        SelectedDevice, SurfaceGuard, UploadQueue,
    },
    DeviceConfig, InitError,
};

/// A fully initialized device: instance, surface, logical device with its
/// queues, and a memory allocator.
///
/// Fields drop in declaration order, which is the required teardown order.
pub struct VulkanDevice {
    allocator: AllocatorGuard,
    device: Arc<LogicalDeviceGuard>,
    surface: SurfaceGuard,
    debug_utils: Option<DebugUtilsGuard>,
    instance: Arc<InstanceGuard>,
    selection: DeviceSelection,
    selected: SelectedDevice,
    diagnostics: Arc<DiagnosticsSink>,
    config: DeviceConfig,
}

impl VulkanDevice {
    /// Runs the whole construction sequence. On failure everything created so
    /// far is released in reverse order before the error is returned.
    pub fn new(
        config: DeviceConfig,
        app: &AppIdentity,
        window: &impl PlatformWindow,
    ) -> Result<Self, InitError> {
        let entry = unsafe { Entry::load() }?;
        let platform_extensions = window.required_instance_extensions()?;
        let instance = Arc::new(InstanceGuard::try_new(
            entry,
            app,
            &config,
            &platform_extensions,
        )?);

        let diagnostics = Arc::new(DiagnosticsSink::new(config.debug_callstack));
        let debug_utils = if instance.has_extension(DEBUG_UTILS) {
            Some(DebugUtilsGuard::try_new(&instance, Arc::clone(&diagnostics))?)
        } else {
            None
        };

        let surface = SurfaceGuard::try_new(&instance, window)?;

        let devices = PhysicalDeviceManager::new(&instance).query_physical_devices()?;
        let selection = DeviceSelector::new(&surface).select_candidates(devices)?;
        let selected = selection.select(config.device_index)?;

        let device = Arc::new(LogicalDeviceGuard::try_new(
            &instance,
            &selected,
            config.effective_upload_threads(),
        )?);
        let allocator = AllocatorGuard::try_new(&instance, &device)?;
        info!("Vulkan device ready on {}", selected.device().name);

        Ok(Self {
            allocator,
            device,
            surface,
            debug_utils,
            instance,
            selection,
            selected,
            diagnostics,
            config,
        })
    }

    pub fn instance(&self) -> &Arc<InstanceGuard> {
        &self.instance
    }

    pub fn device(&self) -> &Arc<LogicalDeviceGuard> {
        &self.device
    }

    pub fn allocator(&self) -> &AllocatorGuard {
        &self.allocator
    }

    pub fn surface(&self) -> &SurfaceGuard {
        &self.surface
    }

    pub fn queues(&self) -> &QueueHandles {
        self.device.queues()
    }

    pub fn graphics_queue(&self) -> Queue {
        self.queues().graphics
    }

    pub fn present_queue(&self) -> Queue {
        self.queues().present
    }

    pub fn upload_queues(&self) -> &[UploadQueue] {
        &self.queues().uploads
    }

    pub fn graphics_timestamps(&self) -> bool {
        self.selected.roles().graphics_timestamps
    }

    pub fn selection(&self) -> &DeviceSelection {
        &self.selection
    }

    pub fn selected(&self) -> &SelectedDevice {
        &self.selected
    }

    /// Ranked `(index, name)` list of every compatible device.
    pub fn device_list(&self) -> Vec<(usize, &str)> {
        self.selection.device_list()
    }

    /// Whether `name` was enabled on the logical device.
    pub fn supports_device_extension(&self, name: &str) -> bool {
        self.selected.has_extension(name)
    }

    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: MemoryPropertyFlags,
    ) -> Result<u32, InitError> {
        self.selected
            .device()
            .find_memory_type(type_filter, properties)
    }

    pub fn diagnostics(&self) -> &Arc<DiagnosticsSink> {
        &self.diagnostics
    }

    pub fn debug_messenger_attached(&self) -> bool {
        self.debug_utils.is_some()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        debug!("Dropping VulkanDevice");
        self.device.wait_idle();
    }
}
