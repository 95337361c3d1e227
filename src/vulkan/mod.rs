mod allocator_guard;
mod device_context;
pub mod diagnostics;
pub mod extensions_registry;
mod instance_guard;
pub mod logical_device;
pub mod physical_device_manager;
mod surface_guard;

pub use allocator_guard::AllocatorGuard;
pub use device_context::VulkanDevice;
pub use diagnostics::{DiagnosticsSink, MessageSeverity};
pub use instance_guard::{
    resolve_validation, try_versions, AppIdentity, InstanceGuard, ValidationSelection,
    API_VERSIONS,
};
pub use logical_device::{LogicalDeviceGuard, QueueHandles, UploadQueue};
pub use physical_device_manager::{
    DeviceSelection, DeviceSelector, PhysicalDeviceInfo, PhysicalDeviceManager, PresentFamily,
    PresentSupport, QueueRoles, SelectedDevice,
};
pub use surface_guard::{PlatformWindow, SurfaceGuard};
