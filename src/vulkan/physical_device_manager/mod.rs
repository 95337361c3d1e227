mod device_selector;
mod physical_device;

use ash::vk;
use tracing::{debug, warn};

use crate::{vulkan::InstanceGuard, InitError};

pub use self::{
    device_selector::{
        device_type_rank, missing_optional_extensions, rank_order, select_features,
        supports_required_features, CompatibleDevice, DeviceRequirements, DeviceSelection,
        DeviceSelector, PresentFamily, PresentSupport, QueueRoles, SelectedDevice,
    },
    physical_device::{DriverBackend, PhysicalDeviceInfo, QueueFamilyInfo},
};

/// Wraps the Vulkan APIs to interact with physical devices
pub struct PhysicalDeviceManager<'instance> {
    instance_guard: &'instance InstanceGuard,
}

impl<'instance> PhysicalDeviceManager<'instance> {
    /// Creates a new PhysicalDeviceManager for the given instance.
    pub fn new(instance_guard: &'instance InstanceGuard) -> Self {
        Self { instance_guard }
    }

    /// Snapshots every physical device on this machine, in driver order.
    ///
    /// A driver reporting initialization failure yields an empty list; deciding
    /// that no devices is fatal is left to selection.
    pub fn query_physical_devices(&self) -> Result<Vec<PhysicalDeviceInfo>, InitError> {
        let physical_devices = match unsafe { self.instance_guard.enumerate_physical_devices() } {
            Ok(physical_devices) => physical_devices,
            Err(vk::Result::ERROR_INITIALIZATION_FAILED) => {
                warn!("Physical device enumeration reported an initialization failure");
                return Ok(vec![]);
            }
            Err(err) => return Err(InitError::Enumeration(err)),
        };
        let devices = physical_devices
            .into_iter()
            .map(|pd| PhysicalDeviceInfo::query(self.instance_guard, pd))
            .collect::<Vec<_>>();
        for device in &devices {
            debug!(
                "Found {} ({:?}, {} queue families)",
                device.name,
                device.device_type,
                device.queue_families.len()
            );
        }
        Ok(devices)
    }
}
