use std::sync::{Arc, Mutex, MutexGuard};

use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::debug;

use crate::{
    vulkan::{logical_device::FeatureStruct, InstanceGuard, LogicalDeviceGuard},
    InitError,
};

/// Memory allocator bound to one logical device.
pub struct AllocatorGuard {
    allocator: Mutex<Allocator>,
    // the allocator frees its blocks on drop, so the device has to outlive it
    _device: Arc<LogicalDeviceGuard>,
}

impl AllocatorGuard {
    pub fn try_new(
        instance: &InstanceGuard,
        device: &Arc<LogicalDeviceGuard>,
    ) -> Result<Self, InitError> {
        let buffer_device_address = device
            .feature_chain()
            .contains(FeatureStruct::BufferDeviceAddress);
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: (**instance).clone(),
            device: (***device).clone(),
            physical_device: device.physical_device(),
            debug_settings: Default::default(),
            buffer_device_address,
            allocation_sizes: Default::default(),
        })?;
        debug!("Created allocator (buffer device address: {buffer_device_address})");
        Ok(Self {
            allocator: Mutex::new(allocator),
            _device: Arc::clone(device),
        })
    }

    /// Locks the allocator, recovering from a poisoned lock.
    pub fn lock(&self) -> MutexGuard<'_, Allocator> {
        self.allocator.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl Drop for AllocatorGuard {
    fn drop(&mut self) {
        debug!("Dropping AllocatorGuard");
    }
}
