#![allow(dead_code)]

use ash::vk::{self, PhysicalDevice, PhysicalDeviceFeatures, PhysicalDeviceType, QueueFlags};
use vk_device_init::vulkan::{
    extensions_registry::SWAPCHAIN,
    physical_device_manager::{DriverBackend, QueueFamilyInfo},
    PhysicalDeviceInfo,
};

pub const UNIVERSAL: QueueFlags = QueueFlags::from_raw(
    QueueFlags::GRAPHICS.as_raw() | QueueFlags::COMPUTE.as_raw() | QueueFlags::TRANSFER.as_raw(),
);

/// A device that meets every requirement, with the given queue families.
pub fn device(
    name: &str,
    device_type: PhysicalDeviceType,
    families: Vec<QueueFamilyInfo>,
) -> PhysicalDeviceInfo {
    PhysicalDeviceInfo {
        physical_device: PhysicalDevice::null(),
        name: name.to_owned(),
        device_type,
        api_version: vk::API_VERSION_1_3,
        unique_id: [0; vk::UUID_SIZE],
        backend: DriverBackend::Native,
        features: PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            fragment_stores_and_atomics: vk::TRUE,
            ..Default::default()
        },
        memory_properties: Default::default(),
        queue_families: families,
        extensions: vec![SWAPCHAIN.to_owned()],
    }
}

/// A discrete device with one universal family of three queues.
pub fn single_family_device(name: &str) -> PhysicalDeviceInfo {
    device(
        name,
        PhysicalDeviceType::DISCRETE_GPU,
        vec![QueueFamilyInfo::new(0, UNIVERSAL, 3)],
    )
}

pub fn with_unique_id(mut device: PhysicalDeviceInfo, first_byte: u8) -> PhysicalDeviceInfo {
    device.unique_id[0] = first_byte;
    device
}

/// Every family can present.
pub fn present_anywhere(_: &PhysicalDeviceInfo, _: u32) -> bool {
    true
}
