use ash::vk::{
    self, Extent3D, MemoryPropertyFlags, PhysicalDevice, PhysicalDeviceFeatures,
    PhysicalDeviceMemoryProperties, PhysicalDeviceType, QueueFamilyProperties, QueueFlags,
};
use tracing::warn;

use crate::{
    vulkan::{
        extensions_registry::{collect_names, contains, LAYERED_DRIVER, PORTABILITY_SUBSET},
        InstanceGuard,
    },
    InitError,
};

/// One queue family as reported by the driver.
#[derive(Debug, Clone, Copy)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub flags: QueueFlags,
    pub queue_count: u32,
    pub timestamps: bool,
    pub min_image_transfer_granularity: Extent3D,
}

impl QueueFamilyInfo {
    /// A family with unit transfer granularity.
    pub fn new(index: u32, flags: QueueFlags, queue_count: u32) -> Self {
        Self {
            index,
            flags,
            queue_count,
            timestamps: true,
            min_image_transfer_granularity: Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
        }
    }

    pub fn with_granularity(mut self, width: u32, height: u32, depth: u32) -> Self {
        self.min_image_transfer_granularity = Extent3D {
            width,
            height,
            depth,
        };
        self
    }

    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }

    fn from_properties(index: u32, props: &QueueFamilyProperties) -> Self {
        Self {
            index,
            flags: props.queue_flags,
            queue_count: props.queue_count,
            timestamps: props.timestamp_valid_bits != 0,
            min_image_transfer_granularity: props.min_image_transfer_granularity,
        }
    }

    pub fn supports(&self, flags: QueueFlags) -> bool {
        self.queue_count > 0 && self.flags.contains(flags)
    }

    /// Background uploads copy unaligned sub-regions, so anything coarser than a
    /// single texel (or whole-image-only transfers) is unusable.
    pub fn has_unit_granularity(&self) -> bool {
        let granularity = self.min_image_transfer_granularity;
        granularity.width == 1 && granularity.height == 1 && granularity.depth == 1
    }
}

/// Whether the driver runs natively or on top of another graphics API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DriverBackend {
    Native,
    Layered,
}

impl DriverBackend {
    pub fn from_extensions(extensions: &[String]) -> Self {
        if contains(extensions, LAYERED_DRIVER) || contains(extensions, PORTABILITY_SUBSET) {
            DriverBackend::Layered
        } else {
            DriverBackend::Native
        }
    }
}

/// Immutable snapshot of everything selection needs to know about a device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    pub physical_device: PhysicalDevice,
    pub name: String,
    pub device_type: PhysicalDeviceType,
    pub api_version: u32,
    /// Stable per-device identifier used to break ranking ties.
    pub unique_id: [u8; vk::UUID_SIZE],
    pub backend: DriverBackend,
    pub features: PhysicalDeviceFeatures,
    pub memory_properties: PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub extensions: Vec<String>,
}

impl PhysicalDeviceInfo {
    pub fn query(instance: &InstanceGuard, physical_device: PhysicalDevice) -> Self {
        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        let features = unsafe { instance.get_physical_device_features(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) }
                .iter()
                .enumerate()
                .map(|(index, props)| QueueFamilyInfo::from_properties(index as u32, props))
                .collect();

        let name = props
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| String::from("<unnamed device>"));
        let extensions =
            match unsafe { instance.enumerate_device_extension_properties(physical_device) } {
                Ok(extensions) => collect_names(
                    extensions
                        .iter()
                        .map(|extension| extension.extension_name_as_c_str()),
                ),
                Err(err) => {
                    warn!("Could not enumerate extensions of {name}: {err}");
                    vec![]
                }
            };

        Self {
            physical_device,
            backend: DriverBackend::from_extensions(&extensions),
            device_type: props.device_type,
            api_version: props.api_version,
            unique_id: props.pipeline_cache_uuid,
            name,
            features,
            memory_properties,
            queue_families,
            extensions,
        }
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        contains(&self.extensions, name)
    }

    pub fn queue_family(&self, index: u32) -> Option<&QueueFamilyInfo> {
        self.queue_families.get(index as usize)
    }

    /// Index of the first memory type allowed by `type_filter` that has all of
    /// `properties`.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: MemoryPropertyFlags,
    ) -> Result<u32, InitError> {
        let memory = &self.memory_properties;
        memory.memory_types[..memory.memory_type_count as usize]
            .iter()
            .enumerate()
            .find(|(index, memory_type)| {
                type_filter & (1 << index) != 0 && memory_type.property_flags.contains(properties)
            })
            .map(|(index, _)| index as u32)
            .ok_or(InitError::NoMemoryType {
                type_filter,
                properties,
            })
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::MemoryType;

    use super::*;

    fn device_with_memory(types: &[MemoryPropertyFlags]) -> PhysicalDeviceInfo {
        let mut memory_properties = PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in memory_properties.memory_types.iter_mut().zip(types) {
            *slot = MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        PhysicalDeviceInfo {
            physical_device: PhysicalDevice::null(),
            name: "memory test".to_owned(),
            device_type: PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_2,
            unique_id: [0; vk::UUID_SIZE],
            backend: DriverBackend::Native,
            features: PhysicalDeviceFeatures::default(),
            memory_properties,
            queue_families: vec![],
            extensions: vec![],
        }
    }

    #[test]
    fn memory_type_honours_filter_and_flags() {
        let device = device_with_memory(&[
            MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
            MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        assert_eq!(
            device.find_memory_type(0b111, MemoryPropertyFlags::HOST_VISIBLE).ok(),
            Some(1)
        );
        assert_eq!(
            device.find_memory_type(0b100, MemoryPropertyFlags::HOST_VISIBLE).ok(),
            Some(2)
        );
        assert!(matches!(
            device.find_memory_type(0b001, MemoryPropertyFlags::HOST_VISIBLE),
            Err(InitError::NoMemoryType { type_filter: 1, .. })
        ));
    }

    #[test]
    fn granularity_must_be_one_texel() {
        let family = QueueFamilyInfo::new(0, QueueFlags::TRANSFER, 1);
        assert!(family.has_unit_granularity());
        assert!(!family.with_granularity(1, 1, 8).has_unit_granularity());
        assert!(!family.with_granularity(0, 0, 0).has_unit_granularity());
    }

    #[test]
    fn empty_family_supports_nothing() {
        let family = QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 0);
        assert!(!family.supports(QueueFlags::GRAPHICS));
    }

    #[test]
    fn layered_drivers_are_detected_by_extension() {
        assert_eq!(DriverBackend::from_extensions(&[]), DriverBackend::Native);
        assert_eq!(
            DriverBackend::from_extensions(&[LAYERED_DRIVER.to_owned()]),
            DriverBackend::Layered
        );
        assert!(DriverBackend::Native < DriverBackend::Layered);
    }
}
