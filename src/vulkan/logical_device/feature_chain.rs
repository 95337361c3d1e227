use ash::vk::{
    DeviceCreateInfo, PhysicalDeviceAccelerationStructureFeaturesKHR,
    PhysicalDeviceBufferDeviceAddressFeatures, PhysicalDeviceFeatures, PhysicalDeviceFeatures2,
    PhysicalDeviceRayQueryFeaturesKHR,
};
use tracing::debug;

use crate::vulkan::extensions_registry::{
    contains, ACCELERATION_STRUCTURE, BUFFER_DEVICE_ADDRESS, RAY_QUERY,
};

/// Optional feature structs that can hang off `VkPhysicalDeviceFeatures2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStruct {
    BufferDeviceAddress,
    AccelerationStructure,
    RayQuery,
}

impl FeatureStruct {
    pub const ALL: [FeatureStruct; 3] = [
        FeatureStruct::BufferDeviceAddress,
        FeatureStruct::AccelerationStructure,
        FeatureStruct::RayQuery,
    ];

    /// Extension that has to be enabled for this struct to be valid.
    pub fn extension(self) -> &'static str {
        match self {
            FeatureStruct::BufferDeviceAddress => BUFFER_DEVICE_ADDRESS,
            FeatureStruct::AccelerationStructure => ACCELERATION_STRUCTURE,
            FeatureStruct::RayQuery => RAY_QUERY,
        }
    }
}

/// How features get passed to device creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureChain {
    /// Core features go through `VkPhysicalDeviceFeatures2` instead of
    /// `pEnabledFeatures`.
    pub extended: bool,
    /// Structs to link behind the features2 struct, in order. Always empty on
    /// the legacy path.
    pub chain: Vec<FeatureStruct>,
}

impl FeatureChain {
    pub fn plan(extended: bool, enabled_extensions: &[String]) -> Self {
        let negotiated = FeatureStruct::ALL
            .into_iter()
            .filter(|feature| contains(enabled_extensions, feature.extension()))
            .collect::<Vec<_>>();
        if !extended {
            if !negotiated.is_empty() {
                debug!("No features2 support, not enabling {negotiated:?}");
            }
            return Self {
                extended,
                chain: vec![],
            };
        }
        Self {
            extended,
            chain: negotiated,
        }
    }

    pub fn contains(&self, feature: FeatureStruct) -> bool {
        self.chain.contains(&feature)
    }

    /// Builds the features2 struct carrying `core`, with every planned struct
    /// from `structs` linked behind it exactly once.
    pub fn link<'a>(
        &self,
        core: PhysicalDeviceFeatures,
        structs: &'a mut ExtendedFeatures,
    ) -> PhysicalDeviceFeatures2<'a> {
        let ExtendedFeatures {
            buffer_device_address,
            acceleration_structure,
            ray_query,
        } = structs;
        let mut buffer_device_address = Some(buffer_device_address);
        let mut acceleration_structure = Some(acceleration_structure);
        let mut ray_query = Some(ray_query);

        let mut features2 = PhysicalDeviceFeatures2::default().features(core);
        for feature in &self.chain {
            features2 = match feature {
                FeatureStruct::BufferDeviceAddress => match buffer_device_address.take() {
                    Some(next) => features2.push_next(next),
                    None => features2,
                },
                FeatureStruct::AccelerationStructure => match acceleration_structure.take() {
                    Some(next) => features2.push_next(next),
                    None => features2,
                },
                FeatureStruct::RayQuery => match ray_query.take() {
                    Some(next) => features2.push_next(next),
                    None => features2,
                },
            };
        }
        features2
    }

    /// Hands features to device creation, through `features2` when extended
    /// and as `pEnabledFeatures` otherwise.
    pub fn apply<'a, 'b: 'a>(
        &self,
        create_info: DeviceCreateInfo<'a>,
        core: &'a PhysicalDeviceFeatures,
        features2: &'a mut PhysicalDeviceFeatures2<'b>,
    ) -> DeviceCreateInfo<'a> {
        if self.extended {
            create_info.push_next(features2)
        } else {
            create_info.enabled_features(core)
        }
    }
}

/// Structs that can be linked behind features2, each with its feature on.
pub struct ExtendedFeatures {
    buffer_device_address: PhysicalDeviceBufferDeviceAddressFeatures<'static>,
    acceleration_structure: PhysicalDeviceAccelerationStructureFeaturesKHR<'static>,
    ray_query: PhysicalDeviceRayQueryFeaturesKHR<'static>,
}

impl Default for ExtendedFeatures {
    fn default() -> Self {
        Self {
            buffer_device_address: PhysicalDeviceBufferDeviceAddressFeatures::default()
                .buffer_device_address(true),
            acceleration_structure: PhysicalDeviceAccelerationStructureFeaturesKHR::default()
                .acceleration_structure(true),
            ray_query: PhysicalDeviceRayQueryFeaturesKHR::default().ray_query(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::c_void;

    use ash::vk::{self, BaseInStructure, StructureType};

    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn every_negotiated_struct_is_linked() {
        let chain = FeatureChain::plan(true, &names(&[RAY_QUERY, BUFFER_DEVICE_ADDRESS]));
        assert_eq!(
            chain.chain,
            vec![FeatureStruct::BufferDeviceAddress, FeatureStruct::RayQuery]
        );
        assert!(!chain.contains(FeatureStruct::AccelerationStructure));
    }

    #[test]
    fn legacy_path_links_nothing() {
        let chain = FeatureChain::plan(false, &names(&[BUFFER_DEVICE_ADDRESS]));
        assert!(!chain.extended);
        assert!(chain.chain.is_empty());
    }

    fn chain_types(mut next: *const c_void) -> Vec<StructureType> {
        let mut types = vec![];
        while !next.is_null() {
            let base = unsafe { &*next.cast::<BaseInStructure>() };
            types.push(base.s_type);
            next = base.p_next.cast();
        }
        types
    }

    #[test]
    fn all_three_structs_end_up_in_the_chain() {
        let chain = FeatureChain::plan(
            true,
            &names(&[BUFFER_DEVICE_ADDRESS, ACCELERATION_STRUCTURE, RAY_QUERY]),
        );
        let mut structs = ExtendedFeatures::default();
        let features2 = chain.link(PhysicalDeviceFeatures::default(), &mut structs);

        let mut linked = chain_types(features2.p_next.cast_const());
        linked.sort_by_key(|s_type| s_type.as_raw());
        let mut expected = vec![
            StructureType::PHYSICAL_DEVICE_BUFFER_DEVICE_ADDRESS_FEATURES,
            StructureType::PHYSICAL_DEVICE_ACCELERATION_STRUCTURE_FEATURES_KHR,
            StructureType::PHYSICAL_DEVICE_RAY_QUERY_FEATURES_KHR,
        ];
        expected.sort_by_key(|s_type| s_type.as_raw());
        assert_eq!(linked, expected);
    }

    #[test]
    fn extended_path_hangs_features2_off_create_info() {
        let chain = FeatureChain::plan(true, &names(&[RAY_QUERY]));
        let core = PhysicalDeviceFeatures {
            sampler_anisotropy: vk::TRUE,
            ..Default::default()
        };
        let mut structs = ExtendedFeatures::default();
        let mut features2 = chain.link(core, &mut structs);
        let create_info = chain.apply(DeviceCreateInfo::default(), &core, &mut features2);

        assert!(create_info.p_enabled_features.is_null());
        assert_eq!(
            chain_types(create_info.p_next),
            vec![
                StructureType::PHYSICAL_DEVICE_FEATURES_2,
                StructureType::PHYSICAL_DEVICE_RAY_QUERY_FEATURES_KHR,
            ]
        );
    }

    #[test]
    fn legacy_path_uses_enabled_features_only() {
        let chain = FeatureChain::plan(false, &names(&[BUFFER_DEVICE_ADDRESS, RAY_QUERY]));
        let core = PhysicalDeviceFeatures::default();
        let mut structs = ExtendedFeatures::default();
        let mut features2 = chain.link(core, &mut structs);
        assert!(features2.p_next.is_null());

        let create_info = chain.apply(DeviceCreateInfo::default(), &core, &mut features2);
        assert!(std::ptr::eq(create_info.p_enabled_features, &core));
        assert!(create_info.p_next.is_null());
    }
}
