mod debug_utils_guard;

use std::ffi::{CStr, CString, NulError};

pub use self::debug_utils_guard::DebugUtilsGuard;

pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

// instance extensions
pub const DEBUG_UTILS: &str = "VK_EXT_debug_utils";
pub const SWAPCHAIN_COLORSPACE: &str = "VK_EXT_swapchain_colorspace";
pub const GET_PHYSICAL_DEVICE_PROPERTIES_2: &str = "VK_KHR_get_physical_device_properties2";

// device extensions
pub const SWAPCHAIN: &str = "VK_KHR_swapchain";
pub const HDR_METADATA: &str = "VK_EXT_hdr_metadata";
pub const MEMORY_BUDGET: &str = "VK_EXT_memory_budget";
pub const GET_MEMORY_REQUIREMENTS_2: &str = "VK_KHR_get_memory_requirements2";
pub const DEDICATED_ALLOCATION: &str = "VK_KHR_dedicated_allocation";
pub const BUFFER_DEVICE_ADDRESS: &str = "VK_KHR_buffer_device_address";
pub const DEFERRED_HOST_OPERATIONS: &str = "VK_KHR_deferred_host_operations";
pub const ACCELERATION_STRUCTURE: &str = "VK_KHR_acceleration_structure";
pub const RAY_QUERY: &str = "VK_KHR_ray_query";
pub const LAYERED_DRIVER: &str = "VK_MSFT_layered_driver";
pub const PORTABILITY_SUBSET: &str = "VK_KHR_portability_subset";

/// Instance extensions enabled whenever the loader offers them.
pub const OPTIONAL_INSTANCE_EXTENSIONS: &[&str] =
    &[SWAPCHAIN_COLORSPACE, GET_PHYSICAL_DEVICE_PROPERTIES_2];

/// Device extensions a physical device must expose to be considered at all.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&str] = &[SWAPCHAIN];

/// Device extensions enabled on the selected device when it supports them.
pub const OPTIONAL_DEVICE_EXTENSIONS: &[&str] = &[
    HDR_METADATA,
    MEMORY_BUDGET,
    GET_MEMORY_REQUIREMENTS_2,
    DEDICATED_ALLOCATION,
    BUFFER_DEVICE_ADDRESS,
    DEFERRED_HOST_OPERATIONS,
    ACCELERATION_STRUCTURE,
    RAY_QUERY,
];

/// Returns the entries of `wishlist` that appear in `available`, in wishlist order.
pub fn intersect(wishlist: &[&str], available: &[String]) -> Vec<String> {
    wishlist
        .iter()
        .filter(|wanted| contains(available, wanted))
        .map(|wanted| (*wanted).to_owned())
        .collect()
}

pub fn contains(names: &[String], name: &str) -> bool {
    names.iter().any(|candidate| candidate == name)
}

/// Builds the instance extension list: platform extensions first, then debug utils
/// when validation is active, then whatever optional extensions the loader offers.
/// Duplicates are dropped.
pub fn instance_extension_names(
    platform_extensions: &[String],
    available: &[String],
    debug_utils: bool,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(platform_extensions.len() + 3);
    let debug = debug_utils.then(|| DEBUG_UTILS.to_owned());
    for name in platform_extensions
        .iter()
        .cloned()
        .chain(debug)
        .chain(intersect(OPTIONAL_INSTANCE_EXTENSIONS, available))
    {
        if !contains(&names, &name) {
            names.push(name);
        }
    }
    names
}

/// Collects the names out of Vulkan's fixed-size char arrays, skipping any
/// that are not NUL terminated.
pub(crate) fn collect_names<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = Result<&'a CStr, std::ffi::FromBytesUntilNulError>>,
{
    names
        .into_iter()
        .filter_map(|name| name.ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

pub(crate) fn to_c_strings(names: &[String]) -> Result<Vec<CString>, NulError> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn intersect_keeps_wishlist_order() {
        let available = names(&[RAY_QUERY, "VK_KHR_maintenance1", BUFFER_DEVICE_ADDRESS]);
        assert_eq!(
            intersect(OPTIONAL_DEVICE_EXTENSIONS, &available),
            names(&[BUFFER_DEVICE_ADDRESS, RAY_QUERY])
        );
    }

    #[test]
    fn intersect_with_nothing_available_is_empty() {
        assert!(intersect(OPTIONAL_DEVICE_EXTENSIONS, &[]).is_empty());
    }

    #[test]
    fn instance_extensions_put_platform_first() {
        let platform = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let available = names(&[
            "VK_KHR_surface",
            GET_PHYSICAL_DEVICE_PROPERTIES_2,
            DEBUG_UTILS,
        ]);
        assert_eq!(
            instance_extension_names(&platform, &available, true),
            names(&[
                "VK_KHR_surface",
                "VK_KHR_xcb_surface",
                DEBUG_UTILS,
                GET_PHYSICAL_DEVICE_PROPERTIES_2,
            ])
        );
    }

    #[test]
    fn instance_extensions_skip_debug_utils_without_validation() {
        let platform = names(&["VK_KHR_surface"]);
        let extensions = instance_extension_names(&platform, &names(&[DEBUG_UTILS]), false);
        assert_eq!(extensions, platform);
    }

    #[test]
    fn instance_extensions_are_deduplicated() {
        let platform = names(&["VK_KHR_surface", SWAPCHAIN_COLORSPACE]);
        let available = names(&[SWAPCHAIN_COLORSPACE]);
        assert_eq!(
            instance_extension_names(&platform, &available, false),
            platform
        );
    }
}
