use std::{ffi::CString, ops::Deref};

use ash::{
    vk::{self, make_api_version, ApplicationInfo, InstanceCreateInfo},
    Entry, Instance,
};
use tracing::{debug, info, warn};

use crate::{
    vulkan::extensions_registry::{
        self, collect_names, contains, to_c_strings, GET_PHYSICAL_DEVICE_PROPERTIES_2,
        VALIDATION_LAYER,
    },
    DeviceConfig, InitError,
};

/// API versions to try, most preferred first.
pub const API_VERSIONS: [u32; 4] = [
    vk::API_VERSION_1_3,
    vk::API_VERSION_1_2,
    vk::API_VERSION_1_1,
    vk::API_VERSION_1_0,
];

#[cfg(feature = "enable_validations")]
const ENABLE_VALIDATIONS: bool = true;
#[cfg(not(feature = "enable_validations"))]
const ENABLE_VALIDATIONS: bool = cfg!(debug_assertions);

/// Names and versions reported to the driver in `VkApplicationInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub application_name: String,
    pub application_version: u32,
    pub engine_name: String,
    pub engine_version: u32,
}

impl Default for AppIdentity {
    fn default() -> Self {
        let version_major = env!("CARGO_PKG_VERSION_MAJOR").parse::<u32>().unwrap_or(0);
        let version_minor = env!("CARGO_PKG_VERSION_MINOR").parse::<u32>().unwrap_or(0);
        let version_patch = env!("CARGO_PKG_VERSION_PATCH").parse::<u32>().unwrap_or(0);
        let version = make_api_version(0, version_major, version_minor, version_patch);
        Self {
            application_name: env!("CARGO_PKG_NAME").to_owned(),
            application_version: version,
            engine_name: env!("CARGO_PKG_NAME").to_owned(),
            engine_version: version,
        }
    }
}

/// Layers to enable and whether the debug messenger can be attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSelection {
    pub layers: Vec<String>,
    pub debug_utils: bool,
}

/// Enables the validation layer when it is wanted and installed. A missing layer
/// is only worth a warning.
pub fn resolve_validation(wanted: bool, available_layers: &[String]) -> ValidationSelection {
    if !wanted {
        return ValidationSelection {
            layers: vec![],
            debug_utils: false,
        };
    }
    if contains(available_layers, VALIDATION_LAYER) {
        ValidationSelection {
            layers: vec![VALIDATION_LAYER.to_owned()],
            debug_utils: true,
        }
    } else {
        warn!("Debug layers were requested but {VALIDATION_LAYER} is not available");
        ValidationSelection {
            layers: vec![],
            debug_utils: false,
        }
    }
}

/// Calls `attempt` with each version in order and returns the first success along
/// with the version that produced it. If every attempt fails, the last error is
/// returned.
pub fn try_versions<T, E>(
    versions: &[u32],
    mut attempt: impl FnMut(u32) -> Result<T, E>,
) -> Result<(u32, T), Option<E>> {
    let mut last_error = None;
    for &version in versions {
        match attempt(version) {
            Ok(value) => return Ok((version, value)),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error)
}

/// RAII for Instance. Also remembers what was negotiated while creating it.
pub struct InstanceGuard {
    instance: Instance,
    entry: Entry,
    api_version: u32,
    enabled_layers: Vec<String>,
    enabled_extensions: Vec<String>,
}

impl InstanceGuard {
    /// Creates the instance with the highest API version the loader accepts.
    /// Validation is enabled when asked for by `config`, forced by the
    /// `enable_validations` feature, or in debug builds.
    pub fn try_new(
        entry: Entry,
        app: &AppIdentity,
        config: &DeviceConfig,
        platform_extensions: &[String],
    ) -> Result<Self, InitError> {
        let available_layers = match unsafe { entry.enumerate_instance_layer_properties() } {
            Ok(layers) => collect_names(layers.iter().map(|layer| layer.layer_name_as_c_str())),
            Err(err) => {
                warn!("Could not enumerate instance layers: {err}");
                vec![]
            }
        };
        let available_extensions =
            match unsafe { entry.enumerate_instance_extension_properties(None) } {
                Ok(extensions) => collect_names(
                    extensions
                        .iter()
                        .map(|extension| extension.extension_name_as_c_str()),
                ),
                Err(err) => {
                    warn!("Could not enumerate instance extensions: {err}");
                    vec![]
                }
            };

        let validation =
            resolve_validation(config.debug_layer || ENABLE_VALIDATIONS, &available_layers);
        let enabled_extensions = extensions_registry::instance_extension_names(
            platform_extensions,
            &available_extensions,
            validation.debug_utils,
        );
        debug!("Layers to enable: {}", validation.layers.join(", "));
        debug!("Instance extensions to enable: {}", enabled_extensions.join(", "));

        let application_name = CString::new(app.application_name.as_str())?;
        let engine_name = CString::new(app.engine_name.as_str())?;
        let layer_names = to_c_strings(&validation.layers)?;
        let layer_name_ptrs = layer_names
            .iter()
            .map(|layer_name| layer_name.as_ptr())
            .collect::<Vec<_>>();
        let extension_names = to_c_strings(&enabled_extensions)?;
        let extension_name_ptrs = extension_names
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();

        let (api_version, instance) = try_versions(&API_VERSIONS, |api_version| {
            let app_info = ApplicationInfo::default()
                .application_name(&application_name)
                .application_version(app.application_version)
                .engine_name(&engine_name)
                .engine_version(app.engine_version)
                .api_version(api_version);
            let create_info = InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_name_ptrs)
                .enabled_extension_names(&extension_name_ptrs);
            let result = unsafe { entry.create_instance(&create_info, None) };
            if let Err(err) = &result {
                debug!(
                    "Instance creation with API {} failed: {err}",
                    version_string(api_version)
                );
            }
            result
        })
        .map_err(|err| {
            InitError::InstanceCreation(err.unwrap_or(vk::Result::ERROR_INITIALIZATION_FAILED))
        })?;

        if api_version != API_VERSIONS[0] {
            warn!(
                "Falling back to Vulkan API {} (preferred {})",
                version_string(api_version),
                version_string(API_VERSIONS[0])
            );
        }
        info!("Created Vulkan instance with API {}", version_string(api_version));

        Ok(Self {
            instance,
            entry,
            api_version,
            enabled_layers: validation.layers,
            enabled_extensions,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn enabled_layers(&self) -> &[String] {
        &self.enabled_layers
    }

    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    pub fn has_extension(&self, name: &str) -> bool {
        contains(&self.enabled_extensions, name)
    }

    /// True when the validation layer made it onto the instance.
    pub fn validation_enabled(&self) -> bool {
        contains(&self.enabled_layers, VALIDATION_LAYER)
    }

    /// Whether `vkGetPhysicalDeviceFeatures2` style queries and structs are usable.
    pub fn supports_properties2(&self) -> bool {
        supports_properties2(self.api_version, &self.enabled_extensions)
    }
}

pub(crate) fn supports_properties2(api_version: u32, enabled_extensions: &[String]) -> bool {
    api_version >= vk::API_VERSION_1_1
        || contains(enabled_extensions, GET_PHYSICAL_DEVICE_PROPERTIES_2)
}

pub(crate) fn version_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        debug!("Dropping InstanceGuard");
        unsafe { self.instance.destroy_instance(None) }
    }
}

impl Deref for InstanceGuard {
    type Target = Instance;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_working_version_wins() {
        let mut tried = vec![];
        let result = try_versions(&API_VERSIONS, |version| {
            tried.push(version);
            if version == vk::API_VERSION_1_3 {
                Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER)
            } else {
                Ok("instance")
            }
        });
        assert_eq!(result, Ok((vk::API_VERSION_1_2, "instance")));
        assert_eq!(tried, vec![vk::API_VERSION_1_3, vk::API_VERSION_1_2]);
    }

    #[test]
    fn every_version_failing_reports_the_last_error() {
        let result: Result<(u32, ()), _> = try_versions(&API_VERSIONS, |version| {
            if version == vk::API_VERSION_1_0 {
                Err(vk::Result::ERROR_INITIALIZATION_FAILED)
            } else {
                Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER)
            }
        });
        assert_eq!(result, Err(Some(vk::Result::ERROR_INITIALIZATION_FAILED)));
    }

    #[test]
    fn missing_validation_layer_is_not_fatal() {
        let selection = resolve_validation(true, &["VK_LAYER_MESA_overlay".to_owned()]);
        assert!(selection.layers.is_empty());
        assert!(!selection.debug_utils);
    }

    #[test]
    fn available_validation_layer_is_enabled() {
        let selection = resolve_validation(true, &[VALIDATION_LAYER.to_owned()]);
        assert_eq!(selection.layers, vec![VALIDATION_LAYER.to_owned()]);
        assert!(selection.debug_utils);

        let selection = resolve_validation(false, &[VALIDATION_LAYER.to_owned()]);
        assert!(selection.layers.is_empty());
    }

    #[test]
    fn properties2_needs_1_1_or_the_extension() {
        assert!(supports_properties2(vk::API_VERSION_1_1, &[]));
        assert!(!supports_properties2(vk::API_VERSION_1_0, &[]));
        assert!(supports_properties2(
            vk::API_VERSION_1_0,
            &[GET_PHYSICAL_DEVICE_PROPERTIES_2.to_owned()]
        ));
    }

    #[test]
    fn versions_are_tried_newest_first() {
        assert!(API_VERSIONS.windows(2).all(|pair| pair[0] > pair[1]));
        assert_eq!(version_string(vk::API_VERSION_1_2), "1.2.0");
    }
}
