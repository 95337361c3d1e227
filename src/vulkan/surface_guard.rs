use std::{ffi::CStr, ops::Deref, sync::Arc};

use ash::{
    khr::surface,
    vk::{PhysicalDevice, SurfaceKHR},
    Entry, Instance,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};

use crate::{
    vulkan::{
        physical_device_manager::{PhysicalDeviceInfo, PresentSupport},
        InstanceGuard,
    },
    InitError,
};

/// What the windowing layer has to provide so a surface can be created for it.
pub trait PlatformWindow {
    /// Instance extensions needed to create a surface for this window.
    fn required_instance_extensions(&self) -> Result<Vec<String>, InitError>;

    /// Creates a platform surface bound to `instance`. The caller owns the result.
    fn create_surface(&self, entry: &Entry, instance: &Instance) -> Result<SurfaceKHR, InitError>;
}

impl<W> PlatformWindow for W
where
    W: HasDisplayHandle + HasWindowHandle,
{
    fn required_instance_extensions(&self) -> Result<Vec<String>, InitError> {
        let display_handle = self.display_handle()?;
        let extensions = ash_window::enumerate_required_extensions(display_handle.as_raw())
            .map_err(InitError::PlatformExtensions)?;
        Ok(extensions
            .iter()
            // SAFETY: ash_window hands out pointers to static, NUL terminated names
            .map(|name| unsafe { CStr::from_ptr(*name) }.to_string_lossy().into_owned())
            .collect())
    }

    fn create_surface(&self, entry: &Entry, instance: &Instance) -> Result<SurfaceKHR, InitError> {
        let display_handle = self.display_handle()?;
        let window_handle = self.window_handle()?;
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(InitError::SurfaceCreation)
    }
}

/// RAII for the presentation surface.
pub struct SurfaceGuard {
    surface_fn: surface::Instance,
    surface: SurfaceKHR,
    // references to make sure we are dropped before these
    _instance: Arc<InstanceGuard>,
}

impl SurfaceGuard {
    pub fn try_new(
        instance: &Arc<InstanceGuard>,
        window: &impl PlatformWindow,
    ) -> Result<Self, InitError> {
        let surface = window.create_surface(instance.entry(), instance)?;
        let surface_fn = surface::Instance::new(instance.entry(), instance);
        debug!("Created surface");
        Ok(Self {
            surface_fn,
            surface,
            _instance: Arc::clone(instance),
        })
    }

    /// Asks the driver whether `queue_family_index` can present here. Query
    /// failures count as "no".
    pub fn get_physical_device_surface_support(
        &self,
        physical_device: PhysicalDevice,
        queue_family_index: u32,
    ) -> bool {
        match unsafe {
            self.surface_fn.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.surface,
            )
        } {
            Ok(supported) => supported,
            Err(err) => {
                warn!("Present support query for family {queue_family_index} failed: {err}");
                false
            }
        }
    }
}

impl PresentSupport for SurfaceGuard {
    fn supports_present(&self, device: &PhysicalDeviceInfo, queue_family_index: u32) -> bool {
        self.get_physical_device_surface_support(device.physical_device, queue_family_index)
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        debug!("Dropping SurfaceGuard");
        unsafe { self.surface_fn.destroy_surface(self.surface, None) }
    }
}

impl Deref for SurfaceGuard {
    type Target = SurfaceKHR;

    fn deref(&self) -> &Self::Target {
        &self.surface
    }
}
