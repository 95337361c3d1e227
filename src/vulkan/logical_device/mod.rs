mod feature_chain;
mod queue_plan;

use std::{ops::Deref, sync::Arc};

use ash::{
    vk::{DeviceCreateInfo, DeviceQueueCreateInfo, PhysicalDevice},
    Device,
};
use tracing::{debug, info, warn};

use crate::{
    vulkan::{
        extensions_registry::to_c_strings, instance_guard::supports_properties2,
        physical_device_manager::SelectedDevice, InstanceGuard,
    },
    InitError,
};

pub use self::{
    feature_chain::{ExtendedFeatures, FeatureChain, FeatureStruct},
    queue_plan::{
        upload_queue_count, FamilyRequest, QueueCreateRequest, QueueHandles, QueuePlan, QueueSlot,
        UploadQueue, QUEUE_PRIORITY,
    },
};

/// RAII for the logical device and the queues fetched from it.
pub struct LogicalDeviceGuard {
    device: Device,
    physical_device: PhysicalDevice,
    queues: QueueHandles,
    feature_chain: FeatureChain,
    // need to keep a reference to the instance to ensure we get
    // dropped before it does
    _instance: Arc<InstanceGuard>,
}

impl LogicalDeviceGuard {
    pub fn try_new(
        instance: &Arc<InstanceGuard>,
        selected: &SelectedDevice,
        upload_threads: u32,
    ) -> Result<Self, InitError> {
        let physical_device = selected.device().physical_device;
        let plan = QueuePlan::new(selected.roles(), upload_threads);
        debug!("Queue requests: {:?}", plan.request.families());

        let priorities = plan
            .request
            .families()
            .iter()
            .map(|request| vec![QUEUE_PRIORITY; request.queue_count as usize])
            .collect::<Vec<_>>();
        let queue_create_infos = plan
            .request
            .families()
            .iter()
            .zip(&priorities)
            .map(|(request, priorities)| {
                DeviceQueueCreateInfo::default()
                    .queue_family_index(request.family_index)
                    .queue_priorities(priorities)
            })
            .collect::<Vec<_>>();

        let extension_names = to_c_strings(&selected.enabled_extensions)?;
        let extension_name_ptrs = extension_names
            .iter()
            .map(|extension_name| extension_name.as_ptr())
            .collect::<Vec<_>>();

        let api_version = instance.api_version().min(selected.device().api_version);
        let chain = FeatureChain::plan(
            supports_properties2(api_version, instance.enabled_extensions()),
            &selected.enabled_extensions,
        );
        debug!("Feature chain: {chain:?}");

        let mut extended_features = ExtendedFeatures::default();
        let mut features2 = chain.link(selected.enabled_features, &mut extended_features);
        let device_create_info = chain.apply(
            DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&extension_name_ptrs),
            &selected.enabled_features,
            &mut features2,
        );

        let device =
            unsafe { instance.create_device(physical_device, &device_create_info, None) }
                .map_err(InitError::DeviceCreation)?;
        debug!("Created logical device");

        let mut guard = Self {
            device,
            physical_device,
            queues: QueueHandles::default(),
            feature_chain: chain,
            _instance: Arc::clone(instance),
        };
        guard.queues = plan.retrieve(|slot| unsafe {
            guard
                .device
                .get_device_queue(slot.family_index, slot.queue_index)
        })?;

        info!("Graphics queue: {:?}", guard.queues.graphics);
        info!("Present queue: {:?}", guard.queues.present);
        for (index, upload) in guard.queues.uploads.iter().enumerate() {
            info!(
                "Upload queue {index}: {:?} (family {}, slot {})",
                upload.queue, upload.family_index, upload.queue_index
            );
        }
        Ok(guard)
    }

    pub fn physical_device(&self) -> PhysicalDevice {
        self.physical_device
    }

    pub fn queues(&self) -> &QueueHandles {
        &self.queues
    }

    /// Optional feature structs that were enabled on the device.
    pub fn feature_chain(&self) -> &FeatureChain {
        &self.feature_chain
    }

    pub fn wait_idle(&self) {
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            warn!("Waiting for the device to go idle failed: {err}");
        }
    }
}

impl Drop for LogicalDeviceGuard {
    fn drop(&mut self) {
        debug!("Dropping LogicalDeviceGuard");
        unsafe { self.device.destroy_device(None) };
    }
}

impl Deref for LogicalDeviceGuard {
    type Target = Device;

    fn deref(&self) -> &Self::Target {
        &self.device
    }
}
