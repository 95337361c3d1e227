use std::{cmp::Ordering, sync::Arc};

use ash::vk::{self, PhysicalDeviceFeatures, PhysicalDeviceType, QueueFlags};
use tracing::{debug, info, warn};

use crate::{
    config::clamp_device_index,
    vulkan::{
        extensions_registry::{intersect, OPTIONAL_DEVICE_EXTENSIONS, REQUIRED_DEVICE_EXTENSIONS},
        physical_device_manager::{PhysicalDeviceInfo, QueueFamilyInfo},
    },
    InitError,
};

/// Answers whether a queue family of a device can present to the target surface.
pub trait PresentSupport {
    fn supports_present(&self, device: &PhysicalDeviceInfo, queue_family_index: u32) -> bool;
}

impl<F> PresentSupport for F
where
    F: Fn(&PhysicalDeviceInfo, u32) -> bool,
{
    fn supports_present(&self, device: &PhysicalDeviceInfo, queue_family_index: u32) -> bool {
        self(device, queue_family_index)
    }
}

/// Where presentation happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentFamily {
    /// Its own queue in this family.
    Dedicated(u32),
    /// Presents on the graphics queue itself.
    AliasGraphics,
}

impl PresentFamily {
    /// The family presentation ends up in.
    pub fn resolve(self, graphics_family: u32) -> u32 {
        match self {
            PresentFamily::Dedicated(index) => index,
            PresentFamily::AliasGraphics => graphics_family,
        }
    }

    pub fn is_alias(self) -> bool {
        self == PresentFamily::AliasGraphics
    }
}

/// Queue families picked for each role on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRoles {
    pub graphics_family: u32,
    pub upload_family: u32,
    pub present_family: PresentFamily,
    pub graphics_timestamps: bool,
    /// Uploads can blit (and so build mipmaps) on their own queue.
    pub upload_supports_graphics: bool,
    /// Queues left in the upload family once the other roles took theirs.
    pub upload_queue_capacity: u32,
}

impl QueueRoles {
    /// Resolves graphics, upload and present families for `device`, or `None`
    /// when any of them can't be placed. Upload candidates are tried in
    /// preference order until one leaves somewhere to present.
    pub fn assign<P>(device: &PhysicalDeviceInfo, present: &P) -> Option<Self>
    where
        P: PresentSupport + ?Sized,
    {
        let families = &device.queue_families;
        let graphics = families
            .iter()
            .find(|family| family.supports(QueueFlags::GRAPHICS))?;

        // sharing the graphics family needs a second queue in it
        let has_room =
            |family: &QueueFamilyInfo| family.index != graphics.index || family.queue_count >= 2;
        let eligible_uploads = |require_graphics: bool| {
            let mut eligible = families
                .iter()
                .filter(|family| family.queue_count > 0)
                .filter(|family| !require_graphics || family.flags.contains(QueueFlags::GRAPHICS))
                .filter(|family| family.has_unit_granularity() && has_room(*family))
                .collect::<Vec<_>>();
            // a family of its own leaves the most room
            eligible.sort_by_key(|family| family.index == graphics.index);
            eligible
        };
        // graphics capable families were already tried by the first pass
        let mut uploads = eligible_uploads(true);
        uploads.extend(
            eligible_uploads(false)
                .into_iter()
                .filter(|family| !family.flags.contains(QueueFlags::GRAPHICS)),
        );

        uploads.into_iter().find_map(|upload| {
            let present_family = place_present(device, present, graphics, upload)?;
            let present_index = present_family.resolve(graphics.index);
            let reserved = u32::from(upload.index == graphics.index)
                + u32::from(present_index == upload.index);
            Some(Self {
                graphics_family: graphics.index,
                upload_family: upload.index,
                present_family,
                graphics_timestamps: graphics.timestamps,
                upload_supports_graphics: upload.flags.contains(QueueFlags::GRAPHICS),
                upload_queue_capacity: upload.queue_count.saturating_sub(reserved),
            })
        })
    }
}

/// Present family for a given graphics and upload pick. A family other than
/// graphics needs a spare queue when upload already sits in it.
fn place_present<P>(
    device: &PhysicalDeviceInfo,
    present: &P,
    graphics: &QueueFamilyInfo,
    upload: &QueueFamilyInfo,
) -> Option<PresentFamily>
where
    P: PresentSupport + ?Sized,
{
    device
        .queue_families
        .iter()
        .filter(|family| family.index != graphics.index && family.queue_count > 0)
        .find(|family| {
            let required = 1 + u32::from(family.index == upload.index);
            required <= family.queue_count && present.supports_present(device, family.index)
        })
        .map(|family| PresentFamily::Dedicated(family.index))
        .or_else(|| {
            present
                .supports_present(device, graphics.index)
                .then_some(PresentFamily::AliasGraphics)
        })
}

/// A device that passed filtering, along with its queue roles.
#[derive(Debug, Clone)]
pub struct CompatibleDevice {
    pub device: Arc<PhysicalDeviceInfo>,
    pub roles: QueueRoles,
}

/// Minimum a device has to offer to be considered.
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub extensions: Vec<String>,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            extensions: REQUIRED_DEVICE_EXTENSIONS
                .iter()
                .map(|name| (*name).to_owned())
                .collect(),
        }
    }
}

impl DeviceRequirements {
    pub fn is_met_by(&self, device: &PhysicalDeviceInfo) -> bool {
        supports_required_features(&device.features)
            && self
                .extensions
                .iter()
                .all(|extension| device.supports_extension(extension))
    }
}

/// Anisotropic filtering and fragment shader stores are not optional.
pub fn supports_required_features(features: &PhysicalDeviceFeatures) -> bool {
    features.sampler_anisotropy == vk::TRUE && features.fragment_stores_and_atomics == vk::TRUE
}

/// Core features to enable on the chosen device, limited to what it supports.
pub fn select_features(supported: &PhysicalDeviceFeatures) -> PhysicalDeviceFeatures {
    PhysicalDeviceFeatures {
        sampler_anisotropy: supported.sampler_anisotropy,
        fragment_stores_and_atomics: supported.fragment_stores_and_atomics,
        depth_clamp: supported.depth_clamp,
        shader_clip_distance: supported.shader_clip_distance,
        ..Default::default()
    }
}

/// Optional device extensions `device` does not expose.
pub fn missing_optional_extensions(device: &PhysicalDeviceInfo) -> Vec<&'static str> {
    OPTIONAL_DEVICE_EXTENSIONS
        .iter()
        .copied()
        .filter(|extension| !device.supports_extension(extension))
        .collect()
}

/// Lower is better: discrete, integrated, virtual, CPU, then everything else.
pub fn device_type_rank(device_type: PhysicalDeviceType) -> i32 {
    match device_type {
        PhysicalDeviceType::DISCRETE_GPU => 0,
        PhysicalDeviceType::INTEGRATED_GPU => 1,
        PhysicalDeviceType::VIRTUAL_GPU => 2,
        PhysicalDeviceType::CPU => 3,
        PhysicalDeviceType::OTHER => 4,
        _ => 5,
    }
}

/// Total order over devices: type, then native before layered, then unique id.
pub fn rank_order(a: &PhysicalDeviceInfo, b: &PhysicalDeviceInfo) -> Ordering {
    device_type_rank(a.device_type)
        .cmp(&device_type_rank(b.device_type))
        .then_with(|| a.device_type.as_raw().cmp(&b.device_type.as_raw()))
        .then_with(|| a.backend.cmp(&b.backend))
        .then_with(|| a.unique_id.cmp(&b.unique_id))
}

/// Filters, assigns roles to, and ranks physical devices.
pub struct DeviceSelector<'a, P: ?Sized> {
    present: &'a P,
    requirements: DeviceRequirements,
}

impl<'a, P> DeviceSelector<'a, P>
where
    P: PresentSupport + ?Sized,
{
    pub fn new(present: &'a P) -> Self {
        Self {
            present,
            requirements: DeviceRequirements::default(),
        }
    }

    pub fn with_requirements(mut self, requirements: DeviceRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Runs filtering, role assignment and ranking over `devices`.
    pub fn select_candidates(
        &self,
        devices: Vec<PhysicalDeviceInfo>,
    ) -> Result<DeviceSelection, InitError> {
        if devices.is_empty() {
            return Err(InitError::NoDevices);
        }
        let available = devices.into_iter().map(Arc::new).collect::<Vec<_>>();

        let compatible = available
            .iter()
            .filter(|device| {
                let met = self.requirements.is_met_by(device);
                if !met {
                    debug!("{} lacks required features or extensions", device.name);
                }
                met
            })
            .collect::<Vec<_>>();
        if compatible.is_empty() {
            return Err(InitError::NoCompatibleDevices);
        }

        let mut candidates = compatible
            .into_iter()
            .filter_map(|device| match QueueRoles::assign(device, self.present) {
                Some(roles) => Some(CompatibleDevice {
                    device: Arc::clone(device),
                    roles,
                }),
                None => {
                    debug!("{} has no usable queue family layout", device.name);
                    None
                }
            })
            .collect::<Vec<_>>();
        if candidates.is_empty() {
            return Err(InitError::NoQueueRoles);
        }

        // stable, so equal devices keep driver order
        candidates.sort_by(|a, b| rank_order(&a.device, &b.device));

        Ok(DeviceSelection {
            available,
            candidates,
            required_extensions: self.requirements.extensions.clone(),
        })
    }
}

/// Result of a selection run. Owns every enumerated device plus the ranked
/// candidates.
#[derive(Debug, Clone)]
pub struct DeviceSelection {
    available: Vec<Arc<PhysicalDeviceInfo>>,
    candidates: Vec<CompatibleDevice>,
    required_extensions: Vec<String>,
}

impl DeviceSelection {
    pub fn available(&self) -> &[Arc<PhysicalDeviceInfo>] {
        &self.available
    }

    /// Compatible devices, best first.
    pub fn candidates(&self) -> &[CompatibleDevice] {
        &self.candidates
    }

    /// `(index, name)` for each candidate in ranked order.
    pub fn device_list(&self) -> Vec<(usize, &str)> {
        self.candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| (index, candidate.device.name.as_str()))
            .collect()
    }

    /// Picks the candidate at `index`, falling back to the best one when the
    /// index is out of range.
    pub fn select(&self, index: i64) -> Result<SelectedDevice, InitError> {
        let selected = clamp_device_index(index, self.candidates.len());
        if usize::try_from(index).ok() != Some(selected) {
            debug!("Device index {index} is out of range, using {selected}");
        }
        let candidate = self
            .candidates
            .get(selected)
            .cloned()
            .ok_or(InitError::NoCompatibleDevices)?;

        let mut enabled_extensions = self.required_extensions.clone();
        enabled_extensions.extend(intersect(
            OPTIONAL_DEVICE_EXTENSIONS,
            &candidate.device.extensions,
        ));
        let enabled_features = select_features(&candidate.device.features);

        info!("Selected {} (#{selected})", candidate.device.name);
        let missing = missing_optional_extensions(&candidate.device);
        if !missing.is_empty() {
            warn!(
                "{} lacks optional extensions: {}",
                candidate.device.name,
                missing.join(", ")
            );
        }
        debug!("Device extensions to enable: {}", enabled_extensions.join(", "));

        Ok(SelectedDevice {
            candidate,
            enabled_extensions,
            enabled_features,
        })
    }
}

/// The chosen candidate with its negotiated extensions and features.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub candidate: CompatibleDevice,
    pub enabled_extensions: Vec<String>,
    pub enabled_features: PhysicalDeviceFeatures,
}

impl SelectedDevice {
    pub fn device(&self) -> &PhysicalDeviceInfo {
        &self.candidate.device
    }

    pub fn roles(&self) -> &QueueRoles {
        &self.candidate.roles
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|enabled| enabled == name)
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::PhysicalDevice;

    use super::*;
    use crate::vulkan::{
        extensions_registry::{BUFFER_DEVICE_ADDRESS, RAY_QUERY, SWAPCHAIN},
        physical_device_manager::DriverBackend,
    };

    fn device(families: Vec<QueueFamilyInfo>) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            physical_device: PhysicalDevice::null(),
            name: "unit".to_owned(),
            device_type: PhysicalDeviceType::DISCRETE_GPU,
            api_version: vk::API_VERSION_1_2,
            unique_id: [0; vk::UUID_SIZE],
            backend: DriverBackend::Native,
            features: PhysicalDeviceFeatures {
                sampler_anisotropy: vk::TRUE,
                fragment_stores_and_atomics: vk::TRUE,
                depth_clamp: vk::TRUE,
                ..Default::default()
            },
            memory_properties: Default::default(),
            queue_families: families,
            extensions: vec![SWAPCHAIN.to_owned(), RAY_QUERY.to_owned()],
        }
    }

    fn everywhere(_: &PhysicalDeviceInfo, _: u32) -> bool {
        true
    }

    #[test]
    fn upload_falls_back_to_a_transfer_family() {
        let device = device(vec![
            QueueFamilyInfo::new(0, QueueFlags::GRAPHICS | QueueFlags::TRANSFER, 1),
            QueueFamilyInfo::new(1, QueueFlags::TRANSFER, 2),
        ]);
        let roles = QueueRoles::assign(&device, &everywhere).unwrap();
        assert_eq!(roles.graphics_family, 0);
        assert_eq!(roles.upload_family, 1);
        assert!(!roles.upload_supports_graphics);
        // family 1 is the only other place to present, and upload already has one of its two queues
        assert_eq!(roles.present_family, PresentFamily::Dedicated(1));
        assert_eq!(roles.upload_queue_capacity, 1);
    }

    #[test]
    fn coarse_granularity_families_never_take_uploads() {
        let device = device(vec![
            QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 1),
            QueueFamilyInfo::new(1, QueueFlags::TRANSFER, 2).with_granularity(8, 8, 1),
        ]);
        assert_eq!(QueueRoles::assign(&device, &everywhere), None);
    }

    #[test]
    fn presentation_is_required() {
        let device = device(vec![QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 4)]);
        let nowhere = |_: &PhysicalDeviceInfo, _: u32| false;
        assert_eq!(QueueRoles::assign(&device, &nowhere), None);
    }

    #[test]
    fn unknown_device_types_rank_last() {
        let unknown = PhysicalDeviceType::from_raw(7);
        assert!(device_type_rank(PhysicalDeviceType::OTHER) < device_type_rank(unknown));
        let negative = PhysicalDeviceType::from_raw(-1);
        assert!(device_type_rank(PhysicalDeviceType::OTHER) < device_type_rank(negative));
        assert!(
            device_type_rank(PhysicalDeviceType::CPU) < device_type_rank(PhysicalDeviceType::OTHER)
        );
    }

    #[test]
    fn selection_negotiates_extensions_and_features() {
        let selection = DeviceSelector::new(&everywhere)
            .select_candidates(vec![device(vec![QueueFamilyInfo::new(
                0,
                QueueFlags::GRAPHICS,
                3,
            )])])
            .unwrap();
        let selected = selection.select(0).unwrap();
        assert_eq!(
            selected.enabled_extensions,
            vec![SWAPCHAIN.to_owned(), RAY_QUERY.to_owned()]
        );
        assert_eq!(selected.enabled_features.depth_clamp, vk::TRUE);
        assert_eq!(selected.enabled_features.shader_clip_distance, vk::FALSE);
        assert_eq!(selected.enabled_features.geometry_shader, vk::FALSE);
    }

    #[test]
    fn unknown_types_order_by_raw_value_after_known_ones() {
        let mut negative = device(vec![QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 3)]);
        negative.device_type = PhysicalDeviceType::from_raw(-1);
        let mut large = negative.clone();
        large.device_type = PhysicalDeviceType::from_raw(9);
        let mut cpu = negative.clone();
        cpu.device_type = PhysicalDeviceType::CPU;

        assert_eq!(rank_order(&cpu, &negative), Ordering::Less);
        assert_eq!(rank_order(&negative, &large), Ordering::Less);
    }

    #[test]
    fn missing_optional_extensions_are_listed() {
        let device = device(vec![QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 3)]);
        let missing = missing_optional_extensions(&device);
        assert!(!missing.contains(&RAY_QUERY));
        assert!(missing.contains(&BUFFER_DEVICE_ADDRESS));
        assert_eq!(missing.len(), OPTIONAL_DEVICE_EXTENSIONS.len() - 1);
    }

    #[test]
    fn missing_required_features_reject_the_device() {
        let mut weak = device(vec![QueueFamilyInfo::new(0, QueueFlags::GRAPHICS, 3)]);
        weak.features.sampler_anisotropy = vk::FALSE;
        assert!(matches!(
            DeviceSelector::new(&everywhere).select_candidates(vec![weak]),
            Err(InitError::NoCompatibleDevices)
        ));
    }
}
