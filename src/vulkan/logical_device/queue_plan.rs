use ash::vk::Queue;
use tracing::warn;

use crate::{
    vulkan::physical_device_manager::{PresentFamily, QueueRoles},
    InitError,
};

pub const QUEUE_PRIORITY: f32 = 1.0;

/// A queue's position: family index plus index within that family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSlot {
    pub family_index: u32,
    pub queue_index: u32,
}

/// Queues requested from one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyRequest {
    pub family_index: u32,
    pub queue_count: u32,
}

/// Per-family queue counts, one entry per distinct family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueCreateRequest {
    families: Vec<FamilyRequest>,
}

impl QueueCreateRequest {
    /// Asks for one more queue in `family_index` and returns where it will live.
    pub fn claim(&mut self, family_index: u32) -> QueueSlot {
        if let Some(request) = self
            .families
            .iter_mut()
            .find(|request| request.family_index == family_index)
        {
            request.queue_count += 1;
            return QueueSlot {
                family_index,
                queue_index: request.queue_count - 1,
            };
        }
        self.families.push(FamilyRequest {
            family_index,
            queue_count: 1,
        });
        QueueSlot {
            family_index,
            queue_index: 0,
        }
    }

    pub fn families(&self) -> &[FamilyRequest] {
        &self.families
    }

    pub fn queue_count(&self, family_index: u32) -> u32 {
        self.families
            .iter()
            .find(|request| request.family_index == family_index)
            .map_or(0, |request| request.queue_count)
    }
}

/// Number of upload queues to create: as many as configured and available,
/// never fewer than one.
pub fn upload_queue_count(configured: u32, capacity: u32) -> u32 {
    configured.min(capacity).max(1)
}

/// Which queue every role gets, worked out before the device exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePlan {
    pub request: QueueCreateRequest,
    pub graphics: QueueSlot,
    /// `None` when presenting on the graphics queue.
    pub present: Option<QueueSlot>,
    pub uploads: Vec<QueueSlot>,
    pub upload_supports_graphics: bool,
}

impl QueuePlan {
    pub fn new(roles: &QueueRoles, configured_uploads: u32) -> Self {
        let mut request = QueueCreateRequest::default();
        let graphics = request.claim(roles.graphics_family);
        let present = match roles.present_family {
            PresentFamily::Dedicated(family_index) => Some(request.claim(family_index)),
            PresentFamily::AliasGraphics => None,
        };

        let upload_count = upload_queue_count(configured_uploads, roles.upload_queue_capacity);
        if upload_count < configured_uploads {
            warn!(
                "Queue family {} only has room for {upload_count} of {configured_uploads} upload queues",
                roles.upload_family
            );
        }
        let uploads = (0..upload_count)
            .map(|_| request.claim(roles.upload_family))
            .collect();

        Self {
            request,
            graphics,
            present,
            uploads,
            upload_supports_graphics: roles.upload_supports_graphics,
        }
    }

    /// Looks every planned queue up through `get_queue`. A null upload queue is
    /// fatal since callers were promised that many.
    pub fn retrieve(
        &self,
        mut get_queue: impl FnMut(QueueSlot) -> Queue,
    ) -> Result<QueueHandles, InitError> {
        let graphics = get_queue(self.graphics);
        let present = match self.present {
            Some(slot) => get_queue(slot),
            None => graphics,
        };
        let uploads = self
            .uploads
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let queue = get_queue(*slot);
                if queue == Queue::null() {
                    return Err(InitError::MissingUploadQueue { index });
                }
                Ok(UploadQueue {
                    queue,
                    family_index: slot.family_index,
                    queue_index: slot.queue_index,
                    family_supports_graphics: self.upload_supports_graphics,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QueueHandles {
            graphics,
            present,
            uploads,
        })
    }
}

/// A background upload queue. Submission is not synchronized, so each one
/// belongs to a single worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadQueue {
    pub queue: Queue,
    pub family_index: u32,
    pub queue_index: u32,
    /// Blits (and so mipmap generation) work on this queue.
    pub family_supports_graphics: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueHandles {
    pub graphics: Queue,
    /// Same handle as `graphics` when presentation shares it.
    pub present: Queue,
    pub uploads: Vec<UploadQueue>,
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn claims_in_one_family_are_merged() {
        let mut request = QueueCreateRequest::default();
        assert_eq!(request.claim(0).queue_index, 0);
        assert_eq!(request.claim(2).queue_index, 0);
        assert_eq!(request.claim(0).queue_index, 1);
        assert_eq!(request.claim(0).queue_index, 2);
        assert_eq!(
            request.families(),
            &[
                FamilyRequest {
                    family_index: 0,
                    queue_count: 3
                },
                FamilyRequest {
                    family_index: 2,
                    queue_count: 1
                },
            ]
        );
        assert_eq!(request.queue_count(1), 0);
    }

    #[test]
    fn upload_count_has_a_floor_of_one() {
        assert_eq!(upload_queue_count(2, 0), 1);
        assert_eq!(upload_queue_count(4, 1), 1);
        assert_eq!(upload_queue_count(2, 4), 2);
        assert_eq!(upload_queue_count(4, 3), 3);
    }

    #[test]
    fn first_null_upload_queue_is_reported() {
        let roles = QueueRoles {
            graphics_family: 0,
            upload_family: 1,
            present_family: PresentFamily::AliasGraphics,
            graphics_timestamps: true,
            upload_supports_graphics: false,
            upload_queue_capacity: 4,
        };
        let plan = QueuePlan::new(&roles, 3);
        let result = plan.retrieve(|slot| {
            if slot.family_index == 1 && slot.queue_index == 0 {
                Queue::null()
            } else {
                Queue::from_raw(0x10 + slot.queue_index as u64)
            }
        });
        assert!(matches!(
            result,
            Err(InitError::MissingUploadQueue { index: 0 })
        ));
    }
}
