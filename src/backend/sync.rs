// Synchronization primitives
//
// Fences, semaphores for GPU-CPU and GPU-GPU sync.
// Acquire semaphores and fences cycle per frame in flight; present
// semaphores belong to a swapchain image, since the presentation engine
// holds them until that image comes back.

use anyhow::Result;
use ash::vk;

/// Frame synchronization - one per frame in flight
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED); // Start signaled

        let image_available = create_semaphore(device)?;
        let in_flight_fence = match unsafe { device.create_fence(&fence_info, None) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            image_available,
            in_flight_fence,
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight_fence, None);
        }
    }
}

pub fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let semaphore_info = vk::SemaphoreCreateInfo::builder();
    Ok(unsafe { device.create_semaphore(&semaphore_info, None) }?)
}

/// Which sync objects a frame uses.
///
/// The frame slot picks the command buffer, acquire semaphore and fence.
/// The acquired image index picks the semaphore presentation waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSlots {
    frames: usize,
    images: usize,
    current: usize,
}

impl FrameSlots {
    pub fn new(frames_in_flight: usize, image_count: usize) -> Self {
        Self {
            frames: frames_in_flight.max(1),
            images: image_count,
            current: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn images(&self) -> usize {
        self.images
    }

    /// Slot of the frame being recorded
    pub fn current(&self) -> usize {
        self.current
    }

    /// Present semaphore slot for an acquired image, `None` if out of range
    pub fn present_slot(&self, image_index: u32) -> Option<usize> {
        let index = image_index as usize;
        (index < self.images).then_some(index)
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames;
    }
}
