use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::fence::FenceValue;

pub struct Semaphore {
    pub raw: vk::Semaphore,
    device: Arc<ash::Device>,
}

impl Semaphore {
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        let raw = unsafe {
            device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?
        };
        Ok(Self { raw, device })
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.raw, None);
        }
    }
}

/// Counting fence built from a binary `VkFence`. Only one signal can be in
/// flight at a time, which is all a fully serialized frame loop needs.
pub struct Fence {
    pub raw: vk::Fence,
    value: FenceValue,
    device: Arc<ash::Device>,
}

impl Fence {
    pub fn new(device: Arc<ash::Device>) -> Result<Self> {
        let raw = unsafe {
            device.create_fence(&vk::FenceCreateInfo::default(), None)?
        };
        Ok(Self {
            raw,
            value: FenceValue::new(0),
            device,
        })
    }

    /// Records that the next submission using `raw` signals `value`.
    pub fn arm(&mut self, value: u64) {
        self.value.signal(value);
    }

    pub fn completed_value(&mut self) -> Result<u64> {
        if !self.value.is_idle() && unsafe { self.device.get_fence_status(self.raw)? } {
            self.retire()?;
        }
        Ok(self.value.completed())
    }

    pub fn wait(&mut self, value: u64) -> Result<()> {
        if self.value.is_complete(value) || self.value.is_idle() {
            return Ok(());
        }
        unsafe {
            self.device.wait_for_fences(&[self.raw], true, u64::MAX)?;
        }
        self.retire()
    }

    fn retire(&mut self) -> Result<()> {
        unsafe {
            self.device.reset_fences(&[self.raw])?;
        }
        self.value.observe(self.value.signaled());
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.raw, None);
        }
    }
}
