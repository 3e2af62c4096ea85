use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::vk::device::Queue;

/// One command pool and the single primary command buffer recorded from it
pub struct CommandAllocator {
    pub pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,

    is_recording: bool,

    device: Arc<ash::Device>,
}

impl CommandAllocator {
    pub fn new(device: Arc<ash::Device>, queue: &Queue) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue.family_index);
        let pool = unsafe { device.create_command_pool(&pool_info, None)? };

        let command_buffer_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .command_buffer_count(1)
            .level(vk::CommandBufferLevel::PRIMARY);
        let command_buffer = match unsafe { device.allocate_command_buffers(&command_buffer_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            pool,
            command_buffer,
            is_recording: false,
            device,
        })
    }

    pub fn begin_recording(&mut self) -> Result<()> {
        if self.is_recording {
            return Err(eyre!("Command buffer is already recording"));
        }

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            self.device.begin_command_buffer(self.command_buffer, &begin_info)?;
        }

        self.is_recording = true;

        Ok(())
    }

    pub fn end_recording(&mut self) -> Result<()> {
        if !self.is_recording {
            return Err(eyre!("Command buffer is not recording"));
        }

        unsafe {
            self.device.end_command_buffer(self.command_buffer)?
        }

        self.is_recording = false;

        Ok(())
    }

    /// Returns every command buffer of the pool to the initial state. The
    /// caller guarantees none of them is still executing.
    pub fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())?;
        }
        self.is_recording = false;
        Ok(())
    }
}

impl Drop for CommandAllocator {
    fn drop(&mut self) {
        if self.is_recording {
            log::warn!("Dropping CommandAllocator while still recording");
        }

        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
