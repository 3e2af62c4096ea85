use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::Result;
use color_eyre::eyre::{eyre, OptionExt};
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
    MemoryLocation,
};
use crate::renderer::geometry;

/// Buffer in CPU-writable, GPU-readable memory
pub struct Buffer {
    pub buffer: vk::Buffer,
    pub size: u64,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Buffer {
    pub fn new(
        size: u64,
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let buffer = {
            let buffer_info = vk::BufferCreateInfo {
                size,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                ..Default::default()
            };
            unsafe { device.create_buffer(&buffer_info, None)? }
        };

        let requirements = unsafe {
            device.get_buffer_memory_requirements(buffer)
        };
        let allocation = mem_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))
            .and_then(|mut allocator| {
                Ok(allocator.allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::DedicatedBuffer(buffer),
                })?)
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        // From here on Drop releases both halves
        let buffer = Self {
            buffer,
            size,

            allocation: Some(allocation),
            memory_allocator: mem_allocator,
            device,
        };

        if let Some(allocation) = buffer.allocation.as_ref() {
            unsafe {
                buffer.device.bind_buffer_memory(
                    buffer.buffer,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        Ok(buffer)
    }

    /// Creates a buffer sized to `data` and fills it.
    pub fn with_data<T: Copy>(
        data: &[T],
        usage: vk::BufferUsageFlags,
        name: &str,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let size = std::mem::size_of_val(data) as u64;
        let mut buffer = Self::new(size, usage, name, mem_allocator, device)?;
        buffer.write(data)?;
        log::debug!("Uploaded {} bytes to {:?}", size, name);
        Ok(buffer)
    }

    pub fn write<T: Copy>(&mut self, data: &[T]) -> Result<presser::CopyRecord> {
        let allocation = self
            .allocation
            .as_mut()
            .ok_or_eyre("Buffer has no backing allocation")?;
        geometry::write_to_slab(data, allocation)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.memory_allocator.lock() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        log::error!("Failed to free buffer memory: {}", e);
                    }
                }
                Err(e) => log::error!("Memory allocator poisoned: {}", e),
            }
        }
    }
}
