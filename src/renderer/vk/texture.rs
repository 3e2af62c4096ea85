use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use gpu_allocator::{
    vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator},
    MemoryLocation,
};
use crate::renderer::commands::ResourceState;
use crate::renderer::texture::TextureData;
use crate::renderer::vk::buffer::Buffer;
use crate::renderer::vk::command::CommandAllocator;
use crate::renderer::vk::device::Queue;
use crate::renderer::vk::sync::Fence;
use crate::renderer::vk::util::transition_image_layout;

/// Sampled 2D image in device-local memory, with its view and sampler
pub struct Texture {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub extent: vk::Extent2D,

    allocation: Option<Allocation>,
    memory_allocator: Arc<Mutex<Allocator>>,
    device: Arc<ash::Device>,
}

impl Texture {
    pub const FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

    /// Copies `data` into a new image through a staging buffer and blocks
    /// until the copy has finished on `queue`.
    pub fn upload(
        data: &TextureData,
        queue: &Queue,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let extent = vk::Extent2D {
            width: data.width,
            height: data.height,
        };
        let mut texture = Self::allocate(extent, mem_allocator, device)?;

        let staging = Buffer::with_data(
            &data.pixels,
            vk::BufferUsageFlags::TRANSFER_SRC,
            "Texture Staging Buffer",
            texture.memory_allocator.clone(),
            texture.device.clone(),
        )?;

        let mut commands = CommandAllocator::new(texture.device.clone(), queue)?;
        let mut fence = Fence::new(texture.device.clone())?;

        commands.begin_recording()?;
        texture.record_copy(commands.command_buffer, staging.buffer);
        commands.end_recording()?;

        let command_buffers = [commands.command_buffer];
        let submit = vk::SubmitInfo::default().command_buffers(&command_buffers);
        unsafe {
            texture
                .device
                .queue_submit(queue.handle, &[submit], fence.raw)?;
        }
        fence.arm(1);
        fence.wait(1)?;

        texture.create_view_and_sampler()?;

        log::debug!("Uploaded {}x{} texture", extent.width, extent.height);

        Ok(texture)
    }

    fn allocate(
        extent: vk::Extent2D,
        mem_allocator: Arc<Mutex<Allocator>>,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(Self::FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { device.create_image(&image_info, None)? };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let allocation = mem_allocator
            .lock()
            .map_err(|e| eyre!(e.to_string()))
            .and_then(|mut allocator| {
                Ok(allocator.allocate(&AllocationCreateDesc {
                    name: "Quad Texture",
                    requirements,
                    location: MemoryLocation::GpuOnly,
                    linear: false,
                    allocation_scheme: AllocationScheme::DedicatedImage(image),
                })?)
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        // From here on Drop releases everything created so far
        let texture = Self {
            image,
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent,

            allocation: Some(allocation),
            memory_allocator: mem_allocator,
            device,
        };

        if let Some(allocation) = texture.allocation.as_ref() {
            unsafe {
                texture.device.bind_image_memory(
                    texture.image,
                    allocation.memory(),
                    allocation.offset(),
                )?;
            }
        }

        Ok(texture)
    }

    fn record_copy(&self, cmd: vk::CommandBuffer, staging: vk::Buffer) {
        transition_image_layout(
            cmd,
            self.image,
            ResourceState::Common,
            ResourceState::CopyDest,
            &self.device,
        );
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                cmd,
                staging,
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[copy_region(self.extent)],
            );
        }
        transition_image_layout(
            cmd,
            self.image,
            ResourceState::CopyDest,
            ResourceState::PixelShaderResource,
            &self.device,
        );
    }

    fn create_view_and_sampler(&mut self) -> Result<()> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(Self::FORMAT)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        self.view = unsafe { self.device.create_image_view(&view_info, None)? };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .max_lod(vk::LOD_CLAMP_NONE);
        self.sampler = unsafe { self.device.create_sampler(&sampler_info, None)? };

        Ok(())
    }
}

/// Whole-image copy from a tightly packed buffer
fn copy_region(extent: vk::Extent2D) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: 0,
        // Zero means rows are tightly packed
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
        }
        if let Some(allocation) = self.allocation.take() {
            match self.memory_allocator.lock() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        log::error!("Failed to free texture memory: {}", e);
                    }
                }
                Err(e) => log::error!("Memory allocator poisoned: {}", e),
            }
        }
    }
}
