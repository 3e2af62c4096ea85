use std::sync::{Arc, Mutex};
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use winit::window::Window;
use crate::config::Config;
use crate::renderer::commands::{
    BufferId, CommandList, DrawIndexed, IndexBufferView, VertexBufferView,
};
use crate::renderer::frame::{FrameBackend, FramePlan};
use crate::renderer::geometry::{IndexFormat, QUAD_INDICES, QUAD_VERTICES, TEXTURED_QUAD_VERTICES};
use crate::renderer::shader::ShaderSet;
use crate::renderer::texture::TextureData;
use crate::renderer::vk::buffer::Buffer;
use crate::renderer::vk::command::CommandAllocator;
use crate::renderer::vk::device::Device;
use crate::renderer::vk::encoder::{encode, EncodeContext};
use crate::renderer::vk::instance::{Instance, Surface};
use crate::renderer::vk::pipeline::{
    GraphicsPipelineBuilder, PipelineState, RootSignature, VertexInputDescription,
};
use crate::renderer::vk::render_target::RenderTargets;
use crate::renderer::vk::swapchain::Swapchain;
use crate::renderer::vk::sync::{Fence, Semaphore};
use crate::renderer::vk::texture::Texture;

/// Every GPU object the quad needs. Fields are released top to bottom, so
/// anything created from another object is declared above it.
pub struct VulkanBackend {
    image_available: Semaphore,
    /// One per back-buffer, waited on by present
    render_finished: Vec<Semaphore>,
    fence: Fence,
    commands: CommandAllocator,

    pipeline: PipelineState,
    root_signature: RootSignature,
    // Read by the GPU through the root signature's descriptor table
    #[allow(dead_code)]
    texture: Option<Texture>,
    buffers: Vec<Buffer>,
    targets: RenderTargets,
    swapchain: Swapchain,
    // Only held so it outlives the texture and buffers above
    #[allow(dead_code)]
    memory_allocator: Arc<Mutex<Allocator>>,

    device: Device,
    // The swapchain and device above are created from these and must be
    // released first
    #[allow(dead_code)]
    surface: Surface,
    #[allow(dead_code)]
    instance: Instance,

    acquired: Option<u32>,
}

impl VulkanBackend {
    /// Builds the textured variant when `texture` is given: a root signature
    /// with one descriptor table and a position + uv vertex layout.
    pub fn new(
        window: &Window,
        config: &Config,
        shaders: &ShaderSet,
        texture: Option<&TextureData>,
    ) -> Result<(Self, FramePlan)> {
        let instance = Instance::new(window, config.enable_debug_layer)?;
        let surface = Surface::new(&instance, window)?;
        let device = Device::new(&instance, &surface, config.preferred_adapter.as_deref())?;

        log::info!(
            "Feature level {} on {:?}",
            device.feature_level,
            device.adapter.name
        );

        let memory_allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.raw.clone(),
            device: (*device.logical).clone(),
            physical_device: device.physical,
            debug_settings: gpu_allocator::AllocatorDebugSettings {
                log_memory_information: false,
                log_leaks_on_shutdown: true,
                store_stack_traces: false,
                log_allocations: cfg!(debug_assertions),
                log_frees: cfg!(debug_assertions),
                log_stack_traces: false,
            },
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        let memory_allocator = Arc::new(Mutex::new(memory_allocator));

        let window_size = window.inner_size();
        let swapchain = Swapchain::new(
            &instance,
            &device,
            &surface,
            vk::Extent2D {
                width: window_size.width,
                height: window_size.height,
            },
        )?;
        let targets = RenderTargets::new(&swapchain, device.logical.clone())?;

        let (root_signature, vertex_input) = match texture {
            Some(_) => (
                RootSignature::with_texture_table(device.logical.clone())?,
                VertexInputDescription::position_uv(),
            ),
            None => (
                RootSignature::empty(device.logical.clone())?,
                VertexInputDescription::position_only(),
            ),
        };
        let vertex_stride = vertex_input.stride();
        let pipeline = GraphicsPipelineBuilder::new(device.logical.clone())
            .with_shaders(&shaders.vertex, &shaders.pixel)
            .with_vertex_input(vertex_input)
            .with_root_signature(&root_signature)
            .with_render_pass(targets.render_pass)
            .build()?;

        let texture = match (texture, root_signature.descriptor_table.as_ref()) {
            (Some(data), Some(table)) => {
                let texture = Texture::upload(
                    data,
                    &device.queue,
                    memory_allocator.clone(),
                    device.logical.clone(),
                )?;
                table.write_texture(&texture);
                Some(texture)
            }
            _ => None,
        };

        let vertex_buffer = match texture {
            Some(_) => Buffer::with_data(
                &TEXTURED_QUAD_VERTICES,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                "Quad Vertex Buffer",
                memory_allocator.clone(),
                device.logical.clone(),
            )?,
            None => Buffer::with_data(
                &QUAD_VERTICES,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                "Quad Vertex Buffer",
                memory_allocator.clone(),
                device.logical.clone(),
            )?,
        };
        let index_buffer = Buffer::with_data(
            &QUAD_INDICES,
            vk::BufferUsageFlags::INDEX_BUFFER,
            "Quad Index Buffer",
            memory_allocator.clone(),
            device.logical.clone(),
        )?;

        let vertex_view = VertexBufferView {
            buffer: BufferId(0),
            size_in_bytes: vertex_buffer.size as u32,
            stride_in_bytes: vertex_stride,
        };
        let index_view = IndexBufferView {
            buffer: BufferId(1),
            size_in_bytes: index_buffer.size as u32,
            format: IndexFormat::Uint16,
        };
        let buffers = vec![vertex_buffer, index_buffer];

        let commands = CommandAllocator::new(device.logical.clone(), &device.queue)?;
        let fence = Fence::new(device.logical.clone())?;
        let image_available = Semaphore::new(device.logical.clone())?;
        let render_finished = swapchain
            .images
            .iter()
            .map(|_| Semaphore::new(device.logical.clone()))
            .collect::<Result<Vec<_>>>()?;

        let plan = FramePlan::new(
            swapchain.extent.width,
            swapchain.extent.height,
            config.clear_color,
            vertex_view,
            index_view,
            DrawIndexed::covering(&QUAD_INDICES),
        )
        .with_descriptor_tables(root_signature.descriptor_tables());

        log::info!(
            "Renderer ready: {}x{} with {} back-buffers{}",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len(),
            if texture.is_some() { ", textured" } else { "" }
        );

        let backend = Self {
            image_available,
            render_finished,
            fence,
            commands,
            pipeline,
            root_signature,
            texture,
            buffers,
            targets,
            swapchain,
            memory_allocator,
            device,
            surface,
            instance,
            acquired: None,
        };

        Ok((backend, plan))
    }
}

impl FrameBackend for VulkanBackend {
    fn acquire_back_buffer(&mut self) -> Result<u32> {
        if let Some(index) = self.acquired {
            return Err(eyre!("Back-buffer {} acquired but never presented", index));
        }

        let index = self.swapchain.acquire(self.image_available.raw)?;
        if index as usize >= self.render_finished.len() {
            return Err(eyre!("Swapchain returned back-buffer {} out of range", index));
        }

        self.acquired = Some(index);
        Ok(index)
    }

    fn execute(&mut self, list: &CommandList, fence_value: u64) -> Result<()> {
        let back_buffer = self
            .acquired
            .ok_or_eyre("Submission without an acquired back-buffer")?;
        let commands = list.commands()?;

        self.commands.begin_recording()?;
        let mut context = EncodeContext {
            device: &self.device.logical,
            command_buffer: self.commands.command_buffer,
            back_buffers: &self.swapchain.images,
            targets: &self.targets,
            pipeline: &self.pipeline,
            root_signature: &self.root_signature,
            buffers: &self.buffers,
        };
        let encoded = encode(
            commands,
            self.swapchain.images.len() as u32,
            self.pipeline.shape,
            &mut context,
        );
        // `encode` leaves no render pass open, even on failure
        self.commands.end_recording()?;
        encoded?;

        let wait_semaphores = [self.image_available.raw];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.commands.command_buffer];
        let signal_semaphores = [self.render_finished[back_buffer as usize].raw];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.logical.queue_submit(
                self.device.queue.handle,
                &[submit],
                self.fence.raw,
            )?;
        }
        self.fence.arm(fence_value);

        Ok(())
    }

    fn completed_fence_value(&mut self) -> Result<u64> {
        self.fence.completed_value()
    }

    fn wait_for_fence(&mut self, value: u64) -> Result<()> {
        self.fence.wait(value)
    }

    fn reset_command_allocator(&mut self) -> Result<()> {
        self.commands.reset()
    }

    fn present(&mut self, back_buffer: u32) -> Result<()> {
        if self.acquired.take() != Some(back_buffer) {
            return Err(eyre!("Presenting back-buffer {} that was not acquired", back_buffer));
        }

        self.swapchain.present(
            self.device.queue.handle,
            back_buffer,
            self.render_finished[back_buffer as usize].raw,
        )
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for the GPU before teardown: {}", e);
        }
        log::debug!("Releasing GPU objects");
    }
}
