use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::descriptor_heap::DescriptorHeap;
use crate::renderer::vk::swapchain::Swapchain;

/// View + framebuffer describing one back-buffer as a colour target
pub struct RenderTargetView {
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    device: Arc<ash::Device>,
}

impl RenderTargetView {
    fn new(
        image: vk::Image,
        format: vk::Format,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
        device: Arc<ash::Device>,
    ) -> Result<Self> {
        let view_info = vk::ImageViewCreateInfo::default()
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::R,
                g: vk::ComponentSwizzle::G,
                b: vk::ComponentSwizzle::B,
                a: vk::ComponentSwizzle::A,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image(image);
        let image_view = unsafe { device.create_image_view(&view_info, None)? };

        let attachments = [image_view];
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let framebuffer = match unsafe { device.create_framebuffer(&framebuffer_info, None) } {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                unsafe { device.destroy_image_view(image_view, None) };
                return Err(e.into());
            }
        };

        Ok(Self {
            image_view,
            framebuffer,
            device,
        })
    }
}

impl Drop for RenderTargetView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}

/// Render pass for the back-buffers plus the heap of their views.
///
/// Layout transitions are left to explicit barriers: the attachment enters
/// and leaves the pass as `COLOR_ATTACHMENT_OPTIMAL`, and its previous
/// contents are discarded since every frame clears it.
pub struct RenderTargets {
    pub render_pass: vk::RenderPass,
    pub heap: DescriptorHeap<RenderTargetView>,
    pub extent: vk::Extent2D,
    device: Arc<ash::Device>,
}

impl RenderTargets {
    pub fn new(swapchain: &Swapchain, device: Arc<ash::Device>) -> Result<Self> {
        let render_pass = Self::create_render_pass(swapchain.format, &device)?;

        let heap = DescriptorHeap::for_each_resource(&swapchain.images, |_, image| {
            RenderTargetView::new(
                *image,
                swapchain.format,
                swapchain.extent,
                render_pass,
                device.clone(),
            )
        });
        let heap = match heap {
            Ok(heap) if !heap.is_empty() => heap,
            Ok(_) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(eyre!("Swapchain has no back-buffers"));
            }
            Err(e) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(e);
            }
        };
        log::debug!("Created {} render target views", heap.len());

        Ok(Self {
            render_pass,
            heap,
            extent: swapchain.extent,
            device,
        })
    }

    fn create_render_pass(format: vk::Format, device: &ash::Device) -> Result<vk::RenderPass> {
        let attachments = [vk::AttachmentDescription::default()
            .format(format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);

        Ok(unsafe { device.create_render_pass(&render_pass_info, None)? })
    }
}

impl Drop for RenderTargets {
    fn drop(&mut self) {
        // Framebuffers first, they were created against the pass
        self.heap.drain().for_each(drop);
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
