use ash::vk;
use crate::renderer::commands::ResourceState;

/// Layout, pipeline stage and access an image has in `state`.
/// Leaving `Present` or `Common` discards the contents, so it reads as `UNDEFINED`.
fn barrier_scope(
    state: ResourceState,
    leaving: bool,
) -> (vk::ImageLayout, vk::PipelineStageFlags, vk::AccessFlags) {
    match (state, leaving) {
        (ResourceState::Present, true) => (
            vk::ImageLayout::UNDEFINED,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::empty(),
        ),
        (ResourceState::Present, false) => (
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
        (ResourceState::Common, _) => (
            vk::ImageLayout::UNDEFINED,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
        (ResourceState::CopyDest, _) => (
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
        ),
        (ResourceState::PixelShaderResource, _) => (
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        (ResourceState::RenderTarget, _) => (
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
    }
}

pub fn transition_image_layout(
    cmd: vk::CommandBuffer,
    image: vk::Image,
    before: ResourceState,
    after: ResourceState,
    device: &ash::Device,
) {
    if before == after {
        return;
    }

    let (old_layout, src_stage_mask, src_access_mask) = barrier_scope(before, true);
    let (new_layout, dst_stage_mask, dst_access_mask) = barrier_scope(after, false);

    let image_barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access_mask)
        .dst_access_mask(dst_access_mask)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device.cmd_pipeline_barrier(
            cmd,
            src_stage_mask,
            dst_stage_mask,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[image_barrier],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entering_render_target_discards_presented_contents() {
        let (old_layout, _, access) = barrier_scope(ResourceState::Present, true);
        let (new_layout, stage, _) = barrier_scope(ResourceState::RenderTarget, false);

        assert_eq!(old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(access, vk::AccessFlags::empty());
        assert_eq!(new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn returning_to_present_uses_present_layout() {
        let (old_layout, _, access) = barrier_scope(ResourceState::RenderTarget, true);
        let (new_layout, _, _) = barrier_scope(ResourceState::Present, false);

        assert_eq!(old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(access, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
        assert_eq!(new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn texture_upload_goes_through_transfer_then_shader_read() {
        let (old_layout, src_stage, src_access) = barrier_scope(ResourceState::Common, true);
        let (copy_layout, copy_stage, copy_access) = barrier_scope(ResourceState::CopyDest, false);

        assert_eq!(old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(src_access, vk::AccessFlags::empty());
        assert_eq!(copy_layout, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(copy_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(copy_access, vk::AccessFlags::TRANSFER_WRITE);

        let (read_layout, read_stage, read_access) =
            barrier_scope(ResourceState::PixelShaderResource, false);
        assert_eq!(read_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(read_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(read_access, vk::AccessFlags::SHADER_READ);
    }
}
