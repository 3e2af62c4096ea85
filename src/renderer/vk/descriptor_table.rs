use std::sync::Arc;
use ash::vk;
use color_eyre::Result;
use crate::renderer::vk::texture::Texture;

pub struct DescriptorTableBuilder<'a> {
    bindings: Vec<vk::DescriptorSetLayoutBinding<'a>>,
}

impl DescriptorTableBuilder<'_> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(stages);

        self.bindings.push(binding);
        self
    }

    /// One pool entry per descriptor type, enough for a single set
    fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            match sizes.iter_mut().find(|size| size.ty == binding.descriptor_type) {
                Some(size) => size.descriptor_count += binding.descriptor_count,
                None => sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: binding.descriptor_count,
                }),
            }
        }
        sizes
    }

    pub fn build(self, device: Arc<ash::Device>) -> Result<DescriptorTable> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&self.bindings);
        let set_layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        let pool_sizes = self.pool_sizes();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = match unsafe { device.create_descriptor_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_descriptor_set_layout(set_layout, None) };
                return Err(e.into());
            }
        };

        // From here on Drop releases the pool and layout
        let mut table = DescriptorTable {
            set_layout,
            pool,
            set: vk::DescriptorSet::null(),
            device,
        };

        let set_layouts = [set_layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&set_layouts);
        table.set = unsafe { table.device.allocate_descriptor_sets(&alloc_info)? }[0];

        Ok(table)
    }
}

/// A descriptor set layout and the one set allocated from it
pub struct DescriptorTable {
    pub set_layout: vk::DescriptorSetLayout,
    pub set: vk::DescriptorSet,
    pool: vk::DescriptorPool,
    device: Arc<ash::Device>,
}

impl DescriptorTable {
    /// Points binding 0 at the texture's view and binding 1 at its sampler.
    pub fn write_texture(&self, texture: &Texture) {
        let image_info = [vk::DescriptorImageInfo::default()
            .image_view(texture.view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)];
        let sampler_info = [vk::DescriptorImageInfo::default().sampler(texture.sampler)];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                .image_info(&image_info),
            vk::WriteDescriptorSet::default()
                .dst_set(self.set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::SAMPLER)
                .image_info(&sampler_info),
        ];

        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
        }
    }
}

impl Drop for DescriptorTable {
    fn drop(&mut self) {
        unsafe {
            // Frees the set as well
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_holds_one_descriptor_per_binding() {
        let builder = DescriptorTableBuilder::new()
            .add_binding(0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT)
            .add_binding(1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT);

        let sizes = builder.pool_sizes();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::SAMPLED_IMAGE);
        assert_eq!(sizes[0].descriptor_count, 1);
        assert_eq!(sizes[1].ty, vk::DescriptorType::SAMPLER);
        assert_eq!(sizes[1].descriptor_count, 1);
    }

    #[test]
    fn repeated_types_share_a_pool_entry() {
        let builder = DescriptorTableBuilder::new()
            .add_binding(0, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT)
            .add_binding(1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::VERTEX);

        let sizes = builder.pool_sizes();
        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].descriptor_count, 2);
    }
}
