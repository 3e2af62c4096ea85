use std::ffi::CString;
use std::sync::Arc;
use ash::vk;
use color_eyre::eyre::{eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::commands::{BindPoint, PipelineShape, PrimitiveTopology};
use crate::renderer::geometry::TexturedVertex;
use crate::renderer::shader::ShaderBytecode;
use crate::renderer::vk::descriptor_table::{DescriptorTable, DescriptorTableBuilder};

/// Pipeline layout, optionally with one descriptor table for the quad's
/// texture
pub struct RootSignature {
    pub layout: vk::PipelineLayout,
    pub descriptor_table: Option<DescriptorTable>,
    device: Arc<ash::Device>,
}

impl RootSignature {
    pub fn empty(device: Arc<ash::Device>) -> Result<Self> {
        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };
        Ok(Self {
            layout,
            descriptor_table: None,
            device,
        })
    }

    /// Table 0 holds a sampled image at binding 0 and a sampler at binding 1,
    /// both visible to the pixel shader.
    pub fn with_texture_table(device: Arc<ash::Device>) -> Result<Self> {
        let table = DescriptorTableBuilder::new()
            .add_binding(0, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT)
            .add_binding(1, vk::DescriptorType::SAMPLER, vk::ShaderStageFlags::FRAGMENT)
            .build(device.clone())?;

        let set_layouts = [table.set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

        Ok(Self {
            layout,
            descriptor_table: Some(table),
            device,
        })
    }

    pub fn descriptor_tables(&self) -> u32 {
        self.descriptor_table.iter().count() as u32
    }
}

impl Drop for RootSignature {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Shader module that only lives until the pipeline is built
struct ShaderModule {
    raw: vk::ShaderModule,
    entry_point: CString,
    device: Arc<ash::Device>,
}

impl ShaderModule {
    fn new(bytecode: &ShaderBytecode, device: Arc<ash::Device>) -> Result<Self> {
        let entry_point = CString::new(bytecode.entry_point.as_str())?;
        let module_info = vk::ShaderModuleCreateInfo::default().code(&bytecode.words);
        let raw = unsafe { device.create_shader_module(&module_info, None)? };
        Ok(Self { raw, entry_point, device })
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.raw, None);
        }
    }
}

pub struct PipelineState {
    pub pipeline: vk::Pipeline,
    pub shape: PipelineShape,
    device: Arc<ash::Device>,
}

impl Drop for PipelineState {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

/// Vertex buffer bindings and the attributes read from them
pub struct VertexInputDescription {
    pub bindings: Vec<vk::VertexInputBindingDescription>,
    pub attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexInputDescription {
    /// One `vec3<f32>` at location 0
    pub fn position_only() -> Self {
        Self {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<glam::Vec3>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            }],
        }
    }

    /// `vec3<f32>` position at location 0, `vec2<f32>` uv at location 1
    pub fn position_uv() -> Self {
        Self {
            bindings: vec![vk::VertexInputBindingDescription {
                binding: 0,
                stride: std::mem::size_of::<TexturedVertex>() as u32,
                input_rate: vk::VertexInputRate::VERTEX,
            }],
            attributes: vec![
                vk::VertexInputAttributeDescription {
                    location: 0,
                    binding: 0,
                    format: vk::Format::R32G32B32_SFLOAT,
                    offset: std::mem::offset_of!(TexturedVertex, position) as u32,
                },
                vk::VertexInputAttributeDescription {
                    location: 1,
                    binding: 0,
                    format: vk::Format::R32G32_SFLOAT,
                    offset: std::mem::offset_of!(TexturedVertex, uv) as u32,
                },
            ],
        }
    }

    pub fn stride(&self) -> u32 {
        self.bindings.first().map_or(0, |binding| binding.stride)
    }
}

pub struct GraphicsPipelineBuilder<'a> {
    device: Arc<ash::Device>,

    vertex_input_description: VertexInputDescription,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'a>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'a>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisample: vk::PipelineMultisampleStateCreateInfo<'a>,
    topology: PrimitiveTopology,
    vertex_shader: Option<&'a ShaderBytecode>,
    pixel_shader: Option<&'a ShaderBytecode>,
    root_signature: Option<&'a RootSignature>,
    render_pass: vk::RenderPass,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new(device: Arc<ash::Device>) -> Self {
        Self {
            device,

            vertex_input_description: VertexInputDescription::position_only(),
            input_assembly: Self::default_input_assembly_info(),
            rasterization: Self::default_rasterization_info(),
            color_blend_attachment: Self::default_color_blend_state(),
            multisample: Self::default_multisample_info(),
            topology: PrimitiveTopology::TriangleList,
            vertex_shader: None,
            pixel_shader: None,
            root_signature: None,
            render_pass: vk::RenderPass::null(),
        }
    }

    pub fn with_shaders(mut self, vertex: &'a ShaderBytecode, pixel: &'a ShaderBytecode) -> Self {
        self.vertex_shader = Some(vertex);
        self.pixel_shader = Some(pixel);
        self
    }

    pub fn with_vertex_input(mut self, description: VertexInputDescription) -> Self {
        self.vertex_input_description = description;
        self
    }

    pub fn with_root_signature(mut self, root_signature: &'a RootSignature) -> Self {
        self.root_signature = Some(root_signature);
        self
    }

    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    pub fn build(self) -> Result<PipelineState> {
        let device = self.device;

        let vertex_bytecode = self
            .vertex_shader
            .ok_or_eyre("No vertex shader provided for pipeline")?;
        let pixel_bytecode = self
            .pixel_shader
            .ok_or_eyre("No pixel shader provided for pipeline")?;
        log::debug!(
            "Building pipeline from {} ({}) and {} ({})",
            vertex_bytecode.entry_point,
            vertex_bytecode.profile,
            pixel_bytecode.entry_point,
            pixel_bytecode.profile
        );
        let vertex_shader = ShaderModule::new(vertex_bytecode, device.clone())?;
        let pixel_shader = ShaderModule::new(pixel_bytecode, device.clone())?;
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.raw)
                .name(&vertex_shader.entry_point),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(pixel_shader.raw)
                .name(&pixel_shader.entry_point),
        ];

        let root_signature = self
            .root_signature
            .ok_or_eyre("No root signature provided for pipeline")?;

        if self.render_pass == vk::RenderPass::null() {
            return Err(eyre!("No render pass provided for pipeline"));
        }

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_input_description.bindings)
            .vertex_attribute_descriptions(&self.vertex_input_description.attributes);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let color_blend_attachments = [self.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        // Viewport and scissor are recorded per frame
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .layout(root_signature.layout)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterization)
            .multisample_state(&self.multisample)
            .color_blend_state(&color_blend_info)
            .dynamic_state(&dynamic_info)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipeline = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| eyre!("Failed to create graphics pipeline: {}", e))?
        }[0];

        Ok(PipelineState {
            pipeline,
            shape: PipelineShape {
                bind_point: BindPoint::Graphics,
                topology: self.topology,
                descriptor_tables: root_signature.descriptor_tables(),
            },
            device,
        })
    }

    fn default_input_assembly_info() -> vk::PipelineInputAssemblyStateCreateInfo<'a> {
        vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false)
    }

    fn default_rasterization_info() -> vk::PipelineRasterizationStateCreateInfo<'a> {
        vk::PipelineRasterizationStateCreateInfo::default()
            // Depth clip stays on: clamping is off
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
    }

    fn default_color_blend_state() -> vk::PipelineColorBlendAttachmentState {
        // Opaque: write every channel as-is
        vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
    }

    fn default_multisample_info() -> vk::PipelineMultisampleStateCreateInfo<'a> {
        vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            // 1 sample per pixel means no multisampling
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .min_sample_shading(1.0)
            .alpha_to_coverage_enable(false)
            .alpha_to_one_enable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_only_reads_one_vec3() {
        let input = VertexInputDescription::position_only();

        assert_eq!(input.stride(), 12);
        assert_eq!(input.attributes.len(), 1);
        assert_eq!(input.attributes[0].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn position_uv_matches_textured_vertex_layout() {
        let input = VertexInputDescription::position_uv();

        assert_eq!(input.stride(), 20);
        assert_eq!(input.attributes.len(), 2);
        assert_eq!(input.attributes[0].location, 0);
        assert_eq!(input.attributes[0].offset, 0);
        assert_eq!(input.attributes[1].location, 1);
        assert_eq!(input.attributes[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(input.attributes[1].offset, 12);
    }
}
