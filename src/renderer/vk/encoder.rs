use ash::vk;
use color_eyre::eyre::{bail, eyre, OptionExt};
use color_eyre::Result;
use crate::renderer::commands::{
    BindPoint, BufferId, Command, DrawIndexed, IndexBufferView, PipelineShape, PrimitiveTopology,
    ResourceState, ScissorRect, VertexBufferView, Viewport,
};
use crate::renderer::geometry::IndexFormat;
use crate::renderer::vk::buffer::Buffer;
use crate::renderer::vk::pipeline::{PipelineState, RootSignature};
use crate::renderer::vk::render_target::RenderTargets;
use crate::renderer::vk::util::transition_image_layout;

/// Tracks what a command stream has bound so far and rejects commands the
/// GPU would execute with missing or mismatched state.
#[derive(Debug)]
pub struct BindingState {
    back_buffer_count: u32,
    shape: PipelineShape,

    pipeline_bound: bool,
    render_target: Option<u32>,
    root_signature: Option<BindPoint>,
    /// Bit `i` set once table `i` is bound
    bound_tables: u64,
    topology: Option<PrimitiveTopology>,
    vertex_buffer: Option<VertexBufferView>,
    index_buffer: Option<IndexBufferView>,
}

impl BindingState {
    pub fn new(back_buffer_count: u32, shape: PipelineShape) -> Self {
        Self {
            back_buffer_count,
            shape,
            pipeline_bound: false,
            render_target: None,
            root_signature: None,
            bound_tables: 0,
            topology: None,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    pub fn apply(&mut self, command: &Command) -> Result<()> {
        match *command {
            Command::Barrier { back_buffer, .. } => {
                self.check_back_buffer(back_buffer)?;
                // A barrier closes the current pass
                self.render_target = None;
            }
            Command::SetPipelineState => {
                self.pipeline_bound = true;
            }
            Command::SetRenderTarget { slot } => {
                self.check_back_buffer(slot)?;
                self.render_target = Some(slot);
            }
            Command::ClearRenderTarget { slot, .. } => {
                if self.render_target != Some(slot) {
                    bail!("Clear of render target {} while {:?} is bound", slot, self.render_target);
                }
            }
            Command::SetViewport(_) | Command::SetScissor(_) => {}
            Command::SetRootSignature(bind_point) => {
                if bind_point != self.shape.bind_point {
                    bail!(
                        "Root signature bound at the {:?} point, pipeline uses {:?}",
                        bind_point,
                        self.shape.bind_point
                    );
                }
                self.root_signature = Some(bind_point);
                // A new root signature drops every table bound through the old one
                self.bound_tables = 0;
            }
            Command::SetDescriptorTable { index } => {
                if self.root_signature != Some(BindPoint::Graphics) {
                    bail!("Descriptor table {} bound before a graphics root signature", index);
                }
                if index >= self.shape.descriptor_tables {
                    bail!(
                        "Descriptor table {} out of range ({} tables)",
                        index,
                        self.shape.descriptor_tables
                    );
                }
                let bit = 1u64
                    .checked_shl(index)
                    .ok_or_else(|| eyre!("Descriptor table {} exceeds 64 tables", index))?;
                self.bound_tables |= bit;
            }
            Command::SetPrimitiveTopology(topology) => {
                if topology != self.shape.topology {
                    bail!(
                        "Topology {:?} does not match pipeline topology {:?}",
                        topology,
                        self.shape.topology
                    );
                }
                self.topology = Some(topology);
            }
            Command::SetVertexBuffer(view) => {
                self.vertex_buffer = Some(view);
            }
            Command::SetIndexBuffer(view) => {
                self.index_buffer = Some(view);
            }
            Command::DrawIndexed(draw) => {
                if !self.pipeline_bound {
                    bail!("Draw without a pipeline state");
                }
                if self.root_signature != Some(BindPoint::Graphics) {
                    bail!("Draw without a graphics root signature");
                }
                if self.bound_tables != self.every_table() {
                    bail!(
                        "Draw with descriptor tables {:#b} bound, pipeline needs {}",
                        self.bound_tables,
                        self.shape.descriptor_tables
                    );
                }
                if self.render_target.is_none() {
                    bail!("Draw without a render target");
                }
                if self.topology.is_none() || self.vertex_buffer.is_none() {
                    bail!("Draw without topology and vertex buffer");
                }
                let index_buffer = self
                    .index_buffer
                    .ok_or_else(|| eyre!("Indexed draw without an index buffer"))?;
                let end = draw.first_index as u64 + draw.index_count as u64;
                if end > index_buffer.index_capacity() as u64 {
                    bail!(
                        "Draw reads indices up to {} but the index buffer holds {}",
                        end,
                        index_buffer.index_capacity()
                    );
                }
            }
        }
        Ok(())
    }

    fn every_table(&self) -> u64 {
        match self.shape.descriptor_tables {
            0 => 0,
            n if n >= 64 => u64::MAX,
            n => (1u64 << n) - 1,
        }
    }

    fn check_back_buffer(&self, index: u32) -> Result<()> {
        if index >= self.back_buffer_count {
            bail!("Back-buffer {} out of range ({} buffers)", index, self.back_buffer_count);
        }
        Ok(())
    }
}

/// Receives validated commands, one native call each. Opening and closing
/// render passes is driven by `encode`.
pub trait CommandSink {
    fn barrier(&mut self, back_buffer: u32, before: ResourceState, after: ResourceState) -> Result<()>;
    fn bind_pipeline(&mut self) -> Result<()>;
    fn begin_render_pass(&mut self, slot: u32) -> Result<()>;
    fn end_render_pass(&mut self);
    fn clear(&mut self, color: [f32; 4]) -> Result<()>;
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;
    fn set_scissor(&mut self, rect: ScissorRect) -> Result<()>;
    fn bind_descriptor_table(&mut self, index: u32) -> Result<()>;
    fn bind_vertex_buffer(&mut self, view: VertexBufferView) -> Result<()>;
    fn bind_index_buffer(&mut self, view: IndexBufferView) -> Result<()>;
    fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<()>;
}

pub fn validate(commands: &[Command], back_buffer_count: u32, shape: PipelineShape) -> Result<()> {
    let mut state = BindingState::new(back_buffer_count, shape);
    commands.iter().try_for_each(|command| state.apply(command))
}

/// Validates the whole list, then replays it into `sink`. Nothing is emitted
/// for an invalid list, and a render pass left open by a failed emission is
/// closed before returning, so the command buffer can always be ended.
pub fn encode<S: CommandSink>(
    commands: &[Command],
    back_buffer_count: u32,
    shape: PipelineShape,
    sink: &mut S,
) -> Result<()> {
    validate(commands, back_buffer_count, shape)?;

    let mut render_pass_open = false;
    let emitted = commands
        .iter()
        .try_for_each(|command| emit(command, &mut render_pass_open, sink));

    if render_pass_open {
        sink.end_render_pass();
    }

    emitted
}

fn emit<S: CommandSink>(command: &Command, render_pass_open: &mut bool, sink: &mut S) -> Result<()> {
    match *command {
        Command::Barrier { back_buffer, before, after } => {
            if *render_pass_open {
                sink.end_render_pass();
                *render_pass_open = false;
            }
            sink.barrier(back_buffer, before, after)
        }
        Command::SetPipelineState => sink.bind_pipeline(),
        Command::SetRenderTarget { slot } => {
            if *render_pass_open {
                sink.end_render_pass();
                *render_pass_open = false;
            }
            sink.begin_render_pass(slot)?;
            *render_pass_open = true;
            Ok(())
        }
        Command::ClearRenderTarget { color, .. } => sink.clear(color),
        Command::SetViewport(viewport) => sink.set_viewport(viewport),
        Command::SetScissor(rect) => sink.set_scissor(rect),
        // The topology is part of the pipeline and the layout is bound with
        // each table; both were checked during validation
        Command::SetRootSignature(_) | Command::SetPrimitiveTopology(_) => Ok(()),
        Command::SetDescriptorTable { index } => sink.bind_descriptor_table(index),
        Command::SetVertexBuffer(view) => sink.bind_vertex_buffer(view),
        Command::SetIndexBuffer(view) => sink.bind_index_buffer(view),
        Command::DrawIndexed(draw) => sink.draw_indexed(draw),
    }
}

/// Everything a command list can refer to
pub struct EncodeContext<'a> {
    pub device: &'a ash::Device,
    pub command_buffer: vk::CommandBuffer,
    pub back_buffers: &'a [vk::Image],
    pub targets: &'a RenderTargets,
    pub pipeline: &'a PipelineState,
    pub root_signature: &'a RootSignature,
    pub buffers: &'a [Buffer],
}

impl EncodeContext<'_> {
    fn buffer(&self, id: BufferId) -> Result<&Buffer> {
        self.buffers
            .get(id.0)
            .ok_or_else(|| eyre!("Unknown buffer {:?}", id))
    }

    fn full_rect(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.targets.extent,
        }
    }
}

impl CommandSink for EncodeContext<'_> {
    fn barrier(&mut self, back_buffer: u32, before: ResourceState, after: ResourceState) -> Result<()> {
        let image = self
            .back_buffers
            .get(back_buffer as usize)
            .ok_or_else(|| eyre!("Unknown back-buffer {}", back_buffer))?;
        transition_image_layout(self.command_buffer, *image, before, after, self.device);
        Ok(())
    }

    fn bind_pipeline(&mut self) -> Result<()> {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.pipeline,
            );
        }
        Ok(())
    }

    fn begin_render_pass(&mut self, slot: u32) -> Result<()> {
        let view = self.targets.heap.get(slot)?;
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.targets.render_pass)
            .framebuffer(view.framebuffer)
            .render_area(self.full_rect());
        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
        Ok(())
    }

    fn end_render_pass(&mut self) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<()> {
        let attachments = [vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        }];
        let rects = [vk::ClearRect {
            rect: self.full_rect(),
            base_array_layer: 0,
            layer_count: 1,
        }];
        unsafe {
            self.device
                .cmd_clear_attachments(self.command_buffer, &attachments, &rects);
        }
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        unsafe {
            self.device.cmd_set_viewport(
                self.command_buffer,
                0,
                &[vk::Viewport {
                    x: viewport.x,
                    y: viewport.y,
                    width: viewport.width,
                    height: viewport.height,
                    min_depth: viewport.min_depth,
                    max_depth: viewport.max_depth,
                }],
            );
        }
        Ok(())
    }

    fn set_scissor(&mut self, rect: ScissorRect) -> Result<()> {
        unsafe {
            self.device.cmd_set_scissor(
                self.command_buffer,
                0,
                &[vk::Rect2D {
                    offset: vk::Offset2D { x: rect.left, y: rect.top },
                    extent: vk::Extent2D {
                        width: (rect.right - rect.left).max(0) as u32,
                        height: (rect.bottom - rect.top).max(0) as u32,
                    },
                }],
            );
        }
        Ok(())
    }

    fn bind_descriptor_table(&mut self, index: u32) -> Result<()> {
        // The only table lives at index 0
        let table = self
            .root_signature
            .descriptor_table
            .as_ref()
            .filter(|_| index == 0)
            .ok_or_eyre("Root signature has no such descriptor table")?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.root_signature.layout,
                index,
                &[table.set],
                &[],
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, view: VertexBufferView) -> Result<()> {
        let buffer = self.buffer(view.buffer)?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[buffer.buffer],
                &[0],
            );
        }
        Ok(())
    }

    fn bind_index_buffer(&mut self, view: IndexBufferView) -> Result<()> {
        let buffer = self.buffer(view.buffer)?;
        let index_type = match view.format {
            IndexFormat::Uint16 => vk::IndexType::UINT16,
        };
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                buffer.buffer,
                0,
                index_type,
            );
        }
        Ok(())
    }

    fn draw_indexed(&mut self, draw: DrawIndexed) -> Result<()> {
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                draw.index_count,
                draw.instance_count,
                draw.first_index,
                draw.base_vertex,
                draw.first_instance,
            );
        }
        Ok(())
    }
}
