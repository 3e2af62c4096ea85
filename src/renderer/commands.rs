use smallvec::SmallVec;
use thiserror::Error;
use crate::renderer::geometry::IndexFormat;

/// Usage state of an image as seen by barriers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Freshly created, contents undefined
    Common,
    Present,
    RenderTarget,
    CopyDest,
    PixelShaderResource,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BindPoint {
    Graphics,
    Compute,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
}

/// What a pipeline expects to be bound before it can draw
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PipelineShape {
    pub bind_point: BindPoint,
    pub topology: PrimitiveTopology,
    /// Descriptor tables in the root signature, bound by index
    pub descriptor_tables: u32,
}

/// Index into the backend's buffer table
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VertexBufferView {
    pub buffer: BufferId,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IndexBufferView {
    pub buffer: BufferId,
    pub size_in_bytes: u32,
    pub format: IndexFormat,
}

impl IndexBufferView {
    pub fn index_capacity(&self) -> u32 {
        self.size_in_bytes / self.format.size_in_bytes()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScissorRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DrawIndexed {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawIndexed {
    /// One instance covering every index in `indices`
    pub fn covering<T>(indices: &[T]) -> Self {
        Self {
            index_count: indices.len() as u32,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
    Barrier {
        back_buffer: u32,
        before: ResourceState,
        after: ResourceState,
    },
    SetPipelineState,
    SetRenderTarget { slot: u32 },
    ClearRenderTarget { slot: u32, color: [f32; 4] },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    SetRootSignature(BindPoint),
    SetDescriptorTable { index: u32 },
    SetPrimitiveTopology(PrimitiveTopology),
    SetVertexBuffer(VertexBufferView),
    SetIndexBuffer(IndexBufferView),
    DrawIndexed(DrawIndexed),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ListState {
    Recording,
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandListError {
    #[error("cannot record into a closed command list; reset it first")]
    RecordWhileClosed,
    #[error("command list is already closed")]
    AlreadyClosed,
    #[error("command list must be closed before submission")]
    SubmitWhileRecording,
}

/// Backend-neutral recording of one frame's commands
#[derive(Debug)]
pub struct CommandList {
    commands: SmallVec<[Command; 16]>,
    state: ListState,
}

impl CommandList {
    pub fn new() -> Self {
        Self {
            commands: SmallVec::new(),
            state: ListState::Recording,
        }
    }

    pub fn state(&self) -> ListState {
        self.state
    }

    pub fn record(&mut self, command: Command) -> Result<(), CommandListError> {
        if self.state == ListState::Closed {
            return Err(CommandListError::RecordWhileClosed);
        }
        self.commands.push(command);
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), CommandListError> {
        if self.state == ListState::Closed {
            return Err(CommandListError::AlreadyClosed);
        }
        self.state = ListState::Closed;
        Ok(())
    }

    /// Commands ready for submission
    pub fn commands(&self) -> Result<&[Command], CommandListError> {
        match self.state {
            ListState::Closed => Ok(&self.commands),
            ListState::Recording => Err(CommandListError::SubmitWhileRecording),
        }
    }

    pub fn reset(&mut self) {
        self.commands.clear();
        self.state = ListState::Recording;
    }
}

impl Default for CommandList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::geometry::QUAD_INDICES;

    #[test]
    fn close_before_submit() {
        let mut list = CommandList::new();
        list.record(Command::SetPipelineState).unwrap();

        assert_eq!(list.commands(), Err(CommandListError::SubmitWhileRecording));

        list.close().unwrap();
        assert_eq!(list.commands().unwrap(), &[Command::SetPipelineState]);
    }

    #[test]
    fn reset_before_reuse() {
        let mut list = CommandList::new();
        list.close().unwrap();

        assert_eq!(
            list.record(Command::SetPipelineState),
            Err(CommandListError::RecordWhileClosed)
        );
        assert_eq!(list.close(), Err(CommandListError::AlreadyClosed));

        list.reset();
        assert_eq!(list.state(), ListState::Recording);
        list.record(Command::SetPipelineState).unwrap();
    }

    #[test]
    fn reset_discards_previous_frame() {
        let mut list = CommandList::new();
        list.record(Command::SetPipelineState).unwrap();
        list.close().unwrap();
        list.reset();
        list.close().unwrap();

        assert!(list.commands().unwrap().is_empty());
    }

    #[test]
    fn draw_counts_indices_not_bytes() {
        let draw = DrawIndexed::covering(&QUAD_INDICES);

        assert_eq!(draw.index_count, 6);
        assert_ne!(draw.index_count as usize, std::mem::size_of_val(&QUAD_INDICES));
        assert_eq!(draw.instance_count, 1);
    }

    #[test]
    fn index_capacity_uses_format_size() {
        let view = IndexBufferView {
            buffer: BufferId(1),
            size_in_bytes: 12,
            format: IndexFormat::Uint16,
        };
        assert_eq!(view.index_capacity(), 6);
    }
}
