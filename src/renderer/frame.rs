use color_eyre::eyre::eyre;
use color_eyre::Result;
use crate::renderer::commands::{
    BindPoint, Command, CommandList, DrawIndexed, IndexBufferView, PrimitiveTopology,
    ResourceState, ScissorRect, VertexBufferView, Viewport,
};
use crate::renderer::fence::FenceValue;

/// What the frame loop needs from a graphics backend
pub trait FrameBackend {
    /// Index of the back-buffer the next frame renders into
    fn acquire_back_buffer(&mut self) -> Result<u32>;

    /// Encodes and submits a closed list; the fence reaches `fence_value`
    /// once the GPU has finished it.
    fn execute(&mut self, list: &CommandList, fence_value: u64) -> Result<()>;

    fn completed_fence_value(&mut self) -> Result<u64>;

    /// Blocks without timeout until the fence reaches `value`
    fn wait_for_fence(&mut self, value: u64) -> Result<()>;

    /// Recycles the memory behind recorded commands. Only legal once every
    /// submission recorded from it has completed.
    fn reset_command_allocator(&mut self) -> Result<()>;

    fn present(&mut self, back_buffer: u32) -> Result<()>;
}

/// Fixed per-frame state, built once during setup
#[derive(Debug, Clone)]
pub struct FramePlan {
    pub clear_color: [f32; 4],
    pub viewport: Viewport,
    pub scissor: ScissorRect,
    pub vertex_buffer: VertexBufferView,
    pub index_buffer: IndexBufferView,
    pub draw: DrawIndexed,
    /// Tables bound after the root signature, indices `0..descriptor_tables`
    pub descriptor_tables: u32,
}

impl FramePlan {
    pub fn new(
        width: u32,
        height: u32,
        clear_color: [f32; 4],
        vertex_buffer: VertexBufferView,
        index_buffer: IndexBufferView,
        draw: DrawIndexed,
    ) -> Self {
        Self {
            clear_color,
            viewport: Viewport {
                x: 0.0,
                y: 0.0,
                width: width as f32,
                height: height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: ScissorRect {
                left: 0,
                top: 0,
                right: width as i32,
                bottom: height as i32,
            },
            vertex_buffer,
            index_buffer,
            draw,
            descriptor_tables: 0,
        }
    }

    pub fn with_descriptor_tables(mut self, count: u32) -> Self {
        self.descriptor_tables = count;
        self
    }

    pub fn record(&self, list: &mut CommandList, back_buffer: u32) -> Result<()> {
        let setup = [
            Command::Barrier {
                back_buffer,
                before: ResourceState::Present,
                after: ResourceState::RenderTarget,
            },
            Command::SetPipelineState,
            Command::SetRenderTarget { slot: back_buffer },
            Command::ClearRenderTarget {
                slot: back_buffer,
                color: self.clear_color,
            },
            Command::SetViewport(self.viewport),
            Command::SetScissor(self.scissor),
            Command::SetRootSignature(BindPoint::Graphics),
        ];
        let tables = (0..self.descriptor_tables).map(|index| Command::SetDescriptorTable { index });
        let draw = [
            Command::SetPrimitiveTopology(PrimitiveTopology::TriangleList),
            Command::SetVertexBuffer(self.vertex_buffer),
            Command::SetIndexBuffer(self.index_buffer),
            Command::DrawIndexed(self.draw),
            Command::Barrier {
                back_buffer,
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            },
        ];

        for command in setup.into_iter().chain(tables).chain(draw) {
            list.record(command)?;
        }

        Ok(())
    }
}

/// Drives one fully serialized frame at a time: record, submit, wait, reset,
/// present.
#[derive(Debug)]
pub struct FrameLoop {
    plan: FramePlan,
    list: CommandList,
    fence: FenceValue,
    frames_presented: u64,
}

impl FrameLoop {
    pub fn new(plan: FramePlan) -> Self {
        Self {
            plan,
            list: CommandList::new(),
            fence: FenceValue::new(0),
            frames_presented: 0,
        }
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn render<B: FrameBackend>(&mut self, backend: &mut B) -> Result<()> {
        let back_buffer = backend.acquire_back_buffer()?;

        self.plan.record(&mut self.list, back_buffer)?;
        self.list.close()?;

        let fence_value = self.fence.next_signal();
        backend.execute(&self.list, fence_value)?;

        self.fence.observe(backend.completed_fence_value()?);
        if !self.fence.is_complete(fence_value) {
            backend.wait_for_fence(fence_value)?;
            self.fence.observe(backend.completed_fence_value()?);
        }
        if !self.fence.is_complete(fence_value) {
            return Err(eyre!(
                "Fence at {} after waiting for {}",
                self.fence.completed(),
                fence_value
            ));
        }

        backend.reset_command_allocator()?;
        self.list.reset();

        backend.present(back_buffer)?;
        self.frames_presented += 1;

        log::trace!("Frame {} presented from back-buffer {}", self.frames_presented, back_buffer);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::commands::BufferId;
    use crate::renderer::geometry::{IndexFormat, QUAD_INDICES};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Acquire(u32),
        Execute { fence_value: u64, commands: Vec<Command> },
        Wait(u64),
        ResetAllocator,
        Present(u32),
    }

    /// Two back-buffers; the "GPU" only finishes work when waited on unless
    /// `finishes_immediately` is set.
    struct MockBackend {
        calls: Vec<Call>,
        next_back_buffer: u32,
        pending: u64,
        completed: u64,
        finishes_immediately: bool,
        wait_is_broken: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                next_back_buffer: 0,
                pending: 0,
                completed: 0,
                finishes_immediately: false,
                wait_is_broken: false,
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn acquire_back_buffer(&mut self) -> Result<u32> {
            let index = self.next_back_buffer;
            self.next_back_buffer = (self.next_back_buffer + 1) % 2;
            self.calls.push(Call::Acquire(index));
            Ok(index)
        }

        fn execute(&mut self, list: &CommandList, fence_value: u64) -> Result<()> {
            let commands = list.commands()?.to_vec();
            self.calls.push(Call::Execute { fence_value, commands });
            self.pending = fence_value;
            if self.finishes_immediately {
                self.completed = fence_value;
            }
            Ok(())
        }

        fn completed_fence_value(&mut self) -> Result<u64> {
            Ok(self.completed)
        }

        fn wait_for_fence(&mut self, value: u64) -> Result<()> {
            self.calls.push(Call::Wait(value));
            if !self.wait_is_broken {
                self.completed = self.pending;
            }
            Ok(())
        }

        fn reset_command_allocator(&mut self) -> Result<()> {
            assert_eq!(self.completed, self.pending, "allocator reset while GPU busy");
            self.calls.push(Call::ResetAllocator);
            Ok(())
        }

        fn present(&mut self, back_buffer: u32) -> Result<()> {
            self.calls.push(Call::Present(back_buffer));
            Ok(())
        }
    }

    fn quad_plan() -> FramePlan {
        FramePlan::new(
            1280,
            720,
            [1.0, 1.0, 0.0, 1.0],
            VertexBufferView {
                buffer: BufferId(0),
                size_in_bytes: 48,
                stride_in_bytes: 12,
            },
            IndexBufferView {
                buffer: BufferId(1),
                size_in_bytes: 12,
                format: IndexFormat::Uint16,
            },
            DrawIndexed::covering(&QUAD_INDICES),
        )
    }

    #[test]
    fn frame_sequence_is_serialized() {
        let mut backend = MockBackend::new();
        let mut frames = FrameLoop::new(quad_plan());

        frames.render(&mut backend).unwrap();

        let kinds: Vec<_> = backend
            .calls
            .iter()
            .map(|call| match call {
                Call::Acquire(_) => "acquire",
                Call::Execute { .. } => "execute",
                Call::Wait(_) => "wait",
                Call::ResetAllocator => "reset",
                Call::Present(_) => "present",
            })
            .collect();
        assert_eq!(kinds, ["acquire", "execute", "wait", "reset", "present"]);
        assert_eq!(backend.calls[2], Call::Wait(1));
        assert!(frames.fence.is_idle());
    }

    #[test]
    fn one_present_per_submission_across_frames() {
        let mut backend = MockBackend::new();
        let mut frames = FrameLoop::new(quad_plan());

        for _ in 0..3 {
            frames.render(&mut backend).unwrap();
        }

        let fence_values: Vec<u64> = backend
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute { fence_value, .. } => Some(*fence_value),
                _ => None,
            })
            .collect();
        let presents: Vec<u32> = backend
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Present(index) => Some(*index),
                _ => None,
            })
            .collect();

        assert_eq!(fence_values, [1, 2, 3]);
        assert_eq!(presents, [0, 1, 0]);
        assert_eq!(frames.frames_presented(), 3);
    }

    #[test]
    fn no_wait_when_gpu_already_done() {
        let mut backend = MockBackend::new();
        backend.finishes_immediately = true;
        let mut frames = FrameLoop::new(quad_plan());

        frames.render(&mut backend).unwrap();

        assert!(!backend.calls.iter().any(|call| matches!(call, Call::Wait(_))));
        assert_eq!(backend.calls.last(), Some(&Call::Present(0)));
    }

    #[test]
    fn allocator_is_not_reset_before_fence_completes() {
        let mut backend = MockBackend::new();
        backend.wait_is_broken = true;
        let mut frames = FrameLoop::new(quad_plan());

        assert!(frames.render(&mut backend).is_err());
        assert!(!backend.calls.contains(&Call::ResetAllocator));
        assert!(!backend.calls.iter().any(|call| matches!(call, Call::Present(_))));
    }

    #[test]
    fn recorded_commands_follow_frame_order() {
        let mut backend = MockBackend::new();
        let mut frames = FrameLoop::new(quad_plan());
        frames.render(&mut backend).unwrap();
        frames.render(&mut backend).unwrap();

        let second_frame = backend
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Execute { commands, .. } => Some(commands.clone()),
                _ => None,
            })
            .nth(1)
            .unwrap();

        assert_eq!(second_frame.len(), 12);
        assert_eq!(
            second_frame[0],
            Command::Barrier {
                back_buffer: 1,
                before: ResourceState::Present,
                after: ResourceState::RenderTarget,
            }
        );
        assert_eq!(second_frame[2], Command::SetRenderTarget { slot: 1 });
        assert_eq!(
            second_frame[3],
            Command::ClearRenderTarget {
                slot: 1,
                color: [1.0, 1.0, 0.0, 1.0],
            }
        );
        assert_eq!(second_frame[6], Command::SetRootSignature(BindPoint::Graphics));
        assert_eq!(
            second_frame[11],
            Command::Barrier {
                back_buffer: 1,
                before: ResourceState::RenderTarget,
                after: ResourceState::Present,
            }
        );

        let draws: Vec<_> = second_frame
            .iter()
            .filter_map(|command| match command {
                Command::DrawIndexed(draw) => Some(*draw),
                _ => None,
            })
            .collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 6);
    }

    #[test]
    fn descriptor_tables_follow_root_signature() {
        let plan = quad_plan().with_descriptor_tables(1);
        let mut list = CommandList::new();
        plan.record(&mut list, 0).unwrap();
        list.close().unwrap();
        let commands = list.commands().unwrap();

        assert_eq!(commands.len(), 13);
        assert_eq!(commands[6], Command::SetRootSignature(BindPoint::Graphics));
        assert_eq!(commands[7], Command::SetDescriptorTable { index: 0 });
        assert!(matches!(commands[11], Command::DrawIndexed(_)));
    }

    #[test]
    fn untextured_plan_binds_no_tables() {
        let mut list = CommandList::new();
        quad_plan().record(&mut list, 1).unwrap();
        list.close().unwrap();

        assert!(!list
            .commands()
            .unwrap()
            .iter()
            .any(|command| matches!(command, Command::SetDescriptorTable { .. })));
    }

    #[test]
    fn viewport_and_scissor_cover_target() {
        let plan = quad_plan();
        assert_eq!(plan.viewport.width, 1280.0);
        assert_eq!(plan.viewport.height, 720.0);
        assert_eq!(plan.viewport.max_depth, 1.0);
        assert_eq!(
            plan.scissor,
            ScissorRect { left: 0, top: 0, right: 1280, bottom: 720 }
        );
    }
}
