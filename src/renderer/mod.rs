pub mod adapter;
pub mod commands;
pub mod descriptor_heap;
pub mod feature_level;
pub mod fence;
pub mod frame;
pub mod geometry;
pub mod shader;
pub mod texture;

mod vk;

use std::sync::Arc;
use color_eyre::Result;
use winit::window::Window;
use crate::config::Config;
use crate::renderer::frame::FrameLoop;
use crate::renderer::shader::ShaderSet;
use crate::renderer::texture::TextureData;
use crate::renderer::vk::backend::VulkanBackend;

pub struct Renderer {
    frames: FrameLoop,
    backend: VulkanBackend,
    window: Arc<Window>,
}

impl Renderer {
    /// Shaders are compiled and the texture decoded before any GPU object
    /// exists, so bad input never leaves a half-built device behind.
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let shaders = ShaderSet::compile(&config.vertex_shader, &config.pixel_shader)?;
        let texture = config
            .texture
            .as_deref()
            .map(TextureData::load)
            .transpose()?;
        let (backend, plan) = VulkanBackend::new(&window, config, &shaders, texture.as_ref())?;

        Ok(Self {
            frames: FrameLoop::new(plan),
            backend,
            window,
        })
    }

    pub fn draw(&mut self) -> Result<()> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        self.frames.render(&mut self.backend)
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames.frames_presented()
    }
}
