use std::sync::Arc;
use color_eyre::{Report, Result};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};
use crate::config::Config;
use crate::renderer::shader::ShaderError;
use crate::renderer::Renderer;

pub struct App {
    config: Config,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,

    /// First fatal error; ends the event loop
    error: Option<Report>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            error: None,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.error.take() {
            Some(e) if is_missing_shader(&e) => {
                log::info!("Exiting: {}", e);
                Ok(())
            }
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Report) {
        log::error!("{:?}", error);
        self.error.get_or_insert(error);
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.window_title.as_str())
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attributes)?);
        self.window = Some(window.clone());

        self.renderer = Some(Renderer::new(window, &self.config)?);
        Ok(())
    }
}

/// A shader file that does not exist ends the program without an error
pub fn is_missing_shader(error: &Report) -> bool {
    error
        .downcast_ref::<ShaderError>()
        .is_some_and(ShaderError::is_not_found)
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.error.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.draw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if event_loop.exiting() {
            return;
        }
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = self.renderer.take() {
            log::info!("Presented {} frames", renderer.frames_presented());
        }
        self.window = None;
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use color_eyre::eyre::eyre;
    use super::*;
    use crate::renderer::shader::ShaderStage;

    #[test]
    fn missing_shader_is_a_clean_exit() {
        let error = Report::new(ShaderError::NotFound {
            path: PathBuf::from("shaders/vertex.wgsl"),
        });
        assert!(is_missing_shader(&error));
    }

    #[test]
    fn other_shader_errors_are_fatal() {
        let error = Report::new(ShaderError::MissingEntryPoint {
            path: PathBuf::from("shaders/pixel.wgsl"),
            entry_point: "basic_ps".to_owned(),
            stage: ShaderStage::Pixel,
        });
        assert!(!is_missing_shader(&error));
        assert!(!is_missing_shader(&eyre!("device lost")));
    }
}
