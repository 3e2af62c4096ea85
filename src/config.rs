use std::path::PathBuf;
use crate::renderer::shader::{ShaderProfile, ShaderSource, ShaderStage};

pub const WINDOW_WIDTH: u32 = 1280;
pub const WINDOW_HEIGHT: u32 = 720;

/// Path of an image to sample across the quad; unset draws it white
pub const TEXTURE_ENV: &str = "VKQUAD_TEXTURE";

/// Startup configuration. Everything is fixed at compile time apart from the
/// log filter (`RUST_LOG`) and the optional texture (`VKQUAD_TEXTURE`).
#[derive(Debug, Clone)]
pub struct Config {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,

    pub clear_color: [f32; 4],

    /// Adapters whose name contains this substring win over enumeration order
    pub preferred_adapter: Option<String>,

    pub vertex_shader: ShaderSource,
    pub pixel_shader: ShaderSource,

    /// Image sampled by the pixel shader. The shaders must declare the
    /// texture table when this is set.
    pub texture: Option<PathBuf>,

    pub enable_debug_layer: bool,
}

impl Config {
    /// Textured variant: UV-carrying vertices, a sampled image and a root
    /// signature with one descriptor table.
    pub fn textured(texture: PathBuf) -> Self {
        Self {
            vertex_shader: ShaderSource {
                path: PathBuf::from("shaders/textured_vertex.wgsl"),
                entry_point: "textured_vs".to_owned(),
                profile: ShaderProfile::new(ShaderStage::Vertex, 1, 0),
            },
            pixel_shader: ShaderSource {
                path: PathBuf::from("shaders/textured_pixel.wgsl"),
                entry_point: "textured_ps".to_owned(),
                profile: ShaderProfile::new(ShaderStage::Pixel, 1, 0),
            },
            texture: Some(texture),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::with_texture(std::env::var_os(TEXTURE_ENV).map(PathBuf::from))
    }

    fn with_texture(texture: Option<PathBuf>) -> Self {
        match texture {
            Some(path) if !path.as_os_str().is_empty() => Self::textured(path),
            _ => Self::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_title: "vkquad".to_owned(),
            window_width: WINDOW_WIDTH,
            window_height: WINDOW_HEIGHT,

            clear_color: [1.0, 1.0, 0.0, 1.0],

            preferred_adapter: Some("NVIDIA".to_owned()),

            vertex_shader: ShaderSource {
                path: PathBuf::from("shaders/vertex.wgsl"),
                entry_point: "basic_vs".to_owned(),
                profile: ShaderProfile::new(ShaderStage::Vertex, 1, 0),
            },
            pixel_shader: ShaderSource {
                path: PathBuf::from("shaders/pixel.wgsl"),
                entry_point: "basic_ps".to_owned(),
                profile: ShaderProfile::new(ShaderStage::Pixel, 1, 0),
            },

            texture: None,

            enable_debug_layer: cfg!(debug_assertions),
        }
    }
}
