use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use naga::back::spv;
use naga::valid::{Capabilities, ValidationFlags, Validator};
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Pixel => naga::ShaderStage::Fragment,
        }
    }
}

/// Stage plus target version, e.g. `vs_1_0`. The version selects the SPIR-V
/// language version of the generated module.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ShaderProfile {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl ShaderProfile {
    pub const fn new(stage: ShaderStage, major: u8, minor: u8) -> Self {
        Self { stage, major, minor }
    }
}

impl fmt::Display for ShaderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.stage {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        };
        write!(f, "{}_{}_{}", prefix, self.major, self.minor)
    }
}

#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub path: PathBuf,
    pub entry_point: String,
    pub profile: ShaderProfile,
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader source {path:?} not found")]
    NotFound { path: PathBuf },

    #[error("failed to read shader source {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path:?}:\n{message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path:?} failed validation:\n{message}")]
    Validation { path: PathBuf, message: String },

    #[error("{path:?} has no {stage:?} entry point named {entry_point:?}")]
    MissingEntryPoint {
        path: PathBuf,
        entry_point: String,
        stage: ShaderStage,
    },

    #[error("failed to generate SPIR-V for {path:?}")]
    CodeGen {
        path: PathBuf,
        #[source]
        source: spv::Error,
    },
}

impl ShaderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ShaderError::NotFound { .. })
    }
}

/// Compiled SPIR-V for a single entry point
#[derive(Debug, Clone)]
pub struct ShaderBytecode {
    pub entry_point: String,
    pub profile: ShaderProfile,
    pub words: Vec<u32>,
}

/// The two programs the quad pipeline is built from
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: ShaderBytecode,
    pub pixel: ShaderBytecode,
}

impl ShaderSet {
    /// Compiles the vertex shader, then the pixel shader. Nothing is read for
    /// the pixel shader when the vertex shader fails.
    pub fn compile(vertex: &ShaderSource, pixel: &ShaderSource) -> Result<Self, ShaderError> {
        let vertex = compile_file(vertex).inspect_err(report)?;
        let pixel = compile_file(pixel).inspect_err(report)?;
        Ok(Self { vertex, pixel })
    }
}

fn report(e: &ShaderError) {
    log::error!("{}", e);
}

pub fn compile_file(source: &ShaderSource) -> Result<ShaderBytecode, ShaderError> {
    let text = std::fs::read_to_string(&source.path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ShaderError::NotFound {
            path: source.path.clone(),
        },
        _ => ShaderError::Io {
            path: source.path.clone(),
            source: e,
        },
    })?;

    compile_source(&text, &source.path, &source.entry_point, source.profile)
}

/// Compiles WGSL text into SPIR-V containing only `entry_point`.
/// Debug names are always emitted; no optimization passes run.
pub fn compile_source(
    text: &str,
    path: &Path,
    entry_point: &str,
    profile: ShaderProfile,
) -> Result<ShaderBytecode, ShaderError> {
    let module = naga::front::wgsl::parse_str(text).map_err(|e| ShaderError::Parse {
        path: path.to_owned(),
        message: e.emit_to_string(text),
    })?;

    let stage = profile.stage.to_naga();
    if !module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == stage)
    {
        return Err(ShaderError::MissingEntryPoint {
            path: path.to_owned(),
            entry_point: entry_point.to_owned(),
            stage: profile.stage,
        });
    }

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::empty());
    let info = validator
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            path: path.to_owned(),
            message: e.emit_to_string(text),
        })?;

    let options = spv::Options {
        lang_version: (profile.major, profile.minor),
        flags: spv::Options::default().flags | spv::WriterFlags::DEBUG,
        ..Default::default()
    };
    let pipeline_options = spv::PipelineOptions {
        shader_stage: stage,
        entry_point: entry_point.to_owned(),
    };
    let words = spv::write_vec(&module, &info, &options, Some(&pipeline_options))
        .map_err(|e| ShaderError::CodeGen {
            path: path.to_owned(),
            source: e,
        })?;

    log::debug!(
        "Compiled {}:{} as {} ({} words)",
        path.display(),
        entry_point,
        profile,
        words.len()
    );

    Ok(ShaderBytecode {
        entry_point: entry_point.to_owned(),
        profile,
        words,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn shipped(source: &ShaderSource) -> ShaderSource {
        ShaderSource {
            path: Path::new(env!("CARGO_MANIFEST_DIR")).join(&source.path),
            ..source.clone()
        }
    }

    #[test]
    fn shipped_shaders_compile() {
        let config = Config::default();
        let shaders = ShaderSet::compile(
            &shipped(&config.vertex_shader),
            &shipped(&config.pixel_shader),
        )
        .unwrap();

        assert_eq!(shaders.vertex.words[0], SPIRV_MAGIC);
        assert_eq!(shaders.pixel.words[0], SPIRV_MAGIC);
        assert_eq!(shaders.vertex.entry_point, "basic_vs");
        assert_eq!(shaders.pixel.entry_point, "basic_ps");
    }

    #[test]
    fn shipped_textured_shaders_compile() {
        let config = Config::textured(PathBuf::from("textures/checker.png"));
        let shaders = ShaderSet::compile(
            &shipped(&config.vertex_shader),
            &shipped(&config.pixel_shader),
        )
        .unwrap();

        assert_eq!(shaders.vertex.words[0], SPIRV_MAGIC);
        assert_eq!(shaders.pixel.words[0], SPIRV_MAGIC);
        assert_eq!(shaders.vertex.entry_point, "textured_vs");
        assert_eq!(shaders.pixel.entry_point, "textured_ps");
    }

    #[test]
    fn missing_vertex_shader_is_not_found() {
        let config = Config::default();
        let vertex = ShaderSource {
            path: PathBuf::from("does/not/exist/vertex.wgsl"),
            ..config.vertex_shader.clone()
        };
        let pixel = ShaderSource {
            path: PathBuf::from("does/not/exist/pixel.wgsl"),
            ..config.pixel_shader.clone()
        };

        match ShaderSet::compile(&vertex, &pixel) {
            Err(e @ ShaderError::NotFound { .. }) => {
                assert!(e.is_not_found());
                assert!(e.to_string().contains("vertex.wgsl"));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn syntax_error_is_a_parse_failure() {
        let profile = ShaderProfile::new(ShaderStage::Vertex, 1, 0);
        let result = compile_source("fn basic_vs( {", Path::new("broken.wgsl"), "basic_vs", profile);

        match result {
            Err(ShaderError::Parse { message, .. }) => assert!(!message.is_empty()),
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn entry_point_must_match_name_and_stage() {
        let text = "@fragment fn basic_ps() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
        let vertex = ShaderProfile::new(ShaderStage::Vertex, 1, 0);
        let pixel = ShaderProfile::new(ShaderStage::Pixel, 1, 0);

        assert!(matches!(
            compile_source(text, Path::new("ps.wgsl"), "basic_ps", vertex),
            Err(ShaderError::MissingEntryPoint { .. })
        ));
        assert!(matches!(
            compile_source(text, Path::new("ps.wgsl"), "main", pixel),
            Err(ShaderError::MissingEntryPoint { .. })
        ));
        assert!(compile_source(text, Path::new("ps.wgsl"), "basic_ps", pixel).is_ok());
    }

    #[test]
    fn profile_names() {
        assert_eq!(ShaderProfile::new(ShaderStage::Vertex, 1, 0).to_string(), "vs_1_0");
        assert_eq!(ShaderProfile::new(ShaderStage::Pixel, 1, 3).to_string(), "ps_1_3");
    }
}
