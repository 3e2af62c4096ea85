use std::path::Path;
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;

/// Decoded RGBA8 pixels, rows tightly packed from the top
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureData {
    pub const BYTES_PER_PIXEL: u32 = 4;

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .wrap_err_with(|| format!("Failed to read texture {:?}", path))?;
        let texture = Self::decode(&bytes)
            .wrap_err_with(|| format!("Failed to decode texture {:?}", path))?;

        log::info!("Loaded texture {:?} ({}x{})", path, texture.width, texture.height);

        Ok(texture)
    }

    /// Decodes a PNG or JPEG image, converting it to RGBA8.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("Texture has no pixels ({}x{})", width, height);
        }
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL as usize;
        if pixels.len() != expected {
            bail!(
                "{}x{} texture needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            );
        }

        Ok(Self { width, height, pixels })
    }

    pub fn row_pitch(&self) -> u32 {
        self.width * Self::BYTES_PER_PIXEL
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::PathBuf;
    use super::*;

    fn encode_png(width: u32, height: u32, pixels: Vec<u8>) -> Vec<u8> {
        let image = image::RgbaImage::from_raw(width, height, pixels).unwrap();
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn png_decodes_to_tightly_packed_rgba() {
        let pixels = vec![
            255, 0, 0, 255, 0, 255, 0, 255,
            0, 0, 255, 255, 255, 255, 255, 128,
        ];
        let texture = TextureData::decode(&encode_png(2, 2, pixels.clone())).unwrap();

        assert_eq!((texture.width, texture.height), (2, 2));
        assert_eq!(texture.row_pitch(), 8);
        assert_eq!(texture.pixels, pixels);
    }

    #[test]
    fn garbage_is_not_a_texture() {
        assert!(TextureData::decode(b"definitely not a png").is_err());
    }

    #[test]
    fn pixel_count_must_match_dimensions() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 12]).is_err());
        assert!(TextureData::from_rgba8(0, 4, Vec::new()).is_err());
        assert!(TextureData::from_rgba8(1, 1, vec![0; 4]).is_ok());
    }

    #[test]
    fn shipped_texture_loads() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("textures/checker.png");
        let texture = TextureData::load(&path).unwrap();

        assert_eq!((texture.width, texture.height), (8, 8));
        assert_eq!(texture.pixels.len(), 8 * 8 * 4);
    }

    #[test]
    fn missing_texture_names_the_file() {
        let err = TextureData::load(Path::new("textures/missing.png")).unwrap_err();
        assert!(format!("{:?}", err).contains("missing.png"));
    }
}
