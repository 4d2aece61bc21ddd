//! Texture records, decoded pixel data and sampling policy.
//!
//! [`Texture`] is what the texture cache keeps per loaded path: the backend
//! handle plus the metadata of the upload. The pixel data itself lives on the
//! device; [`DecodedImage`] only exists between decode and upload.

use std::path::PathBuf;

/// Opaque backend texture name, as handed out by
/// [`GraphicsDevice::gen_texture`](crate::device::GraphicsDevice::gen_texture).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Texture sampling policy: wrap per axis, magnification filter,
/// minification filter and the filter used between mip levels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SamplerState {
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    /// `None` disables mipmapped minification.
    pub mipmap_filter: Option<FilterMode>,
}

impl SamplerState {
    /// Repeat on both axes, linear magnification, linear-mipmap-linear
    /// minification. Every cached texture uses this.
    pub const REPEAT_TRILINEAR: SamplerState = SamplerState {
        wrap_s: WrapMode::Repeat,
        wrap_t: WrapMode::Repeat,
        mag_filter: FilterMode::Linear,
        min_filter: FilterMode::Linear,
        mipmap_filter: Some(FilterMode::Linear),
    };
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::REPEAT_TRILINEAR
    }
}

/// Channel layout of decoded pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Rgb8,
    Rgba8,
}

impl PixelLayout {
    pub fn channels(self) -> u8 {
        match self {
            PixelLayout::Rgb8 => 3,
            PixelLayout::Rgba8 => 4,
        }
    }
}

/// Pixels produced by an image decoder, rows ordered the way the device
/// expects them (bottom-up for JPEG).
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Size in bytes the pixel buffer must have, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.layout.channels() as usize)
    }

    /// Number of levels in a full mip chain down to 1x1.
    pub fn mip_level_count(&self) -> u32 {
        32 - self.width.max(self.height).max(1).leading_zeros()
    }
}

/// A texture resident on the device, owned by the texture cache.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Where the pixels were actually read from (after fallback resolution).
    pub source: PathBuf,
    pub sampler: SamplerState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            path: PathBuf::from("t.png"),
            width,
            height,
            layout: PixelLayout::Rgba8,
            pixels: Vec::new(),
        }
    }

    #[test]
    fn mip_chain_length() {
        assert_eq!(image(256, 256).mip_level_count(), 9);
        assert_eq!(image(256, 64).mip_level_count(), 9);
        assert_eq!(image(1, 1).mip_level_count(), 1);
        assert_eq!(image(300, 2).mip_level_count(), 9);
    }

    #[test]
    fn expected_len_uses_channels() {
        let mut img = image(4, 2);
        assert_eq!(img.expected_len(), Some(32));
        img.layout = PixelLayout::Rgb8;
        assert_eq!(img.expected_len(), Some(24));
    }
}
