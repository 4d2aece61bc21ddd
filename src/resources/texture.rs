use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat};

use crate::{
    data_structures::texture::{
        DecodedImage, PixelLayout, SamplerState, Texture, TextureHandle,
    },
    device::GraphicsDevice,
    error::TextureError,
};

/// Turns an image file into pixels the device can upload.
///
/// PNG comes back as RGBA with rows in file order. JPEG comes back as RGB
/// with rows reordered bottom-to-top, matching the bottom-up texture
/// convention of the device.
pub trait ImageDecoder {
    fn decode_png(&self, path: &Path) -> Result<DecodedImage, TextureError>;

    fn decode_jpeg(&self, path: &Path) -> Result<DecodedImage, TextureError>;
}

/// [`ImageDecoder`] backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageCrateDecoder {
    fn read(path: &Path, format: ImageFormat) -> Result<DynamicImage, TextureError> {
        let decode_err = |source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(|e| decode_err(image::ImageError::IoError(e)))?;
        image::ImageReader::with_format(BufReader::new(file), format)
            .decode()
            .map_err(decode_err)
    }
}

fn pixel_bytes(path: &Path, width: u32, height: u32, layout: PixelLayout) -> Result<usize, TextureError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(layout.channels() as usize))
        .ok_or(TextureError::AllocationFailure {
            path: path.to_path_buf(),
            bytes: usize::MAX,
        })
}

impl ImageDecoder for ImageCrateDecoder {
    fn decode_png(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        let img = Self::read(path, ImageFormat::Png)?;
        let (width, height) = (img.width(), img.height());
        pixel_bytes(path, width, height, PixelLayout::Rgba8)?;
        Ok(DecodedImage {
            path: path.to_path_buf(),
            width,
            height,
            layout: PixelLayout::Rgba8,
            pixels: img.into_rgba8().into_raw(),
        })
    }

    fn decode_jpeg(&self, path: &Path) -> Result<DecodedImage, TextureError> {
        let rgb = Self::read(path, ImageFormat::Jpeg)?.into_rgb8();
        let (width, height) = rgb.dimensions();
        let bytes = pixel_bytes(path, width, height, PixelLayout::Rgb8)?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|_| TextureError::AllocationFailure {
                path: path.to_path_buf(),
                bytes,
            })?;
        let row = (width as usize * 3).max(1);
        for scanline in rgb.as_raw().chunks_exact(row).rev() {
            pixels.extend_from_slice(scanline);
        }

        Ok(DecodedImage {
            path: path.to_path_buf(),
            width,
            height,
            layout: PixelLayout::Rgb8,
            pixels,
        })
    }
}

/// Outcome of [`TextureCache::resolve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    /// Already loaded; no file system access happened.
    Cached(TextureHandle),
    /// Not loaded yet, the pixels live at this path.
    OnDisk(PathBuf),
}

/// Per-path results of [`TextureCache::load_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub loaded: Vec<(String, TextureHandle)>,
    pub failed: Vec<(String, TextureError)>,
}

impl BatchReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Path-keyed cache of device textures.
///
/// Keys are the path strings callers pass in, compared byte for byte. A
/// texture found through the fallback directory is still stored under the
/// original key. Every handle is deleted exactly once, by
/// [`release_all`](Self::release_all).
pub struct TextureCache {
    textures: HashMap<String, Texture>,
    fallback_dir: PathBuf,
    decoder: Box<dyn ImageDecoder>,
}

impl std::fmt::Debug for TextureCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("textures", &self.textures)
            .field("fallback_dir", &self.fallback_dir)
            .finish_non_exhaustive()
    }
}

impl TextureCache {
    pub fn new(fallback_dir: impl Into<PathBuf>) -> Self {
        Self::with_decoder(fallback_dir, Box::new(ImageCrateDecoder))
    }

    pub fn with_decoder(fallback_dir: impl Into<PathBuf>, decoder: Box<dyn ImageDecoder>) -> Self {
        Self {
            textures: HashMap::new(),
            fallback_dir: fallback_dir.into(),
            decoder,
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<TextureHandle> {
        self.textures.get(key).map(|t| t.handle)
    }

    pub fn texture(&self, key: &str) -> Option<&Texture> {
        self.textures.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    /// `<fallback dir>/<base name of path>`. Both `/` and `\` count as
    /// separators so asset paths authored on either platform resolve.
    pub fn fallback_path(&self, path: &str) -> PathBuf {
        let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.fallback_dir.join(base)
    }

    pub fn resolve(&self, path: &str) -> Result<Resolved, TextureError> {
        if let Some(handle) = self.get(path) {
            return Ok(Resolved::Cached(handle));
        }
        let literal = Path::new(path);
        if literal.is_file() {
            return Ok(Resolved::OnDisk(literal.to_path_buf()));
        }
        let fallback = self.fallback_path(path);
        if fallback.is_file() {
            log::debug!("{path} not found, using {}", fallback.display());
            return Ok(Resolved::OnDisk(fallback));
        }
        Err(TextureError::NotFound {
            path: path.to_string(),
            fallback,
        })
    }

    /// Load `path` onto the device, or return the cached handle.
    pub fn load<D>(&mut self, device: &mut D, path: &str) -> Result<TextureHandle, TextureError>
    where
        D: GraphicsDevice + ?Sized,
    {
        let source = match self.resolve(path)? {
            Resolved::Cached(handle) => {
                log::debug!("texture cache hit for {path}");
                return Ok(handle);
            }
            Resolved::OnDisk(source) => source,
        };

        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let image = match extension.as_deref() {
            Some("png") => self.decoder.decode_png(&source)?,
            Some("jpg" | "jpeg") => self.decoder.decode_jpeg(&source)?,
            _ => return Err(TextureError::UnsupportedFormat(source)),
        };

        let handle = device.gen_texture();
        device.bind_texture(Some(handle));
        if let Err(e) = device.upload_mipmapped(handle, &image) {
            device.bind_texture(None);
            device.delete_texture(handle);
            return Err(e);
        }
        device.set_sampler(handle, SamplerState::REPEAT_TRILINEAR);

        log::info!(
            "uploaded {path} ({}x{}, {} channels) as texture {}",
            image.width,
            image.height,
            image.layout.channels(),
            handle.0
        );
        self.textures.insert(
            path.to_string(),
            Texture {
                handle,
                width: image.width,
                height: image.height,
                channels: image.layout.channels(),
                source,
                sampler: SamplerState::REPEAT_TRILINEAR,
            },
        );
        Ok(handle)
    }

    /// Load every path independently. A failing path is logged and reported
    /// but does not stop the rest of the batch.
    pub fn load_batch<D, I, S>(&mut self, device: &mut D, paths: I) -> BatchReport
    where
        D: GraphicsDevice + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            match self.load(device, path) {
                Ok(handle) => report.loaded.push((path.to_string(), handle)),
                Err(e) => {
                    log::warn!("skipping texture {path}: {e}");
                    report.failed.push((path.to_string(), e));
                }
            }
        }
        report
    }

    /// Delete every cached texture from the device and empty the cache.
    pub fn release_all<D>(&mut self, device: &mut D)
    where
        D: GraphicsDevice + ?Sized,
    {
        if self.textures.is_empty() {
            return;
        }
        log::debug!("releasing {} textures", self.textures.len());
        for (_, texture) in self.textures.drain() {
            device.delete_texture(texture.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_uses_base_name_for_either_separator() {
        let cache = TextureCache::new("media/textures");
        assert_eq!(
            cache.fallback_path("C:\\art\\brick.png"),
            Path::new("media/textures").join("brick.png")
        );
        assert_eq!(
            cache.fallback_path("assets/walls/brick.png"),
            Path::new("media/textures").join("brick.png")
        );
        assert_eq!(
            cache.fallback_path("brick.png"),
            Path::new("media/textures").join("brick.png")
        );
    }

    #[test]
    fn missing_texture_is_not_found() {
        let cache = TextureCache::new("definitely/not/here");
        let err = cache.resolve("nope/missing.png").unwrap_err();
        assert!(err.is_not_found());
    }
}
