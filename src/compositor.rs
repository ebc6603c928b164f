//! Logo overlay for QR bitmaps.
//!
//! The logo is scaled to a target width (height follows the aspect ratio), centred on the
//! bitmap and pasted through its alpha channel. Branding is optional decoration: when the
//! logo cannot be loaded, [`LogoCompositor::apply`] logs the failure and hands back the
//! bitmap untouched.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};
use tracing::{debug, warn};

use crate::error::{QrArtifactError, Result};

/// Default logo width in pixels.
pub const DEFAULT_LOGO_WIDTH: u32 = 100;

/// Largest logo width a configuration may ask for.
pub const MAX_LOGO_WIDTH: u32 = 2048;

/// Logo shipped with the crate.
static BUNDLED_LOGO_PNG: &[u8] = include_bytes!("../assets/qr_logo.png");

/// Where the logo image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoSource {
    Bundled,
    Path(PathBuf),
}

/// Scales `logo` to `target_width`, keeping its aspect ratio.
///
/// The height is `round(height * target_width / width)`, never less than one pixel.
pub fn resize_logo(logo: &RgbaImage, target_width: u32) -> RgbaImage {
    let (width, height) = logo.dimensions();
    let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width.max(1))).round();
    let target_height = (scaled as u32).max(1);
    imageops::resize(logo, target_width, target_height, FilterType::Lanczos3)
}

/// Pastes `logo`, resized to `target_width`, at the centre of `base`.
///
/// The offset is `((base - logo) / 2)` on each axis, truncated toward zero. A logo larger
/// than the base is clipped. Fully transparent logo pixels leave the base untouched and
/// partially transparent ones are blended.
pub fn composite(base: &RgbImage, logo: &RgbaImage, target_width: u32) -> RgbImage {
    let mut out = base.clone();
    if target_width == 0 || logo.width() == 0 || logo.height() == 0 {
        return out;
    }
    let resized = resize_logo(logo, target_width);
    let left = (i64::from(base.width()) - i64::from(resized.width())) / 2;
    let top = (i64::from(base.height()) - i64::from(resized.height())) / 2;
    paste(&mut out, &resized, left, top);
    out
}

fn paste(base: &mut RgbImage, logo: &RgbaImage, left: i64, top: i64) {
    let (width, height) = (i64::from(base.width()), i64::from(base.height()));
    for (lx, ly, px) in logo.enumerate_pixels() {
        let x = left + i64::from(lx);
        let y = top + i64::from(ly);
        let alpha = u16::from(px[3]);
        if x < 0 || y < 0 || x >= width || y >= height || alpha == 0 {
            continue;
        }
        let dst = base.get_pixel_mut(x as u32, y as u32);
        for c in 0..3 {
            let blended = (u16::from(px[c]) * alpha + u16::from(dst[c]) * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
}

/// Applies a configured logo to generated bitmaps.
#[derive(Debug, Clone)]
pub struct LogoCompositor {
    source: LogoSource,
    target_width: u32,
    cache: bool,
}

impl LogoCompositor {
    pub fn new(source: LogoSource, target_width: u32) -> Self {
        Self {
            source,
            target_width,
            cache: true,
        }
    }

    /// Enables or disables the process-wide decoded logo cache.
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn source(&self) -> &LogoSource {
        &self.source
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Decodes the logo, consulting the cache first when enabled.
    pub fn load_logo(&self) -> Result<Arc<RgbaImage>> {
        match &self.source {
            LogoSource::Bundled => {
                if self.cache {
                    if let Some(logo) = bundled_cache().get() {
                        return Ok(Arc::clone(logo));
                    }
                }
                let logo = Arc::new(decode(BUNDLED_LOGO_PNG)?);
                if self.cache {
                    return Ok(Arc::clone(bundled_cache().get_or_init(|| logo)));
                }
                Ok(logo)
            }
            LogoSource::Path(path) => self.load_path(path),
        }
    }

    fn load_path(&self, path: &Path) -> Result<Arc<RgbaImage>> {
        if self.cache {
            if let Ok(cache) = path_cache().read() {
                if let Some(logo) = cache.get(path) {
                    return Ok(Arc::clone(logo));
                }
            }
        }

        let bytes = fs::read(path).map_err(|e| {
            QrArtifactError::LogoCompositeFailed(format!("cannot read {}: {}", path.display(), e))
        })?;
        let logo = Arc::new(decode(&bytes)?);
        debug!(path = %path.display(), width = logo.width(), height = logo.height(), "Decoded logo");

        if self.cache {
            if let Ok(mut cache) = path_cache().write() {
                cache.insert(path.to_path_buf(), Arc::clone(&logo));
            }
        }
        Ok(logo)
    }

    /// Composites the logo onto `base`, failing if the logo cannot be loaded.
    pub fn try_apply(&self, base: &RgbImage) -> Result<RgbImage> {
        let logo = self.load_logo()?;
        Ok(composite(base, &logo, self.target_width))
    }

    /// Composites the logo onto `base`. A logo failure is logged and `base` is returned.
    pub fn apply(&self, base: RgbImage) -> RgbImage {
        match self.try_apply(&base) {
            Ok(img) => img,
            Err(err) => {
                warn!(error = %err, source = ?self.source, "Skipping logo");
                base
            }
        }
    }
}

fn decode(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| QrArtifactError::LogoCompositeFailed(e.to_string()))
}

fn bundled_cache() -> &'static OnceLock<Arc<RgbaImage>> {
    static BUNDLED: OnceLock<Arc<RgbaImage>> = OnceLock::new();
    &BUNDLED
}

fn path_cache() -> &'static RwLock<HashMap<PathBuf, Arc<RgbaImage>>> {
    static CACHE: OnceLock<RwLock<HashMap<PathBuf, Arc<RgbaImage>>>> = OnceLock::new();
    CACHE.get_or_init(Default::default)
}
