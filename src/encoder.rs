//! Rasterisation of QR symbols into RGB bitmaps, and bitmap serialisation.
//!
//! The bitmap side is `(modules + 2 * border) * box_size` pixels, with every module drawn
//! as a `box_size`×`box_size` square.

use std::io::Cursor;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{QrArtifactError, Result};
use crate::qrcode::{EcLevel, QrCode, Version};
use crate::store::ArtifactFormat;

/// Default pixels per module.
pub const DEFAULT_BOX_SIZE: u32 = 10;

/// Default quiet zone width in modules.
pub const DEFAULT_BORDER: u32 = 2;

/// Largest box size a configuration may ask for.
pub const MAX_BOX_SIZE: u32 = 50;

/// Largest bitmap side [`render`] will allocate, in pixels.
pub const MAX_BITMAP_SIDE: u32 = 10_000;

pub const BLACK: [u8; 3] = [0, 0, 0];
pub const WHITE: [u8; 3] = [255, 255, 255];

/// Parameters shared by every symbol an [`Encoder`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    pub version: Version,
    pub ec: EcLevel,
    pub box_size: u32,
    pub border: u32,
    /// Grow past `version` when the payload does not fit.
    pub fit: bool,
    pub dark: [u8; 3],
    pub light: [u8; 3],
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            version: Version::MIN,
            ec: EcLevel::L,
            box_size: DEFAULT_BOX_SIZE,
            border: DEFAULT_BORDER,
            fit: false,
            dark: BLACK,
            light: WHITE,
        }
    }
}

/// Turns payload bytes into QR bitmaps.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncoderOptions,
}

impl Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Builds the module matrix for `data`.
    pub fn symbol(&self, data: &[u8]) -> Result<QrCode> {
        let EncoderOptions { version, ec, fit, .. } = self.options;
        if fit {
            QrCode::encode_fit(data, version, ec)
        } else {
            QrCode::encode(data, version, ec)
        }
    }

    /// Encodes `data` and renders it.
    ///
    /// # Errors
    ///
    /// [`QrArtifactError::CapacityExceeded`] when the payload does not fit the configured
    /// version (or version 40 when `fit` is set), and
    /// [`QrArtifactError::InvalidConfig`] for a zero box size or a bitmap side over
    /// [`MAX_BITMAP_SIDE`].
    pub fn encode(&self, data: &[u8]) -> Result<RgbImage> {
        if self.options.box_size == 0 {
            return Err(QrArtifactError::InvalidConfig("box_size must be at least 1".to_string()));
        }
        let qr = self.symbol(data)?;
        render(&qr, &self.options)
    }
}

/// Encodes `data` at a fixed `version` in black on white.
///
/// # Example
///
/// ```rust
/// use qrartifact::encoder::encode;
/// use qrartifact::qrcode::{EcLevel, Version};
///
/// let bitmap = encode(b"ABC123", Version::MIN, EcLevel::L, 10, 2).unwrap();
/// assert_eq!(bitmap.dimensions(), (250, 250));
/// ```
pub fn encode(data: &[u8], version: Version, ec: EcLevel, box_size: u32, border: u32) -> Result<RgbImage> {
    Encoder::new(EncoderOptions {
        version,
        ec,
        box_size,
        border,
        ..EncoderOptions::default()
    })
    .encode(data)
}

/// Draws `qr` with the box size, border and colours from `options`.
///
/// Fails with [`QrArtifactError::InvalidConfig`] when the bitmap side would overflow or
/// exceed [`MAX_BITMAP_SIDE`].
pub fn render(qr: &QrCode, options: &EncoderOptions) -> Result<RgbImage> {
    let box_size = options.box_size.max(1);
    let border = options.border as usize;
    let side = u32::try_from(qr.size())
        .ok()
        .and_then(|size| options.border.checked_mul(2)?.checked_add(size))
        .and_then(|modules| modules.checked_mul(box_size))
        .filter(|side| *side <= MAX_BITMAP_SIDE)
        .ok_or_else(|| {
            QrArtifactError::InvalidConfig(format!(
                "bitmap for {} modules, border {} and box_size {} exceeds {} px",
                qr.size(),
                options.border,
                options.box_size,
                MAX_BITMAP_SIDE
            ))
        })?;
    let mut img: RgbImage = ImageBuffer::new(side, side);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let mx = (x / box_size) as usize;
        let my = (y / box_size) as usize;
        let dark = mx >= border && my >= border && qr.is_dark(mx - border, my - border);
        *pixel = if dark { Rgb(options.dark) } else { Rgb(options.light) };
    }

    Ok(img)
}

/// Serialises a bitmap in the given format.
pub fn to_bytes(img: &RgbImage, format: ArtifactFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format.image_format())
        .map_err(|e| QrArtifactError::ImageEncoding(e.to_string()))?;
    Ok(cursor.into_inner())
}
