//! Configuration for the artifact pipeline.
//!
//! Every option has a default, so a TOML file only needs the keys it changes:
//!
//! ```toml
//! version = 2
//! error_correction = "M"
//! format = "png"
//! logo = { path = "assets/brand.png" }
//! logo_width = 80
//! ```
//!
//! `logo` is `"bundled"` (default), `"none"` or `{ path = "..." }`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compositor::{LogoCompositor, LogoSource, DEFAULT_LOGO_WIDTH, MAX_LOGO_WIDTH};
use crate::encoder::{EncoderOptions, BLACK, DEFAULT_BORDER, DEFAULT_BOX_SIZE, MAX_BOX_SIZE, WHITE};
use crate::error::{QrArtifactError, Result};
use crate::qrcode::{EcLevel, Version};
use crate::store::{ArtifactFormat, DEFAULT_NAMESPACE};
use crate::uid::{DEFAULT_MAX_ATTEMPTS, DEFAULT_UID_LENGTH, MAX_UID_LENGTH};

/// Accepted quiet zone widths, in modules.
pub const BORDER_RANGE: std::ops::RangeInclusive<u32> = 2..=4;

/// Which logo, if any, is composited onto generated images.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogoSetting {
    #[default]
    Bundled,
    #[serde(rename = "none")]
    Disabled,
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    pub logo: LogoSetting,
    /// QR version, 1-40. A minimum rather than a fixed size when `fit` is set.
    pub version: u8,
    /// Pixels per module.
    pub box_size: u32,
    /// Quiet zone in modules, 2-4.
    pub border: u32,
    pub error_correction: EcLevel,
    pub format: ArtifactFormat,
    /// Logo width in pixels after scaling.
    pub logo_width: u32,
    pub uid_length: usize,
    pub max_uid_attempts: u32,
    pub fit: bool,
    pub dark_color: [u8; 3],
    pub light_color: [u8; 3],
    /// Keep decoded logos for the life of the process.
    pub cache_logo: bool,
    /// Directory (or key prefix) images are stored under.
    pub namespace: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            logo: LogoSetting::Bundled,
            version: 1,
            box_size: DEFAULT_BOX_SIZE,
            border: DEFAULT_BORDER,
            error_correction: EcLevel::L,
            format: ArtifactFormat::Png,
            logo_width: DEFAULT_LOGO_WIDTH,
            uid_length: DEFAULT_UID_LENGTH,
            max_uid_attempts: DEFAULT_MAX_ATTEMPTS,
            fit: false,
            dark_color: BLACK,
            light_color: WHITE,
            cache_logo: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl QrConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: QrConfig = toml::from_str(text).map_err(|e| QrArtifactError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| QrArtifactError::InvalidConfig(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(QrArtifactError::InvalidConfig(msg));

        Version::new(self.version)?;
        if !(1..=MAX_BOX_SIZE).contains(&self.box_size) {
            return invalid(format!("box_size must be between 1 and {}", MAX_BOX_SIZE));
        }
        if !BORDER_RANGE.contains(&self.border) {
            return invalid(format!(
                "border must be between {} and {}",
                BORDER_RANGE.start(),
                BORDER_RANGE.end()
            ));
        }
        if !(1..=MAX_LOGO_WIDTH).contains(&self.logo_width) {
            return invalid(format!("logo_width must be between 1 and {}", MAX_LOGO_WIDTH));
        }
        if !(1..=MAX_UID_LENGTH).contains(&self.uid_length) {
            return invalid(format!("uid_length must be between 1 and {}", MAX_UID_LENGTH));
        }
        if self.max_uid_attempts == 0 {
            return invalid("max_uid_attempts must be at least 1".to_string());
        }
        let ns = &self.namespace;
        if ns.is_empty() || ns.contains('/') || ns.contains('\\') || ns.starts_with('.') {
            return invalid(format!("namespace {:?} must be a plain directory name", ns));
        }
        Ok(())
    }

    pub fn encoder_options(&self) -> Result<EncoderOptions> {
        Ok(EncoderOptions {
            version: Version::new(self.version)?,
            ec: self.error_correction,
            box_size: self.box_size,
            border: self.border,
            fit: self.fit,
            dark: self.dark_color,
            light: self.light_color,
        })
    }

    pub fn logo_source(&self) -> Option<LogoSource> {
        match &self.logo {
            LogoSetting::Bundled => Some(LogoSource::Bundled),
            LogoSetting::Disabled => None,
            LogoSetting::Path(path) => Some(LogoSource::Path(path.clone())),
        }
    }

    /// Compositor for the configured logo, `None` when branding is disabled.
    pub fn compositor(&self) -> Option<LogoCompositor> {
        self.logo_source()
            .map(|source| LogoCompositor::new(source, self.logo_width).with_cache(self.cache_logo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QrConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.box_size, 10);
        assert_eq!(config.border, 2);
        assert_eq!(config.error_correction, EcLevel::L);
        assert_eq!(config.format, ArtifactFormat::Png);
        assert_eq!(config.logo_width, 100);
        assert_eq!(config.uid_length, 8);
        assert_eq!(config.logo, LogoSetting::Bundled);
        assert_eq!(config.namespace, "qrcode");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml() {
        let config = QrConfig::from_toml_str(
            r#"
            version = 3
            error_correction = "H"
            format = "jpeg"
            logo = { path = "/srv/brand.png" }
            "#,
        )
        .unwrap();
        assert_eq!(config.version, 3);
        assert_eq!(config.error_correction, EcLevel::H);
        assert_eq!(config.format, ArtifactFormat::Jpeg);
        assert_eq!(config.logo_source(), Some(LogoSource::Path(PathBuf::from("/srv/brand.png"))));
        assert_eq!(config.box_size, 10);
    }

    #[test]
    fn test_logo_disabled() {
        let config = QrConfig::from_toml_str(r#"logo = "none""#).unwrap();
        assert_eq!(config.logo, LogoSetting::Disabled);
        assert!(config.compositor().is_none());
    }

    #[test]
    fn test_invalid_values() {
        for text in [
            "version = 0",
            "version = 41",
            "box_size = 0",
            "box_size = 51",
            "border = 1",
            "border = 5",
            "border = 2147483648",
            "logo_width = 0",
            "logo_width = 5000",
            "uid_length = 0",
            "uid_length = 9",
            "max_uid_attempts = 0",
            "namespace = \"../up\"",
            "error_correction = \"X\"",
        ] {
            assert!(QrConfig::from_toml_str(text).is_err(), "{} should be rejected", text);
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let config = QrConfig {
            box_size: MAX_BOX_SIZE,
            border: 4,
            logo_width: MAX_LOGO_WIDTH,
            uid_length: MAX_UID_LENGTH,
            ..QrConfig::default()
        };
        config.validate().unwrap();

        let config = QrConfig {
            border: 1 << 31,
            ..QrConfig::default()
        };
        assert!(matches!(config.validate(), Err(QrArtifactError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("qr.toml");
        fs::write(&path, "border = 4\nfit = true\n").unwrap();
        let config = QrConfig::from_file(&path).unwrap();
        assert_eq!(config.border, 4);
        assert!(config.fit);
        assert!(QrConfig::from_file(tmp.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_encoder_options() {
        let config = QrConfig {
            version: 5,
            dark_color: [1, 2, 3],
            ..QrConfig::default()
        };
        let options = config.encoder_options().unwrap();
        assert_eq!(options.version.value(), 5);
        assert_eq!(options.dark, [1, 2, 3]);
    }
}
