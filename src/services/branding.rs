use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::errors::Result;

const ICON_SIZE: u32 = 512;
const ICON_RELATIVE_PATH: &str = "Contents/Resources/bootstrapper-icon.png";

/// Stamps the bootstrapper's icon onto an installed bundle.
#[derive(Clone, Debug, Default)]
pub struct IconBrander {
    source: Option<PathBuf>,
}

impl IconBrander {
    pub fn new(source: Option<PathBuf>) -> Self {
        Self { source }
    }

    pub fn icon_path(bundle: &Path) -> PathBuf {
        bundle.join(ICON_RELATIVE_PATH)
    }

    pub fn apply(&self, bundle: &Path) -> Result<PathBuf> {
        let icon = match &self.source {
            Some(path) => image::open(path)?,
            None => default_mark(),
        };
        let icon = icon.resize_to_fill(ICON_SIZE, ICON_SIZE, FilterType::Lanczos3);

        let dest = Self::icon_path(bundle);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        icon.save_with_format(&dest, ImageFormat::Png)?;
        Ok(dest)
    }
}

fn default_mark() -> DynamicImage {
    let image = RgbaImage::from_fn(ICON_SIZE, ICON_SIZE, |x, y| {
        let inset = ICON_SIZE / 4;
        let inside = x > inset && x < ICON_SIZE - inset && y > inset && y < ICON_SIZE - inset;
        if inside {
            Rgba([245, 245, 245, 255])
        } else {
            let shade = ((x + y) * 255 / (ICON_SIZE * 2)) as u8;
            Rgba([30, 90 + shade / 3, 200, 255])
        }
    });
    DynamicImage::ImageRgba8(image)
}
