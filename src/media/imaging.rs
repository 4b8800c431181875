//! Decode, resize and re-encode uploads.
//!
//! Everything here is CPU-bound and synchronous; callers run it on the
//! blocking pool. Output keeps the source format so stored names can use the
//! sniffed extension.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use rayon::prelude::*;

use campusdesk_core::StorageError;
use campusdesk_models::{Bounds, FitMode, VariantSpec};

const FILTER: FilterType = FilterType::Lanczos3;

/// Raster format of `bytes`, limited to the formats the store re-encodes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok().filter(|format| {
        matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
        )
    })
}

/// File extension for stored content.
pub fn extension_for(bytes: &[u8]) -> &'static str {
    match sniff_format(bytes) {
        Some(format) => format.extensions_str().first().copied().unwrap_or("bin"),
        None if bytes.starts_with(b"%PDF") => "pdf",
        None => "bin",
    }
}

/// Scales `bytes` down to fit `bounds`, keeping the aspect ratio.
///
/// Returns `None` when the content should be stored verbatim: it is not a
/// decodable image, or it already fits.
pub fn fit_within(bytes: &[u8], bounds: Bounds) -> Result<Option<Vec<u8>>, StorageError> {
    let Some(format) = sniff_format(bytes) else {
        return Ok(None);
    };
    let Ok(image) = image::load_from_memory_with_format(bytes, format) else {
        return Ok(None);
    };

    if fits(&image, bounds.max_width, bounds.max_height) {
        return Ok(None);
    }

    let resized = image.resize(bounds.max_width.max(1), bounds.max_height.max(1), FILTER);
    encode(&resized, format).map(Some)
}

/// Renders every variant of `bytes`, in parallel, as `(name, encoded)` pairs.
pub fn render_variants(
    bytes: &[u8],
    variants: &[VariantSpec],
) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
    let format = sniff_format(bytes).ok_or(StorageError::NotAnImage)?;
    let image = image::load_from_memory_with_format(bytes, format)
        .map_err(|_| StorageError::NotAnImage)?;

    variants
        .par_iter()
        .map(|spec| {
            let rendered = render(&image, spec);
            encode(&rendered, format).map(|encoded| (spec.name.clone(), encoded))
        })
        .collect()
}

fn render(image: &DynamicImage, spec: &VariantSpec) -> DynamicImage {
    let (width, height) = (spec.width.max(1), spec.height.max(1));
    match spec.fit {
        FitMode::Contain if fits(image, width, height) => image.clone(),
        FitMode::Contain => image.resize(width, height, FILTER),
        FitMode::Cover => image.resize_to_fill(width, height, FILTER),
    }
}

fn fits(image: &DynamicImage, max_width: u32, max_height: u32) -> bool {
    image.width() <= max_width && image.height() <= max_height
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, StorageError> {
    // JPEG has no alpha; the GIF and WebP encoders want 8-bit RGBA
    let converted;
    let image = match format {
        ImageFormat::Jpeg => {
            converted = DynamicImage::ImageRgb8(image.to_rgb8());
            &converted
        }
        ImageFormat::Gif | ImageFormat::WebP => {
            converted = DynamicImage::ImageRgba8(image.to_rgba8());
            &converted
        }
        _ => image,
    };

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(|e| StorageError::Image(e.to_string()))?;
    Ok(buffer.into_inner())
}
