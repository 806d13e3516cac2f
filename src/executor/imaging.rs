//! In-process raster conversions with the `image` crate

use crate::error::{Error, Result};
use crate::pdf::{blocking, image_to_pdf};
use crate::storage::write_atomic;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// JPEG encoder quality for every JPEG this crate writes
pub const JPEG_QUALITY: u8 = 95;

/// Resolution an image is laid out at when embedded in a PDF page
pub const EMBED_DPI: f32 = 100.0;

/// Whether a target format can carry an alpha channel.
pub fn supports_alpha(ext: &str) -> bool {
    !matches!(ext, "jpg" | "jpeg")
}

/// Composite onto an opaque white background.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

/// 8-bit RGB or RGBA; alpha is flattened when the target can't keep it.
fn normalize(image: DynamicImage, keep_alpha: bool) -> DynamicImage {
    if image.color().has_alpha() {
        if keep_alpha {
            DynamicImage::ImageRgba8(image.to_rgba8())
        } else {
            DynamicImage::ImageRgb8(flatten_onto_white(&image))
        }
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    }
}

fn decode(input: &Path) -> Result<DynamicImage> {
    image::open(input).map_err(|e| Error::execution("image", format!("failed to decode image: {}", e)))
}

fn encode(image: &DynamicImage, target: &str) -> Result<Vec<u8>> {
    let format = ImageFormat::from_extension(target)
        .ok_or_else(|| Error::invalid_input(format!("unknown image format {:?}", target)))?;

    let mut buf = Vec::new();
    let written = match format {
        ImageFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        }
        _ => image.write_to(&mut Cursor::new(&mut buf), format),
    };
    written.map_err(|e| Error::execution("image", format!("failed to encode {}: {}", target, e)))?;
    Ok(buf)
}

pub(super) async fn convert(input: &Path, output: &Path, target: &str) -> Result<PathBuf> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    let target = target.to_string();
    blocking(move || {
        let image = normalize(decode(&input)?, supports_alpha(&target));
        let encoded = encode(&image, &target)?;
        write_atomic(&output, &encoded)?;
        Ok(output)
    })
    .await
}

pub(super) async fn embed_pdf(input: &Path, output: &Path) -> Result<PathBuf> {
    let input = input.to_path_buf();
    let output = output.to_path_buf();
    blocking(move || {
        let image = normalize(decode(&input)?, false);
        let pdf = image_to_pdf(&image, EMBED_DPI)?;
        write_atomic(&output, &pdf)?;
        Ok(output)
    })
    .await
}
