//! Image staging.
//!
//! Every picture goes through a scoped temporary file before it is embedded, and is decoded
//! once to make sure the bytes are a valid image of the declared format.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};

use crate::error::{Error, Result};
use crate::model::{ImageData, ImageFormat};

/// Encoded bytes of an image payload. Raw samples are encoded as PNG.
pub fn encode_image(data: &ImageData) -> Result<(ImageFormat, Vec<u8>)> {
    match data {
        ImageData::Encoded { format, bytes } => Ok((*format, bytes.clone())),
        ImageData::Raw {
            width,
            height,
            channels,
            samples,
        } => {
            let img = match channels {
                1 => GrayImage::from_raw(*width, *height, samples.clone())
                    .map(DynamicImage::ImageLuma8),
                3 => RgbImage::from_raw(*width, *height, samples.clone())
                    .map(DynamicImage::ImageRgb8),
                n => return Err(Error::Image(format!("unsupported channel count {}", n))),
            }
            .ok_or_else(|| {
                Error::Image(format!(
                    "{} samples do not fill a {}x{}x{} image",
                    samples.len(),
                    width,
                    height,
                    channels
                ))
            })?;

            let mut out = Cursor::new(Vec::new());
            img.write_to(&mut out, image::ImageFormat::Png)?;
            Ok((ImageFormat::Png, out.into_inner()))
        }
    }
}

/// Write the bytes to a temporary file in `temp_dir`, read them back and validate them.
///
/// The temporary file is removed when this returns.
pub fn stage_image(format: ImageFormat, bytes: &[u8], temp_dir: &Path) -> Result<Vec<u8>> {
    let mut file = tempfile::Builder::new()
        .prefix("pdfdocx-img-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(temp_dir)?;
    file.write_all(bytes)?;
    file.flush()?;

    let mut staged = Vec::with_capacity(bytes.len());
    file.reopen()?.read_to_end(&mut staged)?;

    let codec = match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
    };
    image::load_from_memory_with_format(&staged, codec)?;
    Ok(staged)
}
