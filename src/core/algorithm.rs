use bytes::Bytes;
use fast_image_resize::{images::Image, FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ExtendedColorType, ImageEncoder};

use crate::error::ProcessingError;

use super::{Cancellation, Quality};

pub const TARGET_WIDTH: u32 = 800;

/// JPEG output of one request.
#[derive(Debug)]
pub struct ProcessedImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Decode `blob`, scale it to [`TARGET_WIDTH`] with Lanczos3 and encode it as
/// JPEG. Narrower images are scaled up through the same path.
pub fn compress(
    blob: &[u8],
    quality: Quality,
    cancellation: &Cancellation,
) -> Result<ProcessedImage, ProcessingError> {
    let decoded = image::load_from_memory(blob).map_err(ProcessingError::Decode)?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ProcessingError::EmptyImage);
    }
    checkpoint(cancellation)?;

    // JPEG has no alpha channel, so work in 8-bit RGB from here on
    let src_image = DynamicImage::ImageRgb8(decoded.to_rgb8());
    drop(decoded);

    let (target_width, target_height) = target_size(src_image.width(), src_image.height());
    let mut dst_image = Image::new(target_width, target_height, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));
    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(ProcessingError::Resize)?;
    checkpoint(cancellation)?;

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.get())
        .write_image(
            dst_image.buffer(),
            target_width,
            target_height,
            ExtendedColorType::Rgb8,
        )
        .map_err(ProcessingError::Encode)?;

    Ok(ProcessedImage {
        data: Bytes::from(buffer),
        width: target_width,
        height: target_height,
    })
}

/// Width is pinned to [`TARGET_WIDTH`], height follows the source aspect
/// ratio rounded to nearest and never below 1.
pub fn target_size(src_width: u32, src_height: u32) -> (u32, u32) {
    let height = (f64::from(src_height) * f64::from(TARGET_WIDTH) / f64::from(src_width) + 0.5)
        as u32;
    (TARGET_WIDTH, height.max(1))
}

fn checkpoint(cancellation: &Cancellation) -> Result<(), ProcessingError> {
    if cancellation.is_cancelled() {
        return Err(ProcessingError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    /// A noisy gradient so JPEG quality has something to bite on.
    pub(crate) fn sample_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let noise = (x.wrapping_mul(7919) ^ y.wrapping_mul(104_729)) % 64;
            Rgb([
                ((x * 255 / width.max(1)) as u8).wrapping_add(noise as u8),
                ((y * 255 / height.max(1)) as u8).wrapping_sub(noise as u8),
                (((x + y) % 256) as u8) ^ (noise as u8),
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    pub(crate) fn encode_as(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    fn run(blob: &[u8], quality: u8) -> Result<ProcessedImage, ProcessingError> {
        compress(blob, Quality::clamped(quality.into()), &Cancellation::new())
    }

    #[test]
    fn downscales_wide_png_to_target_width() {
        let blob = encode_as(&sample_image(1600, 900), ImageFormat::Png);
        let out = run(&blob, 80).unwrap();

        assert_eq!((out.width, out.height), (800, 450));
        let decoded = image::load_from_memory_with_format(&out.data, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 450));
    }

    #[test]
    fn narrow_images_still_go_through_resize() {
        let blob = encode_as(&sample_image(400, 300), ImageFormat::Jpeg);
        let out = run(&blob, 80).unwrap();
        assert_eq!((out.width, out.height), (800, 600));
    }

    #[test]
    fn accepts_gif_and_webp_with_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_fn(120, 60, |x, y| {
            Rgba([x as u8, y as u8, 90, if x % 2 == 0 { 255 } else { 0 }])
        }));
        for format in [ImageFormat::Gif, ImageFormat::WebP, ImageFormat::Png] {
            let out = run(&encode_as(&rgba, format), 70).unwrap();
            assert_eq!((out.width, out.height), (800, 400), "{format:?}");
        }
    }

    #[test]
    fn output_is_deterministic() {
        let blob = encode_as(&sample_image(1024, 768), ImageFormat::Png);
        let a = run(&blob, 65).unwrap();
        let b = run(&blob, 65).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn lower_quality_is_not_larger() {
        let blob = encode_as(&sample_image(1200, 800), ImageFormat::Png);
        let low = run(&blob, 1).unwrap();
        let high = run(&blob, 100).unwrap();
        assert!(low.data.len() <= high.data.len());
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(run(b"hello world", 80), Err(ProcessingError::Decode(_))));

        let mut truncated = encode_as(&sample_image(64, 64), ImageFormat::Png);
        truncated.truncate(40);
        assert!(matches!(run(&truncated, 80), Err(ProcessingError::Decode(_))));
    }

    #[test]
    fn stops_when_cancelled() {
        let blob = encode_as(&sample_image(100, 100), ImageFormat::Png);
        let cancellation = Cancellation::new();
        cancellation.cancel();
        let r = compress(&blob, Quality::clamped(80), &cancellation);
        assert!(matches!(r, Err(ProcessingError::Cancelled)));
    }

    #[test]
    fn target_size_keeps_aspect_ratio() {
        assert_eq!(target_size(1600, 1200), (800, 600));
        assert_eq!(target_size(3, 2), (800, 533));
        assert_eq!(target_size(10_000, 1), (800, 1));
        assert_eq!(target_size(1000, 333), (800, 266));
    }
}
