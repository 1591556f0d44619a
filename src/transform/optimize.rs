use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use std::io::Cursor;

use crate::transform::minify;

/// 图片优化：重新编码后取较小者；无法解码的位图视为错误
pub fn optimize_image(input: &[u8], extension: &str, jpeg_quality: u8) -> Result<Vec<u8>> {
    let optimized = match extension {
        "png" => {
            let img = image::load_from_memory(input).context("无法解码 PNG 图片")?;
            encode_png(&img)?
        }
        "jpg" | "jpeg" => {
            let img = image::load_from_memory(input).context("无法解码 JPEG 图片")?;
            encode_jpeg(&img, jpeg_quality)?
        }
        "svg" => match std::str::from_utf8(input) {
            Ok(text) => minify::html(text).into_bytes(),
            Err(_) => input.to_vec(),
        },
        // gif 等格式原样保留
        _ => input.to_vec(),
    };

    if optimized.len() < input.len() {
        Ok(optimized)
    } else {
        Ok(input.to_vec())
    }
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, FilterType::Adaptive);
    img.write_with_encoder(encoder).context("PNG 编码失败")?;
    Ok(buf.into_inner())
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    // JPEG 不支持透明通道
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(encoder).context("JPEG 编码失败")?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn noisy_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn png_never_grows() {
        let input = noisy_png();
        let out = optimize_image(&input, "png", 85).unwrap();
        assert!(out.len() <= input.len());
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn svg_is_minified_as_markup() {
        let svg = b"<svg>\n  <!-- icon -->\n  <rect width=\"1\" height=\"1\"/>\n</svg>\n";
        let out = optimize_image(svg, "svg", 85).unwrap();
        assert_eq!(out, b"<svg><rect width=\"1\" height=\"1\"/></svg>");
    }

    #[test]
    fn gif_is_copied_verbatim() {
        let data = b"GIF89a-not-really".to_vec();
        assert_eq!(optimize_image(&data, "gif", 85).unwrap(), data);
    }

    #[test]
    fn corrupt_png_is_an_error() {
        assert!(optimize_image(b"not a png", "png", 85).is_err());
    }
}
