//! Image decoding with format detection, and encoding of derived images.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::config::{ConvertConfig, EncodeFormat};
use crate::error::CodecError;

/// JPEG output is always written at the top of the quality scale.
pub const JPEG_QUALITY: u8 = 100;

/// Decodes source bytes and encodes derived images at maximum quality.
#[derive(Debug, Clone)]
pub struct ImageCodec {
    format: EncodeFormat,
    max_image_dimension: u32,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageCodec {
    pub fn new(config: &ConvertConfig) -> Self {
        Self {
            format: config.format,
            max_image_dimension: config.max_image_dimension,
        }
    }

    /// MIME type of everything [`encode`](Self::encode) produces.
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Decode an in-memory buffer, detecting the format from its content.
    ///
    /// The caller attaches the object location.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, CodecError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(CodecError::Detect)?;
        let format = reader.format().ok_or(CodecError::UnknownFormat)?;
        let image = reader.decode().map_err(CodecError::Decode)?;

        let (width, height) = image.dimensions();
        if width > self.max_image_dimension || height > self.max_image_dimension {
            return Err(CodecError::TooLarge {
                width,
                height,
                max: self.max_image_dimension,
            });
        }

        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }

    /// Encode into the configured container at maximum quality.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Cursor::new(Vec::new());
        match self.format {
            EncodeFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut buffer,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                image
                    .write_with_encoder(encoder)
                    .map_err(CodecError::Encode)?;
            }
            EncodeFormat::Jpeg => {
                // JPEG has no alpha channel.
                let flattened = if image.color().has_alpha() {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                } else {
                    image.clone()
                };
                let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
                flattened
                    .write_with_encoder(encoder)
                    .map_err(CodecError::Encode)?;
            }
        }
        Ok(buffer.into_inner())
    }
}

/// Convert an ImageFormat to a string representation.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn codec() -> ImageCodec {
        ImageCodec::new(&ConvertConfig::default())
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 200])));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
    }

    #[test]
    fn test_decode_detects_format_from_content() {
        let decoded = codec().decode(&jpeg_bytes(8, 6)).unwrap();
        assert_eq!(decoded.format, ImageFormat::Jpeg);
        assert_eq!((decoded.width, decoded.height), (8, 6));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = codec().decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CodecError::UnknownFormat));
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let mut config = ConvertConfig::default();
        config.max_image_dimension = 4;
        let err = ImageCodec::new(&config).decode(&jpeg_bytes(8, 2)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TooLarge {
                width: 8,
                height: 2,
                max: 4
            }
        ));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_png_encode_is_lossless() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_fn(5, 5, |x, y| {
            image::Luma([(x * 40 + y) as u8])
        }));
        let bytes = codec().encode(&img).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let decoded = codec().decode(&bytes).unwrap();
        assert_eq!(decoded.image.to_luma8().as_raw(), img.to_luma8().as_raw());
    }

    #[test]
    fn test_jpeg_encode_flattens_alpha() {
        let mut config = ConvertConfig::default();
        config.format = EncodeFormat::Jpeg;
        let codec = ImageCodec::new(&config);
        let img = DynamicImage::new_luma_a8(4, 4);
        let bytes = codec.encode(&img).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(codec.content_type(), "image/jpeg");
    }

    #[test]
    fn test_jpeg_encode_uses_maximum_quality() {
        let mut config = ConvertConfig::default();
        config.format = EncodeFormat::Jpeg;
        let img = DynamicImage::ImageLuma8(image::GrayImage::from_fn(16, 16, |x, y| {
            image::Luma([(x * 13 + y * 7) as u8])
        }));

        let mut expected = Cursor::new(Vec::new());
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut expected, 100))
            .unwrap();
        let mut lower = Cursor::new(Vec::new());
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut lower, 75))
            .unwrap();

        let bytes = ImageCodec::new(&config).encode(&img).unwrap();
        assert_eq!(bytes, expected.into_inner());
        assert_ne!(bytes, lower.into_inner());
    }
}
