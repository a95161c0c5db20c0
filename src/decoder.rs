// Image decoding for print jobs

use crate::errors::{PrintError, PrintResult};

/// Decoded 8-bit luminance bitmap, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Checks the buffer is non-empty and its byte length matches its size.
    pub fn validate(&self) -> PrintResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PrintError::DecodeFailure(format!(
                "Bitmap has empty dimensions {}x{}",
                self.width, self.height
            )));
        }

        let expected = self.width as usize * self.height as usize;
        if self.pixels.len() != expected {
            return Err(PrintError::DecodeFailure(format!(
                "Bitmap holds {} bytes, expected {} for {}x{}",
                self.pixels.len(),
                expected,
                self.width,
                self.height
            )));
        }

        Ok(())
    }
}

/// Decodes PNG/JPEG/BMP bytes into a grayscale pixel buffer.
pub fn decode(bytes: &[u8]) -> PrintResult<PixelBuffer> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| PrintError::DecodeFailure(e.to_string()))?;

    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    Ok(PixelBuffer {
        width,
        height,
        pixels: gray.into_raw(),
    })
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::GrayImage::from_pixel(width, height, image::Luma([255u8]));
    let mut cursor = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut cursor, image::ImageOutputFormat::Png)
        .expect("encode test png");
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png() {
        let buffer = decode(&png_bytes(64, 32)).expect("valid png");
        assert_eq!(buffer.width, 64);
        assert_eq!(buffer.height, 32);
        assert_eq!(buffer.pixels.len(), 64 * 32);
        assert!(buffer.pixels.iter().all(|&p| p == 255));
        assert!(buffer.validate().is_ok());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode(b"definitely not an image");
        assert!(matches!(result, Err(PrintError::DecodeFailure(_))));
    }

    #[test]
    fn test_validate_rejects_mismatched_length() {
        let buffer = PixelBuffer {
            width: 4,
            height: 4,
            pixels: vec![0; 15],
        };
        assert!(matches!(
            buffer.validate(),
            Err(PrintError::DecodeFailure(_))
        ));

        let empty = PixelBuffer {
            width: 0,
            height: 10,
            pixels: Vec::new(),
        };
        assert!(empty.validate().is_err());
    }
}
