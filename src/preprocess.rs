//! Image preprocessing for classifier inference.
//!
//! Turns an arbitrary image into the tensor layout the model was trained on:
//! RGB, 224x224, NHWC, values mapped from [0, 255] to [-1, 1].
//! The transform must match training exactly; any drift degrades accuracy
//! without producing an error.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::Path;

/// Side length of the square model input
pub const INPUT_SIZE: u32 = 224;

/// Number of colour channels
pub const CHANNELS: usize = 3;

/// Preprocessed model input, shape (1, 224, 224, 3)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
}

impl ImageTensor {
    /// Tensor shape in NHWC order
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, CHANNELS];

    /// Wrap raw NHWC data, checking the element count.
    pub fn from_vec(data: Vec<f32>) -> Result<Self> {
        let expected = Self::SHAPE.iter().product::<usize>();
        if data.len() != expected {
            anyhow::bail!(
                "tensor must hold {} values for shape {:?}, got {}",
                expected,
                Self::SHAPE,
                data.len()
            );
        }
        Ok(Self { data })
    }

    /// Shape as the i64 dimensions ONNX Runtime expects
    pub fn dims(&self) -> Vec<i64> {
        Self::SHAPE.iter().map(|&d| d as i64).collect()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Scale one 8-bit channel value to [-1, 1].
///
/// Same arithmetic and order as training: divide by 255, then `(x - 0.5) * 2`.
#[inline]
pub fn normalize_channel(value: u8) -> f32 {
    let x = value as f32 / 255.0;
    (x - 0.5) * 2.0
}

/// Preprocess an already decoded image.
pub fn preprocess_image(image: &DynamicImage) -> ImageTensor {
    let resized = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest);
    let rgb = resized.to_rgb8();

    let mut data = Vec::with_capacity(ImageTensor::SHAPE.iter().product());
    // HWC layout: pixels row-major, channels interleaved
    for pixel in rgb.pixels() {
        data.extend(pixel.0.iter().map(|&c| normalize_channel(c)));
    }

    ImageTensor { data }
}

/// Decode and preprocess an image held in memory.
pub fn preprocess_bytes(bytes: &[u8]) -> Result<ImageTensor> {
    let image = image::load_from_memory(bytes).context("Failed to decode image")?;
    Ok(preprocess_image(&image))
}

/// Load and preprocess an image file.
///
/// The format is detected from the file contents; the extension is ignored.
pub fn preprocess_path<P: AsRef<Path>>(path: P) -> Result<ImageTensor> {
    let path = path.as_ref();
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .with_context(|| format!("Failed to read image {}", path.display()))?
        .decode()
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(preprocess_image(&image))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode_png(image: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_normalize_channel_endpoints() {
        assert_eq!(normalize_channel(255), 1.0);
        assert_eq!(normalize_channel(0), -1.0);
        assert!(normalize_channel(128) > 0.0 && normalize_channel(127) < 0.0);
    }

    #[test]
    fn test_white_image_maps_to_ones() {
        let white = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(224, 224, Rgb([255, 255, 255])));
        let tensor = preprocess_image(&white);

        assert_eq!(tensor.len(), 224 * 224 * 3);
        assert!(tensor.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_black_image_maps_to_minus_ones() {
        let black = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([0, 0, 0])));
        let tensor = preprocess_image(&black);
        assert!(tensor.as_slice().iter().all(|&v| v == -1.0));
    }

    #[test]
    fn test_non_square_input_is_resized() {
        let image = DynamicImage::ImageRgb8(gradient(640, 480));
        let tensor = preprocess_image(&image);

        assert_eq!(tensor.len(), ImageTensor::SHAPE.iter().product::<usize>());
        assert_eq!(tensor.dims(), vec![1, 224, 224, 3]);
        assert!(tensor.as_slice().iter().all(|&v| (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_channel_order_is_rgb_interleaved() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(224, 224, Rgb([255, 0, 255])));
        let tensor = preprocess_image(&image);
        assert_eq!(&tensor.as_slice()[..6], &[1.0, -1.0, 1.0, 1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_alpha_channel_is_dropped() {
        let rgba: RgbaImage = ImageBuffer::from_pixel(224, 224, Rgba([255, 255, 255, 10]));
        let tensor = preprocess_bytes(&encode_png(&DynamicImage::ImageRgba8(rgba))).unwrap();
        assert_eq!(tensor.len(), 224 * 224 * 3);
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let bytes = encode_png(&DynamicImage::ImageRgb8(gradient(300, 200)));

        let first = preprocess_bytes(&bytes).unwrap();
        let second = preprocess_bytes(&bytes).unwrap();

        let first_bits: Vec<u32> = first.as_slice().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u32> = second.as_slice().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_preprocess_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("white.png");
        ImageBuffer::from_pixel(224, 224, Rgb::<u8>([255, 255, 255]))
            .save(&path)
            .unwrap();

        let tensor = preprocess_path(&path).unwrap();
        assert!(tensor.as_slice().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_preprocess_path_ignores_extension() {
        let dir = tempfile::tempdir().unwrap();
        let png = encode_png(&DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            120,
            90,
            Rgb([255, 255, 255]),
        )));

        for name in ["abc_lesion.jpg", "abc_upload"] {
            let path = dir.path().join(name);
            std::fs::write(&path, &png).unwrap();

            let tensor = preprocess_path(&path).unwrap();
            assert!(tensor.as_slice().iter().all(|&v| v == 1.0), "file {}", name);
        }
    }

    #[test]
    fn test_corrupt_bytes_fail() {
        assert!(preprocess_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        assert!(preprocess_path("/nonexistent/lesion.jpg").is_err());
    }

    #[test]
    fn test_tensor_from_vec_checks_length() {
        assert!(ImageTensor::from_vec(vec![0.0; 10]).is_err());
        assert!(ImageTensor::from_vec(vec![0.0; 224 * 224 * 3]).is_ok());
    }
}
