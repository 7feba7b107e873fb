use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::MAX_IMAGE_BYTES;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("input bytes empty")]
    EmptyInput,

    #[error("input too large: {size} bytes, max {max_size}")]
    InputTooLarge { size: usize, max_size: usize },

    #[error("unsupported image format")]
    UnsupportedFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentFormat {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl AttachmentFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            AttachmentFormat::Jpeg => "image/jpeg",
            AttachmentFormat::Png => "image/png",
            AttachmentFormat::WebP => "image/webp",
            AttachmentFormat::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            AttachmentFormat::Jpeg => "jpg",
            AttachmentFormat::Png => "png",
            AttachmentFormat::WebP => "webp",
            AttachmentFormat::Gif => "gif",
        }
    }

    /// Sniffs the format from magic bytes; the file name is not trusted.
    pub fn detect(data: &[u8]) -> Result<Self, ImageError> {
        match image::guess_format(data) {
            Ok(image::ImageFormat::Jpeg) => Ok(AttachmentFormat::Jpeg),
            Ok(image::ImageFormat::Png) => Ok(AttachmentFormat::Png),
            Ok(image::ImageFormat::WebP) => Ok(AttachmentFormat::WebP),
            Ok(image::ImageFormat::Gif) => Ok(AttachmentFormat::Gif),
            _ => Err(ImageError::UnsupportedFormat),
        }
    }
}

/// The single image attached to a draft.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    file_name: String,
    format: AttachmentFormat,
    data: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::EmptyInput);
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::InputTooLarge {
                size: data.len(),
                max_size: MAX_IMAGE_BYTES,
            });
        }

        let format = AttachmentFormat::detect(&data)?;
        let file_name = sanitize_file_name(&file_name.into())
            .unwrap_or_else(|| format!("image.{}", format.extension()));

        Ok(Self {
            file_name,
            format,
            data,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> AttachmentFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

// Keep image bytes out of logs.
impl fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("file_name", &self.file_name)
            .field("format", &self.format)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

/// Strips any directory part a picker may hand over.
fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw).trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ExtendedColorType, ImageEncoder};

    fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        use image::{ImageBuffer, Rgba};
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        let mut buffer = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buffer);
        encoder
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    #[test]
    fn accepts_png_and_reports_mime() {
        let attachment = ImageAttachment::new("photo.png", create_test_png(4, 4)).unwrap();
        assert_eq!(attachment.format(), AttachmentFormat::Png);
        assert_eq!(attachment.mime_type(), "image/png");
        assert_eq!(attachment.file_name(), "photo.png");
    }

    #[test]
    fn format_comes_from_bytes_not_name() {
        let attachment = ImageAttachment::new("photo.jpg", create_test_png(2, 2)).unwrap();
        assert_eq!(attachment.format(), AttachmentFormat::Png);
    }

    #[test]
    fn detects_jpeg_magic() {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(AttachmentFormat::detect(&data), Ok(AttachmentFormat::Jpeg));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(
            ImageAttachment::new("a.png", Vec::new()).unwrap_err(),
            ImageError::EmptyInput
        );
    }

    #[test]
    fn rejects_oversized_input() {
        let mut data = create_test_png(1, 1);
        data.resize(MAX_IMAGE_BYTES + 1, 0);
        assert!(matches!(
            ImageAttachment::new("big.png", data),
            Err(ImageError::InputTooLarge { max_size, .. }) if max_size == MAX_IMAGE_BYTES
        ));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = ImageAttachment::new("notes.txt", b"just some text here".to_vec()).unwrap_err();
        assert_eq!(err, ImageError::UnsupportedFormat);
    }

    #[test]
    fn strips_directories_from_file_name() {
        let png = create_test_png(1, 1);
        let unix = ImageAttachment::new("/home/user/pics/a.png", png.clone()).unwrap();
        let windows = ImageAttachment::new("C:\\pics\\b.png", png.clone()).unwrap();
        let blank = ImageAttachment::new("  ", png).unwrap();

        assert_eq!(unix.file_name(), "a.png");
        assert_eq!(windows.file_name(), "b.png");
        assert_eq!(blank.file_name(), "image.png");
    }

    #[test]
    fn debug_omits_bytes() {
        let attachment = ImageAttachment::new("a.png", create_test_png(1, 1)).unwrap();
        let rendered = format!("{attachment:?}");
        assert!(rendered.contains("size_bytes"));
        assert!(!rendered.contains("data"));
    }
}
