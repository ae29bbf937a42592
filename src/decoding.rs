use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageError, ImageReader};

use crate::pixel_format::row_stride;

/// Raw decoded pixels, rows padded to the aligned stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    stride: usize,
}

impl PixelBuffer {
    /// Copies tightly packed rows into a buffer with aligned stride.
    ///
    /// A `packed` slice shorter than `width * channels * height` yields a short
    /// buffer, which surface building rejects.
    pub fn from_packed(width: u32, height: u32, channels: u8, packed: &[u8]) -> Self {
        let packed_row = width as usize * usize::from(channels);
        let stride = row_stride(width, channels);
        let mut data = Vec::with_capacity(stride * height as usize);
        if packed_row > 0 {
            for row in packed.chunks_exact(packed_row).take(height as usize) {
                data.extend_from_slice(row);
                data.resize(data.len() + (stride - packed_row), 0);
            }
        }

        Self {
            data,
            width,
            height,
            channels,
            stride,
        }
    }

    /// Takes the parts as given, without checking them against each other.
    pub fn from_raw_parts(
        width: u32,
        height: u32,
        channels: u8,
        stride: usize,
        data: Vec<u8>,
    ) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            stride,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed bytes of row `y`, without padding. `None` if the row is missing.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * usize::from(self.channels);
        self.data.get(start..end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    FileNotFound { path: PathBuf },
    Unreadable { path: PathBuf, message: String },
    UnsupportedFormat { path: PathBuf, message: String },
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => "DECODE_FILE_NOT_FOUND",
            Self::Unreadable { .. } => "DECODE_UNREADABLE",
            Self::UnsupportedFormat { .. } => "DECODE_UNSUPPORTED_FORMAT",
        }
    }

    fn from_io(path: &Path, error: io::Error) -> Self {
        if error.kind() == io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Unreadable {
                path: path.to_path_buf(),
                message: error.to_string(),
            }
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound { path } => {
                write!(f, "{}: image not found: {}", self.code(), path.display())
            }
            Self::Unreadable { path, message } => write!(
                f,
                "{}: failed reading {}: {}",
                self.code(),
                path.display(),
                message
            ),
            Self::UnsupportedFormat { path, message } => write!(
                f,
                "{}: failed decoding {}: {}",
                self.code(),
                path.display(),
                message
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decodes an image file at its native channel count: 3 when opaque, 4 with alpha.
pub fn decode(path: &Path) -> Result<PixelBuffer, DecodeError> {
    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|error| DecodeError::from_io(path, error))?;
    let image = reader.decode().map_err(|error| match error {
        ImageError::IoError(io_error) => DecodeError::from_io(path, io_error),
        other => DecodeError::UnsupportedFormat {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    })?;

    Ok(pixel_buffer_from_image(&image))
}

pub fn pixel_buffer_from_image(image: &DynamicImage) -> PixelBuffer {
    let (width, height) = (image.width(), image.height());
    if image.color().has_alpha() {
        PixelBuffer::from_packed(width, height, 4, image.to_rgba8().as_raw())
    } else {
        PixelBuffer::from_packed(width, height, 3, image.to_rgb8().as_raw())
    }
}
