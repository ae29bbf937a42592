use std::fmt;
use std::path::Path;

use serde::Serialize;
use tiny_skia::{ColorU8, Pixmap};

use crate::decoding::{decode, DecodeError, PixelBuffer};
use crate::pixel_format::{
    channel_masks, pack_pixel, row_stride, ByteOrder, ChannelLayout, ChannelMasks,
};

/// Edge length of the blank surface substituted for an unusable image.
pub const PLACEHOLDER_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceOrigin {
    Decoded,
    Placeholder,
    Offscreen,
}

/// A display-ready image: premultiplied RGBA plus the layout it was built from.
#[derive(Debug, Clone)]
pub struct Surface {
    pixmap: Pixmap,
    layout: ChannelLayout,
    masks: ChannelMasks,
    stride: usize,
    origin: SurfaceOrigin,
}

impl Surface {
    pub fn placeholder() -> Self {
        let pixmap = Pixmap::new(PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
            .expect("placeholder dimensions are non-zero");
        Self::from_pixmap(pixmap, SurfaceOrigin::Placeholder)
    }

    /// Wraps an already rendered pixmap, e.g. an offscreen atlas.
    pub fn from_pixmap(pixmap: Pixmap, origin: SurfaceOrigin) -> Self {
        let layout = ChannelLayout::Rgba;
        let stride = row_stride(pixmap.width(), layout.channels());
        Self {
            pixmap,
            layout,
            masks: channel_masks(ByteOrder::native(), layout),
            stride,
            origin,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn masks(&self) -> ChannelMasks {
        self.masks
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn origin(&self) -> SurfaceOrigin {
        self.origin
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == SurfaceOrigin::Placeholder
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight (non-premultiplied) RGBA at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceBuildError {
    UnsupportedChannels { channels: u8 },
    ZeroDimension { width: u32, height: u32 },
    StrideMismatch { stride: usize, expected: usize },
    DimensionMismatch { expected_len: usize, actual_len: usize },
    Allocation { width: u32, height: u32 },
}

impl SurfaceBuildError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedChannels { .. } => "SURFACE_UNSUPPORTED_CHANNELS",
            Self::ZeroDimension { .. } => "SURFACE_ZERO_DIMENSION",
            Self::StrideMismatch { .. } => "SURFACE_STRIDE_MISMATCH",
            Self::DimensionMismatch { .. } => "SURFACE_DIMENSION_MISMATCH",
            Self::Allocation { .. } => "SURFACE_ALLOCATION",
        }
    }
}

impl fmt::Display for SurfaceBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.code())?;
        match self {
            Self::UnsupportedChannels { channels } => {
                write!(f, "expected 3 or 4 channels, got {channels}")
            }
            Self::ZeroDimension { width, height } => {
                write!(f, "surface must be non-empty, got {width}x{height}")
            }
            Self::StrideMismatch { stride, expected } => {
                write!(f, "row stride {stride} does not match aligned stride {expected}")
            }
            Self::DimensionMismatch {
                expected_len,
                actual_len,
            } => write!(
                f,
                "pixel buffer holds {actual_len} bytes, dimensions need {expected_len}"
            ),
            Self::Allocation { width, height } => {
                write!(f, "failed to allocate {width}x{height} surface")
            }
        }
    }
}

impl std::error::Error for SurfaceBuildError {}

/// Turns decoded pixel buffers into surfaces using masks for one byte order.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceBuilder {
    order: ByteOrder,
}

impl SurfaceBuilder {
    pub fn new(order: ByteOrder) -> Self {
        Self { order }
    }

    pub fn native() -> Self {
        Self::new(ByteOrder::native())
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Builds a surface, substituting the placeholder if the buffer is malformed.
    /// The buffer is consumed and freed on both paths.
    pub fn build(&self, buffer: PixelBuffer) -> Surface {
        match self.try_build(&buffer) {
            Ok(surface) => surface,
            Err(error) => {
                eprintln!(
                    "[TILEBENCH] surface: {error}; using {PLACEHOLDER_SIZE}x{PLACEHOLDER_SIZE} placeholder"
                );
                Surface::placeholder()
            }
        }
    }

    pub fn build_decoded(&self, decoded: Result<PixelBuffer, DecodeError>) -> Surface {
        match decoded {
            Ok(buffer) => self.build(buffer),
            Err(error) => {
                eprintln!(
                    "[TILEBENCH] decode: {error}; using {PLACEHOLDER_SIZE}x{PLACEHOLDER_SIZE} placeholder"
                );
                Surface::placeholder()
            }
        }
    }

    pub fn try_build(&self, buffer: &PixelBuffer) -> Result<Surface, SurfaceBuildError> {
        let layout = ChannelLayout::from_channels(buffer.channels()).ok_or(
            SurfaceBuildError::UnsupportedChannels {
                channels: buffer.channels(),
            },
        )?;
        let (width, height) = (buffer.width(), buffer.height());
        if width == 0 || height == 0 {
            return Err(SurfaceBuildError::ZeroDimension { width, height });
        }

        let expected_stride = row_stride(width, layout.channels());
        if buffer.stride() != expected_stride {
            return Err(SurfaceBuildError::StrideMismatch {
                stride: buffer.stride(),
                expected: expected_stride,
            });
        }

        let expected_len = expected_stride * height as usize;
        if buffer.data().len() < expected_len {
            return Err(SurfaceBuildError::DimensionMismatch {
                expected_len,
                actual_len: buffer.data().len(),
            });
        }

        let mut pixmap =
            Pixmap::new(width, height).ok_or(SurfaceBuildError::Allocation { width, height })?;
        let masks = channel_masks(self.order, layout);
        let channels = usize::from(layout.channels());
        let pixels = pixmap.pixels_mut();

        for y in 0..height {
            let Some(row) = buffer.row(y) else {
                return Err(SurfaceBuildError::DimensionMismatch {
                    expected_len,
                    actual_len: buffer.data().len(),
                });
            };
            let row_start = y as usize * width as usize;
            for (x, bytes) in row.chunks_exact(channels).enumerate() {
                let [r, g, b, a] = masks.unpack(pack_pixel(bytes, self.order));
                pixels[row_start + x] = ColorU8::from_rgba(r, g, b, a).premultiply();
            }
        }

        Ok(Surface {
            pixmap,
            layout,
            masks,
            stride: expected_stride,
            origin: SurfaceOrigin::Decoded,
        })
    }
}

/// Decodes and builds the tile surface for a run; any failure yields the placeholder.
pub fn load_surface(path: &Path) -> Surface {
    SurfaceBuilder::native().build_decoded(decode(path))
}
