use std::fmt;

use serde::Serialize;

/// Row alignment required by the display format, in bytes.
pub const ROW_ALIGNMENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Little => "little",
            Self::Big => "big",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        u32::from(self.channels()) * 8
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Rgba)
    }
}

/// Per-channel bit masks over one pixel read as an integer in a given byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelMasks {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub alpha: u32,
}

impl ChannelMasks {
    pub fn colour_masks(&self) -> [u32; 3] {
        [self.red, self.green, self.blue]
    }

    /// True when every non-zero mask covers exactly one whole byte and no two masks overlap.
    pub fn is_well_formed(&self) -> bool {
        let mut seen = 0_u32;
        for mask in [self.red, self.green, self.blue, self.alpha] {
            if mask == 0 {
                continue;
            }
            if mask.count_ones() != 8 || mask.trailing_zeros() % 8 != 0 {
                return false;
            }
            if seen & mask != 0 {
                return false;
            }
            seen |= mask;
        }
        self.red != 0 && self.green != 0 && self.blue != 0
    }

    /// Splits a packed pixel into straight RGBA. A zero alpha mask reads as opaque.
    pub fn unpack(&self, value: u32) -> [u8; 4] {
        let alpha = if self.alpha == 0 {
            u8::MAX
        } else {
            extract(value, self.alpha)
        };
        [
            extract(value, self.red),
            extract(value, self.green),
            extract(value, self.blue),
            alpha,
        ]
    }
}

impl fmt::Display for ChannelMasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R={:#010x} G={:#010x} B={:#010x} A={:#010x}",
            self.red, self.green, self.blue, self.alpha
        )
    }
}

fn extract(value: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    ((value & mask) >> mask.trailing_zeros()) as u8
}

/// Channel masks for a pixel layout as seen from a host with the given byte order.
///
/// Little-endian hosts keep red in the lowest byte. Big-endian hosts mirror the
/// assignment; for 3-byte pixels the masks shift down one byte since the pixel
/// only fills the low 24 bits.
pub fn channel_masks(order: ByteOrder, layout: ChannelLayout) -> ChannelMasks {
    match order {
        ByteOrder::Little => ChannelMasks {
            red: 0x0000_00FF,
            green: 0x0000_FF00,
            blue: 0x00FF_0000,
            alpha: if layout.has_alpha() { 0xFF00_0000 } else { 0 },
        },
        ByteOrder::Big => {
            let shift = if layout.has_alpha() { 0 } else { 8 };
            ChannelMasks {
                red: 0xFF00_0000 >> shift,
                green: 0x00FF_0000 >> shift,
                blue: 0x0000_FF00 >> shift,
                alpha: if layout.has_alpha() { 0x0000_00FF } else { 0 },
            }
        }
    }
}

/// Reads one pixel's bytes as an integer in the given byte order.
pub fn pack_pixel(bytes: &[u8], order: ByteOrder) -> u32 {
    match order {
        ByteOrder::Little => bytes
            .iter()
            .enumerate()
            .fold(0_u32, |value, (index, byte)| {
                value | (u32::from(*byte) << (8 * index))
            }),
        ByteOrder::Big => bytes
            .iter()
            .fold(0_u32, |value, byte| (value << 8) | u32::from(*byte)),
    }
}

/// Bytes per row: `width * channels` rounded up to the next multiple of four.
pub fn row_stride(width: u32, channels: u8) -> usize {
    align_to(width as usize * usize::from(channels), ROW_ALIGNMENT)
}

fn align_to(value: usize, alignment: usize) -> usize {
    let mask = alignment - 1;
    (value + mask) & !mask
}
