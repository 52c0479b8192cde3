use serde::{Deserialize, Serialize};

use crate::error::HeaderError;
use crate::header::Header;

pub const TITLE: &str = "Title";
pub const BIT_DEPTH: &str = "BitDepth";
pub const WIDTH: &str = "Width";
pub const HEIGHT: &str = "Height";
pub const CHANNELS: &str = "Channels";
pub const SLICES: &str = "Slices";
pub const FRAMES: &str = "Frames";

/// Keys every stack header carries, in wire order.
pub const REQUIRED_KEYS: [&str; 7] = [TITLE, BIT_DEPTH, WIDTH, HEIGHT, CHANNELS, SLICES, FRAMES];

/// Sample width of every plane in a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bits(self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = HeaderError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(HeaderError::UnsupportedBitDepth(other)),
        }
    }
}

impl From<BitDepth> for u32 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

/// Hyperstack geometry: plane size plus channel/slice/frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub slices: u32,
    pub frames: u32,
}

impl Dimensions {
    /// A single 2-D plane of `width` x `height`.
    pub fn plane(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            channels: 1,
            slices: 1,
            frames: 1,
        }
    }

    /// Reject zero dimensions.
    pub fn validate(&self) -> Result<(), HeaderError> {
        for (name, value) in [
            (WIDTH, self.width),
            (HEIGHT, self.height),
            (CHANNELS, self.channels),
            (SLICES, self.slices),
            (FRAMES, self.frames),
        ] {
            if value == 0 {
                return Err(HeaderError::ZeroDimension(name));
            }
        }
        Ok(())
    }

    /// `Channels*Slices*Frames`.
    pub fn plane_count(&self) -> Result<usize, HeaderError> {
        checked_product(&[self.channels, self.slices, self.frames])
    }

    /// Samples per plane, `Width*Height`.
    pub fn samples_per_plane(&self) -> Result<usize, HeaderError> {
        checked_product(&[self.width, self.height])
    }

    /// Bytes per plane frame at the given depth.
    pub fn plane_bytes(&self, depth: BitDepth) -> Result<usize, HeaderError> {
        self.samples_per_plane()?
            .checked_mul(depth.bytes_per_sample())
            .ok_or(HeaderError::DimensionOverflow)
    }
}

fn checked_product(values: &[u32]) -> Result<usize, HeaderError> {
    values.iter().try_fold(1usize, |acc, &v| {
        acc.checked_mul(v as usize).ok_or(HeaderError::DimensionOverflow)
    })
}

/// Typed view of a stack header.
///
/// Keys outside the seven required ones are kept in `extra`, in order, so
/// values such as calibration or display range pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackHeader {
    pub title: String,
    pub bit_depth: BitDepth,
    #[serde(flatten)]
    pub dims: Dimensions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<(String, String)>,
}

impl StackHeader {
    pub fn new(title: impl Into<String>, bit_depth: BitDepth, dims: Dimensions) -> Self {
        Self {
            title: title.into(),
            bit_depth,
            dims,
            extra: Vec::new(),
        }
    }

    /// Build the wire header: required keys first, then `extra`.
    pub fn to_header(&self) -> Header {
        let mut header = Header::new();
        header.insert(TITLE, self.title.as_str());
        header.insert(BIT_DEPTH, self.bit_depth.bits().to_string());
        header.insert(WIDTH, self.dims.width.to_string());
        header.insert(HEIGHT, self.dims.height.to_string());
        header.insert(CHANNELS, self.dims.channels.to_string());
        header.insert(SLICES, self.dims.slices.to_string());
        header.insert(FRAMES, self.dims.frames.to_string());
        for (key, value) in &self.extra {
            if !REQUIRED_KEYS.contains(&key.as_str()) {
                header.insert(key.as_str(), value.as_str());
            }
        }
        header
    }

    /// Validate a decoded header.
    ///
    /// `Title` may be absent (empty title); every numeric key is required and
    /// must be a plain decimal integer.
    pub fn from_header(header: &Header) -> Result<Self, HeaderError> {
        let bits = numeric(header, BIT_DEPTH)?;
        let bit_depth = BitDepth::try_from(bits)?;
        let dims = Dimensions {
            width: numeric(header, WIDTH)?,
            height: numeric(header, HEIGHT)?,
            channels: numeric(header, CHANNELS)?,
            slices: numeric(header, SLICES)?,
            frames: numeric(header, FRAMES)?,
        };
        dims.validate()?;

        let extra = header
            .iter()
            .filter(|(key, _)| !REQUIRED_KEYS.contains(key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Ok(Self {
            title: header.get(TITLE).unwrap_or_default().to_string(),
            bit_depth,
            dims,
            extra,
        })
    }
}

fn numeric(header: &Header, field: &'static str) -> Result<u32, HeaderError> {
    let value = header.get(field).ok_or(HeaderError::MissingField(field))?;
    let invalid = || HeaderError::InvalidNumeric {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse().map_err(|_| invalid())
}
