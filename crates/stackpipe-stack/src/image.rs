use crate::error::{Result, StackError};
use crate::schema::{BitDepth, Dimensions, StackHeader};

/// Plane buffers of a stack, all at one sample width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Planes {
    Gray8(Vec<Vec<u8>>),
    Gray16(Vec<Vec<u16>>),
}

impl Planes {
    pub fn bit_depth(&self) -> BitDepth {
        match self {
            Planes::Gray8(_) => BitDepth::Eight,
            Planes::Gray16(_) => BitDepth::Sixteen,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Planes::Gray8(planes) => planes.len(),
            Planes::Gray16(planes) => planes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sample_counts(&self) -> Vec<usize> {
        match self {
            Planes::Gray8(planes) => planes.iter().map(Vec::len).collect(),
            Planes::Gray16(planes) => planes.iter().map(Vec::len).collect(),
        }
    }
}

/// A hyperstack: header metadata plus exactly `Channels*Slices*Frames` planes
/// of `Width*Height` samples each.
///
/// Planes are ordered channel-fastest, then slice, then frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStack {
    header: StackHeader,
    planes: Planes,
}

impl ImageStack {
    /// Build a stack, checking plane count and plane sizes against `dims`.
    pub fn new(title: impl Into<String>, dims: Dimensions, planes: Planes) -> Result<Self> {
        let header = StackHeader::new(title, planes.bit_depth(), dims);
        Self::from_parts(header, planes)
    }

    /// Build a stack from an already-typed header.
    pub fn from_parts(header: StackHeader, planes: Planes) -> Result<Self> {
        header.dims.validate()?;
        if header.bit_depth != planes.bit_depth() {
            return Err(StackError::DepthMismatch {
                declared: header.bit_depth.bits(),
                actual: planes.bit_depth().bits(),
            });
        }

        let expected = header.dims.plane_count()?;
        if planes.len() != expected {
            return Err(StackError::PlaneCount {
                expected,
                actual: planes.len(),
            });
        }

        let samples = header.dims.samples_per_plane()?;
        let bytes_per_sample = header.bit_depth.bytes_per_sample();
        if let Some((index, actual)) = planes
            .sample_counts()
            .into_iter()
            .enumerate()
            .find(|(_, count)| *count != samples)
        {
            return Err(StackError::PlaneSize {
                index,
                expected: samples * bytes_per_sample,
                actual: actual * bytes_per_sample,
            });
        }

        Ok(Self { header, planes })
    }

    /// Attach a pass-through header value (ignored for required keys).
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.extra.push((key.into(), value.into()));
        self
    }

    pub fn title(&self) -> &str {
        &self.header.title
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.header.bit_depth
    }

    pub fn dims(&self) -> Dimensions {
        self.header.dims
    }

    pub fn header(&self) -> &StackHeader {
        &self.header
    }

    pub fn planes(&self) -> &Planes {
        &self.planes
    }

    pub fn into_planes(self) -> Planes {
        self.planes
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// Index of the plane at (channel, slice, frame), all zero-based.
    pub fn plane_index(&self, channel: u32, slice: u32, frame: u32) -> Option<usize> {
        let dims = self.header.dims;
        if channel >= dims.channels || slice >= dims.slices || frame >= dims.frames {
            return None;
        }
        let (c, s, f) = (channel as usize, slice as usize, frame as usize);
        let (nc, ns) = (dims.channels as usize, dims.slices as usize);
        Some(c + nc * (s + ns * f))
    }
}
