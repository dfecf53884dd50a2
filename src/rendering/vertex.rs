//! Vertex attribute contract shared by every shader pair.
//!
//! Attribute streams are opaque byte arrays that only the vertex shader
//! decodes. Everything downstream of the vertex shader is fixed-point.

use crate::error::ConfigError;
use crate::fixed::{self, Fixed, FIX_SHIFT};
use bytemuck::Pod;
use glam::Vec4;

/// Maximum number of simultaneously bound attribute streams.
pub const MAX_ATTRIBUTES: usize = 8;
/// Maximum number of varying channels a shader pair may use.
pub const MAX_VARYINGS: usize = 16;

/// Fractional bits of [`ScreenVertex::oow`].
pub const OOW_SHIFT: u32 = 30;
pub const OOW_ONE: i64 = 1 << OOW_SHIFT;

/// Per-vertex result of the vertex shader.
///
/// `x, y, z, w` are homogeneous clip-space coordinates in 16.16. The varyings are
/// arbitrary integer channels; keeping the payload in the high bits (e.g.
/// `color << 16`) gives the interpolators more precision to work with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VertexOutput {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub w: Fixed,
    pub varyings: [Fixed; MAX_VARYINGS],
}

impl VertexOutput {
    /// Set the clip-space position from a float vector.
    #[inline]
    pub fn set_position(&mut self, clip: Vec4) {
        let [x, y, z, w] = fixed::from_vec4(clip);
        self.x = x;
        self.y = y;
        self.z = z;
        self.w = w;
    }

    #[inline]
    pub fn position(&self) -> [Fixed; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

/// A vertex after clipping and the viewport transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenVertex {
    /// Pixel x, 16.16.
    pub x: Fixed,
    /// Pixel y, 16.16 (grows downwards).
    pub y: Fixed,
    /// Depth after the depth-range mapping, 16.16.
    pub z: Fixed,
    /// Reciprocal of clip-space w with [`OOW_SHIFT`] fractional bits. Always > 0.
    pub oow: i64,
    pub varyings: [Fixed; MAX_VARYINGS],
}

impl ScreenVertex {
    /// Vertex at a pixel position with `w = 1`, zero depth and zero varyings.
    pub fn new(x: Fixed, y: Fixed) -> Self {
        Self {
            x,
            y,
            z: 0,
            oow: OOW_ONE,
            varyings: [0; MAX_VARYINGS],
        }
    }

    pub fn with_varyings(mut self, varyings: &[Fixed]) -> Self {
        let n = varyings.len().min(MAX_VARYINGS);
        self.varyings[..n].copy_from_slice(&varyings[..n]);
        self
    }

    pub fn with_depth(mut self, z: Fixed) -> Self {
        self.z = z;
        self
    }

    /// Set `oow` from a 16.16 clip-space w. `w` must be positive.
    pub fn with_w(mut self, w: Fixed) -> Self {
        debug_assert!(w > 0);
        self.oow = oow_from_w(w);
        self
    }
}

/// `1 / w` with [`OOW_SHIFT`] fractional bits for a positive 16.16 `w`.
#[inline]
pub fn oow_from_w(w: Fixed) -> i64 {
    (1i64 << (FIX_SHIFT + OOW_SHIFT)) / w as i64
}

/// Interpolated per-fragment state in affine (already divided) form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FragmentData {
    pub z: Fixed,
    pub varyings: [Fixed; MAX_VARYINGS],
}

impl FragmentData {
    /// Per-pixel increment walking from `from` to `to` in `steps` steps.
    #[inline]
    pub fn step_between(
        from: &FragmentData,
        to: &FragmentData,
        steps: u32,
        varying_count: usize,
        with_z: bool,
    ) -> FragmentData {
        let mut r = FragmentData::default();
        if with_z {
            r.z = fixed::interp_step(from.z, to.z, steps);
        }
        for i in 0..varying_count {
            r.varyings[i] = fixed::interp_step(from.varyings[i], to.varyings[i], steps);
        }
        r
    }

    #[inline(always)]
    pub fn add_step(&mut self, step: &FragmentData, varying_count: usize, with_z: bool) {
        if with_z {
            self.z = self.z.wrapping_add(step.z);
        }
        for (v, s) in self.varyings[..varying_count]
            .iter_mut()
            .zip(&step.varyings[..varying_count])
        {
            *v = v.wrapping_add(*s);
        }
    }

    /// Apply `step` `k` times at once.
    #[inline(always)]
    pub fn advance(&mut self, step: &FragmentData, k: i32, varying_count: usize, with_z: bool) {
        if with_z {
            self.z = self.z.wrapping_add(step.z.wrapping_mul(k));
        }
        for (v, s) in self.varyings[..varying_count]
            .iter_mut()
            .zip(&step.varyings[..varying_count])
        {
            *v = v.wrapping_add(s.wrapping_mul(k));
        }
    }
}

/// One bound vertex attribute array: raw records with a fixed stride.
#[derive(Clone, Copy, Debug)]
pub struct AttributeStream<'a> {
    data: &'a [u8],
    stride: usize,
}

impl<'a> AttributeStream<'a> {
    pub fn new(data: &'a [u8], stride: usize) -> Result<Self, ConfigError> {
        if stride == 0 {
            return Err(ConfigError::InvalidStride { stride, width: 1 });
        }
        Ok(Self { data, stride })
    }

    /// Stream over a slice of plain-old-data records.
    pub fn from_slice<T: Pod>(records: &'a [T]) -> Self {
        Self {
            data: bytemuck::cast_slice(records),
            stride: std::mem::size_of::<T>().max(1),
        }
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Number of complete records in the stream.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.stride
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of record `index`.
    #[inline]
    pub fn record(&self, index: usize) -> &'a [u8] {
        let start = index * self.stride;
        &self.data[start..start + self.stride]
    }
}

/// The set of attribute streams visible to a vertex shader during a draw call.
#[derive(Clone, Copy, Debug, Default)]
pub struct VertexAttribs<'a> {
    streams: [Option<AttributeStream<'a>>; MAX_ATTRIBUTES],
}

impl<'a> VertexAttribs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribs with a single stream bound at slot 0.
    pub fn single(stream: AttributeStream<'a>) -> Self {
        let mut attribs = Self::default();
        attribs.streams[0] = Some(stream);
        attribs
    }

    pub fn bind(&mut self, slot: usize, stream: AttributeStream<'a>) -> Result<(), ConfigError> {
        let entry = self
            .streams
            .get_mut(slot)
            .ok_or(ConfigError::AttributeIndexOutOfRange {
                index: slot,
                max: MAX_ATTRIBUTES - 1,
            })?;
        *entry = Some(stream);
        Ok(())
    }

    pub fn with(mut self, slot: usize, stream: AttributeStream<'a>) -> Result<Self, ConfigError> {
        self.bind(slot, stream)?;
        Ok(self)
    }

    #[inline]
    pub fn stream(&self, slot: usize) -> Option<&AttributeStream<'a>> {
        self.streams.get(slot).and_then(|s| s.as_ref())
    }

    /// Every slot in `0..count` must be bound.
    pub fn check_bound(&self, count: usize) -> Result<(), ConfigError> {
        if count > MAX_ATTRIBUTES {
            return Err(ConfigError::TooManyAttributes {
                count,
                max: MAX_ATTRIBUTES,
            });
        }
        match self.streams[..count].iter().position(Option::is_none) {
            Some(slot) => Err(ConfigError::UnboundAttribute { slot, count }),
            None => Ok(()),
        }
    }
}

/// The view of one vertex handed to [`super::shader::VertexShader::shade`].
#[derive(Clone, Copy)]
pub struct VertexInput<'a> {
    attribs: &'a VertexAttribs<'a>,
    index: u32,
}

impl<'a> VertexInput<'a> {
    #[inline]
    pub(crate) fn new(attribs: &'a VertexAttribs<'a>, index: u32) -> Self {
        Self { attribs, index }
    }

    /// Index of the vertex being shaded.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Raw record bytes from stream `slot`.
    ///
    /// Panics if the slot is unbound; geometry processors check
    /// [`VertexAttribs::covers`] before shading.
    #[inline]
    pub fn attribute(&self, slot: usize) -> &'a [u8] {
        match self.attribs.stream(slot) {
            Some(stream) => stream.record(self.index as usize),
            None => panic!("attribute stream {slot} is not bound"),
        }
    }

    /// Decode the record from stream `slot` as `T`.
    #[inline]
    pub fn read<T: Pod>(&self, slot: usize) -> T {
        let bytes = self.attribute(slot);
        bytemuck::pod_read_unaligned(&bytes[..std::mem::size_of::<T>()])
    }
}
