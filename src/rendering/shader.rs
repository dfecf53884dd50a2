//! Shader plug-in traits.
//!
//! Shaders are ordinary Rust types. Varying counts and the depth flag are
//! associated constants, so the span drawers and interpolators specialize at
//! compile time and never loop over unused channels.

use super::vertex::{FragmentData, VertexInput, VertexOutput, MAX_ATTRIBUTES, MAX_VARYINGS};
use crate::error::ConfigError;

/// Per-vertex program.
///
/// `Sync` because replica and tiled pipelines share one shader between workers.
pub trait VertexShader: Sync {
    /// Number of attribute streams (slots `0..ATTRIBUTE_COUNT`) read by `shade`.
    const ATTRIBUTE_COUNT: usize;
    /// Number of varyings written to [`VertexOutput::varyings`].
    const VARYING_COUNT: usize;

    fn shade(&self, input: &VertexInput<'_>, out: &mut VertexOutput);
}

impl<T: VertexShader> VertexShader for &T {
    const ATTRIBUTE_COUNT: usize = T::ATTRIBUTE_COUNT;
    const VARYING_COUNT: usize = T::VARYING_COUNT;

    #[inline(always)]
    fn shade(&self, input: &VertexInput<'_>, out: &mut VertexOutput) {
        (**self).shade(input, out)
    }
}

/// What every fragment program declares about the data it consumes.
pub trait FragmentShader {
    const VARYING_COUNT: usize;
    /// Whether depth is interpolated and passed in [`FragmentData::z`].
    const INTERPOLATE_Z: bool;
}

/// One invocation per covered pixel with direct access to the target value.
pub trait SingleSampleShader<U>: FragmentShader {
    fn single_fragment(&self, x: i32, y: i32, fd: &FragmentData, target: &mut U);
}

/// One invocation per covered pixel with the pixel's colour and depth cells
/// already resolved by the span drawer.
pub trait ColorDepthShader: FragmentShader {
    type Color;
    type Depth;

    fn color_depth_fragment(
        &self,
        fd: &FragmentData,
        color: &mut Self::Color,
        depth: &mut Self::Depth,
    );
}

/// One invocation per output pixel per emission, with the accumulated sample
/// coverage mask. Bit `(sy * N + sx)` is set for each covered sample.
pub trait MultisampleShader<U>: FragmentShader {
    fn multisample_fragment(&self, x: i32, y: i32, fd: &FragmentData, mask: u32, target: &mut U);
}

/// Check a vertex shader's declared counts against the pipeline limits.
pub fn validate_vertex_shader<V: VertexShader>() -> Result<(), ConfigError> {
    if V::ATTRIBUTE_COUNT > MAX_ATTRIBUTES {
        return Err(ConfigError::TooManyAttributes {
            count: V::ATTRIBUTE_COUNT,
            max: MAX_ATTRIBUTES,
        });
    }
    if V::VARYING_COUNT > MAX_VARYINGS {
        return Err(ConfigError::TooManyVaryings {
            count: V::VARYING_COUNT,
            max: MAX_VARYINGS,
        });
    }
    Ok(())
}

/// Check that the vertex stage feeds exactly the varyings the fragment stage reads.
pub fn check_varying_counts(vertex: usize, fragment: usize) -> Result<(), ConfigError> {
    if fragment > MAX_VARYINGS {
        return Err(ConfigError::TooManyVaryings {
            count: fragment,
            max: MAX_VARYINGS,
        });
    }
    if vertex != fragment {
        return Err(ConfigError::VaryingCountMismatch { vertex, fragment });
    }
    Ok(())
}
