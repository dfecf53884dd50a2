//! Geometry processing: vertex shading, clipping, viewport mapping and culling.
//!
//! A `GeometryProcessor` owns its vertex shader and the primitive sink it feeds
//! (a [`Rasterizer`](super::rasterizer::Rasterizer) or a
//! [`TiledRasterizer`](super::tiled::TiledRasterizer)). Draw calls take the
//! attribute streams and an index slice; every distinct index is shaded once
//! per call.

use super::clipping::{self, Clipper};
use super::framebuffer::Rect;
use super::rasterizer::PrimitiveSink;
use super::shader::{self, VertexShader};
use super::vertex::{
    oow_from_w, ScreenVertex, VertexAttribs, VertexInput, VertexOutput, MAX_VARYINGS,
};
use crate::count_call;
use crate::error::ConfigError;
use crate::fixed::{div_floor, Fixed, FIX_ONE, FIX_SHIFT};

/// Largest viewport coordinate accepted by [`GeometryProcessor::set_viewport`].
///
/// With the clip guard band at `4 * w`, projected coordinates stay below
/// `3 * MAX_VIEWPORT_DIM`, inside the 16.16 range.
pub const MAX_VIEWPORT_DIM: i32 = 4096;

/// Which triangles are discarded, by winding in normalized device coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// Draw both windings.
    None,
    /// Drop clockwise triangles.
    #[default]
    Cw,
    /// Drop counter-clockwise triangles.
    Ccw,
}

impl CullMode {
    /// `area2` is the doubled signed area in screen space (y down), where
    /// clockwise-in-NDC triangles come out positive.
    #[inline]
    fn culls(self, area2: i64) -> bool {
        match self {
            CullMode::None => false,
            CullMode::Cw => area2 > 0,
            CullMode::Ccw => area2 < 0,
        }
    }
}

/// Viewports must be non-empty, start at non-negative coordinates and end
/// within [`MAX_VIEWPORT_DIM`].
pub fn check_viewport(x: i32, y: i32, width: i32, height: i32) -> Result<(), ConfigError> {
    if x < 0 || y < 0 || width <= 0 || height <= 0 {
        return Err(ConfigError::InvalidViewport { x, y, width, height });
    }
    let (right, bottom) = (x + width, y + height);
    if right > MAX_VIEWPORT_DIM || bottom > MAX_VIEWPORT_DIM {
        return Err(ConfigError::ViewportTooLarge {
            right,
            bottom,
            limit: MAX_VIEWPORT_DIM,
        });
    }
    Ok(())
}

pub fn check_depth_range(near: Fixed, far: Fixed) -> Result<(), ConfigError> {
    if !(0..=FIX_ONE).contains(&near) || !(0..=FIX_ONE).contains(&far) {
        return Err(ConfigError::InvalidDepthRange { near, far });
    }
    Ok(())
}

/// Precomputed viewport and depth-range mapping, all 16.16.
#[derive(Clone, Copy, Debug)]
struct ViewportTransform {
    ox: i64,
    oy: i64,
    hw: i64,
    hh: i64,
    pz: i64,
    hz: i64,
}

impl ViewportTransform {
    fn new(vp: Rect, near: Fixed, far: Fixed) -> Self {
        let hw = (vp.width as i64) << (FIX_SHIFT - 1);
        let hh = (vp.height as i64) << (FIX_SHIFT - 1);
        Self {
            ox: ((vp.x as i64) << FIX_SHIFT) + hw,
            oy: ((vp.y as i64) << FIX_SHIFT) + hh,
            hw,
            hh,
            pz: (near as i64 + far as i64) / 2,
            hz: (far as i64 - near as i64) / 2,
        }
    }

    /// `None` for vertices that reach the camera plane.
    #[inline]
    fn project(&self, v: &VertexOutput, varying_count: usize) -> Option<ScreenVertex> {
        if v.w <= 0 {
            return None;
        }
        let w = v.w as i64;
        let mut s = ScreenVertex {
            x: (self.ox + div_floor(v.x as i64 * self.hw, w)) as Fixed,
            y: (self.oy - div_floor(v.y as i64 * self.hh, w)) as Fixed,
            z: (self.pz + div_floor(v.z as i64 * self.hz, w)) as Fixed,
            oow: oow_from_w(v.w),
            varyings: [0; MAX_VARYINGS],
        };
        s.varyings[..varying_count].copy_from_slice(&v.varyings[..varying_count]);
        Some(s)
    }
}

#[inline]
fn screen_area2(a: &ScreenVertex, b: &ScreenVertex, c: &ScreenVertex) -> i64 {
    let (ax, ay) = (a.x as i64, a.y as i64);
    (b.x as i64 - ax) * (c.y as i64 - ay) - (b.y as i64 - ay) * (c.x as i64 - ax)
}

const EMPTY_GENERATION: u32 = 0;

/// The vertex cache is cut back to what the current call needs once it holds
/// more than this many times that (and more than `MIN_RETAINED_SLOTS`).
const SLOT_SHRINK_FACTOR: usize = 4;
const MIN_RETAINED_SLOTS: usize = 1024;

pub struct GeometryProcessor<V, R> {
    shader: V,
    sink: R,
    viewport: Rect,
    depth_range: (Fixed, Fixed),
    cull_mode: CullMode,
    transform: ViewportTransform,
    /// Per vertex index: (generation, position in `outputs`).
    slots: Vec<(u32, u32)>,
    generation: u32,
    outputs: Vec<VertexOutput>,
    clipper: Clipper,
    polygon: Vec<ScreenVertex>,
}

impl<V: VertexShader, R: PrimitiveSink> GeometryProcessor<V, R> {
    /// Bind `shader` to `sink`. The viewport starts out as the sink's bounds
    /// when those form a valid viewport, and empty otherwise.
    pub fn new(shader: V, sink: R) -> Result<Self, ConfigError> {
        shader::validate_vertex_shader::<V>()?;
        shader::check_varying_counts(V::VARYING_COUNT, sink.varying_count())?;
        let mut gp = Self {
            shader,
            sink,
            viewport: Rect::new(0, 0, 0, 0),
            depth_range: (0, FIX_ONE),
            cull_mode: CullMode::default(),
            transform: ViewportTransform::new(Rect::new(0, 0, 0, 0), 0, FIX_ONE),
            slots: Vec::new(),
            generation: EMPTY_GENERATION,
            outputs: Vec::new(),
            clipper: Clipper::new(),
            polygon: Vec::with_capacity(clipping::CLIP_BUFFER),
        };
        let b = gp.sink.bounds();
        if check_viewport(b.x, b.y, b.width, b.height).is_ok() {
            gp.set_viewport(b.x, b.y, b.width, b.height)?;
        }
        Ok(gp)
    }

    pub fn set_viewport(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<(), ConfigError> {
        check_viewport(x, y, width, height)?;
        self.viewport = Rect::new(x, y, width, height);
        self.update_transform();
        log::debug!("viewport set to {}x{} at ({}, {})", width, height, x, y);
        Ok(())
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Map NDC depth [-1, 1] to `[near, far]`, both 16.16 within [0, 1].
    pub fn set_depth_range(&mut self, near: Fixed, far: Fixed) -> Result<(), ConfigError> {
        check_depth_range(near, far)?;
        self.depth_range = (near, far);
        self.update_transform();
        Ok(())
    }

    pub fn depth_range(&self) -> (Fixed, Fixed) {
        self.depth_range
    }

    pub fn set_cull_mode(&mut self, mode: CullMode) {
        self.cull_mode = mode;
    }

    pub fn cull_mode(&self) -> CullMode {
        self.cull_mode
    }

    pub fn shader(&self) -> &V {
        &self.shader
    }

    pub fn set_vertex_shader(&mut self, shader: V) {
        self.shader = shader;
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    pub fn into_sink(self) -> R {
        self.sink
    }

    /// Number of distinct vertices shaded by the most recent draw call.
    pub fn shaded_vertex_count(&self) -> usize {
        self.outputs.len()
    }

    fn update_transform(&mut self) {
        let (near, far) = self.depth_range;
        self.transform = ViewportTransform::new(self.viewport, near, far);
    }

    /// Check the bindings and size the vertex cache for `indices`.
    fn begin_call(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        attribs.check_bound(V::ATTRIBUTE_COUNT)?;
        let needed = indices.iter().max().map_or(0, |&m| m as usize + 1);
        if self.slots.len() < needed {
            self.slots.resize(needed, (EMPTY_GENERATION, 0));
        } else if self.slots.len() > SLOT_SHRINK_FACTOR * needed.max(MIN_RETAINED_SLOTS) {
            log::trace!("vertex cache shrunk from {} to {} slots", self.slots.len(), needed);
            self.slots.truncate(needed);
            self.slots.shrink_to_fit();
        }
        self.outputs.clear();
        self.generation = self.generation.wrapping_add(1);
        if self.generation == EMPTY_GENERATION {
            self.slots.iter_mut().for_each(|s| *s = (EMPTY_GENERATION, 0));
            self.generation = 1;
        }
        Ok(())
    }

    fn end_call(&mut self, what: &str, count: usize) {
        log::trace!(
            "{}: {} primitives, {} vertices shaded",
            what,
            count,
            self.outputs.len()
        );
        self.sink.end_draw();
    }

    /// Position of vertex `index` in the output cache, shading it on first use.
    #[inline]
    fn fetch(&mut self, attribs: &VertexAttribs<'_>, index: u32) -> usize {
        let i = index as usize;
        let (generation, pos) = self.slots[i];
        if generation == self.generation {
            return pos as usize;
        }
        let mut out = VertexOutput::default();
        self.shader.shade(&VertexInput::new(attribs, index), &mut out);
        count_call!(crate::perf::FUNCTION_COUNTERS.vertices_shaded);
        let pos = self.outputs.len();
        self.outputs.push(out);
        self.slots[i] = (self.generation, pos as u32);
        pos
    }

    /// Fails only when a stream the shader reads is unbound; nothing is drawn
    /// in that case.
    pub fn draw_triangles(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        debug_assert!(indices.len() % 3 == 0, "index count is not a multiple of 3");
        self.begin_call(attribs, indices)?;
        for tri in indices.chunks_exact(3) {
            count_call!(crate::perf::FUNCTION_COUNTERS.triangles_submitted);
            let a = self.fetch(attribs, tri[0]);
            let b = self.fetch(attribs, tri[1]);
            let c = self.fetch(attribs, tri[2]);
            self.process_triangle(a, b, c);
        }
        self.end_call("draw_triangles", indices.len() / 3);
        Ok(())
    }

    pub fn draw_lines(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        debug_assert!(indices.len() % 2 == 0, "index count is not a multiple of 2");
        self.begin_call(attribs, indices)?;
        let vc = V::VARYING_COUNT;
        for line in indices.chunks_exact(2) {
            let a = self.fetch(attribs, line[0]);
            let b = self.fetch(attribs, line[1]);
            let Some((p, q)) = clipping::clip_line(&self.outputs[a], &self.outputs[b], vc) else {
                continue;
            };
            let t = &self.transform;
            if let (Some(p), Some(q)) = (t.project(&p, vc), t.project(&q, vc)) {
                self.sink.draw_line(&p, &q);
            }
        }
        self.end_call("draw_lines", indices.len() / 2);
        Ok(())
    }

    pub fn draw_points(
        &mut self,
        attribs: &VertexAttribs<'_>,
        indices: &[u32],
    ) -> Result<(), ConfigError> {
        self.begin_call(attribs, indices)?;
        let vc = V::VARYING_COUNT;
        for &index in indices {
            let a = self.fetch(attribs, index);
            let v = &self.outputs[a];
            if !clipping::point_visible(v) {
                continue;
            }
            if let Some(p) = self.transform.project(v, vc) {
                self.sink.draw_point(&p);
            }
        }
        self.end_call("draw_points", indices.len());
        Ok(())
    }

    fn process_triangle(&mut self, a: usize, b: usize, c: usize) {
        let vc = V::VARYING_COUNT;
        let poly = self
            .clipper
            .clip_triangle(&self.outputs[a], &self.outputs[b], &self.outputs[c], vc);
        if poly.len() < 3 {
            return;
        }
        if poly.len() > 3 || poly[0] != self.outputs[a] || poly[2] != self.outputs[c] {
            count_call!(crate::perf::FUNCTION_COUNTERS.triangles_clipped);
        }

        self.polygon.clear();
        for v in poly {
            match self.transform.project(v, vc) {
                Some(s) => self.polygon.push(s),
                None => return,
            }
        }

        let first = self.polygon[0];
        for i in 1..self.polygon.len() - 1 {
            let (v1, v2) = (&self.polygon[i], &self.polygon[i + 1]);
            let area2 = screen_area2(&first, v1, v2);
            if area2 == 0 {
                count_call!(crate::perf::FUNCTION_COUNTERS.triangles_degenerate);
                continue;
            }
            if self.cull_mode.culls(area2) {
                count_call!(crate::perf::FUNCTION_COUNTERS.triangles_culled);
                continue;
            }
            self.sink.draw_triangle(&first, v1, v2);
        }
    }
}
