/// Scan conversion of screen-space triangles, lines and points.
/// Coverage is exact edge-function math on 24.8 snapped coordinates;
/// attributes are evaluated exactly every `AFFINE_LENGTH` pixels and stepped
/// linearly in between.
use super::framebuffer::Rect;
use super::interpolation::{Interpolant, LineSetup, TriangleSetup};
use super::span::SpanDrawer;
use super::vertex::{FragmentData, ScreenVertex, MAX_VARYINGS};
use crate::count_add;
use crate::count_call;
use crate::error::ConfigError;
use crate::fixed::{self, div_ceil, div_floor, snap_subpixel, SUBPIXEL_HALF, SUBPIXEL_ONE};

/// Length of the affine sub-spans a row is cut into.
pub const AFFINE_LENGTH: i32 = 24;

/// Largest clip rect coordinate; screen positions are 16.16.
pub const MAX_CLIP_EXTENT: i32 = i16::MAX as i32;

/// Receiver of screen-space primitives from a geometry processor.
pub trait PrimitiveSink {
    /// Varyings the sink's fragment stage consumes.
    fn varying_count(&self) -> usize;

    /// Pixel area the sink can write; a geometry processor uses it as the
    /// default viewport.
    fn bounds(&self) -> Rect;

    fn draw_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex);
    fn draw_line(&mut self, v0: &ScreenVertex, v1: &ScreenVertex);
    fn draw_point(&mut self, v: &ScreenVertex);

    /// Called once after the last primitive of a draw call.
    fn end_draw(&mut self) {}
}

/// Clip rects start at non-negative coordinates and stay inside the 16.16 range.
pub fn check_clip_rect(rect: Rect) -> Result<(), ConfigError> {
    if rect.x < 0
        || rect.y < 0
        || rect.width < 0
        || rect.height < 0
        || rect.right() > MAX_CLIP_EXTENT
        || rect.bottom() > MAX_CLIP_EXTENT
    {
        return Err(ConfigError::InvalidClipRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }
    Ok(())
}

/// One triangle edge, ready for per-row evaluation.
#[derive(Clone, Copy, Debug)]
struct Edge {
    ax: i64,
    ay: i64,
    dx: i64,
    dy: i64,
    /// 0 on top/left edges (ties are inside), 1 otherwise.
    bias: i64,
}

impl Edge {
    #[inline]
    fn new(a: (i64, i64), b: (i64, i64)) -> Self {
        let dx = b.0 - a.0;
        let dy = b.1 - a.1;
        let top_left = (dy == 0 && dx > 0) || dy < 0;
        Self {
            ax: a.0,
            ay: a.1,
            dx,
            dy,
            bias: if top_left { 0 } else { 1 },
        }
    }

    /// Narrow `[xl, xr]` to the pixels of the row whose centre is at `yc`
    /// (24.8) that lie on the inside of this edge.
    #[inline(always)]
    fn clamp_row(&self, yc: i64, xl: &mut i64, xr: &mut i64) {
        // E(x) = e0 + a * x at pixel centre x * 256 + 128
        let e0 = self.dx * (yc - self.ay) - self.dy * (SUBPIXEL_HALF - self.ax);
        let a = -self.dy * SUBPIXEL_ONE;
        if a > 0 {
            *xl = (*xl).max(div_ceil(self.bias - e0, a));
        } else if a < 0 {
            *xr = (*xr).min(div_floor(e0 - self.bias, -a));
        } else if e0 < self.bias {
            *xr = *xl - 1;
        }
    }
}

/// Doubled signed area of `a, b, p` in 24.8 units.
#[inline(always)]
fn orient(a: (i64, i64), b: (i64, i64), p: (i64, i64)) -> i64 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

#[inline(always)]
fn snapped(v: &ScreenVertex) -> (i64, i64) {
    (snap_subpixel(v.x), snap_subpixel(v.y))
}

pub struct Rasterizer<D> {
    drawer: D,
    clip: Rect,
    perspective: bool,
    threshold: (i32, i32),
}

impl<D: SpanDrawer> Rasterizer<D> {
    pub fn new(drawer: D, clip_rect: Rect) -> Result<Self, ConfigError> {
        let mut r = Self {
            drawer,
            clip: Rect::new(0, 0, 0, 0),
            perspective: true,
            threshold: (0, 0),
        };
        r.set_clip_rect(clip_rect)?;
        Ok(r)
    }

    /// Restrict all output to `rect`. Notifies the span drawer.
    pub fn set_clip_rect(&mut self, rect: Rect) -> Result<(), ConfigError> {
        check_clip_rect(rect)?;
        log::debug!("clip rect set to {:?}", rect);
        self.clip = rect;
        self.drawer.clip_rect_changed(&rect);
        Ok(())
    }

    pub fn clip_rect(&self) -> Rect {
        self.clip
    }

    pub fn set_perspective_correction(&mut self, enable: bool) {
        self.perspective = enable;
    }

    pub fn perspective_correction(&self) -> bool {
        self.perspective
    }

    /// Triangles whose bounding box is smaller than `width × height` pixels in
    /// both dimensions are interpolated affinely even with correction enabled.
    pub fn set_perspective_threshold(&mut self, width: i32, height: i32) {
        self.threshold = (width, height);
    }

    pub fn drawer(&self) -> &D {
        &self.drawer
    }

    pub fn drawer_mut(&mut self) -> &mut D {
        &mut self.drawer
    }

    pub fn into_drawer(self) -> D {
        self.drawer
    }

    /// Whether a primitive with the given 24.8 extents is drawn with perspective.
    #[inline]
    fn use_perspective(&self, extent_x: i64, extent_y: i64) -> bool {
        if !self.perspective {
            return false;
        }
        let small = extent_x < self.threshold.0 as i64 * SUBPIXEL_ONE
            && extent_y < self.threshold.1 as i64 * SUBPIXEL_ONE;
        !small
    }

    /// Cut `[xl, xr]` of row `y` into affine sub-spans and hand them to the drawer.
    #[inline]
    fn emit_run<I: Interpolant>(&mut self, setup: &I, y: i32, xl: i32, xr: i32) {
        count_call!(crate::perf::FUNCTION_COUNTERS.spans);
        count_add!(crate::perf::FUNCTION_COUNTERS.fragments, xr - xl + 1);
        let vc = D::VARYING_COUNT;
        let z = D::INTERPOLATE_Z;
        let mut x = xl;
        let mut fd = setup.fragment_at(x, y);
        loop {
            count_call!(crate::perf::FUNCTION_COUNTERS.affine_spans);
            let remaining = xr - x + 1;
            if remaining > AFFINE_LENGTH {
                let next = setup.fragment_at(x + AFFINE_LENGTH, y);
                let step = FragmentData::step_between(&fd, &next, AFFINE_LENGTH as u32, vc, z);
                self.drawer.affine_span(x, y, &fd, &step, AFFINE_LENGTH);
                fd = next;
                x += AFFINE_LENGTH;
            } else {
                let step = if remaining > 1 {
                    let last = setup.fragment_at(xr, y);
                    FragmentData::step_between(&fd, &last, (remaining - 1) as u32, vc, z)
                } else {
                    FragmentData::default()
                };
                self.drawer.affine_span(x, y, &fd, &step, remaining);
                return;
            }
        }
    }

    pub fn draw_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) {
        let p0 = snapped(v0);
        let (mut p1, mut p2) = (snapped(v1), snapped(v2));
        let (mut v1, mut v2) = (v1, v2);
        let mut area2 = orient(p0, p1, p2);
        if area2 == 0 {
            count_call!(crate::perf::FUNCTION_COUNTERS.triangles_degenerate);
            return;
        }
        if area2 < 0 {
            std::mem::swap(&mut v1, &mut v2);
            std::mem::swap(&mut p1, &mut p2);
            area2 = -area2;
        }

        let min_y = p0.1.min(p1.1).min(p2.1);
        let max_y = p0.1.max(p1.1).max(p2.1);
        let first_row = div_ceil(min_y - SUBPIXEL_HALF, SUBPIXEL_ONE).max(self.clip.y as i64);
        let last_row =
            div_floor(max_y - SUBPIXEL_HALF, SUBPIXEL_ONE).min(self.clip.bottom() as i64 - 1);
        if first_row > last_row || self.clip.is_empty() {
            return;
        }

        let edges = [Edge::new(p0, p1), Edge::new(p1, p2), Edge::new(p2, p0)];
        let extent_x = p0.0.max(p1.0).max(p2.0) - p0.0.min(p1.0).min(p2.0);
        let setup = TriangleSetup::new(
            v0,
            v1,
            v2,
            self.use_perspective(extent_x, max_y - min_y),
            D::VARYING_COUNT,
            D::INTERPOLATE_Z,
        );

        self.drawer.begin_triangle(v0, v1, v2, area2);
        let clip_l = self.clip.x as i64;
        let clip_r = self.clip.right() as i64 - 1;
        for y in first_row..=last_row {
            let yc = y * SUBPIXEL_ONE + SUBPIXEL_HALF;
            let (mut xl, mut xr) = (clip_l, clip_r);
            for e in &edges {
                e.clamp_row(yc, &mut xl, &mut xr);
            }
            if xl <= xr {
                self.emit_run(&setup, y as i32, xl as i32, xr as i32);
            }
        }
        self.drawer.end_triangle();
    }

    pub fn draw_line(&mut self, v0: &ScreenVertex, v1: &ScreenVertex) {
        let (p0, p1) = (snapped(v0), snapped(v1));
        let (dx, dy) = (p1.0 - p0.0, p1.1 - p0.1);
        if dx == 0 && dy == 0 {
            return;
        }
        let x_major = dx.abs() >= dy.abs();
        // Walk in increasing major coordinate.
        let reverse = if x_major { dx < 0 } else { dy < 0 };
        let (a, b, pa, pb) = if reverse {
            (v1, v0, p1, p0)
        } else {
            (v0, v1, p0, p1)
        };
        let (dx, dy) = (pb.0 - pa.0, pb.1 - pa.1);

        count_call!(crate::perf::FUNCTION_COUNTERS.lines_drawn);
        let setup = LineSetup::new(
            a,
            b,
            x_major,
            self.use_perspective(dx.abs(), dy.abs()),
            D::VARYING_COUNT,
            D::INTERPOLATE_Z,
        );
        let clip = self.clip;
        self.drawer.begin_line(a, b);
        if x_major {
            let first = div_ceil(pa.0 - SUBPIXEL_HALF, SUBPIXEL_ONE).max(clip.x as i64);
            let last =
                (div_ceil(pb.0 - SUBPIXEL_HALF, SUBPIXEL_ONE) - 1).min(clip.right() as i64 - 1);
            // (row, first x, last x) of the run being collected
            let mut run: Option<(i64, i64, i64)> = None;
            for px in first..=last {
                let cx = px * SUBPIXEL_ONE + SUBPIXEL_HALF;
                let py = div_floor(pa.1 * dx + dy * (cx - pa.0), SUBPIXEL_ONE * dx);
                let visible = py >= clip.y as i64 && py < clip.bottom() as i64;
                match run {
                    Some((row, start, _)) if visible && row == py => run = Some((row, start, px)),
                    _ => {
                        if let Some((row, start, end)) = run.take() {
                            self.emit_run(&setup, row as i32, start as i32, end as i32);
                        }
                        if visible {
                            run = Some((py, px, px));
                        }
                    }
                }
            }
            if let Some((row, start, end)) = run {
                self.emit_run(&setup, row as i32, start as i32, end as i32);
            }
        } else {
            let first = div_ceil(pa.1 - SUBPIXEL_HALF, SUBPIXEL_ONE).max(clip.y as i64);
            let last =
                (div_ceil(pb.1 - SUBPIXEL_HALF, SUBPIXEL_ONE) - 1).min(clip.bottom() as i64 - 1);
            for py in first..=last {
                let cy = py * SUBPIXEL_ONE + SUBPIXEL_HALF;
                let px = div_floor(pa.0 * dy + dx * (cy - pa.1), SUBPIXEL_ONE * dy);
                if px >= clip.x as i64 && px < clip.right() as i64 {
                    self.emit_run(&setup, py as i32, px as i32, px as i32);
                }
            }
        }
        self.drawer.end_line();
    }

    pub fn draw_point(&mut self, v: &ScreenVertex) {
        let px = fixed::floor_int(v.x);
        let py = fixed::floor_int(v.y);
        if !self.clip.contains(px, py) {
            return;
        }
        count_call!(crate::perf::FUNCTION_COUNTERS.points_drawn);
        let mut fd = FragmentData::default();
        if D::INTERPOLATE_Z {
            fd.z = v.z;
        }
        let n = D::VARYING_COUNT.min(MAX_VARYINGS);
        fd.varyings[..n].copy_from_slice(&v.varyings[..n]);
        self.drawer.begin_point(v);
        self.drawer
            .affine_span(px, py, &fd, &FragmentData::default(), 1);
        self.drawer.end_point();
    }

    pub fn draw_triangle_list(&mut self, vertices: &[ScreenVertex], indices: &[u32]) {
        debug_assert!(indices.len() % 3 == 0, "triangle list length is not a multiple of 3");
        for tri in indices.chunks_exact(3) {
            self.draw_triangle(
                &vertices[tri[0] as usize],
                &vertices[tri[1] as usize],
                &vertices[tri[2] as usize],
            );
        }
    }

    pub fn draw_line_list(&mut self, vertices: &[ScreenVertex], indices: &[u32]) {
        debug_assert!(indices.len() % 2 == 0, "line list length is not a multiple of 2");
        for line in indices.chunks_exact(2) {
            self.draw_line(&vertices[line[0] as usize], &vertices[line[1] as usize]);
        }
    }

    pub fn draw_point_list(&mut self, vertices: &[ScreenVertex], indices: &[u32]) {
        for &i in indices {
            self.draw_point(&vertices[i as usize]);
        }
    }
}

impl<D: SpanDrawer> PrimitiveSink for Rasterizer<D> {
    fn varying_count(&self) -> usize {
        D::VARYING_COUNT
    }

    fn bounds(&self) -> Rect {
        self.clip
    }

    #[inline]
    fn draw_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) {
        Rasterizer::draw_triangle(self, v0, v1, v2)
    }

    #[inline]
    fn draw_line(&mut self, v0: &ScreenVertex, v1: &ScreenVertex) {
        Rasterizer::draw_line(self, v0, v1)
    }

    #[inline]
    fn draw_point(&mut self, v: &ScreenVertex) {
        Rasterizer::draw_point(self, v)
    }
}
