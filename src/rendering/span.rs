//! Span drawers: the last stage between the rasterizer and the fragment shader.
//!
//! The rasterizer hands over affine sub-spans (start value plus per-pixel
//! step). A drawer decides what a pixel means: a direct shader call, a
//! colour/depth pair resolved from a buffer view, or a coverage sample that is
//! accumulated and emitted later.

use super::framebuffer::{ColorDepthTarget, Rect};
use super::shader::{ColorDepthShader, FragmentShader, MultisampleShader, SingleSampleShader};
use super::vertex::{FragmentData, ScreenVertex};

/// Consumer of rasterized spans.
///
/// Every hook has an empty default; only `affine_span` must be provided.
pub trait SpanDrawer {
    const VARYING_COUNT: usize;
    const INTERPOLATE_Z: bool;

    /// `area2` is the doubled screen area in 24.8 units, always positive.
    fn begin_triangle(
        &mut self,
        _v0: &ScreenVertex,
        _v1: &ScreenVertex,
        _v2: &ScreenVertex,
        _area2: i64,
    ) {
    }
    fn end_triangle(&mut self) {}
    fn begin_line(&mut self, _v0: &ScreenVertex, _v1: &ScreenVertex) {}
    fn end_line(&mut self) {}
    fn begin_point(&mut self, _v: &ScreenVertex) {}
    fn end_point(&mut self) {}
    fn clip_rect_changed(&mut self, _rect: &Rect) {}

    /// `n >= 1` pixels of row `y` starting at `x`. Pixel `i` receives
    /// `fd + i * step`.
    fn affine_span(&mut self, x: i32, y: i32, fd: &FragmentData, step: &FragmentData, n: i32);
}

/// Direct single-sample drawer: one shader call per pixel with `&mut U`.
pub struct GenericSpanDrawer<S, U> {
    shader: S,
    target: U,
}

impl<S, U> GenericSpanDrawer<S, U> {
    pub fn new(shader: S, target: U) -> Self {
        Self { shader, target }
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn target(&self) -> &U {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut U {
        &mut self.target
    }

    pub fn into_target(self) -> U {
        self.target
    }
}

impl<S: SingleSampleShader<U>, U> SpanDrawer for GenericSpanDrawer<S, U> {
    const VARYING_COUNT: usize = S::VARYING_COUNT;
    const INTERPOLATE_Z: bool = S::INTERPOLATE_Z;

    #[inline]
    fn affine_span(&mut self, x: i32, y: i32, fd: &FragmentData, step: &FragmentData, n: i32) {
        let mut fd = *fd;
        for px in x..x + n {
            self.shader.single_fragment(px, y, &fd, &mut self.target);
            fd.add_step(step, S::VARYING_COUNT, S::INTERPOLATE_Z);
        }
    }
}

/// Colour + depth drawer. Resolves both rows once per span so the shader sees
/// plain `&mut` cells and the inner loop carries no bounds checks.
pub struct ColorDepthSpanDrawer<S, T> {
    shader: S,
    target: T,
}

impl<S, T> ColorDepthSpanDrawer<S, T> {
    pub fn new(shader: S, target: T) -> Self {
        Self { shader, target }
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }
}

impl<S, T> SpanDrawer for ColorDepthSpanDrawer<S, T>
where
    S: ColorDepthShader,
    T: ColorDepthTarget<Color = S::Color, Depth = S::Depth>,
{
    const VARYING_COUNT: usize = <S as FragmentShader>::VARYING_COUNT;
    const INTERPOLATE_Z: bool = <S as FragmentShader>::INTERPOLATE_Z;

    #[inline]
    fn affine_span(&mut self, x: i32, y: i32, fd: &FragmentData, step: &FragmentData, n: i32) {
        let (colors, depths) = self.target.spans_mut(x as usize, y as usize, n as usize);
        let mut fd = *fd;
        for (color, depth) in colors.iter_mut().zip(depths.iter_mut()) {
            self.shader.color_depth_fragment(&fd, color, depth);
            fd.add_step(step, Self::VARYING_COUNT, Self::INTERPOLATE_Z);
        }
    }
}

/// Accumulated coverage for one output pixel of the active row.
///
/// Only the fragment data of the first sample is kept; the target value `U`
/// is owned by the drawer and passed at emission, so cells stay small and
/// `Copy`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CoverageCell {
    pub mask: u32,
    pub fd: FragmentData,
}

const NO_ROW: i32 = i32::MIN;

/// N×N multisampling with deferred, order-independent emission.
///
/// The rasterizer runs in sample space (clip rect and viewport scaled by `N`).
/// Samples are folded into one [`CoverageCell`] per output pixel; the shader
/// runs once per covered output pixel with the coverage mask when the output
/// row changes and at the end of every primitive.
///
/// The fragment data of a cell comes from whichever sample reached it first.
/// Edge pixels therefore use values from a covered sample rather than the
/// pixel centre.
pub struct MultisampleSpanDrawer<S, U, const N: usize> {
    shader: S,
    target: U,
    cells: Vec<CoverageCell>,
    row: i32,
    dirty_min: i32,
    dirty_max: i32,
}

impl<S, U, const N: usize> MultisampleSpanDrawer<S, U, N> {
    const VALID_SAMPLE_GRID: () = assert!(
        N >= 1 && N <= 5,
        "sample grid must be 1..=5 so the mask fits in u32"
    );

    pub const SAMPLES: usize = N;

    pub fn new(shader: S, target: U) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_SAMPLE_GRID;
        Self {
            shader,
            target,
            cells: Vec::new(),
            row: NO_ROW,
            dirty_min: i32::MAX,
            dirty_max: i32::MIN,
        }
    }

    pub fn shader(&self) -> &S {
        &self.shader
    }

    pub fn target(&self) -> &U {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut U {
        &mut self.target
    }

    pub fn into_target(self) -> U {
        self.target
    }

    /// Current capacity of the coverage row, in output pixels.
    pub fn coverage_capacity(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn ensure_cells(&mut self, last_cell: usize) {
        if self.cells.len() <= last_cell {
            self.cells.resize(last_cell + 1, CoverageCell::default());
        }
    }
}

impl<S: MultisampleShader<U>, U, const N: usize> MultisampleSpanDrawer<S, U, N> {
    /// Emit every non-empty cell of the dirty range and clear it.
    fn flush(&mut self) {
        if self.dirty_min > self.dirty_max {
            return;
        }
        let row = self.row;
        for ox in self.dirty_min..=self.dirty_max {
            let cell = &mut self.cells[ox as usize];
            if cell.mask != 0 {
                self.shader
                    .multisample_fragment(ox, row, &cell.fd, cell.mask, &mut self.target);
                cell.mask = 0;
                crate::count_call!(crate::perf::FUNCTION_COUNTERS.coverage_emits);
            }
        }
        self.dirty_min = i32::MAX;
        self.dirty_max = i32::MIN;
    }
}

impl<S: MultisampleShader<U>, U, const N: usize> SpanDrawer for MultisampleSpanDrawer<S, U, N> {
    const VARYING_COUNT: usize = S::VARYING_COUNT;
    const INTERPOLATE_Z: bool = S::INTERPOLATE_Z;

    fn end_triangle(&mut self) {
        self.flush();
    }

    fn end_line(&mut self) {
        self.flush();
    }

    fn end_point(&mut self) {
        self.flush();
    }

    fn clip_rect_changed(&mut self, rect: &Rect) {
        self.flush();
        self.cells.clear();
        self.ensure_cells((rect.right().max(0) as usize) / N);
        self.row = NO_ROW;
    }

    #[inline]
    fn affine_span(&mut self, x: i32, y: i32, fd: &FragmentData, step: &FragmentData, n: i32) {
        let n_i = N as i32;
        let out_row = y / n_i;
        if out_row != self.row {
            self.flush();
            self.row = out_row;
        }
        let end = x + n;
        self.ensure_cells(((end - 1) / n_i) as usize);
        self.dirty_min = self.dirty_min.min(x / n_i);
        self.dirty_max = self.dirty_max.max((end - 1) / n_i);

        let row_shift = (y % n_i) * n_i;
        let mut fd = *fd;
        let mut sx = x;
        // Walk one output pixel at a time and set all its samples at once.
        while sx < end {
            let ox = sx / n_i;
            let cell_end = ((ox + 1) * n_i).min(end);
            let count = cell_end - sx;
            let bits = ((1u32 << count) - 1) << (row_shift + sx % n_i);
            let cell = &mut self.cells[ox as usize];
            if cell.mask == 0 {
                cell.fd = fd;
            }
            cell.mask |= bits;
            fd.advance(step, count, S::VARYING_COUNT, S::INTERPOLATE_Z);
            sx = cell_end;
        }
    }
}
