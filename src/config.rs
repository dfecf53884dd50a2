/// Pipeline configuration bundle.
/// Collects every setter of the geometry processor and rasterizer in one
/// place so callers can validate a setup once and apply it to any pipeline.
use crate::error::ConfigError;
use crate::fixed::{Fixed, FIX_ONE};
use crate::rendering::framebuffer::Rect;
use crate::rendering::geometry::{check_depth_range, check_viewport, CullMode, GeometryProcessor};
use crate::rendering::rasterizer::{check_clip_rect, Rasterizer};
use crate::rendering::shader::VertexShader;
use crate::rendering::span::SpanDrawer;
use crate::rendering::tiled::{TileGrid, TiledRasterizer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub viewport: Rect,
    /// 16.16 near/far, both within [0, 1].
    pub depth_range: (Fixed, Fixed),
    pub clip_rect: Rect,
    pub cull_mode: CullMode,
    pub perspective_correction: bool,
    pub perspective_threshold: (i32, i32),
    /// Worker threads for tiled and replica pipelines; 0 = one per core.
    pub thread_count: usize,
    /// Tile grid as (rows, cols).
    pub tile_grid: (usize, usize),
    /// Samples per output pixel along each axis; tile edges stay on multiples
    /// of it.
    pub sample_factor: i32,
}

impl PipelineConfig {
    /// Full-target viewport and clip rect with the default pipeline state.
    pub fn new(width: i32, height: i32) -> Self {
        let full = Rect::new(0, 0, width, height);
        Self {
            viewport: full,
            depth_range: (0, FIX_ONE),
            clip_rect: full,
            cull_mode: CullMode::default(),
            perspective_correction: true,
            perspective_threshold: (0, 0),
            thread_count: 0,
            tile_grid: (1, 1),
            sample_factor: 1,
        }
    }

    pub fn with_viewport(mut self, viewport: Rect) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_depth_range(mut self, near: Fixed, far: Fixed) -> Self {
        self.depth_range = (near, far);
        self
    }

    pub fn with_clip_rect(mut self, clip_rect: Rect) -> Self {
        self.clip_rect = clip_rect;
        self
    }

    pub fn with_cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    pub fn with_perspective_correction(mut self, enable: bool) -> Self {
        self.perspective_correction = enable;
        self
    }

    pub fn with_perspective_threshold(mut self, width: i32, height: i32) -> Self {
        self.perspective_threshold = (width, height);
        self
    }

    pub fn with_thread_count(mut self, threads: usize) -> Self {
        self.thread_count = threads;
        self
    }

    pub fn with_tile_grid(mut self, rows: usize, cols: usize) -> Self {
        self.tile_grid = (rows, cols);
        self
    }

    /// The same setup in an `n × n` supersampled coordinate space, for use with
    /// a multisample span drawer.
    pub fn scaled(&self, n: i32) -> Self {
        let scale = |r: Rect| Rect::new(r.x * n, r.y * n, r.width * n, r.height * n);
        Self {
            viewport: scale(self.viewport),
            clip_rect: scale(self.clip_rect),
            sample_factor: self.sample_factor * n,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let vp = self.viewport;
        check_viewport(vp.x, vp.y, vp.width, vp.height)?;
        check_depth_range(self.depth_range.0, self.depth_range.1)?;
        check_clip_rect(self.clip_rect)?;
        self.tile_grid().map(|_| ())
    }

    /// Tiles over the clip rect, aligned to the sample factor. Use
    /// [`TileGrid::downscaled`] for the matching output-pixel tiles.
    pub fn tile_grid(&self) -> Result<TileGrid, ConfigError> {
        let (rows, cols) = self.tile_grid;
        TileGrid::aligned(self.clip_rect, rows, cols, self.sample_factor)
    }

    /// A rasterizer with this clip rect and perspective settings.
    pub fn rasterizer<D: SpanDrawer>(&self, drawer: D) -> Result<Rasterizer<D>, ConfigError> {
        let mut r = Rasterizer::new(drawer, self.clip_rect)?;
        r.set_perspective_correction(self.perspective_correction);
        r.set_perspective_threshold(self.perspective_threshold.0, self.perspective_threshold.1);
        Ok(r)
    }

    /// A tiled rasterizer over this clip rect and tile grid.
    pub fn tiled_rasterizer<D, F>(&self, make_drawer: F) -> Result<TiledRasterizer<D>, ConfigError>
    where
        D: SpanDrawer + Send,
        F: FnMut(usize, Rect) -> D,
    {
        let mut r = TiledRasterizer::new(self.tile_grid()?, self.thread_count, make_drawer)?;
        r.set_perspective_correction(self.perspective_correction);
        r.set_perspective_threshold(self.perspective_threshold.0, self.perspective_threshold.1);
        Ok(r)
    }

    fn apply_geometry<V: VertexShader, R: crate::rendering::rasterizer::PrimitiveSink>(
        &self,
        gp: &mut GeometryProcessor<V, R>,
    ) -> Result<(), ConfigError> {
        let vp = self.viewport;
        gp.set_viewport(vp.x, vp.y, vp.width, vp.height)?;
        gp.set_depth_range(self.depth_range.0, self.depth_range.1)?;
        gp.set_cull_mode(self.cull_mode);
        Ok(())
    }

    /// Validate, then push every setting into a processor/rasterizer pair.
    pub fn apply<V: VertexShader, D: SpanDrawer>(
        &self,
        gp: &mut GeometryProcessor<V, Rasterizer<D>>,
    ) -> Result<(), ConfigError> {
        self.validate()?;
        self.apply_geometry(gp)?;
        let r = gp.sink_mut();
        r.set_clip_rect(self.clip_rect)?;
        r.set_perspective_correction(self.perspective_correction);
        r.set_perspective_threshold(self.perspective_threshold.0, self.perspective_threshold.1);
        Ok(())
    }

    /// Like [`apply`](Self::apply) for a tiled sink. The tile layout itself is
    /// fixed when the tiled rasterizer is built.
    pub fn apply_tiled<V: VertexShader, D: SpanDrawer + Send>(
        &self,
        gp: &mut GeometryProcessor<V, TiledRasterizer<D>>,
    ) -> Result<(), ConfigError> {
        self.validate()?;
        self.apply_geometry(gp)?;
        let r = gp.sink_mut();
        r.set_perspective_correction(self.perspective_correction);
        r.set_perspective_threshold(self.perspective_threshold.0, self.perspective_threshold.1);
        Ok(())
    }
}
