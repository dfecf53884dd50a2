/// Tile-parallel rasterization.
/// The clip rect is cut into a grid of disjoint tiles; each tile owns a
/// rasterizer whose span drawer writes only into that tile. Primitives are
/// recorded as they arrive and replayed on every tile in parallel when the
/// draw call ends.
use super::framebuffer::Rect;
use super::rasterizer::{PrimitiveSink, Rasterizer};
use super::span::SpanDrawer;
use super::vertex::ScreenVertex;
use crate::error::ConfigError;
use rayon::prelude::*;
use rayon::ThreadPool;

/// `rows × cols` partition of a rectangle. The last row and column absorb
/// the remainder when the size does not divide evenly.
///
/// An aligned grid keeps every tile edge on a multiple of `align`, so a
/// multisampled output pixel (an `align × align` block of samples) never
/// straddles two tiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid {
    bounds: Rect,
    rows: usize,
    cols: usize,
    align: i32,
    tiles: Vec<Rect>,
}

impl TileGrid {
    pub fn new(bounds: Rect, rows: usize, cols: usize) -> Result<Self, ConfigError> {
        Self::aligned(bounds, rows, cols, 1)
    }

    /// Grid whose tile edges all fall on multiples of `align`. The bounds
    /// themselves must already be aligned.
    pub fn aligned(
        bounds: Rect,
        rows: usize,
        cols: usize,
        align: i32,
    ) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTileGrid {
            rows,
            cols,
            width: bounds.width,
            height: bounds.height,
        };
        if align < 1 || bounds.is_empty() {
            return Err(invalid());
        }
        let on_grid = |v: i32| v.rem_euclid(align) == 0;
        let edges = [bounds.x, bounds.y, bounds.width, bounds.height];
        if !edges.into_iter().all(on_grid) {
            return Err(invalid());
        }
        let cells_x = (bounds.width / align) as usize;
        let cells_y = (bounds.height / align) as usize;
        if rows == 0 || cols == 0 || rows > cells_y || cols > cells_x {
            return Err(invalid());
        }
        let tile_w = (cells_x / cols) as i32 * align;
        let tile_h = (cells_y / rows) as i32 * align;
        let mut tiles = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            let y = bounds.y + r as i32 * tile_h;
            let h = if r + 1 == rows { bounds.bottom() - y } else { tile_h };
            for c in 0..cols {
                let x = bounds.x + c as i32 * tile_w;
                let w = if c + 1 == cols { bounds.right() - x } else { tile_w };
                tiles.push(Rect::new(x, y, w, h));
            }
        }
        log::debug!(
            "tile grid {}x{} over {}x{} (align {}): base tile {}x{}",
            rows,
            cols,
            bounds.width,
            bounds.height,
            align,
            tile_w,
            tile_h
        );
        Ok(Self {
            bounds,
            rows,
            cols,
            align,
            tiles,
        })
    }

    /// The same partition with every rect divided by the alignment: tiles in
    /// output pixels for a grid laid out in sample space.
    pub fn downscaled(&self) -> TileGrid {
        let a = self.align;
        let down = |r: &Rect| Rect::new(r.x / a, r.y / a, r.width / a, r.height / a);
        TileGrid {
            bounds: down(&self.bounds),
            rows: self.rows,
            cols: self.cols,
            align: 1,
            tiles: self.tiles.iter().map(down).collect(),
        }
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn align(&self) -> i32 {
        self.align
    }

    /// Tile rects in row-major order.
    #[inline]
    pub fn tiles(&self) -> &[Rect] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Build a worker pool; `0` threads means one per available core.
pub(crate) fn build_pool(thread_count: usize) -> Result<ThreadPool, ConfigError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
    log::debug!("worker pool with {} threads", pool.current_num_threads());
    Ok(pool)
}

/// A primitive waiting to be replayed on the tiles.
#[derive(Clone, Copy, Debug)]
enum Primitive {
    Triangle([ScreenVertex; 3]),
    Line([ScreenVertex; 2]),
    Point(ScreenVertex),
}

pub struct TiledRasterizer<D> {
    grid: TileGrid,
    tiles: Vec<Rasterizer<D>>,
    pending: Vec<Primitive>,
    pool: ThreadPool,
}

impl<D: SpanDrawer + Send> TiledRasterizer<D> {
    /// One drawer per grid tile, in [`TileGrid::tiles`] order.
    pub fn from_drawers(
        grid: TileGrid,
        thread_count: usize,
        drawers: Vec<D>,
    ) -> Result<Self, ConfigError> {
        if drawers.len() != grid.len() {
            let b = grid.bounds();
            return Err(ConfigError::InvalidTileGrid {
                rows: grid.rows(),
                cols: grid.cols(),
                width: b.width,
                height: b.height,
            });
        }
        let tiles = grid
            .tiles()
            .iter()
            .zip(drawers)
            .map(|(rect, drawer)| Rasterizer::new(drawer, *rect))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            grid,
            tiles,
            pending: Vec::new(),
            pool: build_pool(thread_count)?,
        })
    }

    /// Build the drawers with `make_drawer(tile_index, tile_rect)`.
    pub fn new<F>(grid: TileGrid, thread_count: usize, make_drawer: F) -> Result<Self, ConfigError>
    where
        F: FnMut(usize, Rect) -> D,
    {
        let mut make_drawer = make_drawer;
        let drawers = grid
            .tiles()
            .iter()
            .enumerate()
            .map(|(i, rect)| make_drawer(i, *rect))
            .collect();
        Self::from_drawers(grid, thread_count, drawers)
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn tiles(&self) -> &[Rasterizer<D>] {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut [Rasterizer<D>] {
        &mut self.tiles
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn set_perspective_correction(&mut self, enable: bool) {
        for r in &mut self.tiles {
            r.set_perspective_correction(enable);
        }
    }

    pub fn set_perspective_threshold(&mut self, width: i32, height: i32) {
        for r in &mut self.tiles {
            r.set_perspective_threshold(width, height);
        }
    }

    /// Primitives recorded since the last flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Rasterize every recorded primitive on all tiles and wait for them.
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = &self.pending;
        let tiles = &mut self.tiles;
        self.pool.install(|| {
            tiles.par_iter_mut().for_each(|raster| {
                for prim in pending {
                    match prim {
                        Primitive::Triangle([a, b, c]) => raster.draw_triangle(a, b, c),
                        Primitive::Line([a, b]) => raster.draw_line(a, b),
                        Primitive::Point(p) => raster.draw_point(p),
                    }
                }
            });
        });
        log::trace!("flushed {} primitives over {} tiles", self.pending.len(), self.tiles.len());
        self.pending.clear();
    }

    /// Flush, then hand back the drawers in tile order.
    pub fn into_drawers(mut self) -> Vec<D> {
        self.flush();
        self.tiles.into_iter().map(Rasterizer::into_drawer).collect()
    }
}

impl<D: SpanDrawer + Send> PrimitiveSink for TiledRasterizer<D> {
    fn varying_count(&self) -> usize {
        D::VARYING_COUNT
    }

    fn bounds(&self) -> Rect {
        self.grid.bounds()
    }

    fn draw_triangle(&mut self, v0: &ScreenVertex, v1: &ScreenVertex, v2: &ScreenVertex) {
        self.pending.push(Primitive::Triangle([*v0, *v1, *v2]));
    }

    fn draw_line(&mut self, v0: &ScreenVertex, v1: &ScreenVertex) {
        self.pending.push(Primitive::Line([*v0, *v1]));
    }

    fn draw_point(&mut self, v: &ScreenVertex) {
        self.pending.push(Primitive::Point(*v));
    }

    fn end_draw(&mut self) {
        self.flush();
    }
}
