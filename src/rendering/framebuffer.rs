/// Pixel buffer views over caller-owned memory.
///
/// The pipeline never allocates display memory. Callers hand in `&mut [P]`
/// plus width/height/stride; the views validate those once at construction
/// so span drawers only need one bounds check per span.
use super::tiled::TileGrid;
use crate::error::ConfigError;
use std::marker::PhantomData;

/// Axis-aligned pixel rectangle, half-open on the right and bottom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline(always)]
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    #[inline(always)]
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        Rect::new(x, y, (r - x).max(0), (b - y).max(0))
    }

    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }
}

/// Anything a fragment shader can write single pixels into.
pub trait PixelTarget {
    type Pixel;

    fn pixel_mut(&mut self, x: usize, y: usize) -> &mut Self::Pixel;

    /// `n` consecutive pixels of row `y` starting at `x`.
    fn span_mut(&mut self, x: usize, y: usize, n: usize) -> &mut [Self::Pixel];
}

/// Paired colour and depth rows, resolved once per span.
pub trait ColorDepthTarget {
    type Color;
    type Depth;

    fn spans_mut(
        &mut self,
        x: usize,
        y: usize,
        n: usize,
    ) -> (&mut [Self::Color], &mut [Self::Depth]);
}

fn check_layout(len: usize, width: usize, height: usize, stride: usize) -> Result<(), ConfigError> {
    if stride < width {
        return Err(ConfigError::InvalidStride { stride, width });
    }
    let required = if height == 0 {
        0
    } else {
        (height - 1) * stride + width
    };
    if len < required {
        return Err(ConfigError::BufferTooSmall {
            required,
            actual: len,
        });
    }
    Ok(())
}

/// Row-major view of `width × height` pixels with `stride` elements per row.
pub struct PixelBuffer<'a, P> {
    data: &'a mut [P],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, P> PixelBuffer<'a, P> {
    pub fn new(
        data: &'a mut [P],
        width: usize,
        height: usize,
        stride: usize,
    ) -> Result<Self, ConfigError> {
        check_layout(data.len(), width, height, stride)?;
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Tightly packed buffer (`stride == width`).
    pub fn packed(data: &'a mut [P], width: usize, height: usize) -> Result<Self, ConfigError> {
        Self::new(data, width, height, width)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&P> {
        if x < self.width && y < self.height {
            self.data.get(y * self.stride + x)
        } else {
            None
        }
    }

    pub fn row(&self, y: usize) -> &[P] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [P] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    pub fn fill(&mut self, value: P)
    where
        P: Clone,
    {
        for y in 0..self.height {
            self.row_mut(y).fill(value.clone());
        }
    }

    /// Disjoint tile views, one per grid tile, in grid order.
    pub fn split_into_tiles(
        &mut self,
        grid: &TileGrid,
    ) -> Result<Vec<PixelTile<'_, P>>, ConfigError> {
        let extent = grid.bounds();
        if extent.x < 0
            || extent.y < 0
            || extent.right() as usize > self.width
            || extent.bottom() as usize > self.height
        {
            return Err(ConfigError::BufferTooSmall {
                required: extent.bottom().max(0) as usize * self.stride,
                actual: self.data.len(),
            });
        }
        let base = self.data.as_mut_ptr();
        Ok(grid
            .tiles()
            .iter()
            .map(|rect| PixelTile {
                base,
                stride: self.stride,
                rect: *rect,
                _borrow: PhantomData,
            })
            .collect())
    }
}

impl<P> PixelTarget for PixelBuffer<'_, P> {
    type Pixel = P;

    #[inline]
    fn pixel_mut(&mut self, x: usize, y: usize) -> &mut P {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        &mut self.data[y * self.stride + x]
    }

    #[inline]
    fn span_mut(&mut self, x: usize, y: usize, n: usize) -> &mut [P] {
        assert!(x + n <= self.width && y < self.height, "span out of bounds");
        let start = y * self.stride + x;
        &mut self.data[start..start + n]
    }
}

/// View into a rectangular tile of a [`PixelBuffer`].
///
/// Tiles partition the parent buffer and address pixels in the parent's
/// coordinates. Internally they share the parent's base pointer; every access
/// is asserted to lie inside the tile rect, which is what keeps sibling tiles
/// disjoint when they are written from different threads.
pub struct PixelTile<'a, P> {
    base: *mut P,
    stride: usize,
    rect: Rect,
    _borrow: PhantomData<&'a mut [P]>,
}

// Safety: a tile only ever touches the pixels of its own rect and tiles
// produced by one split never overlap.
unsafe impl<P: Send> Send for PixelTile<'_, P> {}
unsafe impl<P: Sync> Sync for PixelTile<'_, P> {}

impl<P> PixelTile<'_, P> {
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[inline(always)]
    fn check_span(&self, x: usize, y: usize, n: usize) {
        let r = &self.rect;
        assert!(
            x >= r.x as usize
                && x + n <= r.right() as usize
                && y >= r.y as usize
                && y < r.bottom() as usize,
            "span ({x}, {y}) x {n} outside tile {r:?}"
        );
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&P> {
        if self.rect.contains(x as i32, y as i32) {
            // Safety: inside the tile rect, which lies inside the parent buffer.
            Some(unsafe { &*self.base.add(y * self.stride + x) })
        } else {
            None
        }
    }
}

impl<P> PixelTarget for PixelTile<'_, P> {
    type Pixel = P;

    #[inline]
    fn pixel_mut(&mut self, x: usize, y: usize) -> &mut P {
        self.check_span(x, y, 1);
        // Safety: checked against the tile rect above.
        unsafe { &mut *self.base.add(y * self.stride + x) }
    }

    #[inline]
    fn span_mut(&mut self, x: usize, y: usize, n: usize) -> &mut [P] {
        self.check_span(x, y, n);
        // Safety: checked against the tile rect above.
        unsafe { std::slice::from_raw_parts_mut(self.base.add(y * self.stride + x), n) }
    }
}

/// Colour buffer plus a depth buffer of the same dimensions.
pub struct ColorDepthBuffer<'a, C, D> {
    pub color: PixelBuffer<'a, C>,
    pub depth: PixelBuffer<'a, D>,
}

impl<'a, C, D> ColorDepthBuffer<'a, C, D> {
    pub fn new(color: PixelBuffer<'a, C>, depth: PixelBuffer<'a, D>) -> Result<Self, ConfigError> {
        let color_size = (color.width(), color.height());
        let depth_size = (depth.width(), depth.height());
        if color_size != depth_size {
            return Err(ConfigError::PlaneSizeMismatch {
                color: color_size,
                depth: depth_size,
            });
        }
        Ok(Self { color, depth })
    }

    pub fn width(&self) -> usize {
        self.color.width()
    }

    pub fn height(&self) -> usize {
        self.color.height()
    }

    /// Paired colour and depth tiles, one per grid tile, in grid order.
    pub fn split_into_tiles(
        &mut self,
        grid: &TileGrid,
    ) -> Result<Vec<ColorDepthTile<'_, C, D>>, ConfigError> {
        let colors = self.color.split_into_tiles(grid)?;
        let depths = self.depth.split_into_tiles(grid)?;
        Ok(colors
            .into_iter()
            .zip(depths)
            .map(|(color, depth)| ColorDepthTile { color, depth })
            .collect())
    }
}

impl<C, D> ColorDepthTarget for ColorDepthBuffer<'_, C, D> {
    type Color = C;
    type Depth = D;

    #[inline]
    fn spans_mut(&mut self, x: usize, y: usize, n: usize) -> (&mut [C], &mut [D]) {
        (self.color.span_mut(x, y, n), self.depth.span_mut(x, y, n))
    }
}

/// Tile of a [`ColorDepthBuffer`].
pub struct ColorDepthTile<'a, C, D> {
    pub color: PixelTile<'a, C>,
    pub depth: PixelTile<'a, D>,
}

impl<C, D> ColorDepthTarget for ColorDepthTile<'_, C, D> {
    type Color = C;
    type Depth = D;

    #[inline]
    fn spans_mut(&mut self, x: usize, y: usize, n: usize) -> (&mut [C], &mut [D]) {
        (self.color.span_mut(x, y, n), self.depth.span_mut(x, y, n))
    }
}

/// Owned colour + depth storage for callers that do not bring their own.
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub color_buffer: Vec<u32>,
    /// 16.16 depth, larger is farther.
    pub depth_buffer: Vec<i32>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let pixel_count = width * height;
        Self {
            width,
            height,
            color_buffer: vec![0; pixel_count],
            depth_buffer: vec![i32::MAX; pixel_count],
        }
    }

    pub fn clear(&mut self, clear_color: u32) {
        self.color_buffer.fill(clear_color);
        self.depth_buffer.fill(i32::MAX);
    }

    pub fn color_view(&mut self) -> PixelBuffer<'_, u32> {
        PixelBuffer {
            data: &mut self.color_buffer,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }

    pub fn color_depth_view(&mut self) -> ColorDepthBuffer<'_, u32, i32> {
        ColorDepthBuffer {
            color: PixelBuffer {
                data: &mut self.color_buffer,
                width: self.width,
                height: self.height,
                stride: self.width,
            },
            depth: PixelBuffer {
                data: &mut self.depth_buffer,
                width: self.width,
                height: self.height,
                stride: self.width,
            },
        }
    }
}

/// Pack RGB into 0xAARRGGBB with opaque alpha.
#[inline]
pub const fn rgb_to_u32(r: u8, g: u8, b: u8) -> u32 {
    0xFF000000 | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}
