/// Software rasterization pipeline
/// Geometry processor -> rasterizer -> span drawer -> fragment shader
pub mod clipping;
pub mod framebuffer;
pub mod geometry;
pub mod interpolation;
pub mod rasterizer;
pub mod shader;
pub mod span;
pub mod vertex;

// Parallel decomposition
pub mod replica;
pub mod tiled;

pub use framebuffer::{
    rgb_to_u32, ColorDepthBuffer, ColorDepthTarget, ColorDepthTile, Framebuffer, PixelBuffer,
    PixelTarget, PixelTile, Rect,
};
pub use geometry::{CullMode, GeometryProcessor, MAX_VIEWPORT_DIM};
pub use rasterizer::{PrimitiveSink, Rasterizer, AFFINE_LENGTH};
pub use replica::ReplicaPipelines;
pub use shader::{
    ColorDepthShader, FragmentShader, MultisampleShader, SingleSampleShader, VertexShader,
};
pub use span::{
    ColorDepthSpanDrawer, CoverageCell, GenericSpanDrawer, MultisampleSpanDrawer, SpanDrawer,
};
pub use tiled::{TileGrid, TiledRasterizer};
pub use vertex::{
    AttributeStream, FragmentData, ScreenVertex, VertexAttribs, VertexInput, VertexOutput,
    MAX_ATTRIBUTES, MAX_VARYINGS,
};
