pub mod config;
pub mod error;
/// 16.16 fixed-point arithmetic
pub mod fixed;
pub mod perf;
/// Fixed-point software rasterizer with subdivided affine spans
/// Shaders plug in as traits; buffers are borrowed from the caller
pub mod rendering;

pub use config::PipelineConfig;
pub use error::ConfigError;
pub use fixed::{Fixed, FIX_ONE, FIX_SHIFT};
pub use perf::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};
pub use rendering::{
    AttributeStream, ColorDepthBuffer, ColorDepthShader, ColorDepthSpanDrawer, CullMode,
    FragmentData, FragmentShader, GenericSpanDrawer, GeometryProcessor, MultisampleShader,
    MultisampleSpanDrawer, PixelBuffer, PixelTarget, PrimitiveSink, Rasterizer, Rect,
    ReplicaPipelines, ScreenVertex, SingleSampleShader, SpanDrawer, TileGrid, TiledRasterizer,
    VertexAttribs, VertexInput, VertexOutput, VertexShader,
};
